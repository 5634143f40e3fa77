//! Notification processing
//!
//! This module provides the public entry points of the crate. It applies the
//! decoder registry to notifications delivered by a BLE transport and maps the
//! resulting measurements to observation records.

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::characteristic::CharacteristicId;
use crate::decoders::DecoderRegistry;
use crate::error::ObservationError;
use crate::observation::{ObservationMapper, ObservationRecord, SystemTimeProvider, TimeProvider};
use crate::types::Measurement;

/// A characteristic notification as delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub service: Uuid,
    pub characteristic: Uuid,
    /// Raw characteristic value
    pub payload: Vec<u8>,
}

impl Notification {
    pub fn new(service: Uuid, characteristic: Uuid, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            service,
            characteristic,
            payload: payload.into(),
        }
    }

    pub fn id(&self) -> CharacteristicId {
        CharacteristicId::new(self.service, self.characteristic)
    }

    /// Parse a JSON array of notifications
    pub fn parse_array(json: &str) -> Result<Vec<Notification>, ObservationError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse NDJSON (one notification per line, blank lines skipped)
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<Notification>, ObservationError> {
        let mut notifications = Vec::new();
        for line in ndjson.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            notifications.push(serde_json::from_str(trimmed)?);
        }
        Ok(notifications)
    }
}

/// Decode a single notification with the default decoders.
///
/// Returns `None` for characteristics that are not weight or blood pressure
/// measurements, and for malformed payloads.
///
/// # Example
/// ```
/// use engagehf_measurements::characteristic::BleServiceType;
/// use engagehf_measurements::decode_notification;
///
/// let id = BleServiceType::Weight.id();
/// let measurement = decode_notification(id.service, id.characteristic, &[0x00, 0x30, 0x75]);
/// assert!(measurement.is_some());
/// ```
pub fn decode_notification(
    service: Uuid,
    characteristic: Uuid,
    payload: &[u8],
) -> Option<Measurement> {
    DecoderRegistry::new().decode(&CharacteristicId::new(service, characteristic), payload)
}

/// Decoded measurement together with its observation records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedMeasurement {
    pub measurement: Measurement,
    pub observations: Vec<ObservationRecord>,
}

/// Counters kept by a [`NotificationProcessor`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorStats {
    /// Notifications that produced a measurement
    pub decoded: u64,
    /// Notifications dropped as unrecognized or malformed
    pub skipped: u64,
}

/// Stateful processor for a stream of notifications.
///
/// Holds the decoder registry and observation mapper, and counts decoded and
/// skipped notifications for diagnostics.
pub struct NotificationProcessor<T: TimeProvider = SystemTimeProvider> {
    registry: DecoderRegistry,
    mapper: ObservationMapper<T>,
    stats: ProcessorStats,
}

impl Default for NotificationProcessor<SystemTimeProvider> {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationProcessor<SystemTimeProvider> {
    /// Processor with the default decoders and the system clock
    pub fn new() -> Self {
        Self::with_parts(DecoderRegistry::new(), ObservationMapper::default())
    }
}

impl<T: TimeProvider> NotificationProcessor<T> {
    pub fn with_time_provider(time_provider: T) -> Self {
        Self::with_parts(DecoderRegistry::new(), ObservationMapper::new(time_provider))
    }

    pub fn with_parts(registry: DecoderRegistry, mapper: ObservationMapper<T>) -> Self {
        Self {
            registry,
            mapper,
            stats: ProcessorStats::default(),
        }
    }

    pub fn stats(&self) -> ProcessorStats {
        self.stats
    }

    /// Decode a notification without mapping it
    pub fn decode(&mut self, notification: &Notification) -> Option<Measurement> {
        let measurement = self
            .registry
            .decode(&notification.id(), &notification.payload);

        match &measurement {
            Some(m) => {
                self.stats.decoded += 1;
                trace!("Decoded {} measurement", m.kind().as_str());
            }
            None => {
                self.stats.skipped += 1;
                debug!(
                    "Skipped notification from {}/{} ({} bytes)",
                    notification.service,
                    notification.characteristic,
                    notification.payload.len()
                );
            }
        }

        measurement
    }

    /// Decode a notification and map it to observations
    pub fn process(&mut self, notification: &Notification) -> Option<ProcessedMeasurement> {
        let measurement = self.decode(notification)?;
        let observations = self.mapper.map(&measurement);
        Some(ProcessedMeasurement {
            measurement,
            observations,
        })
    }

    /// Process notifications in order, dropping those that do not decode
    pub fn process_all<'a, I>(&mut self, notifications: I) -> Vec<ProcessedMeasurement>
    where
        I: IntoIterator<Item = &'a Notification>,
    {
        notifications
            .into_iter()
            .filter_map(|n| self.process(n))
            .collect()
    }
}
