//! Characteristic payload decoders
//!
//! Each decoder answers to one `(service, characteristic)` pair and turns its
//! notification payload into a [`Measurement`]. Decoding is a pure function of
//! the identity and bytes; any failure is reported as `None`.

mod blood_pressure;
mod weight;

pub use blood_pressure::BloodPressureDecoder;
pub use weight::WeightDecoder;

use log::debug;

use crate::characteristic::CharacteristicId;
use crate::error::DecodeError;
use crate::types::Measurement;

/// Trait for characteristic payload decoders
pub trait MeasurementDecoder {
    /// Whether this decoder handles notifications from `id`
    fn recognizes(&self, id: &CharacteristicId) -> bool;

    /// Decode a payload, reporting why it failed
    fn try_decode(&self, id: &CharacteristicId, data: &[u8]) -> Result<Measurement, DecodeError>;

    /// Decode a payload, or `None` if it is not ours or is malformed
    fn decode(&self, id: &CharacteristicId, data: &[u8]) -> Option<Measurement> {
        match self.try_decode(id, data) {
            Ok(measurement) => Some(measurement),
            Err(DecodeError::UnrecognizedCharacteristic) => None,
            Err(e) => {
                debug!(
                    "Dropping payload from characteristic {}: {}",
                    id.characteristic, e
                );
                None
            }
        }
    }
}

/// Ordered list of decoders; the first one that recognizes an identity wins
pub struct DecoderRegistry {
    decoders: Vec<Box<dyn MeasurementDecoder + Send + Sync>>,
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderRegistry {
    /// Registry with the weight and blood pressure decoders
    pub fn new() -> Self {
        Self::empty()
            .with_decoder(WeightDecoder)
            .with_decoder(BloodPressureDecoder)
    }

    pub fn empty() -> Self {
        Self {
            decoders: Vec::new(),
        }
    }

    /// Append a decoder after the existing ones
    pub fn with_decoder<D>(mut self, decoder: D) -> Self
    where
        D: MeasurementDecoder + Send + Sync + 'static,
    {
        self.decoders.push(Box::new(decoder));
        self
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    pub fn recognizes(&self, id: &CharacteristicId) -> bool {
        self.decoders.iter().any(|d| d.recognizes(id))
    }

    /// Decode with the first decoder that recognizes `id`
    pub fn decode(&self, id: &CharacteristicId, data: &[u8]) -> Option<Measurement> {
        self.decoders
            .iter()
            .find(|d| d.recognizes(id))
            .and_then(|d| d.decode(id, data))
    }
}
