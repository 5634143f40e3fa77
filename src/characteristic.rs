//! GATT service and characteristic identities
//!
//! A measurement decoder is selected purely from the `(service, characteristic)`
//! pair that produced a notification.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Weight Scale service (0x181D)
pub const WEIGHT_SCALE_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000_181d_0000_1000_8000_00805f9b34fb);
/// Weight Measurement characteristic (0x2A9D)
pub const WEIGHT_MEASUREMENT_UUID: Uuid =
    Uuid::from_u128(0x0000_2a9d_0000_1000_8000_00805f9b34fb);

/// Blood Pressure service (0x1810)
pub const BLOOD_PRESSURE_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000_1810_0000_1000_8000_00805f9b34fb);
/// Blood Pressure Measurement characteristic (0x2A35)
pub const BLOOD_PRESSURE_MEASUREMENT_UUID: Uuid =
    Uuid::from_u128(0x0000_2a35_0000_1000_8000_00805f9b34fb);

/// Identity of the characteristic a notification came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacteristicId {
    /// UUID of the owning service
    pub service: Uuid,
    /// UUID of the characteristic itself
    pub characteristic: Uuid,
}

impl CharacteristicId {
    pub fn new(service: Uuid, characteristic: Uuid) -> Self {
        Self {
            service,
            characteristic,
        }
    }
}

/// Measurement services understood by this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BleServiceType {
    Weight,
    BloodPressure,
}

impl BleServiceType {
    pub const ALL: [BleServiceType; 2] = [BleServiceType::Weight, BleServiceType::BloodPressure];

    pub fn service(&self) -> Uuid {
        match self {
            BleServiceType::Weight => WEIGHT_SCALE_SERVICE_UUID,
            BleServiceType::BloodPressure => BLOOD_PRESSURE_SERVICE_UUID,
        }
    }

    pub fn characteristic(&self) -> Uuid {
        match self {
            BleServiceType::Weight => WEIGHT_MEASUREMENT_UUID,
            BleServiceType::BloodPressure => BLOOD_PRESSURE_MEASUREMENT_UUID,
        }
    }

    /// The identity a decoder for this service answers to
    pub fn id(&self) -> CharacteristicId {
        CharacteristicId::new(self.service(), self.characteristic())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BleServiceType::Weight => "weight",
            BleServiceType::BloodPressure => "blood_pressure",
        }
    }

    /// Look up the service type that owns the given identity, if any
    pub fn from_id(id: &CharacteristicId) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.id() == *id)
    }
}
