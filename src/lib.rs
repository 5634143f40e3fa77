//! ENGAGE-HF measurement decoder
//!
//! Turns Bluetooth Low Energy Weight Measurement and Blood Pressure Measurement
//! notifications into typed measurements, and those into clinical observation
//! records: characteristic identity → decoder → measurement → observations.
//!
//! ## Modules
//!
//! - **Decoders**: pure, stateless GATT payload decoders selected by characteristic
//! - **Observation**: maps measurements to LOINC-coded observation records
//! - **Display**: formats measurements for an explicit [`display::FormatConfig`]

pub mod characteristic;
pub mod decoders;
pub mod display;
pub mod error;
pub mod observation;
pub mod pipeline;
pub mod reader;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use characteristic::{BleServiceType, CharacteristicId};
pub use decoders::{BloodPressureDecoder, DecoderRegistry, MeasurementDecoder, WeightDecoder};
pub use error::{DecodeError, ObservationError};
pub use observation::{ObservationMapper, ObservationRecord, TimeProvider};
pub use pipeline::{decode_notification, Notification, NotificationProcessor};
pub use types::{BloodPressureMeasurement, Measurement, WeightMeasurement};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "engagehf-measurements";
