//! Core measurement types
//!
//! This module defines the values produced by the decoders. A measurement is
//! created fresh for each notification payload and never mutated afterwards.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::characteristic::BleServiceType;
use crate::reader::RawDateTime;

/// Decoded measurement, one variant per supported characteristic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Measurement {
    Weight(WeightMeasurement),
    BloodPressure(BloodPressureMeasurement),
}

impl Measurement {
    /// Service this measurement was decoded from
    pub fn kind(&self) -> BleServiceType {
        match self {
            Measurement::Weight(_) => BleServiceType::Weight,
            Measurement::BloodPressure(_) => BleServiceType::BloodPressure,
        }
    }

    pub fn as_weight(&self) -> Option<&WeightMeasurement> {
        match self {
            Measurement::Weight(w) => Some(w),
            Measurement::BloodPressure(_) => None,
        }
    }

    pub fn as_blood_pressure(&self) -> Option<&BloodPressureMeasurement> {
        match self {
            Measurement::BloodPressure(bp) => Some(bp),
            Measurement::Weight(_) => None,
        }
    }
}

/// Optional sections present in a weight payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightFlags {
    /// Weight and height were sent in imperial units (lb, in)
    pub imperial_units: bool,
    pub timestamp_present: bool,
    pub user_id_present: bool,
    /// BMI and height follow the user id
    pub bmi_and_height_present: bool,
}

impl WeightFlags {
    const UNITS: u8 = 0b0000_0001;
    const TIMESTAMP: u8 = 0b0000_0010;
    const USER_ID: u8 = 0b0000_0100;
    const BMI_AND_HEIGHT: u8 = 0b0000_1000;

    /// Decode the flags byte; reserved bits are ignored
    pub fn from_bits(bits: u8) -> Self {
        Self {
            imperial_units: bits & Self::UNITS != 0,
            timestamp_present: bits & Self::TIMESTAMP != 0,
            user_id_present: bits & Self::USER_ID != 0,
            bmi_and_height_present: bits & Self::BMI_AND_HEIGHT != 0,
        }
    }
}

/// Weight scale reading, always normalized to SI units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightMeasurement {
    /// Flags as found on the wire
    pub flags: WeightFlags,
    /// Body weight (kg)
    pub weight: f64,
    /// Device wall-clock time of the reading, if sent and valid
    pub timestamp: Option<NaiveDateTime>,
    /// Device user index
    pub user_id: Option<u8>,
    /// Body mass index (kg/m²)
    pub bmi: Option<f64>,
    /// Height (m)
    pub height: Option<f64>,
}

/// Optional sections present in a blood pressure payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodPressureFlags {
    /// Pressures were sent in kPa rather than mmHg
    pub kpa_units: bool,
    pub timestamp_present: bool,
    pub pulse_rate_present: bool,
    pub user_id_present: bool,
    pub measurement_status_present: bool,
}

impl BloodPressureFlags {
    const UNITS: u8 = 0b0000_0001;
    const TIMESTAMP: u8 = 0b0000_0010;
    const PULSE_RATE: u8 = 0b0000_0100;
    const USER_ID: u8 = 0b0000_1000;
    const MEASUREMENT_STATUS: u8 = 0b0001_0000;

    /// Decode the flags byte; reserved bits are ignored
    pub fn from_bits(bits: u8) -> Self {
        Self {
            kpa_units: bits & Self::UNITS != 0,
            timestamp_present: bits & Self::TIMESTAMP != 0,
            pulse_rate_present: bits & Self::PULSE_RATE != 0,
            user_id_present: bits & Self::USER_ID != 0,
            measurement_status_present: bits & Self::MEASUREMENT_STATUS != 0,
        }
    }
}

/// Pulse rate relative to the cuff's configured limits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PulseRateRange {
    #[default]
    WithinRange,
    ExceedsUpperLimit,
    BelowLowerLimit,
    Reserved,
}

impl PulseRateRange {
    fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0 => PulseRateRange::WithinRange,
            1 => PulseRateRange::ExceedsUpperLimit,
            2 => PulseRateRange::BelowLowerLimit,
            _ => PulseRateRange::Reserved,
        }
    }
}

/// Device-reported measurement quality conditions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementStatus {
    pub body_movement_detected: bool,
    /// Cuff was too loose
    pub cuff_fit_detected: bool,
    pub irregular_pulse_detected: bool,
    pub pulse_rate_range: PulseRateRange,
    /// Measurement position was improper
    pub measurement_position_detected: bool,
}

impl MeasurementStatus {
    pub fn from_bits(bits: u16) -> Self {
        Self {
            body_movement_detected: bits & 0x0001 != 0,
            cuff_fit_detected: bits & 0x0002 != 0,
            irregular_pulse_detected: bits & 0x0004 != 0,
            pulse_rate_range: PulseRateRange::from_bits(bits >> 3),
            measurement_position_detected: bits & 0x0020 != 0,
        }
    }
}

/// Blood pressure cuff reading
///
/// Pressures are always in mmHg. Timestamp fields are the device's broken-down
/// wall clock; absent fields are zero and the whole may not form a valid date.
/// Pressures and pulse rate are NaN or infinite when the device reported an
/// SFLOAT special value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodPressureMeasurement {
    /// Flags as found on the wire
    pub flags: BloodPressureFlags,
    /// Systolic pressure (mmHg)
    #[serde(with = "non_finite")]
    pub systolic: f32,
    /// Diastolic pressure (mmHg)
    #[serde(with = "non_finite")]
    pub diastolic: f32,
    /// Mean arterial pressure (mmHg)
    #[serde(with = "non_finite")]
    pub mean_arterial_pressure: f32,
    pub timestamp_year: u16,
    pub timestamp_month: u8,
    pub timestamp_day: u8,
    pub timestamp_hour: u8,
    pub timestamp_minute: u8,
    pub timestamp_second: u8,
    /// Pulse rate (beats per minute)
    #[serde(with = "non_finite")]
    pub pulse_rate: f32,
    pub user_id: u8,
    pub measurement_status: MeasurementStatus,
}

impl BloodPressureMeasurement {
    pub fn raw_date_time(&self) -> RawDateTime {
        RawDateTime {
            year: self.timestamp_year,
            month: self.timestamp_month,
            day: self.timestamp_day,
            hour: self.timestamp_hour,
            minute: self.timestamp_minute,
            second: self.timestamp_second,
        }
    }
}

/// Serde support for float fields that may hold NaN or infinity
///
/// JSON has no representation for non-finite numbers: they are written as
/// `null`, and `null` reads back as NaN.
pub(crate) mod non_finite {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub trait Float: Copy {
        const NAN: Self;
        fn finite(self) -> bool;
    }

    impl Float for f32 {
        const NAN: Self = f32::NAN;

        fn finite(self) -> bool {
            self.is_finite()
        }
    }

    impl Float for f64 {
        const NAN: Self = f64::NAN;

        fn finite(self) -> bool {
            self.is_finite()
        }
    }

    pub fn serialize<F, S>(value: &F, serializer: S) -> Result<S::Ok, S::Error>
    where
        F: Float + Serialize,
        S: Serializer,
    {
        if value.finite() {
            value.serialize(serializer)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, F, D>(deserializer: D) -> Result<F, D::Error>
    where
        F: Float + Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Ok(Option::<F>::deserialize(deserializer)?.unwrap_or(F::NAN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_flags_ignore_reserved_bits() {
        assert_eq!(WeightFlags::from_bits(0b1111_0001), WeightFlags::from_bits(0b0000_0001));
        assert!(WeightFlags::from_bits(0b0000_1000).bmi_and_height_present);
    }

    #[test]
    fn test_measurement_status_bits() {
        let status = MeasurementStatus::from_bits(0b0010_1101);

        assert!(status.body_movement_detected);
        assert!(!status.cuff_fit_detected);
        assert!(status.irregular_pulse_detected);
        assert_eq!(status.pulse_rate_range, PulseRateRange::ExceedsUpperLimit);
        assert!(status.measurement_position_detected);
    }

    #[test]
    fn test_serialize_tagged_measurement() {
        let measurement = Measurement::Weight(WeightMeasurement {
            flags: WeightFlags::default(),
            weight: 70.5,
            timestamp: None,
            user_id: None,
            bmi: None,
            height: None,
        });

        let json = serde_json::to_value(&measurement).unwrap();
        assert_eq!(json["type"], "weight");
        assert_eq!(json["weight"], 70.5);
        assert_eq!(measurement.kind(), BleServiceType::Weight);
    }

    #[test]
    fn test_non_finite_pressure_round_trips_as_null() {
        let measurement = Measurement::BloodPressure(BloodPressureMeasurement {
            flags: BloodPressureFlags::from_bits(0b0000_0100),
            systolic: 120.0,
            diastolic: 80.0,
            mean_arterial_pressure: f32::NAN,
            timestamp_year: 0,
            timestamp_month: 0,
            timestamp_day: 0,
            timestamp_hour: 0,
            timestamp_minute: 0,
            timestamp_second: 0,
            pulse_rate: f32::INFINITY,
            user_id: 0,
            measurement_status: MeasurementStatus::default(),
        });

        let json = serde_json::to_value(&measurement).unwrap();
        assert!(json["mean_arterial_pressure"].is_null());
        assert!(json["pulse_rate"].is_null());
        assert_eq!(json["systolic"], 120.0);

        let parsed: Measurement = serde_json::from_value(json).unwrap();
        let bp = parsed.as_blood_pressure().unwrap();
        assert_eq!(bp.systolic, 120.0);
        assert_eq!(bp.diastolic, 80.0);
        assert!(bp.mean_arterial_pressure.is_nan());
        assert!(bp.pulse_rate.is_nan());
    }
}
