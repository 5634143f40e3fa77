//! Measurement to clinical observation mapping
//!
//! A blood pressure reading yields a heart rate and a blood pressure
//! observation; a weight reading yields a single weight observation. Records
//! use LOINC codes and UCUM units so they can be stored as FHIR resources by
//! the caller.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ObservationError;
use crate::types::{BloodPressureMeasurement, Measurement, WeightMeasurement};

pub const LOINC_SYSTEM: &str = "http://loinc.org";
pub const UCUM_SYSTEM: &str = "http://unitsofmeasure.org";

/// Source of the current instant and UTC offset
pub trait TimeProvider {
    fn now(&self) -> DateTime<Utc>;
    fn current_offset(&self) -> FixedOffset;
}

/// Wall clock of the host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn current_offset(&self) -> FixedOffset {
        Local::now().offset().fix()
    }
}

/// Frozen clock, for replays and tests
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeProvider {
    pub now: DateTime<Utc>,
    pub offset: FixedOffset,
}

impl FixedTimeProvider {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self { now, offset }
    }

    /// Clock frozen at `now` with an offset given in seconds east of UTC
    pub fn with_offset_seconds(now: DateTime<Utc>, seconds: i32) -> Result<Self, ObservationError> {
        let offset =
            FixedOffset::east_opt(seconds).ok_or(ObservationError::InvalidOffset(seconds))?;
        Ok(Self::new(now, offset))
    }
}

impl TimeProvider for FixedTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn current_offset(&self) -> FixedOffset {
        self.offset
    }
}

/// Kind of observation produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    Weight,
    HeartRate,
    BloodPressure,
}

/// LOINC codes used by the records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loinc {
    Weight,
    HeartRate,
    BloodPressure,
    Systolic,
    Diastolic,
}

impl Loinc {
    pub fn code(&self) -> &'static str {
        match self {
            Loinc::Weight => "29463-7",
            Loinc::HeartRate => "8867-4",
            Loinc::BloodPressure => "85354-9",
            Loinc::Systolic => "8480-6",
            Loinc::Diastolic => "8462-4",
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            Loinc::Weight => "Body weight",
            Loinc::HeartRate => "Heart rate",
            Loinc::BloodPressure => "Blood pressure panel with all children optional",
            Loinc::Systolic => "Systolic blood pressure",
            Loinc::Diastolic => "Diastolic blood pressure",
        }
    }

    fn coding(&self) -> Coding {
        Coding {
            system: LOINC_SYSTEM.to_string(),
            code: self.code().to_string(),
            display: self.display().to_string(),
        }
    }
}

/// Coded concept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coding {
    pub system: String,
    pub code: String,
    pub display: String,
}

/// Numeric value with its UCUM unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    #[serde(with = "crate::types::non_finite")]
    pub value: f64,
    pub unit: String,
    pub system: String,
    pub code: String,
}

impl Quantity {
    fn new(value: f64, unit: &str, code: &str) -> Self {
        Self {
            value,
            unit: unit.to_string(),
            system: UCUM_SYSTEM.to_string(),
            code: code.to_string(),
        }
    }

    fn kilograms(value: f64) -> Self {
        Self::new(value, "kg", "kg")
    }

    fn beats_per_minute(value: f64) -> Self {
        Self::new(value, "beats/minute", "/min")
    }

    fn millimeters_of_mercury(value: f64) -> Self {
        Self::new(value, "mmHg", "mm[Hg]")
    }
}

/// Component of a panel observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationComponent {
    pub code: Coding,
    pub value: Quantity,
}

/// A single clinical observation derived from a measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    /// Random identifier assigned at mapping time
    pub id: Uuid,
    pub kind: ObservationKind,
    pub code: Coding,
    /// When the observation was taken, at the phone's offset
    pub effective: DateTime<FixedOffset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ObservationComponent>,
}

/// Maps decoded measurements to observation records
pub struct ObservationMapper<T: TimeProvider = SystemTimeProvider> {
    time_provider: T,
}

impl Default for ObservationMapper<SystemTimeProvider> {
    fn default() -> Self {
        Self::new(SystemTimeProvider)
    }
}

impl<T: TimeProvider> ObservationMapper<T> {
    pub fn new(time_provider: T) -> Self {
        Self { time_provider }
    }

    pub fn time_provider(&self) -> &T {
        &self.time_provider
    }

    /// Map a measurement to its observations
    pub fn map(&self, measurement: &Measurement) -> Vec<ObservationRecord> {
        match measurement {
            Measurement::BloodPressure(bp) => {
                let effective = self.blood_pressure_time(bp);
                vec![
                    heart_rate_record(bp, effective),
                    blood_pressure_record(bp, effective),
                ]
            }
            Measurement::Weight(w) => vec![self.weight_record(w)],
        }
    }

    /// Map a measurement and encode the records as a JSON array
    pub fn map_to_json(&self, measurement: &Measurement) -> Result<String, ObservationError> {
        Ok(serde_json::to_string(&self.map(measurement))?)
    }

    fn now(&self) -> DateTime<FixedOffset> {
        self.time_provider
            .now()
            .with_timezone(&self.time_provider.current_offset())
    }

    fn weight_record(&self, measurement: &WeightMeasurement) -> ObservationRecord {
        let effective = measurement
            .timestamp
            .and_then(|ts| self.at_current_offset(ts))
            .unwrap_or_else(|| self.now());

        ObservationRecord {
            id: Uuid::new_v4(),
            kind: ObservationKind::Weight,
            code: Loinc::Weight.coding(),
            effective,
            value: Some(Quantity::kilograms(measurement.weight)),
            components: Vec::new(),
        }
    }

    /// Effective time of a blood pressure reading
    ///
    /// Falls back to now when the device fields do not form a calendar date or
    /// lie in the future.
    pub fn blood_pressure_time(
        &self,
        measurement: &BloodPressureMeasurement,
    ) -> DateTime<FixedOffset> {
        let now = self.now();
        let raw = measurement.raw_date_time();

        let measured = NaiveDate::from_ymd_opt(raw.year as i32, raw.month as u32, raw.day as u32)
            .and_then(|date| {
                date.and_hms_opt(raw.hour as u32, raw.minute as u32, raw.second as u32)
            })
            .and_then(|ts| self.at_current_offset(ts));

        match measured {
            Some(time) if time <= now => time,
            Some(time) => {
                warn!("Blood pressure timestamp {} is in the future, using now", time);
                now
            }
            None => now,
        }
    }

    fn at_current_offset(&self, timestamp: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        timestamp
            .and_local_timezone(self.time_provider.current_offset())
            .single()
    }
}

fn heart_rate_record(
    measurement: &BloodPressureMeasurement,
    effective: DateTime<FixedOffset>,
) -> ObservationRecord {
    ObservationRecord {
        id: Uuid::new_v4(),
        kind: ObservationKind::HeartRate,
        code: Loinc::HeartRate.coding(),
        effective,
        // Whole beats per minute
        value: Some(Quantity::beats_per_minute(measurement.pulse_rate.trunc() as f64)),
        components: Vec::new(),
    }
}

fn blood_pressure_record(
    measurement: &BloodPressureMeasurement,
    effective: DateTime<FixedOffset>,
) -> ObservationRecord {
    ObservationRecord {
        id: Uuid::new_v4(),
        kind: ObservationKind::BloodPressure,
        code: Loinc::BloodPressure.coding(),
        effective,
        value: None,
        components: vec![
            ObservationComponent {
                code: Loinc::Systolic.coding(),
                value: Quantity::millimeters_of_mercury(measurement.systolic as f64),
            },
            ObservationComponent {
                code: Loinc::Diastolic.coding(),
                value: Quantity::millimeters_of_mercury(measurement.diastolic as f64),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BloodPressureFlags, MeasurementStatus, WeightFlags};
    use chrono::{Duration, TimeZone};

    fn fixed_clock() -> FixedTimeProvider {
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap();
        FixedTimeProvider::new(now, FixedOffset::east_opt(0).unwrap())
    }

    fn blood_pressure(year: u16, month: u8, day: u8, hour: u8, minute: u8) -> Measurement {
        Measurement::BloodPressure(BloodPressureMeasurement {
            flags: BloodPressureFlags {
                kpa_units: false,
                timestamp_present: true,
                pulse_rate_present: true,
                user_id_present: true,
                measurement_status_present: true,
            },
            systolic: 120.0,
            diastolic: 80.0,
            mean_arterial_pressure: 1.0,
            timestamp_year: year,
            timestamp_month: month,
            timestamp_day: day,
            timestamp_hour: hour,
            timestamp_minute: minute,
            timestamp_second: 0,
            pulse_rate: 100.0,
            user_id: 1,
            measurement_status: MeasurementStatus::default(),
        })
    }

    fn weight(weight: f64, timestamp: Option<NaiveDateTime>) -> Measurement {
        Measurement::Weight(WeightMeasurement {
            flags: WeightFlags::default(),
            weight,
            timestamp,
            user_id: None,
            bmi: None,
            height: None,
        })
    }

    #[test]
    fn test_weight_with_timestamp() {
        let mapper = ObservationMapper::new(fixed_clock());
        let ts = NaiveDate::from_ymd_opt(2025, 6, 30)
            .and_then(|d| d.and_hms_opt(8, 15, 0))
            .unwrap();

        let records = mapper.map(&weight(70.5, Some(ts)));

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.kind, ObservationKind::Weight);
        assert_eq!(record.code.code, "29463-7");
        assert_eq!(record.value.as_ref().unwrap().value, 70.5);
        assert_eq!(record.value.as_ref().unwrap().code, "kg");
        assert_eq!(record.effective.naive_local(), ts);
    }

    #[test]
    fn test_weight_without_timestamp_uses_now() {
        let clock = fixed_clock();
        let mapper = ObservationMapper::new(clock);

        let records = mapper.map(&weight(60.0, None));
        assert_eq!(records[0].effective, clock.now);
    }

    #[test]
    fn test_blood_pressure_valid_timestamp() {
        let mapper = ObservationMapper::new(fixed_clock());
        let records = mapper.map(&blood_pressure(2025, 6, 15, 10, 30));

        assert_eq!(records.len(), 2);
        let expected = Utc.with_ymd_and_hms(2025, 6, 15, 10, 30, 0).unwrap();

        let heart_rate = &records[0];
        assert_eq!(heart_rate.kind, ObservationKind::HeartRate);
        assert_eq!(heart_rate.effective, expected);
        assert_eq!(heart_rate.value.as_ref().unwrap().value, 100.0);

        let bp = &records[1];
        assert_eq!(bp.kind, ObservationKind::BloodPressure);
        assert_eq!(bp.effective, expected);
        assert_eq!(bp.components.len(), 2);
        assert_eq!(bp.components[0].code.code, "8480-6");
        assert_eq!(bp.components[0].value.value, 120.0);
        assert_eq!(bp.components[1].code.code, "8462-4");
        assert_eq!(bp.components[1].value.value, 80.0);
    }

    #[test]
    fn test_blood_pressure_invalid_timestamp_falls_back_to_now() {
        let clock = fixed_clock();
        let mapper = ObservationMapper::new(clock);

        let records = mapper.map(&blood_pressure(0, 0, 0, 0, 0));
        assert_eq!(records[0].effective, clock.now);
        assert_eq!(records[1].effective, clock.now);
    }

    #[test]
    fn test_blood_pressure_future_timestamp_falls_back_to_now() {
        let clock = fixed_clock();
        let mapper = ObservationMapper::new(clock);

        let records = mapper.map(&blood_pressure(2030, 1, 1, 0, 0));
        assert_eq!(records[1].effective, clock.now);
    }

    #[test]
    fn test_blood_pressure_timestamp_equal_to_now_is_kept() {
        let clock = fixed_clock();
        let mapper = ObservationMapper::new(clock);

        let mut measurement = blood_pressure(2025, 7, 1, 12, 0);
        let time = mapper.blood_pressure_time(measurement.as_blood_pressure().unwrap());
        assert_eq!(time, clock.now);

        // One second past now is already in the future
        if let Measurement::BloodPressure(bp) = &mut measurement {
            bp.timestamp_second = 1;
        }
        let late = clock.now + Duration::seconds(1);
        let time = mapper.blood_pressure_time(measurement.as_blood_pressure().unwrap());
        assert_ne!(time, late);
        assert_eq!(time, clock.now);
    }

    #[test]
    fn test_blood_pressure_device_time_just_before_now() {
        let now =
            Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap() + Duration::milliseconds(500);
        let clock = FixedTimeProvider::new(now, FixedOffset::east_opt(0).unwrap());
        let mapper = ObservationMapper::new(clock);

        let time = mapper.blood_pressure_time(
            blood_pressure(2025, 7, 1, 12, 0).as_blood_pressure().unwrap(),
        );
        assert_eq!(time, now - Duration::milliseconds(500));
    }

    #[test]
    fn test_non_finite_pulse_rate_still_maps() {
        let mut measurement = blood_pressure(2025, 6, 15, 10, 30);
        if let Measurement::BloodPressure(bp) = &mut measurement {
            bp.pulse_rate = f32::NAN;
        }
        let mapper = ObservationMapper::new(fixed_clock());

        let records = mapper.map(&measurement);
        assert_eq!(records.len(), 2);
        assert!(records[0].value.as_ref().unwrap().value.is_nan());

        let json = mapper.map_to_json(&measurement).unwrap();
        let parsed: Vec<ObservationRecord> = serde_json::from_str(&json).unwrap();
        assert!(parsed[0].value.as_ref().unwrap().value.is_nan());
        assert_eq!(parsed[1].components[0].value.value, 120.0);
    }

    #[test]
    fn test_timestamp_interpreted_at_current_offset() {
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap();
        let clock = FixedTimeProvider::with_offset_seconds(now, 2 * 3600).unwrap();
        let mapper = ObservationMapper::new(clock);

        let time = mapper.blood_pressure_time(
            blood_pressure(2025, 7, 1, 13, 0).as_blood_pressure().unwrap(),
        );
        // 13:00 at +02:00 is 11:00 UTC, one hour before now
        assert_eq!(time, now - Duration::hours(1));
        assert_eq!(time.offset().local_minus_utc(), 7200);
    }

    #[test]
    fn test_invalid_offset() {
        let now = Utc::now();
        assert!(matches!(
            FixedTimeProvider::with_offset_seconds(now, 100_000),
            Err(ObservationError::InvalidOffset(100_000))
        ));
    }

    #[test]
    fn test_records_serialize() {
        let mapper = ObservationMapper::new(fixed_clock());
        let json = mapper.map_to_json(&blood_pressure(2025, 6, 15, 10, 30)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value[0]["kind"], "heart_rate");
        assert_eq!(value[1]["code"]["system"], LOINC_SYSTEM);
        assert!(value[1].get("value").is_none());
        assert_eq!(value[1]["components"][0]["value"]["code"], "mm[Hg]");
    }
}
