//! Display formatting for decoded measurements
//!
//! Formatting depends only on the [`FormatConfig`] passed in; nothing reads
//! the host locale.

use serde::{Deserialize, Serialize};

use crate::types::Measurement;

pub const LBS_PER_KG: f64 = 2.20462;

/// Regions that display body weight in pounds
const POUND_REGIONS: [&str; 3] = ["US", "LR", "MM"];

/// Unit used to display body weight
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightUnit {
    #[default]
    Kilograms,
    Pounds,
}

impl WeightUnit {
    pub fn suffix(&self) -> &'static str {
        match self {
            WeightUnit::Kilograms => "kg",
            WeightUnit::Pounds => "lbs",
        }
    }
}

/// Formatting preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatConfig {
    pub weight_unit: WeightUnit,
    pub decimal_separator: char,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            weight_unit: WeightUnit::Kilograms,
            decimal_separator: '.',
        }
    }
}

impl FormatConfig {
    /// Preferences for an ISO 3166 region code (e.g. "US", "DE")
    pub fn for_region(region: &str) -> Self {
        let region = region.trim().to_ascii_uppercase();
        let weight_unit = if POUND_REGIONS.contains(&region.as_str()) {
            WeightUnit::Pounds
        } else {
            WeightUnit::Kilograms
        };
        Self {
            weight_unit,
            ..Self::default()
        }
    }

    pub fn with_decimal_separator(mut self, separator: char) -> Self {
        self.decimal_separator = separator;
        self
    }
}

/// Formatted fields shown when a new measurement arrives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementDialog {
    pub measurement: Measurement,
    pub formatted_weight: Option<String>,
    pub formatted_systolic: Option<String>,
    pub formatted_diastolic: Option<String>,
    pub formatted_heart_rate: Option<String>,
}

/// Formats measurements according to a [`FormatConfig`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MeasurementFormatter {
    config: FormatConfig,
}

impl MeasurementFormatter {
    pub fn new(config: FormatConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FormatConfig {
        &self.config
    }

    /// Weight given in kilograms, converted to the configured unit
    pub fn weight(&self, kilograms: f64) -> String {
        let value = match self.config.weight_unit {
            WeightUnit::Kilograms => kilograms,
            WeightUnit::Pounds => kilograms * LBS_PER_KG,
        };
        format!(
            "{} {}",
            self.number(value, 2),
            self.config.weight_unit.suffix()
        )
    }

    pub fn systolic(&self, mmhg: f32) -> String {
        format!("{} mmHg", self.number(mmhg as f64, 0))
    }

    pub fn diastolic(&self, mmhg: f32) -> String {
        format!("{} mmHg", self.number(mmhg as f64, 0))
    }

    pub fn heart_rate(&self, bpm: f32) -> String {
        format!("{} bpm", self.number(bpm as f64, 0))
    }

    /// One-line summary, as shown next to a paired device
    pub fn summary(&self, measurement: &Measurement) -> String {
        match measurement {
            Measurement::Weight(w) => self.weight(w.weight),
            Measurement::BloodPressure(bp) => {
                format!("{} / {}", self.systolic(bp.systolic), self.diastolic(bp.diastolic))
            }
        }
    }

    pub fn dialog(&self, measurement: &Measurement) -> MeasurementDialog {
        match measurement {
            Measurement::Weight(w) => MeasurementDialog {
                measurement: measurement.clone(),
                formatted_weight: Some(self.weight(w.weight)),
                formatted_systolic: None,
                formatted_diastolic: None,
                formatted_heart_rate: None,
            },
            Measurement::BloodPressure(bp) => MeasurementDialog {
                measurement: measurement.clone(),
                formatted_weight: None,
                formatted_systolic: Some(self.systolic(bp.systolic)),
                formatted_diastolic: Some(self.diastolic(bp.diastolic)),
                formatted_heart_rate: Some(self.heart_rate(bp.pulse_rate)),
            },
        }
    }

    fn number(&self, value: f64, decimals: usize) -> String {
        // Ties round away from zero, not to even
        let scale = 10f64.powi(decimals as i32);
        let rounded = (value * scale).round() / scale;
        let formatted = format!("{rounded:.decimals$}");
        if self.config.decimal_separator == '.' {
            formatted
        } else {
            formatted.replace('.', &self.config.decimal_separator.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        BloodPressureFlags, BloodPressureMeasurement, MeasurementStatus, WeightFlags,
        WeightMeasurement,
    };

    fn weight(kg: f64) -> Measurement {
        Measurement::Weight(WeightMeasurement {
            flags: WeightFlags::default(),
            weight: kg,
            timestamp: None,
            user_id: None,
            bmi: None,
            height: None,
        })
    }

    fn blood_pressure() -> Measurement {
        Measurement::BloodPressure(BloodPressureMeasurement {
            flags: BloodPressureFlags::default(),
            systolic: 120.0,
            diastolic: 80.4,
            mean_arterial_pressure: 93.0,
            timestamp_year: 0,
            timestamp_month: 0,
            timestamp_day: 0,
            timestamp_hour: 0,
            timestamp_minute: 0,
            timestamp_second: 0,
            pulse_rate: 71.6,
            user_id: 0,
            measurement_status: MeasurementStatus::default(),
        })
    }

    #[test]
    fn test_region_selects_unit() {
        assert_eq!(FormatConfig::for_region("US").weight_unit, WeightUnit::Pounds);
        assert_eq!(FormatConfig::for_region("mm").weight_unit, WeightUnit::Pounds);
        assert_eq!(FormatConfig::for_region("DE").weight_unit, WeightUnit::Kilograms);
    }

    #[test]
    fn test_weight_kilograms() {
        let formatter = MeasurementFormatter::default();
        assert_eq!(formatter.weight(70.5), "70.50 kg");
    }

    #[test]
    fn test_weight_pounds() {
        let formatter = MeasurementFormatter::new(FormatConfig::for_region("US"));
        assert_eq!(formatter.weight(100.0), "220.46 lbs");
    }

    #[test]
    fn test_decimal_separator() {
        let formatter =
            MeasurementFormatter::new(FormatConfig::for_region("DE").with_decimal_separator(','));
        assert_eq!(formatter.weight(70.5), "70,50 kg");
    }

    #[test]
    fn test_half_values_round_up() {
        let formatter = MeasurementFormatter::default();
        assert_eq!(formatter.systolic(120.5), "121 mmHg");
        assert_eq!(formatter.diastolic(80.5), "81 mmHg");
        assert_eq!(formatter.heart_rate(72.5), "73 bpm");
        assert_eq!(formatter.weight(70.125), "70.13 kg");
    }

    #[test]
    fn test_summary() {
        let formatter = MeasurementFormatter::default();
        assert_eq!(formatter.summary(&weight(150.0)), "150.00 kg");
        assert_eq!(formatter.summary(&blood_pressure()), "120 mmHg / 80 mmHg");
    }

    #[test]
    fn test_dialog() {
        let formatter = MeasurementFormatter::default();

        let dialog = formatter.dialog(&blood_pressure());
        assert_eq!(dialog.formatted_weight, None);
        assert_eq!(dialog.formatted_systolic.as_deref(), Some("120 mmHg"));
        assert_eq!(dialog.formatted_diastolic.as_deref(), Some("80 mmHg"));
        assert_eq!(dialog.formatted_heart_rate.as_deref(), Some("72 bpm"));

        let dialog = formatter.dialog(&weight(82.0));
        assert_eq!(dialog.formatted_weight.as_deref(), Some("82.00 kg"));
        assert_eq!(dialog.formatted_heart_rate, None);
    }
}
