//! Weight Measurement (0x2A9D) decoder

use chrono::NaiveDate;

use crate::characteristic::{BleServiceType, CharacteristicId};
use crate::error::DecodeError;
use crate::reader::{ByteReader, RawDateTime};
use crate::types::{Measurement, WeightFlags, WeightMeasurement};

use super::MeasurementDecoder;

/// Weight resolution in SI units (kg per unit)
const KG_RESOLUTION: f64 = 0.005;
/// Weight resolution in imperial units (lb per unit)
const LB_RESOLUTION: f64 = 0.01;
const KG_PER_LB: f64 = 0.453592;

const BMI_RESOLUTION: f64 = 0.1;
/// Height resolution in SI units (m per unit)
const METER_RESOLUTION: f64 = 0.001;
/// Height resolution in imperial units (in per unit)
const INCH_RESOLUTION: f64 = 0.1;
const METERS_PER_INCH: f64 = 0.0254;

/// Weight scale payload decoder
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightDecoder;

impl MeasurementDecoder for WeightDecoder {
    fn recognizes(&self, id: &CharacteristicId) -> bool {
        *id == BleServiceType::Weight.id()
    }

    fn try_decode(&self, id: &CharacteristicId, data: &[u8]) -> Result<Measurement, DecodeError> {
        if !self.recognizes(id) {
            return Err(DecodeError::UnrecognizedCharacteristic);
        }

        let mut reader = ByteReader::new(data);
        let flags = WeightFlags::from_bits(reader.read_u8()?);

        let raw_weight = reader.read_u16()? as f64;
        let weight = if flags.imperial_units {
            raw_weight * LB_RESOLUTION * KG_PER_LB
        } else {
            raw_weight * KG_RESOLUTION
        };

        let timestamp = if flags.timestamp_present {
            to_naive(reader.read_date_time()?)
        } else {
            None
        };

        let user_id = if flags.user_id_present {
            Some(reader.read_u8()?)
        } else {
            None
        };

        let (bmi, height) = if flags.bmi_and_height_present {
            let bmi = reader.read_u16()? as f64 * BMI_RESOLUTION;
            let raw_height = reader.read_u16()? as f64;
            let height = if flags.imperial_units {
                raw_height * INCH_RESOLUTION * METERS_PER_INCH
            } else {
                raw_height * METER_RESOLUTION
            };
            (Some(bmi), Some(height))
        } else {
            (None, None)
        };

        Ok(Measurement::Weight(WeightMeasurement {
            flags,
            weight,
            timestamp,
            user_id,
            bmi,
            height,
        }))
    }
}

/// A weight timestamp that is not a real calendar date is dropped
fn to_naive(raw: RawDateTime) -> Option<chrono::NaiveDateTime> {
    NaiveDate::from_ymd_opt(raw.year as i32, raw.month as u32, raw.day as u32)?.and_hms_opt(
        raw.hour as u32,
        raw.minute as u32,
        raw.second as u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characteristic::WEIGHT_SCALE_SERVICE_UUID;
    use uuid::Uuid;

    fn weight_id() -> CharacteristicId {
        BleServiceType::Weight.id()
    }

    fn decode_weight(data: &[u8]) -> WeightMeasurement {
        match WeightDecoder.decode(&weight_id(), data) {
            Some(Measurement::Weight(w)) => w,
            other => panic!("expected weight measurement, got {other:?}"),
        }
    }

    #[test]
    fn test_recognizes_weight_characteristic() {
        assert!(WeightDecoder.recognizes(&weight_id()));
    }

    #[test]
    fn test_does_not_recognize_unknown_characteristic() {
        let id = CharacteristicId::new(WEIGHT_SCALE_SERVICE_UUID, Uuid::new_v4());
        assert!(!WeightDecoder.recognizes(&id));
        assert_eq!(WeightDecoder.decode(&id, &[0x00, 0x30, 0x75]), None);
    }

    #[test]
    fn test_kg_payload() {
        // 30000 * 0.005 = 150.0 kg
        let weight = decode_weight(&[0b0000_0000, 0x30, 0x75]);
        assert_eq!(weight.weight, 150.0);
        assert!(!weight.flags.imperial_units);
        assert_eq!(weight.timestamp, None);
        assert_eq!(weight.user_id, None);
    }

    #[test]
    fn test_lb_payload_converted_to_kg() {
        // 30000 * 0.01 = 300.0 lb * 0.453592 = 136.0776 kg
        let weight = decode_weight(&[0b0000_0001, 0x30, 0x75]);
        assert_eq!(weight.weight, 136.0776);
        assert!(weight.flags.imperial_units);
    }

    #[test]
    fn test_too_short_payload() {
        assert_eq!(WeightDecoder.decode(&weight_id(), &[]), None);
        assert_eq!(WeightDecoder.decode(&weight_id(), &[0x00]), None);
        assert_eq!(WeightDecoder.decode(&weight_id(), &[0x00, 0x30]), None);
    }

    #[test]
    fn test_all_optional_sections() {
        let data = [
            0b0000_1110, // timestamp, user id, BMI and height
            0x30, 0x75, // 150.0 kg
            0xE8, 0x07, 3, 14, 7, 45, 30, // 2024-03-14 07:45:30
            0x02, // user 2
            0xF5, 0x00, // BMI 24.5
            0xB8, 0x06, // 1720 * 0.001 = 1.72 m
        ];
        let weight = decode_weight(&data);

        assert_eq!(weight.weight, 150.0);
        assert_eq!(
            weight.timestamp,
            NaiveDate::from_ymd_opt(2024, 3, 14).and_then(|d| d.and_hms_opt(7, 45, 30))
        );
        assert_eq!(weight.user_id, Some(2));
        assert!((weight.bmi.unwrap() - 24.5).abs() < 1e-9);
        assert!((weight.height.unwrap() - 1.72).abs() < 1e-9);
    }

    #[test]
    fn test_user_id_without_timestamp() {
        let weight = decode_weight(&[0b0000_0100, 0x30, 0x75, 0x07]);
        assert_eq!(weight.timestamp, None);
        assert_eq!(weight.user_id, Some(7));
    }

    #[test]
    fn test_imperial_height() {
        // 690 * 0.1 = 69.0 in = 1.7526 m
        let weight = decode_weight(&[0b0000_1001, 0x30, 0x75, 0xF5, 0x00, 0xB2, 0x02]);
        assert!((weight.height.unwrap() - 1.7526).abs() < 1e-9);
    }

    #[test]
    fn test_flag_claims_missing_section() {
        // Timestamp flagged but only 3 of 7 bytes present
        assert_eq!(
            WeightDecoder.decode(&weight_id(), &[0b0000_0010, 0x30, 0x75, 0xE8, 0x07, 3]),
            None
        );
        // BMI flagged but height missing
        assert_eq!(
            WeightDecoder.decode(&weight_id(), &[0b0000_1000, 0x30, 0x75, 0xF5, 0x00]),
            None
        );
    }

    #[test]
    fn test_invalid_timestamp_is_dropped() {
        let weight = decode_weight(&[0b0000_0010, 0x30, 0x75, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(weight.timestamp, None);
        assert!(weight.flags.timestamp_present);
    }

    #[test]
    fn test_reserved_flag_bits_ignored() {
        let plain = decode_weight(&[0b0000_0000, 0x30, 0x75]);
        let reserved = decode_weight(&[0b1111_0000, 0x30, 0x75]);
        assert_eq!(plain, reserved);
    }

    #[test]
    fn test_decode_is_idempotent() {
        let data = [0b0000_0101, 0x10, 0x27, 0x01];
        assert_eq!(
            WeightDecoder.decode(&weight_id(), &data),
            WeightDecoder.decode(&weight_id(), &data)
        );
    }
}
