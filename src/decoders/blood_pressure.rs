//! Blood Pressure Measurement (0x2A35) decoder

use crate::characteristic::{BleServiceType, CharacteristicId};
use crate::error::DecodeError;
use crate::reader::{ByteReader, RawDateTime};
use crate::types::{BloodPressureFlags, BloodPressureMeasurement, Measurement, MeasurementStatus};

use super::MeasurementDecoder;

const MMHG_PER_KPA: f32 = 7.50062;

/// Blood pressure cuff payload decoder
#[derive(Debug, Clone, Copy, Default)]
pub struct BloodPressureDecoder;

impl MeasurementDecoder for BloodPressureDecoder {
    fn recognizes(&self, id: &CharacteristicId) -> bool {
        *id == BleServiceType::BloodPressure.id()
    }

    fn try_decode(&self, id: &CharacteristicId, data: &[u8]) -> Result<Measurement, DecodeError> {
        if !self.recognizes(id) {
            return Err(DecodeError::UnrecognizedCharacteristic);
        }

        let mut reader = ByteReader::new(data);
        let flags = BloodPressureFlags::from_bits(reader.read_u8()?);

        let to_mmhg = |value: f32| {
            if flags.kpa_units {
                value * MMHG_PER_KPA
            } else {
                value
            }
        };

        let systolic = to_mmhg(reader.read_sfloat()?);
        let diastolic = to_mmhg(reader.read_sfloat()?);
        let mean_arterial_pressure = to_mmhg(reader.read_sfloat()?);

        let timestamp = if flags.timestamp_present {
            reader.read_date_time()?
        } else {
            RawDateTime::default()
        };

        let pulse_rate = if flags.pulse_rate_present {
            reader.read_sfloat()?
        } else {
            0.0
        };

        let user_id = if flags.user_id_present {
            reader.read_u8()?
        } else {
            0
        };

        let measurement_status = if flags.measurement_status_present {
            MeasurementStatus::from_bits(reader.read_u16()?)
        } else {
            MeasurementStatus::default()
        };

        Ok(Measurement::BloodPressure(BloodPressureMeasurement {
            flags,
            systolic,
            diastolic,
            mean_arterial_pressure,
            timestamp_year: timestamp.year,
            timestamp_month: timestamp.month,
            timestamp_day: timestamp.day,
            timestamp_hour: timestamp.hour,
            timestamp_minute: timestamp.minute,
            timestamp_second: timestamp.second,
            pulse_rate,
            user_id,
            measurement_status,
        }))
    }
}
