//! Bounds-checked little-endian reader over characteristic payloads

use crate::error::DecodeError;

/// SFLOAT reserved mantissa values (NaN, NRes, +INF, -INF, reserved)
const SFLOAT_NAN: i16 = 0x07FF;
const SFLOAT_NRES: i16 = 0x0800;
const SFLOAT_POSITIVE_INFINITY: i16 = 0x07FE;
const SFLOAT_NEGATIVE_INFINITY: i16 = 0x0802;
const SFLOAT_RESERVED: i16 = 0x0801;

/// Broken-down date and time as sent by the device
///
/// Fields are taken verbatim from the wire; a zero field means "not known"
/// and the value may not form a valid calendar date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawDateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// Cursor advancing through a payload in field order
pub struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(DecodeError::Truncated {
                offset: self.offset,
                needed: len,
                available: self.remaining(),
            })?;
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read an IEEE-11073 16-bit SFLOAT
    pub fn read_sfloat(&mut self) -> Result<f32, DecodeError> {
        Ok(sfloat_to_f32(self.read_u16()?))
    }

    /// Read the 7-byte GATT Date Time field
    pub fn read_date_time(&mut self) -> Result<RawDateTime, DecodeError> {
        let year = self.read_u16()?;
        let bytes = self.take(5)?;
        Ok(RawDateTime {
            year,
            month: bytes[0],
            day: bytes[1],
            hour: bytes[2],
            minute: bytes[3],
            second: bytes[4],
        })
    }
}

/// Convert a raw SFLOAT (4-bit exponent, 12-bit mantissa, both signed)
///
/// Reserved mantissas map to non-finite values: NaN, NRes and the reserved
/// code give NaN, the infinities keep their sign.
pub fn sfloat_to_f32(raw: u16) -> f32 {
    let mut mantissa = (raw & 0x0FFF) as i16;
    let mut exponent = (raw >> 12) as i8;

    match mantissa {
        SFLOAT_POSITIVE_INFINITY => return f32::INFINITY,
        SFLOAT_NEGATIVE_INFINITY => return f32::NEG_INFINITY,
        SFLOAT_NAN | SFLOAT_NRES | SFLOAT_RESERVED => return f32::NAN,
        _ => {}
    }

    if mantissa >= 0x0800 {
        mantissa -= 0x1000;
    }
    if exponent >= 0x08 {
        exponent -= 0x10;
    }

    mantissa as f32 * 10f32.powi(exponent as i32)
}
