use crate::error::{VcuError, VcuResult};
use serde::Serialize;

pub const MAX_PAYLOAD_LEN: usize = 8;
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

/// A single bus message: identifier plus up to 8 payload bytes.
///
/// Bytes past `len` are always zero and never exposed through the
/// accessors, so a decoder cannot read past the declared length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Frame {
    id: u32,
    data: [u8; MAX_PAYLOAD_LEN],
    len: u8,
}

impl Frame {
    pub fn new(id: u32, payload: &[u8]) -> VcuResult<Self> {
        if id > MAX_EXTENDED_ID {
            return Err(VcuError::InvalidIdentifier { id });
        }
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(VcuError::PayloadTooLong { len: payload.len() });
        }

        let mut data = [0u8; MAX_PAYLOAD_LEN];
        data[..payload.len()].copy_from_slice(payload);

        Ok(Self {
            id,
            data,
            len: payload.len() as u8,
        })
    }

    /// Frame from a fixed array. Used for identifiers known at compile
    /// time; anything past 8 bytes is dropped.
    pub(crate) fn from_array<const N: usize>(id: u32, bytes: [u8; N]) -> Self {
        let len = N.min(MAX_PAYLOAD_LEN);
        let mut data = [0u8; MAX_PAYLOAD_LEN];
        data[..len].copy_from_slice(&bytes[..len]);

        Self {
            id: id & MAX_EXTENDED_ID,
            data,
            len: len as u8,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len()]
    }

    pub fn byte(&self, index: usize) -> Option<u8> {
        self.payload().get(index).copied()
    }

    /// Little-endian u16 starting at `offset`, `None` if it runs past `len`.
    pub fn u16_le(&self, offset: usize) -> Option<u16> {
        let lo = self.byte(offset)?;
        let hi = self.byte(offset + 1)?;
        Some(u16::from_le_bytes([lo, hi]))
    }
}

impl core::fmt::Display for Frame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:03X} [{}]", self.id, self.len)?;
        for b in self.payload() {
            write!(f, " {:02X}", b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_long_payload() {
        let err = Frame::new(0x100, &[0; 9]).unwrap_err();
        assert!(matches!(err, VcuError::PayloadTooLong { len: 9 }));
    }

    #[test]
    fn test_rejects_wide_identifier() {
        assert!(Frame::new(0x2000_0000, &[]).is_err());
        assert!(Frame::new(MAX_EXTENDED_ID, &[]).is_ok());
    }

    #[test]
    fn test_accessors_stop_at_len() {
        let frame = Frame::new(0x351, &[0x01, 0x02, 0x03]).unwrap();
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.payload(), &[0x01, 0x02, 0x03]);
        assert_eq!(frame.byte(2), Some(0x03));
        assert_eq!(frame.byte(3), None);
        assert_eq!(frame.u16_le(0), Some(0x0201));
        assert_eq!(frame.u16_le(2), None);
    }

    #[test]
    fn test_display_format() {
        let frame = Frame::new(0x43B, &[0x46, 0x00, 0x00]).unwrap();
        assert_eq!(frame.to_string(), "43B [3] 46 00 00");
    }
}
