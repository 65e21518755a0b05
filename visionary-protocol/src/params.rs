//! Binary CoLa parameter encoding.
//!
//! All multi-byte values are big-endian. Strings are either fixed-length
//! byte blocks or FlexStrings (u16 length prefix followed by the bytes).

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Builds a parameter block for a command.
#[derive(Debug, Default, Clone)]
pub struct ParameterWriter {
    buf: BytesMut,
}

impl ParameterWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unsigned 8-bit (USInt).
    pub fn usint(mut self, value: u8) -> Self {
        self.buf.put_u8(value);
        self
    }

    /// Unsigned 16-bit (UInt).
    pub fn uint(mut self, value: u16) -> Self {
        self.buf.put_u16(value);
        self
    }

    /// Unsigned 32-bit (UDInt).
    pub fn udint(mut self, value: u32) -> Self {
        self.buf.put_u32(value);
        self
    }

    /// Signed 8-bit (SInt).
    pub fn sint(mut self, value: i8) -> Self {
        self.buf.put_i8(value);
        self
    }

    /// Signed 16-bit (Int).
    pub fn int(mut self, value: i16) -> Self {
        self.buf.put_i16(value);
        self
    }

    /// Signed 32-bit (DInt).
    pub fn dint(mut self, value: i32) -> Self {
        self.buf.put_i32(value);
        self
    }

    /// 32-bit float (Real).
    pub fn real(mut self, value: f32) -> Self {
        self.buf.put_f32(value);
        self
    }

    /// 64-bit float (LReal).
    pub fn lreal(mut self, value: f64) -> Self {
        self.buf.put_f64(value);
        self
    }

    pub fn bool(mut self, value: bool) -> Self {
        self.buf.put_u8(u8::from(value));
        self
    }

    /// Length-prefixed string. Strings longer than `u16::MAX` are truncated.
    pub fn flex_string(mut self, value: &str) -> Self {
        let bytes = value.as_bytes();
        let len = bytes.len().min(u16::MAX as usize);
        self.buf.put_u16(len as u16);
        self.buf.put_slice(&bytes[..len]);
        self
    }

    /// Raw bytes without a length prefix.
    pub fn bytes(mut self, value: &[u8]) -> Self {
        self.buf.put_slice(value);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Reads typed values from an answer's parameter block.
#[derive(Debug, Clone)]
pub struct ParameterReader<'a> {
    buf: &'a [u8],
}

impl<'a> ParameterReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn ensure(&self, needed: usize) -> Result<(), ProtocolError> {
        if self.buf.remaining() < needed {
            return Err(ProtocolError::Truncated {
                what: "parameter",
                needed,
                available: self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn usint(&mut self) -> Result<u8, ProtocolError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn uint(&mut self) -> Result<u16, ProtocolError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    pub fn udint(&mut self) -> Result<u32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn sint(&mut self) -> Result<i8, ProtocolError> {
        self.ensure(1)?;
        Ok(self.buf.get_i8())
    }

    pub fn int(&mut self) -> Result<i16, ProtocolError> {
        self.ensure(2)?;
        Ok(self.buf.get_i16())
    }

    pub fn dint(&mut self) -> Result<i32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn real(&mut self) -> Result<f32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.buf.get_f32())
    }

    pub fn lreal(&mut self) -> Result<f64, ProtocolError> {
        self.ensure(8)?;
        Ok(self.buf.get_f64())
    }

    pub fn bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.usint()? != 0)
    }

    pub fn flex_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.uint()? as usize;
        let raw = self.fixed_bytes(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Reads exactly `len` raw bytes.
    pub fn fixed_bytes(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        self.ensure(len)?;
        let buf: &'a [u8] = self.buf;
        let (head, tail) = buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    /// Reads a fixed-size byte array.
    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.fixed_bytes(N)?);
        Ok(out)
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_layout() {
        let params = ParameterWriter::new()
            .usint(3)
            .uint(0x0102)
            .udint(0x0304_0506)
            .flex_string("ab")
            .finish();
        assert_eq!(
            &params[..],
            &[3, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x00, 0x02, b'a', b'b']
        );
    }

    #[test]
    fn test_reader_sequence() {
        let params = ParameterWriter::new()
            .sint(-2)
            .int(-300)
            .dint(-70_000)
            .real(1.5)
            .lreal(-0.25)
            .bool(true)
            .flex_string("Visionary-T Mini")
            .bytes(&[9, 8, 7])
            .finish();

        let mut reader = ParameterReader::new(&params);
        assert_eq!(reader.sint().unwrap(), -2);
        assert_eq!(reader.int().unwrap(), -300);
        assert_eq!(reader.dint().unwrap(), -70_000);
        assert_eq!(reader.real().unwrap(), 1.5);
        assert_eq!(reader.lreal().unwrap(), -0.25);
        assert!(reader.bool().unwrap());
        assert_eq!(reader.flex_string().unwrap(), "Visionary-T Mini");
        assert_eq!(reader.array::<3>().unwrap(), [9, 8, 7]);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_reader_underflow() {
        let mut reader = ParameterReader::new(&[0x00, 0x05, b'a']);
        let result = reader.flex_string();
        assert!(matches!(
            result,
            Err(ProtocolError::Truncated {
                needed: 5,
                available: 1,
                ..
            })
        ));

        let mut reader = ParameterReader::new(&[]);
        assert!(reader.usint().is_err());
    }

    #[test]
    fn test_flex_string_invalid_utf8() {
        let mut reader = ParameterReader::new(&[0x00, 0x01, 0xFF]);
        assert!(matches!(
            reader.flex_string(),
            Err(ProtocolError::InvalidUtf8)
        ));
    }
}
