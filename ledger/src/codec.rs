//! Big-endian binary primitives shared by the transaction and block codecs.
//!
//! Strings are length-prefixed with a u32; integers are big-endian with
//! the widths fixed by the wire format.

use crate::error::LedgerError;

/// Append a u32 length prefix followed by the UTF-8 bytes.
pub fn write_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
}

/// Sequential reader over a wire buffer.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], LedgerError> {
        if self.remaining() < n {
            return Err(LedgerError::Codec(format!(
                "unexpected end of input: need {n} bytes, have {}",
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u32(&mut self) -> Result<u32, LedgerError> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().expect("4 bytes")))
    }

    pub fn read_u64(&mut self) -> Result<u64, LedgerError> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().expect("8 bytes")))
    }

    pub fn read_i64(&mut self) -> Result<i64, LedgerError> {
        Ok(i64::from_be_bytes(self.take(8)?.try_into().expect("8 bytes")))
    }

    pub fn read_bytes32(&mut self) -> Result<[u8; 32], LedgerError> {
        Ok(self.take(32)?.try_into().expect("32 bytes"))
    }

    pub fn read_string(&mut self) -> Result<String, LedgerError> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| LedgerError::Codec(format!("invalid UTF-8 string: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_roundtrip() {
        let mut buf = Vec::new();
        write_string(&mut buf, "héllo");
        let mut r = Reader::new(&buf);
        assert_eq!(r.read_string().unwrap(), "héllo");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn truncated_input_is_an_error() {
        let mut buf = Vec::new();
        write_string(&mut buf, "abcdef");
        let mut r = Reader::new(&buf[..buf.len() - 2]);
        assert!(r.read_string().is_err());
    }

    #[test]
    fn length_prefix_larger_than_input_is_an_error() {
        let buf = 1000u32.to_be_bytes().to_vec();
        let mut r = Reader::new(&buf);
        assert!(r.read_string().is_err());
    }
}
