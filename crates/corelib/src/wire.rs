//! Binary encoding used when endpoints travel inside proxies.
//!
//! All integers are little-endian. A size is one byte when below 255,
//! otherwise the byte `0xFF` followed by an `i32`. Strings are a size followed
//! by that many UTF-8 bytes. An encapsulation is an `i32` byte count (which
//! includes its own six header bytes), an encoding version and a body.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Encoding version written in encapsulation headers.
pub const ENCODING_1_1: (u8, u8) = (1, 1);

const ENCAPS_HEADER_LEN: usize = 6;

/// Growable output buffer.
#[derive(Debug, Default, Clone)]
pub struct OutputStream {
    buf: BytesMut,
}

impl OutputStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.put_u8(u8::from(v));
    }

    pub fn write_i16(&mut self, v: i16) {
        self.buf.put_i16_le(v);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.put_i32_le(v);
    }

    pub fn write_size(&mut self, size: usize) {
        if size < 255 {
            self.buf.put_u8(size as u8);
        } else {
            self.buf.put_u8(255);
            self.buf.put_i32_le(size as i32);
        }
    }

    pub fn write_string(&mut self, v: &str) {
        self.write_size(v.len());
        self.buf.put_slice(v.as_bytes());
    }

    /// Writes an encapsulation whose body is produced by `body`.
    pub fn write_encapsulation<F>(&mut self, body: F)
    where
        F: FnOnce(&mut OutputStream),
    {
        let mut inner = OutputStream::new();
        body(&mut inner);
        self.buf.put_i32_le((inner.len() + ENCAPS_HEADER_LEN) as i32);
        self.buf.put_u8(ENCODING_1_1.0);
        self.buf.put_u8(ENCODING_1_1.1);
        self.buf.put_slice(&inner.buf);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Cursor over a borrowed input buffer. Every read checks the remaining
/// length first and fails with [`Error::Decode`] instead of panicking.
#[derive(Debug, Clone)]
pub struct InputStream<'a> {
    buf: &'a [u8],
}

impl<'a> InputStream<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn need(&self, n: usize, what: &str) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(Error::decode(format!(
                "buffer too short reading {}: need {} bytes, have {}",
                what,
                n,
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.need(1, "byte")?;
        Ok(self.buf.get_u8())
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::decode(format!("invalid bool value {}", other))),
        }
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.need(2, "short")?;
        Ok(self.buf.get_i16_le())
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.need(4, "int")?;
        Ok(self.buf.get_i32_le())
    }

    pub fn read_size(&mut self) -> Result<usize> {
        let b = self.read_u8()?;
        if b < 255 {
            return Ok(usize::from(b));
        }
        let size = self.read_i32()?;
        usize::try_from(size).map_err(|_| Error::decode(format!("negative size {}", size)))
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_size()?;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| Error::decode(format!("invalid UTF-8 string: {}", e)))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.need(len, "bytes")?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    /// Reads an encapsulation header and returns a stream over its body.
    /// The outer stream is advanced past the whole encapsulation.
    pub fn read_encapsulation(&mut self) -> Result<InputStream<'a>> {
        let size = self.read_i32()?;
        let size = usize::try_from(size)
            .ok()
            .filter(|s| *s >= ENCAPS_HEADER_LEN)
            .ok_or_else(|| Error::decode(format!("invalid encapsulation size {}", size)))?;
        let major = self.read_u8()?;
        let minor = self.read_u8()?;
        if major != ENCODING_1_1.0 {
            return Err(Error::decode(format!("unsupported encoding {}.{}", major, minor)));
        }
        let body = self.read_bytes(size - ENCAPS_HEADER_LEN)?;
        Ok(InputStream::new(body))
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
