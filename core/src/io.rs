// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!

Basic I/O helpers.

The binary formats handled by Rubbl are not all big-endian: some of them
record the byte order that was used when they were written, and the reader has
to honor it. The stream types in this module carry a runtime `ByteOrder` and
track how many bytes they have processed, so that decoding errors can report
where in the stream things went wrong.

 */

use byteorder::{BigEndian, ByteOrder as _, LittleEndian, WriteBytesExt};
use std::fmt;
use std::io;
use std::io::{Read, Write};
use std::result;
use std::str::FromStr;

use crate::errors::{Error, Result};

/// The byte order of the numeric data in a binary stream.
///
/// The string forms, `Little_Endian` and `Big_Endian`, are the ones recorded
/// in file headers.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ByteOrder {
    /// Least significant byte first.
    LittleEndian,

    /// Most significant byte first.
    BigEndian,
}

impl ByteOrder {
    /// Get the byte order of the machine we are running on.
    pub fn machine() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        }
    }

    /// Get the name of this byte order as it appears in file headers.
    pub fn as_str(&self) -> &'static str {
        match *self {
            ByteOrder::LittleEndian => "Little_Endian",
            ByteOrder::BigEndian => "Big_Endian",
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ByteOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Little_Endian" => Ok(ByteOrder::LittleEndian),
            "Big_Endian" => Ok(ByteOrder::BigEndian),
            _ => crate::err_msg!("unrecognized byte order \"{}\"", s),
        }
    }
}

/// A writer that encodes numbers and strings using a runtime-selected byte
/// order.
///
/// Strings are written as a 32-bit length followed by their bytes. Booleans
/// take up a single byte.
#[derive(Debug)]
pub struct EndianWriter<W: Write> {
    inner: W,
    order: ByteOrder,
    offset: u64,
}

impl<W: Write> EndianWriter<W> {
    /// Create a new EndianWriter that wraps the argument *inner*.
    pub fn new(inner: W, order: ByteOrder) -> Self {
        EndianWriter {
            inner,
            order,
            offset: 0,
        }
    }

    /// Consume this struct, returning the underlying inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Get the byte order used by this writer.
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Return how many bytes we have written since this struct was created.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Write raw bytes, without any length prefix.
    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write_all(buf)?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        self.inner.write_u8(if v { 1 } else { 0 })?;
        self.offset += 1;
        Ok(())
    }

    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        match self.order {
            ByteOrder::LittleEndian => self.inner.write_i32::<LittleEndian>(v)?,
            ByteOrder::BigEndian => self.inner.write_i32::<BigEndian>(v)?,
        }
        self.offset += 4;
        Ok(())
    }

    pub fn write_i64(&mut self, v: i64) -> Result<()> {
        match self.order {
            ByteOrder::LittleEndian => self.inner.write_i64::<LittleEndian>(v)?,
            ByteOrder::BigEndian => self.inner.write_i64::<BigEndian>(v)?,
        }
        self.offset += 8;
        Ok(())
    }

    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        match self.order {
            ByteOrder::LittleEndian => self.inner.write_f32::<LittleEndian>(v)?,
            ByteOrder::BigEndian => self.inner.write_f32::<BigEndian>(v)?,
        }
        self.offset += 4;
        Ok(())
    }

    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        match self.order {
            ByteOrder::LittleEndian => self.inner.write_f64::<LittleEndian>(v)?,
            ByteOrder::BigEndian => self.inner.write_f64::<BigEndian>(v)?,
        }
        self.offset += 8;
        Ok(())
    }

    /// Write a length or array dimension as a 32-bit integer.
    ///
    /// Lengths that do not fit are rejected rather than truncated.
    pub fn write_len(&mut self, n: usize) -> Result<()> {
        if n > i32::MAX as usize {
            return crate::err_msg!("length {} is too large for a binary stream", n);
        }

        self.write_i32(n as i32)
    }

    pub fn write_string(&mut self, s: &str) -> Result<()> {
        self.write_len(s.len())?;
        self.write_bytes(s.as_bytes())
    }
}

/// The reading counterpart of `EndianWriter`.
///
/// Any attempt to read past the end of the underlying stream results in an
/// I/O error of kind `UnexpectedEof`.
#[derive(Debug)]
pub struct EndianReader<R: Read> {
    inner: R,
    order: ByteOrder,
    offset: u64,
}

impl<R: Read> EndianReader<R> {
    /// Create a new EndianReader that wraps the argument *inner*.
    pub fn new(inner: R, order: ByteOrder) -> Self {
        EndianReader {
            inner,
            order,
            offset: 0,
        }
    }

    /// Consume this struct, returning the underlying inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Get the byte order used by this reader.
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Return how many bytes we have read since this struct was created.
    ///
    /// As with the writer, this is tracked internally and does not know
    /// anything about data consumed from the inner reader before this struct
    /// was created.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Fill *buf* completely, failing if the stream ends first.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }

        if !self.inner.eof_read_exact::<Error>(buf)? {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("unexpected end of stream at byte offset {}", self.offset),
            )
            .into());
        }

        self.offset += buf.len() as u64;
        Ok(())
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        let mut buf = [0u8; 1];
        self.read_bytes(&mut buf)?;
        Ok(buf[0] != 0)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(match self.order {
            ByteOrder::LittleEndian => LittleEndian::read_i32(&buf),
            ByteOrder::BigEndian => BigEndian::read_i32(&buf),
        })
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf)?;
        Ok(match self.order {
            ByteOrder::LittleEndian => LittleEndian::read_i64(&buf),
            ByteOrder::BigEndian => BigEndian::read_i64(&buf),
        })
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(match self.order {
            ByteOrder::LittleEndian => LittleEndian::read_f32(&buf),
            ByteOrder::BigEndian => BigEndian::read_f32(&buf),
        })
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf)?;
        Ok(match self.order {
            ByteOrder::LittleEndian => LittleEndian::read_f64(&buf),
            ByteOrder::BigEndian => BigEndian::read_f64(&buf),
        })
    }

    /// Read a 32-bit length or array dimension, rejecting negative values.
    pub fn read_len(&mut self) -> Result<usize> {
        let start = self.offset;
        let n = self.read_i32()?;

        if n < 0 {
            Err(Error::NegativeLength(n as i64, start))
        } else {
            Ok(n as usize)
        }
    }

    /// Read a length-prefixed UTF-8 string.
    ///
    /// The buffer grows in bounded chunks, so a corrupt length fails at the
    /// end of the stream instead of allocating all of it up front.
    pub fn read_string(&mut self) -> Result<String> {
        const CHUNK: usize = 65536;

        let n = self.read_len()?;
        let mut buf = Vec::with_capacity(n.min(CHUNK));

        while buf.len() < n {
            let start = buf.len();
            let end = n.min(start + CHUNK);
            buf.resize(end, 0);
            self.read_bytes(&mut buf[start..end])?;
        }

        Ok(String::from_utf8(buf)?)
    }
}

/// Extend the `Read` trait to provide functions for reading an exact number
/// of bytes from a stream and distinguishing whether EOF was encountered
/// immediately, versus whether it was encountered in the midst of the read.
pub trait EofReadExactExt: Read {
    /// Like `Read::read_exact`, except returns Ok(false) if EOF was
    /// encountered at the first read attempt. Returns Ok(true) if everything
    /// was OK and EOF has not yet been hit. Returns Err with an IoError with
    /// a "kind" of UnexpectedEof if EOF was encountered somewhere in the
    /// midst of the buffer.
    fn eof_read_exact<E>(&mut self, buf: &mut [u8]) -> result::Result<bool, E>
    where
        E: From<io::Error>;
}

impl<R: Read> EofReadExactExt for R {
    fn eof_read_exact<E>(&mut self, buf: &mut [u8]) -> result::Result<bool, E>
    where
        E: From<io::Error>,
    {
        let mut n_left = buf.len();
        let mut ofs = 0;

        while n_left > 0 {
            let n_read = match self.read(&mut buf[ofs..]) {
                Ok(n) => n,
                Err(e) => {
                    if e.kind() == io::ErrorKind::Interrupted {
                        continue;
                    }

                    return Err(e.into());
                }
            };

            if n_read == 0 {
                return if ofs == 0 {
                    Ok(false) // no more data at an expected stopping point
                } else {
                    Err(
                        io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected end of file")
                            .into(),
                    )
                };
            }

            ofs += n_read;
            n_left -= n_read;
        }

        Ok(true) // more data, we think
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_order_names() {
        assert_eq!(
            "Little_Endian".parse::<ByteOrder>().unwrap(),
            ByteOrder::LittleEndian
        );
        assert_eq!("Big_Endian".parse::<ByteOrder>().unwrap(), ByteOrder::BigEndian);
        assert!("Middle_Endian".parse::<ByteOrder>().is_err());
        assert_eq!(format!("{}", ByteOrder::BigEndian), "Big_Endian");
    }

    #[test]
    fn layout_follows_order() {
        let mut w = EndianWriter::new(Vec::new(), ByteOrder::BigEndian);
        w.write_i32(1).unwrap();
        w.write_string("ab").unwrap();
        assert_eq!(w.offset(), 10);
        assert_eq!(w.into_inner(), vec![0, 0, 0, 1, 0, 0, 0, 2, b'a', b'b']);

        let mut w = EndianWriter::new(Vec::new(), ByteOrder::LittleEndian);
        w.write_i32(1).unwrap();
        w.write_bool(true).unwrap();
        assert_eq!(w.into_inner(), vec![1, 0, 0, 0, 1]);
    }

    #[test]
    fn reads_back_mixed_values() {
        for &order in &[ByteOrder::LittleEndian, ByteOrder::BigEndian] {
            let mut w = EndianWriter::new(Vec::new(), order);
            w.write_i64(-5_000_000_000).unwrap();
            w.write_f32(1.5).unwrap();
            w.write_f64(-2.25).unwrap();
            w.write_bool(false).unwrap();
            w.write_string("DV01").unwrap();
            let buf = w.into_inner();

            let mut r = EndianReader::new(&buf[..], order);
            assert_eq!(r.read_i64().unwrap(), -5_000_000_000);
            assert_eq!(r.read_f32().unwrap(), 1.5);
            assert_eq!(r.read_f64().unwrap(), -2.25);
            assert!(!r.read_bool().unwrap());
            assert_eq!(r.read_string().unwrap(), "DV01");
            assert_eq!(r.offset(), buf.len() as u64);
        }
    }

    #[test]
    fn truncation_is_an_error() {
        let buf = [0u8, 0, 0, 8, b'x'];
        let mut r = EndianReader::new(&buf[..], ByteOrder::BigEndian);

        match r.read_string() {
            Err(Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn huge_string_lengths_fail_at_end_of_stream() {
        let mut buf = i32::MAX.to_le_bytes().to_vec();
        buf.extend_from_slice(b"abc");
        let mut r = EndianReader::new(&buf[..], ByteOrder::LittleEndian);

        match r.read_string() {
            Err(Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn long_strings_span_chunks() {
        let s = "DV".repeat(70_000);
        let mut w = EndianWriter::new(Vec::new(), ByteOrder::BigEndian);
        w.write_string(&s).unwrap();
        let buf = w.into_inner();

        let mut r = EndianReader::new(&buf[..], ByteOrder::BigEndian);
        assert_eq!(r.read_string().unwrap(), s);
        assert_eq!(r.offset(), buf.len() as u64);
    }

    #[test]
    fn negative_lengths_are_rejected() {
        let buf = (-3i32).to_be_bytes();
        let mut r = EndianReader::new(&buf[..], ByteOrder::BigEndian);

        match r.read_len() {
            Err(Error::NegativeLength(-3, 0)) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }
}
