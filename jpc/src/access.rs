//! Big-endian primitives over a byte buffer and an output sink.
//!
//! Reads never advance a cursor: every call takes the offset to read from, so
//! independent reads of one buffer do not interfere with each other. A read
//! that would run past the end of the buffer fails with [`BufferOverrun`].

use std::error;
use std::fmt;
use std::io;

/// A read of `width` bytes at `offset` ran past the end of a buffer of
/// `length` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferOverrun {
    pub offset: usize,
    pub width: usize,
    pub length: usize,
}

impl error::Error for BufferOverrun {}
impl fmt::Display for BufferOverrun {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "reading {} bytes at byte offset {} overruns buffer of {} bytes",
            self.width, self.offset, self.length
        )
    }
}

fn read_array<const N: usize>(buffer: &[u8], offset: usize) -> Result<[u8; N], BufferOverrun> {
    offset
        .checked_add(N)
        .and_then(|end| buffer.get(offset..end))
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(BufferOverrun {
            offset,
            width: N,
            length: buffer.len(),
        })
}

pub fn read_u8(buffer: &[u8], offset: usize) -> Result<u8, BufferOverrun> {
    Ok(u8::from_be_bytes(read_array(buffer, offset)?))
}

pub fn read_u16(buffer: &[u8], offset: usize) -> Result<u16, BufferOverrun> {
    Ok(u16::from_be_bytes(read_array(buffer, offset)?))
}

pub fn read_u32(buffer: &[u8], offset: usize) -> Result<u32, BufferOverrun> {
    Ok(u32::from_be_bytes(read_array(buffer, offset)?))
}

pub fn read_u64(buffer: &[u8], offset: usize) -> Result<u64, BufferOverrun> {
    Ok(u64::from_be_bytes(read_array(buffer, offset)?))
}

/// Copies `buffer[start..end]`.
pub fn read_bytes(buffer: &[u8], start: usize, end: usize) -> Result<Vec<u8>, BufferOverrun> {
    buffer
        .get(start..end)
        .map(<[u8]>::to_vec)
        .ok_or(BufferOverrun {
            offset: start,
            width: end.saturating_sub(start),
            length: buffer.len(),
        })
}

pub fn verify_u8(buffer: &[u8], offset: usize, expected: u8) -> Result<bool, BufferOverrun> {
    Ok(read_u8(buffer, offset)? == expected)
}

pub fn verify_u16(buffer: &[u8], offset: usize, expected: u16) -> Result<bool, BufferOverrun> {
    Ok(read_u16(buffer, offset)? == expected)
}

pub fn verify_u32(buffer: &[u8], offset: usize, expected: u32) -> Result<bool, BufferOverrun> {
    Ok(read_u32(buffer, offset)? == expected)
}

pub fn verify_u64(buffer: &[u8], offset: usize, expected: u64) -> Result<bool, BufferOverrun> {
    Ok(read_u64(buffer, offset)? == expected)
}

pub fn write_u8<W: io::Write>(writer: &mut W, value: u8) -> io::Result<()> {
    writer.write_all(&value.to_be_bytes())
}

pub fn write_u16<W: io::Write>(writer: &mut W, value: u16) -> io::Result<()> {
    writer.write_all(&value.to_be_bytes())
}

pub fn write_u32<W: io::Write>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_be_bytes())
}

pub fn write_u64<W: io::Write>(writer: &mut W, value: u64) -> io::Result<()> {
    writer.write_all(&value.to_be_bytes())
}
