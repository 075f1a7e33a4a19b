use log::{debug, info};
use std::io;

use crate::access;
use crate::{CodestreamError, MarkerSymbol, Segment, MARKER_SYMBOL_PLT};

const CONTINUATION: u8 = 0b1000_0000;
const GROUP: u8 = 0b0111_1111;

/// The length in bytes of one packet.
///
/// On disk a length is written as 7-bit groups, most significant group first,
/// with the top bit of every byte but the last set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketLength {
    pub value: u32,
}

impl PacketLength {
    pub fn new(value: u32) -> PacketLength {
        PacketLength { value }
    }

    /// Bytes taken by the encoded value, between 1 and 5.
    pub fn size(&self) -> u32 {
        let bits = 32 - self.value.leading_zeros();
        ((bits + 6) / 7).max(1)
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        for group in (0..self.size()).rev() {
            let chunk = ((self.value >> (7 * group)) as u8) & GROUP;
            if group == 0 {
                out.push(chunk);
            } else {
                out.push(chunk | CONTINUATION);
            }
        }
    }

    pub fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        let mut bytes = Vec::with_capacity(5);
        self.encode(&mut bytes);
        writer.write_all(&bytes)
    }
}

/// Decodes the packet lengths packed into `buffer[start..end]`.
///
/// Every value must use the fewest groups possible, otherwise re-encoding it
/// would change the size of the segment that holds it.
pub fn decode_packet_lengths(
    buffer: &[u8],
    start: usize,
    end: usize,
) -> Result<Vec<PacketLength>, CodestreamError> {
    let bytes = buffer.get(start..end).ok_or(access::BufferOverrun {
        offset: start,
        width: end.saturating_sub(start),
        length: buffer.len(),
    })?;

    let mut lengths = vec![];
    let mut value: u32 = 0;
    let mut pending = false;

    for (i, byte) in bytes.iter().enumerate() {
        let offset = start + i;
        let chunk = u32::from(byte & GROUP);

        if !pending && chunk == 0 && byte & CONTINUATION != 0 {
            return Err(CodestreamError::NonMinimalPacketLength { offset });
        }

        if byte & CONTINUATION == 0 {
            lengths.push(PacketLength::new(value + chunk));
            value = 0;
            pending = false;
        } else {
            value = (value + chunk)
                .checked_mul(128)
                .ok_or(CodestreamError::PacketLengthOverflow { offset })?;
            pending = true;
        }
    }

    if pending {
        return Err(CodestreamError::IncompletePacketLength { offset: end });
    }

    Ok(lengths)
}

// A.7.3
//
// Packet length, tile-part header (PLT)
//
// Function: A list of packet lengths in the tile-part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketLengthSegment {
    // Zplt: Index of this marker segment relative to all other PLT marker
    // segments present in the current header.
    pub index: u8,

    // Iplt: Length of a packet
    pub packet_lengths: Vec<PacketLength>,
}

impl PacketLengthSegment {
    /// Lplt, derived from the packet lengths held. `None` once the lengths
    /// no longer fit in one segment.
    pub fn length(&self) -> Option<u16> {
        u16::try_from(self.size() - 2).ok()
    }

    pub fn total_packet_bytes(&self) -> u64 {
        self.packet_lengths
            .iter()
            .map(|length| u64::from(length.value))
            .sum()
    }
}

impl Segment for PacketLengthSegment {
    fn marker(&self) -> MarkerSymbol {
        MARKER_SYMBOL_PLT
    }

    fn size(&self) -> u32 {
        5 + self
            .packet_lengths
            .iter()
            .map(PacketLength::size)
            .sum::<u32>()
    }

    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), CodestreamError> {
        let found = access::read_u16(buffer, offset)?;
        if found != MARKER_SYMBOL_PLT {
            return Err(CodestreamError::PltMismatch { found, offset });
        }
        info!("PLT start at byte offset {}", offset);

        let length = access::read_u16(buffer, offset + 2)?;
        if length < 3 {
            return Err(CodestreamError::InvalidSegmentLength {
                marker: MARKER_SYMBOL_PLT,
                length,
                offset,
            });
        }
        self.index = access::read_u8(buffer, offset + 4)?;
        self.packet_lengths =
            decode_packet_lengths(buffer, offset + 5, offset + 2 + length as usize)?;

        debug!(
            "PLT {} holds {} packet lengths",
            self.index,
            self.packet_lengths.len()
        );
        info!("PLT end at byte offset {}", offset + self.size() as usize);

        Ok(())
    }

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        let length = self.length().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("PLT {} exceeds the 65535 byte segment length", self.index),
            )
        })?;
        access::write_u16(writer, MARKER_SYMBOL_PLT)?;
        access::write_u16(writer, length)?;
        access::write_u8(writer, self.index)?;

        for packet_length in &self.packet_lengths {
            packet_length.save(writer)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(value: u32) -> Vec<u8> {
        let mut out = vec![];
        PacketLength::new(value).encode(&mut out);
        out
    }

    #[test]
    fn test_encode() {
        assert_eq!(encoded(0), vec![0x00]);
        assert_eq!(encoded(127), vec![0x7F]);
        assert_eq!(encoded(128), vec![0x81, 0x00]);
        assert_eq!(encoded(300), vec![0x82, 0x2C]);
        assert_eq!(encoded(u32::MAX), vec![0x8F, 0xFF, 0xFF, 0xFF, 0x7F]);
    }

    #[test]
    fn test_size_matches_encoding() {
        for value in [0, 1, 127, 128, 16_383, 16_384, 2_097_151, 2_097_152, u32::MAX] {
            let length = PacketLength::new(value);
            assert_eq!(length.size() as usize, encoded(value).len(), "{}", value);
        }
    }

    #[test]
    fn test_decode_inverts_encode() {
        let values = [0, 5, 127, 128, 300, 65_535, 1 << 21, u32::MAX];
        let mut bytes = vec![];
        for value in values {
            PacketLength::new(value).encode(&mut bytes);
        }

        let decoded = decode_packet_lengths(&bytes, 0, bytes.len()).unwrap();
        let decoded: Vec<u32> = decoded.iter().map(|length| length.value).collect();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_decode_incomplete() {
        let bytes = [0x05, 0x82];

        assert_eq!(
            decode_packet_lengths(&bytes, 0, bytes.len()),
            Err(CodestreamError::IncompletePacketLength { offset: 2 })
        );
    }

    #[test]
    fn test_decode_overflow() {
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F];

        assert_eq!(
            decode_packet_lengths(&bytes, 0, bytes.len()),
            Err(CodestreamError::PacketLengthOverflow { offset: 3 })
        );
    }

    #[test]
    fn test_decode_non_minimal() {
        let bytes = [0x01, 0x80, 0x05];

        assert_eq!(
            decode_packet_lengths(&bytes, 0, bytes.len()),
            Err(CodestreamError::NonMinimalPacketLength { offset: 1 })
        );
    }

    #[test]
    fn test_segment() {
        let buffer = [0xFF, 0x58, 0x00, 0x06, 0x00, 0x82, 0x2C, 0x40];
        let mut plt = PacketLengthSegment::default();
        plt.load(&buffer, 0).unwrap();

        assert_eq!(plt.index, 0);
        assert_eq!(
            plt.packet_lengths,
            vec![PacketLength::new(300), PacketLength::new(64)]
        );
        assert_eq!(plt.size() as usize, buffer.len());
        assert_eq!(plt.total_packet_bytes(), 364);

        let mut saved = vec![];
        plt.save(&mut saved).unwrap();
        assert_eq!(saved, buffer);
    }

    #[test]
    fn test_segment_length_follows_lengths() {
        let mut plt = PacketLengthSegment::default();
        assert_eq!(plt.size(), 5);
        assert_eq!(plt.length(), Some(3));

        plt.packet_lengths.push(PacketLength::new(200));
        assert_eq!(plt.size(), 7);

        let mut saved = vec![];
        plt.save(&mut saved).unwrap();
        assert_eq!(saved, vec![0xFF, 0x58, 0x00, 0x05, 0x00, 0x81, 0x48]);
    }

    #[test]
    fn test_segment_too_long() {
        // 21844 three-byte lengths fill Lplt exactly
        let mut plt = PacketLengthSegment {
            index: 7,
            packet_lengths: vec![PacketLength::new(20000); 21844],
        };
        assert_eq!(plt.length(), Some(65535));

        let mut saved = vec![];
        plt.save(&mut saved).unwrap();
        assert_eq!(saved.len(), 65537);

        plt.packet_lengths.push(PacketLength::new(1));
        assert_eq!(plt.length(), None);

        let mut saved = vec![];
        let error = plt.save(&mut saved).unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::InvalidInput);
        assert!(saved.is_empty());
    }
}
