use log::{debug, info, warn};
use std::io;

use crate::access;
use crate::{
    CodestreamError, MarkerSegment, MarkerSymbol, Segment, MARKER_SYMBOL_SOD, MARKER_SYMBOL_SOT,
};

// Lsot: fixed length of the SOT marker segment.
const START_OF_TILE_LENGTH: u16 = 10;

// A.4.2
//
// Start of tile-part (SOT), the tile-part header that follows it and the
// bit stream up to the next tile-part or EOC.
//
// Psot is not kept; it is derived from the rest of the tile-part on save so
// that edited tile-parts stay consistent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TilePart {
    // Isot: Tile index. This number refers to the tiles in raster order
    // starting at the number 0.
    pub tile_index: u16,

    // TPsot: Tile-part index.
    pub tile_part_index: u8,

    // TNsot: Number of tile-parts of a tile in the codestream, 0 if not
    // specified in this tile-part.
    pub no_tile_parts: u8,

    // Marker segments of the tile-part header, in codestream order.
    pub segments: Vec<MarkerSegment>,

    // SOD marker and the packet data following it.
    pub raw: Vec<u8>,
}

impl TilePart {
    // Psot: Length, in bytes, from the beginning of the first byte of this
    // SOT marker segment of the tile-part to the end of the data of that
    // tile-part.
    pub fn tile_part_length(&self) -> u32 {
        self.size()
    }

    /// Drops the tile-part header segments, leaving SOT and the bit stream.
    pub fn clear_segments(&mut self) {
        self.segments.clear();
    }
}

impl Segment for TilePart {
    fn marker(&self) -> MarkerSymbol {
        MARKER_SYMBOL_SOT
    }

    fn size(&self) -> u32 {
        12 + self.segments.iter().map(Segment::size).sum::<u32>() + self.raw.len() as u32
    }

    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), CodestreamError> {
        let found = access::read_u16(buffer, offset)?;
        if found != MARKER_SYMBOL_SOT {
            return Err(CodestreamError::SotMismatch { found, offset });
        }
        info!("SOT start at byte offset {}", offset);

        let length = access::read_u16(buffer, offset + 2)?;
        if length != START_OF_TILE_LENGTH {
            return Err(CodestreamError::LsotMismatch {
                found: length,
                offset: offset + 2,
            });
        }

        self.tile_index = access::read_u16(buffer, offset + 4)?;
        let tile_part_length = access::read_u32(buffer, offset + 6)?;
        self.tile_part_index = access::read_u8(buffer, offset + 10)?;
        self.no_tile_parts = access::read_u8(buffer, offset + 11)?;
        debug!(
            "Tile {} part {} of {}, Psot {}",
            self.tile_index, self.tile_part_index, self.no_tile_parts, tile_part_length
        );

        self.segments.clear();
        let mut index = offset + 12;
        loop {
            let marker = access::read_u16(buffer, index)?;
            match MarkerSegment::from_marker(marker) {
                Some(mut segment) => {
                    segment.load(buffer, index)?;
                    index += segment.size() as usize;
                    self.segments.push(segment);
                }
                None if marker == MARKER_SYMBOL_SOD => break,
                None => {
                    return Err(CodestreamError::SodMismatch {
                        found: marker,
                        offset: index,
                    })
                }
            }
        }
        info!("SOD start at byte offset {}", index);

        let end = if tile_part_length == 0 {
            // The tile-part runs to the EOC marker at the end of the buffer.
            warn!("Psot is 0, tile-part data runs to the end of the codestream");
            buffer.len().saturating_sub(2)
        } else {
            offset + tile_part_length as usize
        };
        if end < index || end > buffer.len() {
            return Err(CodestreamError::InvalidTileLength {
                tile_part_length,
                offset,
            });
        }
        self.raw = access::read_bytes(buffer, index, end)?;

        info!("SOT end at byte offset {}", end);
        Ok(())
    }

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        access::write_u16(writer, MARKER_SYMBOL_SOT)?;
        access::write_u16(writer, START_OF_TILE_LENGTH)?;
        access::write_u16(writer, self.tile_index)?;
        access::write_u32(writer, self.tile_part_length())?;
        access::write_u8(writer, self.tile_part_index)?;
        access::write_u8(writer, self.no_tile_parts)?;

        for segment in &self.segments {
            segment.save(writer)?;
        }

        writer.write_all(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PacketLength, MARKER_SYMBOL_PLT};

    const TILE_PART: [u8; 22] = [
        0xFF, 0x90, 0x00, 0x0A, 0x00, 0x01, // SOT, Lsot, Isot = 1
        0x00, 0x00, 0x00, 0x16, 0x00, 0x01, // Psot = 22, TPsot, TNsot
        0xFF, 0x58, 0x00, 0x04, 0x00, 0x05, // PLT with one length
        0xFF, 0x93, 0xAA, 0xBB, // SOD and packet data
    ];

    #[test]
    fn test_load() {
        let mut tile_part = TilePart::default();
        tile_part.load(&TILE_PART, 0).unwrap();

        assert_eq!(tile_part.tile_index, 1);
        assert_eq!(tile_part.tile_part_index, 0);
        assert_eq!(tile_part.no_tile_parts, 1);
        assert_eq!(tile_part.segments.len(), 1);
        assert_eq!(tile_part.segments[0].marker(), MARKER_SYMBOL_PLT);
        match &tile_part.segments[0] {
            MarkerSegment::PacketLength(plt) => {
                assert_eq!(plt.packet_lengths, vec![PacketLength::new(5)])
            }
            other => panic!("unexpected segment {:?}", other),
        }
        assert_eq!(tile_part.raw, vec![0xFF, 0x93, 0xAA, 0xBB]);
        assert_eq!(tile_part.size() as usize, TILE_PART.len());

        let mut saved = vec![];
        tile_part.save(&mut saved).unwrap();
        assert_eq!(saved, TILE_PART);
    }

    #[test]
    fn test_clear_segments_updates_length() {
        let mut tile_part = TilePart::default();
        tile_part.load(&TILE_PART, 0).unwrap();
        tile_part.clear_segments();

        assert_eq!(tile_part.tile_part_length(), 16);

        let mut saved = vec![];
        tile_part.save(&mut saved).unwrap();
        assert_eq!(&saved[6..10], &[0x00, 0x00, 0x00, 0x10]);
        assert_eq!(&saved[12..], &[0xFF, 0x93, 0xAA, 0xBB]);
    }

    #[test]
    fn test_lsot_mismatch() {
        let mut buffer = TILE_PART;
        buffer[3] = 0x0B;

        assert_eq!(
            TilePart::default().load(&buffer, 0),
            Err(CodestreamError::LsotMismatch {
                found: 11,
                offset: 2
            })
        );
    }

    #[test]
    fn test_missing_sod() {
        let mut buffer = TILE_PART;
        buffer[19] = 0x94;

        assert_eq!(
            TilePart::default().load(&buffer, 0),
            Err(CodestreamError::SodMismatch {
                found: 0xFF94,
                offset: 18
            })
        );
    }

    #[test]
    fn test_psot_before_header_end() {
        let mut buffer = TILE_PART;
        buffer[9] = 0x10;

        assert_eq!(
            TilePart::default().load(&buffer, 0),
            Err(CodestreamError::InvalidTileLength {
                tile_part_length: 16,
                offset: 0
            })
        );
    }

    #[test]
    fn test_psot_past_buffer() {
        let mut buffer = TILE_PART;
        buffer[9] = 0x30;

        assert_eq!(
            TilePart::default().load(&buffer, 0),
            Err(CodestreamError::InvalidTileLength {
                tile_part_length: 48,
                offset: 0
            })
        );
    }

    #[test]
    fn test_psot_zero_runs_to_eoc() {
        let mut buffer = TILE_PART.to_vec();
        buffer[9] = 0x00;
        buffer.extend_from_slice(&[0xFF, 0xD9]);

        let mut tile_part = TilePart::default();
        tile_part.load(&buffer, 0).unwrap();

        assert_eq!(tile_part.raw, vec![0xFF, 0x93, 0xAA, 0xBB]);
        assert_eq!(tile_part.tile_part_length(), 22);
    }
}
