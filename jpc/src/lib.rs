//! Structural reading and writing of JPEG 2000 codestreams (ISO/IEC 15444-1
//! Annex A).
//!
//! A codestream is decoded into plain records (main header marker segments
//! and tile-parts) which can be edited and written back out. Packet data is
//! carried through untouched.

use log::{debug, info};
use std::error;
use std::fmt;
use std::io;

pub mod access;
mod packet_length;
mod segments;
mod tile_part;

pub use access::BufferOverrun;
pub use packet_length::{decode_packet_lengths, PacketLength, PacketLengthSegment};
pub use segments::{
    CodingBlockStyle, CodingStyleComponent, CodingStyleDefault, Comment,
    CommentRegistrationValue, ComponentSize, ImageAndTileSize, MultipleComponentTransformation,
    OpaqueSegment, ProgressionOrder, QuantizationComponent, QuantizationDefault,
    QuantizationStyle, TransformationFilter,
};
pub use tile_part::TilePart;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodestreamError {
    BufferOverrun(BufferOverrun),
    SocMismatch {
        found: MarkerSymbol,
        offset: usize,
    },
    SizMismatch {
        found: MarkerSymbol,
        offset: usize,
    },
    CodMismatch {
        found: MarkerSymbol,
        offset: usize,
    },
    CocMismatch {
        found: MarkerSymbol,
        offset: usize,
    },
    QcdMismatch {
        found: MarkerSymbol,
        offset: usize,
    },
    QccMismatch {
        found: MarkerSymbol,
        offset: usize,
    },
    ComMismatch {
        found: MarkerSymbol,
        offset: usize,
    },
    PltMismatch {
        found: MarkerSymbol,
        offset: usize,
    },
    SotMismatch {
        found: MarkerSymbol,
        offset: usize,
    },
    LsotMismatch {
        found: u16,
        offset: usize,
    },
    SodMismatch {
        found: MarkerSymbol,
        offset: usize,
    },
    EocMismatch {
        found: MarkerSymbol,
        offset: usize,
    },
    SegmentMismatch {
        expected: MarkerSymbol,
        found: MarkerSymbol,
        offset: usize,
    },
    InvalidSegmentLength {
        marker: MarkerSymbol,
        length: u16,
        offset: usize,
    },
    InvalidTileLength {
        tile_part_length: u32,
        offset: usize,
    },
    IncompletePacketLength {
        offset: usize,
    },
    PacketLengthOverflow {
        offset: usize,
    },
    NonMinimalPacketLength {
        offset: usize,
    },
    CommentTooLong {
        length: usize,
    },
}

fn write_mismatch(
    f: &mut fmt::Formatter,
    expected: &str,
    found: MarkerSymbol,
    offset: usize,
) -> fmt::Result {
    write!(
        f,
        "expected {} marker, found 0x{:04X} at byte offset {}",
        expected, found, offset
    )
}

impl error::Error for CodestreamError {}
impl fmt::Display for CodestreamError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BufferOverrun(overrun) => write!(f, "{}", overrun),
            Self::SocMismatch { found, offset } => write_mismatch(f, "SOC", *found, *offset),
            Self::SizMismatch { found, offset } => write_mismatch(f, "SIZ", *found, *offset),
            Self::CodMismatch { found, offset } => write_mismatch(f, "COD", *found, *offset),
            Self::CocMismatch { found, offset } => write_mismatch(f, "COC", *found, *offset),
            Self::QcdMismatch { found, offset } => write_mismatch(f, "QCD", *found, *offset),
            Self::QccMismatch { found, offset } => write_mismatch(f, "QCC", *found, *offset),
            Self::ComMismatch { found, offset } => write_mismatch(f, "COM", *found, *offset),
            Self::PltMismatch { found, offset } => write_mismatch(f, "PLT", *found, *offset),
            Self::SotMismatch { found, offset } => write_mismatch(f, "SOT", *found, *offset),
            Self::SodMismatch { found, offset } => write_mismatch(f, "SOD", *found, *offset),
            Self::EocMismatch { found, offset } => write_mismatch(f, "EOC", *found, *offset),
            Self::LsotMismatch { found, offset } => {
                write!(f, "Lsot must be 10, found {} at byte offset {}", found, offset)
            }
            Self::SegmentMismatch {
                expected,
                found,
                offset,
            } => write!(
                f,
                "expected marker 0x{:04X}, found 0x{:04X} at byte offset {}",
                expected, found, offset
            ),
            Self::InvalidSegmentLength {
                marker,
                length,
                offset,
            } => write!(
                f,
                "invalid length {} for marker 0x{:04X} at byte offset {}",
                length, marker, offset
            ),
            Self::InvalidTileLength {
                tile_part_length,
                offset,
            } => write!(
                f,
                "Psot {} of tile-part at byte offset {} is outside the codestream",
                tile_part_length, offset
            ),
            Self::IncompletePacketLength { offset } => {
                write!(f, "packet length unterminated at byte offset {}", offset)
            }
            Self::PacketLengthOverflow { offset } => {
                write!(f, "packet length overflows at byte offset {}", offset)
            }
            Self::NonMinimalPacketLength { offset } => {
                write!(f, "packet length padded at byte offset {}", offset)
            }
            Self::CommentTooLong { length } => {
                write!(f, "comment of {} bytes does not fit in COM", length)
            }
        }
    }
}

impl From<BufferOverrun> for CodestreamError {
    fn from(overrun: BufferOverrun) -> CodestreamError {
        CodestreamError::BufferOverrun(overrun)
    }
}

pub type MarkerSymbol = u16;

// Delimiting markers and marker segments
pub const MARKER_SYMBOL_SOC: MarkerSymbol = 0xFF4F; // Start of code stream
pub const MARKER_SYMBOL_SOT: MarkerSymbol = 0xFF90; // Start of tile-part
pub const MARKER_SYMBOL_SOD: MarkerSymbol = 0xFF93; // Start of data
pub const MARKER_SYMBOL_EOC: MarkerSymbol = 0xFFD9; // End of codestream

// Fixed information marker segments
pub const MARKER_SYMBOL_SIZ: MarkerSymbol = 0xFF51; // Image and tile size

// Functional marker segments
pub const MARKER_SYMBOL_COD: MarkerSymbol = 0xFF52; // Coding style default
pub const MARKER_SYMBOL_COC: MarkerSymbol = 0xFF53; // Coding style component
pub const MARKER_SYMBOL_RGN: MarkerSymbol = 0xFF5E; // Region-of-interest
pub const MARKER_SYMBOL_QCD: MarkerSymbol = 0xFF5C; // Quantization default
pub const MARKER_SYMBOL_QCC: MarkerSymbol = 0xFF5D; // Quantization component
pub const MARKER_SYMBOL_POC: MarkerSymbol = 0xFF5F; // Progression order change

// Pointer marker segments
pub const MARKER_SYMBOL_PLT: MarkerSymbol = 0xFF58; // Packet length, tile-part header
pub const MARKER_SYMBOL_PPT: MarkerSymbol = 0xFF61; // Packed packet headers, tile-part header

// Informational marker segments
pub const MARKER_SYMBOL_COM: MarkerSymbol = 0xFF64; // Comment

/// Short name of a known marker, for display.
pub fn marker_name(marker: MarkerSymbol) -> Option<&'static str> {
    match marker {
        MARKER_SYMBOL_SOC => Some("SOC"),
        MARKER_SYMBOL_SOT => Some("SOT"),
        MARKER_SYMBOL_SOD => Some("SOD"),
        MARKER_SYMBOL_EOC => Some("EOC"),
        MARKER_SYMBOL_SIZ => Some("SIZ"),
        MARKER_SYMBOL_COD => Some("COD"),
        MARKER_SYMBOL_COC => Some("COC"),
        MARKER_SYMBOL_RGN => Some("RGN"),
        MARKER_SYMBOL_QCD => Some("QCD"),
        MARKER_SYMBOL_QCC => Some("QCC"),
        MARKER_SYMBOL_POC => Some("POC"),
        MARKER_SYMBOL_PLT => Some("PLT"),
        MARKER_SYMBOL_PPT => Some("PPT"),
        MARKER_SYMBOL_COM => Some("COM"),
        _ => None,
    }
}

/// A marker and the bytes that follow it, readable from and writable to a
/// codestream.
pub trait Segment {
    fn marker(&self) -> MarkerSymbol;

    /// Bytes the segment occupies when saved, marker included.
    fn size(&self) -> u32;

    /// Reads the segment starting with its marker at `offset`.
    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), CodestreamError>;

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()>;
}

/// A marker segment allowed in a tile-part header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerSegment {
    CodingStyleDefault(CodingStyleDefault),
    CodingStyleComponent(CodingStyleComponent),
    QuantizationDefault(QuantizationDefault),
    QuantizationComponent(QuantizationComponent),
    PacketLength(PacketLengthSegment),
    Comment(Comment),
    Opaque(OpaqueSegment),
}

macro_rules! for_each_segment {
    ($value:expr, $segment:ident => $body:expr) => {
        match $value {
            MarkerSegment::CodingStyleDefault($segment) => $body,
            MarkerSegment::CodingStyleComponent($segment) => $body,
            MarkerSegment::QuantizationDefault($segment) => $body,
            MarkerSegment::QuantizationComponent($segment) => $body,
            MarkerSegment::PacketLength($segment) => $body,
            MarkerSegment::Comment($segment) => $body,
            MarkerSegment::Opaque($segment) => $body,
        }
    };
}

impl MarkerSegment {
    /// Empty segment for `marker`, or `None` when it cannot appear in a
    /// tile-part header.
    pub fn from_marker(marker: MarkerSymbol) -> Option<MarkerSegment> {
        match marker {
            MARKER_SYMBOL_COD => Some(MarkerSegment::CodingStyleDefault(Default::default())),
            MARKER_SYMBOL_COC => Some(MarkerSegment::CodingStyleComponent(Default::default())),
            MARKER_SYMBOL_QCD => Some(MarkerSegment::QuantizationDefault(Default::default())),
            MARKER_SYMBOL_QCC => Some(MarkerSegment::QuantizationComponent(Default::default())),
            MARKER_SYMBOL_PLT => Some(MarkerSegment::PacketLength(Default::default())),
            MARKER_SYMBOL_COM => Some(MarkerSegment::Comment(Default::default())),
            MARKER_SYMBOL_RGN | MARKER_SYMBOL_POC | MARKER_SYMBOL_PPT => {
                Some(MarkerSegment::Opaque(OpaqueSegment::new(marker)))
            }
            _ => None,
        }
    }
}

impl Segment for MarkerSegment {
    fn marker(&self) -> MarkerSymbol {
        for_each_segment!(self, segment => segment.marker())
    }

    fn size(&self) -> u32 {
        for_each_segment!(self, segment => segment.size())
    }

    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), CodestreamError> {
        for_each_segment!(self, segment => segment.load(buffer, offset))
    }

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        for_each_segment!(self, segment => segment.save(writer))
    }
}

// A.3
//
// The codestream: SOC, the main header, every tile-part and EOC.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Codestream {
    pub image_and_tile_size: ImageAndTileSize,
    pub coding_style_default: CodingStyleDefault,
    pub quantization_default: QuantizationDefault,
    pub comments: Vec<Comment>,
    pub quantization_components: Vec<QuantizationComponent>,
    pub tile_parts: Vec<TilePart>,
}

impl Codestream {
    /// Iterates over tile-parts belonging to `tile_index`.
    pub fn tile_parts_of(&self, tile_index: u16) -> impl Iterator<Item = &TilePart> {
        self.tile_parts
            .iter()
            .filter(move |tile_part| tile_part.tile_index == tile_index)
    }
}

impl Segment for Codestream {
    fn marker(&self) -> MarkerSymbol {
        MARKER_SYMBOL_SOC
    }

    fn size(&self) -> u32 {
        4 + self.image_and_tile_size.size()
            + self.coding_style_default.size()
            + self.quantization_default.size()
            + self.comments.iter().map(Segment::size).sum::<u32>()
            + self
                .quantization_components
                .iter()
                .map(Segment::size)
                .sum::<u32>()
            + self.tile_parts.iter().map(Segment::size).sum::<u32>()
    }

    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), CodestreamError> {
        let found = access::read_u16(buffer, offset)?;
        if found != MARKER_SYMBOL_SOC {
            return Err(CodestreamError::SocMismatch { found, offset });
        }
        info!("SOC start at byte offset {}", offset);

        let mut index = offset + 2;

        self.image_and_tile_size.load(buffer, index)?;
        index += self.image_and_tile_size.size() as usize;

        self.coding_style_default.load(buffer, index)?;
        index += self.coding_style_default.size() as usize;

        self.quantization_default.load(buffer, index)?;
        index += self.quantization_default.size() as usize;

        self.comments.clear();
        while access::verify_u16(buffer, index, MARKER_SYMBOL_COM)? {
            let mut comment = Comment::default();
            comment.load(buffer, index)?;
            index += comment.size() as usize;
            self.comments.push(comment);
        }

        self.quantization_components.clear();
        while access::verify_u16(buffer, index, MARKER_SYMBOL_QCC)? {
            let mut quantization_component = QuantizationComponent::default();
            quantization_component.load(buffer, index)?;
            index += quantization_component.size() as usize;
            self.quantization_components.push(quantization_component);
        }
        info!("Main header end at byte offset {}", index);

        self.tile_parts.clear();
        while access::verify_u16(buffer, index, MARKER_SYMBOL_SOT)? {
            let mut tile_part = TilePart::default();
            tile_part.load(buffer, index)?;
            index += tile_part.size() as usize;
            self.tile_parts.push(tile_part);
        }
        debug!("{} tile-parts", self.tile_parts.len());

        let found = access::read_u16(buffer, index)?;
        if found != MARKER_SYMBOL_EOC {
            return Err(CodestreamError::EocMismatch {
                found,
                offset: index,
            });
        }
        info!("EOC at byte offset {}", index);

        Ok(())
    }

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        access::write_u16(writer, MARKER_SYMBOL_SOC)?;
        self.image_and_tile_size.save(writer)?;
        self.coding_style_default.save(writer)?;
        self.quantization_default.save(writer)?;

        for comment in &self.comments {
            comment.save(writer)?;
        }
        for quantization_component in &self.quantization_components {
            quantization_component.save(writer)?;
        }
        for tile_part in &self.tile_parts {
            tile_part.save(writer)?;
        }

        access::write_u16(writer, MARKER_SYMBOL_EOC)
    }
}

/// Decodes the codestream starting at the first byte of `buffer`.
pub fn decode_jpc(buffer: &[u8]) -> Result<Codestream, CodestreamError> {
    let mut codestream = Codestream::default();
    codestream.load(buffer, 0)?;
    Ok(codestream)
}
