//! Structural reading and writing of JP2 files (ISO/IEC 15444-1 Annex I).

use log::{info, warn};
use std::error;
use std::fmt;
use std::io;

use jpc::access;
use jpc::{BufferOverrun, CodestreamError};

mod codestream;
mod file_type;
mod header;
mod resolution;

pub use codestream::ContiguousCodestreamBox;
pub use file_type::FileTypeBox;
pub use header::{
    BitDepth, BitsPerComponentBox, Channel, ChannelDefinitionBox, ChannelTypes,
    ColourSpecificationBox, ColourSpecificationMethods, ComponentMap, ComponentMapType,
    ComponentMappingBox, EnumeratedColourSpaces, HeaderBox, ImageHeaderBox, PaletteBox,
};
pub use resolution::{
    CaptureResolutionBox, DefaultDisplayResolutionBox, GridResolutionBox, ResolutionBox,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JP2Error {
    BufferOverrun(BufferOverrun),
    InvalidSignature {
        offset: usize,
    },
    FileTypeMismatch {
        found: BoxType,
        offset: usize,
    },
    UnknownFileType {
        brand: [u8; 4],
        offset: usize,
    },
    HeaderMismatch {
        found: BoxType,
        offset: usize,
    },
    UnknownBox {
        box_type: BoxType,
        offset: usize,
    },
    BoxDuplicate {
        box_type: BoxType,
        offset: usize,
    },
    MisplacedBox {
        box_type: BoxType,
        offset: usize,
    },
    PaletteBitDepthTooLarge {
        bit_depth: u8,
        offset: usize,
    },
    BoxOverrun {
        box_type: BoxType,
        end: usize,
        offset: usize,
    },
    InvalidBoxLength {
        box_type: BoxType,
        length: u32,
        offset: usize,
    },
    ImageHeaderInvalidSize {
        length: u32,
        offset: usize,
    },
    ImageHeaderMismatch {
        found: BoxType,
        offset: usize,
    },
    BitsPerComponentMismatch {
        found: BoxType,
        offset: usize,
    },
    ColourSpecificationMismatch {
        found: BoxType,
        offset: usize,
    },
    PaletteMismatch {
        found: BoxType,
        offset: usize,
    },
    ComponentMappingMismatch {
        found: BoxType,
        offset: usize,
    },
    ChannelDefinitionMismatch {
        found: BoxType,
        offset: usize,
    },
    ResolutionMismatch {
        found: BoxType,
        offset: usize,
    },
    CaptureResolutionMismatch {
        found: BoxType,
        offset: usize,
    },
    DefaultDisplayResolutionMismatch {
        found: BoxType,
        offset: usize,
    },
    ResolutionEmpty {
        offset: usize,
    },
    ContiguousCodestreamMismatch {
        found: BoxType,
        offset: usize,
    },
    Unsupported {
        feature: &'static str,
        offset: usize,
    },
    Codestream(CodestreamError),
}

fn write_mismatch(
    f: &mut fmt::Formatter,
    expected: BoxType,
    found: BoxType,
    offset: usize,
) -> fmt::Result {
    write!(
        f,
        "expected box type {:?}, found {:?} at byte offset {}",
        box_type_name(expected),
        box_type_name(found),
        offset
    )
}

impl error::Error for JP2Error {}
impl fmt::Display for JP2Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BufferOverrun(overrun) => write!(f, "{}", overrun),
            Self::InvalidSignature { offset } => {
                write!(f, "invalid signature at byte offset {}", offset)
            }
            Self::FileTypeMismatch { found, offset } => {
                write_mismatch(f, BOX_TYPE_FILE_TYPE, *found, *offset)
            }
            Self::UnknownFileType { brand, offset } => write!(
                f,
                "unknown brand {:?} at byte offset {}",
                String::from_utf8_lossy(brand),
                offset
            ),
            Self::HeaderMismatch { found, offset } => {
                write_mismatch(f, BOX_TYPE_HEADER, *found, *offset)
            }
            Self::UnknownBox { box_type, offset } => write!(
                f,
                "unknown box type {:?} at byte offset {}",
                box_type_name(*box_type),
                offset
            ),
            Self::BoxDuplicate { box_type, offset } => write!(
                f,
                "unexpected duplicate box type {:?} at byte offset {}",
                box_type_name(*box_type),
                offset
            ),
            Self::MisplacedBox { box_type, offset } => write!(
                f,
                "box type {:?} not allowed inside the JP2 header at byte offset {}",
                box_type_name(*box_type),
                offset
            ),
            Self::PaletteBitDepthTooLarge { bit_depth, offset } => write!(
                f,
                "palette bit depth {} exceeds 38 at byte offset {}",
                bit_depth, offset
            ),
            Self::BoxOverrun {
                box_type,
                end,
                offset,
            } => write!(
                f,
                "box contents end at byte offset {}, past the end of box type {:?} at {}",
                offset,
                box_type_name(*box_type),
                end
            ),
            Self::InvalidBoxLength {
                box_type,
                length,
                offset,
            } => write!(
                f,
                "invalid length {} for box type {:?} at byte offset {}",
                length,
                box_type_name(*box_type),
                offset
            ),
            Self::ImageHeaderInvalidSize { length, offset } => write!(
                f,
                "image header length must be 22, found {} at byte offset {}",
                length, offset
            ),
            Self::ImageHeaderMismatch { found, offset } => {
                write_mismatch(f, BOX_TYPE_IMAGE_HEADER, *found, *offset)
            }
            Self::BitsPerComponentMismatch { found, offset } => {
                write_mismatch(f, BOX_TYPE_BITS_PER_COMPONENT, *found, *offset)
            }
            Self::ColourSpecificationMismatch { found, offset } => {
                write_mismatch(f, BOX_TYPE_COLOUR_SPECIFICATION, *found, *offset)
            }
            Self::PaletteMismatch { found, offset } => {
                write_mismatch(f, BOX_TYPE_PALETTE, *found, *offset)
            }
            Self::ComponentMappingMismatch { found, offset } => {
                write_mismatch(f, BOX_TYPE_COMPONENT_MAPPING, *found, *offset)
            }
            Self::ChannelDefinitionMismatch { found, offset } => {
                write_mismatch(f, BOX_TYPE_CHANNEL_DEFINITION, *found, *offset)
            }
            Self::ResolutionMismatch { found, offset } => {
                write_mismatch(f, BOX_TYPE_RESOLUTION, *found, *offset)
            }
            Self::CaptureResolutionMismatch { found, offset } => {
                write_mismatch(f, BOX_TYPE_CAPTURE_RESOLUTION, *found, *offset)
            }
            Self::DefaultDisplayResolutionMismatch { found, offset } => {
                write_mismatch(f, BOX_TYPE_DEFAULT_DISPLAY_RESOLUTION, *found, *offset)
            }
            Self::ResolutionEmpty { offset } => write!(
                f,
                "resolution box at byte offset {} holds neither resc nor resd",
                offset
            ),
            Self::ContiguousCodestreamMismatch { found, offset } => {
                write_mismatch(f, BOX_TYPE_CONTIGUOUS_CODESTREAM, *found, *offset)
            }
            Self::Unsupported { feature, offset } => {
                write!(f, "{} at byte offset {} is not supported", feature, offset)
            }
            Self::Codestream(error) => write!(f, "codestream: {}", error),
        }
    }
}

impl From<BufferOverrun> for JP2Error {
    fn from(overrun: BufferOverrun) -> JP2Error {
        JP2Error::BufferOverrun(overrun)
    }
}

impl From<CodestreamError> for JP2Error {
    fn from(error: CodestreamError) -> JP2Error {
        JP2Error::Codestream(error)
    }
}

pub type BoxType = u32;

// jP\040\040 (0x6A50 2020)
pub const BOX_TYPE_SIGNATURE: BoxType = 0x6A50_2020;
pub const BOX_TYPE_FILE_TYPE: BoxType = 0x6674_7970;
pub const BOX_TYPE_HEADER: BoxType = 0x6A70_3268;
pub const BOX_TYPE_IMAGE_HEADER: BoxType = 0x6968_6472;
pub const BOX_TYPE_BITS_PER_COMPONENT: BoxType = 0x6270_6363;
pub const BOX_TYPE_COLOUR_SPECIFICATION: BoxType = 0x636F_6C72;
pub const BOX_TYPE_PALETTE: BoxType = 0x7063_6C72;
pub const BOX_TYPE_COMPONENT_MAPPING: BoxType = 0x636D_6170;
pub const BOX_TYPE_CHANNEL_DEFINITION: BoxType = 0x6364_6566;
pub const BOX_TYPE_RESOLUTION: BoxType = 0x7265_7320;
pub const BOX_TYPE_CAPTURE_RESOLUTION: BoxType = 0x7265_7363;
pub const BOX_TYPE_DEFAULT_DISPLAY_RESOLUTION: BoxType = 0x7265_7364;
pub const BOX_TYPE_CONTIGUOUS_CODESTREAM: BoxType = 0x6A70_3263;

// Length of the signature box
const SIGNATURE_LENGTH: u32 = 12;

// <CR><LF><0x87><LF> (0x0D0A 870A).
const SIGNATURE_MAGIC: u32 = 0x0D0A_870A;

/// The four characters of a box type, non-ASCII bytes replaced.
pub fn box_type_name(box_type: BoxType) -> String {
    String::from_utf8_lossy(&box_type.to_be_bytes()).into_owned()
}

/// A box readable from and writable to a JP2 file.
pub trait JBox {
    fn identifier(&self) -> BoxType;

    /// Bytes the box occupies when saved, LBox and TBox included.
    fn size(&self) -> u32;

    /// Reads the box whose LBox field starts at `offset`.
    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), JP2Error>;

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()>;
}

// Reads LBox at `offset`, rejecting values that cannot hold the box header.
// Extended lengths are not supported.
pub(crate) fn decode_box_length(
    buffer: &[u8],
    offset: usize,
    box_type: BoxType,
) -> Result<u32, JP2Error> {
    let length = access::read_u32(buffer, offset)?;
    match length {
        1 => Err(JP2Error::Unsupported {
            feature: "extended box length",
            offset,
        }),
        0 | 2..=7 => Err(JP2Error::InvalidBoxLength {
            box_type,
            length,
            offset,
        }),
        _ => Ok(length),
    }
}

pub(crate) fn write_box_header<W: io::Write>(
    writer: &mut W,
    length: u32,
    box_type: BoxType,
) -> io::Result<()> {
    access::write_u32(writer, length)?;
    access::write_u32(writer, box_type)
}

/// A box that may appear inside the JP2 header box.
#[derive(Debug, Clone, PartialEq)]
pub enum JP2Box {
    FileType(FileTypeBox),
    Header(HeaderBox),
    ImageHeader(ImageHeaderBox),
    BitsPerComponent(BitsPerComponentBox),
    ColourSpecification(ColourSpecificationBox),
    Palette(PaletteBox),
    ComponentMapping(ComponentMappingBox),
    ChannelDefinition(ChannelDefinitionBox),
    Resolution(ResolutionBox),
    ContiguousCodestream(ContiguousCodestreamBox),
}

macro_rules! for_each_box {
    ($value:expr, $jbox:ident => $body:expr) => {
        match $value {
            JP2Box::FileType($jbox) => $body,
            JP2Box::Header($jbox) => $body,
            JP2Box::ImageHeader($jbox) => $body,
            JP2Box::BitsPerComponent($jbox) => $body,
            JP2Box::ColourSpecification($jbox) => $body,
            JP2Box::Palette($jbox) => $body,
            JP2Box::ComponentMapping($jbox) => $body,
            JP2Box::ChannelDefinition($jbox) => $body,
            JP2Box::Resolution($jbox) => $body,
            JP2Box::ContiguousCodestream($jbox) => $body,
        }
    };
}

impl JP2Box {
    /// Empty box for `box_type`, or `None` when the type is not known.
    pub fn from_box_type(box_type: BoxType) -> Option<JP2Box> {
        match box_type {
            BOX_TYPE_FILE_TYPE => Some(JP2Box::FileType(Default::default())),
            BOX_TYPE_HEADER => Some(JP2Box::Header(Default::default())),
            BOX_TYPE_IMAGE_HEADER => Some(JP2Box::ImageHeader(Default::default())),
            BOX_TYPE_BITS_PER_COMPONENT => Some(JP2Box::BitsPerComponent(Default::default())),
            BOX_TYPE_COLOUR_SPECIFICATION => {
                Some(JP2Box::ColourSpecification(Default::default()))
            }
            BOX_TYPE_PALETTE => Some(JP2Box::Palette(Default::default())),
            BOX_TYPE_COMPONENT_MAPPING => Some(JP2Box::ComponentMapping(Default::default())),
            BOX_TYPE_CHANNEL_DEFINITION => Some(JP2Box::ChannelDefinition(Default::default())),
            BOX_TYPE_RESOLUTION => Some(JP2Box::Resolution(Default::default())),
            BOX_TYPE_CONTIGUOUS_CODESTREAM => {
                Some(JP2Box::ContiguousCodestream(Default::default()))
            }
            _ => None,
        }
    }
}

impl JBox for JP2Box {
    fn identifier(&self) -> BoxType {
        for_each_box!(self, jbox => jbox.identifier())
    }

    fn size(&self) -> u32 {
        for_each_box!(self, jbox => jbox.size())
    }

    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), JP2Error> {
        for_each_box!(self, jbox => jbox.load(buffer, offset))
    }

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        for_each_box!(self, jbox => jbox.save(writer))
    }
}

/// True when `buffer` starts with the JP2 signature box.
pub fn has_signature(buffer: &[u8]) -> bool {
    matches!(access::verify_u32(buffer, 0, SIGNATURE_LENGTH), Ok(true))
        && matches!(access::verify_u32(buffer, 4, BOX_TYPE_SIGNATURE), Ok(true))
        && matches!(access::verify_u32(buffer, 8, SIGNATURE_MAGIC), Ok(true))
}

/// A JP2 file: the signature box, then the file type, JP2 header and
/// contiguous codestream boxes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JP2File {
    pub file_type: FileTypeBox,
    pub header: HeaderBox,
    pub contiguous_codestream: ContiguousCodestreamBox,
}

impl JP2File {
    pub fn size(&self) -> u32 {
        SIGNATURE_LENGTH
            + self.file_type.size()
            + self.header.size()
            + self.contiguous_codestream.size()
    }

    pub fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), JP2Error> {
        info!("Signature start at byte offset {}", offset);
        if !access::verify_u32(buffer, offset, SIGNATURE_LENGTH)?
            || !access::verify_u32(buffer, offset + 4, BOX_TYPE_SIGNATURE)?
            || !access::verify_u32(buffer, offset + 8, SIGNATURE_MAGIC)?
        {
            return Err(JP2Error::InvalidSignature { offset });
        }

        let mut index = offset + SIGNATURE_LENGTH as usize;

        self.file_type.load(buffer, index)?;
        index += self.file_type.size() as usize;

        self.header.load(buffer, index)?;
        index += self.header.size() as usize;

        self.contiguous_codestream.load(buffer, index)?;
        index += self.contiguous_codestream.size() as usize;

        if index < buffer.len() {
            warn!(
                "{} trailing bytes after the contiguous codestream box",
                buffer.len() - index
            );
        }
        Ok(())
    }

    pub fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        write_box_header(writer, SIGNATURE_LENGTH, BOX_TYPE_SIGNATURE)?;
        access::write_u32(writer, SIGNATURE_MAGIC)?;
        self.file_type.save(writer)?;
        self.header.save(writer)?;
        self.contiguous_codestream.save(writer)
    }
}

/// Decodes the JP2 file starting at the first byte of `buffer`.
pub fn decode_jp2(buffer: &[u8]) -> Result<JP2File, JP2Error> {
    let mut file = JP2File::default();
    file.load(buffer, 0)?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_box_type() {
        assert!(matches!(
            JP2Box::from_box_type(0x6674_7970),
            Some(JP2Box::FileType(_))
        ));

        for box_type in [
            BOX_TYPE_FILE_TYPE,
            BOX_TYPE_HEADER,
            BOX_TYPE_IMAGE_HEADER,
            BOX_TYPE_BITS_PER_COMPONENT,
            BOX_TYPE_COLOUR_SPECIFICATION,
            BOX_TYPE_PALETTE,
            BOX_TYPE_COMPONENT_MAPPING,
            BOX_TYPE_CHANNEL_DEFINITION,
            BOX_TYPE_RESOLUTION,
            BOX_TYPE_CONTIGUOUS_CODESTREAM,
        ] {
            let jbox = JP2Box::from_box_type(box_type).unwrap();
            assert_eq!(jbox.identifier(), box_type);
        }

        assert_eq!(JP2Box::from_box_type(BOX_TYPE_SIGNATURE), None);
        assert_eq!(JP2Box::from_box_type(BOX_TYPE_CAPTURE_RESOLUTION), None);
        assert_eq!(JP2Box::from_box_type(0x786D_6C20), None);
    }

    #[test]
    fn test_box_type_name() {
        assert_eq!(box_type_name(BOX_TYPE_RESOLUTION), "res ");
        assert_eq!(box_type_name(BOX_TYPE_CONTIGUOUS_CODESTREAM), "jp2c");
    }

    #[test]
    fn test_decode_box_length() {
        let buffer = [0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x07];

        assert_eq!(
            decode_box_length(&buffer, 0, BOX_TYPE_HEADER),
            Err(JP2Error::Unsupported {
                feature: "extended box length",
                offset: 0
            })
        );
        assert_eq!(
            decode_box_length(&buffer, 4, BOX_TYPE_HEADER),
            Err(JP2Error::InvalidBoxLength {
                box_type: BOX_TYPE_HEADER,
                length: 7,
                offset: 4
            })
        );
    }

    #[test]
    fn test_has_signature() {
        let signature = [
            0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20, 0x0D, 0x0A, 0x87, 0x0A,
        ];
        assert!(has_signature(&signature));
        assert!(!has_signature(&signature[..11]));
        assert!(!has_signature(&[0xFF, 0x4F, 0xFF, 0x51]));
    }
}
