use log::{debug, info, warn};
use std::io;

use jpc::access;

use crate::{
    decode_box_length, write_box_header, BoxType, JBox, JP2Box, JP2Error,
    BOX_TYPE_BITS_PER_COMPONENT, BOX_TYPE_CHANNEL_DEFINITION, BOX_TYPE_COLOUR_SPECIFICATION,
    BOX_TYPE_COMPONENT_MAPPING, BOX_TYPE_CONTIGUOUS_CODESTREAM, BOX_TYPE_FILE_TYPE,
    BOX_TYPE_HEADER, BOX_TYPE_IMAGE_HEADER, BOX_TYPE_PALETTE,
};

// I.5.3
//
// JP2 Header Box
//
// The JP2 Header box contains generic information about the file, such as
// number of components, colourspace, and grid resolution.
//
// This box is a superbox. Its children are read until its length is used up
// exactly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderBox {
    pub boxes: Vec<JP2Box>,
}

impl HeaderBox {
    pub fn image_header(&self) -> Option<&ImageHeaderBox> {
        self.boxes.iter().find_map(|jbox| match jbox {
            JP2Box::ImageHeader(image_header) => Some(image_header),
            _ => None,
        })
    }

    pub fn colour_specifications(&self) -> impl Iterator<Item = &ColourSpecificationBox> {
        self.boxes.iter().filter_map(|jbox| match jbox {
            JP2Box::ColourSpecification(colour_specification) => Some(colour_specification),
            _ => None,
        })
    }
}

impl JBox for HeaderBox {
    // The type of the JP2 Header box shall be ‘jp2h’ (0x6A70 3268)
    fn identifier(&self) -> BoxType {
        BOX_TYPE_HEADER
    }

    fn size(&self) -> u32 {
        8 + self.boxes.iter().map(JBox::size).sum::<u32>()
    }

    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), JP2Error> {
        info!("HeaderBox start at byte offset {}", offset);
        let length = decode_box_length(buffer, offset, BOX_TYPE_HEADER)?;

        let found = access::read_u32(buffer, offset + 4)?;
        if found != BOX_TYPE_HEADER {
            return Err(JP2Error::HeaderMismatch { found, offset });
        }

        let end = offset + length as usize;
        let mut index = offset + 8;
        self.boxes.clear();
        while index < end {
            let box_type = access::read_u32(buffer, index + 4)?;
            // Top-level boxes, jp2h included, cannot nest here.
            if matches!(
                box_type,
                BOX_TYPE_FILE_TYPE | BOX_TYPE_HEADER | BOX_TYPE_CONTIGUOUS_CODESTREAM
            ) {
                return Err(JP2Error::MisplacedBox {
                    box_type,
                    offset: index,
                });
            }
            let mut jbox = JP2Box::from_box_type(box_type).ok_or(JP2Error::UnknownBox {
                box_type,
                offset: index,
            })?;
            jbox.load(buffer, index)?;
            index += jbox.size() as usize;
            self.boxes.push(jbox);
        }

        if index != end {
            return Err(JP2Error::BoxOverrun {
                box_type: BOX_TYPE_HEADER,
                end,
                offset: index,
            });
        }
        if !matches!(self.boxes.first(), Some(JP2Box::ImageHeader(_))) {
            warn!("JP2 header does not start with an image header box");
        }

        info!("HeaderBox finish at byte offset {}", end);
        Ok(())
    }

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        write_box_header(writer, self.size(), BOX_TYPE_HEADER)?;

        for jbox in &self.boxes {
            jbox.save(writer)?;
        }

        Ok(())
    }
}

const IMAGE_HEADER_LENGTH: u32 = 22;
const COMPRESSION_TYPE_WAVELET: u8 = 7;
const BITS_PER_COMPONENT_VARY: u8 = 255;

#[derive(Debug, PartialEq)]
pub enum BitDepth {
    Signed { value: u8 },
    Unsigned { value: u8 },
}

impl BitDepth {
    fn new(byte: u8) -> BitDepth {
        // The low 7-bits of the value indicate the bit depth of this component.
        let value = (byte & 0b0111_1111) + 1;

        // The high-bit indicates whether the component is signed or unsigned.
        if byte & 0b1000_0000 != 0 {
            BitDepth::Signed { value }
        } else {
            BitDepth::Unsigned { value }
        }
    }

    pub fn value(&self) -> u8 {
        match self {
            Self::Signed { value } | Self::Unsigned { value } => *value,
        }
    }
}

// I.5.3.1
//
// Image Header box
//
// This box contains fixed length generic information about the image, such as
// the image size and number of components.
//
// The length of the Image Header box shall be 22 bytes, including the box
// length and type fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeaderBox {
    // HEIGHT: Image area height, Ysiz – YOsiz.
    pub height: u32,

    // WIDTH: Image area width, Xsiz – XOsiz.
    pub width: u32,

    // NC: Number of components, equal to Csiz.
    pub components_num: u16,

    // BPC: Bit depth minus one and sign of the components, 255 if they vary.
    pub components_bits: u8,

    // C: Compression type, shall be 7.
    pub compression_type: u8,

    // UnkC: 1 if the colourspace of the image is not known.
    pub colourspace_unknown: u8,

    // IPR: 1 if the file contains an intellectual property rights box.
    pub intellectual_property: u8,
}

impl Default for ImageHeaderBox {
    fn default() -> ImageHeaderBox {
        ImageHeaderBox {
            height: 0,
            width: 0,
            components_num: 0,
            components_bits: 0,
            compression_type: COMPRESSION_TYPE_WAVELET,
            colourspace_unknown: 0,
            intellectual_property: 0,
        }
    }
}

impl ImageHeaderBox {
    /// Bit depth shared by every component, `None` when it varies and is
    /// given by a bits per component box.
    pub fn bit_depth(&self) -> Option<BitDepth> {
        if self.components_bits == BITS_PER_COMPONENT_VARY {
            None
        } else {
            Some(BitDepth::new(self.components_bits))
        }
    }
}

impl JBox for ImageHeaderBox {
    // The type of the Image Header box shall be ‘ihdr’ (0x6968 6472)
    fn identifier(&self) -> BoxType {
        BOX_TYPE_IMAGE_HEADER
    }

    fn size(&self) -> u32 {
        IMAGE_HEADER_LENGTH
    }

    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), JP2Error> {
        info!("ImageHeaderBox start at byte offset {}", offset);
        let length = access::read_u32(buffer, offset)?;
        if length != IMAGE_HEADER_LENGTH {
            return Err(JP2Error::ImageHeaderInvalidSize { length, offset });
        }

        let found = access::read_u32(buffer, offset + 4)?;
        if found != BOX_TYPE_IMAGE_HEADER {
            return Err(JP2Error::ImageHeaderMismatch { found, offset });
        }

        self.height = access::read_u32(buffer, offset + 8)?;
        self.width = access::read_u32(buffer, offset + 12)?;
        self.components_num = access::read_u16(buffer, offset + 16)?;
        self.components_bits = access::read_u8(buffer, offset + 18)?;
        self.compression_type = access::read_u8(buffer, offset + 19)?;
        self.colourspace_unknown = access::read_u8(buffer, offset + 20)?;
        self.intellectual_property = access::read_u8(buffer, offset + 21)?;

        debug!("Image {}x{}", self.width, self.height);
        debug!("Components {}", self.components_num);
        debug!("Bits per component {:?}", self.bit_depth());
        if self.compression_type != COMPRESSION_TYPE_WAVELET {
            warn!("Compression type {} unexpected", self.compression_type);
        }

        info!(
            "ImageHeaderBox finish at byte offset {}",
            offset + IMAGE_HEADER_LENGTH as usize
        );
        Ok(())
    }

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        write_box_header(writer, IMAGE_HEADER_LENGTH, BOX_TYPE_IMAGE_HEADER)?;
        access::write_u32(writer, self.height)?;
        access::write_u32(writer, self.width)?;
        access::write_u16(writer, self.components_num)?;
        access::write_u8(writer, self.components_bits)?;
        access::write_u8(writer, self.compression_type)?;
        access::write_u8(writer, self.colourspace_unknown)?;
        access::write_u8(writer, self.intellectual_property)
    }
}

// I.5.3.2
//
// The Bits Per Component box specifies the bit depth of each component.
//
// The order of bit depth values in this box is the actual order in which those
// components are enumerated within the codestream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitsPerComponentBox {
    // BPC^i: bit depth of component i, minus 1, with the sign in the high bit.
    pub bits_per_component: Vec<u8>,
}

impl BitsPerComponentBox {
    pub fn bit_depths(&self) -> Vec<BitDepth> {
        self.bits_per_component
            .iter()
            .map(|byte| BitDepth::new(*byte))
            .collect()
    }
}

impl JBox for BitsPerComponentBox {
    fn identifier(&self) -> BoxType {
        BOX_TYPE_BITS_PER_COMPONENT
    }

    fn size(&self) -> u32 {
        8 + self.bits_per_component.len() as u32
    }

    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), JP2Error> {
        info!("BitsPerComponentBox start at byte offset {}", offset);
        let length = decode_box_length(buffer, offset, BOX_TYPE_BITS_PER_COMPONENT)?;

        let found = access::read_u32(buffer, offset + 4)?;
        if found != BOX_TYPE_BITS_PER_COMPONENT {
            return Err(JP2Error::BitsPerComponentMismatch { found, offset });
        }

        let end = offset + length as usize;
        self.bits_per_component = access::read_bytes(buffer, offset + 8, end)?;

        debug!("Bit depths {:?}", self.bit_depths());
        info!("BitsPerComponentBox finish at byte offset {}", end);
        Ok(())
    }

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        write_box_header(writer, self.size(), BOX_TYPE_BITS_PER_COMPONENT)?;
        writer.write_all(&self.bits_per_component)
    }
}

const METHOD_ENUMERATED_COLOUR_SPACE: u8 = 1;
const METHOD_RESTRICTED_ICC_PROFILE: u8 = 2;

#[derive(Debug, PartialEq)]
pub enum ColourSpecificationMethods {
    EnumeratedColourSpace,
    RestrictedICCProfile,
    Reserved { value: u8 },
}

impl ColourSpecificationMethods {
    fn new(value: u8) -> ColourSpecificationMethods {
        match value {
            METHOD_ENUMERATED_COLOUR_SPACE => ColourSpecificationMethods::EnumeratedColourSpace,
            METHOD_RESTRICTED_ICC_PROFILE => ColourSpecificationMethods::RestrictedICCProfile,
            value => ColourSpecificationMethods::Reserved { value },
        }
    }
}

const ENUMERATED_COLOUR_SPACE_SRGB: u32 = 16;
const ENUMERATED_COLOUR_SPACE_GREYSCALE: u32 = 17;
const ENUMERATED_COLOUR_SPACE_SYCC: u32 = 18;

#[derive(Debug, PartialEq)]
pub enum EnumeratedColourSpaces {
    #[allow(non_camel_case_types)]
    sRGB,
    Greyscale,
    #[allow(non_camel_case_types)]
    sYCC,
    Reserved { value: u32 },
}

impl EnumeratedColourSpaces {
    fn new(value: u32) -> EnumeratedColourSpaces {
        match value {
            ENUMERATED_COLOUR_SPACE_SRGB => EnumeratedColourSpaces::sRGB,
            ENUMERATED_COLOUR_SPACE_GREYSCALE => EnumeratedColourSpaces::Greyscale,
            ENUMERATED_COLOUR_SPACE_SYCC => EnumeratedColourSpaces::sYCC,
            value => EnumeratedColourSpaces::Reserved { value },
        }
    }
}

// I.5.3.3
//
// Colour Specification box
//
// Each Colour Specification box defines one method by which an application can
// interpret the colourspace of the decompressed image data.
//
// Embedded ICC profiles (METH 2) are not supported. For reserved methods the
// bytes after APPROX are kept as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColourSpecificationBox {
    // METH
    pub method: u8,

    // PREC: reserved for ISO use, shall be zero.
    pub precedence: u8,

    // APPROX: shall be zero.
    pub colourspace_approximation: u8,

    // EnumCS, only present when METH is 1.
    pub enumerated_colour_space: u32,

    // Any bytes following the fields above.
    pub raw: Vec<u8>,
}

impl ColourSpecificationBox {
    pub fn method(&self) -> ColourSpecificationMethods {
        ColourSpecificationMethods::new(self.method)
    }

    pub fn colour_space(&self) -> Option<EnumeratedColourSpaces> {
        match self.method() {
            ColourSpecificationMethods::EnumeratedColourSpace => {
                Some(EnumeratedColourSpaces::new(self.enumerated_colour_space))
            }
            _ => None,
        }
    }

    fn has_enumerated_colour_space(&self) -> bool {
        self.method == METHOD_ENUMERATED_COLOUR_SPACE
    }
}

impl JBox for ColourSpecificationBox {
    // The type of a Colour Specification box shall be ‘colr’ (0x636F 6C72).
    fn identifier(&self) -> BoxType {
        BOX_TYPE_COLOUR_SPECIFICATION
    }

    fn size(&self) -> u32 {
        let enumerated = if self.has_enumerated_colour_space() { 4 } else { 0 };
        11 + enumerated + self.raw.len() as u32
    }

    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), JP2Error> {
        info!("ColourSpecificationBox start at byte offset {}", offset);
        let length = decode_box_length(buffer, offset, BOX_TYPE_COLOUR_SPECIFICATION)?;

        let found = access::read_u32(buffer, offset + 4)?;
        if found != BOX_TYPE_COLOUR_SPECIFICATION {
            return Err(JP2Error::ColourSpecificationMismatch { found, offset });
        }

        self.method = access::read_u8(buffer, offset + 8)?;
        self.precedence = access::read_u8(buffer, offset + 9)?;
        self.colourspace_approximation = access::read_u8(buffer, offset + 10)?;

        if self.precedence != 0 {
            warn!("Precedence {} unexpected", self.precedence);
        }
        if self.colourspace_approximation != 0 {
            warn!(
                "Colourspace approximation {} unexpected",
                self.colourspace_approximation
            );
        }
        debug!("Method {:?}", self.method());

        let mut index = offset + 11;
        match self.method() {
            ColourSpecificationMethods::EnumeratedColourSpace => {
                self.enumerated_colour_space = access::read_u32(buffer, index)?;
                index += 4;
                debug!("Enumerated colour space {:?}", self.colour_space());
            }
            ColourSpecificationMethods::RestrictedICCProfile => {
                return Err(JP2Error::Unsupported {
                    feature: "restricted ICC profile",
                    offset,
                });
            }
            ColourSpecificationMethods::Reserved { value } => {
                debug!("Reserved method {}", value);
            }
        }

        let end = offset + length as usize;
        if end < index {
            return Err(JP2Error::InvalidBoxLength {
                box_type: BOX_TYPE_COLOUR_SPECIFICATION,
                length,
                offset,
            });
        }
        self.raw = access::read_bytes(buffer, index, end)?;

        info!("ColourSpecificationBox finish at byte offset {}", end);
        Ok(())
    }

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        write_box_header(writer, self.size(), BOX_TYPE_COLOUR_SPECIFICATION)?;
        access::write_u8(writer, self.method)?;
        access::write_u8(writer, self.precedence)?;
        access::write_u8(writer, self.colourspace_approximation)?;
        if self.has_enumerated_colour_space() {
            access::write_u32(writer, self.enumerated_colour_space)?;
        }
        writer.write_all(&self.raw)
    }
}

// Largest B^i + 1 allowed for a palette column.
const PALETTE_MAX_BIT_DEPTH: u8 = 38;

// Bytes taken by one palette entry of the given bit depth byte, padded to a
// multiple of 8 bits.
fn palette_entry_width(bit_depth: u8) -> usize {
    (BitDepth::new(bit_depth).value() as usize + 7) / 8
}

/// Palette box.
///
/// The palette specified in this box is applied to a single component to
/// convert it into multiple components.
///
/// See Part 1 Section I.5.3.4 for more information.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaletteBox {
    /// B^i: bit depth of generated component i, minus 1, with the sign in the
    /// high bit. NPC is the length of this list.
    pub bit_depths: Vec<u8>,

    /// C^ji: one row per palette entry, one value per generated component.
    /// NE is the number of rows.
    pub entries: Vec<Vec<u64>>,
}

impl PaletteBox {
    pub fn num_entries(&self) -> u16 {
        self.entries.len() as u16
    }

    pub fn num_components(&self) -> u8 {
        self.bit_depths.len() as u8
    }

    fn row_width(&self) -> usize {
        self.bit_depths
            .iter()
            .map(|bit_depth| palette_entry_width(*bit_depth))
            .sum()
    }
}

impl JBox for PaletteBox {
    // The type of a Palette box shall be ‘pclr’ (0x7063 6C72).
    fn identifier(&self) -> BoxType {
        BOX_TYPE_PALETTE
    }

    fn size(&self) -> u32 {
        (11 + self.bit_depths.len() + self.entries.len() * self.row_width()) as u32
    }

    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), JP2Error> {
        info!("PaletteBox start at byte offset {}", offset);
        let length = decode_box_length(buffer, offset, BOX_TYPE_PALETTE)?;

        let found = access::read_u32(buffer, offset + 4)?;
        if found != BOX_TYPE_PALETTE {
            return Err(JP2Error::PaletteMismatch { found, offset });
        }

        let num_entries = access::read_u16(buffer, offset + 8)? as usize;
        let num_components = access::read_u8(buffer, offset + 10)? as usize;
        self.bit_depths = access::read_bytes(buffer, offset + 11, offset + 11 + num_components)?;
        for (i, bit_depth) in self.bit_depths.iter().enumerate() {
            if BitDepth::new(*bit_depth).value() > PALETTE_MAX_BIT_DEPTH {
                return Err(JP2Error::PaletteBitDepthTooLarge {
                    bit_depth: BitDepth::new(*bit_depth).value(),
                    offset: offset + 11 + i,
                });
            }
        }

        if 11 + num_components + num_entries * self.row_width() != length as usize {
            return Err(JP2Error::InvalidBoxLength {
                box_type: BOX_TYPE_PALETTE,
                length,
                offset,
            });
        }

        let mut index = offset + 11 + num_components;
        self.entries = Vec::with_capacity(num_entries);
        for _ in 0..num_entries {
            let mut row = Vec::with_capacity(num_components);
            for bit_depth in &self.bit_depths {
                let width = palette_entry_width(*bit_depth);
                let value = access::read_bytes(buffer, index, index + width)?
                    .iter()
                    .fold(0u64, |value, byte| (value << 8) | u64::from(*byte));
                row.push(value);
                index += width;
            }
            self.entries.push(row);
        }

        debug!(
            "Palette of {} entries, {} components",
            num_entries, num_components
        );
        info!("PaletteBox finish at byte offset {}", index);
        Ok(())
    }

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        write_box_header(writer, self.size(), BOX_TYPE_PALETTE)?;
        access::write_u16(writer, self.num_entries())?;
        access::write_u8(writer, self.num_components())?;
        writer.write_all(&self.bit_depths)?;

        for row in &self.entries {
            for (value, bit_depth) in row.iter().zip(&self.bit_depths) {
                let width = palette_entry_width(*bit_depth);
                let bytes = value.to_be_bytes();
                if width > bytes.len() {
                    writer.write_all(&vec![0; width - bytes.len()])?;
                }
                writer.write_all(&bytes[bytes.len().saturating_sub(width)..])?;
            }
        }

        Ok(())
    }
}

const COMPONENT_MAP_TYPE_DIRECT: u8 = 0;
const COMPONENT_MAP_TYPE_PALETTE: u8 = 1;

#[derive(Debug, PartialEq)]
pub enum ComponentMapType {
    // Direct use. This channel is created directly from an actual component
    // in the codestream.
    Direct,

    // Palette mapping. This channel is created by applying the palette to an
    // actual component in the codestream.
    Palette,

    // Reserved for ISO use
    Reserved { value: u8 },
}

impl ComponentMapType {
    fn new(value: u8) -> ComponentMapType {
        match value {
            COMPONENT_MAP_TYPE_DIRECT => ComponentMapType::Direct,
            COMPONENT_MAP_TYPE_PALETTE => ComponentMapType::Palette,
            value => ComponentMapType::Reserved { value },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentMap {
    // CMP^i: index of the codestream component mapped to this channel.
    pub component: u16,

    // MTYP^i: how this channel is generated from the component.
    pub mapping_type: u8,

    // PCOL^i: palette column used when MTYP^i is 1, otherwise 0.
    pub palette: u8,
}

impl ComponentMap {
    pub fn kind(&self) -> ComponentMapType {
        ComponentMapType::new(self.mapping_type)
    }
}

/// Component Mapping Box.
///
/// The Component Mapping box defines how image channels are identified from the
/// actual components decoded from the codestream. The number of channels is
/// determined by the length of the box.
///
/// See ISO/IEC 15444-1:2024 Section I.5.3.5.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentMappingBox {
    pub mapping: Vec<ComponentMap>,
}

impl JBox for ComponentMappingBox {
    // The type of a Component Mapping box shall be ‘cmap’ (0x636D 6170).
    fn identifier(&self) -> BoxType {
        BOX_TYPE_COMPONENT_MAPPING
    }

    fn size(&self) -> u32 {
        8 + 4 * self.mapping.len() as u32
    }

    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), JP2Error> {
        info!("ComponentMappingBox start at byte offset {}", offset);
        let length = decode_box_length(buffer, offset, BOX_TYPE_COMPONENT_MAPPING)?;

        let found = access::read_u32(buffer, offset + 4)?;
        if found != BOX_TYPE_COMPONENT_MAPPING {
            return Err(JP2Error::ComponentMappingMismatch { found, offset });
        }

        if (length - 8) % 4 != 0 {
            return Err(JP2Error::InvalidBoxLength {
                box_type: BOX_TYPE_COMPONENT_MAPPING,
                length,
                offset,
            });
        }

        let channels = (length as usize - 8) / 4;
        self.mapping = Vec::with_capacity(channels);
        for i in 0..channels {
            let index = offset + 8 + 4 * i;
            self.mapping.push(ComponentMap {
                component: access::read_u16(buffer, index)?,
                mapping_type: access::read_u8(buffer, index + 2)?,
                palette: access::read_u8(buffer, index + 3)?,
            });
        }

        debug!("{} channels mapped", channels);
        info!(
            "ComponentMappingBox finish at byte offset {}",
            offset + length as usize
        );
        Ok(())
    }

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        write_box_header(writer, self.size(), BOX_TYPE_COMPONENT_MAPPING)?;

        for component_map in &self.mapping {
            access::write_u16(writer, component_map.component)?;
            access::write_u8(writer, component_map.mapping_type)?;
            access::write_u8(writer, component_map.palette)?;
        }

        Ok(())
    }
}

const CHANNEL_TYPE_COLOUR_IMAGE_DATA: u16 = 0;
const CHANNEL_TYPE_OPACITY_DATA: u16 = 1;
const CHANNEL_TYPE_PREMULTIPLIED_OPACITY: u16 = 2;
const CHANNEL_TYPE_UNSPECIFIED: u16 = u16::MAX;

#[derive(Debug, PartialEq)]
pub enum ChannelTypes {
    ColourImageData,
    Opacity,
    PremultipliedOpacity,
    Unspecified,
    Reserved { value: u16 },
}

impl ChannelTypes {
    fn new(value: u16) -> ChannelTypes {
        match value {
            CHANNEL_TYPE_COLOUR_IMAGE_DATA => ChannelTypes::ColourImageData,
            CHANNEL_TYPE_OPACITY_DATA => ChannelTypes::Opacity,
            CHANNEL_TYPE_PREMULTIPLIED_OPACITY => ChannelTypes::PremultipliedOpacity,
            CHANNEL_TYPE_UNSPECIFIED => ChannelTypes::Unspecified,
            value => ChannelTypes::Reserved { value },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Channel {
    // Cn^i: index of the channel for this description.
    pub channel_index: u16,

    // Typ^i: type of the channel.
    pub channel_type: u16,

    // Asoc^i: index of the colour this channel is associated with, 0 for the
    // whole image, 2^16 - 1 for no association.
    pub channel_association: u16,
}

impl Channel {
    pub fn kind(&self) -> ChannelTypes {
        ChannelTypes::new(self.channel_type)
    }
}

// I.5.3.6
//
// Channel Definition Box
//
// The Channel Definition box specifies the meaning of the samples in each
// channel in the image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelDefinitionBox {
    pub channels: Vec<Channel>,
}

impl JBox for ChannelDefinitionBox {
    // The type of a Channel Definition box shall be ‘cdef’ (0x6364 6566).
    fn identifier(&self) -> BoxType {
        BOX_TYPE_CHANNEL_DEFINITION
    }

    fn size(&self) -> u32 {
        10 + 6 * self.channels.len() as u32
    }

    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), JP2Error> {
        info!("ChannelDefinitionBox start at byte offset {}", offset);
        let length = decode_box_length(buffer, offset, BOX_TYPE_CHANNEL_DEFINITION)?;

        let found = access::read_u32(buffer, offset + 4)?;
        if found != BOX_TYPE_CHANNEL_DEFINITION {
            return Err(JP2Error::ChannelDefinitionMismatch { found, offset });
        }

        let num_channels = access::read_u16(buffer, offset + 8)? as usize;
        if 10 + 6 * num_channels != length as usize {
            return Err(JP2Error::InvalidBoxLength {
                box_type: BOX_TYPE_CHANNEL_DEFINITION,
                length,
                offset,
            });
        }

        self.channels = Vec::with_capacity(num_channels);
        for i in 0..num_channels {
            let index = offset + 10 + 6 * i;
            self.channels.push(Channel {
                channel_index: access::read_u16(buffer, index)?,
                channel_type: access::read_u16(buffer, index + 2)?,
                channel_association: access::read_u16(buffer, index + 4)?,
            });
        }

        debug!("{} channel definitions", num_channels);
        info!(
            "ChannelDefinitionBox finish at byte offset {}",
            offset + length as usize
        );
        Ok(())
    }

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        write_box_header(writer, self.size(), BOX_TYPE_CHANNEL_DEFINITION)?;
        access::write_u16(writer, self.channels.len() as u16)?;

        for channel in &self.channels {
            access::write_u16(writer, channel.channel_index)?;
            access::write_u16(writer, channel.channel_type)?;
            access::write_u16(writer, channel.channel_association)?;
        }

        Ok(())
    }
}
