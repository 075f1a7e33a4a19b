use log::{debug, info};
use std::io;
use std::str;

use crate::access;
use crate::{
    CodestreamError, MarkerSymbol, Segment, MARKER_SYMBOL_COC, MARKER_SYMBOL_COD,
    MARKER_SYMBOL_COM, MARKER_SYMBOL_QCC, MARKER_SYMBOL_QCD, MARKER_SYMBOL_SIZ,
};

// Reads the Lxxx field following the marker at `offset` and rejects values
// that do not cover the fixed fields of the segment.
fn decode_length(
    buffer: &[u8],
    offset: usize,
    marker: MarkerSymbol,
    minimum: u16,
) -> Result<u16, CodestreamError> {
    let length = access::read_u16(buffer, offset + 2)?;
    if length < minimum {
        return Err(CodestreamError::InvalidSegmentLength {
            marker,
            length,
            offset,
        });
    }
    Ok(length)
}

#[derive(Debug, PartialEq)]
pub enum ProgressionOrder {
    // 0000 0000 Layer-resolution level-component-position progression
    LRLCPP,

    // 0000 0001 Resolution level-layer-component-position progression
    RLLCPP,

    // 0000 0010 Resolution level-position-component-layer progression
    RLPCLP,

    // 0000 0011 Position-component-resolution level-layer progression
    PCRLLP,

    // 0000 0100 Component-position-resolution level-layer progression
    CPRLLP,

    // All other values reserved
    Reserved { value: u8 },
}

impl ProgressionOrder {
    fn new(value: u8) -> ProgressionOrder {
        match value {
            0b0000_0000 => ProgressionOrder::LRLCPP,
            0b0000_0001 => ProgressionOrder::RLLCPP,
            0b0000_0010 => ProgressionOrder::RLPCLP,
            0b0000_0011 => ProgressionOrder::PCRLLP,
            0b0000_0100 => ProgressionOrder::CPRLLP,
            _ => ProgressionOrder::Reserved { value },
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum CodingBlockStyle {
    // xxxx xxx1 - Selective arithmetic coding bypass
    SelectiveArithmeticCodingBypass,

    // xxxx xx1x - Reset context probabilities on coding pass boundaries
    ResetContextProbabilities,

    // xxxx x1xx - Termination on each coding pass
    TerminationOnEachCodingPass,

    // xxxx 1xxx - Vertically causal context
    VerticallyCausalContext,

    // xxx1 xxxx - Predictable termination
    PredictableTermination,

    // xx1x xxxx - Segmentation symbols are used
    SegmentationSymbolsAreUsed,
}

impl CodingBlockStyle {
    // Only the switched-on styles are listed; an empty list is the default
    // coding pass style.
    fn new(value: u8) -> Vec<CodingBlockStyle> {
        [
            (0b_0000_0001, CodingBlockStyle::SelectiveArithmeticCodingBypass),
            (0b_0000_0010, CodingBlockStyle::ResetContextProbabilities),
            (0b_0000_0100, CodingBlockStyle::TerminationOnEachCodingPass),
            (0b_0000_1000, CodingBlockStyle::VerticallyCausalContext),
            (0b_0001_0000, CodingBlockStyle::PredictableTermination),
            (0b_0010_0000, CodingBlockStyle::SegmentationSymbolsAreUsed),
        ]
        .into_iter()
        .filter(|(mask, _)| value & *mask != 0)
        .map(|(_, style)| style)
        .collect()
    }
}

const MULTIPLE_COMPONENT_TRANSFORMATION_NONE: u8 = 0b_0000_0000;
const MULTIPLE_COMPONENT_TRANSFORMATION_MULTIPLE: u8 = 0b_0000_0001;

#[derive(Debug, PartialEq)]
pub enum MultipleComponentTransformation {
    // No multiple component transformation specified.
    None,

    // Component transformation used on components 0, 1, 2 for coding efficiency.
    Multiple,

    // All other values reserved
    Reserved { value: u8 },
}

impl MultipleComponentTransformation {
    fn new(value: u8) -> MultipleComponentTransformation {
        match value {
            MULTIPLE_COMPONENT_TRANSFORMATION_NONE => MultipleComponentTransformation::None,
            MULTIPLE_COMPONENT_TRANSFORMATION_MULTIPLE => MultipleComponentTransformation::Multiple,
            _ => MultipleComponentTransformation::Reserved { value },
        }
    }
}

const TRANSFORMATION_FILTER_IRREVERSIBLE: u8 = 0;
const TRANSFORMATION_FILTER_REVERSIBLE: u8 = 1;

#[derive(Debug, PartialEq)]
pub enum TransformationFilter {
    // 9-7 irreversible filter
    Irreversible,

    // 5-3 reversible filter
    Reversible,

    // All other values reserved
    Reserved { value: u8 },
}

impl TransformationFilter {
    fn new(value: u8) -> TransformationFilter {
        match value {
            TRANSFORMATION_FILTER_IRREVERSIBLE => TransformationFilter::Irreversible,
            TRANSFORMATION_FILTER_REVERSIBLE => TransformationFilter::Reversible,
            _ => TransformationFilter::Reserved { value },
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum QuantizationStyle {
    No { guard: u8 },
    ScalarDerived { guard: u8 },
    ScalarExpounded { guard: u8 },
    Reserved { value: u8 },
}

impl QuantizationStyle {
    fn new(byte: u8) -> QuantizationStyle {
        // 000x xxxx to 111x xxxx, Number of guard bits: 0 to 7
        let guard = byte >> 5;

        match byte & 0b0001_1111 {
            // No quantization
            0b0000_0000 => QuantizationStyle::No { guard },

            // Scalar derived (values signalled for NLLL subband only).
            0b0000_0001 => QuantizationStyle::ScalarDerived { guard },

            // Scalar expounded (values signalled for each subband).
            0b0000_0010 => QuantizationStyle::ScalarExpounded { guard },

            _ => QuantizationStyle::Reserved { value: byte },
        }
    }
}

const COMMENT_REGISTRATION_BINARY: u16 = 0;
const COMMENT_REGISTRATION_LATIN: u16 = 1;

#[derive(Debug, PartialEq)]
pub enum CommentRegistrationValue {
    // General use (binary values)
    Binary,

    // General use (ISO 8859-15:1999 (Latin) values)
    Latin,

    // All other values reserved
    Reserved { value: u16 },
}

impl CommentRegistrationValue {
    fn new(value: u16) -> CommentRegistrationValue {
        // See ISO/IEC 15444-1:2019 Table A.44
        match value {
            COMMENT_REGISTRATION_BINARY => CommentRegistrationValue::Binary,
            COMMENT_REGISTRATION_LATIN => CommentRegistrationValue::Latin,
            _ => CommentRegistrationValue::Reserved { value },
        }
    }
}

// Ssiz, XRsiz and YRsiz of a single component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentSize {
    // Ssiz: Precision (depth) in bits and sign of the component samples.
    pub precision: u8,

    // XRsiz: Horizontal separation of a sample with respect to the reference
    // grid.
    pub horizontal_separation: u8,

    // YRsiz: Vertical separation of a sample with respect to the reference
    // grid.
    pub vertical_separation: u8,
}

impl ComponentSize {
    pub fn bit_depth(&self) -> u8 {
        (self.precision & 0b0111_1111) + 1
    }

    pub fn values_are_signed(&self) -> bool {
        self.precision & 0b1000_0000 != 0
    }
}

// A.5.1
//
// Image and tile size (SIZ)
//
// Function: Provides information about the uncompressed image such as the
// width and height of the reference grid, the width and height of the tiles,
// the number of components, component bit depth, and the separation of
// component samples with respect to the reference grid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageAndTileSize {
    // Lsiz: Length of marker segment in bytes (not including the marker).
    pub length: u16,

    // Rsiz: Denotes capabilities that a decoder needs to properly decode the
    // codestream.
    pub decoder_capabilities: u16,

    // XSiz: Width of the reference grid.
    pub reference_grid_width: u32,

    // YSiz: Height of the reference grid.
    pub reference_grid_height: u32,

    // XOsiz: Horizontal offset from the origin of the reference grid to the
    // left side of the image area.
    pub image_horizontal_offset: u32,

    // YOsiz: Vertical offset from the origin of the reference grid to the top
    // side of the image area.
    pub image_vertical_offset: u32,

    // XTsiz: Width of one reference tile with respect to the reference grid
    pub reference_tile_width: u32,

    // YTsiz: Height of one reference tile with respect to the reference grid.
    pub reference_tile_height: u32,

    // XTOsiz: Horizontal offset from the origin of the reference grid to the
    // left side of the first tile.
    pub tile_horizontal_offset: u32,

    // YTOsiz: Vertical offset from the origin of the reference grid to the
    // top side of the first tile.
    pub tile_vertical_offset: u32,

    // Csiz is the length of this list.
    pub components: Vec<ComponentSize>,
}

impl ImageAndTileSize {
    pub fn no_components(&self) -> u16 {
        self.components.len() as u16
    }

    /// Number of tiles along each axis of the reference grid.
    pub fn no_tiles(&self) -> (u32, u32) {
        let tiles = |extent: u32, tile_offset: u32, tile_size: u32| {
            if tile_size == 0 {
                return 0;
            }
            let covered = u64::from(extent.saturating_sub(tile_offset));
            let tiles = (covered + u64::from(tile_size) - 1) / u64::from(tile_size);
            tiles as u32
        };
        (
            tiles(
                self.reference_grid_width,
                self.tile_horizontal_offset,
                self.reference_tile_width,
            ),
            tiles(
                self.reference_grid_height,
                self.tile_vertical_offset,
                self.reference_tile_height,
            ),
        )
    }
}

impl Segment for ImageAndTileSize {
    fn marker(&self) -> MarkerSymbol {
        MARKER_SYMBOL_SIZ
    }

    fn size(&self) -> u32 {
        40 + 3 * self.components.len() as u32
    }

    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), CodestreamError> {
        let found = access::read_u16(buffer, offset)?;
        if found != MARKER_SYMBOL_SIZ {
            return Err(CodestreamError::SizMismatch { found, offset });
        }
        info!("SIZ start at byte offset {}", offset);

        self.length = decode_length(buffer, offset, MARKER_SYMBOL_SIZ, 38)?;
        self.decoder_capabilities = access::read_u16(buffer, offset + 4)?;
        self.reference_grid_width = access::read_u32(buffer, offset + 6)?;
        self.reference_grid_height = access::read_u32(buffer, offset + 10)?;
        self.image_horizontal_offset = access::read_u32(buffer, offset + 14)?;
        self.image_vertical_offset = access::read_u32(buffer, offset + 18)?;
        self.reference_tile_width = access::read_u32(buffer, offset + 22)?;
        self.reference_tile_height = access::read_u32(buffer, offset + 26)?;
        self.tile_horizontal_offset = access::read_u32(buffer, offset + 30)?;
        self.tile_vertical_offset = access::read_u32(buffer, offset + 34)?;

        let no_components = access::read_u16(buffer, offset + 38)?;

        // Lsiz = 38 + 3 * Csiz
        if u32::from(self.length) != 38 + 3 * u32::from(no_components) {
            return Err(CodestreamError::InvalidSegmentLength {
                marker: MARKER_SYMBOL_SIZ,
                length: self.length,
                offset,
            });
        }

        self.components = Vec::with_capacity(no_components as usize);
        for i in 0..no_components as usize {
            let component_offset = offset + 40 + i * 3;
            self.components.push(ComponentSize {
                precision: access::read_u8(buffer, component_offset)?,
                horizontal_separation: access::read_u8(buffer, component_offset + 1)?,
                vertical_separation: access::read_u8(buffer, component_offset + 2)?,
            });
        }

        debug!(
            "Reference grid {}x{}, tile {}x{}, {} components",
            self.reference_grid_width,
            self.reference_grid_height,
            self.reference_tile_width,
            self.reference_tile_height,
            no_components
        );
        info!("SIZ end at byte offset {}", offset + self.size() as usize);

        Ok(())
    }

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        access::write_u16(writer, MARKER_SYMBOL_SIZ)?;
        access::write_u16(writer, self.length)?;
        access::write_u16(writer, self.decoder_capabilities)?;
        access::write_u32(writer, self.reference_grid_width)?;
        access::write_u32(writer, self.reference_grid_height)?;
        access::write_u32(writer, self.image_horizontal_offset)?;
        access::write_u32(writer, self.image_vertical_offset)?;
        access::write_u32(writer, self.reference_tile_width)?;
        access::write_u32(writer, self.reference_tile_height)?;
        access::write_u32(writer, self.tile_horizontal_offset)?;
        access::write_u32(writer, self.tile_vertical_offset)?;
        access::write_u16(writer, self.no_components())?;

        for component in &self.components {
            access::write_u8(writer, component.precision)?;
            access::write_u8(writer, component.horizontal_separation)?;
            access::write_u8(writer, component.vertical_separation)?;
        }

        Ok(())
    }
}

// A.6.1
//
// Coding style default (COD)
//
// Function: Describes the coding style, number of decomposition levels,
// and layering that is the default used for compressing all components of
// an image (if in the main header) or a tile (if in the tile-part header).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodingStyleDefault {
    // Lcod
    pub length: u16,

    // Scod: Coding style for all components
    pub coding_style: u8,

    // SGcod: Progression order, number of layers and multiple component
    // transformation.
    pub progression_order: u8,
    pub no_layers: u16,
    pub multiple_component_transformation: u8,

    // SPcod
    pub no_decomposition_levels: u8,
    pub code_block_width: u8,
    pub code_block_height: u8,
    pub code_block_style: u8,
    pub transformation: u8,

    // If Scod = xxxx xxx0 this is normally empty; otherwise one byte per
    // resolution level with the precinct width and height exponents. Any
    // bytes up to Lcod are kept here.
    pub precinct_sizes: Vec<u8>,
}

impl CodingStyleDefault {
    // xxxx xxx1 Entropy coder with precincts defined below
    pub fn has_defined_precincts(&self) -> bool {
        self.coding_style & 0b0001 == 0b0001
    }

    // xxxx xx1x SOP marker segments may be used
    pub fn may_use_sop(&self) -> bool {
        self.coding_style & 0b0010 == 0b0010
    }

    // xxxx x1xx EPH marker may be used
    pub fn may_use_eph(&self) -> bool {
        self.coding_style & 0b0100 == 0b0100
    }

    pub fn progression(&self) -> ProgressionOrder {
        ProgressionOrder::new(self.progression_order)
    }

    pub fn component_transformation(&self) -> MultipleComponentTransformation {
        MultipleComponentTransformation::new(self.multiple_component_transformation)
    }

    pub fn transformation_filter(&self) -> TransformationFilter {
        TransformationFilter::new(self.transformation)
    }

    pub fn coding_block_styles(&self) -> Vec<CodingBlockStyle> {
        CodingBlockStyle::new(self.code_block_style)
    }

    // Code-block width and height exponent offset value xcb = value + 2 or
    // ycb = value + 2.
    pub fn code_block_dimensions(&self) -> (u16, u16) {
        (
            2u16.pow(((self.code_block_width & 0b00001111) + 2) as u32),
            2u16.pow(((self.code_block_height & 0b00001111) + 2) as u32),
        )
    }
}

impl Segment for CodingStyleDefault {
    fn marker(&self) -> MarkerSymbol {
        MARKER_SYMBOL_COD
    }

    fn size(&self) -> u32 {
        u32::from(self.length) + 2
    }

    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), CodestreamError> {
        let found = access::read_u16(buffer, offset)?;
        if found != MARKER_SYMBOL_COD {
            return Err(CodestreamError::CodMismatch { found, offset });
        }
        info!("COD start at byte offset {}", offset);

        self.length = decode_length(buffer, offset, MARKER_SYMBOL_COD, 12)?;
        self.coding_style = access::read_u8(buffer, offset + 4)?;
        self.progression_order = access::read_u8(buffer, offset + 5)?;
        self.no_layers = access::read_u16(buffer, offset + 6)?;
        self.multiple_component_transformation = access::read_u8(buffer, offset + 8)?;
        self.no_decomposition_levels = access::read_u8(buffer, offset + 9)?;
        self.code_block_width = access::read_u8(buffer, offset + 10)?;
        self.code_block_height = access::read_u8(buffer, offset + 11)?;
        self.code_block_style = access::read_u8(buffer, offset + 12)?;
        self.transformation = access::read_u8(buffer, offset + 13)?;
        self.precinct_sizes =
            access::read_bytes(buffer, offset + 14, offset + self.size() as usize)?;

        debug!("Coding style {:#010b}", self.coding_style);
        debug!("Progression order {:?}", self.progression());
        debug!("Decomposition levels {}", self.no_decomposition_levels);
        info!("COD end at byte offset {}", offset + self.size() as usize);

        Ok(())
    }

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        access::write_u16(writer, MARKER_SYMBOL_COD)?;
        access::write_u16(writer, self.length)?;
        access::write_u8(writer, self.coding_style)?;
        access::write_u8(writer, self.progression_order)?;
        access::write_u16(writer, self.no_layers)?;
        access::write_u8(writer, self.multiple_component_transformation)?;
        access::write_u8(writer, self.no_decomposition_levels)?;
        access::write_u8(writer, self.code_block_width)?;
        access::write_u8(writer, self.code_block_height)?;
        access::write_u8(writer, self.code_block_style)?;
        access::write_u8(writer, self.transformation)?;
        writer.write_all(&self.precinct_sizes)
    }
}

// A.6.2
//
// Coding style component (COC)
//
// Function: Describes the coding style, number of decomposition levels, and
// layering used for compressing a particular component. Ccoc, Scoc and SPcoc
// are kept undecoded since the width of Ccoc depends on Csiz.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodingStyleComponent {
    // Lcoc
    pub length: u16,
    pub raw: Vec<u8>,
}

impl Segment for CodingStyleComponent {
    fn marker(&self) -> MarkerSymbol {
        MARKER_SYMBOL_COC
    }

    fn size(&self) -> u32 {
        u32::from(self.length) + 2
    }

    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), CodestreamError> {
        let found = access::read_u16(buffer, offset)?;
        if found != MARKER_SYMBOL_COC {
            return Err(CodestreamError::CocMismatch { found, offset });
        }
        info!("COC start at byte offset {}", offset);

        self.length = decode_length(buffer, offset, MARKER_SYMBOL_COC, 2)?;
        self.raw = access::read_bytes(buffer, offset + 4, offset + self.size() as usize)?;

        info!("COC end at byte offset {}", offset + self.size() as usize);
        Ok(())
    }

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        access::write_u16(writer, MARKER_SYMBOL_COC)?;
        access::write_u16(writer, self.length)?;
        writer.write_all(&self.raw)
    }
}

// A.6.4
//
// Quantization default (QCD)
//
// Function: Describes the quantization default used for compressing all
// components not defined by a QCC marker segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuantizationDefault {
    // Lqcd: Length of marker segment in bytes (not including the marker).
    pub length: u16,

    // Sqcd: Quantization style for all components
    pub quantization_style: u8,

    // SPqcd: Quantization step size values, one per subband.
    pub raw: Vec<u8>,
}

impl QuantizationDefault {
    pub fn style(&self) -> QuantizationStyle {
        QuantizationStyle::new(self.quantization_style)
    }
}

impl Segment for QuantizationDefault {
    fn marker(&self) -> MarkerSymbol {
        MARKER_SYMBOL_QCD
    }

    fn size(&self) -> u32 {
        u32::from(self.length) + 2
    }

    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), CodestreamError> {
        let found = access::read_u16(buffer, offset)?;
        if found != MARKER_SYMBOL_QCD {
            return Err(CodestreamError::QcdMismatch { found, offset });
        }
        info!("QCD start at byte offset {}", offset);

        self.length = decode_length(buffer, offset, MARKER_SYMBOL_QCD, 3)?;
        self.quantization_style = access::read_u8(buffer, offset + 4)?;
        self.raw = access::read_bytes(buffer, offset + 5, offset + self.size() as usize)?;

        debug!("Quantization style {:?}", self.style());
        info!("QCD end at byte offset {}", offset + self.size() as usize);
        Ok(())
    }

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        access::write_u16(writer, MARKER_SYMBOL_QCD)?;
        access::write_u16(writer, self.length)?;
        access::write_u8(writer, self.quantization_style)?;
        writer.write_all(&self.raw)
    }
}

// A.6.5
//
// Quantization component (QCC)
//
// Function: Describes the quantization used for compressing a particular
// component
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuantizationComponent {
    // Lqcc
    pub length: u16,

    // Cqcc, Sqcc and SPqcc
    pub raw: Vec<u8>,
}

impl Segment for QuantizationComponent {
    fn marker(&self) -> MarkerSymbol {
        MARKER_SYMBOL_QCC
    }

    fn size(&self) -> u32 {
        u32::from(self.length) + 2
    }

    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), CodestreamError> {
        let found = access::read_u16(buffer, offset)?;
        if found != MARKER_SYMBOL_QCC {
            return Err(CodestreamError::QccMismatch { found, offset });
        }
        info!("QCC start at byte offset {}", offset);

        self.length = decode_length(buffer, offset, MARKER_SYMBOL_QCC, 2)?;
        self.raw = access::read_bytes(buffer, offset + 4, offset + self.size() as usize)?;

        info!("QCC end at byte offset {}", offset + self.size() as usize);
        Ok(())
    }

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        access::write_u16(writer, MARKER_SYMBOL_QCC)?;
        access::write_u16(writer, self.length)?;
        writer.write_all(&self.raw)
    }
}

// A.9.2
//
// Comment (COM)
//
// Allows unstructured data in the main and tile-part header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comment {
    // Lcom
    pub length: u16,

    // Rcom: Registration value of the marker segment
    pub registration_value: u16,

    // Ccomi: Byte of unstructured data
    pub comment: Vec<u8>,
}

impl Comment {
    /// Builds a Latin comment holding `text`.
    pub fn from_text(text: &str) -> Result<Comment, CodestreamError> {
        let mut comment = Comment::default();
        comment.set_text(text)?;
        Ok(comment)
    }

    /// Replaces the comment with `text`, registered as Latin, and updates
    /// Lcom to match.
    pub fn set_text(&mut self, text: &str) -> Result<(), CodestreamError> {
        self.length = u16::try_from(text.len() + 4)
            .map_err(|_| CodestreamError::CommentTooLong { length: text.len() })?;
        self.registration_value = COMMENT_REGISTRATION_LATIN;
        self.comment = text.as_bytes().to_vec();
        Ok(())
    }

    pub fn registration(&self) -> CommentRegistrationValue {
        CommentRegistrationValue::new(self.registration_value)
    }

    pub fn is_binary(&self) -> bool {
        self.registration_value == COMMENT_REGISTRATION_BINARY
    }

    pub fn is_latin(&self) -> bool {
        self.registration_value == COMMENT_REGISTRATION_LATIN
    }

    pub fn comment_utf8(&self) -> Result<&str, str::Utf8Error> {
        str::from_utf8(&self.comment)
    }
}

impl Segment for Comment {
    fn marker(&self) -> MarkerSymbol {
        MARKER_SYMBOL_COM
    }

    fn size(&self) -> u32 {
        u32::from(self.length) + 2
    }

    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), CodestreamError> {
        let found = access::read_u16(buffer, offset)?;
        if found != MARKER_SYMBOL_COM {
            return Err(CodestreamError::ComMismatch { found, offset });
        }
        info!("COM start at byte offset {}", offset);

        self.length = decode_length(buffer, offset, MARKER_SYMBOL_COM, 4)?;
        self.registration_value = access::read_u16(buffer, offset + 4)?;
        self.comment = access::read_bytes(buffer, offset + 6, offset + self.size() as usize)?;

        debug!("Comment registration {:?}", self.registration());
        info!("COM end at byte offset {}", offset + self.size() as usize);
        Ok(())
    }

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        access::write_u16(writer, MARKER_SYMBOL_COM)?;
        access::write_u16(writer, self.length)?;
        access::write_u16(writer, self.registration_value)?;
        writer.write_all(&self.comment)
    }
}

/// A length-prefixed marker segment carried through without interpretation,
/// such as RGN, POC or PPT in a tile-part header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpaqueSegment {
    pub marker: MarkerSymbol,
    pub length: u16,
    pub raw: Vec<u8>,
}

impl OpaqueSegment {
    pub fn new(marker: MarkerSymbol) -> OpaqueSegment {
        OpaqueSegment {
            marker,
            ..Default::default()
        }
    }
}

impl Segment for OpaqueSegment {
    fn marker(&self) -> MarkerSymbol {
        self.marker
    }

    fn size(&self) -> u32 {
        u32::from(self.length) + 2
    }

    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), CodestreamError> {
        let found = access::read_u16(buffer, offset)?;
        if found != self.marker {
            return Err(CodestreamError::SegmentMismatch {
                expected: self.marker,
                found,
                offset,
            });
        }
        info!("0x{:04X} start at byte offset {}", self.marker, offset);

        self.length = decode_length(buffer, offset, self.marker, 2)?;
        self.raw = access::read_bytes(buffer, offset + 4, offset + self.size() as usize)?;

        info!(
            "0x{:04X} end at byte offset {}",
            self.marker,
            offset + self.size() as usize
        );
        Ok(())
    }

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        access::write_u16(writer, self.marker)?;
        access::write_u16(writer, self.length)?;
        writer.write_all(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MARKER_SYMBOL_POC;

    #[test]
    fn test_siz_round_trip() {
        let buffer = [
            0xFF, 0x51, 0x00, 0x29, 0x00, 0x00, // SIZ, Lsiz = 41, Rsiz
            0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x00, 0x80, // Xsiz, Ysiz
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // XOsiz, YOsiz
            0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x00, 0x80, // XTsiz, YTsiz
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // XTOsiz, YTOsiz
            0x00, 0x01, 0x87, 0x01, 0x01, // Csiz, Ssiz, XRsiz, YRsiz
        ];
        let mut siz = ImageAndTileSize::default();
        siz.load(&buffer, 0).unwrap();

        assert_eq!(siz.size() as usize, buffer.len());
        assert_eq!(siz.reference_grid_width, 64);
        assert_eq!(siz.reference_grid_height, 128);
        assert_eq!(siz.no_components(), 1);
        assert_eq!(siz.components[0].bit_depth(), 8);
        assert!(siz.components[0].values_are_signed());
        assert_eq!(siz.no_tiles(), (1, 1));

        let mut saved = vec![];
        siz.save(&mut saved).unwrap();
        assert_eq!(saved, buffer);
    }

    #[test]
    fn test_siz_length_must_match_components() {
        let mut buffer = vec![0xFF, 0x51, 0x00, 0x2A];
        buffer.extend_from_slice(&[0; 34]);
        buffer.extend_from_slice(&[0x00, 0x01, 0x07, 0x01, 0x01, 0x00]);

        let mut siz = ImageAndTileSize::default();
        assert_eq!(
            siz.load(&buffer, 0),
            Err(CodestreamError::InvalidSegmentLength {
                marker: MARKER_SYMBOL_SIZ,
                length: 42,
                offset: 0
            })
        );
    }

    #[test]
    fn test_no_tiles_at_grid_limit() {
        let siz = ImageAndTileSize {
            reference_grid_width: u32::MAX,
            reference_grid_height: u32::MAX,
            reference_tile_width: u32::MAX,
            reference_tile_height: 2,
            tile_vertical_offset: 1,
            ..Default::default()
        };

        assert_eq!(siz.no_tiles(), (1, 0x7FFF_FFFF));
    }

    #[test]
    fn test_cod_fields() {
        let buffer = [
            0xFF, 0x52, 0x00, 0x0E, // COD, Lcod = 14
            0x01, 0x02, 0x00, 0x03, 0x01, // Scod, SGcod
            0x01, 0x04, 0x04, 0x00, 0x01, // SPcod
            0x77, 0x88, // precinct sizes
        ];
        let mut cod = CodingStyleDefault::default();
        cod.load(&buffer, 0).unwrap();

        assert!(cod.has_defined_precincts());
        assert!(!cod.may_use_sop());
        assert!(!cod.may_use_eph());
        assert_eq!(cod.progression(), ProgressionOrder::RLPCLP);
        assert_eq!(cod.no_layers, 3);
        assert_eq!(
            cod.component_transformation(),
            MultipleComponentTransformation::Multiple
        );
        assert_eq!(cod.transformation_filter(), TransformationFilter::Reversible);
        assert_eq!(cod.code_block_dimensions(), (64, 64));
        assert!(cod.coding_block_styles().is_empty());
        assert_eq!(cod.precinct_sizes, vec![0x77, 0x88]);
        assert_eq!(cod.size() as usize, buffer.len());

        let mut saved = vec![];
        cod.save(&mut saved).unwrap();
        assert_eq!(saved, buffer);
    }

    #[test]
    fn test_qcd_wrong_marker() {
        let buffer = [0xFF, 0x5D, 0x00, 0x04, 0x00, 0x00];
        let mut qcd = QuantizationDefault::default();

        assert_eq!(
            qcd.load(&buffer, 0),
            Err(CodestreamError::QcdMismatch {
                found: 0xFF5D,
                offset: 0
            })
        );
    }

    #[test]
    fn test_qcd_style() {
        let buffer = [0xFF, 0x5C, 0x00, 0x05, 0x42, 0x48, 0x50];
        let mut qcd = QuantizationDefault::default();
        qcd.load(&buffer, 0).unwrap();

        assert_eq!(qcd.style(), QuantizationStyle::ScalarExpounded { guard: 2 });
        assert_eq!(qcd.raw, vec![0x48, 0x50]);
    }

    #[test]
    fn test_segment_tail_past_buffer() {
        let buffer = [0xFF, 0x5D, 0x00, 0x08, 0x00, 0x00];
        let mut qcc = QuantizationComponent::default();

        assert!(matches!(
            qcc.load(&buffer, 0),
            Err(CodestreamError::BufferOverrun(_))
        ));
    }

    #[test]
    fn test_comment_from_text() {
        let comment = Comment::from_text("Created by hand").unwrap();

        assert_eq!(comment.length, 19);
        assert!(comment.is_latin());
        assert!(!comment.is_binary());
        assert_eq!(comment.registration(), CommentRegistrationValue::Latin);
        assert_eq!(comment.size(), 21);

        let mut saved = vec![];
        comment.save(&mut saved).unwrap();

        let mut reloaded = Comment::default();
        reloaded.load(&saved, 0).unwrap();
        assert_eq!(reloaded.comment_utf8(), Ok("Created by hand"));
        assert_eq!(reloaded, comment);
    }

    #[test]
    fn test_comment_too_long() {
        let text = "x".repeat(65532);

        assert_eq!(
            Comment::from_text(&text),
            Err(CodestreamError::CommentTooLong { length: 65532 })
        );
    }

    #[test]
    fn test_opaque_segment() {
        let buffer = [0xFF, 0x5F, 0x00, 0x04, 0xAB, 0xCD, 0xFF, 0x93];
        let mut poc = OpaqueSegment::new(MARKER_SYMBOL_POC);
        poc.load(&buffer, 0).unwrap();

        assert_eq!(poc.size(), 6);
        assert_eq!(poc.raw, vec![0xAB, 0xCD]);

        let mut other = OpaqueSegment::new(MARKER_SYMBOL_POC);
        assert_eq!(
            other.load(&buffer, 6),
            Err(CodestreamError::SegmentMismatch {
                expected: MARKER_SYMBOL_POC,
                found: 0xFF93,
                offset: 6
            })
        );
    }
}
