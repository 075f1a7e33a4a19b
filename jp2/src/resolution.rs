use log::{debug, info};
use std::io;

use jpc::access;

use crate::{
    decode_box_length, write_box_header, BoxType, JBox, JP2Error, BOX_TYPE_CAPTURE_RESOLUTION,
    BOX_TYPE_DEFAULT_DISPLAY_RESOLUTION, BOX_TYPE_RESOLUTION,
};

const GRID_RESOLUTION_LENGTH: u32 = 18;

/// Capture (`resc`) or default display (`resd`) resolution box.
///
/// Both boxes share one layout; resolution is expressed in grid points per
/// metre as `numerator / denominator * 10^exponent` for each direction.
///
/// See ISO/IEC 15444-1 I.5.3.7.1 and I.5.3.7.2.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridResolutionBox<const BOX: BoxType> {
    // VR_N
    pub vertical_numerator: u16,

    // VR_D
    pub vertical_denominator: u16,

    // HR_N
    pub horizontal_numerator: u16,

    // HR_D
    pub horizontal_denominator: u16,

    // VR_E
    pub vertical_exponent: i8,

    // HR_E
    pub horizontal_exponent: i8,
}

pub type CaptureResolutionBox = GridResolutionBox<BOX_TYPE_CAPTURE_RESOLUTION>;
pub type DefaultDisplayResolutionBox = GridResolutionBox<BOX_TYPE_DEFAULT_DISPLAY_RESOLUTION>;

fn grid_resolution(numerator: u16, denominator: u16, exponent: i8) -> f64 {
    f64::from(numerator) / f64::from(denominator) * 10f64.powi(i32::from(exponent))
}

impl<const BOX: BoxType> GridResolutionBox<BOX> {
    /// Vertical grid points per metre.
    pub fn vertical_resolution(&self) -> f64 {
        grid_resolution(
            self.vertical_numerator,
            self.vertical_denominator,
            self.vertical_exponent,
        )
    }

    /// Horizontal grid points per metre.
    pub fn horizontal_resolution(&self) -> f64 {
        grid_resolution(
            self.horizontal_numerator,
            self.horizontal_denominator,
            self.horizontal_exponent,
        )
    }

    fn mismatch(found: BoxType, offset: usize) -> JP2Error {
        if BOX == BOX_TYPE_CAPTURE_RESOLUTION {
            JP2Error::CaptureResolutionMismatch { found, offset }
        } else {
            JP2Error::DefaultDisplayResolutionMismatch { found, offset }
        }
    }
}

impl<const BOX: BoxType> JBox for GridResolutionBox<BOX> {
    fn identifier(&self) -> BoxType {
        BOX
    }

    fn size(&self) -> u32 {
        GRID_RESOLUTION_LENGTH
    }

    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), JP2Error> {
        let length = decode_box_length(buffer, offset, BOX)?;

        let found = access::read_u32(buffer, offset + 4)?;
        if found != BOX {
            return Err(Self::mismatch(found, offset));
        }

        if length != GRID_RESOLUTION_LENGTH {
            return Err(JP2Error::InvalidBoxLength {
                box_type: BOX,
                length,
                offset,
            });
        }

        self.vertical_numerator = access::read_u16(buffer, offset + 8)?;
        self.vertical_denominator = access::read_u16(buffer, offset + 10)?;
        self.horizontal_numerator = access::read_u16(buffer, offset + 12)?;
        self.horizontal_denominator = access::read_u16(buffer, offset + 14)?;
        self.vertical_exponent = access::read_u8(buffer, offset + 16)? as i8;
        self.horizontal_exponent = access::read_u8(buffer, offset + 17)? as i8;

        debug!(
            "Grid resolution {} x {} points per metre",
            self.horizontal_resolution(),
            self.vertical_resolution()
        );
        Ok(())
    }

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        write_box_header(writer, GRID_RESOLUTION_LENGTH, BOX)?;
        access::write_u16(writer, self.vertical_numerator)?;
        access::write_u16(writer, self.vertical_denominator)?;
        access::write_u16(writer, self.horizontal_numerator)?;
        access::write_u16(writer, self.horizontal_denominator)?;
        access::write_u8(writer, self.vertical_exponent as u8)?;
        access::write_u8(writer, self.horizontal_exponent as u8)
    }
}

// I.5.3.7
//
// Resolution box (superbox)
//
// This box specifies the capture and default display grid resolutions of this
// image. It holds at least one of the two. Saving writes the capture
// resolution first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionBox {
    // Capture Resolution box.
    //
    // This box specifies the grid resolution at which this image was captured.
    pub capture_resolution: Option<CaptureResolutionBox>,

    // Default Display Resolution box.
    //
    // This box specifies the default grid resolution at which this image
    // should be displayed.
    pub default_display_resolution: Option<DefaultDisplayResolutionBox>,
}

impl JBox for ResolutionBox {
    // The type of a Resolution box shall be ‘res\040’ (0x7265 7320).
    fn identifier(&self) -> BoxType {
        BOX_TYPE_RESOLUTION
    }

    fn size(&self) -> u32 {
        8 + self
            .capture_resolution
            .as_ref()
            .map_or(0, |capture_resolution| capture_resolution.size())
            + self
                .default_display_resolution
                .as_ref()
                .map_or(0, |default_display_resolution| {
                    default_display_resolution.size()
                })
    }

    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), JP2Error> {
        info!("ResolutionBox start at byte offset {}", offset);
        let length = decode_box_length(buffer, offset, BOX_TYPE_RESOLUTION)?;

        let found = access::read_u32(buffer, offset + 4)?;
        if found != BOX_TYPE_RESOLUTION {
            return Err(JP2Error::ResolutionMismatch { found, offset });
        }

        let end = offset + length as usize;
        let mut index = offset + 8;
        self.capture_resolution = None;
        self.default_display_resolution = None;

        while index < end {
            let box_type = access::read_u32(buffer, index + 4)?;
            match box_type {
                BOX_TYPE_CAPTURE_RESOLUTION if self.capture_resolution.is_none() => {
                    info!("CaptureResolutionBox start at byte offset {}", index);
                    let mut capture_resolution = CaptureResolutionBox::default();
                    capture_resolution.load(buffer, index)?;
                    index += capture_resolution.size() as usize;
                    self.capture_resolution = Some(capture_resolution);
                    info!("CaptureResolutionBox finish at byte offset {}", index);
                }
                BOX_TYPE_DEFAULT_DISPLAY_RESOLUTION
                    if self.default_display_resolution.is_none() =>
                {
                    info!("DefaultDisplayResolutionBox start at byte offset {}", index);
                    let mut default_display_resolution = DefaultDisplayResolutionBox::default();
                    default_display_resolution.load(buffer, index)?;
                    index += default_display_resolution.size() as usize;
                    self.default_display_resolution = Some(default_display_resolution);
                    info!("DefaultDisplayResolutionBox finish at byte offset {}", index);
                }
                BOX_TYPE_CAPTURE_RESOLUTION | BOX_TYPE_DEFAULT_DISPLAY_RESOLUTION => {
                    return Err(JP2Error::BoxDuplicate {
                        box_type,
                        offset: index,
                    });
                }
                _ => {
                    return Err(JP2Error::UnknownBox {
                        box_type,
                        offset: index,
                    });
                }
            }
        }

        if index != end {
            return Err(JP2Error::BoxOverrun {
                box_type: BOX_TYPE_RESOLUTION,
                end,
                offset: index,
            });
        }
        if self.capture_resolution.is_none() && self.default_display_resolution.is_none() {
            return Err(JP2Error::ResolutionEmpty { offset });
        }

        info!("ResolutionBox finish at byte offset {}", end);
        Ok(())
    }

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        write_box_header(writer, self.size(), BOX_TYPE_RESOLUTION)?;

        if let Some(capture_resolution) = &self.capture_resolution {
            capture_resolution.save(writer)?;
        }
        if let Some(default_display_resolution) = &self.default_display_resolution {
            default_display_resolution.save(writer)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESC: [u8; 18] = [
        0x00, 0x00, 0x00, 0x12, 0x72, 0x65, 0x73, 0x63, // LBox, resc
        0x00, 0x48, 0x00, 0x01, 0x00, 0x60, 0x00, 0x01, 0x02, 0x02, // 72 and 96 x 10^2
    ];

    const RESD: [u8; 18] = [
        0x00, 0x00, 0x00, 0x12, 0x72, 0x65, 0x73, 0x64, // LBox, resd
        0x0B, 0xB8, 0x00, 0x01, 0x0B, 0xB8, 0x00, 0x01, 0x00, 0x00, // 3000 x 10^0
    ];

    fn resolution(children: &[&[u8]]) -> Vec<u8> {
        let length = 8 + children.iter().map(|child| child.len()).sum::<usize>();
        let mut buffer = (length as u32).to_be_bytes().to_vec();
        buffer.extend_from_slice(&BOX_TYPE_RESOLUTION.to_be_bytes());
        for child in children {
            buffer.extend_from_slice(child);
        }
        buffer
    }

    #[test]
    fn test_both() {
        let buffer = resolution(&[&RESC, &RESD]);
        let mut resolution_box = ResolutionBox::default();
        resolution_box.load(&buffer, 0).unwrap();

        let capture_resolution = resolution_box.capture_resolution.as_ref().unwrap();
        assert_eq!(capture_resolution.vertical_resolution(), 7200.0);
        assert_eq!(capture_resolution.horizontal_resolution(), 9600.0);
        let default_display_resolution =
            resolution_box.default_display_resolution.as_ref().unwrap();
        assert_eq!(default_display_resolution.vertical_resolution(), 3000.0);
        assert_eq!(resolution_box.size() as usize, buffer.len());

        let mut saved = vec![];
        resolution_box.save(&mut saved).unwrap();
        assert_eq!(saved, buffer);
    }

    #[test]
    fn test_display_only() {
        let buffer = resolution(&[&RESD]);
        let mut resolution_box = ResolutionBox::default();
        resolution_box.load(&buffer, 0).unwrap();

        assert_eq!(resolution_box.capture_resolution, None);
        assert!(resolution_box.default_display_resolution.is_some());
        assert_eq!(resolution_box.size(), 26);
    }

    #[test]
    fn test_display_first_saves_capture_first() {
        let buffer = resolution(&[&RESD, &RESC]);
        let mut resolution_box = ResolutionBox::default();
        resolution_box.load(&buffer, 0).unwrap();

        let mut saved = vec![];
        resolution_box.save(&mut saved).unwrap();
        assert_eq!(saved, resolution(&[&RESC, &RESD]));
    }

    #[test]
    fn test_empty() {
        let buffer = resolution(&[]);

        assert_eq!(
            ResolutionBox::default().load(&buffer, 0),
            Err(JP2Error::ResolutionEmpty { offset: 0 })
        );
    }

    #[test]
    fn test_duplicate() {
        let buffer = resolution(&[&RESC, &RESC]);

        assert_eq!(
            ResolutionBox::default().load(&buffer, 0),
            Err(JP2Error::BoxDuplicate {
                box_type: BOX_TYPE_CAPTURE_RESOLUTION,
                offset: 26
            })
        );
    }

    #[test]
    fn test_wrong_child_type() {
        let mut buffer = RESC;
        buffer[7] = 0x64;

        assert_eq!(
            CaptureResolutionBox::default().load(&buffer, 0),
            Err(JP2Error::CaptureResolutionMismatch {
                found: BOX_TYPE_DEFAULT_DISPLAY_RESOLUTION,
                offset: 0
            })
        );
    }
}
