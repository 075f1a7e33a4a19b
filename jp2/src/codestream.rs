use log::{info, warn};
use std::io;

use jpc::{access, Codestream, Segment};

use crate::{write_box_header, BoxType, JBox, JP2Error, BOX_TYPE_CONTIGUOUS_CODESTREAM};

// I.5.4
//
// Contiguous Codestream box
//
// The Contiguous Codestream box contains a valid and complete JPEG 2000
// codestream. An LBox of 0 means the box runs to the end of the file; such a
// box is written back with LBox 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContiguousCodestreamBox {
    // LBox as read, only used to keep a value of 0.
    pub declared_length: u32,

    pub codestream: Codestream,
}

impl ContiguousCodestreamBox {
    pub fn runs_to_end_of_file(&self) -> bool {
        self.declared_length == 0
    }
}

impl JBox for ContiguousCodestreamBox {
    // The type of a Contiguous Codestream box shall be ‘jp2c’ (0x6A70 3263).
    fn identifier(&self) -> BoxType {
        BOX_TYPE_CONTIGUOUS_CODESTREAM
    }

    fn size(&self) -> u32 {
        8 + self.codestream.size()
    }

    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), JP2Error> {
        info!("ContiguousCodestreamBox start at byte offset {}", offset);
        let length = access::read_u32(buffer, offset)?;
        match length {
            1 => {
                return Err(JP2Error::Unsupported {
                    feature: "extended box length",
                    offset,
                })
            }
            2..=7 => {
                return Err(JP2Error::InvalidBoxLength {
                    box_type: BOX_TYPE_CONTIGUOUS_CODESTREAM,
                    length,
                    offset,
                })
            }
            _ => {}
        }

        let found = access::read_u32(buffer, offset + 4)?;
        if found != BOX_TYPE_CONTIGUOUS_CODESTREAM {
            return Err(JP2Error::ContiguousCodestreamMismatch { found, offset });
        }

        // The codestream is read from a buffer that ends with the box.
        let end = if length == 0 {
            warn!("LBox is 0, codestream runs to the end of the file");
            buffer.len()
        } else {
            offset + length as usize
        };
        let contents = buffer.get(..end).ok_or(access::BufferOverrun {
            offset,
            width: length as usize,
            length: buffer.len(),
        })?;

        self.declared_length = length;
        self.codestream.load(contents, offset + 8)?;

        if length != 0 && length != self.size() {
            warn!(
                "LBox {} differs from the codestream size {}",
                length,
                self.size()
            );
        }

        info!(
            "ContiguousCodestreamBox finish at byte offset {}",
            offset + self.size() as usize
        );
        Ok(())
    }

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        let length = if self.runs_to_end_of_file() {
            0
        } else {
            self.size()
        };
        write_box_header(writer, length, BOX_TYPE_CONTIGUOUS_CODESTREAM)?;
        self.codestream.save(writer)
    }
}
