use log::{debug, info, warn};
use std::io;

use jpc::access;

use crate::{decode_box_length, write_box_header, BoxType, JBox, JP2Error, BOX_TYPE_FILE_TYPE};

// jp2\040
const BRAND_JP2: [u8; 4] = *b"jp2 ";

/// File Type box.
///
/// The File Type box completely defines all of the contents of this file, as
/// well as a separate list of readers with which this file is compatible, and
/// thus the file can be properly interpreted within the scope of that other
/// standard.
///
/// This box shall immediately follow the Signature box.
///
/// For more information, see ISO/IEC 15444-1 / ITU T-800 Appendix I.5.2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTypeBox {
    /// Brand, always `jp2\040` once loaded.
    pub brand: [u8; 4],

    /// Minor version. The value of this field shall be zero, however readers
    /// shall continue to parse the file even if it is not.
    pub min_version: u32,

    /// Compatibility list.
    pub compatibility_list: Vec<[u8; 4]>,
}

impl Default for FileTypeBox {
    fn default() -> FileTypeBox {
        FileTypeBox {
            brand: BRAND_JP2,
            min_version: 0,
            compatibility_list: vec![BRAND_JP2],
        }
    }
}

impl FileTypeBox {
    pub fn brand(&self) -> String {
        String::from_utf8_lossy(&self.brand).into_owned()
    }

    pub fn compatibility_list(&self) -> Vec<String> {
        self.compatibility_list
            .iter()
            .map(|entry| String::from_utf8_lossy(entry).into_owned())
            .collect()
    }

    // A conforming reader shall interpret all files with `jp2\040` in one of
    // the CL fields.
    pub fn is_compatible(&self) -> bool {
        self.compatibility_list.contains(&BRAND_JP2)
    }
}

impl JBox for FileTypeBox {
    // The type of the File Type Box shall be ‘ftyp’ (0x6674 7970).
    fn identifier(&self) -> BoxType {
        BOX_TYPE_FILE_TYPE
    }

    fn size(&self) -> u32 {
        16 + 4 * self.compatibility_list.len() as u32
    }

    fn load(&mut self, buffer: &[u8], offset: usize) -> Result<(), JP2Error> {
        info!("FileTypeBox start at byte offset {}", offset);
        let length = decode_box_length(buffer, offset, BOX_TYPE_FILE_TYPE)?;

        let found = access::read_u32(buffer, offset + 4)?;
        if found != BOX_TYPE_FILE_TYPE {
            return Err(JP2Error::FileTypeMismatch { found, offset });
        }

        // The number of CL fields is determined by the length of this box
        if length < 16 || (length - 16) % 4 != 0 {
            return Err(JP2Error::InvalidBoxLength {
                box_type: BOX_TYPE_FILE_TYPE,
                length,
                offset,
            });
        }

        self.brand = access::read_u32(buffer, offset + 8)?.to_be_bytes();
        if self.brand != BRAND_JP2 {
            return Err(JP2Error::UnknownFileType {
                brand: self.brand,
                offset: offset + 8,
            });
        }
        self.min_version = access::read_u32(buffer, offset + 12)?;

        let entries = (length as usize - 16) / 4;
        self.compatibility_list = Vec::with_capacity(entries);
        for i in 0..entries {
            let entry = access::read_u32(buffer, offset + 16 + 4 * i)?;
            self.compatibility_list.push(entry.to_be_bytes());
        }

        debug!("Brand {:?}", self.brand());
        debug!("Minor version {}", self.min_version);
        debug!("Compatibility list {:?}", self.compatibility_list());
        if !self.is_compatible() {
            warn!("'jp2 ' missing from compatibility list");
        }

        info!("FileTypeBox finish at byte offset {}", offset + length as usize);
        Ok(())
    }

    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        write_box_header(writer, self.size(), BOX_TYPE_FILE_TYPE)?;
        writer.write_all(&self.brand)?;
        access::write_u32(writer, self.min_version)?;

        for entry in &self.compatibility_list {
            writer.write_all(entry)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load() {
        let buffer = [
            0x00, 0x00, 0x00, 0x18, 0x66, 0x74, 0x79, 0x70, // LBox, ftyp
            0x6A, 0x70, 0x32, 0x20, 0x00, 0x00, 0x00, 0x00, // jp2, MinV
            0x6A, 0x70, 0x32, 0x20, 0x6A, 0x70, 0x78, 0x20, // jp2, jpx
        ];
        let mut file_type = FileTypeBox::default();
        file_type.load(&buffer, 0).unwrap();

        assert_eq!(file_type.brand(), "jp2 ");
        assert_eq!(file_type.min_version, 0);
        assert_eq!(file_type.compatibility_list(), vec!["jp2 ", "jpx "]);
        assert!(file_type.is_compatible());
        assert_eq!(file_type.size() as usize, buffer.len());

        let mut saved = vec![];
        file_type.save(&mut saved).unwrap();
        assert_eq!(saved, buffer);
    }

    #[test]
    fn test_unknown_brand() {
        let buffer = [
            0x00, 0x00, 0x00, 0x14, 0x66, 0x74, 0x79, 0x70, // LBox, ftyp
            0x6A, 0x70, 0x78, 0x20, 0x00, 0x00, 0x00, 0x00, // jpx, MinV
            0x6A, 0x70, 0x32, 0x20,
        ];

        assert_eq!(
            FileTypeBox::default().load(&buffer, 0),
            Err(JP2Error::UnknownFileType {
                brand: *b"jpx ",
                offset: 8
            })
        );
    }

    #[test]
    fn test_partial_compatibility_entry() {
        let buffer = [
            0x00, 0x00, 0x00, 0x13, 0x66, 0x74, 0x79, 0x70, // LBox, ftyp
            0x6A, 0x70, 0x32, 0x20, 0x00, 0x00, 0x00, 0x00, // jp2, MinV
            0x6A, 0x70, 0x32,
        ];

        assert_eq!(
            FileTypeBox::default().load(&buffer, 0),
            Err(JP2Error::InvalidBoxLength {
                box_type: BOX_TYPE_FILE_TYPE,
                length: 19,
                offset: 0
            })
        );
    }
}
