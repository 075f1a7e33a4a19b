use jp2::{
    decode_jp2, BitDepth, ColourSpecificationMethods, EnumeratedColourSpaces, JP2Box, JP2Error,
    BOX_TYPE_HEADER,
};
use jpc::{BufferOverrun, CodestreamError, Comment, Segment as _};

const SIGNATURE: [u8; 12] = [
    0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20, 0x0D, 0x0A, 0x87, 0x0A,
];

const FILE_TYPE: [u8; 20] = [
    0x00, 0x00, 0x00, 0x14, 0x66, 0x74, 0x79, 0x70, // LBox, ftyp
    0x6A, 0x70, 0x32, 0x20, 0x00, 0x00, 0x00, 0x00, // jp2, MinV
    0x6A, 0x70, 0x32, 0x20, // jp2
];

const IMAGE_HEADER: [u8; 22] = [
    0x00, 0x00, 0x00, 0x16, 0x69, 0x68, 0x64, 0x72, // LBox, ihdr
    0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x00, 0x40, // 64x64
    0x00, 0x01, 0x07, 0x07, 0x00, 0x00, // 1 component, 8 bit, wavelet
];

const COLOUR_SPECIFICATION: [u8; 15] = [
    0x00, 0x00, 0x00, 0x0F, 0x63, 0x6F, 0x6C, 0x72, // LBox, colr
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x11, // enumerated, greyscale
];

const RESOLUTION: [u8; 26] = [
    0x00, 0x00, 0x00, 0x1A, 0x72, 0x65, 0x73, 0x20, // LBox, res
    0x00, 0x00, 0x00, 0x12, 0x72, 0x65, 0x73, 0x63, // LBox, resc
    0x0B, 0xB8, 0x00, 0x01, 0x0B, 0xB8, 0x00, 0x01, 0x00, 0x00,
];

// Byte offsets within the file built by `jp2_file`.
const HEADER_OFFSET: usize = 32;
const CODESTREAM_OFFSET: usize = 111;

fn header(children: &[&[u8]]) -> Vec<u8> {
    let length = 8 + children.iter().map(|child| child.len()).sum::<usize>();
    let mut buffer = (length as u32).to_be_bytes().to_vec();
    buffer.extend_from_slice(&BOX_TYPE_HEADER.to_be_bytes());
    for child in children {
        buffer.extend_from_slice(child);
    }
    buffer
}

fn codestream() -> Vec<u8> {
    let mut buffer = vec![0xFF, 0x4F, 0xFF, 0x51, 0x00, 0x29, 0x00, 0x00];
    for value in [64u32, 64, 0, 0, 64, 64, 0, 0] {
        buffer.extend_from_slice(&value.to_be_bytes());
    }
    buffer.extend_from_slice(&[0x00, 0x01, 0x07, 0x01, 0x01]);
    buffer.extend_from_slice(&[
        0xFF, 0x52, 0x00, 0x0C, 0x00, 0x00, 0x00, 0x01, 0x00, 0x05, 0x04, 0x04, 0x00, 0x01,
    ]);
    buffer.extend_from_slice(&[0xFF, 0x5C, 0x00, 0x04, 0x40, 0x48]);
    buffer.extend_from_slice(&[
        0xFF, 0x90, 0x00, 0x0A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x11, 0x00, 0x01, // SOT
        0xFF, 0x93, 0x01, 0x02, 0x03, // SOD
    ]);
    buffer.extend_from_slice(&[0xFF, 0xD9]);
    buffer
}

fn contiguous_codestream(length: u32, codestream: &[u8]) -> Vec<u8> {
    let mut buffer = length.to_be_bytes().to_vec();
    buffer.extend_from_slice(b"jp2c");
    buffer.extend_from_slice(codestream);
    buffer
}

fn jp2_file(header: &[u8], jp2c_length: Option<u32>) -> Vec<u8> {
    let codestream = codestream();
    let length = jp2c_length.unwrap_or(8 + codestream.len() as u32);
    [
        SIGNATURE.to_vec(),
        FILE_TYPE.to_vec(),
        header.to_vec(),
        contiguous_codestream(length, &codestream),
    ]
    .concat()
}

fn standard_header() -> Vec<u8> {
    header(&[&IMAGE_HEADER, &COLOUR_SPECIFICATION, &RESOLUTION])
}

#[test]
fn test_decode() {
    let buffer = jp2_file(&standard_header(), None);
    let jp2 = decode_jp2(&buffer).expect("jp2 should decode");

    assert_eq!(jp2.size() as usize, buffer.len());
    assert_eq!(jp2.file_type.brand(), "jp2 ");
    assert!(jp2.file_type.is_compatible());

    assert_eq!(jp2.header.boxes.len(), 3);
    let image_header = jp2.header.image_header().expect("image header");
    assert_eq!(image_header.width, 64);
    assert_eq!(image_header.height, 64);
    assert_eq!(image_header.components_num, 1);
    assert_eq!(image_header.bit_depth(), Some(BitDepth::Unsigned { value: 8 }));

    let colour_specifications: Vec<_> = jp2.header.colour_specifications().collect();
    assert_eq!(colour_specifications.len(), 1);
    assert_eq!(
        colour_specifications[0].method(),
        ColourSpecificationMethods::EnumeratedColourSpace
    );
    assert_eq!(
        colour_specifications[0].colour_space(),
        Some(EnumeratedColourSpaces::Greyscale)
    );

    match &jp2.header.boxes[2] {
        JP2Box::Resolution(resolution) => {
            let capture_resolution = resolution.capture_resolution.as_ref().unwrap();
            assert_eq!(capture_resolution.vertical_resolution(), 3000.0);
            assert_eq!(resolution.default_display_resolution, None);
        }
        other => panic!("expected resolution box, found {:?}", other),
    }

    let contiguous_codestream = &jp2.contiguous_codestream;
    assert!(!contiguous_codestream.runs_to_end_of_file());
    let codestream = &contiguous_codestream.codestream;
    assert_eq!(codestream.image_and_tile_size.reference_grid_width, 64);
    assert_eq!(codestream.tile_parts.len(), 1);
    assert_eq!(codestream.tile_parts[0].raw, vec![0xFF, 0x93, 0x01, 0x02, 0x03]);

    let mut saved = vec![];
    jp2.save(&mut saved).unwrap();
    assert_eq!(saved, buffer);
}

#[test]
fn test_edit_and_save() {
    let buffer = jp2_file(&standard_header(), None);
    let mut jp2 = decode_jp2(&buffer).unwrap();

    let comment = Comment::from_text("edited").unwrap();
    jp2.contiguous_codestream
        .codestream
        .comments
        .push(comment.clone());

    let mut saved = vec![];
    jp2.save(&mut saved).unwrap();
    assert_eq!(saved.len(), buffer.len() + comment.size() as usize);
    assert_eq!(jp2.size() as usize, saved.len());

    let reloaded = decode_jp2(&saved).unwrap();
    assert_eq!(
        reloaded.contiguous_codestream.codestream.comments,
        vec![comment]
    );
    assert_eq!(
        reloaded.contiguous_codestream.codestream,
        jp2.contiguous_codestream.codestream
    );
    assert_eq!(reloaded.header, jp2.header);
}

#[test]
fn test_runs_to_end_of_file() {
    let buffer = jp2_file(&standard_header(), Some(0));
    let jp2 = decode_jp2(&buffer).unwrap();

    assert!(jp2.contiguous_codestream.runs_to_end_of_file());
    assert_eq!(jp2.size() as usize, buffer.len());

    let mut saved = vec![];
    jp2.save(&mut saved).unwrap();
    assert_eq!(saved, buffer);
}

#[test]
fn test_invalid_signature() {
    let mut buffer = jp2_file(&standard_header(), None);
    buffer[11] = 0x0B;

    assert_eq!(
        decode_jp2(&buffer),
        Err(JP2Error::InvalidSignature { offset: 0 })
    );
}

#[test]
fn test_codestream_is_not_a_jp2() {
    assert_eq!(
        decode_jp2(&codestream()),
        Err(JP2Error::InvalidSignature { offset: 0 })
    );
}

#[test]
fn test_header_overrun() {
    // LBox claims two bytes fewer than the image header occupies
    let mut jp2h = header(&[&IMAGE_HEADER]);
    jp2h[3] -= 2;
    let buffer = jp2_file(&jp2h, None);

    assert_eq!(
        decode_jp2(&buffer),
        Err(JP2Error::BoxOverrun {
            box_type: BOX_TYPE_HEADER,
            end: HEADER_OFFSET + 28,
            offset: HEADER_OFFSET + 30
        })
    );
}

#[test]
fn test_header_ends_inside_child() {
    // LBox covers the image header and only 3 bytes of the colour box
    let mut jp2h = header(&[&IMAGE_HEADER, &COLOUR_SPECIFICATION]);
    jp2h[3] = 8 + 22 + 3;
    let buffer = jp2_file(&jp2h, None);

    assert_eq!(
        decode_jp2(&buffer),
        Err(JP2Error::BoxOverrun {
            box_type: BOX_TYPE_HEADER,
            end: HEADER_OFFSET + 33,
            offset: HEADER_OFFSET + 45
        })
    );
}

#[test]
fn test_nested_header() {
    let inner = header(&[&IMAGE_HEADER]);
    let buffer = jp2_file(&header(&[&inner]), None);

    assert_eq!(
        decode_jp2(&buffer),
        Err(JP2Error::MisplacedBox {
            box_type: BOX_TYPE_HEADER,
            offset: HEADER_OFFSET + 8
        })
    );
}

#[test]
fn test_unknown_box_in_header() {
    let xml = [
        0x00, 0x00, 0x00, 0x0C, 0x78, 0x6D, 0x6C, 0x20, b'<', b'a', b'/', b'>',
    ];
    let buffer = jp2_file(&header(&[&IMAGE_HEADER, &xml]), None);

    assert_eq!(
        decode_jp2(&buffer),
        Err(JP2Error::UnknownBox {
            box_type: 0x786D_6C20,
            offset: HEADER_OFFSET + 8 + IMAGE_HEADER.len()
        })
    );
}

#[test]
fn test_codestream_error() {
    let mut buffer = jp2_file(&standard_header(), None);
    buffer[CODESTREAM_OFFSET + 1] = 0x4E;

    assert_eq!(
        decode_jp2(&buffer),
        Err(JP2Error::Codestream(CodestreamError::SocMismatch {
            found: 0xFF4E,
            offset: CODESTREAM_OFFSET
        }))
    );
}

#[test]
fn test_truncated() {
    let buffer = jp2_file(&standard_header(), None);

    assert_eq!(
        decode_jp2(&buffer[..50]),
        Err(JP2Error::BufferOverrun(BufferOverrun {
            offset: 48,
            width: 4,
            length: 50
        }))
    );

    // Cut inside the codestream, past the box that declared it
    let cut = buffer.len() - 4;
    assert!(matches!(
        decode_jp2(&buffer[..cut]),
        Err(JP2Error::BufferOverrun(_)) | Err(JP2Error::Codestream(_))
    ));
}
