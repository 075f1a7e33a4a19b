use std::io;

use jp2::{box_type_name, JBox, JP2Box, JP2File};
use jpc::{marker_name, Codestream, MarkerSegment, MarkerSymbol, Segment};

fn marker_label(marker: MarkerSymbol) -> String {
    match marker_name(marker) {
        Some(name) => name.to_owned(),
        None => format!("{:#06X}", marker),
    }
}

fn pad(depth: usize) -> String {
    "  ".repeat(depth)
}

/// Writes one line per main header segment and tile-part, indented by
/// `depth` levels.
pub fn write_codestream<W: io::Write>(
    writer: &mut W,
    codestream: &Codestream,
    depth: usize,
) -> io::Result<()> {
    let indent = pad(depth);
    writeln!(writer, "{}SOC codestream {} bytes", indent, codestream.size())?;

    let siz = &codestream.image_and_tile_size;
    let (horizontal_tiles, vertical_tiles) = siz.no_tiles();
    writeln!(
        writer,
        "{}  SIZ {} bytes, grid {}x{}, tiles {}x{}, {} components",
        indent,
        siz.size(),
        siz.reference_grid_width,
        siz.reference_grid_height,
        horizontal_tiles,
        vertical_tiles,
        siz.no_components()
    )?;

    let cod = &codestream.coding_style_default;
    writeln!(
        writer,
        "{}  COD {} bytes, {:?}, {} layers, {} decomposition levels",
        indent,
        cod.size(),
        cod.progression(),
        cod.no_layers,
        cod.no_decomposition_levels
    )?;

    let qcd = &codestream.quantization_default;
    writeln!(
        writer,
        "{}  QCD {} bytes, {:?}",
        indent,
        qcd.size(),
        qcd.style()
    )?;

    for comment in &codestream.comments {
        match comment.comment_utf8() {
            Ok(text) if comment.is_latin() => {
                writeln!(writer, "{}  COM {} bytes, {:?}", indent, comment.size(), text)?
            }
            _ => writeln!(
                writer,
                "{}  COM {} bytes, {} binary bytes",
                indent,
                comment.size(),
                comment.comment.len()
            )?,
        }
    }
    for quantization_component in &codestream.quantization_components {
        writeln!(
            writer,
            "{}  QCC {} bytes",
            indent,
            quantization_component.size()
        )?;
    }

    for tile_part in &codestream.tile_parts {
        writeln!(
            writer,
            "{}  SOT {} bytes, tile {}, part {} of {}",
            indent,
            tile_part.size(),
            tile_part.tile_index,
            tile_part.tile_part_index,
            tile_part.no_tile_parts
        )?;
        for segment in &tile_part.segments {
            match segment {
                MarkerSegment::PacketLength(plt) => writeln!(
                    writer,
                    "{}    PLT {} bytes, {} packets, {} packet bytes",
                    indent,
                    plt.size(),
                    plt.packet_lengths.len(),
                    plt.total_packet_bytes()
                )?,
                _ => writeln!(
                    writer,
                    "{}    {} {} bytes",
                    indent,
                    marker_label(segment.marker()),
                    segment.size()
                )?,
            }
        }
        writeln!(writer, "{}    SOD {} bytes", indent, tile_part.raw.len())?;
    }

    writeln!(writer, "{}  EOC", indent)
}

fn write_box<W: io::Write>(writer: &mut W, jbox: &JP2Box, depth: usize) -> io::Result<()> {
    let indent = pad(depth);
    writeln!(
        writer,
        "{}{:?} {} bytes",
        indent,
        box_type_name(jbox.identifier()),
        jbox.size()
    )?;

    match jbox {
        JP2Box::ImageHeader(image_header) => writeln!(
            writer,
            "{}  {}x{}, {} components",
            indent, image_header.width, image_header.height, image_header.components_num
        ),
        JP2Box::ColourSpecification(colour_specification) => writeln!(
            writer,
            "{}  {:?}, {:?}",
            indent,
            colour_specification.method(),
            colour_specification.colour_space()
        ),
        JP2Box::Resolution(resolution) => {
            if let Some(capture_resolution) = &resolution.capture_resolution {
                writeln!(
                    writer,
                    "{}  capture {} x {} per metre",
                    indent,
                    capture_resolution.horizontal_resolution(),
                    capture_resolution.vertical_resolution()
                )?;
            }
            if let Some(default_display_resolution) = &resolution.default_display_resolution {
                writeln!(
                    writer,
                    "{}  display {} x {} per metre",
                    indent,
                    default_display_resolution.horizontal_resolution(),
                    default_display_resolution.vertical_resolution()
                )?;
            }
            Ok(())
        }
        JP2Box::Header(header) => {
            for child in &header.boxes {
                write_box(writer, child, depth + 1)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Writes the box tree of `jp2`, the codestream nested under `jp2c`.
pub fn write_jp2<W: io::Write>(writer: &mut W, jp2: &JP2File) -> io::Result<()> {
    writeln!(writer, "\"jP  \" 12 bytes")?;

    let file_type = &jp2.file_type;
    writeln!(
        writer,
        "{:?} {} bytes, brand {:?}, compatible with {:?}",
        box_type_name(file_type.identifier()),
        file_type.size(),
        file_type.brand(),
        file_type.compatibility_list()
    )?;

    writeln!(
        writer,
        "{:?} {} bytes",
        box_type_name(jp2.header.identifier()),
        jp2.header.size()
    )?;
    for child in &jp2.header.boxes {
        write_box(writer, child, 1)?;
    }

    let contiguous_codestream = &jp2.contiguous_codestream;
    writeln!(
        writer,
        "{:?} {} bytes",
        box_type_name(contiguous_codestream.identifier()),
        contiguous_codestream.size()
    )?;
    write_codestream(writer, &contiguous_codestream.codestream, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jpc::TilePart;

    #[test]
    fn test_write_codestream() {
        let mut codestream = Codestream::default();
        codestream.tile_parts.push(TilePart {
            segments: vec![MarkerSegment::from_marker(0xFF5F).unwrap()],
            raw: vec![0xFF, 0x93],
            ..Default::default()
        });

        let mut out = vec![];
        write_codestream(&mut out, &codestream, 0).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("SOC codestream"));
        assert!(text.contains("    POC "));
        assert!(text.contains("    SOD 2 bytes"));
        assert!(text.ends_with("  EOC\n"));
    }

    #[test]
    fn test_marker_label() {
        assert_eq!(marker_label(0xFF64), "COM");
        assert_eq!(marker_label(0xFF94), "0xFF94");
    }
}
