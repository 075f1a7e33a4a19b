use clap::Parser;
use log::info;
use std::error;
use std::error::Error;
use std::ffi::OsStr;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use jp2::{decode_jp2, has_signature, JP2Error, JP2File};
use jpc::{decode_jpc, Codestream, CodestreamError, Segment, MARKER_SYMBOL_SOC};

mod report;

#[derive(Debug)]
enum JP2000Error {
    DecodingContainer { error: JP2Error },
    DecodingCodestream { error: CodestreamError },
    UnsupportedExtension { extension: String },
    MissingTilePart,
}

impl error::Error for JP2000Error {}
impl fmt::Display for JP2000Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::DecodingContainer { error } => {
                write!(f, "error decoding jp2 container {}", error)
            }
            Self::DecodingCodestream { error } => {
                write!(f, "error decoding jpc codestream {}", error)
            }
            Self::UnsupportedExtension { extension } => {
                write!(f, "unsupported extension {:?}", extension)
            }
            Self::MissingTilePart => {
                write!(f, "codestream has no tile-part to build a mosaic from")
            }
        }
    }
}

#[derive(Parser)]
struct Opts {
    #[clap(subcommand)]
    subcommand: SubCommand,
}

#[derive(Parser)]
enum SubCommand {
    /// Decode .jp2 container or .j2k/.jpc/.j2c codestream file (noop)
    Decode(Decode),

    /// Print the boxes and marker segments of a file (stdout)
    Info(Info),

    /// Decode a file and write it back out unchanged
    Resave(Resave),

    /// Build a mosaic from the first tile-part of a codestream
    Mosaic(Mosaic),
}

#[derive(Parser)]
struct Decode {
    /// Path to .jp2 or codestream file
    path: String,
}

#[derive(Parser)]
struct Info {
    /// Path to .jp2 or codestream file
    path: String,
}

#[derive(Parser)]
struct Resave {
    /// Path to .jp2 or codestream file
    input: String,

    /// Path to write to
    output: String,
}

#[derive(Parser)]
struct Mosaic {
    /// Path to codestream file
    input: String,

    /// Path to write to
    output: String,

    /// Tile index given to each tile-part, in codestream order.
    ///
    /// The reference grid is doubled in both directions and the first
    /// tile-part, stripped of its marker segments, is repeated once per
    /// index.
    #[clap(long, value_delimiter = ',', default_values_t = [2u16, 3, 0, 1])]
    order: Vec<u16>,
}

enum Image {
    Container(JP2File),
    Codestream(Codestream),
}

impl Image {
    fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            Image::Container(jp2) => jp2.save(writer),
            Image::Codestream(codestream) => codestream.save(writer),
        }
    }
}

fn load_file(path: &Path) -> io::Result<Vec<u8>> {
    let buffer = fs::read(path)?;
    info!("Read {} bytes from {}", buffer.len(), path.display());
    Ok(buffer)
}

fn save_file(path: &Path, image: &Image) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    image.save(&mut writer)?;
    writer.flush()?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn decode_container(buffer: &[u8]) -> Result<JP2File, JP2000Error> {
    decode_jp2(buffer).map_err(|error| JP2000Error::DecodingContainer { error })
}

fn decode_codestream(buffer: &[u8]) -> Result<Codestream, JP2000Error> {
    decode_jpc(buffer).map_err(|error| JP2000Error::DecodingCodestream { error })
}

fn decode_file(path: &Path) -> Result<Image, Box<dyn Error>> {
    let extension = match path.extension().and_then(OsStr::to_str) {
        Some(value) => value,
        None => "",
    };

    let buffer = load_file(path)?;

    match extension {
        "jp2" => Ok(Image::Container(decode_container(&buffer)?)),
        "j2k" | "jpc" | "j2c" => Ok(Image::Codestream(decode_codestream(&buffer)?)),
        // Unknown extension, go by the first bytes
        _ if has_signature(&buffer) => Ok(Image::Container(decode_container(&buffer)?)),
        _ if buffer.starts_with(&MARKER_SYMBOL_SOC.to_be_bytes()) => {
            Ok(Image::Codestream(decode_codestream(&buffer)?))
        }
        _ => Err(JP2000Error::UnsupportedExtension {
            extension: extension.to_owned(),
        }
        .into()),
    }
}

// Doubles the reference grid and replaces the tile-parts with copies of the
// first one, stripped of its marker segments, labelled by `order`.
fn build_mosaic(codestream: &mut Codestream, order: &[u16]) -> Result<(), JP2000Error> {
    let first = match codestream.tile_parts.first_mut() {
        Some(tile_part) => tile_part,
        None => return Err(JP2000Error::MissingTilePart),
    };
    first.clear_segments();
    let first = first.clone();

    let siz = &mut codestream.image_and_tile_size;
    siz.reference_grid_width = siz.reference_grid_width.saturating_mul(2);
    siz.reference_grid_height = siz.reference_grid_height.saturating_mul(2);

    codestream.tile_parts = order
        .iter()
        .map(|tile_index| {
            let mut tile_part = first.clone();
            tile_part.tile_index = *tile_index;
            tile_part
        })
        .collect();

    Ok(())
}

fn run() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let opts: Opts = Opts::parse();

    match opts.subcommand {
        SubCommand::Decode(c) => {
            decode_file(Path::new(&c.path))?;
        }
        SubCommand::Info(c) => {
            let image = decode_file(Path::new(&c.path))?;
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            match &image {
                Image::Container(jp2) => report::write_jp2(&mut writer, jp2)?,
                Image::Codestream(codestream) => {
                    report::write_codestream(&mut writer, codestream, 0)?
                }
            }
        }
        SubCommand::Resave(c) => {
            let image = decode_file(Path::new(&c.input))?;
            save_file(Path::new(&c.output), &image)?;
        }
        SubCommand::Mosaic(c) => {
            let path = Path::new(&c.input);
            let mut codestream = match decode_file(path)? {
                Image::Codestream(codestream) => codestream,
                Image::Container(_) => {
                    return Err(JP2000Error::UnsupportedExtension {
                        extension: "jp2".to_owned(),
                    }
                    .into())
                }
            };
            build_mosaic(&mut codestream, &c.order)?;
            info!("Mosaic of {} tile-parts", codestream.tile_parts.len());
            save_file(Path::new(&c.output), &Image::Codestream(codestream))?;
        }
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    match run() {
        Err(e) => Err(e.to_string().into()),
        Ok(_) => Ok(()),
    }
}
