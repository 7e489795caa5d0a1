pub mod docx;
pub mod epub;
mod error;
pub mod model;
pub mod xhtml;

pub use error::{Error, ReferenceKind};
pub use model::{BookMetadata, ConvertOptions, EbookData};

use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::time::Instant;

use docx::Archive;

/// Converts a DOCX package reachable through `archive`.
pub fn convert_archive<A: Archive + ?Sized>(
    archive: &mut A,
    options: &ConvertOptions,
) -> Result<EbookData, Error> {
    docx::convert(archive, options)
}

pub fn convert_docx_bytes(input: &[u8], options: &ConvertOptions) -> Result<EbookData, Error> {
    let mut archive = zip::ZipArchive::new(Cursor::new(input))?;
    convert_archive(&mut archive, options)
}

pub fn convert_docx_to_epub(
    input: &Path,
    output: &Path,
    metadata: &BookMetadata,
    options: &ConvertOptions,
) -> Result<(), Error> {
    let t0 = Instant::now();

    let mut archive = zip::ZipArchive::new(File::open(input)?)?;
    let t_open = t0.elapsed();

    let book = convert_archive(&mut archive, options)?;
    let t_convert = t0.elapsed();

    let mut out = Vec::new();
    epub::write_epub(&book, metadata, Cursor::new(&mut out))?;
    let t_package = t0.elapsed();

    std::fs::write(output, &out).map_err(Error::Io)?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: parse={:.1}ms, convert={:.1}ms, package={:.1}ms, write={:.1}ms, total={:.1}ms (output {} bytes)",
        t_open.as_secs_f64() * 1000.0,
        (t_convert - t_open).as_secs_f64() * 1000.0,
        (t_package - t_convert).as_secs_f64() * 1000.0,
        (t_total - t_package).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        out.len(),
    );

    Ok(())
}
