use anyhow::{Context, Result};
use img_parts::Bytes;
use img_parts::ImageEXIF;
use img_parts::jpeg::Jpeg;
use img_parts::png::{Png, PngChunk};
use little_exif::exif_tag::ExifTag;
use little_exif::filetype::FileExtension;
use little_exif::metadata::Metadata;
use std::path::Path;

use super::reader::PARAMETERS_KEYWORD;
use crate::pipeline::ImageKind;

// little_exif as_u8_vec(JPEG) returns: [APP1 marker 2B][length 2B][Exif\0\0 6B][TIFF data]
// img-parts set_exif() expects just the TIFF data (after Exif\0\0)
const JPEG_EXIF_OVERHEAD: usize = 10; // 2 + 2 + 6

/// Embed generation-metadata text into an image, replacing any existing text.
///
/// - JPEG: EXIF `UserComment`, merged into the existing EXIF block
/// - PNG: `parameters` text chunk, inserted before `IEND`
///
/// Other formats are read-only.
pub fn write_generation_text(path: &Path, text: &str, kind: ImageKind) -> Result<()> {
    match kind {
        ImageKind::Jpeg => write_jpeg_user_comment(path, text),
        ImageKind::Png => write_png_parameters(path, text),
        other => anyhow::bail!(
            "Writing generation metadata is not supported for {other:?} images"
        ),
    }
}

/// Encode text as a `UserComment` value: ASCII prefix when possible,
/// otherwise `UNICODE` + UTF-16BE.
pub fn encode_user_comment(text: &str) -> Vec<u8> {
    if text.is_ascii() {
        let mut bytes = b"ASCII\0\0\0".to_vec();
        bytes.extend_from_slice(text.as_bytes());
        bytes
    } else {
        let mut bytes = b"UNICODE\0".to_vec();
        bytes.extend(text.encode_utf16().flat_map(|u| u.to_be_bytes()));
        bytes
    }
}

/// Build a PNG text chunk holding `text` under the `parameters` keyword.
///
/// `tEXt` when every character fits in Latin-1, uncompressed `iTXt` otherwise.
pub fn build_parameters_chunk(text: &str) -> ([u8; 4], Vec<u8>) {
    let mut contents = PARAMETERS_KEYWORD.to_vec();
    contents.push(0);

    if text.chars().all(|c| (c as u32) <= 0xFF) {
        contents.extend(text.chars().map(|c| c as u8));
        (*b"tEXt", contents)
    } else {
        // compression flag, compression method, empty language tag, empty translated keyword
        contents.extend_from_slice(&[0, 0, 0, 0]);
        contents.extend_from_slice(text.as_bytes());
        (*b"iTXt", contents)
    }
}

fn is_parameters_chunk(chunk: &PngChunk) -> bool {
    matches!(&chunk.kind(), b"tEXt" | b"iTXt" | b"zTXt")
        && chunk.contents().starts_with(PARAMETERS_KEYWORD)
        && chunk.contents().get(PARAMETERS_KEYWORD.len()) == Some(&0)
}

fn write_png_parameters(path: &Path, text: &str) -> Result<()> {
    let file_bytes = std::fs::read(path).context("Failed to read image file")?;
    let mut png = Png::from_bytes(Bytes::from(file_bytes))
        .map_err(|e| anyhow::anyhow!("Failed to parse PNG: {e}"))?;

    let (kind, contents) = build_parameters_chunk(text);
    let chunks = png.chunks_mut();
    let before = chunks.len();
    chunks.retain(|c| !is_parameters_chunk(c));
    if chunks.len() != before {
        log::debug!("Replacing {} existing parameters chunk(s)", before - chunks.len());
    }

    let iend = chunks
        .iter()
        .position(|c| &c.kind() == b"IEND")
        .unwrap_or(chunks.len());
    chunks.insert(iend, PngChunk::new(kind, Bytes::from(contents)));

    let output = png.encoder().bytes();
    std::fs::write(path, &output).context("Failed to write PNG file")?;
    Ok(())
}

/// Load existing EXIF metadata from a file path using little_exif.
/// Returns None if it can't parse (instead of losing data).
fn load_existing_metadata(path: &Path) -> Option<Metadata> {
    let path_owned = path.to_path_buf();
    // Suppress panics from little_exif
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(|_| {}));
    let result = std::panic::catch_unwind(move || Metadata::new_from_path(&path_owned));
    std::panic::set_hook(prev_hook);

    match result {
        Ok(Ok(m)) => {
            log::debug!("little_exif loaded {} existing EXIF tags", m.data().len());
            Some(m)
        }
        Ok(Err(e)) => {
            log::debug!("little_exif could not parse EXIF: {e}");
            None
        }
        Err(_) => {
            log::debug!("little_exif panicked parsing EXIF");
            None
        }
    }
}

/// Write `UserComment` into a JPEG, preserving every other segment.
fn write_jpeg_user_comment(path: &Path, text: &str) -> Result<()> {
    let file_bytes = std::fs::read(path).context("Failed to read image file")?;
    let mut jpeg = Jpeg::from_bytes(Bytes::from(file_bytes))
        .map_err(|e| anyhow::anyhow!("Failed to parse JPEG: {e}"))?;

    let orig_exif_pos = find_exif_segment_pos(&jpeg);

    let mut metadata = load_existing_metadata(path).unwrap_or_else(|| {
        log::debug!("Building fresh EXIF block");
        Metadata::new()
    });
    metadata.set_tag(ExifTag::UserComment(encode_user_comment(text)));

    let exif_bytes = metadata.as_u8_vec(FileExtension::JPEG);
    if exif_bytes.len() <= JPEG_EXIF_OVERHEAD {
        anyhow::bail!("Failed to serialize EXIF block");
    }
    jpeg.set_exif(Some(Bytes::from(exif_bytes[JPEG_EXIF_OVERHEAD..].to_vec())));

    // set_exif() inserts at position 3; move EXIF back to where it was so it
    // stays ahead of XMP.
    if let Some(new_pos) = find_exif_segment_pos(&jpeg) {
        let target_pos = orig_exif_pos.unwrap_or(1); // default: right after APP0
        if target_pos < new_pos {
            let segments = jpeg.segments_mut();
            let seg = segments.remove(new_pos);
            segments.insert(target_pos, seg);
        }
    }

    let output = jpeg.encoder().bytes();
    std::fs::write(path, &output).context("Failed to write JPEG file")?;
    Ok(())
}

/// Find the position of the EXIF APP1 segment in a JPEG.
/// EXIF segments have marker 0xE1 (APP1) and contents starting with "Exif\0\0".
fn find_exif_segment_pos(jpeg: &Jpeg) -> Option<usize> {
    const EXIF_PREFIX: &[u8] = b"Exif\0\0";
    jpeg.segments()
        .iter()
        .position(|s| s.marker() == 0xE1 && s.contents().starts_with(EXIF_PREFIX))
}
