use anyhow::{Context, Result};
use img_parts::Bytes;
use img_parts::png::Png;
use nom_exif::*;
use serde::Serialize;
use std::path::Path;

use crate::pipeline::ImageKind;

/// Keyword of the PNG text chunk generators store their metadata under.
pub(super) const PARAMETERS_KEYWORD: &[u8] = b"parameters";

// EXIF UserComment 8-byte character code prefixes
const CHARSET_LEN: usize = 8;
const CHARSET_ASCII: &[u8; CHARSET_LEN] = b"ASCII\0\0\0";
const CHARSET_UNICODE: &[u8; CHARSET_LEN] = b"UNICODE\0";
const CHARSET_JIS: &[u8; CHARSET_LEN] = b"JIS\0\0\0\0\0";
const CHARSET_UNDEFINED: &[u8; CHARSET_LEN] = &[0; CHARSET_LEN];

/// Where in the file the metadata text was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    /// EXIF `UserComment` (JPEG, WebP, TIFF, HEIF).
    UserComment,
    /// PNG `tEXt`/`iTXt` chunk with keyword `parameters`.
    PngParameters,
}

/// Raw generation-metadata text pulled out of an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddedText {
    pub source: TextSource,
    pub text: String,
}

/// Read the generation-metadata text embedded in an image file.
///
/// PNG text chunks are checked first for `.png` files; everything else (and
/// PNGs without a `parameters` chunk) falls back to EXIF `UserComment`.
/// Returns `Ok(None)` when the image carries no such text.
pub fn read_generation_text(path: &Path) -> Result<Option<EmbeddedText>> {
    if !path.is_file() {
        anyhow::bail!("Not a file: {}", path.display());
    }

    if ImageKind::from_path(path) == Some(ImageKind::Png) {
        let bytes = std::fs::read(path).context("Failed to read image file")?;
        match read_png_parameters(bytes) {
            Ok(Some(text)) => {
                return Ok(Some(EmbeddedText {
                    source: TextSource::PngParameters,
                    text,
                }));
            }
            Ok(None) => log::debug!("No parameters chunk in {}", path.display()),
            Err(e) => log::debug!("Could not scan PNG chunks in {}: {e}", path.display()),
        }
    }

    Ok(read_user_comment(path).map(|text| EmbeddedText {
        source: TextSource::UserComment,
        text,
    }))
}

/// Find the `parameters` text chunk in PNG bytes.
pub fn read_png_parameters(bytes: Vec<u8>) -> Result<Option<String>> {
    let png = Png::from_bytes(Bytes::from(bytes))
        .map_err(|e| anyhow::anyhow!("Failed to parse PNG: {e}"))?;

    Ok(png.chunks().iter().find_map(|chunk| {
        let (keyword, text) = decode_text_chunk(&chunk.kind(), chunk.contents())?;
        (keyword == PARAMETERS_KEYWORD).then_some(text)
    }))
}

/// Decode a PNG text chunk into `(keyword, text)`.
///
/// `tEXt` is Latin-1; `iTXt` is UTF-8. Compressed chunks are skipped.
fn decode_text_chunk<'a>(kind: &[u8; 4], contents: &'a [u8]) -> Option<(&'a [u8], String)> {
    let nul = contents.iter().position(|&b| b == 0)?;
    let (keyword, rest) = (&contents[..nul], &contents[nul + 1..]);

    match kind {
        b"tEXt" => Some((keyword, latin1_to_string(rest))),
        b"iTXt" => {
            let (&compressed, rest) = rest.split_first()?;
            let (_method, rest) = rest.split_first()?;
            if compressed != 0 {
                log::debug!("Skipping compressed iTXt chunk");
                return None;
            }
            let lang_end = rest.iter().position(|&b| b == 0)?;
            let rest = &rest[lang_end + 1..];
            let translated_end = rest.iter().position(|&b| b == 0)?;
            let text = &rest[translated_end + 1..];
            Some((keyword, String::from_utf8_lossy(text).into_owned()))
        }
        b"zTXt" => {
            log::debug!("Skipping compressed zTXt chunk");
            None
        }
        _ => None,
    }
}

fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Read EXIF `UserComment`. Unsupported or EXIF-less files yield `None`.
fn read_user_comment(path: &Path) -> Option<String> {
    let mut parser = MediaParser::new();
    let ms = match MediaSource::file_path(path) {
        Ok(ms) => ms,
        Err(e) => {
            log::debug!("Cannot read EXIF from {}: {e}", path.display());
            return None;
        }
    };

    let iter: ExifIter = match parser.parse(ms) {
        Ok(iter) => iter,
        Err(_) => {
            log::debug!("No EXIF data found in {}", path.display());
            return None;
        }
    };
    let exif: Exif = iter.into();

    let text = match exif.get(ExifTag::UserComment)? {
        EntryValue::Undefined(bytes) => decode_user_comment(bytes),
        other => other.to_string(),
    };
    let text = text.trim_end_matches('\0').trim();
    if text.is_empty() { None } else { Some(text.to_string()) }
}

/// Decode a raw `UserComment` value using its character-code prefix.
pub fn decode_user_comment(bytes: &[u8]) -> String {
    if bytes.len() < CHARSET_LEN {
        return String::from_utf8_lossy(bytes).into_owned();
    }

    let (code, body) = bytes.split_at(CHARSET_LEN);
    if code == CHARSET_UNICODE {
        decode_utf16(body)
    } else if code == CHARSET_ASCII || code == CHARSET_JIS || code == CHARSET_UNDEFINED {
        String::from_utf8_lossy(body).into_owned()
    } else {
        // No prefix at all
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Decode UTF-16 of unknown byte order.
///
/// A BOM wins; otherwise the byte order whose high bytes are mostly zero
/// (typical for prompt text) is chosen, with ties going to big-endian.
fn decode_utf16(body: &[u8]) -> String {
    let (big_endian, body) = match body {
        [0xFE, 0xFF, rest @ ..] => (true, rest),
        [0xFF, 0xFE, rest @ ..] => (false, rest),
        _ => {
            let even_zeros = body.iter().step_by(2).filter(|&&b| b == 0).count();
            let odd_zeros = body.iter().skip(1).step_by(2).filter(|&&b| b == 0).count();
            (even_zeros >= odd_zeros, body)
        }
    };

    let units = body.chunks_exact(2).map(|pair| {
        if big_endian {
            u16::from_be_bytes([pair[0], pair[1]])
        } else {
            u16::from_le_bytes([pair[0], pair[1]])
        }
    });
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::fixtures::{BLANK_PNG, PARAMETERS_PNG};
    use std::fs;
    use tempfile::TempDir;

    fn utf16(s: &str, big_endian: bool) -> Vec<u8> {
        s.encode_utf16()
            .flat_map(|u| if big_endian { u.to_be_bytes() } else { u.to_le_bytes() })
            .collect()
    }

    // ── decode_user_comment ──────────────────────────────────────────

    #[test]
    fn user_comment_ascii() {
        let mut bytes = CHARSET_ASCII.to_vec();
        bytes.extend_from_slice(b"a cat\nSteps: 20");
        assert_eq!(decode_user_comment(&bytes), "a cat\nSteps: 20");
    }

    #[test]
    fn user_comment_unicode_big_endian() {
        let mut bytes = CHARSET_UNICODE.to_vec();
        bytes.extend(utf16("a cat, café\nSteps: 20", true));
        assert_eq!(decode_user_comment(&bytes), "a cat, café\nSteps: 20");
    }

    #[test]
    fn user_comment_unicode_little_endian() {
        let mut bytes = CHARSET_UNICODE.to_vec();
        bytes.extend(utf16("a cat\nSteps: 20", false));
        assert_eq!(decode_user_comment(&bytes), "a cat\nSteps: 20");
    }

    #[test]
    fn user_comment_unicode_without_ascii_is_big_endian() {
        let mut bytes = CHARSET_UNICODE.to_vec();
        bytes.extend(utf16("猫犬", true));
        assert_eq!(decode_user_comment(&bytes), "猫犬");
    }

    #[test]
    fn user_comment_unicode_bom() {
        let mut bytes = CHARSET_UNICODE.to_vec();
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        bytes.extend(utf16("猫", false));
        assert_eq!(decode_user_comment(&bytes), "猫");
    }

    #[test]
    fn user_comment_undefined_prefix() {
        let mut bytes = CHARSET_UNDEFINED.to_vec();
        bytes.extend_from_slice(b"a cat");
        assert_eq!(decode_user_comment(&bytes), "a cat");
    }

    #[test]
    fn user_comment_without_prefix() {
        assert_eq!(decode_user_comment(b"a cat\nSteps: 20"), "a cat\nSteps: 20");
        assert_eq!(decode_user_comment(b"short"), "short");
    }

    // ── decode_text_chunk ────────────────────────────────────────────

    #[test]
    fn text_chunk_latin1() {
        let (keyword, text) = decode_text_chunk(b"tEXt", b"parameters\0caf\xE9").unwrap();
        assert_eq!(keyword, PARAMETERS_KEYWORD);
        assert_eq!(text, "café");
    }

    #[test]
    fn itxt_chunk_uncompressed() {
        let contents = b"parameters\0\0\0en\0\0\xE7\x8C\xAB Steps: 20";
        let (keyword, text) = decode_text_chunk(b"iTXt", contents).unwrap();
        assert_eq!(keyword, PARAMETERS_KEYWORD);
        assert_eq!(text, "猫 Steps: 20");
    }

    #[test]
    fn itxt_chunk_compressed_is_skipped() {
        assert!(decode_text_chunk(b"iTXt", b"parameters\0\x01\0\0\0xyz").is_none());
        assert!(decode_text_chunk(b"zTXt", b"parameters\0\0xyz").is_none());
    }

    #[test]
    fn other_chunks_ignored() {
        assert!(decode_text_chunk(b"IDAT", b"parameters\0abc").is_none());
        assert!(decode_text_chunk(b"tEXt", b"no separator").is_none());
    }

    // ── read_png_parameters / read_generation_text ───────────────────

    #[test]
    fn png_parameters_chunk() {
        let text = read_png_parameters(PARAMETERS_PNG.to_vec()).unwrap();
        assert_eq!(text.as_deref(), Some("a cat\nSteps: 20"));
    }

    #[test]
    fn png_without_parameters() {
        assert!(read_png_parameters(BLANK_PNG.to_vec()).unwrap().is_none());
    }

    #[test]
    fn png_garbage_is_error() {
        assert!(read_png_parameters(b"not a png".to_vec()).is_err());
    }

    #[test]
    fn read_generation_text_from_png_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gen.png");
        fs::write(&path, PARAMETERS_PNG).unwrap();

        let embedded = read_generation_text(&path).unwrap().unwrap();
        assert_eq!(embedded.source, TextSource::PngParameters);
        assert_eq!(embedded.text, "a cat\nSteps: 20");
    }

    #[test]
    fn read_generation_text_missing_file_is_error() {
        assert!(read_generation_text(Path::new("/nonexistent/a.png")).is_err());
    }
}
