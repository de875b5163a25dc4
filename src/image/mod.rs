//! Locating generation-metadata text inside image files, and writing it back.
//!
//! - [`read_generation_text`] — PNG `parameters` text chunk, else EXIF `UserComment`
//! - [`write_generation_text`] — format-aware embed (JPEG `UserComment`, PNG text chunk)
//!
//! Only the text blob is handled here; pixel data is never decoded.

mod reader;
mod writer;

#[cfg(test)]
pub(crate) mod fixtures;

pub use reader::{EmbeddedText, TextSource, decode_user_comment, read_generation_text, read_png_parameters};
pub use writer::{build_parameters_chunk, encode_user_comment, write_generation_text};
