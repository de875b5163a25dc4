//! # genmeta
//!
//! Read, audit, and normalize the generation metadata that image generators
//! (Automatic1111 and compatible WebUIs) embed in their output files.
//!
//! ## Quick Start
//!
//! Parse a raw metadata blob, audit it, and encode it back:
//!
//! ```rust
//! use genmeta::{audit_metadata, encode_metadata, parse_metadata};
//!
//! let raw = "a cat, <lora:goodLora:0.8>\nNegative prompt: blurry\n\
//!            Steps: 20, Sampler: Euler a, CFG scale: 7, Seed: 42, Model hash: abc123, Model: sd15";
//!
//! let record = parse_metadata(raw);
//! assert_eq!(record.prompt.as_deref(), Some("a cat, <lora:goodLora:0.8>"));
//! assert_eq!(record.steps.as_deref(), Some("20"));
//! assert_eq!(record.resources.len(), 2);
//!
//! assert!(audit_metadata(Some(&record)).success);
//!
//! let text = encode_metadata(&record, "automatic1111").unwrap();
//! assert_eq!(parse_metadata(text.as_str()), record);
//! ```
//!
//! ## Working With Images
//!
//! The pipeline module handles the full extract → parse → audit flow for files:
//!
//! ```rust,no_run
//! use genmeta::config::Config;
//! use genmeta::pipeline::{Pipeline, collect_images};
//! use std::path::PathBuf;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!     let pipeline = Pipeline::from_config(&config)?;
//!
//!     for path in collect_images(&[PathBuf::from("./outputs")]) {
//!         let result = pipeline.process_image(&path);
//!         if !result.audit.success {
//!             println!("{}: blocked for {:?}", path.display(), result.audit.blocked_for);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Formats
//!
//! | Format | Metadata location | Rewrite |
//! |--------|-------------------|---------|
//! | JPEG (`.jpg`, `.jpeg`) | EXIF `UserComment` | Yes |
//! | PNG (`.png`) | `parameters` tEXt/iTXt chunk, EXIF fallback | Yes |
//! | WebP (`.webp`) | EXIF `UserComment` | No |
//! | TIFF (`.tif`, `.tiff`) | EXIF `UserComment` | No |
//! | HEIC/HEIF (`.heic`, `.heif`) | EXIF `UserComment` | No |
//!
//! ## Modules
//!
//! - [`normalize`] — text cleanup applied before parsing
//! - [`record`] — the parsed metadata record
//! - [`parser`] — parser trait, registry, and the Automatic1111 parser
//! - [`encoder`] — record → generator text
//! - [`audit`] — wordlist moderation of prompts
//! - [`image`] — extracting and embedding metadata text in image files
//! - [`config`] — configuration types and loading/saving
//! - [`pipeline`] — per-file processing, image collection, and format detection

pub mod audit;
pub mod config;
pub mod encoder;
pub mod error;
pub mod image;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod record;

pub use audit::{AuditResult, Auditor, audit_metadata};
pub use encoder::encode_metadata;
pub use error::MetaError;
pub use normalize::normalize;
pub use parser::{MetadataParser, ParserRegistry, parse_metadata};
pub use record::{ExtraFields, MetadataRecord, Resource};
