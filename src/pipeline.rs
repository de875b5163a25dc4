use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::audit::{AuditResult, Auditor};
use crate::config::Config;
use crate::encoder::{self, EncodeFn};
use crate::error::MetaError;
use crate::image::{self, TextSource};
use crate::parser::ParserRegistry;
use crate::record::MetadataRecord;

/// Supported image extensions.
const IMAGE_EXTENSIONS: &[&str] = &[
    // Read + write (EXIF UserComment)
    "jpg", "jpeg",
    // Read + write (parameters text chunk)
    "png",
    // Read only (EXIF UserComment)
    "webp", "tif", "tiff", "heic", "heif",
];

/// Image container format, determined from the file extension.
///
/// # Example
///
/// ```rust
/// use genmeta::pipeline::ImageKind;
/// use std::path::Path;
///
/// assert_eq!(ImageKind::from_path(Path::new("gen.PNG")), Some(ImageKind::Png));
/// assert!(ImageKind::Jpeg.is_writable());
/// assert!(!ImageKind::WebP.is_writable());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    /// JPEG — EXIF UserComment, read + write
    Jpeg,
    /// PNG — `parameters` tEXt/iTXt chunk, read + write
    Png,
    /// WebP — EXIF UserComment, read only
    WebP,
    /// TIFF — EXIF UserComment, read only
    Tiff,
    /// HEIC/HEIF — EXIF UserComment, read only
    Heif,
}

impl ImageKind {
    /// Determine the image kind from a file path extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            "tif" | "tiff" => Some(Self::Tiff),
            "heic" | "heif" => Some(Self::Heif),
            _ => None,
        }
    }

    /// Whether generation text can be written back into this format.
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Png)
    }
}

/// Parse, audit, and re-encode result for one text blob.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub record: MetadataRecord,
    pub audit: AuditResult,
    /// Canonical text for the configured encoder target; `None` when nothing was parsed.
    pub encoded: Option<String>,
}

/// The result of processing a single image.
///
/// Processing never fails as a whole: file-level problems are reported in
/// `error`, and unparseable metadata simply produces an empty record.
#[derive(Debug, Serialize)]
pub struct ProcessResult {
    pub path: PathBuf,
    pub image_kind: Option<ImageKind>,
    /// Where the metadata text was found, if anywhere.
    pub source: Option<TextSource>,
    /// The text exactly as extracted, before normalization.
    pub raw_text: Option<String>,
    pub record: MetadataRecord,
    pub audit: AuditResult,
    pub encoded: Option<String>,
    pub error: Option<String>,
}

/// Collect supported image files from the given paths.
///
/// Accepts a mix of file paths and directory paths. Directories are walked
/// recursively (following symlinks). Only files with supported image extensions
/// are included (see [`ImageKind`]).
pub fn collect_images(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_file() {
            if is_supported_image(path) {
                images.push(path.clone());
            } else {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let p = entry.path();
                if p.is_file() && is_supported_image(p) {
                    images.push(p.to_path_buf());
                }
            }
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    images
}

/// Check if a file has a supported image extension.
fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Create a backup of the original file.
fn backup_file(path: &Path) -> Result<PathBuf> {
    let backup_path = path.with_extension(format!(
        "{}.bak",
        path.extension().unwrap_or_default().to_string_lossy()
    ));

    if !backup_path.exists() {
        std::fs::copy(path, &backup_path).context("Failed to create backup")?;
        log::debug!("Backup created: {}", backup_path.display());
    }

    Ok(backup_path)
}

/// Parser registry, auditor, and encoder bundled for per-file processing.
///
/// Immutable once built; share one instance across threads.
///
/// # Example
///
/// ```rust
/// use genmeta::config::Config;
/// use genmeta::pipeline::Pipeline;
///
/// let pipeline = Pipeline::from_config(&Config::default()).unwrap();
/// let inspection = pipeline.inspect_text("a cat &amp; a dog\nSteps: 20");
///
/// assert_eq!(inspection.record.prompt.as_deref(), Some("a cat & a dog"));
/// assert!(inspection.audit.success);
/// assert_eq!(inspection.encoded.as_deref(), Some("a cat & a dog\nSteps: 20"));
/// ```
pub struct Pipeline {
    registry: ParserRegistry,
    auditor: Auditor,
    encode: EncodeFn,
}

impl Pipeline {
    /// Assemble a pipeline, resolving the encoder target up front.
    pub fn new(
        registry: ParserRegistry,
        auditor: Auditor,
        encoder_target: &str,
    ) -> Result<Self, MetaError> {
        let encode = encoder::encoder_for(encoder_target)?;
        Ok(Self {
            registry,
            auditor,
            encode,
        })
    }

    /// Build the pipeline described by `config` with the built-in parsers.
    pub fn from_config(config: &Config) -> Result<Self> {
        let auditor = config.audit.build_auditor()?;
        let pipeline = Self::new(ParserRegistry::default(), auditor, &config.encoder.target)?;
        log::debug!(
            "Pipeline ready: parsers [{}], encoder {}",
            pipeline.registry.names().join(", "),
            config.encoder.target
        );
        Ok(pipeline)
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    pub fn auditor(&self) -> &Auditor {
        &self.auditor
    }

    /// Parse, audit, and re-encode a raw metadata blob.
    pub fn inspect_text(&self, raw: &str) -> Inspection {
        let record = self.registry.parse(raw);
        let audit = self.auditor.audit(Some(&record));
        let encoded = (!record.is_empty()).then(|| (self.encode)(&record));
        Inspection {
            record,
            audit,
            encoded,
        }
    }

    /// Extract, parse, and audit the generation metadata of one image.
    pub fn process_image(&self, path: &Path) -> ProcessResult {
        let mut result = ProcessResult {
            path: path.to_path_buf(),
            image_kind: ImageKind::from_path(path),
            source: None,
            raw_text: None,
            record: MetadataRecord::default(),
            audit: AuditResult::pass(),
            encoded: None,
            error: None,
        };

        let embedded = match image::read_generation_text(path) {
            Ok(Some(embedded)) => embedded,
            Ok(None) => {
                log::debug!("No generation metadata in {}", path.display());
                return result;
            }
            Err(e) => {
                result.error = Some(format!("Failed to read metadata: {e:#}"));
                return result;
            }
        };

        let inspection = self.inspect_text(&embedded.text);
        result.source = Some(embedded.source);
        result.raw_text = Some(embedded.text);
        result.record = inspection.record;
        result.audit = inspection.audit;
        result.encoded = inspection.encoded;
        result
    }

    /// Rewrite an image's embedded metadata in canonical form.
    ///
    /// Returns the canonical text, or `None` when the file is left untouched:
    /// no metadata any parser recognizes, parameter segments the parser could
    /// not place (rewriting would lose them), or a PNG whose text only lives
    /// in EXIF `UserComment`. With `dry_run` nothing is written.
    pub fn rewrite_image(&self, path: &Path, dry_run: bool, backup: bool) -> Result<Option<String>> {
        let kind = ImageKind::from_path(path)
            .with_context(|| format!("Unsupported image format: {}", path.display()))?;
        if !kind.is_writable() {
            anyhow::bail!("Cannot write metadata to {kind:?} images");
        }

        let Some(embedded) = image::read_generation_text(path)? else {
            return Ok(None);
        };
        if !rewrites_in_place(kind, embedded.source) {
            log::warn!(
                "Metadata in {} comes from EXIF UserComment; leaving it untouched",
                path.display()
            );
            return Ok(None);
        }

        let unparsed = self.registry.unparsed(&embedded.text);
        if !unparsed.is_empty() {
            log::warn!(
                "Not rewriting {}: {} parameter segment(s) would be lost ({})",
                path.display(),
                unparsed.len(),
                unparsed.join(" | ")
            );
            return Ok(None);
        }

        let Some(encoded) = self.inspect_text(&embedded.text).encoded else {
            log::warn!("Unrecognized metadata in {}; leaving it untouched", path.display());
            return Ok(None);
        };

        if encoded == embedded.text {
            log::debug!("Metadata already canonical: {}", path.display());
            return Ok(Some(encoded));
        }
        if dry_run {
            return Ok(Some(encoded));
        }

        if backup {
            backup_file(path)?;
        }
        image::write_generation_text(path, &encoded, kind)?;
        Ok(Some(encoded))
    }
}

/// Whether writing `kind` replaces the text that was read from `source`.
///
/// PNG writes go to the `parameters` chunk, so a PNG whose text came from
/// EXIF would end up with two diverging copies.
fn rewrites_in_place(kind: ImageKind, source: TextSource) -> bool {
    match kind {
        ImageKind::Png => source == TextSource::PngParameters,
        ImageKind::Jpeg => source == TextSource::UserComment,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::fixtures::{BLANK_PNG, PARAMETERS_PNG, blank_jpeg};
    use std::fs;
    use tempfile::TempDir;

    fn pipeline() -> Pipeline {
        let auditor = Auditor::new(["banned"]).unwrap();
        Pipeline::new(ParserRegistry::default(), auditor, encoder::DEFAULT_TARGET).unwrap()
    }

    // ── ImageKind::from_path ──────────────────────────────────────────

    #[test]
    fn image_kind_known_extensions() {
        assert_eq!(ImageKind::from_path(Path::new("a.jpg")), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_path(Path::new("A.JPEG")), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_path(Path::new("a.png")), Some(ImageKind::Png));
        assert_eq!(ImageKind::from_path(Path::new("a.webp")), Some(ImageKind::WebP));
        assert_eq!(ImageKind::from_path(Path::new("a.tif")), Some(ImageKind::Tiff));
        assert_eq!(ImageKind::from_path(Path::new("a.heic")), Some(ImageKind::Heif));
    }

    #[test]
    fn image_kind_unsupported() {
        assert_eq!(ImageKind::from_path(Path::new("doc.pdf")), None);
        assert_eq!(ImageKind::from_path(Path::new("noext")), None);
    }

    #[test]
    fn writable_kinds() {
        assert!(ImageKind::Jpeg.is_writable());
        assert!(ImageKind::Png.is_writable());
        assert!(!ImageKind::Tiff.is_writable());
        assert!(!ImageKind::Heif.is_writable());
    }

    // ── collect_images ───────────────────────────────────────────────

    #[test]
    fn collect_images_directory_recursive() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();

        fs::write(dir.path().join("a.jpg"), b"fake").unwrap();
        fs::write(sub.join("b.png"), b"fake").unwrap();
        fs::write(sub.join("c.txt"), b"fake").unwrap();

        let images = collect_images(&[dir.path().to_path_buf()]);
        assert_eq!(images.len(), 2);
    }

    #[test]
    fn collect_images_skips_unsupported_and_missing() {
        let dir = TempDir::new().unwrap();
        let txt = dir.path().join("readme.txt");
        fs::write(&txt, b"hello").unwrap();

        let images = collect_images(&[txt, PathBuf::from("/nonexistent/path")]);
        assert!(images.is_empty());
    }

    // ── Pipeline ─────────────────────────────────────────────────────

    #[test]
    fn unknown_encoder_target_rejected() {
        let auditor = Auditor::new(Vec::<String>::new()).unwrap();
        let err = Pipeline::new(ParserRegistry::default(), auditor, "nope").err().unwrap();
        assert!(matches!(err, MetaError::UnknownEncoderTarget(_)));
    }

    #[test]
    fn from_config_with_bad_target_fails() {
        let mut config = Config::default();
        config.encoder.target = "nope".into();
        assert!(Pipeline::from_config(&config).is_err());
    }

    #[test]
    fn inspect_text_blocks_prompt() {
        let inspection = pipeline().inspect_text("a banned cat\nSteps: 20");
        assert!(!inspection.audit.success);
        assert_eq!(inspection.audit.blocked_for, vec!["banned"]);
    }

    #[test]
    fn inspect_unrecognized_text() {
        let inspection = pipeline().inspect_text("banned");
        assert!(inspection.record.is_empty());
        assert!(inspection.audit.success);
        assert!(inspection.encoded.is_none());
    }

    #[test]
    fn process_png_image() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gen.png");
        fs::write(&path, PARAMETERS_PNG).unwrap();

        let result = pipeline().process_image(&path);
        assert!(result.error.is_none());
        assert_eq!(result.image_kind, Some(ImageKind::Png));
        assert_eq!(result.source, Some(TextSource::PngParameters));
        assert_eq!(result.record.prompt.as_deref(), Some("a cat"));
        assert_eq!(result.record.steps.as_deref(), Some("20"));
        assert!(result.audit.success);
    }

    #[test]
    fn process_jpeg_image() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gen.jpg");
        fs::write(&path, blank_jpeg()).unwrap();
        image::write_generation_text(
            &path,
            "a banned cat\nNegative prompt: blurry\nSteps: 20, Seed: 42",
            ImageKind::Jpeg,
        )
        .unwrap();

        let result = pipeline().process_image(&path);
        assert!(result.error.is_none());
        assert_eq!(result.image_kind, Some(ImageKind::Jpeg));
        assert_eq!(result.source, Some(TextSource::UserComment));
        assert_eq!(result.record.prompt.as_deref(), Some("a banned cat"));
        assert_eq!(result.record.negative_prompt.as_deref(), Some("blurry"));
        assert_eq!(result.record.seed.as_deref(), Some("42"));
        assert_eq!(result.audit.blocked_for, vec!["banned"]);
    }

    #[test]
    fn process_jpeg_without_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.jpg");
        fs::write(&path, blank_jpeg()).unwrap();

        let result = pipeline().process_image(&path);
        assert!(result.error.is_none());
        assert!(result.source.is_none());
        assert!(result.record.is_empty());
    }

    #[test]
    fn process_missing_file_reports_error() {
        let result = pipeline().process_image(Path::new("/nonexistent/gen.png"));
        assert!(result.error.is_some());
        assert!(result.record.is_empty());
        assert!(result.audit.success);
    }

    #[test]
    fn rewrite_png_to_canonical_form() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gen.png");
        fs::write(&path, BLANK_PNG).unwrap();
        image::write_generation_text(&path, "  a cat  \nSteps: 20,Seed: 7", ImageKind::Png).unwrap();

        let pipeline = pipeline();
        let preview = pipeline.rewrite_image(&path, true, true).unwrap();
        assert_eq!(preview.as_deref(), Some("a cat\nSteps: 20, Seed: 7"));
        assert!(!dir.path().join("gen.png.bak").exists());

        pipeline.rewrite_image(&path, false, true).unwrap();
        assert!(dir.path().join("gen.png.bak").exists());
        let embedded = image::read_generation_text(&path).unwrap().unwrap();
        assert_eq!(embedded.text, "a cat\nSteps: 20, Seed: 7");
    }

    #[test]
    fn rewrite_jpeg_to_canonical_form() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gen.jpg");
        fs::write(&path, blank_jpeg()).unwrap();
        image::write_generation_text(&path, "a cat\nSeed: 7,Steps: 20", ImageKind::Jpeg).unwrap();

        let rewritten = pipeline().rewrite_image(&path, false, false).unwrap();
        assert_eq!(rewritten.as_deref(), Some("a cat\nSteps: 20, Seed: 7"));
        let embedded = image::read_generation_text(&path).unwrap().unwrap();
        assert_eq!(embedded.text, "a cat\nSteps: 20, Seed: 7");
    }

    #[test]
    fn rewrite_skips_text_with_unplaced_segments() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gen.png");
        fs::write(&path, BLANK_PNG).unwrap();
        let original = "a cat\nSteps: 20, Wildcard prompt: \"red, blue\", Seed: 7";
        image::write_generation_text(&path, original, ImageKind::Png).unwrap();

        assert!(pipeline().rewrite_image(&path, false, true).unwrap().is_none());
        assert!(!dir.path().join("gen.png.bak").exists());
        let embedded = image::read_generation_text(&path).unwrap().unwrap();
        assert_eq!(embedded.text, original);
    }

    #[test]
    fn png_rewrite_requires_parameters_chunk_source() {
        assert!(rewrites_in_place(ImageKind::Png, TextSource::PngParameters));
        assert!(!rewrites_in_place(ImageKind::Png, TextSource::UserComment));
        assert!(rewrites_in_place(ImageKind::Jpeg, TextSource::UserComment));
        assert!(!rewrites_in_place(ImageKind::WebP, TextSource::UserComment));
    }

    #[test]
    fn rewrite_without_metadata_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blank.png");
        fs::write(&path, BLANK_PNG).unwrap();

        assert!(pipeline().rewrite_image(&path, false, true).unwrap().is_none());
        assert!(!dir.path().join("blank.png.bak").exists());
    }

    #[test]
    fn rewrite_read_only_format_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan.tiff");
        fs::write(&path, b"fake").unwrap();
        assert!(pipeline().rewrite_image(&path, false, false).is_err());
    }
}
