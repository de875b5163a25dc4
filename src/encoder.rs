//! Serialize a [`MetadataRecord`] back to generator text.
//!
//! Encoders are looked up by target name. The only built-in target is
//! [`DEFAULT_TARGET`], the inverse of [`AutomaticParser`](crate::parser::AutomaticParser).
//!
//! Resources are **not** written back as inline tags: the tags already live in
//! the prompt text, while field-derived resources (model, hypernet, AddNet)
//! round-trip through their original parameter-line keys. The `resources`
//! list itself is therefore not an input to encoding.

use crate::error::MetaError;
use crate::parser::automatic::{NEGATIVE_PROMPT_MARKER, key_for_field};
use crate::record::MetadataRecord;

/// Target used when the caller does not choose one.
pub const DEFAULT_TARGET: &str = "automatic1111";

/// Signature shared by all encoders.
pub type EncodeFn = fn(&MetadataRecord) -> String;

const ENCODERS: &[(&str, EncodeFn)] = &[(DEFAULT_TARGET, encode_automatic)];

/// Names of all encoder targets.
pub fn targets() -> impl Iterator<Item = &'static str> {
    ENCODERS.iter().map(|(name, _)| *name)
}

/// Resolve an encoder by target name.
pub fn encoder_for(target: &str) -> Result<EncodeFn, MetaError> {
    ENCODERS
        .iter()
        .find(|(name, _)| *name == target)
        .map(|(_, encode)| *encode)
        .ok_or_else(|| MetaError::UnknownEncoderTarget(target.to_string()))
}

/// Encode `record` as text for `target`.
///
/// ```rust
/// use genmeta::encoder::{encode_metadata, DEFAULT_TARGET};
/// use genmeta::record::MetadataRecord;
///
/// let record = MetadataRecord {
///     prompt: Some("a cat".into()),
///     negative_prompt: Some("blurry".into()),
///     steps: Some("20".into()),
///     seed: Some("42".into()),
///     ..Default::default()
/// };
/// let text = encode_metadata(&record, DEFAULT_TARGET).unwrap();
/// assert_eq!(text, "a cat\nNegative prompt: blurry\nSteps: 20, Seed: 42");
///
/// assert!(encode_metadata(&record, "comfyui").is_err());
/// ```
pub fn encode_metadata(record: &MetadataRecord, target: &str) -> Result<String, MetaError> {
    let encode = encoder_for(target)?;
    Ok(encode(record))
}

fn encode_automatic(record: &MetadataRecord) -> String {
    let mut lines = vec![record.prompt.clone().unwrap_or_default()];

    if let Some(negative) = record.negative_prompt.as_deref().filter(|n| !n.is_empty()) {
        lines.push(format!("{NEGATIVE_PROMPT_MARKER} {negative}"));
    }

    let known = [
        ("steps", &record.steps),
        ("sampler", &record.sampler),
        ("cfgScale", &record.cfg_scale),
        ("seed", &record.seed),
    ];
    let fine_details: Vec<String> = known
        .into_iter()
        .filter_map(|(field, value)| {
            value
                .as_deref()
                .map(|v| format!("{}: {v}", key_for_field(field)))
        })
        .chain(record.other.iter().map(|(k, v)| format!("{k}: {v}")))
        .collect();

    if !fine_details.is_empty() {
        lines.push(fine_details.join(", "));
    }

    lines.join("\n")
}
