//! Parser for the Automatic1111 WebUI text format and its derivatives.
//!
//! The format is a narrative block followed by a single parameter line:
//!
//! ```text
//! a cat, masterpiece <lora:goodLora:0.8>
//! Negative prompt: blurry
//! Steps: 20, Sampler: Euler, CFG scale: 7, Seed: 42, Model hash: abc123, Model: foo
//! ```

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::MetadataParser;
use crate::record::{MetadataRecord, Resource};

/// Structural marker that identifies the format.
const STEPS_MARKER: &str = "Steps: ";

/// Separates the prompt from the negative prompt inside the narrative block.
pub const NEGATIVE_PROMPT_MARKER: &str = "Negative prompt:";

/// Display keys on the parameter line and the record fields they populate.
pub const KNOWN_KEYS: &[(&str, &str)] = &[
    ("Seed", "seed"),
    ("CFG scale", "cfgScale"),
    ("Sampler", "sampler"),
    ("Steps", "steps"),
];

/// Highest `AddNet Model {i}` slot that is examined.
pub const MAX_ADDNET_SLOTS: usize = 64;

/// Resource type used when an AddNet slot has no `AddNet Module {i}` entry.
const DEFAULT_ADDNET_TYPE: &str = "lora";

static EXTRA_NETWORK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(lora|hypernet):([a-zA-Z0-9_\.]+):([0-9.]+)>")
        .expect("Invalid extra network tag regex")
});

static NAME_WITH_HASH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-zA-Z0-9_\.]+)\(([a-zA-Z0-9]+)\)").expect("Invalid name/hash regex")
});

/// Record field a parameter-line key maps to (the key itself when unknown).
pub fn field_for_key(key: &str) -> &str {
    KNOWN_KEYS
        .iter()
        .find(|(display, _)| *display == key)
        .map(|(_, field)| *field)
        .unwrap_or(key)
}

/// Parameter-line key for a record field (the field itself when unknown).
pub fn key_for_field(field: &str) -> &str {
    KNOWN_KEYS
        .iter()
        .find(|(_, f)| *f == field)
        .map(|(display, _)| *display)
        .unwrap_or(field)
}

/// Parser for text produced by the Automatic1111 WebUI.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutomaticParser;

impl AutomaticParser {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataParser for AutomaticParser {
    fn name(&self) -> &str {
        "automatic1111"
    }

    fn can_handle(&self, text: &str) -> bool {
        text.contains(STEPS_MARKER)
    }

    fn parse(&self, text: &str) -> MetadataRecord {
        let (narrative, parameter_line) = split_parameter_line(text);

        let mut record = parse_parameter_line(parameter_line);

        let (prompt, negative_prompt) = split_narrative(narrative);
        record.prompt = Some(prompt.to_string());
        record.negative_prompt = negative_prompt.map(str::to_string);

        let mut resources = inline_resources(prompt);
        resources.extend(model_resource(&record));
        resources.extend(hypernet_resource(&record));
        resources.extend(addnet_resources(&record));
        record.resources = resources;

        record
    }

    /// Parameter-line segments that have no `key: value` shape, plus keys that
    /// repeat or collide with the narrative fields. Their content is absent
    /// from the parsed record.
    fn unparsed(&self, text: &str) -> Vec<String> {
        let (_, parameter_line) = split_parameter_line(text);
        let mut seen = HashSet::new();

        parameter_line
            .split(',')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .filter(|segment| match segment.split_once(':') {
                None => true,
                Some((_, value)) if value.trim().is_empty() => false,
                Some((key, _)) => {
                    let field = field_for_key(key.trim());
                    matches!(field, "prompt" | "negativePrompt" | "resources")
                        || !seen.insert(field.to_string())
                }
            })
            .map(str::to_string)
            .collect()
    }
}

/// Split text into the narrative block and the trailing parameter line.
fn split_parameter_line(text: &str) -> (&str, &str) {
    let text = text.trim_end_matches(['\r', '\n']);
    text.rsplit_once('\n').unwrap_or(("", text))
}

/// Fold the comma-separated `key: value` segments into a record.
fn parse_parameter_line(line: &str) -> MetadataRecord {
    line.split(',')
        .filter_map(|segment| {
            let (key, value) = segment.split_once(':')?;
            let value = value.trim();
            if value.is_empty() {
                None
            } else {
                Some((key.trim(), value))
            }
        })
        .fold(MetadataRecord::default(), |record, (key, value)| {
            apply_param(record, key, value)
        })
}

fn apply_param(mut record: MetadataRecord, key: &str, value: &str) -> MetadataRecord {
    let value = value.to_string();
    match field_for_key(key) {
        "seed" => record.seed = Some(value),
        "cfgScale" => record.cfg_scale = Some(value),
        "sampler" => record.sampler = Some(value),
        "steps" => record.steps = Some(value),
        // Owned by the narrative block and resource extraction.
        "prompt" | "negativePrompt" | "resources" => {}
        _ => record.other.insert(key, value),
    }
    record
}

/// Split the narrative block into prompt and optional negative prompt.
fn split_narrative(narrative: &str) -> (&str, Option<&str>) {
    match narrative.split_once(NEGATIVE_PROMPT_MARKER) {
        Some((prompt, negative)) => (prompt.trim(), Some(negative.trim())),
        None => (narrative.trim(), None),
    }
}

/// `<lora:NAME:WEIGHT>` and `<hypernet:NAME:WEIGHT>` tags, left to right.
fn inline_resources(prompt: &str) -> Vec<Resource> {
    EXTRA_NETWORK_TAG
        .captures_iter(prompt)
        .map(|caps| Resource {
            kind: caps[1].to_lowercase(),
            name: caps[2].to_string(),
            weight: parse_weight(&caps[3]),
            hash: None,
        })
        .collect()
}

fn model_resource(record: &MetadataRecord) -> Option<Resource> {
    let name = record.get("Model")?;
    let hash = record.get("Model hash")?;
    Some(Resource {
        kind: "model".to_string(),
        name: name.to_string(),
        weight: None,
        hash: Some(hash.to_string()),
    })
}

fn hypernet_resource(record: &MetadataRecord) -> Option<Resource> {
    let name = record.get("Hypernet")?;
    let strength = record.get("Hypernet strength")?;
    Some(Resource {
        kind: "hypernet".to_string(),
        name: name.to_string(),
        weight: parse_weight(strength),
        hash: None,
    })
}

/// Resources from the Additional Networks extension's numbered slots.
///
/// Slots are read from 1 upwards and stop at the first missing
/// `AddNet Model {i}`, or at [`MAX_ADDNET_SLOTS`].
fn addnet_resources(record: &MetadataRecord) -> Vec<Resource> {
    if record.get("AddNet Enabled") != Some("True") {
        return Vec::new();
    }

    let resources: Vec<Resource> = (1..=MAX_ADDNET_SLOTS)
        .map_while(|i| record.get(&format!("AddNet Model {i}")).map(|model| (i, model)))
        .map(|(i, model)| {
            let (name, hash) = match NAME_WITH_HASH.captures(model) {
                Some(caps) => (caps[1].to_string(), Some(caps[2].to_string())),
                None => (model.trim().to_string(), None),
            };
            let kind = record
                .get(&format!("AddNet Module {i}"))
                .map(str::to_lowercase)
                .unwrap_or_else(|| DEFAULT_ADDNET_TYPE.to_string());
            let weight = record
                .get(&format!("AddNet Weight {i}"))
                .and_then(parse_weight);

            Resource { kind, name, weight, hash }
        })
        .collect();

    if resources.len() == MAX_ADDNET_SLOTS
        && record
            .get(&format!("AddNet Model {}", MAX_ADDNET_SLOTS + 1))
            .is_some()
    {
        log::warn!("Ignoring AddNet slots beyond {MAX_ADDNET_SLOTS}");
    }

    resources
}

/// Parse a weight; unparseable text yields `None` instead of NaN.
fn parse_weight(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|w| w.is_finite())
}
