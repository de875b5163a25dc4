use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Structured generation metadata extracted from an image.
///
/// Every field is optional because the source text is semi-structured:
/// anything absent in the text is absent here, never defaulted. Keys the
/// parsers do not model are kept verbatim in [`other`](Self::other), in the
/// order they were first seen.
///
/// Serializes to the camelCase shape consumers expect:
///
/// ```rust
/// use genmeta::record::MetadataRecord;
///
/// let record = MetadataRecord {
///     prompt: Some("a cat".into()),
///     steps: Some("20".into()),
///     ..Default::default()
/// };
/// let json = serde_json::to_value(&record).unwrap();
/// assert_eq!(json, serde_json::json!({"prompt": "a cat", "steps": "20"}));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfg_scale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Resource>,
    /// Unrecognized key/value pairs, preserved under their original key.
    #[serde(flatten)]
    pub other: ExtraFields,
}

impl MetadataRecord {
    /// `true` when nothing at all was extracted.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Look up an unrecognized field by its original key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.other.get(key)
    }
}

/// One auxiliary model used during generation (LoRA, hypernetwork, checkpoint).
///
/// `weight` is `None` both when the source carried no weight and when the
/// weight text could not be parsed as a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// Insertion-ordered string map for fields the parsers do not model.
///
/// Re-inserting an existing key replaces its value but keeps its original
/// position, so re-encoding reproduces the source ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtraFields(Vec<(String, String)>);

impl ExtraFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ExtraFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Self::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

impl Serialize for ExtraFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ExtraFields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = ExtraFields;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of string fields")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut fields = ExtraFields::new();
                while let Some((k, v)) = access.next_entry::<String, serde_json::Value>()? {
                    // Non-string scalars (e.g. a numeric seed written by hand) keep their text form.
                    let v = match v {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Null => continue,
                        other => other.to_string(),
                    };
                    fields.insert(k, v);
                }
                Ok(fields)
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── ExtraFields ──────────────────────────────────────────────────

    #[test]
    fn extra_fields_keep_first_seen_order() {
        let fields: ExtraFields = [("Size", "512x512"), ("Model", "foo"), ("Size", "768x768")]
            .into_iter()
            .collect();
        let pairs: Vec<_> = fields.iter().collect();
        assert_eq!(pairs, vec![("Size", "768x768"), ("Model", "foo")]);
    }

    #[test]
    fn extra_fields_get_missing() {
        assert!(ExtraFields::new().get("Model").is_none());
    }

    // ── MetadataRecord serde ─────────────────────────────────────────

    #[test]
    fn empty_record_serializes_to_empty_object() {
        let json = serde_json::to_string(&MetadataRecord::default()).unwrap();
        assert_eq!(json, "{}");
        assert!(MetadataRecord::default().is_empty());
    }

    #[test]
    fn record_serializes_camel_case_and_flattens_other() {
        let mut record = MetadataRecord {
            prompt: Some("a cat".into()),
            negative_prompt: Some("blurry".into()),
            cfg_scale: Some("7".into()),
            resources: vec![Resource {
                kind: "lora".into(),
                name: "goodLora".into(),
                weight: Some(0.8),
                hash: None,
            }],
            ..Default::default()
        };
        record.other.insert("Model hash", "abc123");

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["negativePrompt"], "blurry");
        assert_eq!(json["cfgScale"], "7");
        assert_eq!(json["Model hash"], "abc123");
        assert_eq!(json["resources"][0]["type"], "lora");
        assert!(json["resources"][0].get("hash").is_none());
    }

    #[test]
    fn record_deserializes_unknown_keys_into_other() {
        let json = r#"{"prompt": "a cat", "seed": "42", "Size": "512x512", "Clip skip": 2}"#;
        let record: MetadataRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.prompt.as_deref(), Some("a cat"));
        assert_eq!(record.seed.as_deref(), Some("42"));
        assert_eq!(record.get("Size"), Some("512x512"));
        assert_eq!(record.get("Clip skip"), Some("2"));
        assert!(record.get("prompt").is_none());
    }
}
