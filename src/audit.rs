//! Moderation screening of prompt text against a wordlist.
//!
//! Each blocked word matches only at a loose word boundary: it must be
//! preceded by start-of-line, whitespace, `(` or `)`, and followed by
//! whitespace, `,`, end-of-line, `(` or `)`. This catches words inside
//! emphasis groups like `(word:1.2)` while leaving `wordy` alone.
//! Matching is case-sensitive and entries are literals.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::MetaError;
use crate::record::MetadataRecord;

/// Wordlist compiled into the binary, used when no external list is configured.
pub const DEFAULT_WORDLIST_JSON: &str = include_str!("../assets/blocklist.json");

/// Outcome of screening one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    /// Wordlist entries that matched, in wordlist order.
    pub blocked_for: Vec<String>,
    /// `true` iff `blocked_for` is empty.
    pub success: bool,
}

impl AuditResult {
    fn from_blocked(blocked_for: Vec<String>) -> Self {
        let success = blocked_for.is_empty();
        Self { blocked_for, success }
    }

    /// A passing result with nothing blocked.
    pub fn pass() -> Self {
        Self::from_blocked(Vec::new())
    }
}

struct BlockRule {
    word: String,
    pattern: Regex,
}

/// Compiled wordlist. Build once, then share by reference.
///
/// ```rust
/// use genmeta::audit::Auditor;
/// use genmeta::record::MetadataRecord;
///
/// let auditor = Auditor::new(["banned"]).unwrap();
/// let record = MetadataRecord {
///     prompt: Some("this is banned content".into()),
///     ..Default::default()
/// };
///
/// let result = auditor.audit(Some(&record));
/// assert_eq!(result.blocked_for, vec!["banned"]);
/// assert!(!result.success);
///
/// assert!(auditor.audit(None).success);
/// ```
pub struct Auditor {
    rules: Vec<BlockRule>,
}

impl Auditor {
    /// Compile a wordlist. Blank entries are rejected.
    pub fn new<I, S>(words: I) -> Result<Self, MetaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rules = words
            .into_iter()
            .enumerate()
            .map(|(index, word)| {
                let word = word.into();
                if word.trim().is_empty() {
                    return Err(MetaError::InvalidWordlist {
                        index,
                        reason: "entry is blank".to_string(),
                    });
                }
                let pattern = Regex::new(&format!(
                    r"(?m)(?:^|\s|\(|\)){}(?:\s|,|$|\(|\))",
                    regex::escape(&word)
                ))?;
                Ok(BlockRule { word, pattern })
            })
            .collect::<Result<Vec<_>, MetaError>>()?;

        log::debug!("Compiled audit wordlist with {} entries", rules.len());
        Ok(Self { rules })
    }

    /// Compile a wordlist given as a JSON array of strings.
    pub fn from_json(json: &str) -> Result<Self, MetaError> {
        let words: Vec<String> = serde_json::from_str(json)?;
        Self::new(words)
    }

    /// Compile the built-in wordlist.
    pub fn with_default_wordlist() -> Result<Self, MetaError> {
        Self::from_json(DEFAULT_WORDLIST_JSON)
    }

    /// The configured entries, in order.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.word.as_str())
    }

    /// Screen a record's prompt.
    ///
    /// A missing record or a record without a prompt passes.
    pub fn audit(&self, record: Option<&MetadataRecord>) -> AuditResult {
        match record.and_then(|r| r.prompt.as_deref()) {
            Some(prompt) => self.audit_text(prompt),
            None => AuditResult::pass(),
        }
    }

    /// Screen raw prompt text.
    pub fn audit_text(&self, prompt: &str) -> AuditResult {
        let blocked_for: Vec<String> = self
            .rules
            .iter()
            .filter(|rule| rule.pattern.is_match(prompt))
            .map(|rule| rule.word.clone())
            .collect();

        if !blocked_for.is_empty() {
            log::debug!("Prompt blocked for: {}", blocked_for.join(", "));
        }
        AuditResult::from_blocked(blocked_for)
    }
}

static DEFAULT_AUDITOR: LazyLock<Auditor> = LazyLock::new(|| {
    Auditor::with_default_wordlist().expect("Invalid built-in audit wordlist")
});

/// Screen a record against the built-in wordlist.
pub fn audit_metadata(record: Option<&MetadataRecord>) -> AuditResult {
    DEFAULT_AUDITOR.audit(record)
}
