//! Format-specific metadata parsers and the registry that dispatches to them.
//!
//! A [`ParserRegistry`] holds an ordered list of [`MetadataParser`]s. For a
//! given (normalized) text the first parser whose [`can_handle`] returns
//! `true` is used; later parsers act purely as fallbacks and results are never
//! merged.
//!
//! Parsing is best-effort: text that no parser accepts, and empty text,
//! produce an empty [`MetadataRecord`] rather than an error.
//!
//! [`can_handle`]: MetadataParser::can_handle

pub mod automatic;

pub use automatic::AutomaticParser;

use std::sync::LazyLock;

use crate::normalize::normalize;
use crate::record::MetadataRecord;

/// A parser for one family of generation-metadata text.
///
/// Implement this trait to teach the registry a new generator format.
///
/// # Example
///
/// ```rust
/// use genmeta::parser::{MetadataParser, ParserRegistry};
/// use genmeta::record::MetadataRecord;
///
/// struct PromptOnly;
///
/// impl MetadataParser for PromptOnly {
///     fn name(&self) -> &str { "prompt-only" }
///     fn can_handle(&self, text: &str) -> bool { text.starts_with("prompt=") }
///     fn parse(&self, text: &str) -> MetadataRecord {
///         MetadataRecord {
///             prompt: Some(text.trim_start_matches("prompt=").to_string()),
///             ..Default::default()
///         }
///     }
/// }
///
/// let registry = ParserRegistry::default().with_parser(PromptOnly);
/// let record = registry.parse("prompt=a cat");
/// assert_eq!(record.prompt.as_deref(), Some("a cat"));
/// ```
pub trait MetadataParser: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;
    /// Whether this parser understands the given normalized text.
    fn can_handle(&self, text: &str) -> bool;
    /// Extract a record from normalized text this parser accepted.
    fn parse(&self, text: &str) -> MetadataRecord;
    /// Fragments of accepted text that [`parse`](Self::parse) leaves out of
    /// the record. Re-encoding such a record would drop them.
    fn unparsed(&self, _text: &str) -> Vec<String> {
        Vec::new()
    }
}

/// Ordered, first-match-wins collection of parsers.
///
/// Built once and then only read; share it by reference across threads.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn MetadataParser>>,
}

impl ParserRegistry {
    /// An empty registry. Every parse returns an empty record.
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    /// Append a parser after the ones already registered.
    pub fn with_parser(mut self, parser: impl MetadataParser + 'static) -> Self {
        self.parsers.push(Box::new(parser));
        self
    }

    /// Names of the registered parsers, in dispatch order.
    pub fn names(&self) -> Vec<&str> {
        self.parsers.iter().map(|p| p.name()).collect()
    }

    /// Return the first parser whose predicate accepts `text`.
    ///
    /// `text` is expected to be normalized already.
    pub fn select(&self, text: &str) -> Option<&dyn MetadataParser> {
        self.parsers
            .iter()
            .find(|p| p.can_handle(text))
            .map(|p| p.as_ref())
    }

    /// Normalize `raw`, select a parser, and parse.
    pub fn parse(&self, raw: &str) -> MetadataRecord {
        if raw.is_empty() {
            return MetadataRecord::default();
        }

        let text = normalize(raw);
        match self.select(&text) {
            Some(parser) => {
                log::debug!("Parsing generation metadata with {}", parser.name());
                parser.parse(&text)
            }
            None => {
                log::debug!("No metadata parser accepts the text; returning empty record");
                MetadataRecord::default()
            }
        }
    }

    /// Fragments of `raw` that [`parse`](Self::parse) would leave out of the
    /// record. Empty when no parser accepts the text.
    pub fn unparsed(&self, raw: &str) -> Vec<String> {
        let text = normalize(raw);
        self.select(&text)
            .map(|parser| parser.unparsed(&text))
            .unwrap_or_default()
    }
}

impl Default for ParserRegistry {
    /// The built-in parsers: currently the Automatic1111 family.
    fn default() -> Self {
        Self::new().with_parser(AutomaticParser::new())
    }
}

static DEFAULT_REGISTRY: LazyLock<ParserRegistry> = LazyLock::new(ParserRegistry::default);

/// Parse a raw metadata blob with the built-in parsers.
///
/// Accepts either `&str` or `Option<&str>`; `None` and `""` both yield an
/// empty record. Never fails.
///
/// ```rust
/// use genmeta::parser::parse_metadata;
///
/// let record = parse_metadata("a cat\nSteps: 20, Seed: 42");
/// assert_eq!(record.prompt.as_deref(), Some("a cat"));
/// assert_eq!(record.seed.as_deref(), Some("42"));
///
/// assert!(parse_metadata(None).is_empty());
/// ```
pub fn parse_metadata<'a>(raw: impl Into<Option<&'a str>>) -> MetadataRecord {
    match raw.into() {
        Some(text) => DEFAULT_REGISTRY.parse(text),
        None => MetadataRecord::default(),
    }
}

/// Select a built-in parser for already-normalized text.
pub fn select_parser(text: &str) -> Option<&'static dyn MetadataParser> {
    DEFAULT_REGISTRY.select(text)
}
