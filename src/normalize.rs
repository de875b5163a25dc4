//! Cleanup applied to a raw metadata blob before any parser sees it.

/// Marker some encoders leave in front of the text (the EXIF `UNICODE\0`
/// character-code prefix decoded as plain text).
const UNICODE_MARKER: &str = "UNICODE";

/// Glyph produced by lossy decoding of invalid byte sequences.
const REPLACEMENT_CHAR: char = '\u{FFFD}';

/// Entities unescaped by the normalizer, with their decoded characters.
const ENTITIES: &[(&str, char)] = &[
    ("&amp;", '&'),
    ("&lt;", '<'),
    ("&gt;", '>'),
    ("&quot;", '"'),
    ("&#39;", '\''),
];

/// Normalize a raw metadata string.
///
/// Strips the literal `UNICODE` marker, strips every U+FFFD replacement glyph,
/// then decodes the five basic HTML entities (`&amp;` `&lt;` `&gt;` `&quot;`
/// `&#39;`). Other entities such as `&nbsp;` are left as written.
///
/// The result contains no marker and no decodable entity, even when decoding
/// or stripping assembles a new one (`&amp;amp;` → `&`), so the function is
/// idempotent: `normalize(&normalize(x)) == normalize(x)`. The text is scanned
/// once and runs in linear time.
///
/// ```rust
/// use genmeta::normalize::normalize;
///
/// assert_eq!(normalize("UNICODEa cat &amp; a dog\u{FFFD}"), "a cat & a dog");
/// assert_eq!(normalize("&amp;amp;amp;"), "&");
/// assert_eq!(normalize(""), "");
/// ```
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars().filter(|&c| c != REPLACEMENT_CHAR) {
        out.push(c);
        reduce_tail(&mut out);
    }
    out
}

/// Normalize a byte blob that may not be valid UTF-8.
///
/// Invalid sequences decode to U+FFFD and are then dropped by [`normalize`].
pub fn normalize_bytes(raw: &[u8]) -> String {
    normalize(&String::from_utf8_lossy(raw))
}

/// Collapse markers and entities ending at the tail of `out`.
///
/// Everything before the tail is already clean, and each reduction shortens
/// `out`, so the total work stays linear in the input.
fn reduce_tail(out: &mut String) {
    loop {
        if out.ends_with(UNICODE_MARKER) {
            out.truncate(out.len() - UNICODE_MARKER.len());
        } else if let Some((entity, decoded)) = ENTITIES.iter().find(|(e, _)| out.ends_with(e)) {
            out.truncate(out.len() - entity.len());
            out.push(*decoded);
        } else {
            return;
        }
    }
}
