//! Entity sanitation for incoming file payloads
//!
//! Correctly-encoded payloads use standard JSON escaping and pass through
//! untouched. Some upstream encoders leak HTML entities (`&quot;`,
//! `&#34;`) or doubly-escaped quotes into source text; this module is the
//! defense-in-depth decode. Two passes: a strict one built on the entity
//! library, and an aggressive one that rewrites the malformed leftovers
//! the strict pass does not recognize. Both passes are idempotent.

use std::sync::LazyLock;

use regex::Regex;

/// Strict pass: standard entity decoding, iterated to a fixpoint so that
/// double-encoded payloads (`&amp;quot;`) fully unwind
pub fn strict_decode(input: &str) -> String {
    let mut current = input.to_string();
    // Each effective decode strictly shrinks the text, so this terminates;
    // the counter is a guard against a misbehaving entity table
    for _ in 0..=input.len() {
        let decoded = html_escape::decode_html_entities(&current).to_string();
        if decoded == current {
            break;
        }
        current = decoded;
    }
    current
}

static MALFORMED_QUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)&quot;?|&#0*34;?|&#x0*22;?"#).expect("static regex"));

/// Signature of a payload that came through a broken encoder
fn looks_entity_mangled(input: &str) -> bool {
    MALFORMED_QUOTE.is_match(input)
}

/// Aggressive pass: rewrite malformed quote entities (missing semicolons,
/// odd casing) and escaped-quote literals left behind by double encoding
pub fn aggressive_decode(input: &str) -> String {
    let unquoted = MALFORMED_QUOTE.replace_all(input, "\"");
    unquoted.replace("\\\"", "\"")
}

/// Full sanitation: strict always, aggressive only when the strict result
/// still carries the mangled-encoder signature. Returns the clean text and
/// whether anything changed.
pub fn sanitize(input: &str) -> (String, bool) {
    let strict = strict_decode(input);
    let result = if looks_entity_mangled(&strict) {
        aggressive_decode(&strict)
    } else {
        strict
    };
    let changed = result != input;
    (result, changed)
}
