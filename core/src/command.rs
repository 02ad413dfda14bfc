//! Interpretation of typed command prefixes such as `/explain: ...`.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref COMMAND_PREFIX: Regex =
        Regex::new(r"(?i)^/(explain|answer|rewrite|rephrase)\s*:?\s*")
            .expect("command prefix pattern is valid");
}

/// Command tags offered by the panel, in display order
pub const COMMAND_TAGS: [&str; 3] = ["/explain", "/answer", "/rewrite"];

/// Trims the input and removes a leading recognized command token together
/// with its optional colon and surrounding whitespace.
pub fn strip_command(raw: &str) -> String {
    let trimmed = raw.trim();
    COMMAND_PREFIX.replace(trimmed, "").into_owned()
}

/// Returns the canonical tag of a recognized command prefix, if any.
pub fn detect_tag(raw: &str) -> Option<&'static str> {
    let caps = COMMAND_PREFIX.captures(raw.trim())?;
    match caps.get(1)?.as_str().to_lowercase().as_str() {
        "explain" => Some("/explain"),
        "answer" => Some("/answer"),
        "rewrite" => Some("/rewrite"),
        "rephrase" => Some("/rephrase"),
        _ => None,
    }
}
