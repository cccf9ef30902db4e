//! `$name` placeholder substitution for URL and output-path templates.
//!
//! Supports `$name`, `${name}` and the `$$` escape. Substitution is "safe":
//! a placeholder with no matching field is left in the output verbatim.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::record::ParameterRecord;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\$(?:(?P<escaped>\$)|(?P<named>[_A-Za-z][_A-Za-z0-9]*)|\{(?P<braced>[_A-Za-z][_A-Za-z0-9]*)\})",
    )
    .expect("placeholder pattern is valid")
});

/// Substitute the record's fields into `template`.
pub fn safe_substitute(template: &str, params: &ParameterRecord) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            if caps.name("escaped").is_some() {
                return "$".to_string();
            }
            let name = caps
                .name("named")
                .or_else(|| caps.name("braced"))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match params.get(name) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
