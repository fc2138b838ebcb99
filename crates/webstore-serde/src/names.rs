//! Identifier case conversion.
//!
//! Identifiers are split into words at `_`, `-`, spaces, lower-to-upper
//! transitions (`userName`) and the end of an acronym (`HTTPServer`), then
//! re-joined in the target case.

use crate::options::NamingPolicy;

/// Split an identifier into lowercase words.
fn words(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &ch) in chars.iter().enumerate() {
        if matches!(ch, '_' | '-' | ' ') {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if ch.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|c| c.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Convert a single identifier to the case selected by `policy`.
///
/// # Examples
///
/// ```
/// use webstore_serde::names::convert;
/// use webstore_serde::NamingPolicy;
///
/// assert_eq!(convert("user_name", NamingPolicy::CamelCase), "userName");
/// assert_eq!(convert("userName", NamingPolicy::SnakeCase), "user_name");
/// assert_eq!(convert("HTTPServer", NamingPolicy::KebabCase), "http-server");
/// ```
pub fn convert(name: &str, policy: NamingPolicy) -> String {
    if policy == NamingPolicy::AsDeclared {
        return name.to_string();
    }
    let words = words(name);
    if words.is_empty() {
        return name.to_string();
    }
    match policy {
        NamingPolicy::AsDeclared => name.to_string(),
        NamingPolicy::SnakeCase => words.join("_"),
        NamingPolicy::KebabCase => words.join("-"),
        NamingPolicy::PascalCase => words.iter().map(|w| capitalize(w)).collect(),
        NamingPolicy::CamelCase => {
            let mut out = words[0].clone();
            for w in &words[1..] {
                out.push_str(&capitalize(w));
            }
            out
        }
    }
}
