//! Canonicalization of the address fields the wrangler audits: city names,
//! street-name suffixes and postal codes.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// Last whitespace-delimited token of a street name, optionally ending in a period.
static STREET_TYPE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b\S+\.?$").unwrap());
static POSTCODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{5}(?:[-\s]\d{4})?$").unwrap());

const STATE_SUFFIXES: [&str; 2] = [", WA", ",WA"];
const LEGACY_SUFFIX_CHARS: [char; 4] = [',', ' ', 'W', 'A'];

const DEFAULT_ABBREVIATIONS: [(&str, &str); 11] = [
    ("St", "Street"),
    ("St.", "Street"),
    ("Rd.", "Road"),
    ("Ave", "Avenue"),
    ("NE", "Northeast"),
    ("NW", "Northwest"),
    ("SE", "Southeast"),
    ("SW", "Southwest"),
    ("WY", "Way"),
    ("Ln", "Lane"),
    ("ln", "Lane"),
];

/// Switches that reproduce the historical output of the original audit rules.
///
/// Both rules used to test a condition that was always true. With a switch off
/// the evidently intended condition is applied instead.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Compatibility {
    /// Trim any trailing `,`, ` `, `W` and `A` characters from every city name.
    pub legacy_city_suffix: bool,
    /// Run street normalization on every tag value, whatever its key.
    pub legacy_street_scope: bool,
}

/// Street-type abbreviation table. Lookups are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreetMapping {
    expansions: BTreeMap<String, String>,
}

impl StreetMapping {
    pub fn new(expansions: BTreeMap<String, String>) -> StreetMapping {
        StreetMapping { expansions }
    }

    pub fn get(&self, abbreviation: &str) -> Option<&str> {
        self.expansions.get(abbreviation).map(String::as_str)
    }
}

impl Default for StreetMapping {
    fn default() -> Self {
        StreetMapping::new(
            DEFAULT_ABBREVIATIONS.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        )
    }
}

/// Upper-cases the first letter of every whitespace-separated word and
/// lower-cases the rest. Runs of whitespace collapse to a single space.
fn capitalize_words(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Strips a trailing ", WA" / ",WA" state suffix if present, then title-cases the name.
pub fn normalize_city(name: &str) -> String {
    let stripped = STATE_SUFFIXES.iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .unwrap_or(name);
    capitalize_words(stripped)
}

/// Historical city rule: trailing `,`, ` `, `W`, `A` characters are trimmed
/// unconditionally, so "Walla Walla" loses its final "a" only when it is upper case.
pub fn normalize_city_legacy(name: &str) -> String {
    capitalize_words(name.trim_end_matches(&LEGACY_SUFFIX_CHARS[..]))
}

/// Replaces the street type (last token) with its expansion when the table knows it.
pub fn normalize_street(name: &str, mapping: &StreetMapping) -> String {
    if let Some(street_type) = STREET_TYPE_RE.find(name) {
        if let Some(expansion) = mapping.get(street_type.as_str()) {
            return format!("{}{}", &name[..street_type.start()], expansion);
        }
    }
    name.to_string()
}

/// Checks a postal code against `12345`, `12345-6789` and `12345 6789`.
///
/// Returns `(false, first five digits)` for a valid code and `(true, code)`
/// otherwise. Marking invalid codes is left to the caller.
pub fn normalize_postcode(code: &str) -> (bool, String) {
    if POSTCODE_RE.is_match(code) {
        (false, code.chars().take(5).collect())
    } else {
        (true, code.to_string())
    }
}
