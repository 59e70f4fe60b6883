//! Language utilities for ISO 639 code handling
//!
//! Job target languages and the configured source language are accepted as
//! ISO 639-1 (2-letter), ISO 639-3/2T or ISO 639-2/B (3-letter) codes and
//! normalized before use, so `fr`, `fra` and `fre` all name the same job
//! language.

use anyhow::{Result, anyhow};
use isolang::Language;

/// ISO 639-2/B codes that differ from their 2/T form
const BIBLIOGRAPHIC_CODES: &[(&str, &str)] = &[
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("dut", "nld"),
    ("fre", "fra"),
    ("geo", "kat"),
    ("ger", "deu"),
    ("gre", "ell"),
    ("ice", "isl"),
    ("mac", "mkd"),
    ("may", "msa"),
    ("per", "fas"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Resolve any supported code form to a language
pub fn parse_language(code: &str) -> Result<Language> {
    let code = code.trim().to_lowercase();
    let language = match code.len() {
        2 => Language::from_639_1(&code),
        3 => {
            let terminology = BIBLIOGRAPHIC_CODES
                .iter()
                .find(|(b, _)| *b == code)
                .map(|(_, t)| *t)
                .unwrap_or(code.as_str());
            Language::from_639_3(terminology)
        }
        _ => None,
    };
    language.ok_or_else(|| anyhow!("Invalid language code: {}", code))
}

/// Validate a language code
pub fn validate_language_code(code: &str) -> Result<()> {
    parse_language(code).map(|_| ())
}

/// Canonical form of a code: ISO 639-1 where one exists, else ISO 639-3
pub fn normalize_language_code(code: &str) -> Result<String> {
    let language = parse_language(code)?;
    Ok(language
        .to_639_1()
        .map(str::to_string)
        .unwrap_or_else(|| language.to_639_3().to_string()))
}

/// Check if two codes represent the same language
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (parse_language(code1), parse_language(code2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// English name of the language, used in prompts
pub fn get_language_name(code: &str) -> Result<String> {
    Ok(parse_language(code)?.to_name().to_string())
}
