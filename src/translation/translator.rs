/*!
 * Translator contract and batch framing.
 *
 * A `TranslationModel` receives a whole batch at once and answers with one
 * outcome per input, in order. Text based models see the batch as a single
 * prompt where every item is introduced by an `<<ENTRY_i>>` marker and the
 * list is closed by `<<END>>`; the response is split back on the same
 * markers.
 */

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Debug;

use crate::errors::{BatchTranslationFailure, ProviderError};
use crate::language_utils::get_language_name;

use super::glossary::GlossaryTerm;

/// Result for one item of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Translated(String),
    Failed(String),
}

/// Source and target language codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl LanguagePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// A translation model resident on the accelerator.
///
/// Implementations are invoked once per batch, never per unit, and only
/// while the caller holds the accelerator permit.
#[async_trait]
pub trait TranslationModel: Send + Sync + Debug {
    /// Translate every text of the batch, returning one outcome per input
    async fn translate_batch(
        &self,
        texts: &[String],
        languages: &LanguagePair,
        glossary: &[GlossaryTerm],
    ) -> Result<Vec<ItemOutcome>, ProviderError>;

    /// Human-readable model name
    fn name(&self) -> String;

    /// Check that the model is reachable and loaded
    async fn health_check(&self) -> Result<(), ProviderError>;
}

/// Marker that ends a framed batch
pub const END_MARKER: &str = "<<END>>";

/// Default instructions sent with every batch
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional translator of presentation slides. \
Translate every entry from {source_language} to {target_language}. \
Each entry starts with a marker like <<ENTRY_0>> and the list ends with <<END>>. \
Keep every marker exactly as it is, in the same order, and translate only the text between markers. \
Preserve leading and trailing spaces, numbers and punctuation. \
Only respond with the markers and the translated text, without any explanations or notes.";

static MARKER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<<(?:ENTRY_(\d+)|END)>>").expect("marker pattern is valid"));

static THINK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("think pattern is valid"));

/// Marker introducing item `index`
pub fn entry_marker(index: usize) -> String {
    format!("<<ENTRY_{}>>", index)
}

/// Frame a batch as one prompt
pub fn build_batch_prompt(texts: &[String]) -> String {
    let mut combined = String::new();
    for (idx, text) in texts.iter().enumerate() {
        combined.push_str(&entry_marker(idx));
        combined.push('\n');
        combined.push_str(text);
        combined.push('\n');
    }
    combined.push_str(END_MARKER);
    combined
}

/// Fill the language placeholders (English names where the code is known)
/// and append the glossary instructions
pub fn render_system_prompt(template: &str, languages: &LanguagePair, glossary: &[GlossaryTerm]) -> String {
    let name = |code: &str| get_language_name(code).unwrap_or_else(|_| code.to_string());
    let mut prompt = template
        .replace("{source_language}", &name(&languages.source))
        .replace("{target_language}", &name(&languages.target));

    if !glossary.is_empty() {
        prompt.push_str("\n\nUse exactly these translations for the following terms:\n");
        for term in glossary {
            prompt.push_str(&format!("- {} => {}\n", term.source, term.target));
        }
    }

    prompt
}

/// Remove `<think>...</think>` blocks emitted by reasoning models
pub fn strip_think_tags(response: &str) -> String {
    let stripped = THINK_REGEX.replace_all(response, "");
    // An unterminated block swallows everything after it
    match stripped.find("<think>") {
        Some(pos) => stripped[..pos].to_string(),
        None => stripped.into_owned(),
    }
}

/// Split a framed response into `expected` outcomes.
///
/// Item `i` is the text between `<<ENTRY_i>>` and the next marker. An item
/// whose marker is missing, or that is not followed by another marker, fails
/// alone.
pub fn parse_batch_response(response: &str, expected: usize) -> Vec<ItemOutcome> {
    let response = strip_think_tags(response);

    // (entry index or None for END, marker start, marker end)
    let markers: Vec<(Option<usize>, usize, usize)> = MARKER_REGEX
        .captures_iter(&response)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let index = match caps.get(1) {
                Some(m) => Some(m.as_str().parse::<usize>().ok()?),
                None => None,
            };
            Some((index, whole.start(), whole.end()))
        })
        .collect();

    (0..expected)
        .map(|idx| {
            let Some(pos) = markers.iter().position(|(i, _, _)| *i == Some(idx)) else {
                return ItemOutcome::Failed(format!("missing marker {}", entry_marker(idx)));
            };
            let (_, _, content_start) = markers[pos];
            match markers.get(pos + 1) {
                Some((_, content_end, _)) => {
                    ItemOutcome::Translated(trim_line_breaks(&response[content_start..*content_end]))
                }
                None => ItemOutcome::Failed(format!("response truncated after {}", entry_marker(idx))),
            }
        })
        .collect()
}

/// Drop the newline framing around an item but keep its inner spacing
fn trim_line_breaks(text: &str) -> String {
    let text = text.strip_prefix("\r\n").or_else(|| text.strip_prefix('\n')).unwrap_or(text);
    let text = text.strip_suffix("\r\n").or_else(|| text.strip_suffix('\n')).unwrap_or(text);
    text.to_string()
}

/// Apply the batch-level checks to a model answer.
///
/// A result vector of the wrong length fails the whole batch. An empty
/// translation of a non-empty source becomes a per-item failure.
pub fn check_outcomes(
    sources: &[String],
    outcomes: Vec<ItemOutcome>,
) -> Result<Vec<ItemOutcome>, BatchTranslationFailure> {
    if outcomes.len() != sources.len() {
        return Err(BatchTranslationFailure::LengthMismatch {
            expected: sources.len(),
            got: outcomes.len(),
        });
    }

    Ok(sources
        .iter()
        .zip(outcomes)
        .map(|(source, outcome)| match outcome {
            ItemOutcome::Translated(text) if text.trim().is_empty() && !source.trim().is_empty() => {
                ItemOutcome::Failed("model returned empty output".to_string())
            }
            other => other,
        })
        .collect())
}
