/*!
 * Terminology glossary.
 *
 * A glossary file holds one JSON object per line mapping a source term to
 * the rendering the model must use. Only the terms that actually occur in a
 * batch are passed along with it.
 */

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A fixed source -> target rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryTerm {
    #[serde(alias = "en")]
    pub source: String,
    #[serde(alias = "fr")]
    pub target: String,
}

impl GlossaryTerm {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Terms loaded from a JSONL file
#[derive(Debug, Clone, Default)]
pub struct Glossary {
    terms: Vec<GlossaryTerm>,
}

impl Glossary {
    pub fn new(terms: Vec<GlossaryTerm>) -> Self {
        Self { terms }
    }

    /// Load a JSONL glossary file
    pub fn from_jsonl<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read glossary file: {:?}", path))?;
        Self::parse_jsonl(&content).with_context(|| format!("Invalid glossary file: {:?}", path))
    }

    /// Parse JSONL content; blank lines are skipped
    pub fn parse_jsonl(content: &str) -> Result<Self> {
        let mut terms = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let term: GlossaryTerm = serde_json::from_str(line)
                .map_err(|e| anyhow!("line {}: {}", line_no + 1, e))?;
            if term.source.is_empty() {
                return Err(anyhow!("line {}: empty source term", line_no + 1));
            }
            terms.push(term);
        }
        Ok(Self { terms })
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[GlossaryTerm] {
        &self.terms
    }

    /// Terms whose source form occurs in any of the texts
    pub fn terms_for<S: AsRef<str>>(&self, texts: &[S]) -> Vec<GlossaryTerm> {
        self.terms
            .iter()
            .filter(|term| texts.iter().any(|t| t.as_ref().contains(term.source.as_str())))
            .cloned()
            .collect()
    }
}
