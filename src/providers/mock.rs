/*!
 * Mock translation model for testing and dry runs.
 *
 * This module provides an in-process model that simulates different behaviors:
 * - `MockModel::working()` - Always succeeds, prefixing each text with the target language
 * - `MockModel::failing()` - Always raises
 * - `MockModel::slow(delay)` - Succeeds after a delay (for timeout testing)
 * - `MockModel::empty()` - Returns empty output for every item
 * - `MockModel::fail_on_call(n)` - Raises on the n-th call only
 * - `MockModel::fail_when_contains(s)` - Raises for batches containing `s`
 * - `MockModel::panic_on_call(n)` - Panics on the n-th call only
 * - `MockModel::disconnect_after(n)` - Loses its connection after n calls and stays down
 *
 * Successful answers go through the same marker framing as a real model.
 */

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::translation::glossary::GlossaryTerm;
use crate::translation::translator::{
    entry_marker, parse_batch_response, ItemOutcome, LanguagePair, TranslationModel, END_MARKER,
};

/// Behavior mode for the mock model
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Always fails with an error
    Failing,
    /// Succeeds after sleeping
    Slow { delay: Duration },
    /// Returns empty text for every item
    Empty,
    /// Fails on the given 1-based call number
    FailOnCall { call: usize },
    /// Fails whenever a text of the batch contains the needle
    FailWhenContains { needle: String },
    /// Panics on the given 1-based call number
    PanicOnCall { call: usize },
    /// Answers the first `calls` calls, then reports a lost connection
    DisconnectAfter { calls: usize },
}

/// Deterministic model; clones share their counters
#[derive(Debug, Clone)]
pub struct MockModel {
    behavior: MockBehavior,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    peak_active: Arc<AtomicUsize>,
    items: Arc<AtomicUsize>,
    disconnected: Arc<AtomicBool>,
}

impl MockModel {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            peak_active: Arc::new(AtomicUsize::new(0)),
            items: Arc::new(AtomicUsize::new(0)),
            disconnected: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn slow(delay: Duration) -> Self {
        Self::new(MockBehavior::Slow { delay })
    }

    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    pub fn fail_on_call(call: usize) -> Self {
        Self::new(MockBehavior::FailOnCall { call })
    }

    pub fn fail_when_contains(needle: impl Into<String>) -> Self {
        Self::new(MockBehavior::FailWhenContains { needle: needle.into() })
    }

    pub fn panic_on_call(call: usize) -> Self {
        Self::new(MockBehavior::PanicOnCall { call })
    }

    pub fn disconnect_after(calls: usize) -> Self {
        Self::new(MockBehavior::DisconnectAfter { calls })
    }

    /// Hold every call for `delay`, whatever the behavior
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of batch calls received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of texts received over all calls
    pub fn items_received(&self) -> usize {
        self.items.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at the same time
    pub fn peak_concurrent_calls(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }

    /// Rendering used for a successful item
    pub fn render(text: &str, target_language: &str) -> String {
        format!("[{}] {}", target_language, text)
    }

    /// Generate a properly framed batch response
    pub fn generate_batch_response(texts: &[String], target_language: &str) -> String {
        let mut response = String::new();
        for (i, text) in texts.iter().enumerate() {
            response.push_str(&entry_marker(i));
            response.push('\n');
            response.push_str(&Self::render(text, target_language));
            response.push('\n');
        }
        response.push_str(END_MARKER);
        response
    }

    async fn respond(&self, call: usize, texts: &[String], languages: &LanguagePair) -> Result<Vec<ItemOutcome>, ProviderError> {
        match &self.behavior {
            MockBehavior::Working => {}
            MockBehavior::Failing => {
                return Err(ProviderError::ModelError("Simulated model failure".to_string()));
            }
            MockBehavior::Slow { delay } => tokio::time::sleep(*delay).await,
            MockBehavior::Empty => {
                return Ok(texts.iter().map(|_| ItemOutcome::Translated(String::new())).collect());
            }
            MockBehavior::FailOnCall { call: failing } => {
                if call == *failing {
                    return Err(ProviderError::ModelError(format!("Simulated failure on call #{}", call)));
                }
            }
            MockBehavior::FailWhenContains { needle } => {
                if texts.iter().any(|t| t.contains(needle.as_str())) {
                    return Err(ProviderError::ModelError(format!("Simulated failure on '{}'", needle)));
                }
            }
            MockBehavior::PanicOnCall { call: panicking } => {
                if call == *panicking {
                    panic!("Simulated panic on call #{}", call);
                }
            }
            MockBehavior::DisconnectAfter { calls } => {
                if call > *calls {
                    self.disconnected.store(true, Ordering::SeqCst);
                    return Err(ProviderError::ConnectionError("Simulated connection loss".to_string()));
                }
            }
        }

        let response = Self::generate_batch_response(texts, &languages.target);
        Ok(parse_batch_response(&response, texts.len()))
    }
}

#[async_trait]
impl TranslationModel for MockModel {
    async fn translate_batch(
        &self,
        texts: &[String],
        languages: &LanguagePair,
        _glossary: &[GlossaryTerm],
    ) -> Result<Vec<ItemOutcome>, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.items.fetch_add(texts.len(), Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = self.respond(call, texts, languages).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> String {
        "mock".to_string()
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.behavior == MockBehavior::Failing || self.disconnected.load(Ordering::SeqCst) {
            return Err(ProviderError::ConnectionError("Simulated model is down".to_string()));
        }
        Ok(())
    }
}
