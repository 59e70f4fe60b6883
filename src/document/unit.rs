/*!
 * Text unit model.
 *
 * A `TextUnit` is one translatable run of text together with the structural
 * address it was lifted from. Its lifecycle is a tagged state so the
 * translated text can only be read once it exists.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::UnitStateError;

/// Identifier of a unit, unique within one extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which part of a slide a unit lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// The slide body
    Slide,
    /// The speaker notes page
    Notes,
    /// The n-th chart referenced by the slide
    Chart(usize),
}

/// One level of the path inside a part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Shape(usize),
    Row(usize),
    Cell(usize),
    Paragraph(usize),
    Run(usize),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Shape(i) => write!(f, "shape {}", i),
            Step::Row(i) => write!(f, "row {}", i),
            Step::Cell(i) => write!(f, "cell {}", i),
            Step::Paragraph(i) => write!(f, "para {}", i),
            Step::Run(i) => write!(f, "run {}", i),
        }
    }
}

/// Ordered path locating exactly one text slot in the document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructuralAddress {
    /// Presentation-order slide index
    pub slide: usize,
    /// Part of the slide
    pub scope: Scope,
    /// Path inside the part
    pub steps: Vec<Step>,
}

impl StructuralAddress {
    pub fn new(slide: usize, scope: Scope, steps: Vec<Step>) -> Self {
        Self { slide, scope, steps }
    }
}

impl fmt::Display for StructuralAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slide {}", self.slide)?;
        match self.scope {
            Scope::Slide => {}
            Scope::Notes => write!(f, " / notes")?,
            Scope::Chart(n) => write!(f, " / chart {}", n)?,
        }
        for step in &self.steps {
            write!(f, " / {}", step)?;
        }
        Ok(())
    }
}

/// Run-level formatting carried alongside a unit.
///
/// Copied forward unchanged; the translation side never looks inside.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFormatting {
    /// Raw `a:rPr` attributes in document order
    pub attributes: Vec<(String, String)>,
    /// Whether the run carries a click hyperlink
    pub hyperlink: bool,
}

/// Lifecycle of a unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitState {
    Pending,
    InFlight,
    Translated(String),
    Failed { reason: String },
}

impl UnitState {
    pub fn name(&self) -> &'static str {
        match self {
            UnitState::Pending => "pending",
            UnitState::InFlight => "in_flight",
            UnitState::Translated(_) => "translated",
            UnitState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UnitState::Translated(_) | UnitState::Failed { .. })
    }
}

/// One extracted, translatable span
#[derive(Debug, Clone)]
pub struct TextUnit {
    id: UnitId,
    address: StructuralAddress,
    source_text: String,
    formatting: RunFormatting,
    state: UnitState,
}

impl TextUnit {
    /// Create a unit; blank text is born translated since there is nothing to send.
    pub fn new(
        id: UnitId,
        address: StructuralAddress,
        source_text: String,
        formatting: RunFormatting,
    ) -> Self {
        let state = if source_text.trim().is_empty() {
            UnitState::Translated(source_text.clone())
        } else {
            UnitState::Pending
        };

        Self {
            id,
            address,
            source_text,
            formatting,
            state,
        }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn address(&self) -> &StructuralAddress {
        &self.address
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn formatting(&self) -> &RunFormatting {
        &self.formatting
    }

    pub fn state(&self) -> &UnitState {
        &self.state
    }

    /// Number of characters the unit costs against a batch budget
    pub fn char_len(&self) -> usize {
        self.source_text.chars().count()
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, UnitState::Pending)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, UnitState::Failed { .. })
    }

    /// The translated text, if the unit reached `Translated`
    pub fn translated_text(&self) -> Option<&str> {
        match &self.state {
            UnitState::Translated(text) => Some(text),
            _ => None,
        }
    }

    /// Text to write back: the translation, or the source for failed units.
    ///
    /// Returns `None` while the unit is not terminal.
    pub fn resolved_text(&self) -> Option<&str> {
        match &self.state {
            UnitState::Translated(text) => Some(text),
            UnitState::Failed { .. } => Some(&self.source_text),
            UnitState::Pending | UnitState::InFlight => None,
        }
    }

    /// `Pending -> InFlight`
    pub fn admit(&mut self) -> Result<(), UnitStateError> {
        match self.state {
            UnitState::Pending => {
                self.state = UnitState::InFlight;
                Ok(())
            }
            _ => Err(self.illegal("admit")),
        }
    }

    /// `InFlight -> Translated`
    pub fn complete(&mut self, translated: String) -> Result<(), UnitStateError> {
        match self.state {
            UnitState::InFlight => {
                self.state = UnitState::Translated(translated);
                Ok(())
            }
            _ => Err(self.illegal("complete")),
        }
    }

    /// `Pending | InFlight -> Failed`
    ///
    /// Pending units may fail directly when their batch never got admitted
    /// (device gone, job cancelled).
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), UnitStateError> {
        match self.state {
            UnitState::Pending | UnitState::InFlight => {
                self.state = UnitState::Failed {
                    reason: reason.into(),
                };
                Ok(())
            }
            _ => Err(self.illegal("fail")),
        }
    }

    fn illegal(&self, action: &'static str) -> UnitStateError {
        UnitStateError {
            unit: self.id.0,
            state: self.state.name(),
            action,
        }
    }
}
