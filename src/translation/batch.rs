/*!
 * Batch planning.
 *
 * Groups the pending units of one document into inference batches, greedily
 * in extraction order, under a character budget and a unit count limit.
 */

use crate::document::TextUnit;

/// A bounded group of units sent to the model in one call.
///
/// Holds indices into the job's unit list rather than copies of the units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Position of the batch in the job's plan
    pub ordinal: usize,
    /// Indices into the unit list, in extraction order
    pub unit_indices: Vec<usize>,
    /// Total characters of the source texts
    pub chars: usize,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.unit_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unit_indices.is_empty()
    }

    /// Source texts of the batch, in order
    pub fn source_texts(&self, units: &[TextUnit]) -> Vec<String> {
        self.unit_indices
            .iter()
            .map(|&i| units[i].source_text().to_string())
            .collect()
    }
}

/// Greedy batch planner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlanner {
    max_chars: usize,
    max_units: usize,
}

impl BatchPlanner {
    /// Limits below one are raised to one
    pub fn new(max_chars: usize, max_units: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
            max_units: max_units.max(1),
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn max_units(&self) -> usize {
        self.max_units
    }

    /// Split the pending units into batches.
    ///
    /// Units that are not pending never appear in a batch. A unit longer
    /// than the character budget closes the current batch and goes alone.
    pub fn plan(&self, units: &[TextUnit]) -> Vec<Batch> {
        let mut batches = Vec::new();
        let mut current: Vec<usize> = Vec::new();
        let mut current_chars = 0usize;

        for (idx, unit) in units.iter().enumerate() {
            if !unit.is_pending() {
                continue;
            }
            let len = unit.char_len();

            if len > self.max_chars {
                self.close(&mut batches, &mut current, &mut current_chars);
                batches.push(Batch {
                    ordinal: batches.len(),
                    unit_indices: vec![idx],
                    chars: len,
                });
                continue;
            }

            if !current.is_empty()
                && (current_chars + len > self.max_chars || current.len() >= self.max_units)
            {
                self.close(&mut batches, &mut current, &mut current_chars);
            }

            current.push(idx);
            current_chars += len;
        }

        self.close(&mut batches, &mut current, &mut current_chars);
        batches
    }

    fn close(&self, batches: &mut Vec<Batch>, current: &mut Vec<usize>, chars: &mut usize) {
        if current.is_empty() {
            return;
        }
        batches.push(Batch {
            ordinal: batches.len(),
            unit_indices: std::mem::take(current),
            chars: *chars,
        });
        *chars = 0;
    }
}
