use serde::{Deserialize, Serialize};

/// One named stage of a long-running consultation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressStep {
    pub label: String,
    pub completed: bool,
}

/// Builds a fresh step list with nothing completed.
pub fn create_steps<I, S>(labels: I) -> Vec<ProgressStep>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    labels
        .into_iter()
        .map(|label| ProgressStep {
            label: label.into(),
            completed: false,
        })
        .collect()
}

/// Marks every step at position `<= index` as completed.
///
/// Steps past `index` are left as they are, so a lower index after a higher
/// one never un-completes anything. An index past the end completes all.
pub fn advance(steps: &mut [ProgressStep], index: usize) {
    for step in steps.iter_mut().take(index.saturating_add(1)) {
        step.completed = true;
    }
}

/// Step list owned by a single request cycle.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    steps: Vec<ProgressStep>,
}

impl ProgressTracker {
    pub fn start<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            steps: create_steps(labels),
        }
    }

    pub fn advance(&mut self, index: usize) {
        advance(&mut self.steps, index);
    }

    /// Drops all steps; called when the cycle ends.
    pub fn clear(&mut self) {
        self.steps.clear();
    }

    pub fn steps(&self) -> &[ProgressStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn completed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.completed).count()
    }
}
