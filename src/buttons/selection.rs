//! Model carousel driven by buttons A and C.

use crate::config::DEFAULT_MODEL;
use crate::llm::display_name;

/// Cached model list plus the index of the selected entry.
///
/// Never empty: an empty list is replaced by [`DEFAULT_MODEL`].  Stepping
/// wraps in both directions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    models: Vec<String>,
    index: usize,
}

impl ModelSelection {
    pub fn new(models: Vec<String>) -> Self {
        let models = if models.is_empty() {
            vec![DEFAULT_MODEL.to_string()]
        } else {
            models
        };
        Self { models, index: 0 }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn current(&self) -> &str {
        &self.models[self.index]
    }

    /// Short name of the current model, as shown on the display.
    pub fn display_name(&self) -> &str {
        display_name(self.current())
    }

    /// Step back one model (button A).
    pub fn previous(&mut self) -> &str {
        self.step(-1)
    }

    /// Step forward one model (button C).
    pub fn next(&mut self) -> &str {
        self.step(1)
    }

    fn step(&mut self, delta: i64) -> &str {
        let len = self.models.len() as i64;
        self.index = (self.index as i64 + delta).rem_euclid(len) as usize;
        self.current()
    }
}
