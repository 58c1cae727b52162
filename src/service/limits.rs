//! Prompt length bounds

use crate::{HuginnError, Result};

/// Bounds on prompt length, counted in characters after trimming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptLimits {
    /// Default: 3.
    pub min_prompt_length: usize,
    /// Default: 5000.
    pub max_prompt_length: usize,
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self {
            min_prompt_length: 3,
            max_prompt_length: 5000,
        }
    }
}

impl PromptLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_prompt_length(mut self, n: usize) -> Self {
        self.min_prompt_length = n;
        self
    }

    pub fn max_prompt_length(mut self, n: usize) -> Self {
        self.max_prompt_length = n;
        self
    }

    /// Return the trimmed prompt, or `InputValidation` if it is out of bounds.
    pub fn validate<'a>(&self, prompt: &'a str) -> Result<&'a str> {
        let trimmed = prompt.trim();
        let length = trimmed.chars().count();
        if length < self.min_prompt_length {
            return Err(HuginnError::InputValidation(format!(
                "prompt is too short: {length} characters, at least {} required",
                self.min_prompt_length
            )));
        }
        if length > self.max_prompt_length {
            return Err(HuginnError::InputValidation(format!(
                "prompt is too long: {length} characters, at most {} allowed",
                self.max_prompt_length
            )));
        }
        Ok(trimmed)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.min_prompt_length > self.max_prompt_length {
            return Err(HuginnError::Configuration(format!(
                "min_prompt_length ({}) exceeds max_prompt_length ({})",
                self.min_prompt_length, self.max_prompt_length
            )));
        }
        Ok(())
    }
}
