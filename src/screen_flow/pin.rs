//! PIN gate in front of the camera screen

use crate::config::AccessConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOutcome {
    Granted,
    /// Wrong PIN; the input has been cleared
    Denied,
    /// Nothing entered, submit is disabled
    SubmitDisabled,
}

/// Static equality check against a configured PIN. Not hardened: no hashing,
/// no rate limiting.
pub struct PinGate {
    expected: String,
    max_len: usize,
    input: String,
}

impl PinGate {
    pub fn new(expected: impl Into<String>, max_len: usize) -> Self {
        Self {
            expected: expected.into(),
            max_len,
            input: String::new(),
        }
    }

    pub fn from_config(config: &AccessConfig) -> Self {
        Self::new(config.pin.clone(), config.pin_max_len)
    }

    /// Replace the field contents, keeping at most `max_len` characters
    pub fn input(&mut self, value: &str) {
        self.input = value.chars().take(self.max_len).collect();
    }

    pub fn value(&self) -> &str {
        &self.input
    }

    pub fn clear(&mut self) {
        self.input.clear();
    }

    pub fn can_submit(&self) -> bool {
        !self.input.is_empty()
    }

    pub fn submit(&mut self) -> PinOutcome {
        if !self.can_submit() {
            return PinOutcome::SubmitDisabled;
        }
        if self.input == self.expected {
            PinOutcome::Granted
        } else {
            self.clear();
            PinOutcome::Denied
        }
    }
}
