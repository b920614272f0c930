//! Confirmation gate for destructive migration steps.
//!
//! The gate is advisory: it is told about every destructive step before
//! the statement is materialized, but it cannot cancel execution. This
//! keeps unattended runs moving while still notifying an operator channel
//! before data loss.

/// Invoked once per destructive migration step.
pub trait ConfirmGate {
    fn confirm(&mut self, message: &str);
}

/// Gate that emits each message as a `tracing` warning.
#[derive(Debug, Default)]
pub struct LogGate;

impl ConfirmGate for LogGate {
    fn confirm(&mut self, message: &str) {
        tracing::warn!(target: "drydock::confirm", "{message}");
    }
}

/// Gate that collects messages, for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingGate {
    pub messages: Vec<String>,
}

impl ConfirmGate for RecordingGate {
    fn confirm(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }
}
