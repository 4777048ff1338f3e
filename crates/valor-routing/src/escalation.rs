//! The escape hatch: explicit human-input requests.
//!
//! An automated flow that genuinely needs a human marks its message
//! with a fixed first-line token. Downstream auto-continue logic
//! checks [`is_human_input_required`] and backs off instead of
//! overriding the request. State is a single overwritable slot shared
//! by `Arc`, not a queue and not a module global.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::error::{Result, RoutingError};

/// Marker token: the first line of a human-input request.
pub const HUMAN_INPUT_MARKER: &str = "HUMAN_INPUT_REQUIRED";

/// One outstanding request for human input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingHumanInputRequest {
    /// Why input is needed. Trimmed, never empty.
    pub reason: String,
    /// Optional choices presented to the human.
    pub options: Vec<String>,
    /// When the request was made.
    pub created_at: DateTime<Utc>,
}

/// Process-wide single-slot holder for the pending request.
///
/// At most one request is outstanding at a time; a new request
/// overwrites the previous one rather than queueing behind it.
#[derive(Default)]
pub struct HumanInputSlot {
    slot: Mutex<Option<PendingHumanInputRequest>>,
}

impl HumanInputSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files a human-input request, returning the formatted message to
    /// send. Overwrites any previous pending request.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::EmptyReason`] if `reason` is empty or
    /// whitespace-only.
    pub fn request(&self, reason: &str, options: &[String]) -> Result<String> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(RoutingError::EmptyReason);
        }

        let request = PendingHumanInputRequest {
            reason: reason.to_string(),
            options: options.to_vec(),
            created_at: Utc::now(),
        };
        let message = format_request(&request);

        let mut slot = self
            .slot
            .lock()
            .map_err(|e| RoutingError::Enqueue(e.to_string()))?;
        *slot = Some(request);

        Ok(message)
    }

    /// The pending request, if any, without consuming it.
    pub fn pending(&self) -> Option<PendingHumanInputRequest> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    /// Consumes and returns the pending request.
    pub fn take(&self) -> Option<PendingHumanInputRequest> {
        self.slot.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Clears the pending request.
    pub fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

/// Whether a message is an explicit human-input request.
///
/// True iff the trimmed message starts with the marker token; a marker
/// appearing mid-message does not count.
pub fn is_human_input_required(message: &str) -> bool {
    message.trim_start().starts_with(HUMAN_INPUT_MARKER)
}

fn format_request(request: &PendingHumanInputRequest) -> String {
    let mut message = format!("{}\n{}", HUMAN_INPUT_MARKER, request.reason);
    for (n, option) in request.options.iter().enumerate() {
        message.push_str(&format!("\n{}. {}", n + 1, option));
    }
    message
}
