//! Message validation.
//!
//! Two independent validators consume each decoded message:
//!
//! - [`SchemaValidator`](schema::SchemaValidator) checks structural and type
//!   invariants against the evolving message schema and produces a
//!   [`ValidationVerdict`].
//! - [`SequenceValidator`](sequence::SequenceValidator) tracks the
//!   `full_update` sequence counter for continuity.
//!
//! Neither validator ever blocks processing: errors and warnings are
//! reported, counted, and the stream moves on.

pub mod schema;
pub mod sequence;

pub use schema::SchemaValidator;
pub use sequence::SequenceValidator;

/// Outcome of validating one message.
///
/// A message passes iff `errors` is empty; warnings never fail a packet.
/// Diagnostics keep their emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationVerdict {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationVerdict {
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    /// Single-line rendering for log output, matching the dashboard's
    /// comma-joined diagnostic style.
    pub fn summary(&self) -> String {
        if !self.errors.is_empty() {
            format!("Validation failed: {}", self.errors.join(", "))
        } else if !self.warnings.is_empty() {
            format!("Validation warnings: {}", self.warnings.join(", "))
        } else {
            "Packet validation successful".to_string()
        }
    }
}
