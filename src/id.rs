//! Request id generation.
//!
//! Every outbound request gets a fresh string id so the correlation table
//! stays a single namespace across reconnects — there's no reset-to-zero
//! counter to coordinate with a server that might see multiple connection
//! attempts from the same logical session.

use uuid::Uuid;

/// Generate a new request id.
pub fn generate() -> String {
    Uuid::new_v4().to_string()
}
