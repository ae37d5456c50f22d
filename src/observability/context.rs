//! Per-operation context.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Context passed explicitly to every service operation.
///
/// Carries the correlation ID recorded on the operation's span and the clock
/// reading used for timestamps and expiry checks, so one operation sees one
/// consistent `now`.
#[derive(Clone, Debug)]
pub struct OperationContext {
    request_id: String,
    now: DateTime<Utc>,
}

impl OperationContext {
    /// Creates a context with a generated ID at the current time.
    #[must_use]
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Creates a context with a generated ID at a fixed time.
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            now,
        }
    }

    /// Replaces the request ID, e.g. with one supplied by a protocol client.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the operation's clock reading.
    #[must_use]
    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}
