//! Domain logic for client-side operations.
//!
//! This module contains pure functions that implement business logic
//! without side effects, making them easy to test.

use crate::error::ClientError;

/// Check if the client should stop immediately based on the error type.
///
/// # Returns
///
/// `true` if the error requires giving up without retry (e.g., Unauthorized),
/// `false` otherwise
pub fn should_exit_immediately(error: &ClientError) -> bool {
    matches!(error, ClientError::Unauthorized(_))
}

/// Check if the client should attempt to reconnect.
///
/// # Arguments
///
/// * `error` - The client error that occurred
/// * `failures` - Consecutive failed attempts so far, including this one
/// * `max_attempts` - The maximum number of attempts allowed
///
/// # Returns
///
/// `true` if reconnection should be attempted, `false` otherwise
pub fn should_attempt_reconnect(error: &ClientError, failures: u32, max_attempts: u32) -> bool {
    // Don't reconnect if the error requires immediate exit
    if should_exit_immediately(error) {
        return false;
    }

    // Don't reconnect if we've exhausted all attempts
    failures < max_attempts
}

/// Whether a failed request means the stream itself is gone.
///
/// A rejected request (forbidden, too large, malformed) leaves the stream
/// usable; anything else is treated as a transport failure.
pub fn is_transport_failure(error: &ClientError) -> bool {
    !matches!(error, ClientError::Rejected { .. })
}
