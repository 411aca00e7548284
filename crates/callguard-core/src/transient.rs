//! Classification of failures that are worth retrying.
//!
//! A failure is transient when trying again has a reasonable chance of
//! succeeding: the network hiccuped, a deadline elapsed, or some inner layer
//! gave up on its own. Open breakers and full bulkheads are deliberately not
//! transient; retrying into them only adds load.

use std::error::Error;
use std::io;

use crate::PolicyError;

/// Returns `true` if `error` is likely to succeed on retry.
///
/// [`PolicyError::Cancelled`] counts as transient: an inner layer may cancel on
/// its own while the caller's token is still live. Policies check the caller's
/// token before consulting this.
///
/// ```rust
/// use callguard_core::{is_transient, PolicyError};
/// use std::io;
/// use std::time::Duration;
///
/// let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
/// assert!(is_transient(&PolicyError::Operation(refused)));
///
/// let denied = io::Error::from(io::ErrorKind::PermissionDenied);
/// assert!(!is_transient(&PolicyError::Operation(denied)));
///
/// let timeout: PolicyError<io::Error> = PolicyError::Timeout { timeout: Duration::from_secs(1) };
/// assert!(is_transient(&timeout));
/// ```
pub fn is_transient<E>(error: &PolicyError<E>) -> bool
where
    E: Error + 'static,
{
    match error {
        PolicyError::Timeout { .. } | PolicyError::Cancelled => true,
        PolicyError::BulkheadFull { .. } | PolicyError::CircuitOpen { .. } => false,
        PolicyError::Operation(e) => is_transient_error(e),
    }
}

/// Walks `error` and its `source()` chain looking for a network-style failure
/// or an elapsed deadline.
pub fn is_transient_error(error: &(dyn Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(io) = err.downcast_ref::<io::Error>() {
            if is_transient_io_kind(io.kind()) {
                return true;
            }
        }
        if err.is::<tokio::time::error::Elapsed>() {
            return true;
        }
        current = err.source();
    }
    false
}

fn is_transient_io_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::AddrInUse
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::WouldBlock
    )
}
