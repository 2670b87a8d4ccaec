//! Error types for registry operations

use thiserror::Error;
use tonic::Code;

/// Error type for registry operations
#[derive(Error, Debug)]
pub enum GsrError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Registration error: {0}")]
    Registration(String),

    #[error("Deregistration error: {0}")]
    Deregistration(String),

    #[error("Lease error: {0}")]
    Lease(String),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<std::io::Error> for GsrError {
    fn from(err: std::io::Error) -> Self {
        GsrError::Connection(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for GsrError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        GsrError::Timeout(err.to_string())
    }
}

/// Whether a transport failure is worth another attempt.
///
/// The connect retry loop dispatches on this tag; classification happens
/// once, at the boundary where etcd errors enter the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    /// The store may simply not be up yet; keep retrying under backoff.
    Retriable,
    /// A misconfiguration or unrecognized failure; retrying cannot help.
    Fatal,
}

/// Classify a dial-phase etcd client error as retriable or fatal.
///
/// Connection-refused, resets, timeouts, and cancellations are expected
/// while the store boots after us. DNS failures with no address mean the
/// endpoints themselves are wrong, as does anything unrecognized.
pub(crate) fn classify(err: &etcd_client::Error) -> Disposition {
    use etcd_client::Error;

    match err {
        Error::GRpcStatus(status) => match status.code() {
            Code::Unavailable
            | Code::DeadlineExceeded
            | Code::Cancelled
            | Code::Aborted
            | Code::ResourceExhausted => Disposition::Retriable,
            _ => Disposition::Fatal,
        },
        Error::IoError(io) => match io.kind() {
            std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::Interrupted => Disposition::Retriable,
            _ => Disposition::Fatal,
        },
        Error::TransportError(transport) => {
            if chain_contains(transport, "dns error")
                || chain_contains(transport, "failed to lookup address")
            {
                Disposition::Fatal
            } else {
                Disposition::Retriable
            }
        }
        Error::WatchError(_) | Error::LeaseKeepAliveError(_) => Disposition::Retriable,
        _ => Disposition::Fatal,
    }
}

/// Classify a failure of the post-connect validation read.
///
/// Narrower than [`classify`]: a cancelled request or an exceeded deadline
/// may just be a slow store and is retried, but any other failure after a
/// successful dial means the services subtree cannot be read at all, even
/// for kinds the dial step would retry.
pub(crate) fn classify_validation_read(err: &etcd_client::Error) -> Disposition {
    match err {
        etcd_client::Error::GRpcStatus(status) => match status.code() {
            Code::Cancelled | Code::DeadlineExceeded => Disposition::Retriable,
            _ => Disposition::Fatal,
        },
        _ => Disposition::Fatal,
    }
}

/// Search an error and its source chain for a message fragment.
fn chain_contains(err: &(dyn std::error::Error + 'static), needle: &str) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(err) = current {
        if err.to_string().contains(needle) {
            return true;
        }
        current = err.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use etcd_client::Error;
    use tonic::Status;

    #[test]
    fn transient_grpc_codes_are_retriable() {
        for code in [
            Code::Unavailable,
            Code::DeadlineExceeded,
            Code::Cancelled,
            Code::Aborted,
        ] {
            let err = Error::GRpcStatus(Status::new(code, "etcd not ready"));
            assert_eq!(classify(&err), Disposition::Retriable, "code {code:?}");
        }
    }

    #[test]
    fn unrecognized_grpc_codes_are_fatal() {
        for code in [Code::NotFound, Code::PermissionDenied, Code::Internal] {
            let err = Error::GRpcStatus(Status::new(code, "unexpected"));
            assert_eq!(classify(&err), Disposition::Fatal, "code {code:?}");
        }
    }

    #[test]
    fn connection_level_io_errors_are_retriable() {
        for kind in [
            std::io::ErrorKind::ConnectionRefused,
            std::io::ErrorKind::ConnectionReset,
            std::io::ErrorKind::TimedOut,
        ] {
            let err = Error::IoError(std::io::Error::from(kind));
            assert_eq!(classify(&err), Disposition::Retriable, "kind {kind:?}");
        }
    }

    #[test]
    fn other_io_errors_are_fatal() {
        let err = Error::IoError(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert_eq!(classify(&err), Disposition::Fatal);
    }

    #[test]
    fn unrecognized_error_classes_are_fatal() {
        let err = Error::InvalidArgs("no endpoint available".to_string());
        assert_eq!(classify(&err), Disposition::Fatal);
    }

    #[test]
    fn validation_read_retries_only_cancellation_and_deadline() {
        for code in [Code::Cancelled, Code::DeadlineExceeded] {
            let err = Error::GRpcStatus(Status::new(code, "slow store"));
            assert_eq!(
                classify_validation_read(&err),
                Disposition::Retriable,
                "code {code:?}"
            );
        }
        for code in [Code::Unavailable, Code::Aborted, Code::NotFound] {
            let err = Error::GRpcStatus(Status::new(code, "subtree unreadable"));
            assert_eq!(
                classify_validation_read(&err),
                Disposition::Fatal,
                "code {code:?}"
            );
        }
        // Kinds the dial step retries are fatal once the dial succeeded.
        let err = Error::IoError(std::io::Error::from(std::io::ErrorKind::ConnectionRefused));
        assert_eq!(classify_validation_read(&err), Disposition::Fatal);
        let err = Error::WatchError("stream reset".to_string());
        assert_eq!(classify_validation_read(&err), Disposition::Fatal);
    }

    #[test]
    fn stream_errors_are_retriable() {
        assert_eq!(
            classify(&Error::WatchError("stream reset".to_string())),
            Disposition::Retriable
        );
        assert_eq!(
            classify(&Error::LeaseKeepAliveError("stream closed".to_string())),
            Disposition::Retriable
        );
    }
}
