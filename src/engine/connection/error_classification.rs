//! Classification of Bollard connection failures.
//!
//! Low-level client errors become semantic `ContainerError` variants so a
//! missing Podman socket reads differently from a refused permission.

use std::io::ErrorKind;
use std::path::Path;

use crate::error::ContainerError;

/// Extract the filesystem path from a socket URI.
///
/// Only `unix://` and `npipe://` endpoints carry a path; HTTP endpoints and
/// bare strings return `None`.
pub(super) fn extract_socket_path(socket_uri: &str) -> Option<&Path> {
    socket_uri
        .strip_prefix("unix://")
        .or_else(|| socket_uri.strip_prefix("npipe://"))
        .map(Path::new)
}

fn connection_failed(message: &str) -> ContainerError {
    ContainerError::ConnectionFailed {
        message: message.to_owned(),
    }
}

fn classify_io_error_kind(
    kind: ErrorKind,
    socket_path: Option<&Path>,
    message: &str,
) -> ContainerError {
    match (kind, socket_path) {
        (ErrorKind::PermissionDenied, Some(path)) => ContainerError::PermissionDenied {
            path: path.to_path_buf(),
        },
        (ErrorKind::NotFound, Some(path)) => ContainerError::SocketNotFound {
            path: path.to_path_buf(),
        },
        _ => connection_failed(message),
    }
}

/// Classify a Bollard connection error for the given socket URI.
///
/// Falls back to `ConnectionFailed` when the error carries no recognisable
/// I/O cause or the endpoint has no filesystem path.
pub(super) fn classify_connection_error(
    bollard_error: &bollard::errors::Error,
    socket_uri: &str,
) -> ContainerError {
    let socket_path = extract_socket_path(socket_uri);
    let message = bollard_error.to_string();

    match bollard_error {
        bollard::errors::Error::SocketNotFoundError(_) => socket_path.map_or_else(
            || connection_failed(&message),
            |path| ContainerError::SocketNotFound {
                path: path.to_path_buf(),
            },
        ),
        bollard::errors::Error::IOError { err } => {
            let kind = io_error_kind_in_chain(err).unwrap_or_else(|| err.kind());
            classify_io_error_kind(kind, socket_path, &message)
        }
        other => io_error_kind_in_chain(other).map_or_else(
            || connection_failed(&message),
            |kind| classify_io_error_kind(kind, socket_path, &message),
        ),
    }
}

/// Walk the error source chain looking for an `io::Error` kind.
fn io_error_kind_in_chain(error: &dyn std::error::Error) -> Option<ErrorKind> {
    let mut current: Option<&(dyn std::error::Error + 'static)> = error.source();
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            return Some(io_err.kind());
        }
        current = err.source();
    }
    None
}
