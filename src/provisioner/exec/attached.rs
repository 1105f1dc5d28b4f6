//! Output capture for attached exec sessions.

use std::pin::Pin;

use bollard::container::LogOutput;
use bollard::errors::Error as BollardError;
use futures_util::{Stream, StreamExt};

use super::exec_failed;
use crate::error::ProvisionerError;

/// Drain an attached exec stream into decoded stdout and stderr.
///
/// Console frames (TTY sessions) count as stdout. Echoed stdin is dropped.
pub(super) async fn collect_output_async(
    container_id: &str,
    mut output: Pin<Box<dyn Stream<Item = Result<LogOutput, BollardError>> + Send>>,
) -> Result<(String, String), ProvisionerError> {
    let mut stdout: Vec<u8> = Vec::new();
    let mut stderr: Vec<u8> = Vec::new();

    while let Some(chunk) = output.next().await {
        match chunk
            .map_err(|error| exec_failed(container_id, format!("exec stream failed: {error}")))?
        {
            LogOutput::StdErr { message } => stderr.extend_from_slice(&message),
            LogOutput::StdOut { message } | LogOutput::Console { message } => {
                stdout.extend_from_slice(&message);
            }
            LogOutput::StdIn { .. } => {}
        }
    }

    Ok((
        String::from_utf8_lossy(&stdout).into_owned(),
        String::from_utf8_lossy(&stderr).into_owned(),
    ))
}
