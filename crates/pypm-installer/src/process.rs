use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use pypm_core::{CancelToken, Operation};
use tracing::debug;

use crate::{InstallerError, InstallerOutput};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Default)]
pub(crate) struct RunLimits {
    pub timeout: Option<Duration>,
    pub cancel: CancelToken,
}

/// Runs `command` to completion with stdout/stderr captured, killing it when
/// the timeout elapses or the cancel token fires.
pub(crate) fn run_captured(
    mut command: Command,
    operation: Operation,
    limits: &RunLimits,
) -> Result<InstallerOutput, InstallerError> {
    let program = command.get_program().to_string_lossy().into_owned();
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(
        %operation,
        program = %program,
        args = ?command.get_args().collect::<Vec<_>>(),
        "spawning installer"
    );
    let mut child = command.spawn().map_err(|err| InstallerError::Launch {
        operation,
        program: program.clone(),
        reason: err.to_string(),
    })?;

    // Drain both pipes on their own threads so a chatty child cannot block on
    // a full pipe while we poll for exit.
    let stdout = child.stdout.take().map(spawn_reader);
    let stderr = child.stderr.take().map(spawn_reader);

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(err) => {
                kill_and_reap(&mut child);
                return Err(InstallerError::Launch {
                    operation,
                    program,
                    reason: format!("failed waiting for process: {err}"),
                });
            }
        }

        if limits.cancel.is_cancelled() {
            kill_and_reap(&mut child);
            debug!(%operation, "installer cancelled");
            return Err(InstallerError::Cancelled { operation });
        }
        if let Some(timeout) = limits.timeout {
            if started.elapsed() >= timeout {
                kill_and_reap(&mut child);
                debug!(%operation, ?timeout, "installer timed out");
                return Err(InstallerError::TimedOut { operation, timeout });
            }
        }
        thread::sleep(POLL_INTERVAL);
    };

    let output = InstallerOutput {
        status: status.code(),
        stdout: join_reader(stdout),
        stderr: join_reader(stderr),
    };
    debug!(
        %operation,
        status = ?output.status,
        elapsed = ?started.elapsed(),
        "installer finished"
    );
    Ok(output)
}

fn spawn_reader<R>(mut reader: R) -> JoinHandle<Vec<u8>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = reader.read_to_end(&mut buffer);
        buffer
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
