//! Post-install verification: run the placed binary with its probe arguments.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};
use wait_timeout::ChildExt;

use crate::error::{InstallError, Stage};

/// Run `path` with `args` and wait at most `timeout` for it to exit.
///
/// Returns the first non-empty line the probe printed (stdout preferred over
/// stderr), which is usually a version banner.
///
/// # Errors
///
/// * [`InstallError::VerificationFailed`] on a non-zero exit or a timeout
///   (the child is killed).
/// * [`InstallError::ExecutionError`] if the binary could not be launched.
pub fn verify(path: &Path, args: &[String], timeout: Duration) -> Result<String, InstallError> {
    debug!("Probing {} {}", path.display(), args.join(" "));

    let mut child = Command::new(path)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| InstallError::ExecutionError {
            path: path.to_path_buf(),
            source,
        })?;

    // Drain both pipes on their own threads so a chatty probe cannot block.
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let failed = |status: String| InstallError::VerificationFailed {
        path: path.to_path_buf(),
        args: args.join(" "),
        status,
    };

    let status = match child
        .wait_timeout(timeout)
        .map_err(InstallError::io(Stage::Verify))?
    {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(failed(format!("timeout after {}s", timeout.as_secs_f32())));
        }
    };

    let stdout = stdout.and_then(|h| h.join().ok()).unwrap_or_default();
    let stderr = stderr.and_then(|h| h.join().ok()).unwrap_or_default();

    if !status.success() {
        let reason = match status.code() {
            Some(code) => format!("exit code {code}"),
            None => "a signal".to_string(),
        };
        let detail = first_line(&stderr).or_else(|| first_line(&stdout));
        return Err(failed(match detail {
            Some(line) => format!("{reason} ({line})"),
            None => reason,
        }));
    }

    let banner = first_line(&stdout)
        .or_else(|| first_line(&stderr))
        .unwrap_or_default();
    info!("{} ok: {banner}", path.display());
    Ok(banner)
}

/// [`verify`] on the blocking pool.
///
/// # Errors
///
/// Same as [`verify`].
pub async fn verify_async(
    path: &Path,
    args: &[String],
    timeout: Duration,
) -> Result<String, InstallError> {
    let path = path.to_path_buf();
    let args = args.to_vec();
    tokio::task::spawn_blocking(move || verify(&path, &args, timeout))
        .await
        .map_err(|e| InstallError::io(Stage::Verify)(std::io::Error::other(e)))?
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn first_line(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(ToString::to_string)
}
