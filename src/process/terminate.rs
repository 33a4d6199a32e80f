//! Controlled termination: ask the child to stop, then force it.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;

/// Stop `child`, giving it `grace` to exit on its own.
///
/// On Unix the child gets `SIGTERM` first and `SIGKILL` once the grace
/// period runs out. Elsewhere it is killed right away. Returns the reaped
/// status and whether the kill was forced.
pub(crate) async fn terminate_child(
    child: &mut Child,
    grace: Duration,
) -> io::Result<(ExitStatus, bool)> {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            tracing::debug!(pid, "sending SIGTERM to child");
            // SAFETY: plain syscall on a pid we spawned and have not reaped.
            if unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) } == -1 {
                tracing::debug!(pid, error = %io::Error::last_os_error(), "failed to send SIGTERM");
            }

            match tokio::time::timeout(grace, child.wait()).await {
                Ok(status) => return status.map(|s| (s, false)),
                Err(_) => tracing::warn!(pid, ?grace, "child ignored SIGTERM, killing"),
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = grace;
        tracing::debug!("graceful stop not supported on this platform, killing");
    }

    child.kill().await?;
    let status = child.wait().await?;
    Ok((status, true))
}
