//! Graceful-then-forced termination of a timed-out tool.

use std::io;
use std::process::Child;
use std::thread;
use std::time::{Duration, Instant};

/// Send SIGTERM to the tool's process group (unix), wait up to `grace` for
/// the tool to exit, then kill whatever is left of the group.
///
/// The tool is spawned as the leader of its own group, so this also ends
/// background children still holding the capture pipes. The child is always
/// reaped before returning.
pub(super) fn terminate_child(child: &mut Child, grace: Duration, poll: Duration) -> io::Result<()> {
    #[cfg(unix)]
    let group = nix::unistd::Pid::from_raw(child.id() as i32);

    #[cfg(unix)]
    {
        use nix::sys::signal::{self, Signal};
        if let Err(errno) = signal::killpg(group, Signal::SIGTERM) {
            tracing::debug!(%errno, "SIGTERM delivery failed");
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child.kill();
    }

    let start = Instant::now();
    let mut exited = false;
    while start.elapsed() < grace {
        if child.try_wait()?.is_some() {
            exited = true;
            break;
        }
        thread::sleep(poll);
    }

    // Leftover group members would keep the drains open.
    #[cfg(unix)]
    {
        use nix::sys::signal::{self, Signal};
        let _ = signal::killpg(group, Signal::SIGKILL);
    }

    if !exited {
        tracing::warn!(pid = child.id(), "tool ignored SIGTERM, killing");
        let _ = child.kill();
        child.wait()?;
    }
    Ok(())
}
