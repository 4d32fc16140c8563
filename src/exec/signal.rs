// src/exec/signal.rs

//! Signal delivery to managed processes.

use std::io;

use tokio::process::Child;

use crate::types::StopSignal;

/// Deliver `signal` to `child`.
///
/// `pid` is the id captured at spawn time; the child has not been reaped yet
/// when this is called, so it still refers to the same process.
pub fn deliver(child: &mut Child, pid: Option<u32>, signal: StopSignal) -> io::Result<()> {
    match signal {
        StopSignal::Kill => child.start_kill(),
        StopSignal::Terminate => terminate(child, pid),
    }
}

#[cfg(unix)]
fn terminate(_child: &mut Child, pid: Option<u32>) -> io::Result<()> {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else {
        return Ok(());
    };
    signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn terminate(child: &mut Child, _pid: Option<u32>) -> io::Result<()> {
    child.start_kill()
}
