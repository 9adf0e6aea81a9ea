//! Blocking execution of external programs.

use std::io::Write;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::{ConvertError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Whether `program` resolves on `PATH`.
pub fn is_installed(program: &str) -> bool {
    Command::new("which")
        .arg(program)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// First installed program out of `candidates`.
pub fn detect<'a>(candidates: &[&'a str]) -> Option<&'a str> {
    candidates.iter().copied().find(|program| is_installed(program))
}

/// Runs `cmd` to completion, optionally feeding `stdin`, and kills it once
/// `timeout` has elapsed. Output streams are discarded.
///
/// Input is written from a separate thread so the deadline also covers a
/// child that stops reading.
pub fn run(mut cmd: Command, stdin: Option<&str>, timeout: Option<Duration>) -> Result<ExitStatus> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    cmd.stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    debug!("running {:?}", cmd);
    let started = Instant::now();
    let mut child = cmd.spawn()?;

    let writer = match (stdin, child.stdin.take()) {
        (Some(text), Some(mut pipe)) => {
            let text = text.to_owned();
            Some(thread::spawn(move || pipe.write_all(text.as_bytes())))
        }
        _ => None,
    };

    let outcome = wait(&mut child, &program, started, timeout);
    if let Some(writer) = writer {
        match writer.join() {
            // A child that exits early closes the pipe; its exit status reports why.
            Ok(Err(e)) => warn!("{} stopped reading input: {}", program, e),
            Err(_) => warn!("input writer for {} panicked", program),
            Ok(Ok(())) => {}
        }
    }
    outcome
}

fn wait(child: &mut Child, program: &str, started: Instant, timeout: Option<Duration>) -> Result<ExitStatus> {
    let Some(limit) = timeout else {
        return Ok(child.wait()?);
    };

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if started.elapsed() >= limit {
            warn!("{} exceeded {:?}, killing it", program, limit);
            let _ = child.kill();
            let _ = child.wait();
            return Err(ConvertError::Timeout {
                program: program.to_string(),
                limit,
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}
