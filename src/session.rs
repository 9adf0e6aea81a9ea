//! Isolated conversion sessions for the job launcher.
//!
//! Each job gets its own working directory and its own converter process.
//! The process's output is forwarded line by line as [`JobEvent::Log`], and
//! the last event is always [`JobEvent::Finished`]. The working directory is
//! removed when the stream finishes or is dropped, whichever comes first.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use tempfile::TempDir;
use uuid::Uuid;

use crate::error::SessionError;

/// Name of the converter binary the launcher runs for each job.
pub const CONVERTER_BIN: &str = "epub2mp3";

/// Extension of the files a session collects.
pub const OUTPUT_EXTENSION: &str = "mp3";

/// How often a silent job checks whether it was cancelled.
const CANCEL_POLL: Duration = Duration::from_millis(100);

/// How sessions start the converter and where they put working directories.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub program: PathBuf,
    /// Arguments placed before the job's own arguments.
    pub base_args: Vec<OsString>,
    pub work_root: PathBuf,
}

impl SessionConfig {
    /// The converter installed next to the running executable, with working
    /// directories under `temp_conversions`.
    pub fn sibling_converter() -> std::io::Result<Self> {
        let exe = std::env::current_exe()?;
        let dir = exe.parent().unwrap_or_else(|| Path::new("."));
        Ok(Self {
            program: dir.join(CONVERTER_BIN),
            base_args: Vec::new(),
            work_root: std::env::temp_dir().join("temp_conversions"),
        })
    }
}

/// Parameters collected by the launcher for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobRequest {
    pub document: PathBuf,
    /// Where produced files are delivered before the session is torn down.
    pub destination: PathBuf,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track: Option<String>,
    pub offset: Option<usize>,
    pub end: Option<usize>,
    /// Passed through unchecked; the converter reports invalid values.
    pub words_per_part: Option<i64>,
}

impl JobRequest {
    fn converter_args(&self, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![self.document.clone().into(), output.into()];
        let mut flag = |name: &str, value: String| {
            args.push(name.into());
            args.push(value.into());
        };
        for (name, value) in [
            ("--artist", &self.artist),
            ("--album", &self.album),
            ("--track", &self.track),
        ] {
            if let Some(value) = value.as_ref().filter(|v| !v.trim().is_empty()) {
                flag(name, value.clone());
            }
        }
        if let Some(offset) = self.offset {
            flag("--offset", offset.to_string());
        }
        if let Some(parts) = self.words_per_part {
            flag("--parts", parts.to_string());
        }
        if let Some(end) = self.end {
            flag("--end", end.to_string());
        }
        args
    }

    fn output_name(&self) -> String {
        let stem = self
            .document
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audiobook".to_string());
        format!("{}.{}", stem, OUTPUT_EXTENSION)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// One line of converter output, or a session message.
    Log(String),
    /// Delivered files, or `None` when the job failed.
    Finished(Option<Vec<PathBuf>>),
}

/// Stops a job from another thread, even while the converter is silent.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A running job. Iterating yields its events once; it cannot be restarted.
pub struct JobStream {
    id: Uuid,
    dir: PathBuf,
    workdir: Option<TempDir>,
    child: Option<Child>,
    lines: Option<Receiver<String>>,
    destination: PathBuf,
    pending: VecDeque<JobEvent>,
    log: String,
    finished: bool,
    cancel: CancelHandle,
}

/// Starts a job in a fresh session.
///
/// Setup problems (missing document, unusable working directory, converter
/// not startable) are reported through the stream like any other failure.
pub fn run_job(config: &SessionConfig, request: &JobRequest) -> JobStream {
    let id = Uuid::new_v4();
    let mut stream = JobStream {
        id,
        dir: config.work_root.join(id.to_string()),
        workdir: None,
        child: None,
        lines: None,
        destination: request.destination.clone(),
        pending: VecDeque::new(),
        log: String::new(),
        finished: false,
        cancel: CancelHandle::default(),
    };

    if !request.document.is_file() {
        stream.fail(format!(
            "Error: document {} does not exist.",
            request.document.display()
        ));
        return stream;
    }

    if let Err(e) = stream.start(config, request) {
        warn!("session {} could not start: {}", id, e);
        stream.fail(format!("Error: {}", e));
    }
    stream
}

impl JobStream {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The session's working directory. It only exists while the job runs.
    pub fn working_dir(&self) -> &Path {
        &self.dir
    }

    /// Everything logged so far.
    pub fn log(&self) -> &str {
        &self.log
    }

    /// A handle that ends the job on the stream's next poll. The converter is
    /// killed and the stream finishes with `Finished(None)`.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn start(&mut self, config: &SessionConfig, request: &JobRequest) -> Result<(), SessionError> {
        fs::create_dir_all(&config.work_root).map_err(|source| SessionError::WorkDir {
            root: config.work_root.clone(),
            source,
        })?;
        let id = self.id.to_string();
        let workdir = tempfile::Builder::new()
            .prefix(&id)
            .rand_bytes(0)
            .tempdir_in(&config.work_root)
            .map_err(|source| SessionError::WorkDir {
                root: config.work_root.clone(),
                source,
            })?;
        self.dir = workdir.path().to_path_buf();
        self.workdir = Some(workdir);

        let output = self.dir.join(request.output_name());
        let mut child = Command::new(&config.program)
            .args(&config.base_args)
            .args(request.converter_args(&output))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SessionError::Spawn {
                program: config.program.clone(),
                source,
            })?;
        info!("session {} started {} in {}", self.id, config.program.display(), self.dir.display());

        let (sender, receiver) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, sender.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, sender);
        }
        self.child = Some(child);
        self.lines = Some(receiver);
        Ok(())
    }

    fn fail(&mut self, message: String) {
        self.pending.push_back(JobEvent::Log(message));
        self.pending.push_back(JobEvent::Finished(None));
        self.finished = true;
        self.cleanup();
    }

    /// Called once output has ended: reaps the converter, delivers its files.
    fn finish(&mut self) {
        let status = match self.child.take().map(|mut child| child.wait()) {
            Some(Ok(status)) => status,
            Some(Err(e)) => return self.fail(format!("Error: lost track of converter: {}", e)),
            None => return self.fail("Error: converter was not running.".to_string()),
        };

        if !status.success() {
            let reason = match status.code() {
                Some(code) => format!("code {}", code),
                None => "a signal".to_string(),
            };
            return self.fail(format!("Error: Converter exited with {}", reason));
        }

        let produced = match collect_outputs(&self.dir) {
            Ok(files) if !files.is_empty() => files,
            Ok(_) => return self.fail("Error: No MP3 files were generated.".to_string()),
            Err(e) => return self.fail(format!("Error: cannot read session output: {}", e)),
        };

        match deliver(&produced, &self.destination) {
            Ok(delivered) => {
                info!("session {} delivered {} file(s)", self.id, delivered.len());
                self.pending.push_back(JobEvent::Finished(Some(delivered)));
                self.finished = true;
                self.cleanup();
            }
            Err(e) => self.fail(format!(
                "Error: cannot move files to {}: {}",
                self.destination.display(),
                e
            )),
        }
    }

    fn cleanup(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Ok(None) = child.try_wait() {
                debug!("session {} stopping converter", self.id);
                let _ = child.kill();
            }
            let _ = child.wait();
        }
        self.lines = None;
        if let Some(workdir) = self.workdir.take() {
            if let Err(e) = workdir.close() {
                warn!("session {} could not remove {}: {}", self.id, self.dir.display(), e);
            }
        }
    }
}

impl Iterator for JobStream {
    type Item = JobEvent;

    fn next(&mut self) -> Option<JobEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                if let JobEvent::Log(line) = &event {
                    self.log.push_str(line);
                    self.log.push('\n');
                }
                return Some(event);
            }
            if self.finished {
                return None;
            }
            if self.cancel.is_cancelled() {
                info!("session {} cancelled", self.id);
                self.fail("Error: Conversion was cancelled.".to_string());
                continue;
            }
            let line = match &self.lines {
                Some(lines) => lines.recv_timeout(CANCEL_POLL),
                None => Err(RecvTimeoutError::Disconnected),
            };
            match line {
                Ok(line) => self.pending.push_back(JobEvent::Log(line)),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.finish(),
            }
        }
    }
}

impl Drop for JobStream {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn forward_lines<R: Read + Send + 'static>(reader: R, sender: Sender<String>) {
    thread::spawn(move || {
        for line in BufReader::new(reader).lines() {
            let Ok(line) = line else { break };
            if sender.send(line).is_err() {
                break;
            }
        }
    });
}

fn collect_outputs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_output = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(OUTPUT_EXTENSION))
            .unwrap_or(false);
        if path.is_file() && is_output {
            files.push(path);
        }
    }
    files.sort_by_cached_key(|path| part_order(path));
    Ok(files)
}

/// Sort key placing `book_part_2` before `book_part_10`.
fn part_order(path: &Path) -> (String, usize, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (base, number) = match stem.rsplit_once("_part_") {
        Some((base, number)) => match number.parse() {
            Ok(number) => (base.to_string(), number),
            Err(_) => (stem.clone(), 0),
        },
        None => (stem.clone(), 0),
    };
    (base, number, stem)
}

/// Moves `files` into `destination`. Existing files there are never
/// replaced; a clashing name gets a ` (2)`, ` (3)`, ... suffix.
fn deliver(files: &[PathBuf], destination: &Path) -> std::io::Result<Vec<PathBuf>> {
    fs::create_dir_all(destination)?;
    let mut delivered = Vec::with_capacity(files.len());
    for file in files {
        let target = reserve_target(file, destination)?;
        if fs::rename(file, &target).is_err() {
            // Different filesystem
            fs::copy(file, &target)?;
            fs::remove_file(file)?;
        }
        delivered.push(target);
    }
    Ok(delivered)
}

/// Claims a free name in `destination` by creating it empty, so a
/// concurrent session cannot pick the same one.
fn reserve_target(file: &Path, destination: &Path) -> std::io::Result<PathBuf> {
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audiobook".to_string());
    let extension = file
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    let mut attempt = 1;
    loop {
        let name = match attempt {
            1 => format!("{}{}", stem, extension),
            n => format!("{} ({}){}", stem, n, extension),
        };
        let target = destination.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&target) {
            Ok(_) => return Ok(target),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}
