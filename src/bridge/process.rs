//! Child process lifecycle on a pseudo-terminal.
//!
//! Each started process gets two threads: a reader that performs blocking
//! reads on the PTY master and forwards chunks, and a worker that owns the
//! child, the prompt state and the event sender. The worker waits on its
//! inbox with a short timeout so termination requests are seen promptly even
//! when the child is silent.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use portable_pty::{native_pty_system, Child, ChildKiller, ExitStatus, MasterPty, PtySize};
use tracing::{debug, info, warn};

use super::arbiter::{ArbiterConfig, PromptArbiter, Verdict};
use super::command::CommandLine;
use super::text::Utf8Decoder;
use super::{BridgeError, BridgeEvent, ExitResult};

/// Maximum bytes read from the PTY in one call.
const READ_CHUNK: usize = 8_192;

/// Bridge settings shared by every process it starts.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Upper bound on how long the worker waits before re-checking the child.
    pub poll_interval: Duration,
    /// Time between SIGTERM and SIGKILL on `terminate`, capped at half the
    /// poll interval.
    pub terminate_grace: Duration,
    pub cols: u16,
    pub rows: u16,
    /// Working directory; the current directory when `None`.
    pub cwd: Option<PathBuf>,
    /// Extra environment for the child.
    pub env: Vec<(String, String)>,
    pub arbiter: ArbiterConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            terminate_grace: Duration::from_millis(50),
            cols: 120,
            rows: 40,
            cwd: None,
            env: Vec::new(),
            arbiter: ArbiterConfig::default(),
        }
    }
}

type SharedWriter = Arc<Mutex<Option<Box<dyn Write + Send>>>>;

/// Messages consumed by the worker, from the reader thread and from handles.
enum LoopInput {
    Chunk(Vec<u8>),
    ReadFailed(io::Error),
    Closed,
    Replied(String),
    Terminate,
}

/// Starts installer processes on pseudo-terminals.
#[derive(Debug, Clone, Default)]
pub struct ProcessBridge {
    config: BridgeConfig,
}

impl ProcessBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Spawn `command` and start relaying it. Returns as soon as the process
    /// is running; its events arrive on the returned receiver, ending with a
    /// single [`BridgeEvent::Exit`].
    pub fn start(
        &self,
        command: &CommandLine,
    ) -> Result<(BridgeHandle, Receiver<BridgeEvent>), BridgeError> {
        let program = command.program().to_string();
        let spawn_error = |source: io::Error| BridgeError::Spawn {
            program: program.clone(),
            source,
        };

        let mut cmd = command.to_builder().ok_or_else(|| {
            spawn_error(io::Error::new(io::ErrorKind::InvalidInput, "empty command line"))
        })?;
        match &self.config.cwd {
            Some(dir) => cmd.cwd(dir),
            None => {
                if let Ok(dir) = std::env::current_dir() {
                    cmd.cwd(dir);
                }
            }
        }
        cmd.env("TERM", "xterm-256color");
        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }

        let pair = native_pty_system()
            .openpty(PtySize {
                rows: self.config.rows,
                cols: self.config.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| spawn_error(os_error(e)))?;
        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| spawn_error(os_error(e)))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| spawn_error(os_error(e)))?;

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| spawn_error(spawn_failure(e, &program)))?;
        // Only the child keeps the slave open, so its exit ends the stream.
        drop(pair.slave);

        let pid = child.process_id();
        info!(command = %command, pid = ?pid, "spawned process");

        let (inbox_tx, inbox_rx) = mpsc::channel();
        let (events_tx, events_rx) = mpsc::channel();

        let reader_tx = inbox_tx.clone();
        if let Err(e) = thread::Builder::new()
            .name("pty-reader".to_string())
            .spawn(move || pump_output(reader, reader_tx))
        {
            let _ = child.kill();
            let _ = child.wait();
            return Err(spawn_error(e));
        }

        let writer: SharedWriter = Arc::new(Mutex::new(Some(writer)));
        let running = Arc::new(AtomicBool::new(true));
        let mut killer = child.clone_killer();

        let worker = Worker {
            child,
            _master: pair.master,
            writer: Arc::clone(&writer),
            inbox: inbox_rx,
            events: events_tx,
            arbiter: PromptArbiter::new(self.config.arbiter.clone()),
            decoder: Utf8Decoder::new(),
            running: Arc::clone(&running),
            poll_interval: self.config.poll_interval,
            terminate_grace: self.config.terminate_grace.min(self.config.poll_interval / 2),
        };
        if let Err(e) = thread::Builder::new()
            .name("pty-bridge".to_string())
            .spawn(move || worker.run())
        {
            let _ = killer.kill();
            return Err(spawn_error(e));
        }

        let handle = BridgeHandle {
            inbox: inbox_tx,
            writer,
            running,
            pid,
        };
        Ok((handle, events_rx))
    }
}

/// Caller-side handle to one running process. Cheap to clone; every clone
/// talks to the same worker.
#[derive(Clone)]
pub struct BridgeHandle {
    inbox: Sender<LoopInput>,
    writer: SharedWriter,
    running: Arc<AtomicBool>,
    pid: Option<u32>,
}

impl std::fmt::Debug for BridgeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeHandle")
            .field("pid", &self.pid)
            .field("running", &self.is_running())
            .finish()
    }
}

impl BridgeHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// False once the worker has started reporting the exit.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Write `text` and a newline to the child, and clear the awaiting-input
    /// state so the next distinct prompt can be surfaced.
    pub fn send_reply(&self, text: &str) -> Result<(), BridgeError> {
        if !self.is_running() {
            return Err(BridgeError::NotRunning);
        }
        self.inbox
            .send(LoopInput::Replied(text.to_string()))
            .map_err(|_| BridgeError::NotRunning)?;
        debug!(pid = ?self.pid, len = text.len(), "sending reply");
        write_line(&self.writer, text)
    }

    /// Ask the worker to stop the child. Seen within one poll interval.
    pub fn terminate(&self) -> Result<(), BridgeError> {
        if !self.is_running() {
            return Err(BridgeError::NotRunning);
        }
        debug!(pid = ?self.pid, "terminate requested");
        self.inbox
            .send(LoopInput::Terminate)
            .map_err(|_| BridgeError::NotRunning)
    }
}

fn write_line(writer: &SharedWriter, text: &str) -> Result<(), BridgeError> {
    let mut guard = writer.lock().unwrap_or_else(PoisonError::into_inner);
    let w = guard.as_mut().ok_or(BridgeError::NotRunning)?;
    w.write_all(format!("{text}\n").as_bytes())
        .and_then(|_| w.flush())
        .map_err(BridgeError::Write)
}

fn pump_output(mut reader: Box<dyn Read + Send>, tx: Sender<LoopInput>) {
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                let _ = tx.send(LoopInput::Closed);
                break;
            }
            Ok(n) => {
                if tx.send(LoopInput::Chunk(buf[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if is_hangup(&e) => {
                let _ = tx.send(LoopInput::Closed);
                break;
            }
            Err(e) => {
                let _ = tx.send(LoopInput::ReadFailed(e));
                break;
            }
        }
    }
}

/// A Linux PTY master reports EIO once the slave side is closed.
fn is_hangup(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::BrokenPipe {
        return true;
    }
    #[cfg(unix)]
    if e.raw_os_error() == Some(nix::errno::Errno::EIO as i32) {
        return true;
    }
    false
}

fn os_error(e: anyhow::Error) -> io::Error {
    e.downcast::<io::Error>()
        .unwrap_or_else(|e| io::Error::other(e.to_string()))
}

/// portable-pty reports a missing executable as a plain message; give it a
/// `NotFound` kind so callers can tell it apart.
fn spawn_failure(e: anyhow::Error, program: &str) -> io::Error {
    let e = match e.downcast::<io::Error>() {
        Ok(io) => return io,
        Err(e) => e,
    };
    let message = format!("{e:#}");
    if program_exists(program) {
        io::Error::other(message)
    } else {
        io::Error::new(io::ErrorKind::NotFound, message)
    }
}

fn program_exists(program: &str) -> bool {
    let path = Path::new(program);
    if path.is_absolute() || path.components().count() > 1 {
        return path.exists();
    }
    std::env::var_os("PATH")
        .map(|dirs| std::env::split_paths(&dirs).any(|dir| dir.join(program).exists()))
        .unwrap_or(false)
}

fn exit_result(status: &ExitStatus) -> ExitResult {
    if status.signal().is_some() {
        return ExitResult {
            exit_code: None,
            terminated_by_signal: true,
        };
    }
    ExitResult {
        exit_code: Some(status.exit_code() as i32),
        terminated_by_signal: false,
    }
}

/// Stop `child` and reap it: SIGTERM to its process group, then SIGKILL once
/// `grace` has passed. A child that has already been reaped is never signalled.
fn stop_child(child: &mut (dyn Child + Send + Sync), grace: Duration) {
    if has_exited(child) || request_exit(child, grace) {
        return;
    }
    force_kill(child);
    if let Err(e) = child.wait() {
        debug!(error = %e, "reaping process failed");
    }
}

fn has_exited(child: &mut (dyn Child + Send + Sync)) -> bool {
    matches!(child.try_wait(), Ok(Some(_)))
}

/// The child leads its own session, so its pid is also its process group.
#[cfg(unix)]
fn process_group(child: &(dyn Child + Send + Sync)) -> Option<nix::unistd::Pid> {
    child
        .process_id()
        .filter(|pid| *pid > 0)
        .map(|pid| nix::unistd::Pid::from_raw(pid as i32))
}

/// Returns true once the child has exited and been reaped.
#[cfg(unix)]
fn request_exit(child: &mut (dyn Child + Send + Sync), grace: Duration) -> bool {
    use nix::sys::signal::{killpg, Signal};

    let Some(pgid) = process_group(child) else {
        return false;
    };
    debug!(%pgid, "sending SIGTERM");
    if let Err(e) = killpg(pgid, Signal::SIGTERM) {
        debug!(%pgid, error = %e, "SIGTERM failed");
        return false;
    }

    let deadline = Instant::now() + grace;
    loop {
        if has_exited(child) {
            return true;
        }
        if Instant::now() >= deadline {
            debug!(%pgid, "grace period expired");
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

#[cfg(not(unix))]
fn request_exit(_child: &mut (dyn Child + Send + Sync), _grace: Duration) -> bool {
    false
}

#[cfg(unix)]
fn force_kill(child: &mut (dyn Child + Send + Sync)) {
    use nix::sys::signal::{killpg, Signal};

    if let Some(pgid) = process_group(child) {
        match killpg(pgid, Signal::SIGKILL) {
            Ok(()) => return,
            Err(e) => debug!(%pgid, error = %e, "SIGKILL failed"),
        }
    }
    if let Err(e) = child.kill() {
        debug!(error = %e, "kill failed");
    }
}

#[cfg(not(unix))]
fn force_kill(child: &mut (dyn Child + Send + Sync)) {
    if let Err(e) = child.kill() {
        debug!(error = %e, "kill failed");
    }
}

enum Ending {
    Closed,
    ReadFailed,
    Exited(ExitResult),
    Terminate,
}

struct Worker {
    child: Box<dyn Child + Send + Sync>,
    _master: Box<dyn MasterPty + Send>,
    writer: SharedWriter,
    inbox: Receiver<LoopInput>,
    events: Sender<BridgeEvent>,
    arbiter: PromptArbiter,
    decoder: Utf8Decoder,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
    terminate_grace: Duration,
}

impl Worker {
    fn run(mut self) {
        let result = match self.pump() {
            Ending::Exited(result) => {
                self.drain_after_exit();
                result
            }
            Ending::Closed => self.await_exit(),
            Ending::ReadFailed => match self.child.try_wait() {
                Ok(Some(status)) => exit_result(&status),
                _ => {
                    stop_child(self.child.as_mut(), self.terminate_grace);
                    ExitResult {
                        exit_code: None,
                        terminated_by_signal: false,
                    }
                }
            },
            Ending::Terminate => self.cancel(),
        };

        let tail = self.decoder.finish();
        if !tail.is_empty() {
            self.emit(BridgeEvent::Output(tail));
        }

        self.running.store(false, Ordering::SeqCst);
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        info!(
            exit_code = ?result.exit_code,
            terminated = result.terminated_by_signal,
            "process finished"
        );
        self.emit(BridgeEvent::Output(result.completion_message()));
        self.emit(BridgeEvent::Exit(result));
    }

    fn pump(&mut self) -> Ending {
        loop {
            match self.inbox.recv_timeout(self.poll_interval) {
                Ok(LoopInput::Chunk(bytes)) => self.on_chunk(&bytes),
                Ok(LoopInput::Replied(text)) => self.arbiter.reply_sent(&text),
                Ok(LoopInput::Terminate) => return Ending::Terminate,
                Ok(LoopInput::Closed) => return Ending::Closed,
                Ok(LoopInput::ReadFailed(e)) => {
                    warn!(error = %e, "reading process output failed");
                    self.emit(BridgeEvent::Output(format!("Error reading output: {e}")));
                    return Ending::ReadFailed;
                }
                Err(RecvTimeoutError::Timeout) => {
                    // A grandchild can keep the PTY open after the child is gone.
                    if let Ok(Some(status)) = self.child.try_wait() {
                        return Ending::Exited(exit_result(&status));
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Ending::Closed,
            }
        }
    }

    /// Collect output still in flight after the child exited.
    fn drain_after_exit(&mut self) {
        loop {
            match self.inbox.recv_timeout(self.poll_interval) {
                Ok(LoopInput::Chunk(bytes)) => self.on_chunk(&bytes),
                Ok(LoopInput::Replied(text)) => self.arbiter.reply_sent(&text),
                Ok(_) | Err(_) => break,
            }
        }
    }

    /// Output is over; wait for the exit status while still honouring
    /// termination requests.
    fn await_exit(&mut self) -> ExitResult {
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => return exit_result(&status),
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "waiting for process failed");
                    return ExitResult {
                        exit_code: None,
                        terminated_by_signal: false,
                    };
                }
            }
            match self.inbox.recv_timeout(self.poll_interval) {
                Ok(LoopInput::Terminate) => return self.cancel(),
                Ok(LoopInput::Replied(text)) => self.arbiter.reply_sent(&text),
                Ok(_) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => thread::sleep(self.poll_interval),
            }
        }
    }

    fn on_chunk(&mut self, bytes: &[u8]) {
        let text = self.decoder.decode(bytes);
        if text.is_empty() {
            return;
        }
        self.emit(BridgeEvent::Output(text.clone()));

        match self.arbiter.evaluate(&text) {
            Verdict::Prompt(prompt) => {
                debug!(prompt = %prompt, "prompt detected");
                self.emit(BridgeEvent::PromptDetected(prompt));
            }
            Verdict::AutoAnswer(answer) => {
                info!(answer = %answer, "answering restart prompt");
                if let Err(e) = write_line(&self.writer, &answer) {
                    warn!(error = %e, "could not answer restart prompt");
                }
            }
            Verdict::Ignored | Verdict::Duplicate | Verdict::AlreadyAnswered => {}
        }
    }

    fn emit(&self, event: BridgeEvent) {
        // The caller may have stopped listening; the lifecycle still completes.
        let _ = self.events.send(event);
    }

    fn cancel(&mut self) -> ExitResult {
        stop_child(self.child.as_mut(), self.terminate_grace);
        ExitResult {
            exit_code: None,
            terminated_by_signal: true,
        }
    }
}
