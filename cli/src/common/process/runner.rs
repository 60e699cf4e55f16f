//! # Command Runner (`common::process::runner`)
//!
//! File: cli/src/common/process/runner.rs
//!
//! ## Overview
//!
//! `CommandRunner` launches external tools and supervises them until they exit.
//! It offers two execution modes:
//!
//! - **Blocking** (`run_blocking`): waits for the process and returns its full
//!   cumulative output, or `RunnerError::Execution` (carrying the partial
//!   output) if it did not exit cleanly.
//! - **Streaming** (`run_streaming`): returns after a short initial window with
//!   a `StreamingInvocation` holding the pid, the output collected so far, an
//!   event channel and a cancellation token. The process keeps running; every
//!   output line arrives as `ProcessEvent::Fragment`, followed by exactly one
//!   `ProcessEvent::Terminated`.
//!
//! Running processes can be cancelled by pid with `cancel`.
//!
//! ## Architecture
//!
//! Each launch spawns three tasks:
//!
//! 1. two **reader** tasks, one per pipe (stdout, stderr), that split the byte
//!    stream into lines and push them into one shared internal channel, so lines
//!    from both pipes keep their arrival order;
//! 2. one **supervisor** task that owns the `Child`. It forwards lines to the
//!    aggregator and the caller's event channel, and reacts to cancellation by
//!    sending SIGTERM to the child's process group. Once the child exits it
//!    deregisters the pid, drains what is left in the pipes (bounded by
//!    `drain_timeout`), classifies the exit and emits the termination event last.
//!
//! Because only the supervisor touches the `Child`, a terminate signal can never
//! reach a pid the OS has already reaped and possibly reused. Children are
//! spawned with `kill_on_drop`, so a supervisor dropped with its runtime takes
//! its child down too.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let runner = CommandRunner::new(RunnerSettings::default());
//!
//! // Blocking
//! let out = runner.run_blocking("nc", ["-zvn", "10.0.0.5", "80"]).await?;
//!
//! // Streaming
//! let mut scan = runner.run_streaming("nmap", ["-sV", "10.0.0.0/24"]).await?;
//! println!("pid {} / so far:\n{}", scan.id(), scan.initial_output());
//! let result = scan
//!     .drive(|fragment| println!("{}", fragment.text), |end| println!("{end}"))
//!     .await;
//! ```
//!
use super::{
    classify::{TerminationClassifier, TerminationResult},
    handle::{ProcessHandle, ProcessId},
    output::{OutputAggregator, OutputChannel, OutputFragment},
    registry::ProcessRegistry,
};
use crate::core::{config::Config, error::RunnerError};
use std::{
    io,
    path::PathBuf,
    process::{ExitStatus, Stdio},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, Command},
    sync::mpsc,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// How a submitted invocation should be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Blocking,
    Streaming,
}

/// An immutable request to run one external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    mode: ExecutionMode,
}

impl Invocation {
    pub fn new<P, I, S>(program: P, args: I, mode: ExecutionMode) -> Self
    where
        P: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            mode,
        }
    }

    pub fn blocking<P, I, S>(program: P, args: I) -> Self
    where
        P: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(program, args, ExecutionMode::Blocking)
    }

    pub fn streaming<P, I, S>(program: P, args: I) -> Self
    where
        P: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(program, args, ExecutionMode::Streaming)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }
}

/// Events delivered to a streaming caller, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Fragment(OutputFragment),
    /// Always the last event of an invocation.
    Terminated(TerminationResult),
}

/// Result of `CommandRunner::submit`, shaped by the invocation's mode.
#[derive(Debug)]
pub enum Submitted {
    Completed(String),
    Streaming(StreamingInvocation),
}

/// Tunables for a runner, usually derived from `Config`.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub initial_output_window: Duration,
    pub drain_timeout: Duration,
    pub working_dir: Option<PathBuf>,
    pub classifier: TerminationClassifier,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        RunnerSettings::from(&Config::default())
    }
}

impl From<&Config> for RunnerSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            initial_output_window: Duration::from_millis(cfg.runner.initial_output_window_ms),
            drain_timeout: Duration::from_millis(cfg.runner.drain_timeout_ms),
            working_dir: cfg.runner.working_dir.as_ref().map(PathBuf::from),
            classifier: TerminationClassifier::from_config(&cfg.signals),
        }
    }
}

type SharedOutput = Arc<Mutex<OutputAggregator>>;

fn lock_output(output: &SharedOutput) -> MutexGuard<'_, OutputAggregator> {
    output.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Launches and supervises external programs.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    settings: Arc<RunnerSettings>,
    registry: ProcessRegistry,
}

impl CommandRunner {
    /// Creates a runner with its own, empty registry.
    pub fn new(settings: RunnerSettings) -> Self {
        Self::with_registry(settings, ProcessRegistry::new())
    }

    /// Creates a runner that records its processes in `registry`.
    pub fn with_registry(settings: RunnerSettings, registry: ProcessRegistry) -> Self {
        Self {
            settings: Arc::new(settings),
            registry,
        }
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Executes `invocation` according to its mode.
    pub async fn submit(&self, invocation: &Invocation) -> Result<Submitted, RunnerError> {
        match invocation.mode() {
            ExecutionMode::Blocking => self
                .execute_blocking(invocation, CancellationToken::new())
                .await
                .map(Submitted::Completed),
            ExecutionMode::Streaming => self
                .execute_streaming(invocation)
                .await
                .map(Submitted::Streaming),
        }
    }

    /// Runs a program to completion and returns its cumulative output.
    ///
    /// # Errors
    ///
    /// * `RunnerError::Launch` if the program cannot be started.
    /// * `RunnerError::Execution` if it exits non-zero or by signal; the error
    ///   carries the output collected until then.
    pub async fn run_blocking<P, I, S>(&self, program: P, args: I) -> Result<String, RunnerError>
    where
        P: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.execute_blocking(&Invocation::blocking(program, args), CancellationToken::new())
            .await
    }

    /// Like `run_blocking`, but terminates the program once `stop` is cancelled
    /// and still waits for it to exit. A program stopped this way ends in
    /// `RunnerError::Execution` carrying the terminating signal.
    pub async fn run_blocking_until<P, I, S>(
        &self,
        program: P,
        args: I,
        stop: CancellationToken,
    ) -> Result<String, RunnerError>
    where
        P: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.execute_blocking(&Invocation::blocking(program, args), stop)
            .await
    }

    /// Launches a program and returns once the initial output window has passed
    /// (or the program has already terminated).
    ///
    /// # Errors
    ///
    /// `RunnerError::Launch` if the program cannot be started. Nothing is
    /// registered and no event is emitted in that case.
    pub async fn run_streaming<P, I, S>(
        &self,
        program: P,
        args: I,
    ) -> Result<StreamingInvocation, RunnerError>
    where
        P: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.execute_streaming(&Invocation::streaming(program, args))
            .await
    }

    /// Requests termination of a running process.
    ///
    /// Cancellation is asynchronous: wait for the `Terminated` event to know the
    /// process is gone.
    ///
    /// # Errors
    ///
    /// `RunnerError::UnknownProcess` if `id` is not running under this runner.
    #[instrument(skip(self), fields(pid = %id))]
    pub fn cancel(&self, id: ProcessId) -> Result<(), RunnerError> {
        let result = self.registry.request_cancel(id);
        match &result {
            Ok(()) => info!("Cancellation requested for process {}.", id),
            Err(_) => debug!("Cancellation ignored: process {} is not running.", id),
        }
        result
    }

    #[instrument(skip(self, invocation, stop), fields(program = %invocation.program()))]
    async fn execute_blocking(
        &self,
        invocation: &Invocation,
        stop: CancellationToken,
    ) -> Result<String, RunnerError> {
        let mut running = self.launch(invocation)?;
        let id = running.id();
        let process_cancel = running.cancellation_token();
        let termination = {
            let wait = running.wait();
            tokio::pin!(wait);
            tokio::select! {
                result = &mut wait => result,
                () = stop.cancelled() => {
                    info!("Stopping '{}' (pid {}).", invocation.program(), id);
                    process_cancel.cancel();
                    wait.await
                }
            }
        };
        let output = running.output();

        match termination {
            Some(result) if result.is_success() => {
                info!("'{}' completed successfully.", invocation.program());
                Ok(output)
            }
            Some(result) => {
                warn!("'{}' did not exit cleanly: {}", invocation.program(), result);
                Err(RunnerError::Execution {
                    program: invocation.program().to_string(),
                    exit_code: result.exit_code,
                    signal: result.signal,
                    output,
                })
            }
            None => {
                error!(
                    "Supervisor for '{}' ended without a termination event.",
                    invocation.program()
                );
                Err(RunnerError::Execution {
                    program: invocation.program().to_string(),
                    exit_code: None,
                    signal: None,
                    output,
                })
            }
        }
    }

    #[instrument(skip(self, invocation), fields(program = %invocation.program()))]
    async fn execute_streaming(
        &self,
        invocation: &Invocation,
    ) -> Result<StreamingInvocation, RunnerError> {
        let mut running = self.launch(invocation)?;

        // Collect a first snapshot, unless the process is already done.
        tokio::select! {
            () = tokio::time::sleep(self.settings.initial_output_window) => {}
            () = running.finished.cancelled() => {
                debug!("Process {} terminated within the initial window.", running.id);
            }
        }
        running.initial_output = running.output();
        Ok(running)
    }

    /// Spawns the child, registers it and starts its supervisor.
    fn launch(&self, invocation: &Invocation) -> Result<StreamingInvocation, RunnerError> {
        let program = invocation.program();
        info!("Launching '{}' with args {:?}", program, invocation.args());

        let mut command = Command::new(program);
        command
            .args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.settings.working_dir {
            command.current_dir(dir);
        }
        // Own process group: terminal Ctrl+C reaches us, not the tool; cancellation goes through `cancel`.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| {
            warn!("Failed to launch '{}': {}", program, source);
            RunnerError::Launch {
                program: program.to_string(),
                source,
            }
        })?;

        let Some(raw_pid) = child.id() else {
            // Only possible if the child was already reaped, which we never do before this point.
            return Err(RunnerError::Launch {
                program: program.to_string(),
                source: io::Error::other("spawned process has no pid"),
            });
        };
        let id = ProcessId::from_raw(raw_pid);

        let cancel = CancellationToken::new();
        self.registry
            .register(ProcessHandle::new(id, program, cancel.clone()));

        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, OutputChannel::Stdout, line_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, OutputChannel::Stderr, line_tx.clone()));
        }
        // The internal channel closes once both readers hit EOF.
        drop(line_tx);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let output: SharedOutput = Arc::new(Mutex::new(OutputAggregator::new()));
        let finished = CancellationToken::new();

        let supervisor = Supervisor {
            id,
            program: program.to_string(),
            cancel: cancel.clone(),
            finished: finished.clone(),
            registry: self.registry.clone(),
            settings: Arc::clone(&self.settings),
            forwarder: Forwarder {
                next_seq: 0,
                output: Arc::clone(&output),
                events: event_tx,
            },
        };
        tokio::spawn(supervisor.run(child, line_rx, readers));

        info!("Process {} ('{}') started.", id, program);
        Ok(StreamingInvocation {
            id,
            initial_output: String::new(),
            events: event_rx,
            cancel,
            finished,
            output,
        })
    }
}

/// A live (or recently finished) streaming invocation.
///
/// Events are queued without bound until they are read, next to the cumulative
/// output. A caller that only needs `initial_output`/`output` and `cancel`
/// should still drain events (`wait` does), or drop the invocation, which
/// discards further events while the process stays supervised.
#[derive(Debug)]
pub struct StreamingInvocation {
    id: ProcessId,
    initial_output: String,
    events: mpsc::UnboundedReceiver<ProcessEvent>,
    cancel: CancellationToken,
    finished: CancellationToken,
    output: SharedOutput,
}

impl StreamingInvocation {
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Cumulative output collected during the initial window.
    pub fn initial_output(&self) -> &str {
        &self.initial_output
    }

    /// Snapshot of the cumulative output collected so far.
    pub fn output(&self) -> String {
        lock_output(&self.output).text().to_string()
    }

    /// Token that, when cancelled, terminates the process.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Requests termination. Equivalent to `CommandRunner::cancel(self.id())`
    /// while the process runs; a no-op afterwards.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// `true` once the termination event has been produced.
    pub fn is_finished(&self) -> bool {
        self.finished.is_cancelled()
    }

    /// Next event, or `None` after the termination event has been consumed.
    pub async fn next_event(&mut self) -> Option<ProcessEvent> {
        self.events.recv().await
    }

    /// Feeds every remaining event into the caller's callbacks and returns the
    /// termination result. `on_termination` runs exactly once unless the
    /// supervisor died, in which case `None` is returned.
    pub async fn drive<F, T>(&mut self, mut on_fragment: F, on_termination: T) -> Option<TerminationResult>
    where
        F: FnMut(&OutputFragment),
        T: FnOnce(&TerminationResult),
    {
        while let Some(event) = self.events.recv().await {
            match event {
                ProcessEvent::Fragment(fragment) => on_fragment(&fragment),
                ProcessEvent::Terminated(result) => {
                    on_termination(&result);
                    return Some(result);
                }
            }
        }
        None
    }

    /// Waits for termination, discarding fragment events.
    pub async fn wait(&mut self) -> Option<TerminationResult> {
        self.drive(|_| {}, |_| {}).await
    }
}

/// Pushes lines into the aggregator and the caller's channel, numbering them.
struct Forwarder {
    next_seq: u64,
    output: SharedOutput,
    events: mpsc::UnboundedSender<ProcessEvent>,
}

impl Forwarder {
    fn forward(&mut self, channel: OutputChannel, text: String) {
        lock_output(&self.output).append(&text);
        let fragment = OutputFragment {
            seq: self.next_seq,
            channel,
            text,
        };
        self.next_seq += 1;
        // A caller that dropped its receiver still gets the process supervised.
        let _ = self.events.send(ProcessEvent::Fragment(fragment));
    }
}

enum Step {
    Line(OutputChannel, String),
    Cancel,
    Exited(io::Result<ExitStatus>),
}

struct Supervisor {
    id: ProcessId,
    program: String,
    cancel: CancellationToken,
    finished: CancellationToken,
    registry: ProcessRegistry,
    settings: Arc<RunnerSettings>,
    forwarder: Forwarder,
}

impl Supervisor {
    async fn run(
        mut self,
        mut child: Child,
        mut lines: mpsc::UnboundedReceiver<(OutputChannel, String)>,
        readers: Vec<JoinHandle<()>>,
    ) {
        let mut signalled = false;
        let status = loop {
            // Lines last: a tool that never stops writing must still be cancellable.
            let step = tokio::select! {
                biased;
                () = self.cancel.cancelled(), if !signalled => Step::Cancel,
                status = child.wait() => Step::Exited(status),
                Some((channel, text)) = lines.recv() => Step::Line(channel, text),
            };
            match step {
                Step::Line(channel, text) => self.forwarder.forward(channel, text),
                Step::Cancel => {
                    signalled = true;
                    send_terminate(&mut child, self.id);
                }
                Step::Exited(status) => break status,
            }
        };

        // The pid is gone from this point on; cancel must stop answering Ok.
        self.registry.deregister(self.id);

        // Flush whatever the pipes still hold; a grandchild may keep them open.
        let forwarder = &mut self.forwarder;
        let drain = async {
            while let Some((channel, text)) = lines.recv().await {
                forwarder.forward(channel, text);
            }
        };
        if tokio::time::timeout(self.settings.drain_timeout, drain)
            .await
            .is_err()
        {
            warn!(
                "Output pipes of process {} still open {:?} after exit; dropping the rest.",
                self.id, self.settings.drain_timeout
            );
        }
        for reader in readers {
            reader.abort();
        }

        let result = match status {
            Ok(status) => self.settings.classifier.classify_status(&status),
            Err(e) => {
                error!("Failed to collect exit status of process {}: {}", self.id, e);
                self.settings.classifier.classify(None, None)
            }
        };
        info!(
            "Process {} ('{}') ended: {:?} (exit code {:?}, signal {:?})",
            self.id, self.program, result.outcome, result.exit_code, result.signal
        );
        let _ = self.forwarder.events.send(ProcessEvent::Terminated(result));
        self.finished.cancel();
    }
}

fn spawn_reader<R>(
    reader: R,
    channel: OutputChannel,
    tx: mpsc::UnboundedSender<(OutputChannel, String)>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    if tx.send((channel, line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Error reading {}: {}", channel, e);
                    break;
                }
            }
        }
    })
}

/// Sends SIGTERM to the child's process group, so tools started through a
/// shell wrapper go down with it.
#[cfg(unix)]
fn send_terminate(child: &mut Child, id: ProcessId) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    // The child leads its own group (`process_group(0)`), so its pid is the pgid.
    let Some(pgid) = child.id().and_then(|pid| i32::try_from(pid).ok()) else {
        debug!("Process {} already reaped; no signal sent.", id);
        return;
    };
    match killpg(Pid::from_raw(pgid), Signal::SIGTERM) {
        Ok(()) => debug!("Sent SIGTERM to process group {}.", id),
        Err(e) => warn!("Failed to send SIGTERM to process group {}: {}", id, e),
    }
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child, id: ProcessId) {
    match child.start_kill() {
        Ok(()) => debug!("Killed process {}.", id),
        Err(e) => warn!("Failed to kill process {}: {}", id, e),
    }
}
