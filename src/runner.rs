//! Parallel execution of command bundles.
//!
//! `ParallelRunner` starts the first step of every bundle at once and, as each
//! step exits, starts the next step of the same bundle. Every child process is
//! driven by its own tokio task; those tasks only report `Event`s over a
//! channel. All bookkeeping, sequencing and completion detection happen in the
//! single coordinating loop inside [`ParallelRunner::run`].

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bundle::{build_bundles, Bundle, BundleInput};
use crate::error::RunError;
use crate::events::{Event, Slot};
use crate::executor::{Executor, OutputSink};
use crate::output::{OutputHistory, StreamKind};
use crate::process::{ProcessExit, ProcessHandle};
use crate::progress::{NoProgress, ProgressReporter};

/// Exit code recorded for a handle whose worker task died.
const WORKER_FAILED_CODE: i32 = 1;
/// Exit code reported when nothing is known about a command.
const UNKNOWN_EXIT_CODE: i32 = 1;

type ExitObserver = Box<dyn FnMut(&Bundle, &ProcessHandle, &RunState) + Send>;
type ErrorObserver = Box<dyn FnMut(&ProcessHandle, &OutputHistory) + Send>;
type FinalCallback = Box<dyn FnOnce(&RunState) + Send>;

/// Bookkeeping for one run, keyed by handle index.
///
/// `exited ⊆ started ⊆ queued` holds at all times; `successful` and `errors`
/// partition `exited`.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    queued: BTreeSet<usize>,
    started: BTreeSet<usize>,
    exited: BTreeSet<usize>,
    successful: BTreeSet<usize>,
    errors: BTreeSet<usize>,
    output: HashMap<String, OutputHistory>,
}

impl RunState {
    pub fn queued(&self) -> &BTreeSet<usize> {
        &self.queued
    }

    pub fn started(&self) -> &BTreeSet<usize> {
        &self.started
    }

    pub fn exited(&self) -> &BTreeSet<usize> {
        &self.exited
    }

    pub fn successful(&self) -> &BTreeSet<usize> {
        &self.successful
    }

    pub fn errors(&self) -> &BTreeSet<usize> {
        &self.errors
    }

    /// True once every queued handle has exited.
    pub fn is_complete(&self) -> bool {
        self.queued.len() == self.exited.len()
    }

    /// Output history of a command, by exact command text.
    pub fn output_for(&self, command: &str) -> Option<&OutputHistory> {
        self.output.get(command)
    }

    /// Exit code of a command, taken from its latest exit marker.
    ///
    /// Commands that are still running or were never submitted report `1`.
    pub fn exit_code_for(&self, command: &str) -> i32 {
        self.output
            .get(command)
            .and_then(OutputHistory::exit_code)
            .unwrap_or(UNKNOWN_EXIT_CODE)
    }
}

/// Spawns worker tasks for started handles.
#[derive(Clone)]
pub struct Launcher {
    executor: Arc<dyn Executor>,
    cwd: Option<PathBuf>,
    tx: mpsc::Sender<Event>,
}

impl Launcher {
    /// Runs `command` on a new task. Exactly one `ProcessExited` or
    /// `ProcessFailed` event is sent for `slot`, after all of its output.
    pub fn launch(&self, slot: Slot, command: String) {
        let executor = Arc::clone(&self.executor);
        let cwd = self.cwd.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let sink = OutputSink::new(slot, tx.clone());
            let worker = tokio::spawn(async move {
                executor.execute(&command, cwd.as_deref(), sink).await
            });
            let event = match worker.await {
                Ok(Ok(exit)) => Event::ProcessExited { slot, exit },
                Ok(Err(err)) => Event::ProcessFailed {
                    slot,
                    exit_code: err.exit_code(),
                    error: err.to_string(),
                },
                Err(err) => Event::ProcessFailed {
                    slot,
                    exit_code: WORKER_FAILED_CODE,
                    error: format!("worker task failed: {}", err),
                },
            };
            let _ = tx.send(event).await;
        });
    }
}

/// Everything left once a run is over.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub bundles: Vec<Bundle>,
    pub state: RunState,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.state.errors().is_empty()
    }
}

/// Runs bundles concurrently, and the steps of each bundle in order.
pub struct ParallelRunner {
    bundles: Vec<Bundle>,
    state: RunState,
    launcher: Launcher,
    events: mpsc::Receiver<Event>,
    verbose: bool,
    progress: Box<dyn ProgressReporter>,
    on_exit: Option<ExitObserver>,
    on_error: Option<ErrorObserver>,
    on_complete: Option<FinalCallback>,
    completed: bool,
}

impl ParallelRunner {
    /// Admits a run: builds the bundles and queues every handle.
    ///
    /// Fails with [`RunError::EmptyCommands`] when nothing runnable remains.
    /// Nothing is started here.
    pub fn new<I, K>(executor: Arc<dyn Executor>, input: I) -> Result<Self, RunError>
    where
        I: IntoIterator<Item = (K, BundleInput)>,
        K: Into<String>,
    {
        let bundles = build_bundles(input)?;
        let mut state = RunState::default();
        for handle in bundles.iter().flat_map(|bundle| bundle.handles()) {
            state.queued.insert(handle.index());
        }
        let (tx, events) = mpsc::channel(256);
        Ok(Self {
            bundles,
            state,
            launcher: Launcher {
                executor,
                cwd: None,
                tx,
            },
            events,
            verbose: false,
            progress: Box::new(NoProgress),
            on_exit: None,
            on_error: None,
            on_complete: None,
            completed: false,
        })
    }

    /// Working directory for every command.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.launcher.cwd = Some(cwd.into());
        self
    }

    /// In verbose mode the progress reporter is never advanced or finished;
    /// callers print per-exit detail from [`on_exit`](Self::on_exit).
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Called after each exit has been recorded, before the next step starts.
    pub fn on_exit<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&Bundle, &ProcessHandle, &RunState) + Send + 'static,
    {
        self.on_exit = Some(Box::new(observer));
        self
    }

    /// Called for every nonzero exit. Cannot change sequencing.
    pub fn on_error<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&ProcessHandle, &OutputHistory) + Send + 'static,
    {
        self.on_error = Some(Box::new(observer));
        self
    }

    /// Called exactly once, after every handle has exited.
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&RunState) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn bundles(&self) -> &[Bundle] {
        &self.bundles
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Starts the handle at `slot`.
    ///
    /// Returns `false` when there is no such handle or it was already started.
    pub fn start(&mut self, slot: Slot) -> bool {
        let Some(handle) = self
            .bundles
            .get_mut(slot.bundle)
            .and_then(|bundle| bundle.get_mut(slot.position))
        else {
            return false;
        };
        if !handle.start(slot, &self.launcher) {
            debug!(index = handle.index(), "start ignored, handle already started");
            return false;
        }
        debug!(index = handle.index(), command = handle.command(), "started");
        self.state.started.insert(handle.index());
        true
    }

    /// Drives the run to completion and returns the final state.
    pub async fn run(mut self) -> RunOutcome {
        info!(
            bundles = self.bundles.len(),
            commands = self.state.queued.len(),
            "starting run"
        );
        if !self.verbose {
            self.progress.start(self.state.queued.len());
        }
        for bundle in 0..self.bundles.len() {
            self.start(Slot::new(bundle, 0));
        }
        while !self.completed {
            // The launcher keeps a sender alive, so the channel never closes here.
            let Some(event) = self.events.recv().await else {
                break;
            };
            self.handle_event(event);
        }
        RunOutcome {
            bundles: self.bundles,
            state: self.state,
        }
    }

    fn handle(&self, slot: Slot) -> Option<&ProcessHandle> {
        self.bundles.get(slot.bundle)?.get(slot.position)
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::ProcessStarted { slot, pid } => {
                if let Some(handle) = self
                    .bundles
                    .get_mut(slot.bundle)
                    .and_then(|bundle| bundle.get_mut(slot.position))
                {
                    handle.set_pid(pid);
                }
            }
            Event::ProcessOutput { slot, text, stream } => {
                let Some(command) = self.handle(slot).map(|h| h.command().to_string()) else {
                    return;
                };
                self.state
                    .output
                    .entry(command)
                    .or_default()
                    .push_text(text, stream);
            }
            Event::ProcessExited { slot, exit } => self.on_process_exit(slot, exit),
            Event::ProcessFailed {
                slot,
                error,
                exit_code,
            } => {
                let Some(command) = self.handle(slot).map(|h| h.command().to_string()) else {
                    return;
                };
                warn!(command = %command, %error, "command could not be run");
                self.state
                    .output
                    .entry(command)
                    .or_default()
                    .push_text(error, StreamKind::Stderr);
                self.on_process_exit(slot, ProcessExit::code(exit_code));
            }
        }
    }

    fn on_process_exit(&mut self, slot: Slot, exit: ProcessExit) {
        if self.completed {
            return;
        }
        let Some(handle) = self
            .bundles
            .get_mut(slot.bundle)
            .and_then(|bundle| bundle.get_mut(slot.position))
        else {
            return;
        };
        if !handle.mark_exited(exit) {
            warn!(index = handle.index(), "duplicate exit ignored");
            return;
        }
        if !self.verbose {
            self.progress.advance(handle);
        }

        let index = handle.index();
        let code = exit.exit_code();
        let command = handle.command().to_string();
        self.state.exited.insert(index);
        if code == 0 {
            self.state.successful.insert(index);
            debug!(index, command = %command, "exited successfully");
        } else {
            self.state.errors.insert(index);
            warn!(index, command = %command, code, signal = ?exit.signal, "command failed");
        }
        self.state
            .output
            .entry(command.clone())
            .or_default()
            .push_exit(code);

        let bundle = &self.bundles[slot.bundle];
        let handle = &bundle.handles()[slot.position];
        if code != 0 {
            if let Some(on_error) = self.on_error.as_mut() {
                if let Some(history) = self.state.output.get(&command) {
                    on_error(handle, history);
                }
            }
        }
        if let Some(on_exit) = self.on_exit.as_mut() {
            on_exit(bundle, handle, &self.state);
        }

        if !self.start(slot.next()) && self.bundles[slot.bundle].is_complete() {
            debug!(bundle = self.bundles[slot.bundle].key(), "bundle finished");
        }

        if self.state.is_complete() {
            self.complete();
        }
    }

    fn complete(&mut self) {
        self.completed = true;
        if !self.verbose {
            self.progress.finish();
        }
        info!(
            succeeded = self.state.successful.len(),
            failed = self.state.errors.len(),
            "run finished"
        );
        if let Some(callback) = self.on_complete.take() {
            callback(&self.state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::ExecError;
    use crate::output::OutputChunk;

    #[derive(Debug, Clone, Default)]
    struct Script {
        code: i32,
        lines: Vec<&'static str>,
        delay_ms: u64,
        spawn_error: bool,
        panic: bool,
    }

    #[derive(Default)]
    struct FakeExecutor {
        scripts: HashMap<String, Script>,
        log: Arc<Mutex<Vec<String>>>,
        calls: AtomicUsize,
    }

    impl FakeExecutor {
        fn script(mut self, command: &str, script: Script) -> Self {
            self.scripts.insert(command.to_string(), script);
            self
        }

        fn log(&self) -> Arc<Mutex<Vec<String>>> {
            Arc::clone(&self.log)
        }
    }

    #[async_trait]
    impl Executor for FakeExecutor {
        async fn execute(
            &self,
            command: &str,
            _cwd: Option<&std::path::Path>,
            sink: OutputSink,
        ) -> Result<ProcessExit, ExecError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let script = self.scripts.get(command).cloned().unwrap_or_default();
            if script.spawn_error {
                return Err(ExecError::Spawn {
                    command: command.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                });
            }
            self.log.lock().unwrap().push(format!("start {}", command));
            sink.started(1000 + call as u32).await;
            for line in &script.lines {
                sink.output(*line, StreamKind::Stdout).await;
            }
            if script.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(script.delay_ms)).await;
            }
            if script.panic {
                panic!("scripted panic");
            }
            self.log.lock().unwrap().push(format!("end {}", command));
            Ok(ProcessExit::code(script.code))
        }
    }

    #[derive(Default)]
    struct Recorded {
        started: Vec<usize>,
        advanced: Vec<String>,
        finished: usize,
    }

    struct RecordingProgress(Arc<Mutex<Recorded>>);

    impl ProgressReporter for RecordingProgress {
        fn start(&mut self, total: usize) {
            self.0.lock().unwrap().started.push(total);
        }
        fn advance(&mut self, handle: &ProcessHandle) {
            self.0
                .lock()
                .unwrap()
                .advanced
                .push(handle.command().to_string());
        }
        fn finish(&mut self) {
            self.0.lock().unwrap().finished += 1;
        }
    }

    fn input(entries: Vec<(&str, Vec<&str>)>) -> Vec<(String, BundleInput)> {
        entries
            .into_iter()
            .map(|(key, commands)| (key.to_string(), BundleInput::from(commands)))
            .collect()
    }

    fn position(log: &[String], entry: &str) -> usize {
        log.iter()
            .position(|line| line == entry)
            .unwrap_or_else(|| panic!("missing {entry} in {log:?}"))
    }

    #[tokio::test]
    async fn runs_bundles_and_calls_final_callback_once() {
        let executor = FakeExecutor::default()
            .script("echo 1", Script { delay_ms: 10, ..Script::default() });
        let log = executor.log();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(None));

        let calls_cb = Arc::clone(&calls);
        let seen_cb = Arc::clone(&seen);
        let runner = ParallelRunner::new(
            Arc::new(executor),
            input(vec![("a", vec!["echo 1", "echo 2"]), ("b", vec!["echo 3"])]),
        )
        .unwrap()
        .on_complete(move |state| {
            calls_cb.fetch_add(1, Ordering::SeqCst);
            *seen_cb.lock().unwrap() = Some((state.exited().len(), state.successful().len()));
        });
        assert_eq!(runner.state().queued().len(), 3);
        assert!(runner.state().started().is_empty());

        let outcome = runner.run().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock().unwrap(), Some((3, 3)));
        assert!(outcome.success());
        assert!(outcome.state.is_complete());
        assert_eq!(outcome.state.started().len(), 3);

        let log = log.lock().unwrap();
        assert!(position(&log, "end echo 1") < position(&log, "start echo 2"));
    }

    #[tokio::test]
    async fn steps_in_a_bundle_never_overlap() {
        let slow = Script { delay_ms: 15, ..Script::default() };
        let executor = FakeExecutor::default()
            .script("a1", slow.clone())
            .script("a2", slow.clone())
            .script("a3", slow.clone())
            .script("b1", slow);
        let log = executor.log();
        ParallelRunner::new(
            Arc::new(executor),
            input(vec![("a", vec!["a1", "a2", "a3"]), ("b", vec!["b1"])]),
        )
        .unwrap()
        .run()
        .await;

        let log = log.lock().unwrap();
        assert!(position(&log, "end a1") < position(&log, "start a2"));
        assert!(position(&log, "end a2") < position(&log, "start a3"));
        // Bundles are independent: b1 starts alongside a1.
        assert!(position(&log, "start b1") < position(&log, "end a1"));
    }

    #[tokio::test]
    async fn shorter_bundle_does_not_complete_the_run() {
        let step = Script { delay_ms: 20, ..Script::default() };
        let executor = FakeExecutor::default()
            .script("long 1", step.clone())
            .script("long 2", step.clone())
            .script("long 3", step);
        let exits = Arc::new(Mutex::new(Vec::new()));
        let completions = Arc::new(AtomicUsize::new(0));

        let exits_cb = Arc::clone(&exits);
        let completions_cb = Arc::clone(&completions);
        let outcome = ParallelRunner::new(
            Arc::new(executor),
            input(vec![("long", vec!["long 1", "long 2", "long 3"]), ("short", vec!["short"])]),
        )
        .unwrap()
        .on_exit(move |bundle, handle, state| {
            exits_cb.lock().unwrap().push((
                bundle.key().to_string(),
                handle.command().to_string(),
                state.is_complete(),
            ));
        })
        .on_complete(move |state| {
            assert_eq!(state.exited().len(), 4);
            completions_cb.fetch_add(1, Ordering::SeqCst);
        })
        .run()
        .await;

        let exits = exits.lock().unwrap();
        assert_eq!(exits.len(), 4);
        assert_eq!(exits[0], ("short".to_string(), "short".to_string(), false));
        assert_eq!(exits[3], ("long".to_string(), "long 3".to_string(), true));
        assert!(exits[..3].iter().all(|(_, _, complete)| !complete));
        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.state.exited().len(), 4);
    }

    #[tokio::test]
    async fn failures_do_not_halt_bundles() {
        let executor = FakeExecutor::default()
            .script("migrate", Script { code: 2, lines: vec!["boom"], ..Script::default() });
        let log = executor.log();
        let failures = Arc::new(Mutex::new(Vec::new()));
        let failures_cb = Arc::clone(&failures);
        let outcome = ParallelRunner::new(
            Arc::new(executor),
            input(vec![("db", vec!["migrate", "seed"]), ("web", vec!["npm ci"])]),
        )
        .unwrap()
        .on_error(move |handle, history| {
            failures_cb
                .lock()
                .unwrap()
                .push((handle.command().to_string(), history.text()));
        })
        .run()
        .await;

        assert!(log.lock().unwrap().contains(&"end seed".to_string()));
        assert!(!outcome.success());
        assert_eq!(outcome.state.errors().iter().copied().collect::<Vec<_>>(), vec![0]);
        assert_eq!(outcome.state.successful().len(), 2);
        assert_eq!(outcome.state.exit_code_for("migrate"), 2);
        assert_eq!(outcome.state.exit_code_for("seed"), 0);
        assert_eq!(outcome.state.exit_code_for("never submitted"), 1);
        assert_eq!(
            *failures.lock().unwrap(),
            vec![("migrate".to_string(), "boom".to_string())]
        );
        assert_eq!(outcome.bundles[0].handles()[0].exit_code(), Some(2));
    }

    #[tokio::test]
    async fn running_command_reports_default_exit_code() {
        let executor = FakeExecutor::default()
            .script("slow", Script { delay_ms: 50, ..Script::default() });
        let observed = Arc::new(Mutex::new(None));
        let observed_cb = Arc::clone(&observed);
        ParallelRunner::new(
            Arc::new(executor),
            input(vec![("fast", vec!["fast"]), ("slow", vec!["slow"])]),
        )
        .unwrap()
        .on_exit(move |_, handle, state| {
            if handle.command() == "fast" {
                *observed_cb.lock().unwrap() = Some(state.exit_code_for("slow"));
            }
        })
        .run()
        .await;
        assert_eq!(*observed.lock().unwrap(), Some(1));
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let executor = Arc::new(FakeExecutor::default());
        let mut runner = ParallelRunner::new(
            Arc::clone(&executor) as Arc<dyn Executor>,
            input(vec![("only", vec!["once"])]),
        )
        .unwrap();
        assert!(runner.start(Slot::new(0, 0)));
        assert!(!runner.start(Slot::new(0, 0)));
        assert!(!runner.start(Slot::new(0, 1)));
        assert!(!runner.start(Slot::new(5, 0)));

        let outcome = runner.run().await;
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.state.exited().len(), 1);
        let handle = &outcome.bundles[0].handles()[0];
        assert_eq!(handle.pid(), Some(1000));
        assert!(handle.is_exited());
    }

    #[tokio::test]
    async fn output_history_ends_with_exit_marker() {
        let executor = FakeExecutor::default().script(
            "build",
            Script {
                code: 0,
                lines: vec!["l1", "l2", "l3"],
                ..Script::default()
            },
        );
        let outcome = ParallelRunner::new(Arc::new(executor), input(vec![("b", vec!["build"])]))
            .unwrap()
            .run()
            .await;
        let history = outcome.state.output_for("build").unwrap();
        assert_eq!(
            history.chunks(),
            &[
                OutputChunk::Text { text: "l1".into(), stream: StreamKind::Stdout },
                OutputChunk::Text { text: "l2".into(), stream: StreamKind::Stdout },
                OutputChunk::Text { text: "l3".into(), stream: StreamKind::Stdout },
                OutputChunk::Exit { exit_code: 0 },
            ]
        );
    }

    #[tokio::test]
    async fn spawn_errors_and_panics_still_exit() {
        let executor = FakeExecutor::default()
            .script("missing", Script { spawn_error: true, ..Script::default() })
            .script("crash", Script { panic: true, ..Script::default() });
        let log = executor.log();
        let outcome = ParallelRunner::new(
            Arc::new(executor),
            input(vec![("a", vec!["missing", "after missing"]), ("b", vec!["crash", "after crash"])]),
        )
        .unwrap()
        .run()
        .await;

        assert!(outcome.state.is_complete());
        assert_eq!(outcome.state.exit_code_for("missing"), 127);
        assert_eq!(outcome.state.exit_code_for("crash"), 1);
        assert_eq!(outcome.state.errors().len(), 2);
        let log = log.lock().unwrap();
        assert!(log.contains(&"end after missing".to_string()));
        assert!(log.contains(&"end after crash".to_string()));
        let missing = outcome.state.output_for("missing").unwrap();
        assert!(missing.text().contains("failed to spawn"));
    }

    #[tokio::test]
    async fn progress_advances_once_per_exit() {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        ParallelRunner::new(
            Arc::new(FakeExecutor::default()),
            input(vec![("a", vec!["x", "y"]), ("b", vec!["z"])]),
        )
        .unwrap()
        .with_progress(Box::new(RecordingProgress(Arc::clone(&recorded))))
        .run()
        .await;
        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.started, vec![3]);
        assert_eq!(recorded.advanced.len(), 3);
        assert_eq!(recorded.finished, 1);
    }

    #[tokio::test]
    async fn verbose_mode_skips_progress() {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let exits = Arc::new(AtomicUsize::new(0));
        let exits_cb = Arc::clone(&exits);
        ParallelRunner::new(Arc::new(FakeExecutor::default()), input(vec![("a", vec!["x", "y"])]))
            .unwrap()
            .verbose(true)
            .with_progress(Box::new(RecordingProgress(Arc::clone(&recorded))))
            .on_exit(move |_, _, _| {
                exits_cb.fetch_add(1, Ordering::SeqCst);
            })
            .run()
            .await;
        let recorded = recorded.lock().unwrap();
        assert!(recorded.started.is_empty());
        assert!(recorded.advanced.is_empty());
        assert_eq!(recorded.finished, 0);
        assert_eq!(exits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn empty_input_is_rejected_before_running() {
        let result = ParallelRunner::new(
            Arc::new(FakeExecutor::default()),
            vec![("x".to_string(), BundleInput::Invalid)],
        );
        assert!(matches!(result, Err(RunError::EmptyCommands)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_real_shell_commands() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = ParallelRunner::new(
            Arc::new(crate::executor::ShellExecutor::default()),
            input(vec![
                ("a", vec!["echo 1 > first", "test -f first && echo 2"]),
                ("b", vec!["echo 3"]),
            ]),
        )
        .unwrap()
        .with_cwd(dir.path())
        .run()
        .await;
        assert!(outcome.success());
        assert_eq!(outcome.state.successful().len(), 3);
        assert_eq!(
            outcome.state.output_for("test -f first && echo 2").unwrap().text(),
            "2"
        );
        assert_eq!(outcome.state.output_for("echo 3").unwrap().text(), "3");
        assert!(outcome.bundles.iter().all(|b| b.is_complete()));
    }
}
