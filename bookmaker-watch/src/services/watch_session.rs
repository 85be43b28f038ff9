//! Watch Session
//!
//! Owns one directory observer and the worker task that dispatches its
//! events to a fresh [`EventHandler`]. Lifecycle: Idle → Watching → Stopped.
//!
//! # Concurrency
//! - `notify` delivers events on its own thread; they are bridged into the
//!   worker through an unbounded channel
//! - Files count as new when created in the input directory or moved into it
//!   from elsewhere. Renames within the input directory are not new files
//! - The worker handles files one at a time, so a slow OCR pass delays the
//!   files behind it
//! - A single [`CancellationToken`] is the stop signal. It is only checked
//!   between events: an in-flight file always completes
//! - There is no per-file timeout. A hung external tool blocks the session
//!   until it exits
//!
//! # Teardown
//! Every worker exit (stop request, fatal handler error, observer failure)
//! drops the observer, removes empty tmp/output directories and emits the
//! COMPLETED `End Observer.` message, which is always the session's last.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bookmaker_common::config::WatchConfig;
use bookmaker_common::time::Clock;
use bookmaker_common::StatusSender;
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::event_handler::EventHandler;
use super::file_placer::FilePlacer;
use crate::error::{SessionError, SessionResult};
use crate::extractors::IdentifierExtractor;
use crate::models::{SessionPaths, SessionState};
use crate::providers::MetadataResolver;
use crate::types::{FileEventSink, HandlerError};

/// Text of the terminal COMPLETED message
pub const END_MESSAGE: &str = "End Observer.";

type WatchEvents = mpsc::UnboundedReceiver<notify::Result<Event>>;

/// Rename halves whose destination never shows up are forgotten past this
const MAX_PENDING_RENAMES: usize = 1024;

/// One start-to-stop lifetime of a directory observer
pub struct WatchSession {
    paths: SessionPaths,
    extensions: Vec<String>,
    extractor: Arc<IdentifierExtractor>,
    resolver: Arc<MetadataResolver>,
    status: StatusSender,
    state: SessionState,
    cancel_token: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl WatchSession {
    /// Build a session; the output layout is fixed here, once
    pub fn new(
        input: &Path,
        output: &Path,
        extensions: Vec<String>,
        extractor: Arc<IdentifierExtractor>,
        resolver: Arc<MetadataResolver>,
        status: StatusSender,
        clock: &dyn Clock,
    ) -> Self {
        Self {
            paths: SessionPaths::resolve(input, output, clock),
            extensions,
            extractor,
            resolver,
            status,
            state: SessionState::Idle,
            cancel_token: CancellationToken::new(),
            worker: None,
        }
    }

    /// Validated session wired to the external tools and HTTP providers
    pub fn from_config(config: &WatchConfig, status: StatusSender, clock: &dyn Clock) -> SessionResult<Self> {
        let (input, output) = config.validate()?;
        let extractor = IdentifierExtractor::from_config(config);
        let resolver = MetadataResolver::from_config(&config.providers)?;

        Ok(Self::new(
            &input,
            &output,
            config.extensions.clone(),
            Arc::new(extractor),
            Arc::new(resolver),
            status,
            clock,
        ))
    }

    pub fn paths(&self) -> &SessionPaths {
        &self.paths
    }

    /// Current lifecycle state
    ///
    /// A worker that ended on its own after a session-fatal error reports
    /// Stopped right away; `stop()` then only reaps it.
    pub fn state(&self) -> SessionState {
        match &self.worker {
            Some(worker) if self.state == SessionState::Watching && worker.is_finished() => {
                SessionState::Stopped
            }
            _ => self.state,
        }
    }

    /// Whether the worker has exited on its own (fatal error) or been joined
    pub fn is_finished(&self) -> bool {
        match &self.worker {
            Some(worker) => worker.is_finished(),
            None => self.state.is_terminal(),
        }
    }

    /// Prepare directories, register the observer and spawn the worker
    pub async fn start(&mut self) -> SessionResult<()> {
        if !self.state.can_start() {
            warn!(state = %self.state, "Start requested on a session that is not idle");
            return Err(SessionError::AlreadyStarted(self.state));
        }

        self.status.info(format!(
            "Watching {} files in {}.",
            self.extensions.join(", "),
            self.paths.input.display()
        ));

        let placer = FilePlacer::new(&self.paths);
        let handler = EventHandler::new(
            Arc::clone(&self.extractor),
            Arc::clone(&self.resolver),
            placer.clone(),
            self.status.clone(),
            &self.extensions,
        );

        let (watcher, events) = match self.register(&placer).await {
            Ok(registered) => registered,
            Err(e) => {
                self.state = SessionState::Stopped;
                placer.remove_empty_dirs().await;
                self.status.error(format!("Cannot start observer: {}", e));
                self.status.completed(END_MESSAGE);
                return Err(e);
            }
        };

        // Events arriving from here on are buffered until the worker runs
        self.status.info("Start Observer.");
        info!(
            input = %self.paths.input.display(),
            output = %self.paths.output.display(),
            extensions = ?self.extensions,
            "Watch session started"
        );

        let worker = tokio::spawn(run_worker(
            watcher,
            events,
            ArrivalFilter::new(&self.paths.input),
            Arc::new(handler),
            placer,
            self.status.clone(),
            self.cancel_token.clone(),
        ));

        self.worker = Some(worker);
        self.state = SessionState::Watching;
        Ok(())
    }

    async fn register(&self, placer: &FilePlacer) -> SessionResult<(RecommendedWatcher, WatchEvents)> {
        placer.prepare().await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Receiver gone means the worker already finished
            let _ = tx.send(res);
        })?;
        watcher.watch(&self.paths.input, RecursiveMode::NonRecursive)?;

        Ok((watcher, rx))
    }

    /// Request shutdown and wait for the worker to finish tearing down
    ///
    /// After a fatal self-exit this joins the finished worker and returns Ok
    /// without a second COMPLETED message.
    pub async fn stop(&mut self) -> SessionResult<()> {
        if !self.state.can_stop() {
            warn!(state = %self.state, "Observer is not running");
            return Err(SessionError::NotRunning(self.state));
        }

        debug!("Stopping watch session");
        self.cancel_token.cancel();
        self.state = SessionState::Stopped;

        if let Some(worker) = self.worker.take() {
            worker.await.map_err(|e| SessionError::Join(e.to_string()))?;
        }

        info!(input = %self.paths.input.display(), "Watch session stopped");
        Ok(())
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        // Lets a still-running worker tear down on its own
        if self.worker.is_some() {
            self.cancel_token.cancel();
        }
    }
}

/// Worker task: dispatch until cancelled or fatal, then tear down
async fn run_worker(
    watcher: RecommendedWatcher,
    events: WatchEvents,
    filter: ArrivalFilter,
    sink: Arc<dyn FileEventSink>,
    placer: FilePlacer,
    status: StatusSender,
    cancel_token: CancellationToken,
) {
    if let Err(e) = dispatch_loop(events, filter, sink.as_ref(), &cancel_token).await {
        error!(error = %e, "Stopping observer after fatal error");
    }

    drop(watcher);
    placer.remove_empty_dirs().await;
    status.completed(END_MESSAGE);
}

async fn dispatch_loop(
    mut events: WatchEvents,
    mut filter: ArrivalFilter,
    sink: &dyn FileEventSink,
    cancel_token: &CancellationToken,
) -> Result<(), HandlerError> {
    loop {
        tokio::select! {
            biased;

            _ = cancel_token.cancelled() => {
                debug!("Stop requested, leaving dispatch loop");
                return Ok(());
            }

            received = events.recv() => {
                let Some(result) = received else {
                    warn!("Observer channel closed");
                    return Ok(());
                };

                match result {
                    Ok(event) => dispatch(sink, filter.arrivals(event)).await?,
                    Err(e) => warn!(error = %e, "Observer reported an error"),
                }
            }
        }
    }
}

/// Picks out files that newly appeared in the input directory
///
/// inotify reports a rename inside the watched directory as `From` and `To`
/// halves sharing a tracker, followed by `Both`. A move in from elsewhere
/// only produces a `To` with no matching `From`.
struct ArrivalFilter {
    input: PathBuf,
    renamed_from: HashSet<usize>,
}

impl ArrivalFilter {
    fn new(input: &Path) -> Self {
        Self {
            input: input.to_path_buf(),
            renamed_from: HashSet::new(),
        }
    }

    fn arrivals(&mut self, event: Event) -> Vec<PathBuf> {
        match event.kind {
            EventKind::Create(CreateKind::Folder) => Vec::new(),
            EventKind::Create(_) => event.paths,
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                if let Some(tracker) = event.tracker() {
                    if self.renamed_from.len() >= MAX_PENDING_RENAMES {
                        self.renamed_from.clear();
                    }
                    self.renamed_from.insert(tracker);
                }
                Vec::new()
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => match event.tracker() {
                Some(tracker) if self.renamed_from.remove(&tracker) => Vec::new(),
                _ => event.paths,
            },
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
                [from, to] if from.parent() != Some(self.input.as_path()) => vec![to.clone()],
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }
}

/// Forward matching regular files to the sink
async fn dispatch(sink: &dyn FileEventSink, paths: Vec<PathBuf>) -> Result<(), HandlerError> {
    for path in &paths {
        // Gone already (e.g. moved on by the placer) or not a file
        if !path.is_file() || !sink.accepts(path) {
            continue;
        }
        sink.on_file_created(path).await?;
    }

    Ok(())
}
