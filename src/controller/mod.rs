//! Pipeline controller daemon.
//!
//! Architecture: channel-based actor. A single controller loop owns all
//! mutable state ([`state::ControllerState`]) and is the only place state
//! transitions happen. Per-connection tasks forward requests via an mpsc
//! channel. Change workers and save/clear jobs run as background tasks and
//! report back through [`post::UiPoster`]; the loop turns their reports
//! into state changes and UI events for subscribed connections.
//!
//! Socket at `$XDG_RUNTIME_DIR/iowall/iowall.sock` (directory mode 0700).
//! SIGTERM/SIGINT shut the loop down and remove the socket file.

mod connection;
mod handler;
pub mod post;
pub mod state;

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Mutex, mpsc, oneshot};

use connection::{ControllerCommand, DisconnectNotice};
use handler::{Dispatch, DispatchTable, Effect, Job, error_response};
use post::{LoopEvent, UiPoster};
use state::{ConnectionId, ControllerState};

pub use handler::Action;

use crate::ipc::protocol::{Message, Status, UiEvent};
use crate::wallpaper::applier::{CommandApplier, SystemApplier, WallpaperApplier};
use crate::wallpaper::cache::{self, CacheManager};
use crate::wallpaper::connectivity::{DEFAULT_PROBE_TIMEOUT, DEFAULT_PROBE_URL, HttpProbe};
use crate::wallpaper::display::{DisplayQuery, FixedDisplay, ResolutionProvider, X11Display};
use crate::wallpaper::fetcher::{DEFAULT_DOWNLOAD_TIMEOUT, Fetcher};
use crate::wallpaper::pipeline::Pipeline;
use crate::wallpaper::url::{DEFAULT_BASE_URL, UrlBuilder};
use crate::wallpaper::{Category, Resolution};

/// Controller startup/runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("$XDG_RUNTIME_DIR is not set")]
    NoRuntimeDir,
    #[error("cannot determine a pictures directory; pass --save-dir")]
    NoSaveDir,
    #[error("controller already running at {0}")]
    AlreadyRunning(PathBuf),
    #[error("failed to create directory {path}: {source}")]
    MkdirFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to bind socket {path}: {source}")]
    BindFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("HTTP client setup failed: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Daemon settings, filled from the command line.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub base_url: String,
    pub probe_url: String,
    /// `None` means `~/Pictures/IoWall`.
    pub save_dir: Option<PathBuf>,
    /// `None` means the system temp directory.
    pub artifact_dir: Option<PathBuf>,
    /// Skip the display query and use this resolution.
    pub resolution: Option<Resolution>,
    /// Shell template for applying; `None` uses the platform mechanism.
    pub apply_cmd: Option<String>,
    pub probe_timeout: Duration,
    pub download_timeout: Duration,
    /// Fetch a random wallpaper right after startup.
    pub initial_change: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            probe_url: DEFAULT_PROBE_URL.into(),
            save_dir: None,
            artifact_dir: None,
            resolution: None,
            apply_cmd: None,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            initial_change: true,
        }
    }
}

/// Run the controller daemon until SIGTERM or SIGINT.
///
/// Startup order: bind the socket, capture the display resolution, sweep
/// orphaned artifacts, then serve.
pub async fn run(config: DaemonConfig) -> Result<(), ControllerError> {
    let socket_path = socket_path().ok_or(ControllerError::NoRuntimeDir)?;
    let listener = bind_socket(&socket_path).await?;
    tracing::info!(path = %socket_path.display(), "controller listening");

    let display: Box<dyn DisplayQuery> = match config.resolution {
        Some(resolution) => Box::new(FixedDisplay(resolution)),
        None => Box::new(X11Display),
    };
    let resolution = tokio::task::spawn_blocking(move || ResolutionProvider::new(display).current())
        .await
        .unwrap_or(Resolution::FALLBACK);
    tracing::info!(%resolution, "display resolution captured");

    let pipeline = Arc::new(build_pipeline(&config)?);
    let (report, current) = {
        let cache = pipeline.cache().lock().await;
        (cache.sweep_orphans().await, cache.watch_current())
    };
    tracing::info!(
        removed = report.removed,
        failed = report.failed,
        "orphan sweep finished"
    );

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;
    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
        }
    };

    serve(
        listener,
        pipeline,
        ControllerState::new(resolution, current),
        config.initial_change,
        shutdown,
    )
    .await;

    if let Err(e) = std::fs::remove_file(&socket_path) {
        tracing::warn!(error = %e, path = %socket_path.display(), "failed to remove socket");
    }
    tracing::info!("controller stopped");
    Ok(())
}

fn build_pipeline(config: &DaemonConfig) -> Result<Pipeline, ControllerError> {
    let artifact_dir = config
        .artifact_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    let save_dir = match &config.save_dir {
        Some(dir) => dir.clone(),
        None => cache::default_save_dir().ok_or(ControllerError::NoSaveDir)?,
    };
    tracing::debug!(
        artifact_dir = %artifact_dir.display(),
        save_dir = %save_dir.display(),
        "cache directories"
    );

    let probe = HttpProbe::new(config.probe_url.clone(), config.probe_timeout)?;
    let fetcher = Fetcher::new(Arc::new(probe), artifact_dir.clone(), config.download_timeout)?;
    let applier: Arc<dyn WallpaperApplier> = match &config.apply_cmd {
        Some(template) => Arc::new(CommandApplier::new(template.clone())),
        None => Arc::new(SystemApplier),
    };

    Ok(Pipeline::new(
        UrlBuilder::new(config.base_url.clone()),
        fetcher,
        applier,
        Arc::new(Mutex::new(CacheManager::new(artifact_dir, save_dir))),
    ))
}

/// The controller loop. Returns when `shutdown` completes.
pub async fn serve(
    listener: UnixListener,
    pipeline: Arc<Pipeline>,
    mut state: ControllerState,
    initial_change: bool,
    shutdown: impl Future<Output = ()>,
) {
    let table = DispatchTable::new();
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<ControllerCommand>();
    let (disconnect_tx, mut disconnect_rx) = mpsc::unbounded_channel::<DisconnectNotice>();
    let (poster, mut loop_rx) = UiPoster::channel();

    // Per-connection channels for unsolicited event frames.
    let mut event_senders: HashMap<ConnectionId, mpsc::UnboundedSender<Message>> = HashMap::new();

    if initial_change && state.begin_change(Category::Random).is_ok() {
        start_change(&pipeline, &poster, &state, &event_senders, Category::Random);
    }

    tokio::pin!(shutdown);

    loop {
        // Reports drain before requests: a snapshot never predates a reply
        // the client has already seen.
        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            // -- Report from a background task --
            Some(event) = loop_rx.recv() => on_loop_event(&mut state, &event_senders, event),

            // -- Connection closed --
            Some(notice) = disconnect_rx.recv() => {
                let conn_id = notice.connection_id;
                event_senders.remove(&conn_id);
                state.remove_connection(conn_id);
                tracing::debug!(?conn_id, "connection cleaned up");
            }

            // -- Request from a connection task --
            Some(cmd) = cmd_rx.recv() => {
                match handler::handle_message(&mut state, &table, cmd.request, cmd.connection_id) {
                    Dispatch::Respond(response, effect) => {
                        let _ = cmd.response_tx.send(response);
                        match effect {
                            Some(Effect::StartChange(category)) => {
                                start_change(&pipeline, &poster, &state, &event_senders, category);
                            }
                            Some(Effect::Post(event)) => broadcast(&state, &event_senders, event),
                            None => {}
                        }
                    }
                    Dispatch::Defer(job) => spawn_job(&pipeline, &poster, job, cmd.response_tx),
                }
            }

            // -- New connection --
            result = listener.accept() => match result {
                Ok((stream, _addr)) => {
                    accept_connection(stream, &cmd_tx, &disconnect_tx, &mut event_senders);
                }
                Err(e) => tracing::warn!(error = %e, "accept failed"),
            },
        }
    }
}

fn accept_connection(
    stream: UnixStream,
    cmd_tx: &mpsc::UnboundedSender<ControllerCommand>,
    disconnect_tx: &mpsc::UnboundedSender<DisconnectNotice>,
    event_senders: &mut HashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
) {
    let conn_id = ConnectionId::new();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    event_senders.insert(conn_id, event_tx);

    connection::spawn_connection(
        stream,
        conn_id,
        cmd_tx.clone(),
        event_rx,
        disconnect_tx.clone(),
    );
    tracing::debug!(?conn_id, "accepted connection");
}

// -- Workers --

/// Spawn the worker for a change already admitted by `begin_change`.
fn start_change(
    pipeline: &Arc<Pipeline>,
    poster: &UiPoster,
    state: &ControllerState,
    event_senders: &HashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
    category: Category,
) {
    broadcast(state, event_senders, UiEvent::loading(category));

    let guard = poster.completion_guard(category);
    let pipeline = Arc::clone(pipeline);
    let resolution = state.resolution();
    tokio::spawn(async move {
        let outcome = pipeline.run(category, resolution).await;
        guard.finish(outcome);
    });
}

fn spawn_job(
    pipeline: &Arc<Pipeline>,
    poster: &UiPoster,
    job: Job,
    response_tx: oneshot::Sender<Message>,
) {
    let cache = Arc::clone(pipeline.cache());
    let poster = poster.clone();
    tokio::spawn(async move {
        let response = match job {
            Job::Save { id } => save_current(&cache, &poster, id).await,
            Job::Clear { id } => clear_cache(&cache, &poster, id).await,
        };
        let _ = response_tx.send(response);
    });
}

async fn save_current(cache: &Mutex<CacheManager>, poster: &UiPoster, id: u32) -> Message {
    let result = cache.lock().await.persist().await;
    match result {
        Ok(path) => {
            tracing::info!(path = %path.display(), "wallpaper saved");
            poster.notify("Wallpaper Saved", format!("Saved to: {}", path.display()));
            Message::Response {
                id,
                status: Status::Ok,
                error: None,
                notice: None,
                path: Some(path.display().to_string()),
                snapshot: None,
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "save failed");
            let (title, message) = e.alert();
            poster.alert(title, message);
            error_response(id, e.code())
        }
    }
}

async fn clear_cache(cache: &Mutex<CacheManager>, poster: &UiPoster, id: u32) -> Message {
    let result = cache.lock().await.clear().await;
    match result {
        Ok(path) => {
            tracing::info!(path = %path.display(), "cache cleared");
            poster.notify("Cache Cleared", "Temporary wallpaper file deleted.");
            Message::Response {
                id,
                status: Status::Ok,
                error: None,
                notice: None,
                path: Some(path.display().to_string()),
                snapshot: None,
            }
        }
        Err(e) if e.is_benign() => {
            tracing::info!("nothing to clear");
            let (title, message) = e.alert();
            poster.notify(title, message.clone());
            Message::Response {
                id,
                status: Status::Ok,
                error: None,
                notice: Some(message),
                path: None,
                snapshot: None,
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "clear cache failed");
            let (title, message) = e.alert();
            poster.alert(title, message);
            error_response(id, e.code())
        }
    }
}

// -- Loop-side reporting --

fn on_loop_event(
    state: &mut ControllerState,
    event_senders: &HashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
    event: LoopEvent,
) {
    match event {
        LoopEvent::ChangeFinished { category, outcome } => {
            match outcome {
                // The cache has already published the new artifact.
                Ok(info) => {
                    tracing::debug!(%category, path = %info.path.display(), "change finished");
                }
                Err(e) => {
                    tracing::error!(%category, code = e.code(), error = %e, "wallpaper change failed");
                    let (title, message) = e.alert();
                    broadcast(state, event_senders, UiEvent::alert(title, message));
                }
            }
            if state.finish_change().is_none() {
                tracing::warn!(%category, "change finished while idle");
            }
            broadcast(state, event_senders, UiEvent::Idle);
        }
        LoopEvent::Post(event) => broadcast(state, event_senders, event),
    }
}

/// Log `event` and send it to every subscribed connection.
fn broadcast(
    state: &ControllerState,
    event_senders: &HashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
    event: UiEvent,
) {
    match &event {
        UiEvent::Alert { title, message } => tracing::warn!(%title, %message, "alert"),
        UiEvent::Notify { title, message } => tracing::info!(%title, %message, "notification"),
        UiEvent::Loading { label, .. } => tracing::info!(%label, "loading"),
        UiEvent::Idle => tracing::debug!("idle"),
    }

    for conn_id in state.subscribers() {
        if let Some(tx) = event_senders.get(&conn_id)
            && tx
                .send(Message::Event {
                    id: 0,
                    event: event.clone(),
                })
                .is_err()
        {
            tracing::debug!(?conn_id, "subscriber gone");
        }
    }
}

// -- Socket setup --

/// `$XDG_RUNTIME_DIR/iowall/iowall.sock`, or `None` if the variable is
/// unset.
pub fn socket_path() -> Option<PathBuf> {
    let runtime_dir = std::env::var_os("XDG_RUNTIME_DIR")?;
    Some(PathBuf::from(runtime_dir).join("iowall").join("iowall.sock"))
}

/// Create the socket directory (mode 0700) and bind the listener.
///
/// On `EADDRINUSE` the existing socket is probed: a live peer means another
/// controller is running, otherwise the stale file is replaced.
async fn bind_socket(path: &Path) -> Result<UnixListener, ControllerError> {
    if let Some(parent) = path.parent() {
        let mkdir_failed = |source| ControllerError::MkdirFailed {
            path: parent.to_path_buf(),
            source,
        };
        std::fs::create_dir_all(parent).map_err(mkdir_failed)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))
                .map_err(mkdir_failed)?;
        }
    }

    let bind_failed = |source| ControllerError::BindFailed {
        path: path.to_path_buf(),
        source,
    };
    match UnixListener::bind(path) {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            if UnixStream::connect(path).await.is_ok() {
                return Err(ControllerError::AlreadyRunning(path.to_path_buf()));
            }
            tracing::info!(path = %path.display(), "removing stale socket");
            std::fs::remove_file(path).map_err(bind_failed)?;
            UnixListener::bind(path).map_err(bind_failed)
        }
        Err(e) => Err(bind_failed(e)),
    }
}
