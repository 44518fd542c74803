use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::{Instant, MissedTickBehavior};

use leadsync_clients::stores_from_config;
use leadsync_core::SyncConfig;
use leadsync_sync::{pipeline, CancelToken, SyncError, SyncOptions, SyncReport};

use crate::error::{io_err, DaemonError};
use crate::logging::{env_filter, init_tracing};
use crate::paths::{log_path, logs_dir, socket_path, state_root};
use crate::protocol::{DaemonRequest, DaemonResponse};

const ROTATION_INTERVAL: Duration = Duration::from_secs(30);

/// One reconciliation pass, executed on the blocking pool.
pub trait SyncRunner: Send + Sync + 'static {
    fn run_once(&self, cancel: CancelToken) -> Result<SyncReport, SyncError>;
}

impl<F> SyncRunner for F
where
    F: Fn(CancelToken) -> Result<SyncReport, SyncError> + Send + Sync + 'static,
{
    fn run_once(&self, cancel: CancelToken) -> Result<SyncReport, SyncError> {
        self(cancel)
    }
}

/// Runs against the configured sheet and board.
#[derive(Debug)]
pub struct RemoteSync {
    config: SyncConfig,
    options: SyncOptions,
}

impl RemoteSync {
    pub fn new(config: SyncConfig) -> Self {
        let options = SyncOptions::from_config(&config);
        Self { config, options }
    }
}

impl SyncRunner for RemoteSync {
    fn run_once(&self, cancel: CancelToken) -> Result<SyncReport, SyncError> {
        let (leads, tasks) = stores_from_config(&self.config);
        pipeline::run(
            leads,
            tasks,
            self.config.containers.clone(),
            &self.options,
            cancel,
        )
    }
}

struct SyncJob {
    source: &'static str,
    respond_to: Option<oneshot::Sender<Result<RunSummary, String>>>,
}

/// Counters of one finished run, as reported over the socket.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u128,
    pub cancelled: bool,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub status_synced: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Set when the run aborted before producing a report.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    fn from_report(
        source: &str,
        started_at: DateTime<Utc>,
        report: &SyncReport,
        duration: Duration,
    ) -> Self {
        Self {
            source: source.to_string(),
            started_at,
            duration_ms: duration.as_millis(),
            cancelled: report.cancelled,
            created: report.created,
            updated: report.updated,
            unchanged: report.unchanged,
            status_synced: report.status_synced,
            skipped: report.skipped,
            errors: report.errors,
            error: None,
        }
    }

    fn aborted(source: &str, started_at: DateTime<Utc>, message: &str, duration: Duration) -> Self {
        Self {
            source: source.to_string(),
            started_at,
            duration_ms: duration.as_millis(),
            cancelled: false,
            created: 0,
            updated: 0,
            unchanged: 0,
            status_synced: 0,
            skipped: 0,
            errors: 0,
            error: Some(message.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DaemonState {
    pub started_at: DateTime<Utc>,
    pub interval_secs: u64,
    pub runs: u64,
    pub in_flight: bool,
    pub last_run: Option<RunSummary>,
}

impl DaemonState {
    pub fn new(interval: Duration) -> Self {
        Self {
            started_at: Utc::now(),
            interval_secs: interval.as_secs(),
            runs: 0,
            in_flight: false,
            last_run: None,
        }
    }
}

/// Broadcast plus the cancel token of the in-flight run.
#[derive(Clone)]
struct Shutdown {
    tx: broadcast::Sender<()>,
    cancel: CancelToken,
}

impl Shutdown {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            tx,
            cancel: CancelToken::new(),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    fn trigger(&self) {
        self.cancel.cancel();
        let _ = self.tx.send(());
    }
}

/// Start the daemon for `config` and block the current thread until it exits.
pub fn start_blocking(home: &Path, config: SyncConfig, verbose: bool) -> Result<(), DaemonError> {
    ensure_runtime_dirs(home)?;
    let log_file = config.log_file.then(|| log_path(home));
    init_tracing(env_filter(verbose, &config.log_level), log_file.as_deref());

    let interval = Duration::from_secs(config.daemon.interval_secs);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(
        home.to_path_buf(),
        interval,
        Arc::new(RemoteSync::new(config)),
    ))
}

/// Run one blocking job with Ctrl-C wired to its cancel token.
pub fn run_interruptible<T, F>(job: F) -> Result<T, DaemonError>
where
    F: FnOnce(CancelToken) -> T + Send + 'static,
    T: Send + 'static,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(async move {
        let cancel = CancelToken::new();
        let interrupt = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupted, stopping after the current record");
                    cancel.cancel();
                }
            })
        };
        let result = tokio::task::spawn_blocking(move || job(cancel)).await;
        interrupt.abort();
        result.map_err(|err| DaemonError::Protocol(format!("sync task join error: {err}")))
    })
}

/// Run the daemon: ticker, sync processor, control socket, log rotation.
pub async fn run(
    home: PathBuf,
    interval: Duration,
    runner: Arc<dyn SyncRunner>,
) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;
    tracing::info!(
        interval_secs = interval.as_secs(),
        home = %state_root(&home).display(),
        "leadsync daemon starting",
    );

    let state = Arc::new(RwLock::new(DaemonState::new(interval)));
    let shutdown = Shutdown::new();

    // At most one scheduled run waits behind the current one.
    let (tick_tx, tick_rx) = mpsc::channel::<SyncJob>(1);
    let (sync_tx, sync_rx) = mpsc::channel::<SyncJob>(16);

    let ticker_handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let result = ticker_task(interval, tick_tx, shutdown.subscribe()).await;
            shutdown.trigger();
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let result = processor_task(
                runner,
                state,
                shutdown.cancel.clone(),
                tick_rx,
                sync_rx,
                shutdown.subscribe(),
            )
            .await;
            shutdown.trigger();
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown.clone();
        let home = home.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let result = socket_server_task(home, state, sync_tx, shutdown.clone()).await;
            shutdown.trigger();
            result
        })
    };

    let rotation_handle = {
        let shutdown = shutdown.clone();
        let home = home.clone();
        tokio::spawn(async move {
            let result = log_rotation_task(home, shutdown.subscribe()).await;
            shutdown.trigger();
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            shutdown.trigger();
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (ticker_result, processor_result, socket_result, rotation_result, signal_result) = tokio::join!(
        ticker_handle,
        processor_handle,
        socket_handle,
        rotation_handle,
        signal_handle
    );

    handle_join("ticker", ticker_result)?;
    handle_join("sync_processor", processor_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("log_rotation", rotation_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("leadsync daemon stopped");
    Ok(())
}

async fn ticker_task(
    interval: Duration,
    tick_tx: mpsc::Sender<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    // The first tick fires immediately: a run at startup.
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                let job = SyncJob { source: "schedule", respond_to: None };
                match tick_tx.try_send(job) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::debug!("scheduled sync still queued, skipping tick");
                    }
                    Err(TrySendError::Closed(_)) => break,
                }
            }
        }
    }
    Ok(())
}

async fn processor_task(
    runner: Arc<dyn SyncRunner>,
    state: Arc<RwLock<DaemonState>>,
    cancel: CancelToken,
    mut tick_rx: mpsc::Receiver<SyncJob>,
    mut sync_rx: mpsc::Receiver<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        let job = tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            Some(job) = sync_rx.recv() => job,
            Some(job) = tick_rx.recv() => job,
            else => break,
        };

        let outcome = execute_job(&runner, &state, &cancel, job.source).await;
        if let Some(respond_to) = job.respond_to {
            let _ = respond_to.send(outcome);
        }
    }
    Ok(())
}

async fn execute_job(
    runner: &Arc<dyn SyncRunner>,
    state: &Arc<RwLock<DaemonState>>,
    cancel: &CancelToken,
    source: &'static str,
) -> Result<RunSummary, String> {
    let started_at = Utc::now();
    let started = Instant::now();
    state.write().await.in_flight = true;

    let runner = runner.clone();
    let token = cancel.clone();
    let result = tokio::task::spawn_blocking(move || runner.run_once(token)).await;
    let duration = started.elapsed();

    let outcome = match result {
        Ok(Ok(report)) => Ok(RunSummary::from_report(
            source, started_at, &report, duration,
        )),
        Ok(Err(err)) => Err(err.to_string()),
        Err(err) => Err(format!("sync task join error: {err}")),
    };

    let summary = match &outcome {
        Ok(summary) => {
            tracing::info!(
                source,
                created = summary.created,
                updated = summary.updated,
                status_synced = summary.status_synced,
                skipped = summary.skipped,
                errors = summary.errors,
                cancelled = summary.cancelled,
                duration_ms = summary.duration_ms,
                "sync run completed",
            );
            summary.clone()
        }
        Err(message) => {
            tracing::error!(source, error = %message, "sync run aborted");
            RunSummary::aborted(source, started_at, message, duration)
        }
    };

    let mut guard = state.write().await;
    guard.in_flight = false;
    guard.runs += 1;
    guard.last_run = Some(summary);
    outcome
}

async fn socket_server_task(
    home: PathBuf,
    state: Arc<RwLock<DaemonState>>,
    sync_tx: mpsc::Sender<SyncJob>,
    shutdown: Shutdown,
) -> Result<(), DaemonError> {
    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    let mut shutdown_rx = shutdown.subscribe();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let home = home.clone();
                let state = state.clone();
                let sync_tx = sync_tx.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, home, state, sync_tx, shutdown).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    home: PathBuf,
    state: Arc<RwLock<DaemonState>>,
    sync_tx: mpsc::Sender<SyncJob>,
    shutdown: Shutdown,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        match request.cmd.as_str() {
            "status" => {
                let payload = build_status_payload(&home, &state).await;
                write_response(&mut writer, &DaemonResponse::ok(payload)).await?;
            }
            "sync" => {
                let response = match enqueue_sync(&sync_tx, "socket").await {
                    Ok(summary) => DaemonResponse::ok(json!(summary)),
                    Err(err) => DaemonResponse::error(err.to_string()),
                };
                write_response(&mut writer, &response).await?;
            }
            "stop" => {
                write_response(&mut writer, &DaemonResponse::ok(json!({ "stopping": true })))
                    .await?;
                tracing::info!("stop requested over socket");
                shutdown.trigger();
                break;
            }
            other => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("unknown command '{other}'")),
                )
                .await?;
            }
        }
    }

    Ok(())
}

async fn build_status_payload(home: &Path, state: &Arc<RwLock<DaemonState>>) -> Value {
    let snapshot = state.read().await.clone();
    json!({
        "running": true,
        "pid": std::process::id(),
        "started_at": snapshot.started_at,
        "interval_secs": snapshot.interval_secs,
        "runs": snapshot.runs,
        "in_flight": snapshot.in_flight,
        "last_run": snapshot.last_run,
        "socket": socket_path(home).display().to_string(),
        "log_file": log_path(home).display().to_string(),
    })
}

async fn enqueue_sync(
    sync_tx: &mpsc::Sender<SyncJob>,
    source: &'static str,
) -> Result<RunSummary, DaemonError> {
    let (tx, rx) = oneshot::channel();
    sync_tx
        .send(SyncJob {
            source,
            respond_to: Some(tx),
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync queue"))?;

    let outcome = rx
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync response"))?;
    outcome.map_err(DaemonError::Protocol)
}

async fn log_rotation_task(
    home: PathBuf,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut interval = tokio::time::interval(ROTATION_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                let home = home.clone();
                tokio::task::spawn_blocking(move || crate::log_rotation::rotate_logs(&home))
                    .await
                    .ok();
            }
        }
    }
    Ok(())
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let logs = logs_dir(home);
    if !logs.exists() {
        fs::create_dir_all(&logs).map_err(|e| io_err(&logs, e))?;
    }
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let mut payload = serde_json::to_vec(response)?;
    payload.push(b'\n');
    writer
        .write_all(&payload)
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use leadsync_core::TaskId;
    use leadsync_sync::{Flow, Outcome};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    fn one_created(_cancel: CancelToken) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::new(false);
        report.record(
            Flow::LeadsToTasks,
            "L1",
            Outcome::Created {
                task_id: Some(TaskId::from("task-1")),
            },
        );
        report.finish();
        Ok(report)
    }

    fn spawn_processor(
        runner: Arc<dyn SyncRunner>,
        state: Arc<RwLock<DaemonState>>,
        shutdown: &Shutdown,
    ) -> (
        mpsc::Sender<SyncJob>,
        mpsc::Sender<SyncJob>,
        tokio::task::JoinHandle<Result<(), DaemonError>>,
    ) {
        let (tick_tx, tick_rx) = mpsc::channel(1);
        let (sync_tx, sync_rx) = mpsc::channel(4);
        let handle = tokio::spawn(processor_task(
            runner,
            state,
            shutdown.cancel.clone(),
            tick_rx,
            sync_rx,
            shutdown.subscribe(),
        ));
        (tick_tx, sync_tx, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_fires_at_start_and_every_interval() {
        let interval = Duration::from_secs(300);
        let (tick_tx, mut tick_rx) = mpsc::channel(1);
        let shutdown = Shutdown::new();
        let started = Instant::now();
        let handle = tokio::spawn(ticker_task(interval, tick_tx, shutdown.subscribe()));

        for _ in 0..3 {
            let job = tick_rx.recv().await.expect("scheduled job");
            assert_eq!(job.source, "schedule");
            assert!(job.respond_to.is_none());
        }
        let elapsed = started.elapsed();
        assert!(elapsed >= interval * 2 && elapsed < interval * 3, "{elapsed:?}");

        shutdown.trigger();
        handle.await.expect("join").expect("ticker");
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_do_not_pile_up_behind_a_slow_run() {
        let interval = Duration::from_secs(60);
        let (tick_tx, mut tick_rx) = mpsc::channel(1);
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(ticker_task(interval, tick_tx, shutdown.subscribe()));

        tokio::time::sleep(interval * 5 + Duration::from_secs(1)).await;
        shutdown.trigger();
        handle.await.expect("join").expect("ticker");

        assert!(tick_rx.try_recv().is_ok());
        assert!(tick_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn processor_answers_requests_and_records_the_last_run() {
        let state = Arc::new(RwLock::new(DaemonState::new(Duration::from_secs(60))));
        let shutdown = Shutdown::new();
        let (_tick_tx, sync_tx, handle) =
            spawn_processor(Arc::new(one_created), state.clone(), &shutdown);

        let summary = enqueue_sync(&sync_tx, "socket").await.expect("summary");
        assert_eq!(summary.source, "socket");
        assert_eq!(summary.created, 1);
        assert!(summary.error.is_none());

        {
            let state = state.read().await;
            assert_eq!(state.runs, 1);
            assert!(!state.in_flight);
            assert_eq!(state.last_run.as_ref().map(|r| r.created), Some(1));
        }

        shutdown.trigger();
        handle.await.expect("join").expect("processor");
    }

    #[tokio::test]
    async fn aborted_run_is_reported_and_remembered() {
        let state = Arc::new(RwLock::new(DaemonState::new(Duration::from_secs(60))));
        let shutdown = Shutdown::new();
        let runner = |_cancel: CancelToken| -> Result<SyncReport, SyncError> {
            Err(SyncError::Contract(
                "lead id L1 appears in rows 2 and 3".to_string(),
            ))
        };
        let (_tick_tx, sync_tx, handle) = spawn_processor(Arc::new(runner), state.clone(), &shutdown);

        let err = enqueue_sync(&sync_tx, "socket").await.unwrap_err();
        assert!(err.to_string().contains("rows 2 and 3"), "{err}");

        let last = state.read().await.last_run.clone().expect("last run");
        assert!(last.error.as_deref().unwrap_or_default().contains("rows 2 and 3"));
        assert_eq!(last.created, 0);

        shutdown.trigger();
        handle.await.expect("join").expect("processor");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_cancels_the_run_in_flight() {
        let state = Arc::new(RwLock::new(DaemonState::new(Duration::from_secs(60))));
        let shutdown = Shutdown::new();
        let runner = |cancel: CancelToken| -> Result<SyncReport, SyncError> {
            while !cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(5));
            }
            let mut report = SyncReport::new(false);
            report.cancelled = true;
            Ok(report)
        };
        let (_tick_tx, sync_tx, handle) = spawn_processor(Arc::new(runner), state.clone(), &shutdown);

        let request = tokio::spawn(async move { enqueue_sync(&sync_tx, "socket").await });
        while !state.read().await.in_flight {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        shutdown.trigger();

        let summary = request.await.expect("join").expect("summary");
        assert!(summary.cancelled);
        handle.await.expect("join").expect("processor");
    }

    #[tokio::test]
    async fn socket_client_rejects_bad_lines_and_unknown_commands() {
        let home = tempfile::TempDir::new().expect("home");
        let state = Arc::new(RwLock::new(DaemonState::new(Duration::from_secs(60))));
        let (sync_tx, _sync_rx) = mpsc::channel(1);
        let (client, server) = UnixStream::pair().expect("socket pair");
        let server_task = tokio::spawn(handle_socket_client(
            server,
            home.path().to_path_buf(),
            state,
            sync_tx,
            Shutdown::new(),
        ));

        let (reader, mut writer) = client.into_split();
        let mut lines = BufReader::new(reader).lines();
        writer.write_all(b"not json\n{\"cmd\":\"launch\"}\n").await.unwrap();

        let first: DaemonResponse =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert!(!first.ok);
        assert!(first.error.unwrap().starts_with("invalid request JSON"));

        let second: DaemonResponse =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(second.error.as_deref(), Some("unknown command 'launch'"));

        drop(writer);
        server_task.await.expect("join").expect("client handler");
    }

    #[tokio::test]
    async fn status_payload_reports_runs_and_paths() {
        let home = tempfile::TempDir::new().expect("home");
        let state = Arc::new(RwLock::new(DaemonState::new(Duration::from_secs(300))));

        let payload = build_status_payload(home.path(), &state).await;
        assert_eq!(payload["running"], json!(true));
        assert_eq!(payload["interval_secs"], json!(300));
        assert_eq!(payload["runs"], json!(0));
        assert!(payload["last_run"].is_null());
        assert!(payload["socket"]
            .as_str()
            .unwrap()
            .ends_with(".leadsync/daemon.sock"));

        {
            let mut guard = state.write().await;
            guard.runs = 2;
            let report = one_created(CancelToken::new()).unwrap();
            guard.last_run = Some(RunSummary::from_report(
                "schedule",
                Utc::now(),
                &report,
                Duration::from_millis(40),
            ));
        }
        let payload = build_status_payload(home.path(), &state).await;
        assert_eq!(payload["runs"], json!(2));
        assert_eq!(payload["last_run"]["source"], json!("schedule"));
        assert_eq!(payload["last_run"]["created"], json!(1));
        assert!(payload["last_run"].get("error").is_none());
    }

    #[test]
    fn interruptible_job_gets_a_live_token() {
        let value = run_interruptible(|cancel| {
            assert!(!cancel.is_cancelled());
            7
        })
        .expect("runtime");
        assert_eq!(value, 7);
    }
}
