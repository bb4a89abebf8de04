//! Batch orchestration: one session per device, credential fallback,
//! bounded concurrency, cancellation.
//!
//! Devices are independent; nothing is shared across them except the
//! append-only outcome accumulator. A device's failure never aborts the
//! batch: the report always covers every input device exactly once.

mod report;

pub use report::{BatchCounts, BatchReport};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Semaphore, watch};
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep, timeout};

use crate::channel::Channel;
use crate::device::{Credential, DeviceDescriptor};
use crate::error::{Error, Result, TransportError};
use crate::prompt::PromptDetector;
use crate::session::{
    AuthAttempt, CommandPlan, SessionConfig, SessionOutcome, SessionRunner,
};

/// Create a linked cancellation source and handle.
///
/// The source stays with the caller; handles are cloned into the batch
/// and its sessions.
pub fn cancel_pair() -> (CancelSource, CancelHandle) {
    let (tx, rx) = watch::channel(false);
    (CancelSource { tx }, CancelHandle { rx })
}

/// The triggering side of a cancellation pair.
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

impl CancelSource {
    /// Signal cancellation to every handle.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    /// Create another handle linked to this source.
    pub fn handle(&self) -> CancelHandle {
        CancelHandle {
            rx: self.tx.subscribe(),
        }
    }
}

/// The observing side of a cancellation pair. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    rx: watch::Receiver<bool>,
}

impl CancelHandle {
    /// Whether cancellation has been signalled.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until cancellation is signalled.
    ///
    /// Pends forever if the source is dropped without cancelling; a
    /// dropped source means "never cancel", not "cancel now".
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Opens an authenticated interactive channel for a device/credential
/// pair. The production implementation is
/// [`SshConnector`](crate::transport::SshConnector); tests script their
/// own.
///
/// A rejected credential must surface as
/// [`TransportError::AuthenticationFailed`] so the orchestrator can tell
/// it apart from transport faults and fall back to the next credential.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect and return an attached interactive channel.
    async fn connect(
        &self,
        device: &DeviceDescriptor,
        credential: &Credential,
    ) -> Result<Box<dyn Channel>>;
}

/// Reachability check run before any session attempt. A failing device
/// is recorded `PrecheckFailed` and the session machinery never runs.
#[async_trait]
pub trait Precheck: Send + Sync {
    /// `Err(detail)` marks the device unreachable.
    async fn check(&self, device: &DeviceDescriptor) -> std::result::Result<(), String>;
}

/// TCP connect probe against the device's SSH port.
#[derive(Debug, Clone)]
pub struct TcpPrecheck {
    timeout: Duration,
}

impl TcpPrecheck {
    /// Create a probe with the given connect budget.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpPrecheck {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}

#[async_trait]
impl Precheck for TcpPrecheck {
    async fn check(&self, device: &DeviceDescriptor) -> std::result::Result<(), String> {
        let addr = (device.host.as_str(), device.port);
        match timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(format!("tcp connect to {}:{} failed: {err}", device.host, device.port)),
            Err(_) => Err(format!(
                "tcp connect to {}:{} timed out after {:?}",
                device.host, device.port, self.timeout
            )),
        }
    }
}

/// Runtime parameters for a batch run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Worker bound. `1` is the deterministic sequential mode.
    pub concurrency: usize,

    /// Session-level timeouts and pacing.
    pub session: SessionConfig,

    /// How long in-flight sessions get to wind down after cancellation
    /// before their tasks are aborted.
    pub grace_period: Duration,

    /// Optional whole-batch deadline; reaching it triggers cancellation.
    pub deadline: Option<Duration>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            session: SessionConfig::default(),
            grace_period: Duration::from_secs(5),
            deadline: None,
        }
    }
}

/// Iterates a device list and runs one session per device.
pub struct BatchRunner {
    connector: Arc<dyn Connector>,
    precheck: Option<Arc<dyn Precheck>>,
    detector: PromptDetector,
    config: BatchConfig,
}

impl BatchRunner {
    /// Create a runner over the given connector with default
    /// configuration and the IOS prompt rules.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            precheck: None,
            detector: PromptDetector::ios_default(),
            config: BatchConfig::default(),
        }
    }

    /// Enable a reachability pre-check.
    pub fn with_precheck(mut self, precheck: Arc<dyn Precheck>) -> Self {
        self.precheck = Some(precheck);
        self
    }

    /// Replace the prompt detector.
    pub fn with_detector(mut self, detector: PromptDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: BatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the worker bound.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Run the plan against every device and return the report.
    ///
    /// Never fails per-device: every input device gets exactly one
    /// outcome, whatever mix of successes and failures occurs.
    pub async fn run(
        &self,
        devices: Vec<DeviceDescriptor>,
        plan: Arc<CommandPlan>,
        cancel: CancelHandle,
    ) -> BatchReport {
        let total = devices.len();
        info!(
            "batch started: {total} devices, concurrency {}",
            self.config.concurrency
        );

        // Fold the optional deadline into the cancellation signal.
        let cancel = match self.config.deadline {
            Some(deadline) => {
                let (source, merged) = cancel_pair();
                let mut upstream = cancel;
                tokio::spawn(async move {
                    tokio::select! {
                        () = upstream.cancelled() => {}
                        () = sleep(deadline) => {
                            info!("batch deadline of {deadline:?} reached");
                        }
                    }
                    source.cancel();
                });
                merged
            }
            None => cancel,
        };

        let hosts: Vec<String> = devices.iter().map(|d| d.host.clone()).collect();
        let outcomes: Arc<Mutex<Vec<Option<SessionOutcome>>>> =
            Arc::new(Mutex::new((0..total).map(|_| None).collect()));
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));

        let mut tasks = JoinSet::new();
        for (index, device) in devices.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let outcomes = Arc::clone(&outcomes);
            let connector = Arc::clone(&self.connector);
            let precheck = self.precheck.clone();
            let detector = self.detector.clone();
            let session_config = self.config.session.clone();
            let plan = Arc::clone(&plan);
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    warn!("worker semaphore closed; skipping {}", device.host);
                    return;
                };
                let outcome = run_device(
                    connector,
                    precheck,
                    detector,
                    session_config,
                    &plan,
                    cancel,
                    device,
                )
                .await;
                outcomes.lock().await[index] = Some(outcome);
            });
        }

        // Drain tasks, honoring the grace period on cancellation.
        let cancelled = {
            let mut cancel_wait = cancel.clone();
            tokio::select! {
                () = drain(&mut tasks) => false,
                () = cancel_wait.cancelled() => true,
            }
        };
        if cancelled {
            info!(
                "cancellation requested; draining in-flight sessions for {:?}",
                self.config.grace_period
            );
            if timeout(self.config.grace_period, drain(&mut tasks))
                .await
                .is_err()
            {
                warn!("grace period elapsed; aborting remaining sessions");
                tasks.abort_all();
                while tasks.join_next().await.is_some() {}
            }
        }

        let slots = outcomes.lock().await;
        let collected = slots
            .iter()
            .zip(hosts)
            .map(|(slot, host)| match slot {
                Some(outcome) => outcome.clone(),
                None => SessionOutcome::cancelled(host, "batch cancelled before completion"),
            })
            .collect();

        let report = BatchReport::new(collected);
        info!("batch finished: {:?}", report.counts());
        report
    }
}

/// Join every task, logging panics rather than propagating them.
async fn drain(tasks: &mut JoinSet<()>) {
    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = joined {
            if !err.is_cancelled() {
                warn!("session task failed: {err}");
            }
        }
    }
}

/// One device: pre-check, credential fallback, a single session.
async fn run_device(
    connector: Arc<dyn Connector>,
    precheck: Option<Arc<dyn Precheck>>,
    detector: PromptDetector,
    session_config: SessionConfig,
    plan: &CommandPlan,
    cancel: CancelHandle,
    device: DeviceDescriptor,
) -> SessionOutcome {
    let started = Instant::now();
    let label = device.host.clone();

    if cancel.is_cancelled() {
        return SessionOutcome::cancelled(label, "batch cancelled before session start");
    }

    if let Some(precheck) = precheck {
        if let Err(detail) = precheck.check(&device).await {
            warn!("[{label}] precheck failed: {detail}");
            return SessionOutcome::precheck_failed(label, detail);
        }
    }

    let mut auth_attempts: Vec<AuthAttempt> = Vec::new();
    for credential in &device.credentials {
        if cancel.is_cancelled() {
            let mut outcome =
                SessionOutcome::cancelled(label, "batch cancelled during credential fallback");
            outcome.auth_attempts = auth_attempts;
            return outcome;
        }

        debug!("[{label}] connecting as '{}'", credential.username);
        match connector.connect(&device, credential).await {
            Ok(channel) => {
                let runner = SessionRunner::new(
                    channel,
                    detector.clone(),
                    session_config.clone(),
                    label.as_str(),
                )
                .with_enable_secret(device.enable_secret.clone())
                .with_cancel(cancel.clone());
                let mut outcome = runner.run(plan).await;
                outcome.auth_attempts = auth_attempts;
                // One session per device: whatever happened in it, other
                // credentials are never tried afterwards. A command
                // timeout is not a credential problem.
                return outcome;
            }
            Err(Error::Transport(TransportError::AuthenticationFailed { user })) => {
                info!("[{label}] authentication rejected for '{user}'");
                auth_attempts.push(AuthAttempt {
                    username: credential.username.clone(),
                    detail: format!("authentication rejected for '{user}'"),
                });
            }
            Err(other) => {
                warn!("[{label}] connect failed: {other}");
                return SessionOutcome::fault(
                    label,
                    auth_attempts,
                    other.to_string(),
                    started.elapsed(),
                );
            }
        }
    }

    SessionOutcome::auth_failed(label, auth_attempts, started.elapsed())
}
