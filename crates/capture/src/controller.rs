//! Capture controller
//!
//! Owns the active transport, the capture poll task and the background
//! tablet monitor. State lives behind a tokio mutex that is never held across
//! a transport call; every write that follows an await first checks that the
//! controller is still mounted, that no newer `connect` has started and that
//! the transport it called is still the active one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use padsign_config::CaptureConfig;
use padsign_ipc::{
    CaptureSnapshot, CaptureStatus, ConnectionState, ConnectionType, SignatureResult,
};
use padsign_transport::{SharedCanvas, SignatureTransport};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{CaptureError, TransportSet};

const NO_SERVICE_ERROR: &str = "no signature pad service responded";

struct ControllerState {
    connection_type: ConnectionType,
    connection_state: ConnectionState,
    capture_status: CaptureStatus,
    tablet_connected: bool,
    model: Option<String>,
    point_count: u32,
    last_error: Option<String>,
    consecutive_poll_failures: u32,
    active: Option<Arc<dyn SignatureTransport>>,
}

impl ControllerState {
    fn new() -> Self {
        Self {
            connection_type: ConnectionType::None,
            connection_state: ConnectionState::Detecting,
            capture_status: CaptureStatus::Idle,
            tablet_connected: false,
            model: None,
            point_count: 0,
            last_error: None,
            consecutive_poll_failures: 0,
            active: None,
        }
    }

    /// Physical pad transport in a healthy state
    fn is_connected(&self) -> bool {
        self.connection_type.is_hardware() && self.connection_state == ConnectionState::Connected
    }

    fn can_capture(&self) -> bool {
        match self.connection_type {
            ConnectionType::Canvas => true,
            ConnectionType::LocalService | ConnectionType::LegacyBridge => self.is_connected(),
            ConnectionType::None => false,
        }
    }

    fn is_capturing(&self) -> bool {
        self.capture_status == CaptureStatus::Capturing
    }

    fn snapshot(&self) -> CaptureSnapshot {
        CaptureSnapshot {
            connection_type: self.connection_type,
            connection_state: self.connection_state,
            is_connected: self.is_connected(),
            can_capture: self.can_capture(),
            is_capturing: self.is_capturing(),
            capture_status: self.capture_status,
            tablet_connected: self.tablet_connected,
            model: self.model.clone(),
            point_count: self.point_count,
            last_error: self.last_error.clone(),
            consecutive_poll_failures: self.consecutive_poll_failures,
        }
    }
}

struct Inner {
    config: CaptureConfig,
    transports: TransportSet,
    state: Mutex<ControllerState>,
    poller: Mutex<Option<JoinHandle<()>>>,
    monitor: Mutex<Option<JoinHandle<()>>>,
    /// Bumped by every `connect`; only the latest attempt may commit
    attempt: AtomicU64,
    mounted: AtomicBool,
    updates: watch::Sender<CaptureSnapshot>,
}

impl Inner {
    fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    fn is_current(&self, attempt: u64) -> bool {
        self.is_mounted() && self.attempt.load(Ordering::SeqCst) == attempt
    }

    /// `transport` is still the active one and no newer `connect` has run
    fn still_active(
        &self,
        state: &ControllerState,
        attempt: u64,
        transport: &Arc<dyn SignatureTransport>,
    ) -> bool {
        self.is_current(attempt)
            && state
                .active
                .as_ref()
                .is_some_and(|active| Arc::ptr_eq(active, transport))
    }

    fn publish(&self, state: &ControllerState) {
        self.updates.send_replace(state.snapshot());
    }
}

/// Single capture contract over whichever transport is live.
#[derive(Clone)]
pub struct CaptureController {
    inner: Arc<Inner>,
}

impl CaptureController {
    pub fn new(config: CaptureConfig, transports: TransportSet) -> Self {
        let state = ControllerState::new();
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            inner: Arc::new(Inner {
                config,
                transports,
                state: Mutex::new(state),
                poller: Mutex::new(None),
                monitor: Mutex::new(None),
                attempt: AtomicU64::new(0),
                mounted: AtomicBool::new(true),
                updates,
            }),
        }
    }

    /// Controller over the default transports, drawing on `canvas` as fallback
    pub fn from_config(config: CaptureConfig, canvas: SharedCanvas) -> Result<Self, CaptureError> {
        let transports = TransportSet::from_config(&config, canvas)?;
        Ok(Self::new(config, transports))
    }

    pub async fn snapshot(&self) -> CaptureSnapshot {
        self.inner.state.lock().await.snapshot()
    }

    /// Receive a snapshot after every state change
    pub fn subscribe(&self) -> watch::Receiver<CaptureSnapshot> {
        self.inner.updates.subscribe()
    }

    /// Detect the best transport. Never fails: with no pad reachable the
    /// controller falls back to the canvas (or `Error` when the fallback is
    /// disabled). A newer call supersedes this one.
    pub async fn connect(&self) -> CaptureSnapshot {
        let inner = &self.inner;
        let attempt = inner.attempt.fetch_add(1, Ordering::SeqCst) + 1;

        if !inner.is_mounted() {
            return self.snapshot().await;
        }

        abort_task(&inner.monitor).await;
        abort_task(&inner.poller).await;
        {
            let mut state = inner.state.lock().await;
            *state = ControllerState::new();
            inner.publish(&state);
        }
        debug!("connect attempt {} started", attempt);

        let mut last_error = None;
        for transport in inner
            .transports
            .hardware_order(inner.config.prefer_local_service)
        {
            let kind = transport.kind();
            let probe = transport.probe().await;

            let mut state = inner.state.lock().await;
            if !inner.is_current(attempt) {
                debug!("Discarding stale connect attempt {}", attempt);
                return state.snapshot();
            }

            if probe.available {
                info!(
                    "Connected via {} (tablet connected: {}, model: {:?})",
                    kind.label(),
                    probe.tablet_connected,
                    probe.model
                );
                state.connection_type = kind;
                state.connection_state = ConnectionState::Connected;
                state.tablet_connected = probe.tablet_connected;
                state.model = probe.model;
                state.active = Some(transport);
                inner.publish(&state);
                let snapshot = state.snapshot();
                drop(state);

                self.spawn_monitor(attempt).await;
                return snapshot;
            }

            debug!("{} unavailable: {:?}", kind.label(), probe.error);
            if let Some(error) = probe.error {
                last_error = Some(format!("{}: {}", kind.label(), error));
            }
        }

        let mut state = inner.state.lock().await;
        if !inner.is_current(attempt) {
            debug!("Discarding stale connect attempt {}", attempt);
            return state.snapshot();
        }

        state.last_error = Some(last_error.unwrap_or_else(|| NO_SERVICE_ERROR.to_string()));
        if inner.config.canvas_fallback {
            info!("No signature pad found, using canvas capture");
            state.connection_type = ConnectionType::Canvas;
            state.connection_state = ConnectionState::Disconnected;
            state.active = Some(inner.transports.canvas.clone());
        } else {
            warn!("No signature pad found and canvas fallback is disabled");
            state.connection_state = ConnectionState::Error;
        }
        inner.publish(&state);
        state.snapshot()
    }

    /// Open a capture session on the active transport and start polling its
    /// point count.
    pub async fn start_capture(&self, message: Option<&str>) -> Result<(), CaptureError> {
        let inner = &self.inner;
        if !inner.is_mounted() {
            return Err(CaptureError::ShutDown);
        }

        let (transport, attempt) = {
            let state = inner.state.lock().await;
            if state.is_capturing() {
                return Err(CaptureError::AlreadyCapturing);
            }
            if !state.can_capture() {
                return Err(CaptureError::NotConnected);
            }
            let transport = state.active.clone().ok_or(CaptureError::NotConnected)?;
            (transport, inner.attempt.load(Ordering::SeqCst))
        };

        transport.start_capture(message).await?;

        {
            let mut state = inner.state.lock().await;
            if !inner.still_active(&state, attempt, &transport) {
                drop(state);
                warn!(
                    "{} was replaced while capture started, stopping it",
                    transport.kind().label()
                );
                if let Err(e) = transport.stop_capture().await {
                    debug!("Stopping abandoned capture failed: {}", e);
                }
                return Err(if inner.is_mounted() {
                    CaptureError::Superseded
                } else {
                    CaptureError::ShutDown
                });
            }
            state.capture_status = CaptureStatus::Capturing;
            state.point_count = 0;
            state.consecutive_poll_failures = 0;
            inner.publish(&state);
        }
        info!("Capture started on {}", transport.kind().label());

        self.spawn_poller().await;
        Ok(())
    }

    /// End the session and export the signature fitted to `width` x `height`.
    ///
    /// Polling stops before anything else, even when the transport call fails.
    pub async fn stop_capture(&self, width: f64, height: f64) -> Result<SignatureResult, CaptureError> {
        let inner = &self.inner;
        let (transport, attempt) = {
            let mut state = inner.state.lock().await;
            if state.is_capturing() {
                state.capture_status = CaptureStatus::Stopped;
                inner.publish(&state);
            }
            (state.active.clone(), inner.attempt.load(Ordering::SeqCst))
        };
        abort_task(&inner.poller).await;

        if !inner.is_mounted() {
            return Err(CaptureError::ShutDown);
        }
        let transport = transport.ok_or(CaptureError::NotConnected)?;

        transport.stop_capture().await?;
        let count = transport.try_point_count().await?;
        let result = if count == 0 {
            SignatureResult::empty()
        } else {
            SignatureResult::from_path(transport.svg_path(width, height).await?)
        };
        transport.clear_display().await;

        let mut state = inner.state.lock().await;
        if inner.still_active(&state, attempt, &transport) {
            state.point_count = count;
            inner.publish(&state);
        }
        info!(
            "Capture stopped: {} points, signature: {}",
            count, result.has_signature
        );
        Ok(result)
    }

    /// Discard the current signature on the active transport
    pub async fn clear_signature(&self) -> Result<(), CaptureError> {
        let inner = &self.inner;
        if !inner.is_mounted() {
            return Err(CaptureError::ShutDown);
        }
        let (transport, attempt) = {
            let state = inner.state.lock().await;
            let transport = state.active.clone().ok_or(CaptureError::NotConnected)?;
            (transport, inner.attempt.load(Ordering::SeqCst))
        };

        transport.clear_signature().await?;

        let mut state = inner.state.lock().await;
        if inner.still_active(&state, attempt, &transport) {
            state.point_count = 0;
            inner.publish(&state);
        }
        Ok(())
    }

    /// Current signature path, `""` when no transport is active
    pub async fn get_signature_svg(&self, width: f64, height: f64) -> Result<String, CaptureError> {
        let transport = self.inner.state.lock().await.active.clone();
        match transport {
            Some(transport) => Ok(transport.svg_path(width, height).await?),
            None => Ok(String::new()),
        }
    }

    /// Re-query pad connectivity. Canvas or no transport reads as `false`.
    pub async fn refresh_tablet_state(&self) -> bool {
        refresh_tablet(&self.inner).await
    }

    /// Tear down: later results become no-ops and all tasks stop
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        if !inner.mounted.swap(false, Ordering::SeqCst) {
            return;
        }
        abort_task(&inner.poller).await;
        abort_task(&inner.monitor).await;

        let active = inner.state.lock().await.active.take();
        if let Some(transport) = active {
            transport.disconnect().await;
        }
        info!("Capture controller shut down");
    }

    async fn spawn_poller(&self) {
        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.config.poll_interval();
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if !poll_once(&inner).await {
                    break;
                }
            }
        });
        replace_task(&self.inner.poller, handle).await;
    }

    /// Start the tablet monitor for connect `attempt`. The task ends once a
    /// newer attempt starts, even if it escaped that attempt's abort.
    async fn spawn_monitor(&self, attempt: u64) {
        if !self.inner.is_current(attempt) {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.config.state_check_interval();
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if !inner.is_current(attempt) {
                    break;
                }
                refresh_tablet(&inner).await;
            }
        });
        replace_task(&self.inner.monitor, handle).await;
    }
}

/// One point-count poll. Returns false once polling should end.
async fn poll_once(inner: &Inner) -> bool {
    let transport = {
        let state = inner.state.lock().await;
        if !inner.is_mounted() || !state.is_capturing() {
            return false;
        }
        match state.active.clone() {
            Some(transport) => transport,
            None => return false,
        }
    };

    let result = transport.try_point_count().await;

    let mut state = inner.state.lock().await;
    if !inner.is_mounted() || !state.is_capturing() {
        return false;
    }
    match result {
        Ok(count) => {
            let changed = count != state.point_count || state.consecutive_poll_failures != 0;
            state.point_count = count;
            state.consecutive_poll_failures = 0;
            if changed {
                inner.publish(&state);
            }
            true
        }
        Err(e) => {
            state.consecutive_poll_failures += 1;
            debug!(
                "Point count poll failed ({} in a row): {}",
                state.consecutive_poll_failures, e
            );
            let limit_reached = inner
                .config
                .poll_failure_threshold
                .is_some_and(|limit| state.consecutive_poll_failures >= limit);
            if limit_reached {
                warn!(
                    "{} consecutive poll failures, treating pad as disconnected",
                    state.consecutive_poll_failures
                );
                state.connection_state = ConnectionState::Disconnected;
                state.tablet_connected = false;
                state.capture_status = CaptureStatus::Stopped;
                state.last_error = Some(e.to_string());
            }
            inner.publish(&state);
            !limit_reached
        }
    }
}

async fn refresh_tablet(inner: &Inner) -> bool {
    let transport = match inner.state.lock().await.active.clone() {
        Some(transport) if transport.kind().is_hardware() => transport,
        _ => return false,
    };
    let kind = transport.kind();
    let connected = transport.tablet_state().await;

    let mut state = inner.state.lock().await;
    if inner.is_mounted() && state.connection_type == kind && state.tablet_connected != connected {
        if connected {
            info!("Signature pad reconnected");
        } else {
            warn!("Signature pad unplugged");
        }
        state.tablet_connected = connected;
        inner.publish(&state);
    }
    connected
}

async fn replace_task(slot: &Mutex<Option<JoinHandle<()>>>, handle: JoinHandle<()>) {
    if let Some(previous) = slot.lock().await.replace(handle) {
        previous.abort();
    }
}

/// Abort a task and wait until it is gone
async fn abort_task(slot: &Mutex<Option<JoinHandle<()>>>) {
    let handle = slot.lock().await.take();
    if let Some(handle) = handle {
        handle.abort();
        let _ = handle.await;
    }
}
