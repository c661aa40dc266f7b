//! Legacy bridge client
//!
//! Talks to a local bridge process over WebSocket using JSON
//! `{id, command, params}` requests answered by `{id, result|error}`. Requests
//! are correlated by a per-client monotonically increasing id, so responses
//! may arrive in any order. When no bridge is listening, an in-process
//! [`LegacyPlugin`] is used instead if one was provided.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use padsign_config::{BridgeConfig, CaptureConfig};
use padsign_ink::sig_string_to_svg_path;
use padsign_ipc::{
    BridgeCommand, BridgeRequest, BridgeResponse, ConnectionType, LCD_DEST_FOREGROUND,
    LCD_MODE_CLEAR, LCD_MODE_COMPLEMENT, ProbeResult,
};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::plugin::{LegacyPlugin, call_plugin};
use crate::{LCD_HEIGHT, LCD_WIDTH, SignatureTransport, TransportError, scalar_to_i64};

type Reply = oneshot::Sender<Result<Value, TransportError>>;

/// Pending requests keyed by id. The `closed` flag lives under the same lock
/// so a request can never be registered after the socket drained the map.
#[derive(Default)]
struct PendingRequests {
    closed: bool,
    replies: HashMap<u64, Reply>,
}

impl PendingRequests {
    fn close_all(&mut self) -> usize {
        self.closed = true;
        let count = self.replies.len();
        for (_, reply) in self.replies.drain() {
            let _ = reply.send(Err(TransportError::BridgeClosed));
        }
        count
    }
}

/// An open WebSocket to the bridge process.
struct BridgeSocket {
    outbound: mpsc::UnboundedSender<Message>,
    pending: Arc<Mutex<PendingRequests>>,
    open: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl BridgeSocket {
    async fn connect(url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let (ws_stream, _) = tokio::time::timeout(timeout, connect_async(url))
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let (mut write, mut read) = ws_stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let pending = Arc::new(Mutex::new(PendingRequests::default()));
        let open = Arc::new(AtomicBool::new(true));

        let writer_pending = pending.clone();
        let writer_open = open.clone();
        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if let Err(e) = write.send(message).await {
                    warn!("Bridge write failed: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
            writer_open.store(false, Ordering::SeqCst);
            lock_pending(&writer_pending).close_all();
        });

        let reader_pending = pending.clone();
        let reader_open = open.clone();
        let reader = tokio::spawn(async move {
            while let Some(message) = read.next().await {
                match message {
                    Ok(Message::Text(text)) => route_response(&reader_pending, text.as_str()),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Bridge read failed: {}", e);
                        break;
                    }
                }
            }
            reader_open.store(false, Ordering::SeqCst);
            let rejected = lock_pending(&reader_pending).close_all();
            if rejected > 0 {
                warn!("Bridge closed with {} requests in flight", rejected);
            } else {
                debug!("Bridge socket closed");
            }
        });

        Ok(Self {
            outbound,
            pending,
            open,
            reader,
            writer,
        })
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn request(
        &self,
        id: u64,
        command: BridgeCommand,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        let payload = BridgeRequest::new(id, command).to_json()?;
        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let mut pending = lock_pending(&self.pending);
            if pending.closed {
                return Err(TransportError::BridgeClosed);
            }
            pending.replies.insert(id, reply_tx);
        }

        if self.outbound.send(Message::Text(payload.into())).is_err() {
            lock_pending(&self.pending).replies.remove(&id);
            return Err(TransportError::BridgeClosed);
        }

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TransportError::BridgeClosed),
            Err(_) => {
                lock_pending(&self.pending).replies.remove(&id);
                Err(TransportError::Timeout(timeout))
            }
        }
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.reader.abort();
        self.writer.abort();
        lock_pending(&self.pending).close_all();
    }
}

fn lock_pending(pending: &Mutex<PendingRequests>) -> std::sync::MutexGuard<'_, PendingRequests> {
    pending.lock().unwrap_or_else(|e| e.into_inner())
}

fn route_response(pending: &Mutex<PendingRequests>, text: &str) {
    let response = match BridgeResponse::from_json(text) {
        Ok(response) => response,
        Err(e) => {
            warn!("Ignoring malformed bridge message: {}", e);
            return;
        }
    };
    let id = response.id;
    let Some(reply) = lock_pending(pending).replies.remove(&id) else {
        debug!("Ignoring bridge response for unknown request {}", id);
        return;
    };
    let _ = reply.send(response.into_result().map_err(TransportError::Bridge));
}

/// Active route to the pad.
#[derive(Clone)]
enum BridgeLink {
    Socket(Arc<BridgeSocket>),
    Plugin(Arc<dyn LegacyPlugin>),
}

pub struct LegacyBridgeClient {
    config: BridgeConfig,
    probe_timeout: Duration,
    next_id: AtomicU64,
    link: tokio::sync::Mutex<Option<BridgeLink>>,
    plugin: Option<Arc<dyn LegacyPlugin>>,
}

impl LegacyBridgeClient {
    pub fn new(config: &CaptureConfig) -> Self {
        Self::with_settings(config.bridge.clone(), config.probe_timeout(), None)
    }

    pub fn with_settings(
        config: BridgeConfig,
        probe_timeout: Duration,
        plugin: Option<Arc<dyn LegacyPlugin>>,
    ) -> Self {
        Self {
            config,
            probe_timeout,
            next_id: AtomicU64::new(1),
            link: tokio::sync::Mutex::new(None),
            plugin,
        }
    }

    /// Attach an in-process plugin used when the WebSocket bridge is absent
    pub fn with_plugin(mut self, plugin: Arc<dyn LegacyPlugin>) -> Self {
        self.plugin = Some(plugin);
        self
    }

    pub async fn is_socket_open(&self) -> bool {
        matches!(&*self.link.lock().await, Some(BridgeLink::Socket(s)) if s.is_open())
    }

    pub async fn is_using_plugin(&self) -> bool {
        matches!(&*self.link.lock().await, Some(BridgeLink::Plugin(_)))
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn current_link(&self) -> Option<BridgeLink> {
        let mut guard = self.link.lock().await;
        if let Some(BridgeLink::Socket(socket)) = guard.as_ref() {
            if !socket.is_open() {
                *guard = None;
            }
        }
        guard.clone()
    }

    async fn set_link(&self, link: Option<BridgeLink>) {
        let mut guard = self.link.lock().await;
        let previous = std::mem::replace(&mut *guard, link);
        if let Some(BridgeLink::Socket(socket)) = previous {
            // A repeat availability check hands the open socket back
            let kept = matches!(&*guard, Some(BridgeLink::Socket(current)) if Arc::ptr_eq(current, &socket));
            if !kept {
                socket.close();
            }
        }
    }

    async fn send_on(
        &self,
        link: &BridgeLink,
        command: BridgeCommand,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        match link {
            BridgeLink::Socket(socket) => {
                let id = self.next_request_id();
                debug!("Bridge request {} {}", id, command.name());
                socket.request(id, command, timeout).await
            }
            BridgeLink::Plugin(plugin) => call_plugin(plugin.clone(), command).await,
        }
    }

    async fn call(&self, command: BridgeCommand) -> Result<Value, TransportError> {
        let link = match self.current_link().await {
            Some(link) => link,
            None => {
                let probe = self.probe().await;
                if !probe.available {
                    return Err(TransportError::Unavailable(
                        probe.error.unwrap_or_else(|| "legacy bridge not reachable".into()),
                    ));
                }
                self.current_link()
                    .await
                    .ok_or_else(|| TransportError::Unavailable("legacy bridge not reachable".into()))?
            }
        };
        self.send_on(&link, command, self.config.request_timeout()).await
    }

    async fn call_number(&self, command: BridgeCommand) -> Result<i64, TransportError> {
        scalar_to_i64(&self.call(command).await?)
    }

    /// Probe one link: tablet state plus best-effort model number
    async fn probe_link(&self, link: &BridgeLink) -> Result<ProbeResult, TransportError> {
        let state = self
            .send_on(link, BridgeCommand::TabletState, self.probe_timeout)
            .await?;
        let tablet_connected = scalar_to_i64(&state).map(|v| v == 1).unwrap_or(false);
        let model = match self
            .send_on(link, BridgeCommand::TabletModelNumber, self.probe_timeout)
            .await
        {
            Ok(Value::String(model)) if !model.trim().is_empty() => Some(model.trim().to_string()),
            Ok(Value::Number(n)) if n.as_i64() != Some(0) => Some(n.to_string()),
            Ok(_) => None,
            Err(e) => {
                debug!("TabletModelNumber failed: {}", e);
                None
            }
        };
        Ok(ProbeResult::available(tablet_connected, model))
    }

    async fn try_show_prompt(&self, message: &str) -> Result<(), TransportError> {
        self.call(BridgeCommand::LcdRefresh {
            mode: LCD_MODE_CLEAR,
            x: 0,
            y: 0,
            width: LCD_WIDTH,
            height: LCD_HEIGHT,
        })
        .await?;
        self.call(BridgeCommand::LcdWriteString {
            dest: LCD_DEST_FOREGROUND,
            mode: LCD_MODE_COMPLEMENT,
            x: 0,
            y: 0,
            text: message.to_string(),
        })
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl SignatureTransport for LegacyBridgeClient {
    fn kind(&self) -> ConnectionType {
        ConnectionType::LegacyBridge
    }

    async fn probe(&self) -> ProbeResult {
        if !self.config.enabled && self.plugin.is_none() {
            return ProbeResult::unavailable("legacy bridge disabled");
        }

        let mut last_error = None;

        if self.config.enabled {
            let existing = match self.current_link().await {
                Some(link @ BridgeLink::Socket(_)) => Some(link),
                _ => None,
            };
            let socket_link = match existing {
                Some(link) => Ok(link),
                None => BridgeSocket::connect(&self.config.url(), self.probe_timeout)
                    .await
                    .map(|socket| BridgeLink::Socket(Arc::new(socket))),
            };

            match socket_link {
                Ok(link) => match self.probe_link(&link).await {
                    Ok(result) => {
                        info!("Legacy bridge connected at {}", self.config.url());
                        self.set_link(Some(link)).await;
                        return result;
                    }
                    Err(e) => {
                        debug!("Bridge probe command failed: {}", e);
                        if let BridgeLink::Socket(socket) = &link {
                            socket.close();
                        }
                        last_error = Some(format!("{}: {e}", self.config.url()));
                    }
                },
                Err(e) => {
                    debug!("Bridge connect to {} failed: {}", self.config.url(), e);
                    last_error = Some(format!("{}: {e}", self.config.url()));
                }
            }
        }

        if let Some(plugin) = &self.plugin {
            let link = BridgeLink::Plugin(plugin.clone());
            match self.probe_link(&link).await {
                Ok(result) => {
                    info!("Using in-process legacy plugin");
                    self.set_link(Some(link)).await;
                    return result;
                }
                Err(e) => {
                    debug!("Legacy plugin probe failed: {}", e);
                    last_error = Some(e.to_string());
                }
            }
        }

        self.set_link(None).await;
        ProbeResult::unavailable(last_error.unwrap_or_else(|| "legacy bridge not reachable".into()))
    }

    async fn try_tablet_state(&self) -> Result<bool, TransportError> {
        Ok(self.call_number(BridgeCommand::TabletState).await? == 1)
    }

    async fn try_point_count(&self) -> Result<u32, TransportError> {
        Ok(self
            .call_number(BridgeCommand::NumberOfTabletPoints)
            .await?
            .max(0) as u32)
    }

    async fn start_capture(&self, message: Option<&str>) -> Result<(), TransportError> {
        self.call(BridgeCommand::ClearTablet).await?;
        self.call(BridgeCommand::SetTabletState { enabled: true })
            .await?;
        if let Some(message) = message {
            self.show_prompt(message).await;
        }
        Ok(())
    }

    async fn stop_capture(&self) -> Result<(), TransportError> {
        self.call(BridgeCommand::SetTabletState { enabled: false })
            .await
            .map(|_| ())
    }

    async fn clear_signature(&self) -> Result<(), TransportError> {
        self.call(BridgeCommand::ClearTablet).await.map(|_| ())
    }

    async fn reset_tablet(&self) -> Result<(), TransportError> {
        self.call(BridgeCommand::Reset).await.map(|_| ())
    }

    async fn svg_path(&self, width: f64, height: f64) -> Result<String, TransportError> {
        let raw = match self.call(BridgeCommand::GetSigString).await? {
            Value::String(raw) => raw,
            Value::Null => String::new(),
            other => {
                return Err(TransportError::InvalidResponse(format!(
                    "GetSigString returned {other}"
                )));
            }
        };
        Ok(sig_string_to_svg_path(&raw, width, height))
    }

    async fn show_prompt(&self, message: &str) {
        if let Err(e) = self.try_show_prompt(message).await {
            warn!("LCD prompt failed (ignored): {}", e);
        }
    }

    async fn clear_display(&self) {
        let result = self
            .call(BridgeCommand::LcdRefresh {
                mode: LCD_MODE_CLEAR,
                x: 0,
                y: 0,
                width: LCD_WIDTH,
                height: LCD_HEIGHT,
            })
            .await;
        if let Err(e) = result {
            warn!("LCD clear failed (ignored): {}", e);
        }
    }

    async fn disconnect(&self) {
        self.set_link(None).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use padsign_ink::{decode, format_sig_string};
    use padsign_ipc::Stroke;
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    /// How the fake bridge treats incoming requests
    #[derive(Clone, Copy)]
    enum BridgeBehavior {
        /// Answer every request immediately
        Answer,
        /// Hold requests and answer them in reverse order once two arrived
        Reverse,
        /// Never answer anything
        Silent,
        /// Answer probe commands, then close the socket on the next request
        CloseAfterProbe,
    }

    fn answer(request: &BridgeRequest) -> BridgeResponse {
        let result = match &request.command {
            BridgeCommand::TabletState => json!(1),
            BridgeCommand::TabletModelNumber => json!("SigLite 1x5"),
            BridgeCommand::NumberOfTabletPoints => json!(12),
            BridgeCommand::GetSigString => json!("10,10,50,50,0,0,60,60,90,90"),
            BridgeCommand::Reset => return BridgeResponse::err(request.id, "reset refused"),
            _ => Value::Null,
        };
        BridgeResponse::ok(request.id, result)
    }

    async fn spawn_bridge(behavior: BridgeBehavior) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let Ok(ws) = accept_async(stream).await else {
                        return;
                    };
                    let (mut write, mut read) = ws.split();
                    let mut held: Vec<BridgeRequest> = Vec::new();
                    while let Some(Ok(Message::Text(text))) = read.next().await {
                        let request = BridgeRequest::from_json(text.as_str()).unwrap();
                        let probing = matches!(
                            request.command,
                            BridgeCommand::TabletState | BridgeCommand::TabletModelNumber
                        );
                        let replies = match behavior {
                            BridgeBehavior::Answer => vec![answer(&request)],
                            BridgeBehavior::Silent => vec![],
                            BridgeBehavior::CloseAfterProbe if probing => vec![answer(&request)],
                            BridgeBehavior::CloseAfterProbe => {
                                let _ = write.close().await;
                                return;
                            }
                            BridgeBehavior::Reverse if probing => vec![answer(&request)],
                            BridgeBehavior::Reverse => {
                                held.push(request);
                                if held.len() < 2 {
                                    continue;
                                }
                                held.drain(..).rev().map(|r| answer(&r)).collect()
                            }
                        };
                        for reply in replies {
                            let text = reply.to_json().unwrap();
                            if write.send(Message::Text(text.into())).await.is_err() {
                                return;
                            }
                        }
                    }
                });
            }
        });
        port
    }

    fn client_for(port: u16, request_timeout_ms: u64) -> LegacyBridgeClient {
        let config = BridgeConfig {
            host: "127.0.0.1".into(),
            port,
            request_timeout_ms,
            ..BridgeConfig::default()
        };
        LegacyBridgeClient::with_settings(config, Duration::from_millis(500), None)
    }

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[derive(Default)]
    struct FakePlugin {
        capturing: Mutex<bool>,
    }

    impl LegacyPlugin for FakePlugin {
        fn tablet_state(&self) -> Result<i32, String> {
            Ok(1)
        }

        fn set_tablet_state(&self, enabled: bool) -> Result<(), String> {
            *self.capturing.lock().unwrap() = enabled;
            Ok(())
        }

        fn number_of_tablet_points(&self) -> Result<u32, String> {
            Ok(if *self.capturing.lock().unwrap() { 3 } else { 0 })
        }

        fn get_sig_string(&self) -> Result<String, String> {
            let stroke = Stroke::from_xy(&[(5.0, 5.0), (9.0, 9.0), (12.0, 4.0)]);
            Ok(format_sig_string(&[stroke]))
        }

        fn clear_tablet(&self) -> Result<(), String> {
            Ok(())
        }

        fn lcd_write_string(&self, _: u8, _: u8, _: u32, _: u32, _: &str) -> Result<(), String> {
            Err("no LCD".into())
        }

        fn lcd_refresh(&self, _: u8, _: u32, _: u32, _: u32, _: u32) -> Result<(), String> {
            Err("no LCD".into())
        }
    }

    #[tokio::test]
    async fn test_probe_and_commands() {
        let port = spawn_bridge(BridgeBehavior::Answer).await;
        let client = client_for(port, 2_000);

        let probe = client.probe().await;
        assert!(probe.available);
        assert!(probe.tablet_connected);
        assert_eq!(probe.model.as_deref(), Some("SigLite 1x5"));
        assert!(client.is_socket_open().await);

        assert_eq!(client.point_count().await, 12);
        client.start_capture(Some("Sign below")).await.unwrap();
        let path = client.svg_path(400.0, 120.0).await.unwrap();
        assert_eq!(decode(&path).len(), 2);

        let err = client.reset_tablet().await.unwrap_err();
        assert!(matches!(err, TransportError::Bridge(ref msg) if msg == "reset refused"));
    }

    #[tokio::test]
    async fn test_repeat_connect_keeps_open_socket() {
        let port = spawn_bridge(BridgeBehavior::Answer).await;
        let client = client_for(port, 2_000);

        assert!(client.probe().await.available);
        let first = match client.current_link().await {
            Some(BridgeLink::Socket(socket)) => socket,
            _ => panic!("expected a socket link"),
        };

        assert!(client.probe().await.available);
        assert!(client.is_socket_open().await);
        assert!(first.is_open());
        match client.current_link().await {
            Some(BridgeLink::Socket(socket)) => assert!(Arc::ptr_eq(&socket, &first)),
            _ => panic!("expected a socket link"),
        }
        assert_eq!(client.point_count().await, 12);
    }

    #[tokio::test]
    async fn test_out_of_order_responses_resolve_by_id() {
        let port = spawn_bridge(BridgeBehavior::Reverse).await;
        let client = client_for(port, 2_000);
        assert!(client.probe().await.available);

        let (count, raw) = tokio::join!(
            client.call_number(BridgeCommand::NumberOfTabletPoints),
            client.call(BridgeCommand::GetSigString),
        );
        assert_eq!(count.unwrap(), 12);
        assert_eq!(raw.unwrap(), json!("10,10,50,50,0,0,60,60,90,90"));
    }

    #[tokio::test]
    async fn test_silent_bridge_times_out() {
        let port = spawn_bridge(BridgeBehavior::Silent).await;
        let client = client_for(port, 200);

        // Probe itself goes unanswered
        assert!(!client.probe().await.available);

        let link = BridgeLink::Socket(Arc::new(
            BridgeSocket::connect(&format!("ws://127.0.0.1:{port}"), Duration::from_secs(1))
                .await
                .unwrap(),
        ));
        let result = client
            .send_on(&link, BridgeCommand::TabletState, Duration::from_millis(200))
            .await;
        assert!(matches!(result, Err(TransportError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_close_rejects_pending_requests() {
        let port = spawn_bridge(BridgeBehavior::CloseAfterProbe).await;
        let client = client_for(port, 5_000);
        assert!(client.probe().await.available);

        let result = client.call(BridgeCommand::ClearTablet).await;
        assert!(matches!(result, Err(TransportError::BridgeClosed)));
        assert!(!client.is_socket_open().await);
    }

    #[tokio::test]
    async fn test_unavailable_without_bridge_or_plugin() {
        let client = client_for(closed_port().await, 1_000);
        let probe = client.probe().await;
        assert!(!probe.available);
        assert!(probe.error.is_some());
        assert!(matches!(
            client.clear_signature().await,
            Err(TransportError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_plugin_fallback() {
        let client =
            client_for(closed_port().await, 1_000).with_plugin(Arc::new(FakePlugin::default()));

        let probe = client.probe().await;
        assert!(probe.available);
        assert!(client.is_using_plugin().await);
        assert_eq!(probe.model, None);

        // LCD failures do not abort capture
        client.start_capture(Some("Sign here")).await.unwrap();
        assert_eq!(client.point_count().await, 3);
        let path = client.svg_path(400.0, 120.0).await.unwrap();
        assert_eq!(decode(&path).len(), 1);

        client.stop_capture().await.unwrap();
        assert_eq!(client.point_count().await, 0);
    }
}
