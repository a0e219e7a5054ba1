use crate::message::{AiResult, AiTask, Message, MessageHandler};
use crate::transport::MessageChannel;
use crate::zmq::{PubChannel, RepChannel, ReqChannel, SubChannel};
use sonara_core::{BridgeConfig, BridgeError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

type HandlerMap = HashMap<String, Arc<dyn MessageHandler>>;

/// Bridge to the external compute fabric. Owns up to four channels
/// (publish, subscribe, request, reply) and routes inbound messages to
/// registered action handlers. Constructed explicitly and injected where
/// needed; the binary owns its lifecycle.
pub struct ComputeBridge {
    service_name: String,
    publisher: Option<Arc<dyn MessageChannel>>,
    subscriber: Option<Arc<dyn MessageChannel>>,
    requester: Option<Arc<dyn MessageChannel>>,
    replier: Option<Arc<dyn MessageChannel>>,
    handlers: Arc<RwLock<HandlerMap>>,
    // REQ channels are strict lockstep; one request at a time.
    request_lock: Mutex<()>,
    shutdown_tx: watch::Sender<bool>,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
    listening: AtomicBool,
    closed: AtomicBool,
}

impl ComputeBridge {
    pub fn new(service_name: impl Into<String>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            service_name: service_name.into(),
            publisher: None,
            subscriber: None,
            requester: None,
            replier: None,
            handlers: Arc::new(RwLock::new(HashMap::new())),
            request_lock: Mutex::new(()),
            shutdown_tx,
            tasks: StdMutex::new(Vec::new()),
            listening: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_publisher(mut self, channel: Arc<dyn MessageChannel>) -> Self {
        self.publisher = Some(channel);
        self
    }

    pub fn with_subscriber(mut self, channel: Arc<dyn MessageChannel>) -> Self {
        self.subscriber = Some(channel);
        self
    }

    pub fn with_requester(mut self, channel: Arc<dyn MessageChannel>) -> Self {
        self.requester = Some(channel);
        self
    }

    pub fn with_replier(mut self, channel: Arc<dyn MessageChannel>) -> Self {
        self.replier = Some(channel);
        self
    }

    /// Open ZeroMQ channels for whichever URLs the config provides.
    pub async fn connect(service_name: &str, config: &BridgeConfig) -> Result<Self, BridgeError> {
        let mut bridge = Self::new(service_name);
        if let Some(url) = config.publish_url.as_deref() {
            bridge.publisher = Some(Arc::new(PubChannel::bind(url).await?));
        }
        if let Some(url) = config.subscribe_url.as_deref() {
            bridge.subscriber = Some(Arc::new(SubChannel::connect(url).await?));
        }
        if let Some(url) = config.request_url.as_deref() {
            bridge.requester = Some(Arc::new(ReqChannel::connect(url).await?));
        }
        if let Some(url) = config.reply_url.as_deref() {
            bridge.replier = Some(Arc::new(RepChannel::bind(url).await?));
        }
        Ok(bridge)
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Register a handler for an inbound action. Safe to call concurrently;
    /// a later registration for the same action replaces the earlier one.
    pub fn register_handler(&self, action: impl Into<String>, handler: Arc<dyn MessageHandler>) {
        let action = action.into();
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.insert(action.clone(), handler);
        tracing::info!(action = %action, "registered bridge handler");
    }

    /// Announce this service to the fabric's manager over the request
    /// channel and wait for the acknowledgement.
    pub async fn register_service(
        &self,
        endpoints: HashMap<String, String>,
    ) -> Result<(), BridgeError> {
        let info = serde_json::json!({
            "service_name": self.service_name,
            "service_type": "rust_service",
            "endpoints": endpoints,
            "health": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        let mut msg = Message::new("register_unit", "service", info);
        msg.work_id = self.service_name.clone();

        let reply = self.send_request(&msg).await?;
        if let Some(err) = reply.error {
            return Err(BridgeError::RegistrationFailed(err));
        }
        tracing::info!(service = %self.service_name, "service registered with fabric");
        Ok(())
    }

    /// Fire-and-forget broadcast on the publish channel.
    pub async fn publish_message(&self, msg: &Message) -> Result<(), BridgeError> {
        let publisher = self
            .publisher
            .as_ref()
            .ok_or(BridgeError::ChannelNotConfigured("publish"))?;
        let payload = serde_json::to_vec(msg)?;
        publisher.send(vec![payload]).await?;
        tracing::debug!(action = %msg.action, object = %msg.object, "published message");
        Ok(())
    }

    /// One request/reply exchange on the request channel. The wire format
    /// prefixes a routing frame carrying the action name.
    pub async fn send_request(&self, msg: &Message) -> Result<Message, BridgeError> {
        let requester = self
            .requester
            .as_ref()
            .ok_or(BridgeError::ChannelNotConfigured("request"))?;
        let payload = serde_json::to_vec(msg)?;

        let _guard = self.request_lock.lock().await;
        requester
            .send(vec![msg.action.clone().into_bytes(), payload])
            .await?;
        let frames = requester.recv().await?;
        let reply = frames
            .last()
            .ok_or_else(|| BridgeError::Transport("empty reply".to_string()))?;

        match serde_json::from_slice::<Message>(reply) {
            Ok(parsed) => Ok(parsed),
            // Some fabric managers answer with a bare acknowledgement string.
            Err(_) => Ok(Message {
                request_id: msg.request_id.clone(),
                work_id: self.service_name.clone(),
                action: msg.action.clone(),
                object: msg.object.clone(),
                data: serde_json::json!(String::from_utf8_lossy(reply)),
                error: None,
                timestamp: chrono::Utc::now().to_rfc3339(),
            }),
        }
    }

    /// Dispatch an inference task to the fabric and wait for its result.
    pub async fn send_task(&self, task: &AiTask) -> Result<AiResult, BridgeError> {
        let mut msg = Message::new("inference", "ai_task", serde_json::to_value(task)?);
        msg.request_id = task.task_id.clone();
        msg.work_id = self.service_name.clone();

        let reply = self.send_request(&msg).await?;
        Ok(AiResult {
            task_id: reply.request_id,
            output: reply.data,
            error: reply.error,
        })
    }

    /// Spawn the subscribe and reply loops. Each blocks on its channel and
    /// exits when `close` signals shutdown.
    pub fn start_listening(&self) -> Result<(), BridgeError> {
        if self.listening.swap(true, Ordering::SeqCst) {
            return Err(BridgeError::AlreadyListening);
        }

        let mut handles = Vec::new();
        if let Some(subscriber) = &self.subscriber {
            handles.push(tokio::spawn(subscribe_loop(
                Arc::clone(subscriber),
                Arc::clone(&self.handlers),
                self.service_name.clone(),
                self.shutdown_tx.subscribe(),
            )));
        }
        if let Some(replier) = &self.replier {
            handles.push(tokio::spawn(reply_loop(
                Arc::clone(replier),
                Arc::clone(&self.handlers),
                self.service_name.clone(),
                self.shutdown_tx.subscribe(),
            )));
        }

        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(handles);
        Ok(())
    }

    /// Stop the listener loops and close every channel, reporting all close
    /// failures together. Subsequent calls are no-ops.
    pub async fn close(&self) -> Result<(), BridgeError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _ = self.shutdown_tx.send(true);

        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            tasks.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }

        let mut failures = Vec::new();
        for (name, channel) in [
            ("publish", &self.publisher),
            ("subscribe", &self.subscriber),
            ("request", &self.requester),
            ("reply", &self.replier),
        ] {
            if let Some(channel) = channel {
                if let Err(e) = channel.close().await {
                    failures.push(format!("{name}: {e}"));
                }
            }
        }

        if failures.is_empty() {
            tracing::info!(service = %self.service_name, "bridge closed");
            Ok(())
        } else {
            Err(BridgeError::CloseFailed(failures.join("; ")))
        }
    }
}

/// Route one inbound message to its handler and build the reply.
async fn dispatch(handlers: &RwLock<HandlerMap>, service: &str, msg: &Message) -> Message {
    let handler = {
        let handlers = handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.get(&msg.action).cloned()
    };

    let Some(handler) = handler else {
        tracing::warn!(action = %msg.action, service, "no handler for action");
        return msg.error_reply(format!("Unknown action: {}", msg.action));
    };

    match handler.handle(msg).await {
        Ok(Some(response)) => response,
        Ok(None) => msg.ok_reply(),
        Err(e) => {
            tracing::error!(action = %msg.action, error = %e, "bridge handler failed");
            msg.error_reply(e.to_string())
        }
    }
}

async fn subscribe_loop(
    channel: Arc<dyn MessageChannel>,
    handlers: Arc<RwLock<HandlerMap>>,
    service: String,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(service = %service, "subscribe loop started");
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            received = channel.recv() => {
                let frames = match received {
                    Ok(frames) => frames,
                    Err(e) => {
                        tracing::warn!(error = %e, "subscribe channel closed");
                        break;
                    }
                };
                let Some(payload) = frames.last() else {
                    continue;
                };
                match serde_json::from_slice::<Message>(payload) {
                    Ok(msg) => {
                        // Broadcasts have no reply path.
                        let _ = dispatch(&handlers, &service, &msg).await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping unparseable broadcast");
                    }
                }
            }
        }
    }
    tracing::info!(service = %service, "subscribe loop stopped");
}

async fn reply_loop(
    channel: Arc<dyn MessageChannel>,
    handlers: Arc<RwLock<HandlerMap>>,
    service: String,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(service = %service, "reply loop started");
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            received = channel.recv() => {
                let frames = match received {
                    Ok(frames) => frames,
                    Err(e) => {
                        tracing::warn!(error = %e, "reply channel closed");
                        break;
                    }
                };
                let response = match frames.last() {
                    Some(payload) => match serde_json::from_slice::<Message>(payload) {
                        Ok(msg) => dispatch(&handlers, &service, &msg).await,
                        Err(_) => {
                            let empty = Message::new(String::new(), String::new(), serde_json::Value::Null);
                            empty.error_reply("Invalid JSON format")
                        }
                    },
                    None => continue,
                };
                match serde_json::to_vec(&response) {
                    Ok(payload) => {
                        if let Err(e) = channel.send(vec![payload]).await {
                            tracing::error!(error = %e, "failed to send reply");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to encode reply");
                    }
                }
            }
        }
    }
    tracing::info!(service = %service, "reply loop stopped");
}
