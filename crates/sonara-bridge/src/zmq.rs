use crate::transport::MessageChannel;
use async_trait::async_trait;
use bytes::Bytes;
use sonara_core::BridgeError;
use tokio::sync::Mutex;
use zeromq::{PubSocket, RepSocket, ReqSocket, Socket, SocketRecv, SocketSend, SubSocket, ZmqMessage};

fn transport_err(e: impl std::fmt::Display) -> BridgeError {
    BridgeError::Transport(e.to_string())
}

fn msg_from_frames(frames: Vec<Vec<u8>>) -> Result<ZmqMessage, BridgeError> {
    let mut iter = frames.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| BridgeError::Transport("empty message".to_string()))?;
    let mut msg = ZmqMessage::from(first);
    for frame in iter {
        msg.push_back(Bytes::from(frame));
    }
    Ok(msg)
}

fn frames_from_msg(msg: &ZmqMessage) -> Vec<Vec<u8>> {
    (0..msg.len())
        .filter_map(|i| msg.get(i).map(|b| b.to_vec()))
        .collect()
}

/// PUB socket bound at a local address. Send-only.
pub struct PubChannel {
    socket: Mutex<Option<PubSocket>>,
}

impl PubChannel {
    pub async fn bind(url: &str) -> Result<Self, BridgeError> {
        let mut socket = PubSocket::new();
        socket.bind(url).await.map_err(transport_err)?;
        tracing::info!(url, "publish channel bound");
        Ok(Self {
            socket: Mutex::new(Some(socket)),
        })
    }
}

#[async_trait]
impl MessageChannel for PubChannel {
    async fn send(&self, frames: Vec<Vec<u8>>) -> Result<(), BridgeError> {
        let msg = msg_from_frames(frames)?;
        let mut guard = self.socket.lock().await;
        let socket = guard
            .as_mut()
            .ok_or_else(|| BridgeError::Transport("channel closed".to_string()))?;
        socket.send(msg).await.map_err(transport_err)
    }

    async fn recv(&self) -> Result<Vec<Vec<u8>>, BridgeError> {
        Err(BridgeError::Transport(
            "publish channel cannot receive".to_string(),
        ))
    }

    async fn close(&self) -> Result<(), BridgeError> {
        if let Some(socket) = self.socket.lock().await.take() {
            socket.close().await;
        }
        Ok(())
    }
}

/// SUB socket connected to a remote publisher, subscribed to everything.
/// Receive-only.
pub struct SubChannel {
    socket: Mutex<Option<SubSocket>>,
}

impl SubChannel {
    pub async fn connect(url: &str) -> Result<Self, BridgeError> {
        let mut socket = SubSocket::new();
        socket.connect(url).await.map_err(transport_err)?;
        socket.subscribe("").await.map_err(transport_err)?;
        tracing::info!(url, "subscribe channel connected");
        Ok(Self {
            socket: Mutex::new(Some(socket)),
        })
    }
}

#[async_trait]
impl MessageChannel for SubChannel {
    async fn send(&self, _frames: Vec<Vec<u8>>) -> Result<(), BridgeError> {
        Err(BridgeError::Transport(
            "subscribe channel cannot send".to_string(),
        ))
    }

    async fn recv(&self) -> Result<Vec<Vec<u8>>, BridgeError> {
        let mut guard = self.socket.lock().await;
        let socket = guard
            .as_mut()
            .ok_or_else(|| BridgeError::Transport("channel closed".to_string()))?;
        let msg = socket.recv().await.map_err(transport_err)?;
        Ok(frames_from_msg(&msg))
    }

    async fn close(&self) -> Result<(), BridgeError> {
        if let Some(socket) = self.socket.lock().await.take() {
            socket.close().await;
        }
        Ok(())
    }
}

/// REQ socket connected to the fabric's unit-manager. Strict send/receive
/// lockstep; the bridge serializes access.
pub struct ReqChannel {
    socket: Mutex<Option<ReqSocket>>,
}

impl ReqChannel {
    pub async fn connect(url: &str) -> Result<Self, BridgeError> {
        let mut socket = ReqSocket::new();
        socket.connect(url).await.map_err(transport_err)?;
        tracing::info!(url, "request channel connected");
        Ok(Self {
            socket: Mutex::new(Some(socket)),
        })
    }
}

#[async_trait]
impl MessageChannel for ReqChannel {
    async fn send(&self, frames: Vec<Vec<u8>>) -> Result<(), BridgeError> {
        let msg = msg_from_frames(frames)?;
        let mut guard = self.socket.lock().await;
        let socket = guard
            .as_mut()
            .ok_or_else(|| BridgeError::Transport("channel closed".to_string()))?;
        socket.send(msg).await.map_err(transport_err)
    }

    async fn recv(&self) -> Result<Vec<Vec<u8>>, BridgeError> {
        let mut guard = self.socket.lock().await;
        let socket = guard
            .as_mut()
            .ok_or_else(|| BridgeError::Transport("channel closed".to_string()))?;
        let msg = socket.recv().await.map_err(transport_err)?;
        Ok(frames_from_msg(&msg))
    }

    async fn close(&self) -> Result<(), BridgeError> {
        if let Some(socket) = self.socket.lock().await.take() {
            socket.close().await;
        }
        Ok(())
    }
}

/// REP socket bound at a local address, answering fabric requests.
pub struct RepChannel {
    socket: Mutex<Option<RepSocket>>,
}

impl RepChannel {
    pub async fn bind(url: &str) -> Result<Self, BridgeError> {
        let mut socket = RepSocket::new();
        socket.bind(url).await.map_err(transport_err)?;
        tracing::info!(url, "reply channel bound");
        Ok(Self {
            socket: Mutex::new(Some(socket)),
        })
    }
}

#[async_trait]
impl MessageChannel for RepChannel {
    async fn send(&self, frames: Vec<Vec<u8>>) -> Result<(), BridgeError> {
        let msg = msg_from_frames(frames)?;
        let mut guard = self.socket.lock().await;
        let socket = guard
            .as_mut()
            .ok_or_else(|| BridgeError::Transport("channel closed".to_string()))?;
        socket.send(msg).await.map_err(transport_err)
    }

    async fn recv(&self) -> Result<Vec<Vec<u8>>, BridgeError> {
        let mut guard = self.socket.lock().await;
        let socket = guard
            .as_mut()
            .ok_or_else(|| BridgeError::Transport("channel closed".to_string()))?;
        let msg = socket.recv().await.map_err(transport_err)?;
        Ok(frames_from_msg(&msg))
    }

    async fn close(&self) -> Result<(), BridgeError> {
        if let Some(socket) = self.socket.lock().await.take() {
            socket.close().await;
        }
        Ok(())
    }
}
