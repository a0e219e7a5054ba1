use async_trait::async_trait;
use sonara_core::BridgeError;
use tokio::sync::{mpsc, Mutex};

/// One direction-agnostic message channel. Sends are multi-frame (the
/// fabric's request protocol prefixes a routing frame); receives yield the
/// frames of one message. Receiving blocks until a message arrives or the
/// channel closes.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn send(&self, frames: Vec<Vec<u8>>) -> Result<(), BridgeError>;

    async fn recv(&self) -> Result<Vec<Vec<u8>>, BridgeError>;

    async fn close(&self) -> Result<(), BridgeError>;
}

/// In-process channel backed by tokio mpsc queues. Used in tests and
/// anywhere a transport-free bridge is useful.
pub struct InMemoryChannel {
    tx: mpsc::UnboundedSender<Vec<Vec<u8>>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<Vec<u8>>>>,
}

/// Two cross-wired channels: what one sends, the other receives.
pub fn in_memory_pair() -> (InMemoryChannel, InMemoryChannel) {
    let (tx_a, rx_a) = mpsc::unbounded_channel();
    let (tx_b, rx_b) = mpsc::unbounded_channel();
    (
        InMemoryChannel {
            tx: tx_a,
            rx: Mutex::new(rx_b),
        },
        InMemoryChannel {
            tx: tx_b,
            rx: Mutex::new(rx_a),
        },
    )
}

#[async_trait]
impl MessageChannel for InMemoryChannel {
    async fn send(&self, frames: Vec<Vec<u8>>) -> Result<(), BridgeError> {
        if frames.is_empty() {
            return Err(BridgeError::Transport("empty message".to_string()));
        }
        self.tx
            .send(frames)
            .map_err(|_| BridgeError::Transport("peer closed".to_string()))
    }

    async fn recv(&self) -> Result<Vec<Vec<u8>>, BridgeError> {
        let mut rx = self.rx.lock().await;
        rx.recv()
            .await
            .ok_or_else(|| BridgeError::Transport("peer closed".to_string()))
    }

    async fn close(&self) -> Result<(), BridgeError> {
        let mut rx = self.rx.lock().await;
        rx.close();
        Ok(())
    }
}
