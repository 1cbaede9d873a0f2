use log::{debug, info, warn};
use shared::protocol::{sanitize_display_name, Message};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not reach server: {0}")]
    Connect(#[from] std::io::Error),

    #[error("connection closed before a session id was assigned")]
    Closed,

    #[error("expected WELCOME, got {0:?}")]
    Handshake(String),
}

/// An established session with the server
///
/// Inbound lines are decoded on a background task and queued until the step
/// loop drains them; outbound lines are queued and written by a second task.
/// Neither direction ever blocks the caller.
pub struct NetworkLink {
    session_id: u32,
    connected: Arc<AtomicBool>,
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<Message>,
    reader: Option<JoinHandle<()>>,
}

impl NetworkLink {
    /// Connects, waits for the session id, then announces the display name.
    pub async fn connect(addr: &str, display_name: Option<&str>) -> Result<Self, ClientError> {
        info!("Connecting to {}...", addr);

        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let session_id = await_welcome(&mut reader).await?;
        info!("Connected! Session ID: {}", session_id);

        let connected = Arc::new(AtomicBool::new(true));
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();

        let join = Message::Join {
            display_name: display_name.and_then(sanitize_display_name),
        };
        let _ = outbound.send(join.encode());

        tokio::spawn(write_outbound(write_half, outbound_rx, connected.clone()));
        let reader = tokio::spawn(read_inbound(reader, inbound_tx, connected.clone()));

        Ok(Self {
            session_id,
            connected,
            outbound,
            inbound,
            reader: Some(reader),
        })
    }

    /// Builds a link over in-memory channels instead of a socket. Dropping the
    /// outbound receiver reads as a lost connection.
    #[cfg(test)]
    pub(crate) fn from_channels(
        session_id: u32,
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<Message>,
    ) -> Self {
        Self {
            session_id,
            connected: Arc::new(AtomicBool::new(true)),
            outbound,
            inbound,
            reader: None,
        }
    }

    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.outbound.is_closed()
    }

    /// Queues a message for the server. Skipped, not buffered, once the link is down.
    pub fn send(&self, message: &Message) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.outbound.send(message.encode()).is_ok()
    }

    /// Takes every message received since the previous call.
    pub fn drain(&mut self) -> Vec<Message> {
        let mut messages = Vec::new();
        while let Ok(message) = self.inbound.try_recv() {
            messages.push(message);
        }
        messages
    }
}

impl Drop for NetworkLink {
    fn drop(&mut self) {
        // The writer exits on its own once `outbound` is dropped and its queue is flushed.
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

async fn await_welcome<R>(reader: &mut R) -> Result<u32, ClientError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer).await? == 0 {
            return Err(ClientError::Closed);
        }

        let line = String::from_utf8_lossy(&buffer);
        match Message::decode(&line) {
            Ok(Message::Welcome { session_id }) => return Ok(session_id),
            Ok(other) => return Err(ClientError::Handshake(other.encode())),
            Err(e) => debug!("Skipping undecodable line before WELCOME: {}", e),
        }
    }
}

async fn read_inbound(
    mut reader: BufReader<OwnedReadHalf>,
    inbox: mpsc::UnboundedSender<Message>,
    connected: Arc<AtomicBool>,
) {
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer).await {
            Ok(0) => {
                info!("Server closed the connection");
                break;
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(&buffer);
                match Message::decode(&line) {
                    Ok(message) => {
                        if inbox.send(message).is_err() {
                            break;
                        }
                    }
                    Err(e) => debug!("Discarding inbound line: {}", e),
                }
            }
            Err(e) => {
                warn!("Error reading from server: {}", e);
                break;
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
}

async fn write_outbound(
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<String>,
    connected: Arc<AtomicBool>,
) {
    while let Some(line) = outbound.recv().await {
        let mut data = line.into_bytes();
        data.push(b'\n');

        if let Err(e) = writer.write_all(&data).await {
            warn!("Error writing to server: {}", e);
            break;
        }
    }
    connected.store(false, Ordering::SeqCst);
    let _ = writer.shutdown().await;
}
