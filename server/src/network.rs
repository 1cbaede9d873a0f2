//! Server network layer: connection acceptor and per-session handlers
//!
//! Each accepted TCP connection gets its own task which registers a session,
//! sends the join snapshot, then reads one protocol line at a time until the
//! stream ends. The same task drives the session's writer, which drains an
//! unbounded channel so broadcasts never wait on a slow socket. A failure in
//! either direction ends the session.

use crate::config::ServerConfig;
use crate::game::{run_movement_loop, run_spawn_loop, EnemySimulation};
use crate::policy::{PositionPolicy, TrustClient};
use crate::registry::SessionRegistry;
use log::{debug, error, info};
use shared::protocol::{from_wire, Message};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

/// State shared by every connection handler and both simulation timers
pub struct ServerState {
    pub registry: SessionRegistry,
    pub enemies: EnemySimulation,
    pub config: ServerConfig,
    policy: Box<dyn PositionPolicy>,
}

impl ServerState {
    pub fn new(config: ServerConfig, policy: Box<dyn PositionPolicy>) -> Self {
        Self {
            registry: SessionRegistry::new(),
            enemies: EnemySimulation::new(),
            config,
            policy,
        }
    }

    pub fn policy(&self) -> &dyn PositionPolicy {
        self.policy.as_ref()
    }
}

/// Bound listener plus the state it will serve
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: Arc<ServerState>,
}

impl Server {
    pub async fn bind(addr: &str, config: ServerConfig) -> io::Result<Self> {
        Self::bind_with_policy(addr, config, Box::new(TrustClient)).await
    }

    pub async fn bind_with_policy(
        addr: &str,
        config: ServerConfig,
        policy: Box<dyn PositionPolicy>,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        Ok(Server {
            listener,
            local_addr,
            state: Arc::new(ServerState::new(config, policy)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Starts the acceptor and both simulation timers as independent tasks
    pub fn spawn(self) -> ServerHandle {
        let state = self.state;
        let tasks = vec![
            tokio::spawn(run_movement_loop(Arc::clone(&state))),
            tokio::spawn(run_spawn_loop(Arc::clone(&state))),
            tokio::spawn(accept_loop(self.listener, Arc::clone(&state))),
        ];

        ServerHandle {
            local_addr: self.local_addr,
            state,
            tasks,
        }
    }
}

/// Handle to a running server
pub struct ServerHandle {
    local_addr: SocketAddr,
    state: Arc<ServerState>,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Stops accepting, drops every open connection and halts the timers
    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
        info!("Server on {} shut down", self.local_addr);
    }
}

/// Hosts a server on every interface at `port` with the default configuration
///
/// Port 0 lets the OS pick; read the result from [`ServerHandle::local_addr`].
pub async fn start_hosting(port: u16) -> io::Result<ServerHandle> {
    let server = Server::bind(&format!("0.0.0.0:{}", port), ServerConfig::default()).await?;
    Ok(server.spawn())
}

async fn accept_loop(listener: TcpListener, state: Arc<ServerState>) {
    // Dropping the set aborts every handler, which closes their sockets
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    connections.spawn(handle_connection(stream, peer, Arc::clone(&state)));
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

/// Serves one connection from accept to cleanup
pub async fn handle_connection(stream: TcpStream, peer: SocketAddr, state: Arc<ServerState>) {
    let _ = stream.set_nodelay(true);
    let (read_half, write_half) = stream.into_split();
    serve_session(read_half, write_half, peer, &state).await;
}

/// Registers a session over any byte stream pair and serves it until either
/// direction fails
///
/// Whichever of the reader and writer ends first triggers the cleanup. When
/// the reader ends, the writer still flushes what was queued before removal.
async fn serve_session<R, W>(reader: R, writer: W, peer: SocketAddr, state: &ServerState)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (outbound, outbound_rx) = mpsc::unbounded_channel();

    // WELCOME is queued by the registry before anything else can be
    let session_id = state.registry.register(outbound).await;
    info!("Client {} connected from {}", session_id, peer);

    send_join_snapshot(state, session_id).await;
    state
        .registry
        .broadcast(&Message::Joined { session_id }.encode(), Some(session_id))
        .await;

    let reading = read_session(reader, session_id, state);
    let writing = write_session(writer, outbound_rx, session_id);
    tokio::pin!(reading, writing);

    let writer_done = tokio::select! {
        _ = &mut reading => false,
        _ = &mut writing => true,
    };

    // Removing the session drops its outbound sender, which ends the writer
    if state.registry.remove(session_id).await {
        state
            .registry
            .broadcast(&Message::Leave { session_id }.encode(), None)
            .await;
        info!("Client {} disconnected", session_id);
    }

    if !writer_done {
        writing.await;
    }
}

/// Known peer positions, then the live enemy roster
async fn send_join_snapshot(state: &ServerState, session_id: u32) {
    let positions = state.registry.send_positions_to(session_id).await;
    let roster = state.enemies.send_roster(&state.registry, session_id).await;
    debug!(
        "Sent {} positions and {} enemies to session {}",
        positions, roster, session_id
    );
}

/// Reads lines until EOF or error
async fn read_session<R: AsyncRead + Unpin>(reader: R, session_id: u32, state: &ServerState) {
    let mut reader = BufReader::new(reader);
    let mut buffer = Vec::new();

    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer).await {
            Ok(0) => {
                debug!("Session {} closed the connection", session_id);
                break;
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(&buffer);
                dispatch_line(state, session_id, &line).await;
            }
            Err(e) => {
                debug!("Session {} read error: {}", session_id, e);
                break;
            }
        }
    }
}

async fn write_session<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut outbound: mpsc::UnboundedReceiver<String>,
    session_id: u32,
) {
    while let Some(mut line) = outbound.recv().await {
        line.push('\n');
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            debug!("Session {} write error: {}", session_id, e);
            return;
        }
    }
    let _ = writer.shutdown().await;
}

/// Routes one inbound line. Undecodable lines and stale references are dropped.
pub(crate) async fn dispatch_line(state: &ServerState, session_id: u32, line: &str) {
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    let message = match Message::decode(line) {
        Ok(message) => message,
        Err(e) => {
            debug!("Ignoring line from session {}: {}", session_id, e);
            return;
        }
    };

    match message {
        Message::Pos {
            session_id: claimed,
            x,
            y,
        } => {
            let reported = from_wire(x, y);
            let accepted = match state.policy().accept(session_id, reported) {
                Some(position) => position,
                None => {
                    debug!("Rejected position from session {}", session_id);
                    return;
                }
            };

            if !state.registry.update_position(session_id, accepted).await {
                return;
            }

            if claimed == session_id && accepted == reported {
                state.registry.broadcast(line, Some(session_id)).await;
            } else {
                let corrected = Message::pos(session_id, accepted).encode();
                state.registry.broadcast(&corrected, Some(session_id)).await;
            }
        }
        Message::Shot { .. } => {
            state.registry.broadcast(line, Some(session_id)).await;
        }
        Message::Hit {
            enemy_id,
            damage,
            shooter_id,
        } => {
            let outcome = state
                .enemies
                .apply_hit(&state.registry, enemy_id, damage)
                .await;
            debug!(
                "Hit on enemy {} for {} from session {} (shooter {}): {:?}",
                enemy_id, damage, session_id, shooter_id, outcome
            );
        }
        Message::Join { display_name } => {
            info!(
                "Session {} joined as {}",
                session_id,
                display_name.as_deref().unwrap_or("<unnamed>")
            );
            state
                .registry
                .set_display_name(session_id, display_name)
                .await;
        }
        other => {
            debug!("Ignoring {} from session {}", other.tag(), session_id);
        }
    }
}
