// TCP connection manager and session tracking
//
// Resolves connect:// targets to TCP streams and keeps the resulting sessions
// so they can be listed. What happens on the stream afterwards is up to the
// debugger front end.

use async_trait::async_trait;
use connector_model::{parse_connect_url, ConnectionError, ConnectionManager, ConnectionResult};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type SessionId = String;

#[derive(Debug)]
pub struct RemoteSession {
    pub url: String,
    pub async_mode: bool,
    pub stream: TcpStream,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub url: String,
    pub async_mode: bool,
    pub peer: Option<String>,
}

pub struct TcpConnectionManager {
    sessions: Mutex<HashMap<SessionId, RemoteSession>>,
    connect_timeout: Duration,
}

impl TcpConnectionManager {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            connect_timeout,
        }
    }

    pub async fn sessions(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.lock().await;
        let mut summaries: Vec<SessionSummary> = sessions
            .iter()
            .map(|(id, session)| SessionSummary {
                id: id.clone(),
                url: session.url.clone(),
                async_mode: session.async_mode,
                peer: session.stream.peer_addr().ok().map(|a| a.to_string()),
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    pub async fn remove_session(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(session_id).is_some()
    }
}

#[async_trait]
impl ConnectionManager for TcpConnectionManager {
    async fn connect(&self, url: &str, async_mode: bool) -> ConnectionResult<()> {
        let (host, port) = parse_connect_url(url)?;
        let host = socket_host(host);
        let port: u16 = port
            .parse()
            .map_err(|_| ConnectionError::InvalidTarget(url.to_string()))?;

        info!("Connecting to {}:{} (async={})", host, port, async_mode);

        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| {
                warn!("Connect to {} timed out after {:?}", url, self.connect_timeout);
                ConnectionError::Timeout(url.to_string())
            })??;

        stream.set_nodelay(true)?;

        let session_id = format!("session_{}", Uuid::new_v4());
        debug!("Registered {} for {}", session_id, url);

        let mut sessions = self.sessions.lock().await;
        sessions.insert(
            session_id,
            RemoteSession {
                url: url.to_string(),
                async_mode,
                stream,
            },
        );

        Ok(())
    }
}

// `[::1]` style hosts resolve without their brackets
fn socket_host(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}
