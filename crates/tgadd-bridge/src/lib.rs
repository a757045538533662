//! MTProto bridge adapter.
//!
//! Implements `PlatformClient` by driving a long-lived helper process that
//! speaks newline-delimited JSON: one request object per line on its stdin,
//! one response object per line on its stdout. The helper owns the MTProto
//! session and credentials; this crate only owns the wire contract.
//!
//! Request: `{"id": 7, "op": "resolve", "key": "+254700000001"}`
//! Response: `{"id": 7, "ok": true, "result": {...}}` or
//! `{"id": 7, "ok": false, "error": {"kind": "FLOOD_WAIT_30", "message": "..."}}`

mod wire;

use async_trait::async_trait;

use std::{
    borrow::Cow,
    collections::VecDeque,
    process::Stdio,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tgadd_core::{
    config::Config,
    domain::{Contact, GroupDescriptor, GroupId, Participant, PeerRef},
    platform::{port::PlatformResult, PlatformClient, PlatformError},
};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    process::{Child, ChildStdin, ChildStdout, Command},
    sync::Mutex,
};

pub use wire::decode_error;
use wire::{BridgeOp, Envelope, Response, WireDialog, WirePeer, WireUser};

/// Helper diagnostics kept for error reports.
const HELPER_LOG_LINES: usize = 40;
/// Longest helper line kept or echoed, in characters.
const HELPER_LINE_CHARS: usize = 300;

#[derive(Clone, Debug)]
pub struct BridgeConfig {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Upper bound on the wait for one response line.
    pub request_timeout: Duration,
}

impl From<&Config> for BridgeConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            program: cfg.bridge_cmd.clone(),
            args: cfg.bridge_args.clone(),
            env: cfg.bridge_env(),
            request_timeout: cfg.bridge_timeout,
        }
    }
}

/// The helper's most recent stderr lines (login prompts, session errors).
#[derive(Debug, Default)]
struct HelperLog {
    recent: VecDeque<String>,
}

impl HelperLog {
    fn record(&mut self, line: &str) {
        let line = line.trim_end();
        if line.is_empty() {
            return;
        }
        if self.recent.len() == HELPER_LOG_LINES {
            self.recent.pop_front();
        }
        self.recent.push_back(preview(line).into_owned());
    }

    /// `None` when the helper has said nothing useful.
    fn render(&self) -> Option<String> {
        if self.recent.is_empty() {
            return None;
        }
        Some(Vec::from(self.recent.clone()).join("\n"))
    }
}

/// Clip a helper line to `HELPER_LINE_CHARS` characters.
fn preview(line: &str) -> Cow<'_, str> {
    match line.char_indices().nth(HELPER_LINE_CHARS) {
        None => Cow::Borrowed(line),
        Some((cut, _)) => Cow::Owned(format!("{}…", &line[..cut])),
    }
}

struct BridgeIo {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// Platform client backed by the bridge helper process.
///
/// The helper is spawned on first use. Requests are serialized through one
/// lock, so at most one is ever in flight.
pub struct BridgeClient {
    cfg: BridgeConfig,
    io: Mutex<Option<BridgeIo>>,
    next_id: AtomicU64,
    helper_log: Arc<Mutex<HelperLog>>,
}

impl BridgeClient {
    pub fn new(cfg: BridgeConfig) -> Self {
        Self {
            cfg,
            io: Mutex::new(None),
            next_id: AtomicU64::new(1),
            helper_log: Arc::new(Mutex::new(HelperLog::default())),
        }
    }

    fn spawn(&self) -> PlatformResult<BridgeIo> {
        let mut cmd = Command::new(&self.cfg.program);
        cmd.args(&self.cfg.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (k, v) in &self.cfg.env {
            cmd.env(k, v);
        }

        let mut child = cmd.spawn().map_err(|e| {
            PlatformError::Generic(format!("failed to start bridge {}: {e}", self.cfg.program))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PlatformError::Generic("bridge stdin was not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PlatformError::Generic("bridge stdout was not captured".to_string()))?;

        // Drain stderr in background to avoid blocking on a full pipe.
        if let Some(stderr) = child.stderr.take() {
            let log = self.helper_log.clone();
            tokio::spawn(async move {
                let mut r = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = r.next_line().await {
                    tracing::debug!(target: "tgadd_bridge::helper", "{}", preview(&line));
                    log.lock().await.record(&line);
                }
            });
        }

        tracing::info!(program = %self.cfg.program, "bridge started");
        Ok(BridgeIo {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        })
    }

    async fn call(&self, op: BridgeOp<'_>) -> PlatformResult<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut line = serde_json::to_string(&Envelope { id, op })
            .map_err(|e| PlatformError::Generic(format!("bridge request encode failed: {e}")))?;
        line.push('\n');

        let mut guard = self.io.lock().await;
        if guard.is_none() {
            *guard = Some(self.spawn()?);
        }
        let Some(io) = guard.as_mut() else {
            return Err(PlatformError::Generic("bridge is not running".to_string()));
        };

        if let Err(e) = write_line(&mut io.stdin, &line).await {
            *guard = None;
            return Err(self.dead_bridge(format!("bridge write failed: {e}")).await);
        }

        let limit = self.cfg.request_timeout;
        let reply = tokio::time::timeout(limit, read_reply(&mut io.stdout, id)).await;
        match reply {
            Ok(Ok(resp)) => resp.into_result(),
            Ok(Err(msg)) => {
                *guard = None;
                Err(self.dead_bridge(msg).await)
            }
            Err(_) => {
                tracing::warn!(request = id, ?limit, "bridge timed out, restarting on next request");
                if let Some(mut stuck) = guard.take() {
                    if let Err(e) = stuck.child.kill().await {
                        tracing::warn!("failed to stop bridge: {e}");
                    }
                }
                Err(self
                    .dead_bridge(format!("bridge did not respond within {limit:?}"))
                    .await)
            }
        }
    }

    async fn dead_bridge(&self, msg: String) -> PlatformError {
        match self.helper_log.lock().await.render() {
            None => PlatformError::Generic(msg),
            Some(log) => PlatformError::Generic(format!("{msg}\nhelper said:\n{log}")),
        }
    }

    /// Stop the helper if it is running.
    pub async fn shutdown(&self) {
        let io = self.io.lock().await.take();
        let Some(mut io) = io else {
            return;
        };
        drop(io.stdin);
        if let Ok(Some(_)) = io.child.try_wait() {
            return;
        }
        if let Err(e) = io.child.kill().await {
            tracing::warn!("failed to stop bridge: {e}");
        }
    }
}

/// Read until the response for `id` arrives. `Err` means the helper is gone.
async fn read_reply(
    stdout: &mut Lines<BufReader<ChildStdout>>,
    id: u64,
) -> Result<Response, String> {
    loop {
        let raw = match stdout.next_line().await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Err("bridge exited".to_string()),
            Err(e) => return Err(format!("bridge read failed: {e}")),
        };
        let resp: Response = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(_) => {
                tracing::debug!(target: "tgadd_bridge::helper", "{}", preview(&raw));
                continue;
            }
        };
        if resp.id != id {
            tracing::warn!(expected = id, got = resp.id, "discarding stale bridge response");
            continue;
        }
        return Ok(resp);
    }
}

async fn write_line(stdin: &mut ChildStdin, line: &str) -> std::io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await
}

fn decode<T: serde::de::DeserializeOwned>(value: serde_json::Value, what: &str) -> PlatformResult<T> {
    serde_json::from_value(value)
        .map_err(|e| PlatformError::Generic(format!("malformed {what} from bridge: {e}")))
}

#[async_trait]
impl PlatformClient for BridgeClient {
    async fn list_dialogs(&self) -> PlatformResult<Vec<GroupDescriptor>> {
        let value = self.call(BridgeOp::ListDialogs).await?;
        let dialogs: Vec<WireDialog> = decode(value, "dialog list")?;
        Ok(dialogs
            .into_iter()
            .filter_map(WireDialog::into_descriptor)
            .collect())
    }

    async fn list_participants(&self, group: &GroupDescriptor) -> PlatformResult<Vec<Participant>> {
        let value = self
            .call(BridgeOp::ListParticipants {
                group_id: group.id.0,
                kind: group.kind,
            })
            .await?;
        let users: Vec<WireUser> = decode(value, "participant list")?;
        Ok(users
            .into_iter()
            .map(|u| Participant { phone: u.phone })
            .collect())
    }

    async fn list_contacts(&self) -> PlatformResult<Vec<Contact>> {
        let value = self.call(BridgeOp::ListContacts).await?;
        let users: Vec<WireUser> = decode(value, "contact list")?;
        Ok(users.into_iter().map(WireUser::into_contact).collect())
    }

    async fn resolve_identity(&self, key: &str) -> PlatformResult<PeerRef> {
        let value = self.call(BridgeOp::Resolve { key }).await?;
        let peer: WirePeer = decode(value, "resolved identity")?;
        peer.into_peer()
    }

    async fn invite_to_channel(&self, channel: GroupId, peer: &PeerRef) -> PlatformResult<()> {
        self.call(BridgeOp::InviteToChannel {
            channel_id: channel.0,
            user_id: peer.user_id,
            access_hash: peer.access_hash,
        })
        .await?;
        Ok(())
    }

    async fn add_to_basic_group(
        &self,
        group: GroupId,
        peer: &PeerRef,
        forward_limit: u32,
    ) -> PlatformResult<()> {
        self.call(BridgeOp::AddChatUser {
            chat_id: group.0,
            user_id: peer.user_id,
            access_hash: peer.access_hash,
            fwd_limit: forward_limit,
        })
        .await?;
        Ok(())
    }
}
