//! Transport for the agent exchange.
//!
//! [`JsonLines`] frames messages as newline-terminated JSON over any tokio
//! byte stream; [`accept_agent`] produces one over TCP. [`LoopbackAgent`]
//! answers in-process, for tests and for driving an episode without a
//! socket.

use std::collections::VecDeque;
use std::net::SocketAddr;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use super::protocol::{AgentMessage, SimMessage};
use crate::config::TransportConfig;
use crate::error::BridgeError;

/// The simulation's side of the agent exchange.
///
/// Every call is a rendezvous: the episode does not advance until it
/// resolves.
#[allow(async_fn_in_trait)]
pub trait AgentChannel {
    async fn send(&mut self, msg: &SimMessage) -> Result<(), BridgeError>;

    async fn recv(&mut self) -> Result<AgentMessage, BridgeError>;

    async fn close(&mut self) -> Result<(), BridgeError>;
}

// ---------------------------------------------------------------------------
// JsonLines
// ---------------------------------------------------------------------------

/// Newline-delimited JSON framing over a byte stream.
///
/// Direction-agnostic: the simulation uses it through [`AgentChannel`], an
/// agent written in Rust can use [`write_message`](Self::write_message) and
/// [`read_message`](Self::read_message) with the message types swapped.
pub struct JsonLines<S> {
    stream: BufReader<S>,
    line: String,
}

/// Agent channel over an accepted TCP connection.
pub type TcpChannel = JsonLines<TcpStream>;

impl<S> JsonLines<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
            line: String::new(),
        }
    }

    pub async fn write_message<T: Serialize>(&mut self, msg: &T) -> Result<(), BridgeError> {
        let mut buf = serde_json::to_vec(msg)?;
        buf.push(b'\n');
        self.stream.write_all(&buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read the next non-blank line and decode it. EOF is
    /// [`BridgeError::ChannelClosed`].
    pub async fn read_message<T: DeserializeOwned>(&mut self) -> Result<T, BridgeError> {
        loop {
            self.line.clear();
            let n = self.stream.read_line(&mut self.line).await?;
            if n == 0 {
                return Err(BridgeError::ChannelClosed);
            }
            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Ok(serde_json::from_str(trimmed)?);
        }
    }

    pub async fn shutdown(&mut self) -> Result<(), BridgeError> {
        self.stream.shutdown().await?;
        Ok(())
    }

    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }
}

impl<S> AgentChannel for JsonLines<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn send(&mut self, msg: &SimMessage) -> Result<(), BridgeError> {
        debug!(kind = msg.kind(), "-> agent");
        self.write_message(msg).await
    }

    async fn recv(&mut self) -> Result<AgentMessage, BridgeError> {
        let msg: AgentMessage = self.read_message().await?;
        debug!(kind = msg.kind(), "<- agent");
        Ok(msg)
    }

    async fn close(&mut self) -> Result<(), BridgeError> {
        self.shutdown().await
    }
}

/// Bind the configured address, wait for one agent and hand back its channel.
pub async fn accept_agent(config: &TransportConfig) -> Result<(TcpChannel, SocketAddr), BridgeError> {
    let listener = TcpListener::bind((config.bind_address.as_str(), config.port)).await?;
    info!(addr = %listener.local_addr()?, "waiting for agent to connect");
    let (stream, peer) = listener.accept().await?;
    stream.set_nodelay(true)?;
    Ok((JsonLines::new(stream), peer))
}

// ---------------------------------------------------------------------------
// LoopbackAgent
// ---------------------------------------------------------------------------

/// An in-process agent: a policy closure answers every message the
/// simulation sends.
///
/// `init` is acknowledged automatically; for `state` the policy's answer is
/// returned by the next `recv`. A policy returning `None` makes that `recv`
/// fail with [`BridgeError::ChannelClosed`], as a vanished agent would.
pub struct LoopbackAgent<F> {
    policy: F,
    pending: VecDeque<AgentMessage>,
    /// Every message the simulation sent, in order.
    pub sent: Vec<SimMessage>,
    pub closed: bool,
}

impl<F> LoopbackAgent<F>
where
    F: FnMut(&SimMessage) -> Option<AgentMessage>,
{
    pub fn new(policy: F) -> Self {
        Self {
            policy,
            pending: VecDeque::new(),
            sent: Vec::new(),
            closed: false,
        }
    }

    /// Number of `state` messages received.
    pub fn states(&self) -> usize {
        self.sent.iter().filter(|m| matches!(m, SimMessage::State { .. })).count()
    }

    /// Number of `end` messages received.
    pub fn ends(&self) -> usize {
        self.sent.iter().filter(|m| matches!(m, SimMessage::End { .. })).count()
    }
}

impl<F> AgentChannel for LoopbackAgent<F>
where
    F: FnMut(&SimMessage) -> Option<AgentMessage>,
{
    async fn send(&mut self, msg: &SimMessage) -> Result<(), BridgeError> {
        if self.closed {
            return Err(BridgeError::ChannelClosed);
        }
        match msg {
            SimMessage::Init { .. } => self.pending.push_back(AgentMessage::InitAck),
            SimMessage::State { .. } => {
                if let Some(reply) = (self.policy)(msg) {
                    self.pending.push_back(reply);
                }
            }
            SimMessage::End { .. } => {}
        }
        self.sent.push(msg.clone());
        Ok(())
    }

    async fn recv(&mut self) -> Result<AgentMessage, BridgeError> {
        self.pending.pop_front().ok_or(BridgeError::ChannelClosed)
    }

    async fn close(&mut self) -> Result<(), BridgeError> {
        self.closed = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
