//! Session lifecycle and serve loop.
//!
//! ```text
//! Created ──► Attached ──► Ready ──► Serving ──► Closing ──► Terminated
//!    │           │                                              ▲
//!    └───────────┴──────────── startup failure ─────────────────┘
//! ```
//!
//! The connection manager drives a session to `Ready` on its own thread and
//! reports startup failures to the spawn caller. From then on only the serve
//! loop moves the session: a Close request or a protocol violation ends it.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use shmdb_backend::{Backend, BackendError};
use shmdb_shm::{RegionHandle, RegionProvider, ServerChannel};
use shmdb_types::SessionId;
use shmdb_wire::{Encoder, Opcode, Request, Status, U64_LEN, WireResult};

use crate::config::ServerConfig;
use crate::error::{ProtocolError, ServerResult};
use crate::handler::{RequestHandler, encode_outcome, status_of};
use crate::metrics::ServerMetrics;

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionState {
    /// Region handles exist but are not mapped yet.
    Created = 0,
    /// Both regions are mapped and their flags cleared.
    Attached = 1,
    /// The backend context exists.
    Ready = 2,
    /// The serve loop is running.
    Serving = 3,
    /// The final response is published; resources are being released.
    Closing = 4,
    Terminated = 5,
}

impl SessionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Created,
            1 => Self::Attached,
            2 => Self::Ready,
            3 => Self::Serving,
            4 => Self::Closing,
            _ => Self::Terminated,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Terminated
    }

    /// Returns true if `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: Self) -> bool {
        use SessionState::{Attached, Closing, Created, Ready, Serving, Terminated};
        matches!(
            (self, next),
            (Created, Attached | Terminated)
                | (Attached, Ready | Terminated)
                | (Ready, Serving)
                | (Serving, Closing)
                | (Closing, Terminated)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Attached => "attached",
            Self::Ready => "ready",
            Self::Serving => "serving",
            Self::Closing => "closing",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Session state shared between the session thread and its supervisor.
#[derive(Debug, Clone)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(SessionState::Created as u8)))
    }

    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn advance(&self, next: SessionState) {
        let current = self.get();
        debug_assert!(
            current.can_advance_to(next),
            "illegal session transition {current} -> {next}"
        );
        self.0.store(next as u8, Ordering::Release);
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Session
// ============================================================================

/// What a session reports when its thread finishes after a Close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: SessionId,
    /// Requests served, the final Close included.
    pub requests: u64,
}

/// Where a session's regions come from.
pub(crate) struct SessionRegions {
    pub request: RegionHandle,
    pub response: RegionHandle,
    /// Release both handles on teardown. False for client-provided regions.
    pub owned: bool,
}

enum Step {
    Continue,
    Close,
}

/// One client connection: a channel plus an exclusively owned backend
/// context, served on a dedicated thread.
pub struct Session<B: Backend> {
    id: SessionId,
    backend: Arc<B>,
    provider: Arc<dyn RegionProvider>,
    channel: ServerChannel,
    ctx: B::Context,
    owned: bool,
    state: StateCell,
    metrics: Arc<ServerMetrics>,
    requests: u64,
}

impl<B: Backend> Session<B> {
    /// Maps the regions and obtains a backend context (Created → Ready).
    pub(crate) fn start(
        id: SessionId,
        backend: Arc<B>,
        provider: Arc<dyn RegionProvider>,
        regions: &SessionRegions,
        config: &ServerConfig,
        state: StateCell,
        metrics: Arc<ServerMetrics>,
    ) -> ServerResult<Self> {
        let mapped = provider
            .map(&regions.request)
            .and_then(|req| Ok((req, provider.map(&regions.response)?)));
        let (request, response) = match mapped {
            Ok(pair) => pair,
            Err(e) => {
                state.advance(SessionState::Terminated);
                return Err(e.into());
            }
        };
        let channel = ServerChannel::attach(request, response, config.poller());
        state.advance(SessionState::Attached);
        tracing::debug!(session_id = %id, "session attached");

        let ctx = match backend.init() {
            Ok(ctx) => ctx,
            Err(e) => {
                state.advance(SessionState::Terminated);
                return Err(e.into());
            }
        };
        state.advance(SessionState::Ready);
        tracing::debug!(session_id = %id, backend = backend.name(), "session ready");

        Ok(Self {
            id,
            backend,
            provider,
            channel,
            ctx,
            owned: regions.owned,
            state,
            metrics,
            requests: 0,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Serves requests until Close, then tears down.
    ///
    /// A protocol violation publishes [`Status::Aborted`], tears down, and
    /// returns the violation.
    pub fn serve(mut self) -> ServerResult<SessionSummary> {
        self.state.advance(SessionState::Serving);
        tracing::info!(session_id = %self.id, "session serving");

        loop {
            let Ok(raw) = self.channel.wait_request() else {
                continue;
            };
            self.requests += 1;

            match self.step(raw) {
                Ok(Step::Continue) => {}
                Ok(Step::Close) => {
                    let summary = SessionSummary {
                        id: self.id,
                        requests: self.requests,
                    };
                    self.teardown();
                    tracing::info!(session_id = %summary.id, requests = summary.requests, "session terminated");
                    return Ok(summary);
                }
                Err(e) => {
                    tracing::error!(session_id = %self.id, error = %e, "protocol violation, aborting session");
                    self.metrics.protocol_error();
                    self.channel.abort();
                    self.teardown();
                    return Err(e.into());
                }
            }
        }
    }

    fn step(&mut self, raw: u8) -> Result<Step, ProtocolError> {
        let opcode = Opcode::try_from(raw).map_err(|_| ProtocolError::UnknownOpcode(raw))?;
        let started = Instant::now();

        let request = self
            .channel
            .decode_request(|dec| Request::decode(opcode, dec))
            .map_err(|source| ProtocolError::Malformed { opcode, source })?;

        if request == Request::Close {
            // Published before teardown so the client observes completion
            // while the regions are still mapped.
            self.publish(Status::Ok, |_| Ok(()))?;
            self.metrics
                .record_operation(opcode, Status::Ok, started.elapsed());
            return Ok(Step::Close);
        }

        let outcome = RequestHandler::new(self.backend.as_ref()).handle(&mut self.ctx, request);
        match &outcome {
            Ok(_) | Err(BackendError::NotFound) => {}
            Err(e) => {
                tracing::warn!(session_id = %self.id, op = %opcode, error = %e, "backend operation failed");
            }
        }

        let status = self.publish(status_of(&outcome), |enc| encode_outcome(&outcome, enc))?;
        self.metrics
            .record_operation(opcode, status, started.elapsed());
        Ok(Step::Continue)
    }

    /// Publishes a response, downgrading to [`Status::Failed`] with an
    /// explanation when the payload does not fit the response region.
    fn publish(
        &mut self,
        status: Status,
        encode: impl FnOnce(&mut Encoder<'_>) -> WireResult<()>,
    ) -> Result<Status, ProtocolError> {
        let Err(e) = self.channel.respond(status, encode) else {
            return Ok(status);
        };

        let capacity = self.channel.reply_capacity();
        let message = format!("{status} reply does not fit the response region: {e}");
        let mut end = message.len().min(capacity.saturating_sub(U64_LEN));
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        tracing::warn!(session_id = %self.id, capacity, "reply overflowed, sending failure");

        self.channel
            .respond(Status::Failed, |enc| enc.put_str(&message[..end]))
            .map_err(|_| ProtocolError::ResponseOverflow { capacity })?;
        Ok(Status::Failed)
    }

    /// Serving → Closing → Terminated: unmaps the regions, releases them if
    /// this session allocated them, and closes the backend context.
    fn teardown(self) {
        let Self {
            id,
            backend,
            provider,
            channel,
            ctx,
            owned,
            state,
            metrics,
            ..
        } = self;
        state.advance(SessionState::Closing);

        let (request, response) = channel.into_regions();
        let handles = [request.handle().clone(), response.handle().clone()];
        drop(request);
        drop(response);

        if owned {
            for handle in &handles {
                if let Err(e) = provider.release(handle) {
                    tracing::warn!(session_id = %id, %handle, error = %e, "failed to release region");
                }
            }
        }
        if let Err(e) = backend.close(ctx) {
            tracing::warn!(session_id = %id, error = %e, "backend context close failed");
        }

        state.advance(SessionState::Terminated);
        metrics.session_terminated();
    }
}
