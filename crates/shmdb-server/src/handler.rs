//! Request handler that routes decoded requests to the backend.

use shmdb_backend::{Backend, BackendError, BackendResult};
use shmdb_wire::{Encoder, Reply, Request, Status, WireResult};
use tracing::instrument;

/// Routes data requests to a backend on behalf of one session.
///
/// Close never reaches the handler; the session handles it itself since it
/// ends the serve loop.
pub struct RequestHandler<'a, B: Backend> {
    backend: &'a B,
}

impl<'a, B: Backend> RequestHandler<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Executes a request against the session's backend context.
    #[instrument(skip_all, fields(op = %request.opcode()))]
    pub fn handle(&self, ctx: &mut B::Context, request: Request) -> BackendResult<Reply> {
        match request {
            Request::Read(r) => self
                .backend
                .read(ctx, &r.table, &r.key, &r.fields)
                .map(Reply::Record),
            Request::Scan(s) => self
                .backend
                .scan(ctx, &s.table, &s.start_key, s.count, &s.fields)
                .map(Reply::Rows),
            Request::Insert(w) => self
                .backend
                .insert(ctx, &w.table, &w.key, &w.values)
                .map(|()| Reply::Empty),
            Request::Update(w) => self
                .backend
                .update(ctx, &w.table, &w.key, &w.values)
                .map(|()| Reply::Empty),
            Request::Delete(d) => self
                .backend
                .delete(ctx, &d.table, &d.key)
                .map(|()| Reply::Empty),
            Request::Close => Ok(Reply::Empty),
        }
    }
}

/// The status byte a backend outcome is published with.
pub fn status_of(outcome: &BackendResult<Reply>) -> Status {
    match outcome {
        Ok(_) => Status::Ok,
        Err(BackendError::NotFound) => Status::NotFound,
        Err(BackendError::Conflict(_)) => Status::Conflict,
        Err(_) => Status::Failed,
    }
}

/// Encodes the payload that accompanies `outcome`.
///
/// NotFound carries an empty sequence so a reader expecting rows sees none;
/// Failed carries the error message.
pub fn encode_outcome(outcome: &BackendResult<Reply>, enc: &mut Encoder<'_>) -> WireResult<()> {
    match outcome {
        Ok(reply) => reply.encode_payload(enc),
        Err(BackendError::NotFound) => enc.put_u64(0),
        Err(BackendError::Conflict(_)) => Ok(()),
        Err(e) => enc.put_str(&e.to_string()),
    }
}
