//! Synchronous rendezvous over a request/response region pair.
//!
//! One round trip:
//!
//! 1. The client encodes the request payload into `req[1..]`.
//! 2. The client stores the opcode into `req[0]` (release).
//! 3. The server polls `req[0]` (acquire) until it is non-zero.
//! 4. The server decodes the request and encodes the reply into `resp[1..]`.
//! 5. The server clears `req[0]`, then stores the status into `resp[0]`
//!    (release).
//! 6. The client polls `resp[0]` (acquire), decodes `resp[1..]`, then
//!    clears `resp[0]`.
//!
//! At most one request is outstanding. Each payload has exactly one writer
//! between flag transitions, and every payload write is ordered before the
//! release store that hands it over.

use serde::{Deserialize, Serialize};
use shmdb_types::SessionId;
use shmdb_wire::{Decoder, EMPTY, Encoder, Opcode, Status, WireError, WireResult};

use crate::error::{ChannelError, ChannelResult, ShmResult};
use crate::provider::RegionProvider;
use crate::region::{Region, RegionHandle};
use crate::wait::{Elapsed, Poller};

/// Addresses of one session's channel, as handed out by a spawn.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle {
    pub id: SessionId,
    pub request: RegionHandle,
    pub response: RegionHandle,
}

// ============================================================================
// Server side
// ============================================================================

/// The session's end of a channel.
#[derive(Debug)]
pub struct ServerChannel {
    request: Region,
    response: Region,
    poller: Poller,
}

impl ServerChannel {
    /// Takes ownership of both mappings and resets their flags.
    pub fn attach(request: Region, response: Region, poller: Poller) -> Self {
        request.store_flag(EMPTY);
        response.store_flag(EMPTY);
        Self {
            request,
            response,
            poller,
        }
    }

    pub fn request_handle(&self) -> &RegionHandle {
        self.request.handle()
    }

    pub fn response_handle(&self) -> &RegionHandle {
        self.response.handle()
    }

    /// Bytes available to a reply payload.
    pub fn reply_capacity(&self) -> usize {
        self.response.payload_capacity()
    }

    /// Blocks until the client raises the request flag and returns it.
    ///
    /// The returned byte is raw; the caller decides whether it is a valid
    /// opcode.
    pub fn wait_request(&self) -> Result<u8, Elapsed> {
        self.poller.wait(&self.request)
    }

    /// Decodes the pending request payload.
    pub fn decode_request<T>(
        &self,
        decode: impl FnOnce(&mut Decoder<'_>) -> WireResult<T>,
    ) -> WireResult<T> {
        // SAFETY: called after `wait_request` observed the flag set; the
        // client does not touch `req` again until the response is published.
        let payload = unsafe { self.request.payload() };
        decode(&mut Decoder::new(payload))
    }

    /// Encodes a reply and publishes it with `status`.
    ///
    /// If encoding fails nothing is published and the request stays
    /// pending, so the caller can still respond or abort.
    pub fn respond(
        &mut self,
        status: Status,
        encode: impl FnOnce(&mut Encoder<'_>) -> WireResult<()>,
    ) -> WireResult<()> {
        // SAFETY: the client is polling `resp[0]` and reads nothing until
        // the release store below.
        let payload = unsafe { self.response.payload_mut() };
        encode(&mut Encoder::new(payload))?;
        self.publish(status);
        Ok(())
    }

    /// Publishes [`Status::Aborted`] with no payload.
    pub fn abort(&mut self) {
        self.publish(Status::Aborted);
    }

    fn publish(&self, status: Status) {
        // Clear the request first: once the response is visible the client
        // may raise the request flag for its next call.
        self.request.store_flag(EMPTY);
        self.response.store_flag(status.as_byte());
    }

    /// Gives back both mappings, e.g. to release them after close.
    pub fn into_regions(self) -> (Region, Region) {
        (self.request, self.response)
    }
}

// ============================================================================
// Client side
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientState {
    Open,
    Closed,
    Poisoned,
}

/// The client's end of a channel.
#[derive(Debug)]
pub struct ClientChannel {
    request: Region,
    response: Region,
    poller: Poller,
    state: ClientState,
}

impl ClientChannel {
    pub fn connect(request: Region, response: Region, poller: Poller) -> Self {
        Self {
            request,
            response,
            poller,
            state: ClientState::Open,
        }
    }

    /// Maps both regions of `handle` and connects to them.
    pub fn open(
        provider: &dyn RegionProvider,
        handle: &SessionHandle,
        poller: Poller,
    ) -> ShmResult<Self> {
        let request = provider.map(&handle.request)?;
        let response = provider.map(&handle.response)?;
        Ok(Self::connect(request, response, poller))
    }

    pub fn is_open(&self) -> bool {
        self.state == ClientState::Open
    }

    /// Bytes available to a request payload.
    pub fn request_capacity(&self) -> usize {
        self.request.payload_capacity()
    }

    /// Performs one round trip.
    ///
    /// `encode` writes the request payload; `decode` reads the response
    /// payload given the published status. A failure after the request
    /// flag is raised poisons the channel, since a late or partial response
    /// could otherwise be mistaken for the next call's.
    pub fn call<T>(
        &mut self,
        opcode: Opcode,
        encode: impl FnOnce(&mut Encoder<'_>) -> WireResult<()>,
        decode: impl FnOnce(Status, &mut Decoder<'_>) -> WireResult<T>,
    ) -> ChannelResult<T> {
        match self.state {
            ClientState::Open => {}
            ClientState::Closed => return Err(ChannelError::Closed),
            ClientState::Poisoned => return Err(ChannelError::Poisoned),
        }

        {
            // SAFETY: no request is outstanding, so the server is only
            // polling `req[0]` and never reads the payload until the store.
            let payload = unsafe { self.request.payload_mut() };
            encode(&mut Encoder::new(payload))?;
        }
        self.request.store_flag(opcode.as_byte());

        let raw = match self.poller.wait(&self.response) {
            Ok(raw) => raw,
            Err(Elapsed(waited)) => {
                self.state = ClientState::Poisoned;
                return Err(ChannelError::Timeout { waited });
            }
        };

        let result = self.finish(opcode, raw, decode);
        self.response.store_flag(EMPTY);
        result
    }

    fn finish<T>(
        &mut self,
        opcode: Opcode,
        raw: u8,
        decode: impl FnOnce(Status, &mut Decoder<'_>) -> WireResult<T>,
    ) -> ChannelResult<T> {
        let status = match Status::try_from(raw) {
            Ok(status) => status,
            Err(e) => {
                self.state = ClientState::Poisoned;
                return Err(e.into());
            }
        };

        if status == Status::Aborted {
            self.state = ClientState::Closed;
            return Err(ChannelError::Aborted);
        }

        // SAFETY: the acquire load in `wait` observed the server's release
        // store; the server writes `resp[1..]` again only after our next
        // request flag.
        let payload = unsafe { self.response.payload() };
        let decoded = decode(status, &mut Decoder::new(payload)).map_err(|e: WireError| {
            self.state = ClientState::Poisoned;
            ChannelError::from(e)
        })?;

        if opcode == Opcode::Close {
            self.state = ClientState::Closed;
        }
        Ok(decoded)
    }
}
