//! Typed client over one session's channel.

use std::time::Duration;

use shmdb_config::{ShmdbConfig, WaitMode};
use shmdb_shm::{
    ChannelError, ClientChannel, ControlRegion, Poller, RegionHandle, RegionProvider,
    SessionHandle, WaitStrategy,
};
use shmdb_types::{KvPair, Record, ResultSet, Schema, SessionId};
use shmdb_wire::{
    Decoder, DeleteRequest, ReadRequest, Request, SCHEMA_MESSAGE, ScanRequest, Status,
    WireResult, WriteRequest,
};

use crate::error::{ClientError, ClientResult};

/// Client configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// What the client does while waiting for a response.
    pub wait: WaitStrategy,
    /// Empty polls spent spinning before `wait` applies.
    pub spin_limit: u32,
    /// Give up on a response after this long. `None` waits forever.
    pub poll_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            wait: WaitStrategy::default(),
            spin_limit: 1_000,
            poll_timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn with_wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = Some(timeout);
        self
    }

    fn poller(&self) -> Poller {
        Poller::new(self.wait)
            .with_spin_limit(self.spin_limit)
            .with_deadline(self.poll_timeout)
    }
}

impl From<&ShmdbConfig> for ClientConfig {
    fn from(config: &ShmdbConfig) -> Self {
        let session = &config.session;
        let wait = match session.wait {
            WaitMode::Spin => WaitStrategy::Spin,
            WaitMode::Yield => WaitStrategy::Yield,
            WaitMode::Sleep => WaitStrategy::Sleep(session.sleep_interval()),
        };
        Self {
            wait,
            spin_limit: session.spin_limit,
            poll_timeout: session.poll_timeout(),
        }
    }
}

/// One connection to a session.
///
/// Calls are synchronous: each returns once the session has published its
/// response. NotFound, Conflict and Failed leave the connection usable; any
/// channel error other than an oversized request ends it.
#[derive(Debug)]
pub struct Client {
    id: SessionId,
    channel: ClientChannel,
}

impl Client {
    /// Maps the regions of a spawned session.
    pub fn connect(
        provider: &dyn RegionProvider,
        handle: &SessionHandle,
        config: &ClientConfig,
    ) -> ClientResult<Self> {
        let channel = ClientChannel::open(provider, handle, config.poller())?;
        tracing::debug!(session_id = %handle.id, "client connected");
        Ok(Self {
            id: handle.id,
            channel,
        })
    }

    pub fn session_id(&self) -> SessionId {
        self.id
    }

    /// Returns false after Close, an abort, or a fatal channel error.
    pub fn is_open(&self) -> bool {
        self.channel.is_open()
    }

    /// Reads one record. An empty `fields` slice selects every column.
    pub fn read(&mut self, table: &str, key: &str, fields: &[&str]) -> ClientResult<Record> {
        let request = Request::Read(ReadRequest {
            table: table.to_string(),
            key: key.to_string(),
            fields: owned(fields),
        });
        self.call(&request, |dec| dec.take_seq())
    }

    /// Reads up to `count` records starting at `start_key`, in key order.
    pub fn scan(
        &mut self,
        table: &str,
        start_key: &str,
        count: u64,
        fields: &[&str],
    ) -> ClientResult<ResultSet> {
        let request = Request::Scan(ScanRequest {
            table: table.to_string(),
            start_key: start_key.to_string(),
            count,
            fields: owned(fields),
        });
        self.call(&request, |dec| dec.take_seq())
    }

    pub fn insert(&mut self, table: &str, key: &str, values: &[KvPair]) -> ClientResult<()> {
        let request = Request::Insert(write(table, key, values));
        self.call(&request, |_| Ok(()))
    }

    pub fn update(&mut self, table: &str, key: &str, values: &[KvPair]) -> ClientResult<()> {
        let request = Request::Update(write(table, key, values));
        self.call(&request, |_| Ok(()))
    }

    pub fn delete(&mut self, table: &str, key: &str) -> ClientResult<()> {
        let request = Request::Delete(DeleteRequest {
            table: table.to_string(),
            key: key.to_string(),
        });
        self.call(&request, |_| Ok(()))
    }

    /// Ends the session. The session's regions may be unmapped as soon as
    /// this returns.
    ///
    /// Closing twice is a protocol error. The client refuses it locally with
    /// [`ChannelError::Closed`] instead of raising a request flag nobody
    /// serves any more.
    pub fn close(&mut self) -> ClientResult<()> {
        self.call(&Request::Close, |_| Ok(()))?;
        tracing::debug!(session_id = %self.id, "client closed");
        Ok(())
    }

    fn call<T>(
        &mut self,
        request: &Request,
        decode: impl FnOnce(&mut Decoder<'_>) -> WireResult<T>,
    ) -> ClientResult<T> {
        let outcome = self.channel.call(
            request.opcode(),
            |enc| request.encode_payload(enc),
            |status, dec| {
                Ok(match status {
                    Status::Ok => Ok(decode(dec)?),
                    Status::NotFound => Err(ClientError::NotFound),
                    Status::Conflict => Err(ClientError::Conflict),
                    Status::Failed => Err(ClientError::Failed(dec.take_string()?)),
                    Status::Aborted => Err(ClientError::Channel(ChannelError::Aborted)),
                })
            },
        );

        match outcome {
            Ok(result) => result,
            Err(e) => {
                if e.is_fatal() {
                    tracing::warn!(session_id = %self.id, op = %request.opcode(), error = %e, "call failed");
                }
                Err(e.into())
            }
        }
    }
}

fn owned(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| (*f).to_string()).collect()
}

fn write(table: &str, key: &str, values: &[KvPair]) -> WriteRequest {
    WriteRequest {
        table: table.to_string(),
        key: key.to_string(),
        values: values.to_vec(),
    }
}

// ============================================================================
// Schema publication
// ============================================================================

/// A schema posted to a control region, awaiting installation.
#[derive(Debug)]
pub struct SchemaPublication {
    control: ControlRegion,
}

impl SchemaPublication {
    /// The handle to pass to the connection manager.
    pub fn handle(&self) -> &RegionHandle {
        self.control.handle()
    }

    /// The server's verdict, or `None` while the schema is still pending.
    pub fn acknowledgement(&self) -> Option<ClientResult<()>> {
        match self.control.status()? {
            Status::Ok => Some(Ok(())),
            Status::Conflict => Some(Err(ClientError::Conflict)),
            Status::NotFound => Some(Err(ClientError::NotFound)),
            Status::Failed | Status::Aborted => Some(Err(ClientError::Failed(
                "schema rejected by server".to_string(),
            ))),
        }
    }
}

/// Allocates a control region and posts `schema` to it.
///
/// The region belongs to the caller, who releases it once the publication
/// is acknowledged.
pub fn publish_schema(
    provider: &dyn RegionProvider,
    schema: &Schema,
    capacity: usize,
) -> ClientResult<SchemaPublication> {
    let mut control = ControlRegion::new(provider.allocate_mapped(capacity)?);
    if let Err(e) = control.post(SCHEMA_MESSAGE, |enc| enc.put(schema)) {
        let handle = control.handle().clone();
        drop(control);
        if let Err(release) = provider.release(&handle) {
            tracing::warn!(%handle, error = %release, "failed to release control region");
        }
        return Err(e.into());
    }
    tracing::debug!(handle = %control.handle(), tables = schema.tables.len(), "schema published");
    Ok(SchemaPublication { control })
}
