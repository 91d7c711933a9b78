//! Connection manager: schema installation, session spawn and supervision.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use shmdb_backend::Backend;
use shmdb_shm::{ControlRegion, RegionHandle, RegionProvider, SessionHandle};
use shmdb_types::{Schema, SessionId};
use shmdb_wire::{SCHEMA_MESSAGE, Status};

use crate::config::ServerConfig;
use crate::error::{ProtocolError, ServerError, ServerResult};
use crate::metrics::ServerMetrics;
use crate::session::{Session, SessionRegions, SessionState, SessionSummary, StateCell};

struct SessionMonitor {
    state: StateCell,
    thread: JoinHandle<ServerResult<SessionSummary>>,
}

/// Creates sessions and tracks them until they are joined.
///
/// There is no process-wide instance: construct one and pass it to whatever
/// needs to spawn sessions. Serving sessions share nothing with each other
/// or with the manager beyond their state cell, so `spawn` may run
/// concurrently with itself and with any number of live sessions.
pub struct ConnectionManager<B: Backend> {
    backend: Arc<B>,
    provider: Arc<dyn RegionProvider>,
    config: ServerConfig,
    metrics: Arc<ServerMetrics>,
    schema: Mutex<Option<Schema>>,
    next_id: AtomicU64,
    sessions: Mutex<HashMap<SessionId, SessionMonitor>>,
}

impl<B: Backend> ConnectionManager<B> {
    pub fn new(
        backend: Arc<B>,
        provider: Arc<dyn RegionProvider>,
        config: ServerConfig,
    ) -> ServerResult<Self> {
        Ok(Self {
            backend,
            provider,
            config,
            metrics: Arc::new(ServerMetrics::new()?),
            schema: Mutex::new(None),
            next_id: AtomicU64::new(1),
            sessions: Mutex::new(HashMap::new()),
        })
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn provider(&self) -> &Arc<dyn RegionProvider> {
        &self.provider
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ServerMetrics {
        &self.metrics
    }

    /// The installed schema, if any.
    pub fn schema(&self) -> Option<Schema> {
        self.schema
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ------------------------------------------------------------------------
    // Schema
    // ------------------------------------------------------------------------

    /// Records the storage location and creates every table. Must complete
    /// before the first spawn, and succeeds at most once.
    pub fn install_schema(&self, schema: Schema) -> ServerResult<()> {
        let mut installed = self.schema.lock().unwrap_or_else(PoisonError::into_inner);
        if installed.is_some() {
            return Err(ServerError::SchemaAlreadyInstalled);
        }

        self.backend.create_schema(&schema.tables)?;
        tracing::info!(
            tables = schema.tables.len(),
            location = %schema.location,
            backend = self.backend.name(),
            "schema installed"
        );
        *installed = Some(schema);
        Ok(())
    }

    /// Installs a schema posted to a control region, then acknowledges it in
    /// that region's flag.
    pub fn install_schema_from_region(&self, handle: &RegionHandle) -> ServerResult<()> {
        let control = ControlRegion::new(self.provider.map(handle)?);

        let flag = control.flag();
        if flag != SCHEMA_MESSAGE {
            return Err(ProtocolError::UnexpectedControlFlag(flag).into());
        }

        let schema = match control.read(|dec| dec.take::<Schema>()) {
            Some(Ok(schema)) => schema,
            Some(Err(e)) => {
                control.acknowledge(Status::Failed);
                return Err(e.into());
            }
            None => return Err(ProtocolError::UnexpectedControlFlag(flag).into()),
        };

        let result = self.install_schema(schema);
        control.acknowledge(match &result {
            Ok(()) => Status::Ok,
            Err(ServerError::SchemaAlreadyInstalled) => Status::Conflict,
            Err(_) => Status::Failed,
        });
        result
    }

    // ------------------------------------------------------------------------
    // Spawn
    // ------------------------------------------------------------------------

    /// Allocates a region pair and starts a session serving it.
    ///
    /// The regions are released when the session terminates. If anything
    /// fails before the session is ready, the regions are released, the
    /// error is returned, and no session exists.
    pub fn spawn(&self) -> ServerResult<SessionHandle> {
        self.ensure_schema()?;

        let capacity = self.config.capacity;
        let request = self.provider.allocate(capacity).inspect_err(|_| {
            self.metrics.spawn_failed();
        })?;
        let response = match self.provider.allocate(capacity) {
            Ok(handle) => handle,
            Err(e) => {
                self.metrics.spawn_failed();
                self.release_quietly(&request);
                return Err(e.into());
            }
        };

        self.launch(SessionRegions {
            request,
            response,
            owned: true,
        })
    }

    /// Starts a session over regions the client allocated.
    ///
    /// The session unmaps but never releases them.
    pub fn spawn_with(
        &self,
        request: RegionHandle,
        response: RegionHandle,
    ) -> ServerResult<SessionHandle> {
        self.ensure_schema()?;
        self.launch(SessionRegions {
            request,
            response,
            owned: false,
        })
    }

    fn ensure_schema(&self) -> ServerResult<()> {
        if self
            .schema
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
        {
            return Err(ServerError::SchemaNotInstalled);
        }
        Ok(())
    }

    fn launch(&self, regions: SessionRegions) -> ServerResult<SessionHandle> {
        let id = SessionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let state = StateCell::new();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<ServerResult<()>>(1);

        let handle = SessionHandle {
            id,
            request: regions.request.clone(),
            response: regions.response.clone(),
        };

        let spawned = {
            let backend = Arc::clone(&self.backend);
            let provider = Arc::clone(&self.provider);
            let metrics = Arc::clone(&self.metrics);
            let config = self.config.clone();
            let state = state.clone();
            let regions = SessionRegions {
                request: regions.request.clone(),
                response: regions.response.clone(),
                owned: regions.owned,
            };

            thread::Builder::new()
                .name(format!("{}-{}", self.config.thread_name_prefix, id.as_u64()))
                .spawn(move || {
                    let session = match Session::start(
                        id, backend, provider, &regions, &config, state, metrics.clone(),
                    ) {
                        Ok(session) => session,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return Err(ServerError::StartupFailed(id));
                        }
                    };
                    metrics.session_spawned();
                    let _ = ready_tx.send(Ok(()));
                    session.serve()
                })
        };

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                self.discard(&regions);
                return Err(e.into());
            }
        };

        let startup = ready_rx.recv();
        match startup {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread.join();
                self.discard(&regions);
                tracing::warn!(session_id = %id, error = %e, "session failed to start");
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                self.discard(&regions);
                return Err(ServerError::SessionPanicked(id));
            }
        }

        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, SessionMonitor { state, thread });
        tracing::info!(
            session_id = %id,
            request = %handle.request,
            response = %handle.response,
            owned = regions.owned,
            "session spawned"
        );
        Ok(handle)
    }

    fn discard(&self, regions: &SessionRegions) {
        self.metrics.spawn_failed();
        if regions.owned {
            self.release_quietly(&regions.request);
            self.release_quietly(&regions.response);
        }
    }

    fn release_quietly(&self, handle: &RegionHandle) {
        if let Err(e) = self.provider.release(handle) {
            tracing::warn!(%handle, error = %e, "failed to release region");
        }
    }

    // ------------------------------------------------------------------------
    // Supervision
    // ------------------------------------------------------------------------

    /// Current state of a supervised session.
    pub fn session_state(&self, id: SessionId) -> Option<SessionState> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(|m| m.state.get())
    }

    /// Supervised sessions that have not terminated yet.
    pub fn active_sessions(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|m| !m.state.get().is_terminal())
            .count()
    }

    /// Ids of every supervised session, in spawn order.
    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Waits for a session's thread to finish and returns how it ended.
    pub fn join(&self, id: SessionId) -> ServerResult<SessionSummary> {
        let monitor = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .ok_or(ServerError::UnknownSession(id))?;
        monitor
            .thread
            .join()
            .map_err(|_| ServerError::SessionPanicked(id))?
    }

    /// Joins every session whose thread has already finished.
    pub fn reap(&self) -> Vec<(SessionId, ServerResult<SessionSummary>)> {
        let finished: Vec<(SessionId, SessionMonitor)> = {
            let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
            let ids: Vec<SessionId> = sessions
                .iter()
                .filter(|(_, m)| m.thread.is_finished())
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| sessions.remove(&id).map(|m| (id, m)))
                .collect()
        };

        let mut reaped: Vec<_> = finished
            .into_iter()
            .map(|(id, monitor)| {
                let result = monitor
                    .thread
                    .join()
                    .map_err(|_| ServerError::SessionPanicked(id))
                    .and_then(|r| r);
                (id, result)
            })
            .collect();
        reaped.sort_unstable_by_key(|(id, _)| *id);
        reaped
    }
}

impl<B: Backend> std::fmt::Debug for ConnectionManager<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("backend", &self.backend.name())
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .field("sessions", &self.session_ids().len())
            .finish_non_exhaustive()
    }
}
