//! Server module - accepting connections and dispatching their envelopes.
//!
//! Provides:
//! - [`ConnectionManager`] - connection table, read loops and dispatch
//! - [`DispatchTable`] - message type name to handler method, built once
//! - [`Connection`] - handle passed to handlers as the socket argument
//! - [`ServerOptions`] - configuration
//!
//! # Dispatch
//!
//! Every inbound envelope is resolved to a message type name through the
//! schema registry and then to a handler through the dispatch table.
//! Envelopes that resolve to nothing are dropped without a reply. Handler
//! failures are logged and never close the connection.

mod connection;
mod dispatch;
mod options;

pub use connection::Connection;
pub use dispatch::{DispatchEntry, DispatchTable};
pub use options::{DispatchMode, ServerOptions, DEFAULT_READ_BUFFER_SIZE};

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::codec::WireCodec;
use crate::error::Result;
use crate::handler::HandlerRegistry;
use crate::inject::DependencyProvider;
use crate::protocol::{Envelope, FrameBuffer};
use crate::schema::SchemaRegistry;
use crate::transport::Acceptor;
use crate::writer::{spawn_writer_task, WriterConfig};

/// Why an envelope was not handed to a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Bytes are not a complete envelope.
    Malformed,
    /// No contract is registered at this index.
    UnknownContract(u32),
    /// The contract has no message type at this slot.
    UnknownMessage {
        /// Contract index.
        contract: u32,
        /// Message slot.
        slot: u16,
    },
    /// The message type has no handler.
    Unhandled(String),
    /// The payload does not decode as the message type.
    UndecodablePayload(String),
    /// The handler panicked before returning its future.
    HandlerPanicked(String),
}

/// Result of dispatching one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler for this message type was started.
    Invoked(String),
    /// The envelope was dropped.
    Dropped(DropReason),
}

impl DispatchOutcome {
    /// Whether a handler was started.
    pub fn is_invoked(&self) -> bool {
        matches!(self, DispatchOutcome::Invoked(_))
    }
}

struct Inner {
    table: DispatchTable,
    codec: WireCodec,
    options: ServerOptions,
    connections: RwLock<HashMap<String, Arc<Connection>>>,
    active_count: AtomicUsize,
    shutdown: watch::Sender<bool>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

/// Accepts connections and routes their envelopes to handlers.
///
/// Cheap to clone; clones share the connection table and dispatch table.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Build the dispatch table and create a manager.
    ///
    /// Every handler type in `handlers` is instantiated here, once, with
    /// constructor dependencies resolved through `provider`.
    pub fn new(
        handlers: &HandlerRegistry,
        schemas: Arc<dyn SchemaRegistry>,
        provider: &dyn DependencyProvider,
        options: ServerOptions,
    ) -> Result<Self> {
        let table = DispatchTable::build(handlers, provider)?;
        debug!(message_types = table.len(), "dispatch table built");

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            inner: Arc::new(Inner {
                table,
                codec: WireCodec::new(schemas),
                options,
                connections: RwLock::new(HashMap::new()),
                active_count: AtomicUsize::new(0),
                shutdown,
                accept_task: Mutex::new(None),
            }),
        })
    }

    /// The dispatch table.
    pub fn table(&self) -> &DispatchTable {
        &self.inner.table
    }

    /// Codec bound to the schema registry.
    pub fn codec(&self) -> &WireCodec {
        &self.inner.codec
    }

    /// Active options.
    pub fn options(&self) -> &ServerOptions {
        &self.inner.options
    }

    /// Spawn the accept loop for `acceptor`.
    ///
    /// The loop runs until [`close`](Self::close); the acceptor is dropped
    /// when it stops.
    pub fn start<A: Acceptor>(&self, mut acceptor: A) {
        let manager = self.clone();
        let mut shutdown = self.inner.shutdown.subscribe();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = acceptor.accept() => match accepted {
                        Ok(stream) => {
                            manager.on_connect(stream).await;
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    },
                    _ = shutdown.changed() => break,
                }
            }
            debug!("accept loop stopped");
        });

        let previous = self
            .inner
            .accept_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Register an accepted stream and start reading from it.
    pub async fn on_connect<S>(&self, stream: S) -> Arc<Connection>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (writer, writer_task) = spawn_writer_task(
            writer,
            WriterConfig {
                channel_capacity: self.inner.options.channel_capacity,
            },
        );

        let conn = Arc::new(Connection::new(
            Uuid::new_v4().to_string(),
            writer,
            self.inner.codec.clone(),
        ));

        let conn_id = conn.id().to_string();
        tokio::spawn(async move {
            match writer_task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(conn_id = %conn_id, error = %e, "write failed"),
                Err(e) if e.is_panic() => error!(conn_id = %conn_id, "writer task panicked"),
                Err(_) => {}
            }
        });
        self.add(conn.clone()).await;
        debug!(conn_id = %conn.id(), "connection opened");

        let manager = self.clone();
        let shutdown = self.inner.shutdown.subscribe();
        let read_conn = conn.clone();
        tokio::spawn(async move {
            match manager.read_loop(&read_conn, reader, shutdown).await {
                Ok(()) => debug!(conn_id = %read_conn.id(), "connection closed"),
                Err(e) => warn!(conn_id = %read_conn.id(), error = %e, "connection failed"),
            }
            manager.remove(read_conn.id()).await;
        });

        conn
    }

    async fn read_loop<R>(
        &self,
        conn: &Arc<Connection>,
        mut reader: R,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut frames = FrameBuffer::with_max_payload(self.inner.options.max_payload_size);
        let mut buf = vec![0u8; self.inner.options.read_buffer_size.max(1)];

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            let n = tokio::select! {
                read = reader.read(&mut buf) => read?,
                _ = shutdown.changed() => return Ok(()),
            };
            if n == 0 {
                return Ok(());
            }

            frames.extend(&buf[..n]);
            while let Some(envelope) = frames.next_envelope()? {
                let (_, task) = self.route(conn, &envelope);
                let Some(task) = task else { continue };
                match self.inner.options.dispatch_mode {
                    DispatchMode::FireAndForget => {
                        tokio::spawn(task.join());
                    }
                    DispatchMode::Sequential => task.join().await,
                }
            }
        }
    }

    /// Decode `raw` as one envelope and dispatch it.
    ///
    /// The handler runs on its own task; this never waits for it and never
    /// fails.
    pub fn dispatch(&self, conn: &Arc<Connection>, raw: &[u8]) -> DispatchOutcome {
        match self.inner.codec.unpack(raw) {
            Ok(envelope) => self.dispatch_envelope(conn, &envelope),
            Err(e) => {
                debug!(conn_id = %conn.id(), error = %e, "dropping malformed envelope");
                DispatchOutcome::Dropped(DropReason::Malformed)
            }
        }
    }

    /// Dispatch an already decoded envelope.
    pub fn dispatch_envelope(&self, conn: &Arc<Connection>, envelope: &Envelope) -> DispatchOutcome {
        let (outcome, task) = self.route(conn, envelope);
        if let Some(task) = task {
            tokio::spawn(task.join());
        }
        outcome
    }

    fn route(&self, conn: &Arc<Connection>, envelope: &Envelope) -> (DispatchOutcome, Option<HandlerTask>) {
        let contract = envelope.contract();
        let slot = envelope.message();
        let schemas = self.inner.codec.schemas();

        let Some(schema) = schemas.retrieve_by_index(contract) else {
            debug!(conn_id = %conn.id(), contract, slot, "dropping envelope for unknown contract");
            return (DispatchOutcome::Dropped(DropReason::UnknownContract(contract)), None);
        };
        let Some(type_name) = schema.type_at(slot) else {
            debug!(conn_id = %conn.id(), contract, slot, "dropping envelope for unknown message slot");
            return (
                DispatchOutcome::Dropped(DropReason::UnknownMessage { contract, slot }),
                None,
            );
        };
        let Some(entry) = self.inner.table.get(type_name) else {
            debug!(conn_id = %conn.id(), contract, slot, type_name, "dropping unhandled message");
            return (
                DispatchOutcome::Dropped(DropReason::Unhandled(type_name.to_string())),
                None,
            );
        };

        let decoded = schema
            .lookup_type(type_name)
            .map(|message| message.decode(envelope.payload()));
        let data = match decoded {
            Some(Ok(data)) => data,
            Some(Err(e)) => {
                warn!(conn_id = %conn.id(), contract, slot, type_name, error = %e, "payload does not decode");
                return (
                    DispatchOutcome::Dropped(DropReason::UndecodablePayload(type_name.to_string())),
                    None,
                );
            }
            None => {
                return (
                    DispatchOutcome::Dropped(DropReason::UnknownMessage { contract, slot }),
                    None,
                )
            }
        };

        let args = entry.arguments(&data, conn);
        let future = match catch_unwind(AssertUnwindSafe(|| entry.call(args))) {
            Ok(future) => future,
            Err(_) => {
                error!(conn_id = %conn.id(), type_name, method = entry.method_name(), "handler panicked");
                return (
                    DispatchOutcome::Dropped(DropReason::HandlerPanicked(type_name.to_string())),
                    None,
                );
            }
        };

        let task = HandlerTask {
            conn_id: conn.id().to_string(),
            type_name: type_name.to_string(),
            handle: tokio::spawn(future),
        };
        (DispatchOutcome::Invoked(type_name.to_string()), Some(task))
    }

    /// Stop accepting, stop every read loop and clear the connection table.
    pub async fn close(&self) {
        self.inner.shutdown.send_replace(true);

        let accept_task = self
            .inner
            .accept_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = accept_task {
            let _ = task.await;
        }

        let mut conns = self.inner.connections.write().await;
        conns.clear();
        self.inner.active_count.store(0, Ordering::Relaxed);
        debug!("connection manager closed");
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.inner.active_count.load(Ordering::Relaxed)
    }

    /// Open connection by id.
    pub async fn connection(&self, id: &str) -> Option<Arc<Connection>> {
        self.inner.connections.read().await.get(id).cloned()
    }

    /// Ids of all open connections.
    pub async fn connection_ids(&self) -> Vec<String> {
        self.inner.connections.read().await.keys().cloned().collect()
    }

    async fn add(&self, conn: Arc<Connection>) {
        let mut conns = self.inner.connections.write().await;
        if conns.insert(conn.id().to_string(), conn).is_none() {
            let _ = self.inner.active_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    async fn remove(&self, id: &str) {
        let mut conns = self.inner.connections.write().await;
        if conns.remove(id).is_some() {
            let _ = self.inner.active_count.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("message_types", &self.inner.table.len())
            .field("connections", &self.connection_count())
            .field("options", &self.inner.options)
            .finish()
    }
}

/// A spawned handler invocation.
struct HandlerTask {
    conn_id: String,
    type_name: String,
    handle: JoinHandle<Result<()>>,
}

impl HandlerTask {
    /// Wait for the handler and log how it ended.
    async fn join(self) {
        match self.handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(conn_id = %self.conn_id, type_name = %self.type_name, error = %e, "handler failed")
            }
            Err(e) if e.is_panic() => {
                error!(conn_id = %self.conn_id, type_name = %self.type_name, "handler panicked")
            }
            Err(_) => {}
        }
    }
}
