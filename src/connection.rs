//! The `Connection` runtime entity — one TCP socket, one reader task, and
//! the waiter fan-out that backs `recv_field`.
//!
//! Grounded on the teacher's `network/connection.rs` split-task design
//! (`Framed::split` into a writer task draining an mpsc channel and a
//! reader task pushing into a channel), generalized here so that instead
//! of a single-consumer mpsc, the reader broadcasts every packet to an
//! arbitrary number of concurrently-waiting `recv_field` callers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex as AsyncMutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

use crate::codec::NcpCodec;
use crate::error::{CommandWarning, NcpError};
use crate::field::Field;
use crate::identifier::Identifier;
use crate::options::ConnectionOptions;
use crate::packet::Packet;
use crate::param::Params;

/// Events broadcast from the reader task to every `recv_field` waiter.
#[derive(Clone)]
enum ConnEvent {
    Packet(Arc<Packet>),
    Closed,
}

/// A managed NCP connection to a single peer.
///
/// Owns the socket (split between a writer task and a reader task), the
/// monotonic id counter, and the broadcast channel that fans incoming
/// packets out to waiters.
pub struct Connection {
    write_tx: AsyncMutex<Option<mpsc::UnboundedSender<Packet>>>,
    events: broadcast::Sender<ConnEvent>,
    next_id: AtomicU32,
    reader_handle: std::sync::Mutex<Option<JoinHandle<()>>>,
    writer_handle: std::sync::Mutex<Option<JoinHandle<()>>>,
    options: ConnectionOptions,
    info: [u8; 4],
    closed: AtomicBool,
}

/// Remembers the field-name → field-id assignment from a `send` call,
/// so the caller can match replies without re-specifying ids.
pub struct ResponseHandle {
    packet_type: Identifier,
    field_ids: HashMap<String, u32>,
}

impl ResponseHandle {
    /// Await the reply field named `field_name` on the connection that
    /// produced this handle.
    pub async fn recv(&self, connection: &Connection, field_name: &str) -> Result<Params, NcpError> {
        let field_id = self.field_ids.get(field_name).copied();
        connection
            .recv_field(self.packet_type.as_str(), field_name, field_id)
            .await
    }

    /// The id assigned to the named field when this handle's packet was sent.
    pub fn field_id(&self, field_name: &str) -> Option<&u32> {
        self.field_ids.get(field_name)
    }
}

enum FieldOutcome {
    Deliver(Params),
    Skip,
    Fail(NcpError),
}

impl Connection {
    /// Wrap an already-connected `TcpStream`, starting its reader and
    /// writer tasks immediately.
    pub fn new(stream: TcpStream, options: ConnectionOptions, info: [u8; 4]) -> Arc<Self> {
        let _ = stream.set_nodelay(true);

        let (mut net_writer, mut net_reader) = Framed::new(stream, NcpCodec).split();
        let (write_tx, mut write_rx) = mpsc::unbounded_channel::<Packet>();
        let (events, _) = broadcast::channel(256);

        let writer_events = events.clone();
        let writer_handle = tokio::spawn(async move {
            while let Some(packet) = write_rx.recv().await {
                if let Err(error) = net_writer.send(packet).await {
                    tracing::error!(%error, "connection write failed");
                    let _ = writer_events.send(ConnEvent::Closed);
                    break;
                }
            }
        });

        let reader_events = events.clone();
        let reader_handle = tokio::spawn(async move {
            loop {
                match net_reader.next().await {
                    Some(Ok(packet)) => {
                        tracing::debug!(
                            packet_type = %packet.packet_type,
                            packet_id = packet.id,
                            "received packet"
                        );
                        if reader_events.send(ConnEvent::Packet(Arc::new(packet))).is_err() {
                            // No waiters subscribed right now; that's fine.
                        }
                    }
                    Some(Err(error)) => {
                        tracing::error!(%error, "connection read failed");
                        let _ = reader_events.send(ConnEvent::Closed);
                        break;
                    }
                    None => {
                        let _ = reader_events.send(ConnEvent::Closed);
                        break;
                    }
                }
            }
        });

        Arc::new(Self {
            write_tx: AsyncMutex::new(Some(write_tx)),
            events,
            next_id: AtomicU32::new(1),
            reader_handle: std::sync::Mutex::new(Some(reader_handle)),
            writer_handle: std::sync::Mutex::new(Some(writer_handle)),
            options,
            info,
            closed: AtomicBool::new(false),
        })
    }

    fn next_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// The options this connection was constructed with.
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Serialize a packet carrying the given named fields and hand it to
    /// the writer task. Field ids and the packet id are drawn from the
    /// connection's monotonic counter. Never suspends.
    pub fn send(
        &self,
        packet_type: &str,
        fields: Vec<(Identifier, Params)>,
    ) -> Result<ResponseHandle, NcpError> {
        let packet_type_id = Identifier::new(packet_type)?;

        let mut built_fields = Vec::with_capacity(fields.len());
        let mut field_ids = HashMap::with_capacity(fields.len());
        for (name, params) in fields {
            let id = self.next_id();
            field_ids.insert(name.as_str().to_string(), id);
            built_fields.push(Field { name, id, params });
        }
        let packet_id = self.next_id();

        let packet = Packet::now(packet_type_id.clone(), packet_id, self.info, built_fields);
        tracing::debug!(packet_type = %packet_type_id, packet_id, "sending packet");

        let guard = self
            .write_tx
            .try_lock()
            .map_err(|_| NcpError::ConnectionClosed)?;
        let tx = guard.as_ref().ok_or(NcpError::ConnectionClosed)?;
        tx.send(packet).map_err(|_| NcpError::ConnectionClosed)?;

        Ok(ResponseHandle {
            packet_type: packet_type_id,
            field_ids,
        })
    }

    /// Convenience for sending a packet with exactly one field.
    pub fn send_one(
        &self,
        packet_type: &str,
        field_name: &str,
        params: Params,
    ) -> Result<ResponseHandle, NcpError> {
        let name = Identifier::new(field_name)?;
        self.send(packet_type, vec![(name, params)])
    }

    /// Suspend until a packet of `packet_type` arrives carrying a field
    /// named `field_name` (and, if given, id `field_id`) that survives
    /// the auto-handler chain.
    pub async fn recv_field(
        &self,
        packet_type: &str,
        field_name: &str,
        field_id: Option<u32>,
    ) -> Result<Params, NcpError> {
        let mut rx = self.events.subscribe();
        loop {
            match rx.recv().await {
                Ok(ConnEvent::Packet(packet)) => {
                    if packet.packet_type.as_str() != packet_type {
                        continue;
                    }
                    for field in &packet.fields {
                        if field.name.as_str() != field_name {
                            continue;
                        }
                        if let Some(id) = field_id {
                            if field.id != id {
                                continue;
                            }
                        }
                        match self.filter_field(packet_type, field) {
                            FieldOutcome::Deliver(params) => return Ok(params),
                            FieldOutcome::Skip => continue,
                            FieldOutcome::Fail(error) => return Err(error),
                        }
                    }
                }
                Ok(ConnEvent::Closed) => return Err(NcpError::ConnectionClosed),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return Err(NcpError::ConnectionClosed),
            }
        }
    }

    fn filter_field(&self, packet_type: &str, field: &Field) -> FieldOutcome {
        if self.options.auto_erro {
            if let Some((message, code)) = field.error_sentinel() {
                return FieldOutcome::Fail(NcpError::CommandError {
                    packet_type: packet_type.to_string(),
                    field_name: field.name.as_str().to_string(),
                    field_id: field.id,
                    message,
                    code,
                });
            }
        }

        if self.options.auto_warn {
            if let Some((message, code)) = field.warning_sentinel() {
                let warning = CommandWarning {
                    packet_type: packet_type.to_string(),
                    field_name: field.name.as_str().to_string(),
                    field_id: field.id,
                    message,
                    code,
                };
                tracing::warn!(%warning, "command warning");
                if field.name.as_str() == "WARN" {
                    return FieldOutcome::Skip;
                }
            }
        }

        if self.options.auto_ackn && field.params.get("ACKN").is_some() {
            return FieldOutcome::Skip;
        }

        FieldOutcome::Deliver(field.params.clone())
    }

    /// Send one field and await the reply of the same name — the common
    /// request/response shorthand.
    pub async fn execute(
        &self,
        packet_type: &str,
        field_name: &str,
        params: Params,
    ) -> Result<Params, NcpError> {
        let handle = self.send_one(packet_type, field_name, params)?;
        handle.recv(self, field_name).await
    }

    /// Cancel the reader and writer tasks, reject all outstanding
    /// waiters with `ConnectionClosed`, and close the socket. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let _ = self.events.send(ConnEvent::Closed);

        if let Some(handle) = self.reader_handle.lock().unwrap().take() {
            handle.abort();
        }
        if let Some(handle) = self.writer_handle.lock().unwrap().take() {
            handle.abort();
        }
        if let Ok(mut guard) = self.write_tx.try_lock() {
            guard.take();
        }
    }

    /// Resolve once the reader and writer tasks have both stopped.
    pub async fn wait_closed(&self) {
        let reader = self.reader_handle.lock().unwrap().take();
        if let Some(handle) = reader {
            let _ = handle.await;
        }
        let writer = self.writer_handle.lock().unwrap().take();
        if let Some(handle) = writer {
            let _ = handle.await;
        }
    }
}
