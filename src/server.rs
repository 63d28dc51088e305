//! Server façade — `start_server` binds, accepts, performs the mirrored
//! `LINK` handshake per connection, and dispatches to a user handler.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::connection::Connection;
use crate::error::NcpError;
use crate::identifier::Identifier;
use crate::options::ServerOptions;
use crate::param::Params;
use crate::value::ParamValue;

/// A handler task paired with the connection it is driving, so `close`
/// can release the connection's socket/reader/writer before cancelling
/// the task that owns it.
struct Handler {
    connection: Arc<Connection>,
    join: JoinHandle<()>,
}

/// A running NCP server: one accept loop, and one handler task per
/// accepted connection.
pub struct Server {
    local_addr: SocketAddr,
    accept_handle: Mutex<Option<JoinHandle<()>>>,
    handlers: Arc<Mutex<Vec<Handler>>>,
}

impl Server {
    /// The bound local address (useful when `port` was `0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting new connections, close every outstanding
    /// connection, and cancel their handler tasks.
    pub async fn close(&self) {
        if let Some(handle) = self.accept_handle.lock().await.take() {
            handle.abort();
        }
        let mut handlers = self.handlers.lock().await;
        for handler in handlers.drain(..) {
            handler.connection.close();
            handler.join.abort();
        }
    }

    /// Resolve once the listener has shut down and every handler task
    /// has exited.
    pub async fn wait_closed(&self) {
        if let Some(handle) = self.accept_handle.lock().await.take() {
            let _ = handle.await;
        }
        let mut handlers = self.handlers.lock().await;
        for handler in handlers.drain(..) {
            let _ = handler.join.await;
        }
    }
}

/// Bind `host:port` and accept connections, invoking `handler` for each
/// one after the mirrored handshake (if `opts.connection.auto_auth`).
///
/// `handler` is cloned per connection; typical handlers are a cheap
/// `Arc`-wrapped closure or function pointer.
pub async fn start_server<H, Fut>(
    handler: H,
    host: &str,
    port: u16,
    opts: ServerOptions,
) -> Result<Server, NcpError>
where
    H: Fn(Arc<Connection>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), NcpError>> + Send + 'static,
{
    let listener = TcpListener::bind((host, port)).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(host, port, "server listening");

    let handler = Arc::new(handler);
    let handlers = Arc::new(Mutex::new(Vec::new()));
    let spawn_handlers = handlers.clone();

    let accept_handle = tokio::spawn(async move {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(error) => {
                    tracing::error!(%error, "accept failed");
                    break;
                }
            };
            tracing::info!(%peer, "accepted connection");

            let handler = handler.clone();
            let spawn_handlers = spawn_handlers.clone();
            let connection = Connection::new(stream, opts.connection, opts.info);
            let handler_connection = connection.clone();
            let join_handle = tokio::spawn(async move {
                let connection = handler_connection;

                if opts.connection.auto_auth {
                    match handshake(&connection).await {
                        Ok(()) => {}
                        Err(NcpError::MissingClientIdentity) => {
                            let _ = connection.send_one(
                                "LINK",
                                "ERRO",
                                Params::new()
                                    .with(
                                        Identifier::new("ERRO").unwrap(),
                                        ParamValue::String("CIW - This field is required".into()),
                                    )
                                    .with(Identifier::new("ERRC").unwrap(), ParamValue::U32(401)),
                            );
                            connection.close();
                            return;
                        }
                        Err(error) => {
                            tracing::error!(%error, "handshake failed");
                            connection.close();
                            return;
                        }
                    }
                }

                if let Err(error) = handler(connection.clone()).await {
                    respond_to_handler_error(&connection, &error);
                }

                connection.close();
            });

            spawn_handlers.lock().await.push(Handler {
                connection,
                join: join_handle,
            });
        }
    });

    Ok(Server {
        local_addr,
        accept_handle: Mutex::new(Some(accept_handle)),
        handlers,
    })
}

async fn handshake(connection: &Connection) -> Result<(), NcpError> {
    connection.send_one("LINK", "HELO", Params::new())?;

    let ccre = connection.recv_field("LINK", "CCRE", None).await?;
    if ccre.get("CIW").is_none() {
        return Err(NcpError::MissingClientIdentity);
    }

    connection.send_one("LINK", "SCAR", Params::new())?;
    connection.recv_field("LINK", "CARE", None).await?;

    connection.send_one("LINK", "SCON", Params::new())?;
    tracing::info!("mirrored handshake complete");
    Ok(())
}

fn respond_to_handler_error(connection: &Connection, error: &NcpError) {
    let (message, code) = match error {
        NcpError::BadMagic
        | NcpError::BadFooter
        | NcpError::Overflow { .. }
        | NcpError::Truncated { .. }
        | NcpError::UnknownParamType(_)
        | NcpError::CommandError { .. } => ("Bad request".to_string(), 400),
        _ => ("Server error".to_string(), 500),
    };

    tracing::error!(%error, code, "handler failed");

    let _ = connection.send_one(
        "LINK",
        "ERRO",
        Params::new()
            .with(Identifier::new("ERRO").unwrap(), ParamValue::String(message))
            .with(Identifier::new("ERRC").unwrap(), ParamValue::U32(code)),
    );
}
