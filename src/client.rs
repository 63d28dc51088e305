//! Client façade — `connect` opens a socket, starts the reader, and
//! performs the `LINK` handshake.

use std::sync::Arc;

use tokio::net::TcpStream;

use crate::connection::Connection;
use crate::error::NcpError;
use crate::identifier::Identifier;
use crate::identity::default_client_identity;
use crate::options::ConnectionOptions;
use crate::param::Params;
use crate::value::ParamValue;

/// Open a connection to `host:port` and, if `opts.auto_auth` is set,
/// perform the client side of the `LINK` handshake using `client_id` as
/// the `CIW`/`CAR` identity bytes.
///
/// `client_id` defaults to [`default_client_identity`] when `None`.
pub async fn connect(
    host: &str,
    port: u16,
    opts: ConnectionOptions,
    client_id: Option<[u8; 4]>,
) -> Result<Arc<Connection>, NcpError> {
    let client_id = match client_id {
        Some(id) => id,
        None => default_client_identity()?,
    };

    let stream = TcpStream::connect((host, port)).await?;
    let connection = Connection::new(stream, opts, client_id);

    if opts.auto_auth {
        if let Err(error) = handshake(&connection, client_id).await {
            connection.close();
            return Err(error);
        }
    }

    tracing::info!(host, port, "connected");
    Ok(connection)
}

async fn handshake(connection: &Connection, client_id: [u8; 4]) -> Result<(), NcpError> {
    connection.recv_field("LINK", "HELO", None).await?;

    let ciw = Identifier::new("CIW")?;
    let handle = connection.send(
        "LINK",
        vec![(
            Identifier::new("CCRE")?,
            Params::new().with(ciw, ParamValue::Raw(client_id.to_vec())),
        )],
    )?;
    let _ = handle;

    connection.recv_field("LINK", "SCAR", None).await?;

    let car = Identifier::new("CAR")?;
    connection.send(
        "LINK",
        vec![(
            Identifier::new("CARE")?,
            Params::new().with(car, ParamValue::Raw(client_id.to_vec())),
        )],
    )?;

    connection.recv_field("LINK", "SCON", None).await?;

    tracing::info!("handshake complete");
    Ok(())
}
