//! # ncp-core
//!
//! Core client/server library for the NCP (Node Control Protocol), a
//! little-endian, word-aligned binary protocol used to control a fleet
//! of RF sensor nodes over TCP.
//!
//! This crate contains:
//! - **Value codec**: [`value::ParamValue`] — typed scalar/array param values
//! - **Identifiers**: [`identifier::Identifier`] — 4-byte padded ASCII tokens
//! - **Wire model**: [`param::Params`], [`field::Field`], [`packet::Packet`] —
//!   the ordered param/field/packet hierarchy and its framing
//! - **Codec**: [`codec::NcpCodec`] for framed TCP I/O via `tokio_util`
//! - **Connection**: [`connection::Connection`] — socket ownership, the
//!   reader fan-out, auto-handlers, and the request/reply waiter protocol
//! - **Façades**: [`client::connect`] and [`server::start_server`]
//! - **Error**: [`error::NcpError`] — typed, `thiserror`-based error hierarchy

pub mod client;
pub mod codec;
pub mod connection;
pub mod error;
pub mod field;
pub mod identifier;
pub mod identity;
pub mod options;
pub mod packet;
pub mod param;
pub mod server;
pub mod value;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use client::connect;
pub use connection::{Connection, ResponseHandle};
pub use error::{CommandWarning, DecodeWarning, NcpError};
pub use field::Field;
pub use identifier::{IDENTIFIER_SIZE, Identifier};
pub use identity::default_client_identity;
pub use options::{ConnectionOptions, ServerOptions};
pub use packet::{FOOTER_SIZE, HEADER_SIZE, Packet, Timestamp};
pub use param::Params;
pub use server::{Server, start_server};
pub use value::ParamValue;

/// The protocol's default TCP port.
pub const DEFAULT_PORT: u16 = 9999;
