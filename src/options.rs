//! Connection- and server-level configuration.
//!
//! Modeled as plain `Default`-deriving option structs with `with_*`
//! builder methods, matching the teacher's `TaskOptions` ergonomics,
//! rather than a free-form map or environment-variable scheme.

/// Per-connection behaviour toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Perform the `LINK` handshake on connect/accept.
    pub auto_auth: bool,
    /// Fail `recv_field` when a matching field carries `ERRO`/`ERRC`.
    pub auto_erro: bool,
    /// Emit `CommandWarning` when a matching field carries `WARN`/`WARC`.
    pub auto_warn: bool,
    /// Skip fields that carry a bare `ACKN` acknowledgement.
    pub auto_ackn: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            auto_auth: true,
            auto_erro: true,
            auto_warn: true,
            auto_ackn: true,
        }
    }
}

impl ConnectionOptions {
    /// Start from the historically-safe defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle the handshake.
    pub fn with_auto_auth(mut self, enabled: bool) -> Self {
        self.auto_auth = enabled;
        self
    }

    /// Toggle the auto-erro filter.
    pub fn with_auto_erro(mut self, enabled: bool) -> Self {
        self.auto_erro = enabled;
        self
    }

    /// Toggle the auto-warn filter.
    pub fn with_auto_warn(mut self, enabled: bool) -> Self {
        self.auto_warn = enabled;
        self
    }

    /// Toggle the auto-ackn filter.
    pub fn with_auto_ackn(mut self, enabled: bool) -> Self {
        self.auto_ackn = enabled;
        self
    }
}

/// Per-server behaviour toggles, layered on top of [`ConnectionOptions`]
/// (every accepted connection inherits them).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerOptions {
    /// Options applied to every accepted connection.
    pub connection: ConnectionOptions,
    /// Whether the server schedules a periodic keep-alive.
    ///
    /// Accepted as a configuration knob; the keep-alive scheduling
    /// behaviour itself is not implemented by this crate.
    pub auto_link: bool,
    /// The server's identity bytes, sent as a packet's `info` field in
    /// place of a MAC-derived client identity.
    pub info: [u8; 4],
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            connection: ConnectionOptions::default(),
            auto_link: true,
            info: [0u8; 4],
        }
    }
}

impl ServerOptions {
    /// Start from the historically-safe defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the inherited connection options.
    pub fn with_connection_options(mut self, options: ConnectionOptions) -> Self {
        self.connection = options;
        self
    }

    /// Toggle the keep-alive flag.
    pub fn with_auto_link(mut self, enabled: bool) -> Self {
        self.auto_link = enabled;
        self
    }

    /// Set the server's identity bytes.
    pub fn with_info(mut self, info: [u8; 4]) -> Self {
        self.info = info;
        self
    }
}
