//! NCP fields — a named, identified group of params carried within a packet.

use crate::identifier::Identifier;
use crate::param::Params;
use crate::value::ParamValue;

/// A single field within a packet: a name, a monotonic field id, and an
/// ordered dictionary of params.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// The field's 4-byte name, e.g. `HELO`, `CCRE`, `ERRO`.
    pub name: Identifier,
    /// Monotonic id shared with packet ids, assigned by the sender.
    pub id: u32,
    /// The field's param dictionary, in wire order.
    pub params: Params,
}

impl Field {
    /// Build a field with an empty param dictionary.
    pub fn new(name: Identifier, id: u32) -> Self {
        Self {
            name,
            id,
            params: Params::new(),
        }
    }

    /// Builder-style param insert.
    pub fn with_param(mut self, name: Identifier, value: ParamValue) -> Self {
        self.params.insert(name, value);
        self
    }

    /// Whether this field carries an `ERRO`/`ERRC` error sentinel pair.
    pub fn is_error(&self) -> bool {
        self.params.get("ERRO").is_some() || self.params.get("ERRC").is_some()
    }

    /// Whether this field carries a `WARN`/`WARC` warning sentinel pair.
    pub fn is_warning(&self) -> bool {
        self.params.get("WARN").is_some() || self.params.get("WARC").is_some()
    }

    /// Extract the `ERRO` message and `ERRC` code. Triggers on either
    /// sentinel being present; a field carrying only `ERRC` yields a
    /// `None` message rather than failing to match at all.
    pub fn error_sentinel(&self) -> Option<(Option<String>, Option<i32>)> {
        if !self.is_error() {
            return None;
        }
        let message = self.params.get("ERRO").and_then(ParamValue::as_str).map(str::to_string);
        let code = self.params.get("ERRC").and_then(ParamValue::as_i32);
        Some((message, code))
    }

    /// Extract the `WARN` message and `WARC` code. Triggers on either
    /// sentinel being present; a field carrying only `WARC` yields a
    /// `None` message rather than failing to match at all.
    pub fn warning_sentinel(&self) -> Option<(Option<String>, Option<i32>)> {
        if !self.is_warning() {
            return None;
        }
        let message = self.params.get("WARN").and_then(ParamValue::as_str).map(str::to_string);
        let code = self.params.get("WARC").and_then(ParamValue::as_i32);
        Some((message, code))
    }
}
