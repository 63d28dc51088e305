//! Client identity derivation.
//!
//! Per §3 of the data model, a client's `info` bytes default to the low
//! 4 bytes of the host's MAC address. This is a process-wide fact, so it
//! is exposed as an explicit parameter with a default provider rather
//! than being read implicitly somewhere deep in `connect`.

use mac_address::get_mac_address;

use crate::error::NcpError;

/// Look up the host's primary MAC address and return the low 4 bytes of
/// its little-endian 6-byte representation.
///
/// Matches the original derivation of treating the MAC as a 48-bit
/// integer, taking its little-endian byte encoding, and keeping the last
/// 4 bytes — for `AA:BB:CC:DD:EE:FF` that yields `[DD, CC, BB, AA]`, the
/// reverse of the address's first 4 octets.
pub fn default_client_identity() -> Result<[u8; 4], NcpError> {
    let mac = get_mac_address()
        .map_err(|_| NcpError::MissingClientIdentity)?
        .ok_or(NcpError::MissingClientIdentity)?;
    Ok(low4_of(mac.bytes()))
}

fn low4_of(bytes: [u8; 6]) -> [u8; 4] {
    [bytes[3], bytes[2], bytes[1], bytes[0]]
}
