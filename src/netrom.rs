use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::frame::{Address, FrameParseError, ADDR_LEN};

/// PID identifying a NET/ROM payload within an AX.25 UI frame.
pub const NETROM_PID: u8 = 0xCF;

/// First octet of every routing broadcast.
const SIGNATURE: u8 = 0xFF;
/// Node mnemonics occupy a fixed six octets, space padded.
const MNEMONIC_LEN: usize = 6;
/// Destination callsign, mnemonic, best neighbour, quality.
const DEST_LEN: usize = ADDR_LEN + MNEMONIC_LEN + ADDR_LEN + 1;

/// Error for a mnemonic that cannot be represented on the air.
#[derive(Debug, Error)]
#[error("Mnemonic must be 1 to 6 ASCII characters")]
pub struct InvalidMnemonic;

/// Errors when parsing a byte buffer into a `RoutingBroadcast`
#[derive(Debug, Error)]
pub enum NetromParseError {
    #[error("Routing broadcast does not start with the 0xFF signature")]
    InvalidSignature,
    #[error("Routing broadcast length {} does not divide into whole destination records", len)]
    TruncatedRecord { len: usize },
    #[error(transparent)]
    InvalidMnemonic(#[from] InvalidMnemonic),
    #[error("Destination record contains an invalid callsign")]
    InvalidAddress { source: FrameParseError },
}

/// A node identifier as it appears on the air: up to six ASCII
/// characters, stored space padded to exactly six.
///
/// Comparison is over the padded form, so `"NODE"` and `"NODE  "` are
/// the same mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mnemonic([u8; MNEMONIC_LEN]);

impl Mnemonic {
    /// The padded six-octet on-air form.
    pub fn as_bytes(&self) -> &[u8; MNEMONIC_LEN] {
        &self.0
    }

    fn from_bytes(bytes: &[u8]) -> Result<Mnemonic, InvalidMnemonic> {
        if bytes.len() != MNEMONIC_LEN || !bytes.iter().all(|b| b.is_ascii()) {
            return Err(InvalidMnemonic);
        }
        let mut padded = [b' '; MNEMONIC_LEN];
        padded.copy_from_slice(bytes);
        Ok(Mnemonic(padded))
    }
}

impl FromStr for Mnemonic {
    type Err = InvalidMnemonic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > MNEMONIC_LEN || !s.is_ascii() {
            return Err(InvalidMnemonic);
        }
        let mut padded = [b' '; MNEMONIC_LEN];
        padded[..s.len()].copy_from_slice(s.as_bytes());
        Ok(Mnemonic(padded))
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Padding is an encoding artifact
        let end = self.0.iter().rposition(|&b| b != b' ').map_or(0, |p| p + 1);
        for &b in &self.0[..end] {
            write!(f, "{}", b as char)?;
        }
        Ok(())
    }
}

/// A single destination advertised by a routing broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Callsign of the destination node
    pub callsign: Address,
    /// Human-readable identifier for the destination
    pub mnemonic: Mnemonic,
    /// Neighbour offering the best route towards the destination
    pub best_neighbor: Address,
    /// Route quality via that neighbour, 0 (unusable) to 255
    pub best_quality: u8,
}

impl Destination {
    fn to_bytes(&self) -> [u8; DEST_LEN] {
        let mut encoded = [0u8; DEST_LEN];
        encoded[..ADDR_LEN].copy_from_slice(&record_address(&self.callsign));
        encoded[ADDR_LEN..ADDR_LEN + MNEMONIC_LEN].copy_from_slice(self.mnemonic.as_bytes());
        encoded[ADDR_LEN + MNEMONIC_LEN..DEST_LEN - 1]
            .copy_from_slice(&record_address(&self.best_neighbor));
        encoded[DEST_LEN - 1] = self.best_quality;
        encoded
    }

    fn from_bytes(bytes: &[u8]) -> Result<Destination, NetromParseError> {
        Ok(Destination {
            callsign: decode_record_address(&bytes[..ADDR_LEN])?,
            mnemonic: Mnemonic::from_bytes(&bytes[ADDR_LEN..ADDR_LEN + MNEMONIC_LEN])?,
            best_neighbor: decode_record_address(&bytes[ADDR_LEN + MNEMONIC_LEN..DEST_LEN - 1])?,
            best_quality: bytes[DEST_LEN - 1],
        })
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} ({}) via {} ({})",
            self.callsign, self.mnemonic, self.best_neighbor, self.best_quality
        )
    }
}

// The C, H and E bits have no meaning inside a routing record and are
// written as zeros.
fn record_address(address: &Address) -> [u8; ADDR_LEN] {
    let mut encoded = address.to_bytes();
    encoded[ADDR_LEN - 1] &= 0b0111_1110;
    encoded
}

fn decode_record_address(bytes: &[u8]) -> Result<Address, NetromParseError> {
    let mut address =
        Address::from_bytes(bytes).map_err(|source| NetromParseError::InvalidAddress { source })?;
    address.c_bit = false;
    Ok(address)
}

/// A NET/ROM routing table broadcast: the payload of a UI frame with
/// PID 0xCF, advertising the sending node and the destinations it can
/// reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingBroadcast {
    /// Mnemonic of the sending node
    pub sender: Mnemonic,
    /// Advertised destinations in broadcast order; may be empty
    pub destinations: Vec<Destination>,
}

impl RoutingBroadcast {
    /// Parse raw bytes into a `RoutingBroadcast` if possible.
    pub fn from_bytes(bytes: &[u8]) -> Result<RoutingBroadcast, NetromParseError> {
        match bytes.first() {
            Some(&SIGNATURE) => {}
            _ => return Err(NetromParseError::InvalidSignature),
        }
        if bytes.len() < 1 + MNEMONIC_LEN || (bytes.len() - 1 - MNEMONIC_LEN) % DEST_LEN != 0 {
            return Err(NetromParseError::TruncatedRecord { len: bytes.len() });
        }
        let sender = Mnemonic::from_bytes(&bytes[1..1 + MNEMONIC_LEN])?;
        let mut destinations = Vec::new();
        for record in bytes[1 + MNEMONIC_LEN..].chunks_exact(DEST_LEN) {
            destinations.push(Destination::from_bytes(record)?);
        }
        Ok(RoutingBroadcast {
            sender,
            destinations,
        })
    }

    /// Encode a `RoutingBroadcast` struct as the payload for a UI frame.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut encoded =
            Vec::with_capacity(1 + MNEMONIC_LEN + self.destinations.len() * DEST_LEN);
        encoded.push(SIGNATURE);
        encoded.extend(self.sender.as_bytes());
        for destination in &self.destinations {
            encoded.extend(destination.to_bytes());
        }
        encoded
    }
}
