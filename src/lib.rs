//! AX.25 and NET/ROM packets in Rust.
//!
//! This crate converts between raw frame bytes and strongly typed
//! structures, in both directions. It is transport-agnostic: feed it
//! frames from KISS, AGWPE, a native AX.25 socket, or a capture file,
//! and hand its output bytes back to whichever of those you use. The
//! physical layer's flags, bit-stuffing and FCS are assumed to be
//! handled before bytes reach this crate.

/// Encoding and decoding AX.25 v2.2 frames between raw bytes and strongly typed structures.
pub mod frame;

/// Encoding and decoding NET/ROM routing broadcasts carried in UI frames.
pub mod netrom;
