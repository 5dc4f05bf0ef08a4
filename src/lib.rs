//! cprdec - Cubase .cpr project decoder
//!
//! Cubase stores projects in an undocumented binary container mixing
//! little/big-endian fixed fields, UTF-8 and UTF-16LE strings, and embedded
//! XML fragments, with no reliable top-level index. This crate recovers a
//! structured project model (tracks, plugin chains, EQ and compressor
//! settings, routing, sends, audio references, tempo and version metadata)
//! from that container by positional heuristics and pattern scanning.
//!
//! # Architecture
//!
//! The decoder is a single synchronous pass over one immutable byte buffer:
//! - [`scan`]: primitive substring and bounded-gap pattern search
//! - [`decode`]: the extraction pipeline built on top of the scanner
//! - [`model`]: the immutable project model the pipeline produces
//!
//! Decoding is best-effort by design. A marker that is absent leaves its
//! field at a documented default; a value that fails to decode is skipped.
//! The only hard failure is being unable to read the input file at all.

pub mod cli;
pub mod decode;
pub mod error;
pub mod model;
pub mod scan;

pub use decode::{decode_bytes, decode_file};
pub use error::{CprError, Result};
pub use model::{
    BandShape, CompressorSettings, EQBand, Marker, PluginInstance, Project, SendSlot, Track,
    TrackType,
};
