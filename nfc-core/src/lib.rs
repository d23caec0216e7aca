//! Baseband demodulation and frame decoding for ISO/IEC 14443-A/B, NFC-F
//! and ISO/IEC 7816 contact captures.
//!
//! The crate is a single-threaded cooperative pipeline pulled by a
//! consumer asking for "the next frame" (spec.md §2): a [`sfe::SignalFrontEnd`]
//! feeds a power-of-two [`ring::SignalRing`], the three RF technologies in
//! [`tech`] race to lock onto it, and [`dispatcher::Dispatcher`] hands
//! completed [`frame::RawFrame`]s back to the caller. ISO-7816 runs the
//! analogous but separate path in [`logic`] / [`tech::iso7816`] /
//! [`dispatcher::ContactDispatcher`].

pub mod bitrate;
pub mod config;
pub mod crc;
pub mod dispatcher;
pub mod errors;
pub mod frame;
pub mod logging;
pub mod logic;
pub mod protocol;
pub mod ring;
pub mod sfe;
pub mod source;
pub mod stream;
pub mod symbol;
pub mod tech;

pub use dispatcher::{ContactDispatcher, Dispatcher};
pub use errors::{NfcError, Result};
pub use frame::{FrameFlags, FramePhase, FrameType, RawFrame, Tech};
