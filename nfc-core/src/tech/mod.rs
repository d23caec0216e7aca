//! Per-technology detector/decoder trait and the four implementations.
//!
//! spec.md §9 "Per-technology polymorphism": the source resolves technology
//! through a base-class pointer; here it is a plain trait object, no
//! virtual dispatch chain required.

pub mod iso7816;
pub mod nfca;
pub mod nfcb;
pub mod nfcf;

use crate::frame::RawFrame;
use crate::ring::SignalRing;

/// Result of one `decode()` call.
#[derive(Debug)]
pub enum DecodeOutcome {
    /// Still assembling a frame; call `decode()` again once more samples
    /// are available.
    Pending,
    /// A complete frame was assembled and should be emitted.
    Frame(RawFrame),
    /// Lock was lost or the frame was abandoned; `ModulationStatus` has
    /// already been reset, detection starts over from `detect()`.
    SearchReset,
}

/// Common per-technology contract. spec.md §9: `initialize(fs)`,
/// `detect() -> bool`, `decode(samples, &mut frames)`.
pub trait Tech {
    fn tech(&self) -> crate::frame::Tech;

    /// (Re)configure for a capture at `sample_rate` Hz. Builds the bitrate
    /// table and resets all per-rate modulation state.
    fn initialize(&mut self, sample_rate: f64) -> crate::errors::Result<()>;

    /// Look for this technology's start-of-frame pattern starting at the
    /// ring's current write position. Returns `true` and raises lock on a
    /// successful pattern match.
    fn detect(&mut self, ring: &SignalRing) -> bool;

    /// Advance the decode state machine by whatever the ring now allows.
    /// Only called while this technology holds lock.
    fn decode(&mut self, ring: &SignalRing) -> DecodeOutcome;

    /// Clear all per-rate modulation and stream state, return to search.
    fn reset(&mut self);
}
