//! Kernel phases of the parallel move pipeline, plus the invariant
//! verifier.
//!
//! A substep runs [`propose`], [`commit`] and [`settle`] in order over one
//! species, with a barrier between phases (the completion of each parallel
//! iterator). The phases communicate exclusively through the flag bytes and
//! the scratch lattice, so workers within a phase never order against each
//! other.

pub(crate) mod commit;
pub(crate) mod propose;
pub(crate) mod settle;
pub(crate) mod verify;

/// Flag bit set by the propose phase when a move passed every check against
/// the committed lattice.
pub(crate) const FLAG_PROPOSED: u8 = 1 << 0;

/// Flag bit set by the commit phase when the move also survived the
/// scratch-lattice re-test.
pub(crate) const FLAG_COMMITTED: u8 = 1 << 1;
