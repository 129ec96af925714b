//! Pure bracket mathematics for the courtside playoff system.
//!
//! This crate knows nothing about storage or transport. It answers the three
//! structural questions a single elimination bracket poses: how a team list
//! pairs into round 1, where the winner of a match goes next, and when a
//! bracket is finished. The server crate applies the answers to its store.

pub mod single_elimination;

pub use single_elimination::{advancement, is_complete, pair, target, Advancement, Target};

/// The two team slots of a match.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Slot {
    Team1,
    Team2,
}
