//! Channel selection
//!
//! Turns noisy rising edges into a single confirmed channel and hands the
//! matching station to the playback controller.

pub mod channel;
pub mod engine;
pub mod vote;

pub use channel::{Channel, ChannelId, ChannelTable};
pub use engine::{SelectionEngine, SelectionOutcome, SelectorState};
pub use vote::{SampleWindow, VoteConfig};
