//! Member registry: participants and their generation parameters.

pub mod entities;
pub mod roster;

pub use entities::{GenerationParams, Member, MemberId};
pub use roster::Roster;
