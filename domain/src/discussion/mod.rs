//! Discussion protocols, sessions and the events a round emits.

pub mod event;
pub mod mode;
pub mod session;
pub mod threshold;

pub use event::{DiscussionEvent, StreamFrame};
pub use mode::DiscussionMode;
pub use session::{Session, SessionId};
pub use threshold::{DEFAULT_THRESHOLD_RATIO, ThresholdRatio};
