//! Vision-assist serial link.
//!
//! Fixed 21-byte frames carry mode requests, acknowledgements, aim and
//! move commands, and timing queries between the control unit and the
//! vision computer. [`frame`] is the wire format, [`link`] the session
//! state: mode bits, transport-delay estimate and the mode-set commander.

pub mod frame;
pub mod link;

pub use frame::{CvCommand, FrameError, FrameScanner, Message, MsgType, RawFrame, VisionMode};
pub use link::{CommanderState, VisionLink};
