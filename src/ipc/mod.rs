//! Control-socket framing and wire protocol.

pub mod codec;
pub mod protocol;
