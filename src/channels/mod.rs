//! Channel abstraction for message I/O.

pub mod channel;
pub mod event;
pub mod telegram;

pub use channel::*;
pub use event::{CallbackAction, EventKind, InboundEvent};
pub use telegram::TelegramChannel;
