//! Conversational registration flow.

pub mod dispatcher;
pub mod engine;
pub mod session;
pub mod state;

pub use dispatcher::Dispatcher;
pub use engine::RegistrationEngine;
pub use session::Session;
pub use state::ConversationState;
