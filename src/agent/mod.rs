//! The conditional agent/tool loop and the controller that runs it per session.

pub mod controller;
pub mod conversation;
pub mod dispatch;
pub mod events;
pub mod step;

pub use controller::{ControllerOptions, ControllerState, ConversationController};
pub use conversation::Conversation;
pub use dispatch::ToolDispatch;
pub use events::{TurnEvent, TurnEventPayload, TurnEventSink};
pub use step::AgentStep;
