pub mod dispatcher;
pub mod telegram;
pub mod transport;
pub mod types;
pub mod typing;
pub mod util;

pub use dispatcher::ConversationDispatcher;
