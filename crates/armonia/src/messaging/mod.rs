//! Direct conversations between members, with delivery and read tracking.

mod domain;
mod router;
mod service;

pub use domain::{
    Attachment, Conversation, ConversationType, Message, MessageQuery, MessageRead, MessageStatus,
    NewConversation, NewMessage,
};
pub use router::messaging_router;
pub use service::MessagingService;
