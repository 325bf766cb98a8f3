//! Use case layer: application workflows over the backend contracts.

pub mod authenticate;
pub mod bootstrap;
pub mod chat_set;
pub mod context;
pub mod inbox;
pub mod send_message;
