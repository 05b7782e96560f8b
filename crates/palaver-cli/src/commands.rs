pub mod chat;
pub mod complete;
