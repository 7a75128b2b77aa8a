pub mod chat;
pub mod health;
pub(crate) mod streaming;
