pub mod chat;
pub mod documents;
pub mod embeddings;
pub mod health;
pub mod uploads;
