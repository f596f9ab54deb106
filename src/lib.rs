pub mod core;
pub mod extract;
pub mod history;
pub mod llm;
pub mod rag;
pub mod server;
pub mod state;
