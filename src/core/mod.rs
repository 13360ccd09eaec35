pub mod chat_stream;
pub mod config;
pub mod context;
pub mod pricing;
pub mod session;
pub mod transcript;
