pub mod chat;
pub mod connection;
pub mod interpreter;
pub mod tooling;
