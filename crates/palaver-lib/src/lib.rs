pub mod chat;
pub mod completion;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod output;
pub mod prompt;
pub mod runtime;
pub mod settings;
