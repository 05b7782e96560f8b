pub mod client;
pub mod models;
pub mod request;
pub mod response;
pub mod sanitize;
