pub mod api;
pub mod prompt_file;
