pub mod options;
pub mod pieces;
