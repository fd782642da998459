pub mod config;
pub mod offset;
pub mod stack;
