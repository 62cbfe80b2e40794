pub mod bridge;
pub mod cli;
pub mod commands;
pub mod logs;
pub mod platform;
pub mod shutdown;
pub mod store;
pub mod supervisor;
