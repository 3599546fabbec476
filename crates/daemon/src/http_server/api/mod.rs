pub mod client;
pub mod plugin;
