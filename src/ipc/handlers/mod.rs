pub mod attendance;
pub mod core;
pub mod settings;
