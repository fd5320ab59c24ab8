// Library root — the binary in src/main.rs and the integration tests both
// build on these modules.

pub mod bootstrap;
pub mod core;
pub mod llm;
pub mod subsystems;

pub use bootstrap::logger;
pub use self::core::{config, error};
