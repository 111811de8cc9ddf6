pub mod classpath;
pub mod prepare;
pub mod task;

pub use classpath::{build_classpath, cleanup_natives, extract_natives};
pub use prepare::{LaunchState, Launcher};
pub use task::{GameCommand, LaunchOptions, LaunchOutcome};
