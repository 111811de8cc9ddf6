pub mod dependencies;
pub mod minecraft;
pub mod model;
pub mod outdated;
pub mod overwrites;
pub mod requirements;

pub use dependencies::{extract_modpack, needs_updating, COMPANION_NAME};
pub use model::Instance;
pub(crate) use model::create_dir;
pub use outdated::OutdatedEntry;
