pub mod runtime;

pub use runtime::extract_archive;
pub use runtime::required_java_for_minecraft_version;
pub use runtime::AdoptiumRelease;
pub use runtime::JavaManager;
