pub mod launch_manifest;
pub mod manifest;
pub mod rules;

pub use launch_manifest::{fallback_jvm_args, Artifact, AssetIndexRef, LaunchManifest, Library};
pub use manifest::{VersionEntry, VersionManifest, VERSION_MANIFEST_URL};
pub use rules::{Environment, Rule};
