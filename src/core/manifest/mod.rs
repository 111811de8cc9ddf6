pub mod lockfile;
#[allow(clippy::module_inception)]
pub mod manifest;

pub use lockfile::{
    DependencyLock, DependencyType, FabricLock, ForgeLock, Lockfile, PlatformLock, VanillaLock,
    LOCKFILE_FILE, ROOT_DEPENDENT,
};
pub use manifest::{
    InterpretedDependency, Manifest, PackageType, Platform, Requirements, MANIFEST_FILE,
};
