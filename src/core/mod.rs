// ─── minepkg Core ───
// Package manager and launch preparation for Minecraft instances.
//
// Architecture:
//   core/
//     pkgid       Dependency id grammar (`provider:platform/name@version`)
//     constraint  Lenient semver parsing and ranges
//     manifest/   minepkg.toml + minepkg-lock.toml
//     provider/   Registry, modrinth, https and dummy providers + store
//     resolver/   Dependency graph walk into lock entries
//     downloader/ Bounded-concurrency retrying download queue
//     loaders/    Vanilla / Fabric requirement pinning + launch manifests
//     version/    Mojang version list, launch manifest, OS rules
//     maven/      Maven coordinate paths
//     assets/     Asset index + object downloads
//     java/       Adoptium runtime install
//     instance/   Instance dir: staleness, linking, overwrites
//     launch/     Preparation state machine + process spawn
//     state/      Data dir, settings, shared HTTP client

pub mod assets;
pub mod constraint;
pub mod downloader;
pub mod error;
pub mod http;
pub mod instance;
pub mod java;
pub mod launch;
pub mod loaders;
pub mod manifest;
pub mod maven;
pub mod pkgid;
pub mod provider;
pub mod resolver;
pub mod state;
pub mod version;

#[cfg(test)]
pub mod test_support;
