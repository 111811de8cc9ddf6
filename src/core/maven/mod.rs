mod artifact;

pub use artifact::MavenArtifact;

pub const MOJANG_LIBRARIES: &str = "https://libraries.minecraft.net/";
