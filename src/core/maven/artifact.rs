use crate::core::error::{MinepkgError, MinepkgResult};

/// A `group:artifact:version[:classifier][@extension]` coordinate, used for
/// libraries whose launch manifest entry carries no explicit path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MavenArtifact {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub classifier: Option<String>,
    pub extension: String,
}

impl MavenArtifact {
    pub fn parse(coord: &str) -> MinepkgResult<Self> {
        let (coord_part, extension) = match coord.rsplit_once('@') {
            Some((coord, ext)) => (coord, ext),
            None => (coord, "jar"),
        };

        let mut parts = coord_part.split(':');
        let (Some(group_id), Some(artifact_id), Some(version)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(MinepkgError::InvalidMavenCoordinate(coord.to_string()));
        };
        let classifier = parts.next().map(str::to_string);
        if parts.next().is_some() || group_id.is_empty() || artifact_id.is_empty() {
            return Err(MinepkgError::InvalidMavenCoordinate(coord.to_string()));
        }

        Ok(Self {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
            classifier,
            extension: extension.to_string(),
        })
    }

    pub fn filename(&self) -> String {
        match &self.classifier {
            Some(c) => format!("{}-{}-{}.{}", self.artifact_id, self.version, c, self.extension),
            None => format!("{}-{}.{}", self.artifact_id, self.version, self.extension),
        }
    }

    /// `group/path/artifact/version/filename`, always `/`-separated so it
    /// doubles as a URL suffix.
    pub fn path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group_id.replace('.', "/"),
            self.artifact_id,
            self.version,
            self.filename()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_coordinate_path() {
        let a = MavenArtifact::parse("net.fabricmc:fabric-loader:0.11.6").unwrap();
        assert_eq!(a.path(), "net/fabricmc/fabric-loader/0.11.6/fabric-loader-0.11.6.jar");
    }

    #[test]
    fn classifier_and_extension() {
        let a = MavenArtifact::parse("org.lwjgl:lwjgl:3.3.3:natives-linux@zip").unwrap();
        assert_eq!(a.filename(), "lwjgl-3.3.3-natives-linux.zip");
    }

    #[test]
    fn malformed_coordinates_are_rejected() {
        assert!(MavenArtifact::parse("just-a-name").is_err());
        assert!(MavenArtifact::parse("a:b:c:d:e").is_err());
    }
}
