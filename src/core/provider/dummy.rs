use std::path::PathBuf;

use async_trait::async_trait;

use crate::core::downloader::Downloadable;
use crate::core::error::{MinepkgError, MinepkgResult};
use crate::core::manifest::{DependencyLock, DependencyType};
use crate::core::pkgid::{DISABLED, DUMMY_PROVIDER};

use super::{Provider, ProviderError, Resolution, ResolutionRequest};

/// Stands in for dependencies the user disabled with `"none"`. Never
/// touches the network.
#[derive(Debug, Default)]
pub struct DummyProvider;

#[async_trait]
impl Provider for DummyProvider {
    fn name(&self) -> &'static str {
        DUMMY_PROVIDER
    }

    async fn resolve(&self, request: &ResolutionRequest) -> Result<Resolution, ProviderError> {
        Ok(Resolution::leaf(DependencyLock {
            name: request.dependency.name.clone(),
            version: DISABLED.to_string(),
            provider: DUMMY_PROVIDER.to_string(),
            dependency_type: DependencyType::Generic,
            ..Default::default()
        }))
    }

    fn fetch_item(
        &self,
        _lock: &DependencyLock,
        _target: PathBuf,
    ) -> MinepkgResult<Box<dyn Downloadable>> {
        Err(MinepkgError::ProviderUnsupported {
            provider: DUMMY_PROVIDER.to_string(),
            operation: "fetch",
        })
    }
}
