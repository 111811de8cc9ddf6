use futures_util::stream::{self, StreamExt};
use tracing::{debug, instrument, warn};

use crate::core::error::{MinepkgError, MinepkgResult};
use crate::core::provider::ResolutionRequest;

use super::Instance;

const LATEST_CONCURRENCY: usize = 8;

/// One row of the outdated report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutdatedEntry {
    pub name: String,
    pub provider: String,
    /// Locked version, `None` when the dependency was never resolved.
    pub current: Option<String>,
    pub latest: String,
}

impl OutdatedEntry {
    pub fn is_outdated(&self) -> bool {
        self.current.as_deref() != Some(self.latest.as_str())
    }
}

impl Instance {
    /// Ask every provider for the newest release of each manifest dependency.
    /// Providers that cannot answer latest-version queries are skipped.
    #[instrument(skip_all, fields(instance = %self.manifest.package.name))]
    pub async fn outdated(&self) -> MinepkgResult<Vec<OutdatedEntry>> {
        let platform = self
            .platform_lock()
            .ok_or(MinepkgError::RequirementsNotLocked)?;
        let dependencies = self
            .manifest
            .interpreted_dependencies(self.global.settings.include_dev_dependencies);
        let providers = &self.global.providers;

        let results: Vec<MinepkgResult<Option<OutdatedEntry>>> = stream::iter(dependencies)
            .map(|dependency| {
                let request = ResolutionRequest::new(dependency.id.clone(), platform.clone());
                let current = self
                    .lockfile
                    .as_ref()
                    .and_then(|l| l.dependencies.get(dependency.name()))
                    .map(|lock| lock.version.clone());
                async move {
                    match providers.resolve_latest(&request).await {
                        Ok(resolution) => Ok(Some(OutdatedEntry {
                            name: dependency.name().to_string(),
                            provider: dependency.id.provider.clone(),
                            current,
                            latest: resolution.lock.version,
                        })),
                        Err(MinepkgError::ProviderUnsupported { provider, .. }) => {
                            warn!(
                                "{} cannot check {} for updates, skipping",
                                provider,
                                dependency.name()
                            );
                            Ok(None)
                        }
                        Err(e) => Err(e),
                    }
                }
            })
            .buffered(LATEST_CONCURRENCY)
            .collect()
            .await;

        let mut entries = Vec::new();
        for result in results {
            if let Some(entry) = result? {
                entries.push(entry);
            }
        }
        debug!(
            "{} of {} dependencies have newer releases",
            entries.iter().filter(|e| e.is_outdated()).count(),
            entries.len()
        );
        Ok(entries)
    }
}
