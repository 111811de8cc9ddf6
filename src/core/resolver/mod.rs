// ─── Resolver ───
// Closure over the dependency graph. Names are claimed (`None`) before the
// provider is called, so diamonds and cycles resolve each name exactly once;
// the first claim wins. Provider calls are sequential.

use std::collections::{BTreeMap, HashMap, VecDeque};

use tracing::{debug, info, instrument};

use crate::core::error::MinepkgResult;
use crate::core::manifest::{DependencyLock, InterpretedDependency, PlatformLock, ROOT_DEPENDENT};
use crate::core::provider::{ProviderStore, ResolutionRequest};

pub struct Resolver<'a> {
    store: &'a ProviderStore,
    platform: Option<PlatformLock>,
    /// `None` while a name is being resolved, `Some` once done.
    resolved: HashMap<String, Option<DependencyLock>>,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a ProviderStore, platform: Option<PlatformLock>) -> Self {
        Self {
            store,
            platform,
            resolved: HashMap::new(),
        }
    }

    /// Resolve `dependencies` and everything they pull in.
    ///
    /// Any failure aborts the pass; nothing partial is returned.
    ///
    /// # Panics
    /// When the resolver was built without a platform lock.
    #[instrument(skip_all, fields(count = dependencies.len()))]
    pub async fn resolve(
        &mut self,
        dependencies: &[InterpretedDependency],
    ) -> MinepkgResult<BTreeMap<String, DependencyLock>> {
        let Some(platform) = self.platform.clone() else {
            panic!("dependencies cannot be resolved without a platform lock");
        };

        let mut queue: VecDeque<(DependencyLock, Vec<InterpretedDependency>)> = VecDeque::new();

        for dependency in dependencies {
            if let Some((lock, next)) = self.resolve_one(dependency, None, &platform).await? {
                queue.push_back((lock, next));
            }
        }

        while let Some((parent, children)) = queue.pop_front() {
            for child in &children {
                if let Some((lock, next)) = self.resolve_one(child, Some(&parent), &platform).await? {
                    queue.push_back((lock, next));
                }
            }
        }

        let locks: BTreeMap<String, DependencyLock> = self
            .resolved
            .drain()
            .filter_map(|(name, lock)| lock.map(|lock| (name, lock)))
            .collect();
        info!("Resolved {} dependencies", locks.len());
        Ok(locks)
    }

    /// `None` if the name was already claimed.
    async fn resolve_one(
        &mut self,
        dependency: &InterpretedDependency,
        parent: Option<&DependencyLock>,
        platform: &PlatformLock,
    ) -> MinepkgResult<Option<(DependencyLock, Vec<InterpretedDependency>)>> {
        let name = dependency.name().to_string();
        if self.resolved.contains_key(&name) {
            debug!("{} already claimed, skipping", name);
            return Ok(None);
        }
        self.resolved.insert(name.clone(), None);

        let mut id = dependency.id.clone();
        if id.platform.is_empty() {
            id.platform = platform.platform_name().to_string();
        }
        let request = ResolutionRequest {
            dependency: id,
            platform: platform.clone(),
            parent: parent.cloned(),
        };

        let resolution = self.store.resolve(&request).await?;
        let mut lock = resolution.lock;
        if lock.name.is_empty() {
            lock.name = name.clone();
        }
        lock.dependent = parent
            .map(|p| p.name.clone())
            .unwrap_or_else(|| ROOT_DEPENDENT.to_string());
        lock.is_dev = dependency.is_dev || parent.is_some_and(|p| p.is_dev);

        debug!("Resolved {} -> {}@{}", name, lock.name, lock.version);
        self.resolved.insert(name, Some(lock.clone()));
        Ok(Some((lock, resolution.dependencies)))
    }
}
