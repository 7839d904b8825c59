//! Runs one synchronizer per resource.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use livesync_engine::{CollectionSnapshot, ResourceName, Revision};

use super::{Collaborators, ResourceConfig, Result, SharedObserver, SyncError, Synchronizer};

/// Owns the synchronizers of every configured resource.
///
/// Resources are independent: a failed fetch or closed feed on one never
/// affects another.
pub struct Coordinator {
    collaborators: Collaborators,
    observers: Vec<SharedObserver>,
    synchronizers: DashMap<ResourceName, Synchronizer>,
}

impl Coordinator {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            observers: Vec::new(),
            synchronizers: DashMap::new(),
        }
    }

    /// Register an observer for every resource started afterwards.
    pub fn add_observer(&mut self, observer: SharedObserver) {
        self.observers.push(observer);
    }

    /// Start synchronizing one resource.
    pub fn start(&self, config: ResourceConfig) -> Result<Synchronizer> {
        self.launch(config, None)
    }

    /// Start every resource.
    ///
    /// Names are checked up front; on a duplicate nothing is started.
    pub fn start_all(&self, configs: impl IntoIterator<Item = ResourceConfig>) -> Result<()> {
        let configs: Vec<_> = configs.into_iter().collect();

        let mut seen = HashSet::new();
        for config in &configs {
            if !seen.insert(config.name.as_str()) || self.synchronizers.contains_key(&config.name) {
                return Err(SyncError::DuplicateResource(config.name.clone()));
            }
        }

        for config in configs {
            self.start(config)?;
        }

        tracing::info!(resources = self.synchronizers.len(), "all resources started");
        Ok(())
    }

    /// Stop one resource. The others keep running.
    pub async fn stop(&self, name: &str) -> Result<()> {
        let (_, sync) = self
            .synchronizers
            .remove(name)
            .ok_or_else(|| SyncError::UnknownResource(name.to_string()))?;
        sync.stop().await;
        Ok(())
    }

    /// Stop and start a resource again with the same configuration.
    ///
    /// Resubscribes a resource whose change feed closed.
    /// Revisions continue from the previous run, so clients that keep the
    /// highest revision accept the new snapshots.
    pub async fn restart(&self, name: &str) -> Result<Synchronizer> {
        let previous = self.handle(name)?;
        self.stop(name).await?;
        self.launch(previous.config().clone(), Some(previous.snapshot().revision))
    }

    fn launch(&self, config: ResourceConfig, after: Option<Revision>) -> Result<Synchronizer> {
        match self.synchronizers.entry(config.name.clone()) {
            Entry::Occupied(_) => Err(SyncError::DuplicateResource(config.name)),
            Entry::Vacant(slot) => {
                let collaborators = self.collaborators.clone();
                let observers = self.observers.clone();
                let sync = match after {
                    Some(revision) => {
                        Synchronizer::resume(config, collaborators, observers, revision)
                    }
                    None => Synchronizer::start(config, collaborators, observers),
                };
                slot.insert(sync.clone());
                Ok(sync)
            }
        }
    }

    /// Stop every resource.
    pub async fn stop_all(&self) {
        let names = self.resources();
        let stopping = names
            .iter()
            .filter_map(|name| self.synchronizers.remove(name))
            .map(|(_, sync)| async move { sync.stop().await });

        futures::future::join_all(stopping).await;
        tracing::info!(stopped = names.len(), "all resources stopped");
    }

    /// Handle of a running resource.
    pub fn handle(&self, name: &str) -> Result<Synchronizer> {
        self.synchronizers
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SyncError::UnknownResource(name.to_string()))
    }

    /// Names of running resources, sorted.
    pub fn resources(&self) -> Vec<ResourceName> {
        let mut names: Vec<_> = self
            .synchronizers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Latest snapshot of every running resource, sorted by name.
    pub fn snapshots(&self) -> Vec<Arc<CollectionSnapshot>> {
        let mut snapshots: Vec<_> = self
            .synchronizers
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.resource.cmp(&b.resource));
        snapshots
    }

    pub fn len(&self) -> usize {
        self.synchronizers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.synchronizers.is_empty()
    }
}
