//! Atomically swappable resolved settings.
//!
//! Readers take an `Arc` of the current snapshot and keep it for as long as
//! they like; a reload publishes a new snapshot without blocking them.

use crate::error::ResolveError;
use crate::resolver::Resolver;
use crate::settings::{ResolvedSettings, SettingChange, SettingsNode};
use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::{info, warn};

/// A tree, the resolver for it, and the latest successful snapshot.
#[derive(Debug)]
pub struct SettingsHandle {
    resolver: Resolver,
    tree: SettingsNode,
    current: ArcSwap<ResolvedSettings>,
}

impl SettingsHandle {
    /// Resolve once; fails if the initial resolution fails.
    pub fn new(resolver: Resolver, tree: SettingsNode) -> Result<Self, ResolveError> {
        let initial = resolver.resolve(&tree)?;
        Ok(Self {
            resolver,
            tree,
            current: ArcSwap::from_pointee(initial),
        })
    }

    pub fn current(&self) -> Arc<ResolvedSettings> {
        self.current.load_full()
    }

    pub fn tree(&self) -> &SettingsNode {
        &self.tree
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Resolve again and publish the result.
    ///
    /// On failure the previous snapshot stays current and the error is
    /// returned. On success returns the keys whose values changed.
    pub fn reload(&self) -> Result<Vec<SettingChange>, ResolveError> {
        let fresh = match self.resolver.resolve(&self.tree) {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(
                    errors = e.errors().len(),
                    "Settings reload failed, keeping previous snapshot"
                );
                return Err(e);
            }
        };

        let fresh = Arc::new(fresh);
        let previous = self.current.swap(Arc::clone(&fresh));
        let changes = fresh.diff(&previous);
        if changes.is_empty() {
            info!("Settings reloaded, no changes");
        } else {
            for change in &changes {
                info!(key = %change.key, path = %change.path, "Setting changed");
            }
        }
        Ok(changes)
    }
}
