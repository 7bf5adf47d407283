use ahash::AHashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::catalog;
use super::definition::ProfileDefinition;
use super::types::FingerprintProfile;
use crate::error::{RelayError, Result};

/// Read-only lookup of fingerprint profiles by identifier.
///
/// Every profile is validated when the store is built; afterwards the store is
/// never mutated, so it can be shared behind an `Arc` without locking.
#[derive(Debug)]
pub struct ProfileStore {
    profiles: AHashMap<String, Arc<FingerprintProfile>>,
    order: Vec<String>,
}

impl ProfileStore {
    /// Build a store from definitions, failing on the first invalid one.
    pub fn from_definitions<I>(definitions: I) -> Result<Self>
    where
        I: IntoIterator<Item = ProfileDefinition>,
    {
        let mut profiles = AHashMap::new();
        let mut order = Vec::new();
        for def in definitions {
            let profile = def.build()?;
            let id = profile.id().to_string();
            if profiles.contains_key(&id) {
                return Err(RelayError::invalid_profile(&id, "duplicate profile id"));
            }
            debug!(profile = %id, ciphers = profile.cipher_suites().len(), "profile loaded");
            order.push(id.clone());
            profiles.insert(id, Arc::new(profile));
        }
        Ok(Self { profiles, order })
    }

    /// The built-in catalog only.
    pub fn builtin() -> Result<Self> {
        Self::from_definitions(catalog::builtin_definitions())
    }

    /// The built-in catalog followed by `extra` definitions.
    /// Extra definitions cannot reuse a built-in id.
    pub fn with_extra(extra: &[ProfileDefinition]) -> Result<Self> {
        let store = Self::from_definitions(
            catalog::builtin_definitions()
                .into_iter()
                .chain(extra.iter().cloned()),
        )?;
        info!(profiles = store.order.len(), extra = extra.len(), "profile store ready");
        Ok(store)
    }

    pub fn get_profile(&self, id: &str) -> Result<Arc<FingerprintProfile>> {
        self.profiles
            .get(id)
            .cloned()
            .ok_or_else(|| RelayError::ProfileNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.profiles.contains_key(id)
    }

    /// Profile ids in load order.
    pub fn list_profiles(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Profiles in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<FingerprintProfile>> {
        self.order.iter().filter_map(|id| self.profiles.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
