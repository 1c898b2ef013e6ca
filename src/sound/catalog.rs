/// Sound catalog
///
/// Static mapping from sound slot to asset reference. Asset references are
/// relative paths (`press/space.wav`) that an `AssetFetcher` resolves against a
/// directory, a URL base, or the built-in synthesizer.
use std::collections::BTreeMap;

use super::key::{Action, KeyCategory, SoundKey};

/// One catalog row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub key: SoundKey,
    pub asset: String,
}

/// Catalog of sound assets, one per slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundCatalog {
    entries: BTreeMap<SoundKey, String>,
}

impl SoundCatalog {
    /// Empty catalog
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Default catalog: every slot mapped to `{action}/{category}.wav`
    pub fn standard() -> Self {
        let mut catalog = Self::empty();
        for key in SoundKey::all() {
            catalog.insert(key, Self::asset_path(key));
        }
        catalog
    }

    /// Conventional asset path for a slot
    pub fn asset_path(key: SoundKey) -> String {
        format!("{}/{}.wav", key.action, key.category)
    }

    /// Inverse of [`SoundCatalog::asset_path`], ignoring the file extension
    pub fn key_for_asset(asset: &str) -> Option<SoundKey> {
        let (action, file) = asset.trim_start_matches('/').split_once('/')?;
        let stem = file.split('.').next()?;
        let action: Action = action.parse().ok()?;
        let category: KeyCategory = stem.parse().ok()?;
        Some(SoundKey::new(action, category))
    }

    /// Add or replace the asset for a slot
    pub fn insert(&mut self, key: SoundKey, asset: impl Into<String>) {
        self.entries.insert(key, asset.into());
    }

    /// Builder form of [`SoundCatalog::insert`]
    pub fn with(mut self, key: SoundKey, asset: impl Into<String>) -> Self {
        self.insert(key, asset);
        self
    }

    pub fn asset(&self, key: SoundKey) -> Option<&str> {
        self.entries.get(&key).map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = CatalogEntry> + '_ {
        self.entries.iter().map(|(key, asset)| CatalogEntry {
            key: *key,
            asset: asset.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SoundCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
