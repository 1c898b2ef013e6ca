/// Sound asset fetching
///
/// Resolves catalog asset references to raw file bytes. Fetchers run on loader
/// worker threads, so they must be `Send + Sync`.
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AudioError;
use crate::sound::{synth, SoundCatalog};

/// Source of raw sound-file bytes
pub trait AssetFetcher: Send + Sync {
    fn fetch(&self, asset: &str) -> Result<Vec<u8>, AudioError>;
}

impl<F> AssetFetcher for F
where
    F: Fn(&str) -> Result<Vec<u8>, AudioError> + Send + Sync,
{
    fn fetch(&self, asset: &str) -> Result<Vec<u8>, AudioError> {
        self(asset)
    }
}

/// Reads assets from a sound-pack directory
#[derive(Debug, Clone)]
pub struct FileFetcher {
    root: PathBuf,
}

impl FileFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetFetcher for FileFetcher {
    fn fetch(&self, asset: &str) -> Result<Vec<u8>, AudioError> {
        let path = self.root.join(asset.trim_start_matches('/'));
        let data = std::fs::read(&path).map_err(|e| AudioError::AssetLoadFailure {
            asset: path.display().to_string(),
            source: Box::new(e),
        })?;
        tracing::debug!("Read {} ({} bytes)", path.display(), data.len());
        Ok(data)
    }
}

/// Downloads assets relative to a base URL
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    base_url: String,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }

    pub fn url_for(&self, asset: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            asset.trim_start_matches('/')
        )
    }
}

impl AssetFetcher for HttpFetcher {
    fn fetch(&self, asset: &str) -> Result<Vec<u8>, AudioError> {
        let url = self.url_for(asset);
        let response = ureq::get(&url)
            .timeout(self.timeout)
            .call()
            .map_err(|e| AudioError::AssetLoadFailure {
                asset: url.clone(),
                source: Box::new(e),
            })?;

        let mut data = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut data)
            .map_err(|e| AudioError::AssetLoadFailure {
                asset: url.clone(),
                source: Box::new(e),
            })?;
        tracing::debug!("Downloaded {} ({} bytes)", url, data.len());
        Ok(data)
    }
}

/// Serves the built-in synthesized click pack
///
/// Understands the standard catalog paths (`press/space.wav`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SynthFetcher;

impl AssetFetcher for SynthFetcher {
    fn fetch(&self, asset: &str) -> Result<Vec<u8>, AudioError> {
        let key = SoundCatalog::key_for_asset(asset).ok_or_else(|| AudioError::AssetLoadFailure {
            asset: asset.to_string(),
            source: "no synthesized sound for this asset".into(),
        })?;
        synth::render_wav(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::{KeyCategory, SoundKey};

    #[test]
    fn test_closure_fetcher() {
        let fetcher = |asset: &str| -> Result<Vec<u8>, AudioError> { Ok(asset.as_bytes().to_vec()) };
        assert_eq!(fetcher.fetch("abc").unwrap(), b"abc".to_vec());
    }

    #[test]
    fn test_file_fetcher_reads_relative_path() {
        let dir = std::env::temp_dir().join(format!("keyclack-fetch-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("press")).unwrap();
        std::fs::write(dir.join("press/space.wav"), b"RIFF").unwrap();

        let fetcher = FileFetcher::new(&dir);
        assert_eq!(fetcher.fetch("press/space.wav").unwrap(), b"RIFF".to_vec());
        assert_eq!(fetcher.fetch("/press/space.wav").unwrap(), b"RIFF".to_vec());
        assert!(matches!(
            fetcher.fetch("press/missing.wav"),
            Err(AudioError::AssetLoadFailure { .. })
        ));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_http_url_joining() {
        let fetcher = HttpFetcher::new("https://example.com/packs/cream/", Duration::from_secs(1));
        assert_eq!(
            fetcher.url_for("/press/enter.wav"),
            "https://example.com/packs/cream/press/enter.wav"
        );
    }

    #[test]
    fn test_synth_fetcher() {
        let bytes = SynthFetcher.fetch("release/backspace.wav").unwrap();
        assert_eq!(bytes, synth::render_wav(SoundKey::release(KeyCategory::Backspace)).unwrap());
        assert!(SynthFetcher.fetch("release/tab.wav").is_err());
    }
}
