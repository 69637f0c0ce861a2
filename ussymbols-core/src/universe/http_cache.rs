//! On-disk cache of raw HTTP responses.
//!
//! Listing directories, the SEC ticker map and each IPO calendar month are
//! fetched once and reused until `refresh` is requested.

use super::SourceError;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fetches a URL as text. The seam that lets sources run against fixtures.
pub trait TextFetcher: Send + Sync {
    fn fetch_text(&self, url: &str, headers: &[(&str, &str)]) -> Result<String, SourceError>;
}

pub struct ReqwestFetcher {
    client: reqwest::blocking::Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Http {
                url: String::new(),
                detail: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

impl TextFetcher for ReqwestFetcher {
    fn fetch_text(&self, url: &str, headers: &[(&str, &str)]) -> Result<String, SourceError> {
        let mut req = self.client.get(url);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        let resp = req.send().map_err(|e| SourceError::Http {
            url: url.to_string(),
            detail: e.to_string(),
        })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.text().map_err(|e| SourceError::Http {
            url: url.to_string(),
            detail: e.to_string(),
        })
    }
}

pub struct HttpCache<'a> {
    dir: PathBuf,
    refresh: bool,
    fetcher: &'a dyn TextFetcher,
}

impl<'a> HttpCache<'a> {
    pub fn new(dir: impl Into<PathBuf>, refresh: bool, fetcher: &'a dyn TextFetcher) -> Self {
        Self {
            dir: dir.into(),
            refresh,
            fetcher,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, cache_name: &str) -> PathBuf {
        self.dir.join(cache_name)
    }

    /// Cached text for `cache_name`, fetching `url` on a miss or refresh.
    pub fn get_text(
        &self,
        url: &str,
        cache_name: &str,
        headers: &[(&str, &str)],
    ) -> Result<String, SourceError> {
        let path = self.path_for(cache_name);
        if !self.refresh && path.exists() {
            return fs::read_to_string(&path).map_err(|source| SourceError::Io { path, source });
        }
        let text = self.fetcher.fetch_text(url, headers)?;
        self.store(cache_name, &text)?;
        Ok(text)
    }

    /// Fetch `url` bypassing the cache.
    pub fn fetch_uncached(&self, url: &str, headers: &[(&str, &str)]) -> Result<String, SourceError> {
        self.fetcher.fetch_text(url, headers)
    }

    /// Overwrite the cached body for `cache_name`.
    pub fn store(&self, cache_name: &str, text: &str) -> Result<(), SourceError> {
        let path = self.path_for(cache_name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| SourceError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, text).map_err(|source| SourceError::Io { path, source })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned bodies by URL and records requests.
    #[derive(Default)]
    pub struct MapFetcher {
        pub bodies: HashMap<String, String>,
        pub requests: Mutex<Vec<String>>,
    }

    impl MapFetcher {
        pub fn with(mut self, url: &str, body: &str) -> Self {
            self.bodies.insert(url.to_string(), body.to_string());
            self
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl TextFetcher for MapFetcher {
        fn fetch_text(&self, url: &str, _: &[(&str, &str)]) -> Result<String, SourceError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.bodies.get(url).cloned().ok_or_else(|| SourceError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }
}
