//! Digest-addressed storage for binary resource content.
//!
//! File and image resources keep their bytes outside the XML documents:
//! content is stored once under its SHA-256 digest and referenced from the
//! resource document. Identical uploads share one blob.

use std::io::ErrorKind;
use std::path::PathBuf;

use bytes::Bytes;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::infra::error::InfraError;

pub struct ContentStore {
    dir: Option<PathBuf>,
    blobs: DashMap<String, Bytes>,
}

impl ContentStore {
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            blobs: DashMap::new(),
        }
    }

    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, InfraError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir: Some(dir),
            blobs: DashMap::new(),
        })
    }

    /// Store a blob, returning its digest.
    pub async fn store(&self, bytes: Bytes) -> Result<String, InfraError> {
        let digest = hex::encode(Sha256::digest(&bytes));
        if let Some(dir) = &self.dir {
            let file = dir.join(&digest);
            match tokio::fs::metadata(&file).await {
                Ok(_) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    let tmp = file.with_extension("tmp");
                    tokio::fs::write(&tmp, &bytes).await?;
                    tokio::fs::rename(&tmp, &file).await?;
                    debug!(digest = %digest, size = bytes.len(), "content blob written");
                }
                Err(err) => return Err(err.into()),
            }
        }
        self.blobs.insert(digest.clone(), bytes);
        Ok(digest)
    }

    /// Fetch a blob by digest, falling back to disk for blobs stored by a
    /// previous process.
    pub async fn get(&self, digest: &str) -> Result<Option<Bytes>, InfraError> {
        if let Some(blob) = self.blobs.get(digest) {
            return Ok(Some(blob.value().clone()));
        }
        let Some(dir) = &self.dir else {
            return Ok(None);
        };
        match tokio::fs::read(dir.join(digest)).await {
            Ok(bytes) => {
                let bytes = Bytes::from(bytes);
                self.blobs.insert(digest.to_string(), bytes.clone());
                Ok(Some(bytes))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_and_fetch_round_trip() {
        let store = ContentStore::in_memory();
        let digest = store
            .store(Bytes::from_static(b"hello"))
            .await
            .expect("store");
        let fetched = store.get(&digest).await.expect("get").expect("blob");
        assert_eq!(&fetched[..], b"hello");
        assert!(store.get("unknown").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn identical_content_shares_a_digest() {
        let store = ContentStore::in_memory();
        let first = store.store(Bytes::from_static(b"same")).await.expect("a");
        let second = store.store(Bytes::from_static(b"same")).await.expect("b");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn blobs_survive_a_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let digest = {
            let store = ContentStore::open(dir.path()).await.expect("open");
            store
                .store(Bytes::from_static(b"durable"))
                .await
                .expect("store")
        };
        let reopened = ContentStore::open(dir.path()).await.expect("reopen");
        let fetched = reopened.get(&digest).await.expect("get").expect("blob");
        assert_eq!(&fetched[..], b"durable");
    }
}
