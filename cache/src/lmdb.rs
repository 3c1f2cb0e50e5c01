//! LMDB-backed blob store.

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::blob::BlobStore;
use crate::error::CacheError;

const BLOBS_DB: &str = "blobs";
const MAX_DBS: u32 = 1;

pub struct LmdbBlobStore {
    env: Env,
    blobs: Database<Bytes, Bytes>,
}

impl LmdbBlobStore {
    /// Open or create the store in directory `path`.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, CacheError> {
        std::fs::create_dir_all(path)?;
        // SAFETY: the environment is opened once per directory by this process
        // and never memory-mapped elsewhere.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };
        let mut wtxn = env.write_txn()?;
        let blobs = env.create_database(&mut wtxn, Some(BLOBS_DB))?;
        wtxn.commit()?;
        tracing::info!(path = %path.display(), map_size, "blob store opened");
        Ok(Self { env, blobs })
    }
}

impl BlobStore for LmdbBlobStore {
    fn put(&self, id: &str, bytes: &[u8]) -> Result<(), CacheError> {
        let mut wtxn = self.env.write_txn()?;
        self.blobs.put(&mut wtxn, id.as_bytes(), bytes)?;
        wtxn.commit()?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let rtxn = self.env.read_txn()?;
        let value = self.blobs.get(&rtxn, id.as_bytes())?;
        Ok(value.map(<[u8]>::to_vec))
    }

    fn delete(&self, id: &str) -> Result<bool, CacheError> {
        let mut wtxn = self.env.write_txn()?;
        let removed = self.blobs.delete(&mut wtxn, id.as_bytes())?;
        wtxn.commit()?;
        Ok(removed)
    }
}
