//! Repository interface.
//!
//! A repository stores `(name → content)` pairs behind a prefix it
//! adopted through autoconfiguration. Persistence is an implementation
//! concern behind this trait; the in-memory implementation here is the
//! one the node ships with.

use bytes::Bytes;
use rust_nfn_common::name::Name;
use rust_nfn_common::Result;
use std::collections::HashMap;
use std::sync::Mutex;

pub trait Repository: Send + Sync {
    /// Stores content under `name`.
    fn add(&self, name: Name, content: Bytes) -> Result<()>;

    /// Exact-name lookup.
    fn get(&self, name: &Name) -> Option<Bytes>;

    /// Adopts the prefix assigned during registration.
    fn set_prefix(&self, prefix: Name);

    fn prefix(&self) -> Name;

    /// Where the repository keeps its data, if anywhere.
    fn path(&self) -> String;
}

#[derive(Debug, Default)]
struct MemoryRepositoryInner {
    contents: HashMap<Name, Bytes>,
    prefix: Name,
}

/// Volatile repository backed by a map.
#[derive(Debug)]
pub struct MemoryRepository {
    inner: Mutex<MemoryRepositoryInner>,
    path: String,
}

impl MemoryRepository {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(MemoryRepositoryInner::default()),
            path: path.into(),
        }
    }
}

impl Repository for MemoryRepository {
    fn add(&self, name: Name, content: Bytes) -> Result<()> {
        let mut inner = self.inner.lock().expect("repository poisoned");
        inner.contents.insert(name, content);
        Ok(())
    }

    fn get(&self, name: &Name) -> Option<Bytes> {
        let inner = self.inner.lock().expect("repository poisoned");
        inner.contents.get(name).cloned()
    }

    fn set_prefix(&self, prefix: Name) {
        let mut inner = self.inner.lock().expect("repository poisoned");
        inner.prefix = prefix;
    }

    fn prefix(&self) -> Name {
        let inner = self.inner.lock().expect("repository poisoned");
        inner.prefix.clone()
    }

    fn path(&self) -> String {
        self.path.clone()
    }
}
