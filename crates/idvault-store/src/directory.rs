//! Directory nodes stored as blobs.
//!
//! A directory is a CBOR-encoded map from link name to child content id.
//! Because it is itself content-addressed, any change produces a new id.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use idvault_core::ContentId;

use crate::error::{Result, StoreError};

/// Magic marker distinguishing directory nodes from plain blobs.
const DIRECTORY_MAGIC: &str = "idvault-dir-v1";

/// A directory node: named links to other blobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryNode {
    magic: String,
    pub links: BTreeMap<String, ContentId>,
}

impl DirectoryNode {
    pub fn new() -> Self {
        Self {
            magic: DIRECTORY_MAGIC.to_string(),
            links: BTreeMap::new(),
        }
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes, rejecting non-directory blobs.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let node: DirectoryNode = ciborium::from_reader(bytes)
            .map_err(|_| StoreError::InvalidData("blob is not a directory".into()))?;
        if node.magic != DIRECTORY_MAGIC {
            return Err(StoreError::InvalidData("blob is not a directory".into()));
        }
        Ok(node)
    }

    pub fn with_link(mut self, name: &str, child: ContentId) -> Self {
        self.links.insert(name.to_string(), child);
        self
    }

    pub fn without_link(mut self, name: &str) -> Result<Self> {
        self.links
            .remove(name)
            .ok_or_else(|| StoreError::NotFound(format!("directory link {name}")))?;
        Ok(self)
    }
}

impl Default for DirectoryNode {
    fn default() -> Self {
        Self::new()
    }
}
