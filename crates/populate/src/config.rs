//! # Configuration
//!
//! Backend configuration is loaded with [`confique`] from, in priority order:
//!
//! 1. **Environment variables** (see the table)
//! 2. **A TOML file** passed to [`PopulateConfig::load_from`]
//! 3. **Compiled defaults**
//!
//! | Key | Env | Default | Description |
//! |-----|-----|---------|-------------|
//! | `store.data_dir` | `POPULATE_DATA_DIR` | none | Directory of the filesystem document store |
//! | `attachment.root` | `POPULATE_ATTACHMENT_ROOT` | none | Root directory of the local attachment backend |
//! | `attachment.url_prefix` | `POPULATE_ATTACHMENT_URL_PREFIX` | `/attachment` | Prefix of attachment URLs |
//!
//! ```toml
//! [store]
//! data_dir = "/var/lib/site/db"
//!
//! [attachment]
//! root = "/var/lib/site/public"
//! url_prefix = "/files"
//! ```
//!
//! Backends that need an unset key fail with `MissingBackendConfig` when
//! they are built from the configuration.

use std::path::{Path, PathBuf};

use confique::Config;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const DEFAULT_URL_PREFIX: &str = "/attachment";

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct PopulateConfig {
    #[config(nested)]
    pub store: StoreConfig,

    #[config(nested)]
    pub attachment: AttachmentConfig,
}

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreConfig {
    /// Directory holding one JSON file per document class
    #[config(env = "POPULATE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AttachmentConfig {
    /// Root directory for the local attachment backend
    #[config(env = "POPULATE_ATTACHMENT_ROOT")]
    pub root: Option<PathBuf>,

    #[config(env = "POPULATE_ATTACHMENT_URL_PREFIX", default = "/attachment")]
    pub url_prefix: String,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            root: None,
            url_prefix: DEFAULT_URL_PREFIX.to_string(),
        }
    }
}

impl PopulateConfig {
    /// Environment and defaults only.
    pub fn load() -> Result<Self> {
        Ok(Self::builder().env().load()?)
    }

    /// Environment over the TOML file at `path` over defaults. A missing
    /// file is treated as empty.
    pub fn load_from(path: &Path) -> Result<Self> {
        Ok(Self::builder().env().file(path).load()?)
    }
}
