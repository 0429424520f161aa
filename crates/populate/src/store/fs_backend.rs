use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::backend::{apply_indexes, id_of, DocumentMap, StorageBackend};
use crate::config::StoreConfig;
use crate::error::{PopulateError, Result};
use crate::naming::underscore;
use crate::schema::Schema;

/// Filesystem backend: every class is one pretty-printed JSON array at
/// `<data_dir>/<class>.json` (`Blog::Article` becomes `blog__article.json`).
#[derive(Debug, Clone)]
pub struct FsBackend {
    data_dir: PathBuf,
}

impl FsBackend {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let data_dir = config.data_dir.clone().ok_or_else(|| {
            PopulateError::MissingBackendConfig("store.data_dir is not set".to_string())
        })?;
        Ok(Self::new(data_dir))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn collection_path(&self, class_name: &str) -> PathBuf {
        let file = format!("{}.json", underscore(class_name).replace('/', "__"));
        self.data_dir.join(file)
    }

    fn load(&self, schema: &Schema) -> Result<Vec<DocumentMap>> {
        let path = self.collection_path(schema.class_name());
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path).map_err(PopulateError::Io)?;
        let records: Vec<DocumentMap> =
            serde_json::from_str(&content).map_err(PopulateError::Serialization)?;
        Ok(records)
    }

    fn save(&self, schema: &Schema, records: &[DocumentMap]) -> Result<()> {
        if !self.data_dir.exists() {
            fs::create_dir_all(&self.data_dir).map_err(PopulateError::Io)?;
        }
        let path = self.collection_path(schema.class_name());
        let content =
            serde_json::to_string_pretty(records).map_err(PopulateError::Serialization)?;

        // Atomic write
        let tmp_file = self.data_dir.join(format!(".collection-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp_file, content).map_err(PopulateError::Io)?;
        fs::rename(&tmp_file, &path).map_err(PopulateError::Io)?;
        Ok(())
    }
}

impl StorageBackend for FsBackend {
    fn documents(&self, schema: &Schema) -> Result<Vec<DocumentMap>> {
        self.load(schema)
    }

    fn perform_create(&self, schema: &Schema, doc: &DocumentMap) -> Result<String> {
        let mut records = self.load(schema)?;
        let mut record = doc.clone();
        let id = match id_of(schema, &record) {
            Some(id) => id.to_string(),
            None => {
                let id = Uuid::new_v4().to_string();
                record.insert(schema.id_field().to_string(), JsonValue::String(id.clone()));
                id
            }
        };
        records.push(record);
        self.save(schema, &records)?;
        Ok(id)
    }

    fn perform_update(&self, schema: &Schema, id: &str, doc: &DocumentMap) -> Result<()> {
        let mut records = self.load(schema)?;
        let record = records
            .iter_mut()
            .find(|r| id_of(schema, r) == Some(id))
            .ok_or_else(|| PopulateError::missing_document(schema.class_name(), Some(id)))?;
        *record = doc.clone();
        self.save(schema, &records)
    }

    fn perform_delete(&self, schema: &Schema, id: &str) -> Result<()> {
        let mut records = self.load(schema)?;
        let before = records.len();
        records.retain(|r| id_of(schema, r) != Some(id));
        if records.len() == before {
            return Err(PopulateError::missing_document(schema.class_name(), Some(id)));
        }
        self.save(schema, &records)
    }

    fn set_indexes(&self, schema: &Schema, field: &str, ids: &[String]) -> Result<()> {
        let mut records = self.load(schema)?;
        apply_indexes(schema, &mut records, field, ids);
        self.save(schema, &records)
    }
}
