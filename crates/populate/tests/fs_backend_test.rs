use populate::config::PopulateConfig;
use populate::schema::{FieldOptions, FieldType};
use populate::store::FsBackend;
use populate::{LocalBackend, PopulateError, Registry, Repository, SetOptions, Value};
use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn registry() -> Arc<Registry> {
    let mut registry = Registry::new();
    registry
        .define("Site::Page")
        .field("title", FieldOptions::string())
        .field("published_on", FieldOptions::new(FieldType::Date))
        .field("position", FieldOptions::new(FieldType::Position))
        .build()
        .unwrap();
    Arc::new(registry)
}

#[test]
fn test_documents_persist_across_repositories() {
    let dir = TempDir::new().unwrap();
    let registry = registry();

    let id = {
        let repo = Repository::new(Arc::clone(&registry), FsBackend::new(dir.path()));
        let mut page = repo
            .build_from_hash(
                "Site::Page",
                &json!({"title": "About", "published_on": "14/02/2024"}),
                SetOptions::typecast(),
            )
            .unwrap();
        repo.save(&mut page).unwrap().unwrap()
    };

    let repo = Repository::new(Arc::clone(&registry), FsBackend::new(dir.path()));
    let page = repo.get("Site::Page", &id).unwrap().unwrap();
    assert_eq!(page.get("title"), &Value::text("About"));
    assert_eq!(
        page.get("published_on"),
        &Value::Date(chrono::NaiveDate::from_ymd_opt(2024, 2, 14).unwrap())
    );

    let raw = fs::read_to_string(dir.path().join("site__page.json")).unwrap();
    assert!(raw.contains("\"_class\": \"Site::Page\""));
    assert!(raw.contains("\"published_on\": \"2024-02-14\""));
}

#[test]
fn test_no_temp_files_left_behind() {
    let dir = TempDir::new().unwrap();
    let repo = Repository::new(registry(), FsBackend::new(dir.path()));
    for title in ["a", "b"] {
        let mut page = repo.build("Site::Page").unwrap();
        page.set("title", title);
        repo.save(&mut page).unwrap();
    }
    let entries: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(entries, vec!["site__page.json".to_string()]);
}

#[test]
fn test_reorder_on_disk() {
    let dir = TempDir::new().unwrap();
    let repo = Repository::new(registry(), FsBackend::new(dir.path()));
    let mut ids = Vec::new();
    for title in ["a", "b", "c"] {
        let mut page = repo.build("Site::Page").unwrap();
        page.set("title", title);
        ids.push(repo.save(&mut page).unwrap().unwrap());
    }
    ids.reverse();
    repo.set_indexes("Site::Page", "position", &ids).unwrap();

    let titles: Vec<_> = repo
        .all("Site::Page")
        .unwrap()
        .iter()
        .map(|p| p.get("title").clone())
        .collect();
    assert_eq!(
        titles,
        vec![Value::text("c"), Value::text("b"), Value::text("a")]
    );
}

#[test]
fn test_backends_from_config_file() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("populate.toml");
    fs::write(
        &config_path,
        format!(
            "[store]\ndata_dir = {:?}\n\n[attachment]\nroot = {:?}\nurl_prefix = \"/files\"\n",
            dir.path().join("db").display().to_string(),
            dir.path().join("public").display().to_string(),
        ),
    )
    .unwrap();

    let config = PopulateConfig::load_from(&config_path).unwrap();
    let store = FsBackend::from_config(&config.store).unwrap();
    assert_eq!(store.data_dir(), dir.path().join("db"));
    let files = LocalBackend::from_config(&config.attachment).unwrap();
    assert_eq!(files.root(), dir.path().join("public"));
}

#[test]
fn test_backends_need_configuration() {
    let config = PopulateConfig::default();
    assert!(matches!(
        FsBackend::from_config(&config.store),
        Err(PopulateError::MissingBackendConfig(_))
    ));
    assert!(matches!(
        LocalBackend::from_config(&config.attachment),
        Err(PopulateError::MissingBackendConfig(_))
    ));
}
