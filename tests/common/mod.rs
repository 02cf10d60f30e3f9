#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use roster_import::core::credential::CredentialHasher;
use roster_import::core::etl::{Collaborators, ImportEngine, ImportOptions};
use roster_import::core::{Archiver, Notifier, RosterStore, Storage};
use roster_import::domain::model::{ArchiveRequest, Notification};
use roster_import::utils::error::{ImportError, Result};
use roster_import::SqliteStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const FEED_PATH: &str = "import.xml";

#[derive(Clone, Default)]
pub struct MockStorage {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MockStorage {
    pub fn with_feed(xml: &str) -> Self {
        let mut files = HashMap::new();
        files.insert(FEED_PATH.to_string(), xml.as_bytes().to_vec());
        Self {
            files: Arc::new(Mutex::new(files)),
        }
    }

    pub async fn set_feed(&self, xml: &str) {
        let mut files = self.files.lock().await;
        files.insert(FEED_PATH.to_string(), xml.as_bytes().to_vec());
    }
}

fn not_found(path: &str) -> ImportError {
    ImportError::IoError(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("File not found: {}", path),
    ))
}

impl Storage for MockStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let files = self.files.lock().await;
        files.get(path).cloned().ok_or_else(|| not_found(path))
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let mut files = self.files.lock().await;
        files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut files = self.files.lock().await;
        let data = files.remove(from).ok_or_else(|| not_found(from))?;
        files.insert(to.to_string(), data);
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        let mut files = self.files.lock().await;
        files.remove(path).map(|_| ()).ok_or_else(|| not_found(path))
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<Notification>>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        self.sent.lock().await.push(notification.clone());
        if self.fail {
            return Err(ImportError::NotificationError {
                message: "mail server unreachable".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct RecordingArchiver {
    pub requests: Arc<Mutex<Vec<ArchiveRequest>>>,
}

impl RecordingArchiver {
    pub async fn requests(&self) -> Vec<ArchiveRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl Archiver for RecordingArchiver {
    async fn archive(&self, request: &ArchiveRequest) -> Result<String> {
        self.requests.lock().await.push(request.clone());
        Ok(format!("archive/{}.xml", request.archive_name))
    }
}

/// One `<student>` entry of a test feed.
#[derive(Debug, Clone)]
pub struct FeedRow {
    pub id: String,
    pub name: String,
    pub vorname: String,
    pub matrikelnummer: String,
    pub buergerort: String,
    pub geburtstag: String,
    pub studiengang: String,
    pub benutzer: String,
    pub passwort: String,
}

impl FeedRow {
    pub fn new(id: &str, studiengang: &str) -> Self {
        Self {
            id: id.to_string(),
            name: "Muster".to_string(),
            vorname: "Anna".to_string(),
            matrikelnummer: format!("20-000-{}", id),
            buergerort: "Bern".to_string(),
            geburtstag: "01.02.2000".to_string(),
            studiengang: studiengang.to_string(),
            benutzer: format!("user{}", id),
            passwort: "geheim".to_string(),
        }
    }
}

pub fn feed_xml(rows: &[FeedRow]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<students>\n");
    for row in rows {
        xml.push_str(&format!(
            "  <student>\n    <ID>{}</ID>\n    <name>{}</name>\n    <vorname>{}</vorname>\n    \
             <matrikelnummer>{}</matrikelnummer>\n    <buergerort>{}</buergerort>\n    \
             <geburtstag>{}</geburtstag>\n    <studiengang>{}</studiengang>\n    \
             <benutzer>{}</benutzer>\n    <passwort>{}</passwort>\n  </student>\n",
            row.id,
            row.name,
            row.vorname,
            row.matrikelnummer,
            row.buergerort,
            row.geburtstag,
            row.studiengang,
            row.benutzer,
            row.passwort
        ));
    }
    xml.push_str("</students>\n");
    xml
}

pub fn run_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 16)
        .unwrap()
        .and_hms_opt(2, 0, 0)
        .unwrap()
}

/// Reference data: Informatik with three active modules, Pflege with two.
pub struct Catalog {
    pub informatik: i64,
    pub pflege: i64,
    pub informatik_modules: Vec<i64>,
    pub pflege_modules: Vec<i64>,
}

pub fn seed_catalog(store: &SqliteStore) -> Catalog {
    let informatik = store.insert_program("Informatik", true).unwrap();
    let pflege = store.insert_program("Pflege", true).unwrap();
    store.insert_program("Archiviert", false).unwrap();

    let programmieren = store.insert_module(informatik, "Programmieren", 10, true).unwrap();
    let datenbanken = store.insert_module(informatik, "Datenbanken", 30, true).unwrap();
    let netzwerke = store.insert_module(informatik, "Netzwerke", 20, true).unwrap();
    store.insert_module(informatik, "Lochkarten", 5, false).unwrap();

    let anatomie = store.insert_module(pflege, "Anatomie", 1, true).unwrap();
    let ethik = store.insert_module(pflege, "Ethik", 2, true).unwrap();

    Catalog {
        informatik,
        pflege,
        informatik_modules: vec![programmieren, netzwerke, datenbanken],
        pflege_modules: vec![anatomie, ethik],
    }
}

pub fn fast_hasher() -> CredentialHasher {
    CredentialHasher::with_params(1024, 1, 1).unwrap()
}

pub struct Harness {
    pub storage: MockStorage,
    pub store: Arc<SqliteStore>,
    pub notifier: RecordingNotifier,
    pub archiver: RecordingArchiver,
    pub catalog: Catalog,
}

impl Harness {
    pub fn new(xml: &str) -> Self {
        let store = SqliteStore::open_in_memory().unwrap();
        let catalog = seed_catalog(&store);
        Self {
            storage: MockStorage::with_feed(xml),
            store: Arc::new(store),
            notifier: RecordingNotifier::default(),
            archiver: RecordingArchiver::default(),
            catalog,
        }
    }

    pub fn options(&self) -> ImportOptions {
        ImportOptions {
            feed_path: FEED_PATH.to_string(),
            ..ImportOptions::default()
        }
    }

    pub fn engine(&self, options: ImportOptions) -> ImportEngine<MockStorage, SqliteStore> {
        self.engine_with_store(self.store.clone(), options)
    }

    pub fn engine_with_store<R: RosterStore>(
        &self,
        store: Arc<R>,
        options: ImportOptions,
    ) -> ImportEngine<MockStorage, R> {
        let collaborators = Collaborators {
            run_log: self.store.clone(),
            notifier: Arc::new(self.notifier.clone()),
            archiver: Some(Arc::new(self.archiver.clone())),
        };
        ImportEngine::new(self.storage.clone(), store, collaborators, options)
            .unwrap()
            .with_hasher(fast_hasher())
    }
}
