//! JSON ファイルによる履歴の永続化
//!
//! # ファイル形式
//! - インデント付きの JSON 配列（1 要素 = 1 サイクル）
//! - 旧形式の単一オブジェクトは 1 件の履歴として読む
//! - 空ファイル・未作成は空の履歴
//!
//! # 書き込み
//! - 「全件読む → 追加 → 全件書く」をプロセス内 Mutex で直列化
//! - 一時ファイルに書いて sync してから rename（途中まで書かれたファイルを残さない）
//! - 壊れたファイルは上書き前に `<name>.corrupt-<timestamp>` へ退避

use std::ffi::OsString;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::{ActionTally, CycleRecord, FleetError};
use crate::ports::history_store::{last_n, stamp};
use crate::ports::{Clock, HistoryStore, SystemClock, TallyStore};

const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const INDENT: &[u8] = b"    ";

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// What a read of the file found.
struct Contents<T> {
    items: Vec<T>,
    malformed: bool,
}

/// A JSON array file appended one element at a time.
struct JsonArrayFile<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _items: PhantomData<fn() -> T>,
}

impl<T> JsonArrayFile<T>
where
    T: Serialize + DeserializeOwned,
{
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
            _items: PhantomData,
        }
    }

    async fn load(&self) -> Result<Vec<T>, FleetError> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.items)
    }

    async fn push(&self, item: T, now: DateTime<Utc>) -> Result<(), FleetError> {
        let _guard = self.lock.lock().await;
        let Contents {
            mut items,
            malformed,
        } = self.read().await?;
        if malformed {
            self.set_aside(now).await?;
        }
        items.push(item);
        self.write(&items).await
    }

    async fn read(&self) -> Result<Contents<T>, FleetError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Contents {
                    items: Vec::new(),
                    malformed: false,
                });
            }
            Err(e) => return Err(FleetError::io(&self.path, e)),
        };

        match parse_array(&bytes) {
            Ok(items) => Ok(Contents {
                items,
                malformed: false,
            }),
            Err(reason) => {
                let err = FleetError::MalformedHistory {
                    path: self.path.clone(),
                    reason,
                };
                warn!(%err, "treating as empty history");
                Ok(Contents {
                    items: Vec::new(),
                    malformed: true,
                })
            }
        }
    }

    async fn set_aside(&self, now: DateTime<Utc>) -> Result<(), FleetError> {
        let backup = with_suffix(
            &self.path,
            &format!("corrupt-{}", now.format(BACKUP_TIMESTAMP_FORMAT)),
        );
        tokio::fs::rename(&self.path, &backup)
            .await
            .map_err(|e| FleetError::io(&backup, e))?;
        warn!(from = %self.path.display(), to = %backup.display(), "malformed file moved aside");
        Ok(())
    }

    async fn write(&self, items: &[T]) -> Result<(), FleetError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FleetError::io(parent, e))?;
        }

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        items.serialize(&mut serializer)?;

        let tmp = with_suffix(&self.path, "tmp");
        write_synced(&tmp, &buf)
            .await
            .map_err(|e| FleetError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| FleetError::io(&self.path, e))?;
        debug!(path = %self.path.display(), entries = items.len(), "written");
        Ok(())
    }
}

/// Create (or truncate) `path`, write `buf` and flush it to disk.
async fn write_synced(path: &Path, buf: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(buf).await?;
    file.sync_all().await
}

fn parse_array<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>, String> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    match serde_json::from_slice::<OneOrMany<T>>(bytes) {
        Ok(OneOrMany::Many(items)) => Ok(items),
        Ok(OneOrMany::One(item)) => Ok(vec![item]),
        Err(e) => Err(e.to_string()),
    }
}

/// `dir/name.json` → `dir/name.json.<suffix>`
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("history"));
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// History persisted as a JSON array of cycle records.
pub struct JsonFileHistoryStore {
    file: JsonArrayFile<CycleRecord>,
    clock: Arc<dyn Clock>,
}

impl JsonFileHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    pub fn with_clock(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            file: JsonArrayFile::new(path.into()),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }
}

#[async_trait]
impl HistoryStore for JsonFileHistoryStore {
    async fn append(&self, record: CycleRecord) -> Result<CycleRecord, FleetError> {
        let stored = stamp(record, self.clock.as_ref());
        self.file.push(stored.clone(), self.clock.now()).await?;
        Ok(stored)
    }

    async fn recent(&self, n: usize) -> Result<Vec<CycleRecord>, FleetError> {
        Ok(last_n(&self.file.load().await?, n))
    }

    async fn all(&self) -> Result<Vec<CycleRecord>, FleetError> {
        self.file.load().await
    }
}

/// Action tallies persisted as a JSON array.
pub struct JsonFileTallyStore {
    file: JsonArrayFile<ActionTally>,
    clock: Arc<dyn Clock>,
}

impl JsonFileTallyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    pub fn with_clock(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            file: JsonArrayFile::new(path.into()),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }
}

#[async_trait]
impl TallyStore for JsonFileTallyStore {
    async fn append(&self, tally: ActionTally) -> Result<(), FleetError> {
        self.file.push(tally, self.clock.now()).await
    }

    async fn all(&self) -> Result<Vec<ActionTally>, FleetError> {
        self.file.load().await
    }
}
