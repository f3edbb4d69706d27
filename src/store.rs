//! Persistence of trace artifacts, keyed by trace id.
//!
//! Three artifacts per trace: the raw SCP text, its parse tree as JSON and
//! the spot construction as JSON. Writes replace the whole file.

use crate::construction::SpotDocument;
use crate::parser::{parse, ParsedNode};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error for trace {trace_id}: {source}")]
    Json {
        trace_id: String,
        source: serde_json::Error,
    },

    #[error("trace has no `id` field")]
    MissingTraceId,

    #[error("trace id {0:?} cannot be used as a file name")]
    InvalidTraceId(String),
}

/// Storage collaborator for trace artifacts.
///
/// `load_*` returns `Ok(None)` when nothing is stored under the id.
pub trait ArtifactStore: Send + Sync {
    fn save_raw(&self, trace_id: &str, text: &str) -> Result<(), StoreError>;
    fn load_raw(&self, trace_id: &str) -> Result<Option<String>, StoreError>;

    fn save_parsed(&self, trace_id: &str, node: &ParsedNode) -> Result<(), StoreError>;
    fn load_parsed(&self, trace_id: &str) -> Result<Option<ParsedNode>, StoreError>;

    fn save_construction(&self, trace_id: &str, doc: &SpotDocument) -> Result<(), StoreError>;
    fn load_construction(&self, trace_id: &str) -> Result<Option<SpotDocument>, StoreError>;
}

/// Result of [`import_trace`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub trace_id: String,
    /// A raw trace with this id was already stored and has been reused.
    pub duplicate: bool,
    pub parsed: ParsedNode,
}

/// Parse `text`, then store its raw and parsed forms under the trace id.
///
/// If a raw trace with the same id already exists nothing is written and the
/// stored artifact is returned instead.
pub fn import_trace(store: &dyn ArtifactStore, text: &str) -> Result<ImportOutcome, StoreError> {
    let text = text.trim();
    let parsed = parse(text);
    let trace_id = parsed
        .get("id")
        .and_then(ParsedNode::as_text)
        .filter(|id| !id.is_empty())
        .ok_or(StoreError::MissingTraceId)?;

    if let Some(existing) = store.load_raw(&trace_id)? {
        log::info!("trace {} already imported, reusing stored artifact", trace_id);
        let parsed = match store.load_parsed(&trace_id)? {
            Some(node) => node,
            None => parse(&existing),
        };
        return Ok(ImportOutcome {
            trace_id,
            duplicate: true,
            parsed,
        });
    }

    store.save_raw(&trace_id, text)?;
    store.save_parsed(&trace_id, &parsed)?;
    log::info!("imported trace {}", trace_id);
    Ok(ImportOutcome {
        trace_id,
        duplicate: false,
        parsed,
    })
}

fn check_id(trace_id: &str) -> Result<(), StoreError> {
    let bad = trace_id.is_empty()
        || trace_id == "."
        || trace_id == ".."
        || trace_id.contains(['/', '\\', '\0']);
    if bad {
        Err(StoreError::InvalidTraceId(trace_id.to_string()))
    } else {
        Ok(())
    }
}

/// Filesystem store under a root directory:
/// `history/raw/<id>.txt`, `history/parsed/<id>.json`,
/// `spot_construction/<id>.json`.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_path(&self, trace_id: &str) -> PathBuf {
        self.root.join("history").join("raw").join(format!("{trace_id}.txt"))
    }

    pub fn parsed_path(&self, trace_id: &str) -> PathBuf {
        self.root.join("history").join("parsed").join(format!("{trace_id}.json"))
    }

    pub fn construction_path(&self, trace_id: &str) -> PathBuf {
        self.root.join("spot_construction").join(format!("{trace_id}.json"))
    }

    fn write(&self, path: &Path, content: &str) -> Result<(), StoreError> {
        let io = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        std::fs::write(path, content).map_err(io)?;
        log::debug!("wrote {}", path.display());
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn write_json<T: serde::Serialize>(&self, trace_id: &str, path: &Path, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Json {
            trace_id: trace_id.to_string(),
            source,
        })?;
        self.write(path, &json)
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, trace_id: &str, path: &Path) -> Result<Option<T>, StoreError> {
        self.read(path)?
            .map(|content| {
                serde_json::from_str(&content).map_err(|source| StoreError::Json {
                    trace_id: trace_id.to_string(),
                    source,
                })
            })
            .transpose()
    }
}

impl ArtifactStore for FsArtifactStore {
    fn save_raw(&self, trace_id: &str, text: &str) -> Result<(), StoreError> {
        check_id(trace_id)?;
        self.write(&self.raw_path(trace_id), text)
    }

    fn load_raw(&self, trace_id: &str) -> Result<Option<String>, StoreError> {
        check_id(trace_id)?;
        self.read(&self.raw_path(trace_id))
    }

    fn save_parsed(&self, trace_id: &str, node: &ParsedNode) -> Result<(), StoreError> {
        check_id(trace_id)?;
        self.write_json(trace_id, &self.parsed_path(trace_id), node)
    }

    fn load_parsed(&self, trace_id: &str) -> Result<Option<ParsedNode>, StoreError> {
        check_id(trace_id)?;
        self.read_json(trace_id, &self.parsed_path(trace_id))
    }

    fn save_construction(&self, trace_id: &str, doc: &SpotDocument) -> Result<(), StoreError> {
        check_id(trace_id)?;
        self.write_json(trace_id, &self.construction_path(trace_id), doc)
    }

    fn load_construction(&self, trace_id: &str) -> Result<Option<SpotDocument>, StoreError> {
        check_id(trace_id)?;
        self.read_json(trace_id, &self.construction_path(trace_id))
    }
}

/// In-memory store, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    raw: RwLock<HashMap<String, String>>,
    parsed: RwLock<HashMap<String, ParsedNode>>,
    constructions: RwLock<HashMap<String, SpotDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn put<T>(map: &RwLock<HashMap<String, T>>, key: &str, value: T) {
    let mut guard = map.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.insert(key.to_string(), value);
}

fn get<T: Clone>(map: &RwLock<HashMap<String, T>>, key: &str) -> Option<T> {
    let guard = map.read().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.get(key).cloned()
}

impl ArtifactStore for MemoryStore {
    fn save_raw(&self, trace_id: &str, text: &str) -> Result<(), StoreError> {
        put(&self.raw, trace_id, text.to_string());
        Ok(())
    }

    fn load_raw(&self, trace_id: &str) -> Result<Option<String>, StoreError> {
        Ok(get(&self.raw, trace_id))
    }

    fn save_parsed(&self, trace_id: &str, node: &ParsedNode) -> Result<(), StoreError> {
        put(&self.parsed, trace_id, node.clone());
        Ok(())
    }

    fn load_parsed(&self, trace_id: &str) -> Result<Option<ParsedNode>, StoreError> {
        Ok(get(&self.parsed, trace_id))
    }

    fn save_construction(&self, trace_id: &str, doc: &SpotDocument) -> Result<(), StoreError> {
        put(&self.constructions, trace_id, doc.clone());
        Ok(())
    }

    fn load_construction(&self, trace_id: &str) -> Result<Option<SpotDocument>, StoreError> {
        Ok(get(&self.constructions, trace_id))
    }
}
