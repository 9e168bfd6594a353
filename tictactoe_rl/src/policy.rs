use crate::error::{Error, Result};
use crate::state_key::{StateKey, KEY_FORMAT_VERSION};
use chrono::offset::Local;
use itertools::Itertools;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Value of a state the store has never seen.
pub const DEFAULT_VALUE: f64 = 0.0;

/// Read access to state values, the only thing move selection needs.
pub trait StateValues {
    fn value(&self, key: &StateKey) -> f64;
}

/// Estimated value of each board a player has moved into.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PolicyStore {
    values: HashMap<StateKey, f64>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PolicyFormat {
    /// Python pickle of a plain `dict[str, float]`.
    Pickle,
    /// `{"key_format": 1, "states": {...}}`
    Json,
}

#[derive(Serialize, Deserialize)]
struct PolicyFile<M> {
    key_format: u32,
    states: M,
}

impl PolicyFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => PolicyFormat::Json,
            _ => PolicyFormat::Pickle,
        }
    }
}

impl StateValues for PolicyStore {
    fn value(&self, key: &StateKey) -> f64 {
        self.get(key)
    }
}

impl FromIterator<(StateKey, f64)> for PolicyStore {
    fn from_iter<I: IntoIterator<Item = (StateKey, f64)>>(iter: I) -> Self {
        PolicyStore {
            values: iter.into_iter().collect(),
        }
    }
}

impl PolicyStore {
    pub fn new() -> Self {
        PolicyStore {
            values: HashMap::with_capacity(6_000),
        }
    }

    pub fn get(&self, key: &StateKey) -> f64 {
        self.values.get(key).copied().unwrap_or(DEFAULT_VALUE)
    }

    pub fn set(&mut self, key: StateKey, value: f64) {
        self.values.insert(key, value);
    }

    pub fn contains(&self, key: &StateKey) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StateKey, f64)> {
        self.values.iter().map(|(key, &value)| (key, value))
    }

    /// The `n` highest-valued states, best first; equal values ordered by key.
    pub fn top(&self, n: usize) -> Vec<(&StateKey, f64)> {
        self.iter()
            .sorted_by(|(key1, value1), (key2, value2)| {
                value2.total_cmp(value1).then_with(|| key1.cmp(key2))
            })
            .take(n)
            .collect()
    }

    fn sorted(&self) -> BTreeMap<&str, f64> {
        self.values
            .iter()
            .map(|(key, &value)| (key.as_str(), value))
            .collect()
    }

    /// Writes the whole store to `path`, or nothing at all.
    ///
    /// The data goes to a temporary file next to `path` which then replaces
    /// it, so a failed save never leaves a truncated policy behind. Values
    /// must be finite: JSON has no encoding for NaN or infinity.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some((key, value)) = self.iter().find(|(_, value)| !value.is_finite()) {
            return Err(Error::invalid_state(format!(
                "cannot save {}: state {key} has value {value}",
                path.display()
            )));
        }
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir).map_err(|source| Error::Io {
            operation: format!("create a temporary file in {}", dir.display()),
            source,
        })?;
        let format = PolicyFormat::from_path(path);
        {
            let mut writer = BufWriter::new(&mut file);
            let encoded = match format {
                PolicyFormat::Pickle => serde_pickle::to_writer(
                    &mut writer,
                    &self.sorted(),
                    serde_pickle::SerOptions::new(),
                )
                .map_err(|e| io::Error::other(e.to_string())),
                PolicyFormat::Json => {
                    let contents = PolicyFile {
                        key_format: KEY_FORMAT_VERSION,
                        states: self.sorted(),
                    };
                    serde_json::to_writer_pretty(&mut writer, &contents)
                        .map_err(|e| io::Error::other(e.to_string()))
                }
            };
            encoded
                .and_then(|()| writer.flush())
                .map_err(|source| Error::Io {
                    operation: format!("write policy for {}", path.display()),
                    source,
                })?;
        }
        file.as_file().sync_all().map_err(|source| Error::Io {
            operation: format!("sync policy for {}", path.display()),
            source,
        })?;
        file.persist(path).map_err(|e| Error::Io {
            operation: format!("replace {}", path.display()),
            source: e.error,
        })?;
        debug!(
            "saved {} state values to {} ({:?})",
            self.len(),
            path.display(),
            format
        );
        Ok(())
    }

    /// Reads a store written by `save`, or a pickled Python `dict[str, float]`.
    ///
    /// A missing file is `NotFound`; anything that cannot be decoded into
    /// canonical keys and values is `CorruptData`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound {
                path: path.to_path_buf(),
            },
            _ => Error::corrupt(path, e),
        })?;
        let reader = BufReader::new(file);
        let raw: HashMap<String, f64> = match PolicyFormat::from_path(path) {
            PolicyFormat::Pickle => {
                serde_pickle::from_reader(reader, serde_pickle::DeOptions::new())
                    .map_err(|e| Error::corrupt(path, e))?
            }
            PolicyFormat::Json => {
                let contents: PolicyFile<HashMap<String, f64>> =
                    serde_json::from_reader(reader).map_err(|e| Error::corrupt(path, e))?;
                if contents.key_format != KEY_FORMAT_VERSION {
                    return Err(Error::corrupt(
                        path,
                        format!(
                            "key format {} is not supported, expected {KEY_FORMAT_VERSION}",
                            contents.key_format
                        ),
                    ));
                }
                contents.states
            }
        };
        let values = raw
            .into_iter()
            .map(|(key, value)| {
                StateKey::parse(&key)
                    .map(|key| (key, value))
                    .map_err(|e| Error::corrupt(path, e))
            })
            .collect::<Result<HashMap<_, _>>>()?;
        info!("loaded {} state values from {}", values.len(), path.display());
        Ok(PolicyStore { values })
    }

    /// Loader for training: a store that cannot be read means starting fresh.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(store) => store,
            Err(e) => {
                warn!("{e}; starting from an empty policy");
                Self::new()
            }
        }
    }

    /// Dated file name for keeping old policies around, e.g.
    /// `policy-p1-2024-10-19.pickle`.
    pub fn archive_path(dir: impl AsRef<Path>, name: &str) -> PathBuf {
        let today = Local::now().date_naive();
        dir.as_ref().join(format!("policy-{name}-{today}.pickle"))
    }
}
