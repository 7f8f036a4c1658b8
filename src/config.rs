//! Access to `config.json`, the single document describing the testbed and the experiment
//! constants.
//!
//! The document is loaded once. Values are handed out by key and deserialized into whatever type
//! the caller asks for; each caller validates the subset it uses. Relative paths are resolved
//! against the project root, i.e., the directory that contains `config.json`.

use std::path::{Path, PathBuf};

use failure::ResultExt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::paths::CONFIG_FILENAME;
use crate::HarnessError;

/// One physical machine of the testbed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    /// Position in `physical_machines`.
    #[serde(skip)]
    pub index: usize,

    #[serde(rename = "public_ipstr")]
    pub public_ip: String,

    #[serde(rename = "private_ipstr")]
    pub private_ip: String,
}

/// The layout of the testbed: which machine plays which role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topology {
    pub machines: Vec<Machine>,
    pub evaluator: usize,
    pub cloud: usize,
    pub edges: Vec<usize>,
    pub clients: Vec<usize>,
}

impl Topology {
    /// Returns the machine with the given index.
    pub fn machine(&self, idx: usize) -> Result<&Machine, failure::Error> {
        self.machines.get(idx).ok_or_else(|| {
            failure::format_err!(
                "machine index {} is out of range ({} physical machines configured)",
                idx,
                self.machines.len()
            )
        })
    }

    /// Returns true if every role is placed on the given machine.
    #[cfg(test)]
    pub fn all_on(&self, idx: usize) -> bool {
        self.evaluator == idx && self.cloud == idx && self.edges == [idx] && self.clients == [idx]
    }
}

/// The loaded configuration document.
#[derive(Clone, Debug)]
pub struct ConfigStore {
    file: PathBuf,
    root: PathBuf,
    doc: serde_json::Map<String, serde_json::Value>,
}

impl ConfigStore {
    /// Load the configuration. If `explicit` is given, that file is used. Otherwise, the current
    /// directory and its ancestors are searched for `config.json`.
    pub fn locate(explicit: Option<&Path>) -> Result<Self, failure::Error> {
        if let Some(file) = explicit {
            return Self::load(file);
        }

        let cwd = std::env::current_dir()?;
        for dir in cwd.ancestors() {
            let candidate = dir.join(CONFIG_FILENAME);
            if candidate.is_file() {
                return Self::load(&candidate);
            }
        }

        Err(failure::format_err!(
            "unable to find {} in {} or any of its ancestors",
            CONFIG_FILENAME,
            cwd.display()
        ))
    }

    /// Load the given configuration file. Its directory becomes the project root.
    pub fn load(file: &Path) -> Result<Self, failure::Error> {
        let text = std::fs::read_to_string(file)
            .with_context(|_| format!("reading {}", file.display()))?;
        let file = std::fs::canonicalize(file)?;
        let root = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));

        Self::parse(&file, &root, &text)
    }

    /// Parse a configuration document given as text.
    pub fn parse(file: &Path, root: &Path, text: &str) -> Result<Self, failure::Error> {
        let doc = match serde_json::from_str::<serde_json::Value>(text)
            .with_context(|_| format!("parsing {}", file.display()))?
        {
            serde_json::Value::Object(map) => map,
            _ => failure::bail!("{} must contain a JSON object", file.display()),
        };

        Ok(ConfigStore {
            file: file.to_path_buf(),
            root: root.to_path_buf(),
            doc,
        })
    }

    /// The project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the raw JSON value of a key.
    pub fn raw(&self, key: &str) -> Result<&serde_json::Value, failure::Error> {
        self.doc.get(key).ok_or_else(|| {
            HarnessError::ConfigMissing {
                key: key.to_owned(),
                file: self.file.display().to_string(),
            }
            .into()
        })
    }

    /// Returns the value of a key, deserialized into `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, failure::Error> {
        let value = self.raw(key)?.clone();
        Ok(serde_json::from_value(value)
            .with_context(|_| format!("invalid value for `{}` in {}", key, self.file.display()))?)
    }

    /// Returns the value of a key that is a path, resolved against the project root.
    pub fn get_path(&self, key: &str) -> Result<PathBuf, failure::Error> {
        let path: String = self.get(key)?;
        Ok(self.resolve(path))
    }

    /// Resolve a path against the project root. Absolute paths are returned unchanged.
    pub fn resolve<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Returns the testbed layout. All role indexes must refer to configured machines.
    pub fn topology(&self) -> Result<Topology, failure::Error> {
        let mut machines: Vec<Machine> = self.get("physical_machines")?;
        for (index, machine) in machines.iter_mut().enumerate() {
            machine.index = index;
        }

        let topology = Topology {
            evaluator: self.get("evaluator_machine_index")?,
            cloud: self.get("cloud_machine_index")?,
            edges: self.get("edge_machine_indexes")?,
            clients: self.get("client_machine_indexes")?,
            machines,
        };

        let roles = std::iter::once(("evaluator", topology.evaluator))
            .chain(std::iter::once(("cloud", topology.cloud)))
            .chain(topology.edges.iter().map(|&i| ("edge", i)))
            .chain(topology.clients.iter().map(|&i| ("client", i)));
        for (role, idx) in roles {
            if idx >= topology.machines.len() {
                failure::bail!(
                    "{} machine index {} is out of range ({} physical machines configured)",
                    role,
                    idx,
                    topology.machines.len()
                );
            }
        }

        Ok(topology)
    }
}
