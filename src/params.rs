//! String-keyed configuration carried by the [`Context`](crate::context::Context).
//!
//! Aggregators, readers and writers read their settings from [`Parameters`] using
//! dotted keys (`grid.size`, `kmeans.centroids`, ...). Values are stored as text
//! and parsed on access, so a bad value is reported with the key that holds it.
//!
//! Parameters can be loaded from TOML. Nested tables flatten into dotted keys:
//!
//! ```
//! use aggrbeam::params::Parameters;
//!
//! let params = Parameters::from_toml_str(
//!     "input = \"rides.csv\"\n[kmeans]\ncentroids = 3\nmetric = \"manhattan\"\n",
//!     "inline",
//! )?;
//! assert_eq!(params.get("kmeans.centroids"), Some("3"));
//! assert_eq!(params.get_or("kmeans.centroids", 5usize)?, 3);
//! # Ok::<_, aggrbeam::AggrError>(())
//! ```

use crate::error::{AggrError, Result};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

pub const INPUT_PARAM: &str = "input";
pub const OUTPUT_PARAM: &str = "output";
pub const PROVENANCE_PARAM: &str = "provenance";
pub const DATASET_ID_PARAM: &str = "dataset.id";
pub const DATASET_TITLE_PARAM: &str = "dataset.title";
pub const PARTITIONS_PARAM: &str = "exec.partitions";
pub const THREADS_PARAM: &str = "exec.threads";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Parameters {
    values: BTreeMap<String, String>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parse TOML text; `location` only labels errors.
    pub fn from_toml_str(text: &str, location: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(text).map_err(|source| AggrError::Toml {
            location: location.to_string(),
            source,
        })?;
        let mut out = Self::new();
        flatten_into(&mut out.values, "", &toml::Value::Table(table));
        Ok(out)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| AggrError::io(path.display().to_string(), e))?;
        Self::from_toml_str(&text, &path.display().to_string())
    }

    /// Split a `key=value` override.
    pub fn parse_assignment(raw: &str) -> Result<(String, String)> {
        let (k, v) = raw
            .split_once('=')
            .ok_or_else(|| AggrError::config(raw, "expected key=value"))?;
        let k = k.trim();
        if k.is_empty() {
            return Err(AggrError::config(raw, "empty key"));
        }
        Ok((k.to_string(), v.trim().to_string()))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value.to_string());
        self
    }

    /// Overlay `other` on top of `self`; keys in `other` win.
    pub fn merge(&mut self, other: Parameters) {
        self.values.extend(other.values);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| AggrError::config(key, "required parameter is missing"))
    }

    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(key)
            .map(|raw| {
                raw.trim()
                    .parse::<T>()
                    .map_err(|e| AggrError::config(key, format!("cannot parse `{raw}`: {e}")))
            })
            .transpose()
    }

    pub fn get_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        Ok(self.get_parsed(key)?.unwrap_or(default))
    }

    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key).map(|v| v.trim().to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(AggrError::config(key, format!("`{v}` is not a boolean"))),
            },
        }
    }

    /// Comma-separated list; blank entries are dropped.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn flatten_into(out: &mut BTreeMap<String, String>, prefix: &str, value: &toml::Value) {
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        }
    };
    match value {
        toml::Value::Table(t) => {
            for (k, v) in t {
                flatten_into(out, &join(k), v);
            }
        }
        toml::Value::Array(items) => {
            let joined: Vec<String> = items.iter().map(scalar_text).collect();
            out.insert(prefix.to_string(), joined.join(","));
        }
        other => {
            out.insert(prefix.to_string(), scalar_text(other));
        }
    }
}

fn scalar_text(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
