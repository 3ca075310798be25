use std::path::{Path, PathBuf};
use std::{env, fs, io};

use anyhow::{Context as _, Result};
use serde::de::DeserializeOwned;
use smallvec::SmallVec;
use toml::map::Entry;
use toml::{Table, Value};

/// Merges configuration layers into one TOML table and deserializes it.
#[must_use]
pub struct Builder {
    table: Result<Table>,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            table: Ok(Table::new()),
        }
    }

    /// Adds a layer on top of the ones added so far.
    pub fn add_layer<L: Layer>(mut self, layer: L) -> Self {
        self.table = self.table.and_then(|mut t| {
            layer.extend_table(&mut t)?;
            Ok(t)
        });
        self
    }

    /// Deserializes the merged layers.
    pub fn build<T>(self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let table = self.table?;
        T::deserialize(table).context("cannot deserialize config")
    }
}

/// A source of configuration values.
pub trait Layer {
    /// Merges this layer's values into `table`, replacing existing ones.
    fn extend_table(&self, table: &mut Table) -> Result<()>;
}

/// Loads a TOML file.
#[must_use]
pub struct File {
    path: PathBuf,
    required: bool,
}

impl File {
    /// Creates a layer for the file at `path`. It is required by default.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            required: true,
        }
    }

    /// Sets whether a missing file is an error or an empty layer.
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

/// Parses TOML text, usually the built-in defaults.
#[must_use]
pub struct TomlText<'a> {
    text: &'a str,
}

impl<'a> TomlText<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text }
    }
}

/// Loads environment variables that start with a prefix.
///
/// The prefix is removed and the rest of the name is lowercased. `__` (two
/// underscores) separates nested keys, so with the prefix `WIRE_PERF__`, the
/// variable `WIRE_PERF__PERF__SEED` sets `perf.seed`.
///
/// Values that parse as integers, floats or booleans are inserted as such.
/// Everything else is a string.
#[must_use]
pub struct Env<'a> {
    prefix: &'a str,
}

impl<'a> Env<'a> {
    pub fn new(prefix: &'a str) -> Self {
        Self { prefix }
    }
}

impl Layer for File {
    fn extend_table(&self, table: &mut Table) -> Result<()> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(why) if !self.required && why.kind() == io::ErrorKind::NotFound => {
                log::debug!("Optional config {:?} not found.", self.path);
                return Ok(());
            },
            Err(why) => {
                return Err(why).with_context(|| format!("cannot read config {:?}", self.path));
            },
        };

        let file = parse_table(&text).with_context(|| format!("invalid config {:?}", self.path))?;
        merge_tables(table, file);
        Ok(())
    }
}

impl Layer for TomlText<'_> {
    fn extend_table(&self, table: &mut Table) -> Result<()> {
        let text = parse_table(self.text).context("built-in config is invalid")?;
        merge_tables(table, text);
        Ok(())
    }
}

impl Layer for Env<'_> {
    fn extend_table(&self, table: &mut Table) -> Result<()> {
        for (key, value) in env::vars_os() {
            let Some(key) = key.to_str().and_then(|k| k.strip_prefix(self.prefix)) else {
                continue;
            };

            let value = value
                .into_string()
                .map_err(|v| anyhow::anyhow!("env var {}{key} is not UTF-8: {v:?}", self.prefix))?;

            let key = key.to_ascii_lowercase();
            let segments = key.split("__").collect::<SmallVec<[&str; 4]>>();
            if segments.iter().any(|s| s.is_empty()) {
                anyhow::bail!("env var {}{key} has an empty key segment", self.prefix);
            }

            insert_at(table, &segments, parse_scalar(value));
        }

        Ok(())
    }
}

fn parse_table(text: &str) -> Result<Table> {
    toml::from_str(text).context("config toml is invalid")
}

fn parse_scalar(value: String) -> Value {
    if let Ok(int) = value.parse::<i64>() {
        Value::Integer(int)
    } else if let Ok(float) = value.parse::<f64>() {
        Value::Float(float)
    } else if let Ok(bool) = value.parse::<bool>() {
        Value::Boolean(bool)
    } else {
        Value::String(value)
    }
}

fn merge_tables(target: &mut Table, consume: Table) {
    for (key, value) in consume {
        match target.entry(key) {
            Entry::Vacant(entry) => _ = entry.insert(value),
            Entry::Occupied(mut entry) => match (entry.get_mut(), value) {
                (Value::Table(a), Value::Table(b)) => merge_tables(a, b),
                (a, b) => *a = b,
            },
        }
    }
}

fn insert_at(table: &mut Table, path: &[&str], value: Value) {
    let [first, rest @ ..] = path else {
        return;
    };

    if rest.is_empty() {
        table.insert((*first).to_owned(), value);
        return;
    }

    let slot = table
        .entry((*first).to_owned())
        .or_insert_with(|| Value::Table(Table::new()));

    if !slot.is_table() {
        *slot = Value::Table(Table::new());
    }

    if let Value::Table(inner) = slot {
        insert_at(inner, rest, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_layers_win() {
        let base = "[perf]\nseed = 1\nleaves = 5\n";
        let over = "[perf]\nseed = 2\n";

        let table: Table = Builder::new()
            .add_layer(TomlText::new(base))
            .add_layer(TomlText::new(over))
            .build()
            .expect("valid toml");

        let perf = table["perf"].as_table().expect("perf table");
        assert_eq!(perf["seed"].as_integer(), Some(2), "overridden");
        assert_eq!(perf["leaves"].as_integer(), Some(5), "kept from base");
    }

    #[test]
    fn missing_optional_file() {
        let table: Table = Builder::new()
            .add_layer(File::new("definitely/not/here.toml").required(false))
            .build()
            .expect("optional file may be missing");

        assert!(table.is_empty(), "nothing loaded");
    }

    #[test]
    fn missing_required_file() {
        let res = Builder::new()
            .add_layer(File::new("definitely/not/here.toml"))
            .build::<Table>();

        assert!(res.is_err(), "required file must exist");
    }

    #[test]
    fn nested_insert() {
        let mut table = parse_table("[perf]\nseed = 1\noutput = \"a.bin\"\n").expect("valid toml");
        insert_at(&mut table, &["perf", "seed"], parse_scalar("7".to_owned()));
        insert_at(&mut table, &["log", "root", "level"], parse_scalar("debug".to_owned()));

        let perf = table["perf"].as_table().expect("perf table");
        assert_eq!(perf["seed"].as_integer(), Some(7), "replaced with an integer");
        assert_eq!(perf["output"].as_str(), Some("a.bin"), "sibling kept");
        assert_eq!(
            table["log"]["root"]["level"].as_str(),
            Some("debug"),
            "intermediate tables created"
        );
    }

    #[test]
    fn scalar_types() {
        assert_eq!(parse_scalar("-3".to_owned()), Value::Integer(-3), "integer");
        assert_eq!(parse_scalar("0.5".to_owned()), Value::Float(0.5), "float");
        assert_eq!(parse_scalar("true".to_owned()), Value::Boolean(true), "bool");
        assert_eq!(
            parse_scalar("out.bin".to_owned()),
            Value::String("out.bin".to_owned()),
            "string"
        );
    }
}
