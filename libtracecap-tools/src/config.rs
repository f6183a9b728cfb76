use crate::error::Error;
use serde::de::DeserializeOwned;
use std::io;

/// Layered configuration, loaded from a TOML document
///
/// Values are looked up by dotted path (`capture.snaplen`). Command-line
/// tools load a file first, then override single entries with [`Config::set`].
#[derive(Clone, Debug)]
pub struct Config {
    value: toml::Value,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            value: toml::Value::Table(toml::map::Map::new()),
        }
    }
}

impl Config {
    fn lookup<T: AsRef<str>>(&self, k: T) -> Option<&toml::Value> {
        let mut item = &self.value;
        for key in k.as_ref().split('.') {
            item = item.get(key)?;
        }
        Some(item)
    }

    /// Get an entry by path. If the input argument contains dots, the path is split
    /// into keys, each key being requested recursively.
    pub fn get<T: AsRef<str>>(&self, k: T) -> Option<&str> {
        self.lookup(k)?.as_str()
    }

    /// Get an entry of type integer by path
    pub fn get_usize<T: AsRef<str>>(&self, k: T) -> Option<usize> {
        self.lookup(k)?
            .as_integer()
            .and_then(|i| if i >= 0 { Some(i as usize) } else { None })
    }

    /// Get a signed integer entry by path
    pub fn get_i64<T: AsRef<str>>(&self, k: T) -> Option<i64> {
        self.lookup(k)?.as_integer()
    }

    /// Get an entry of type boolean by path
    pub fn get_bool<T: AsRef<str>>(&self, k: T) -> Option<bool> {
        self.lookup(k)?.as_bool()
    }

    /// Get an array of strings by path. Non-string items are ignored.
    pub fn get_str_array<T: AsRef<str>>(&self, k: T) -> Option<Vec<String>> {
        let array = self.lookup(k)?.as_array()?;
        Some(
            array
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect(),
        )
    }

    /// Deserialize the table (or value) found at `k`
    ///
    /// Returns `Ok(None)` if the entry is absent, and a configuration error if
    /// it does not have the expected shape.
    pub fn get_table<T, K>(&self, k: K) -> Result<Option<T>, Error>
    where
        T: DeserializeOwned,
        K: AsRef<str>,
    {
        match self.lookup(k.as_ref()) {
            None => Ok(None),
            Some(v) => v
                .clone()
                .try_into()
                .map(Some)
                .map_err(|e| Error::Config(format!("{}: {}", k.as_ref(), e))),
        }
    }

    /// Set an entry, creating intermediate tables when needed
    ///
    /// Returns `false` if an intermediate key exists and is not a table.
    pub fn set<T, V>(&mut self, k: T, v: V) -> bool
    where
        T: AsRef<str>,
        V: Into<toml::Value>,
    {
        let mut item = &mut self.value;
        let mut keys = k.as_ref().split('.').peekable();
        while let Some(key) = keys.next() {
            let table = match item.as_table_mut() {
                Some(table) => table,
                None => return false,
            };
            if keys.peek().is_none() {
                table.insert(key.to_owned(), v.into());
                return true;
            }
            item = table
                .entry(key.to_owned())
                .or_insert(toml::Value::Table(toml::map::Map::new()));
        }
        false
    }

    /// Load configuration from input object. If keys are already present, they are overwritten
    pub fn load_config<R: io::Read>(&mut self, mut config: R) -> Result<(), io::Error> {
        let mut s = String::new();
        config.read_to_string(&mut s)?;
        match toml::from_str::<toml::Table>(&s) {
            Ok(table) => {
                self.value = toml::Value::Table(table);
                Ok(())
            }
            Err(e) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Load configuration failed: {e}"),
            )),
        }
    }
}
