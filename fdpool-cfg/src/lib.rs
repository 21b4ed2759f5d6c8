//! Runtime configuration for `fdpool`.
//!
//! Each tunable is declared once as a `static` [`Config`] next to the code that reads it, then
//! registered into a [`ConfigSet`]. A [`ConfigSet`] is cheap to clone and every clone observes
//! updates, so a background task can pick up a new eviction interval without being restarted.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use compact_str::CompactString;
use fdpool_ore::assert_none;

mod value;

pub use value::{ConfigDefault, ConfigValue, DynConfigValue, DynConfigValueShared, parse_duration};

/// A single configuration setting.
pub struct Config<V: ConfigDefault> {
    name: &'static str,
    desc: &'static str,
    value: V,
}

impl<V: ConfigDefault> Config<V> {
    /// Define a new [`Config`] with a default value.
    pub const fn new(name: &'static str, desc: &'static str, default: V) -> Self {
        Config {
            name,
            desc,
            value: default,
        }
    }

    /// Name this [`Config`] is registered under.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Read the value of this [`Config`] from the provided [`ConfigSet`].
    ///
    /// # Panics
    /// * If this [`Config`] was never registered with `set`.
    pub fn read(&self, set: &ConfigSet) -> V::StoredValue {
        let Some(entry) = set.configs.get(self.name) else {
            panic!("tried to read unregistered config {}", self.name);
        };
        V::from_dyn(&entry.value)
    }
}

/// A thread-safe shareable set of [`Config`]s.
#[derive(Clone, Debug)]
pub struct ConfigSet {
    configs: Arc<BTreeMap<CompactString, ConfigSetEntry>>,
}

impl ConfigSet {
    /// Returns a new [`ConfigSetBuilder`].
    pub fn builder() -> ConfigSetBuilder {
        ConfigSetBuilder::default()
    }

    /// Update [`Config`] in this [`ConfigSet`] with the specified value.
    ///
    /// # Panics
    /// * If [`Config`] was not previously registered with the original [`ConfigSetBuilder`].
    pub fn update<V: ConfigDefault>(&self, config: &'static Config<V>, value: V) {
        let entry = self
            .configs
            .get(config.name)
            .expect("tried to update unregisted config");
        entry.value.update(value.into_stored().into_dyn());
    }

    /// Update the [`Config`] in this [`ConfigSet`] with `name` to `value`.
    ///
    /// # Errors
    ///
    /// * If no config named `name` exists in this set.
    /// * If the config specified by `name` cannot parse `value`.
    ///
    pub fn try_update(&self, name: &str, value: &str) -> Result<(), anyhow::Error> {
        let entry = self
            .configs
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("no Config named '{name}' found"))?;
        entry
            .value
            .update_parse(value)
            .map_err(|err| err.context(format!("invalid value for '{name}'")))?;
        Ok(())
    }

    /// Apply a `name=value` assignment, as passed on a command line.
    pub fn try_assign(&self, assignment: &str) -> Result<(), anyhow::Error> {
        let Some((name, value)) = assignment.split_once('=') else {
            anyhow::bail!("expected 'name=value', found '{assignment}'");
        };
        self.try_update(name.trim(), value.trim())
    }

    /// Apply overrides from the process environment, see [`ConfigSet::load_vars`].
    pub fn load_env(&self, prefix: &str) -> Result<usize, anyhow::Error> {
        self.load_vars(prefix, std::env::vars())
    }

    /// Apply overrides from `vars` of the form `{PREFIX}_{NAME}`, where `NAME` is the upper-case
    /// name of a registered config. Variables with the prefix that don't name a registered config
    /// are ignored.
    ///
    /// Returns the number of configs that were updated.
    pub fn load_vars<I, K, V>(&self, prefix: &str, vars: I) -> Result<usize, anyhow::Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut updated = 0;
        for (key, value) in vars {
            let Some(name) = key
                .as_ref()
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('_'))
            else {
                continue;
            };
            let name = name.to_ascii_lowercase();
            if !self.configs.contains_key(name.as_str()) {
                continue;
            }
            self.try_update(&name, value.as_ref())?;
            updated += 1;
        }
        Ok(updated)
    }
}

impl fmt::Display for ConfigSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, entry) in &*self.configs {
            writeln!(f, "{} => {}\n\t└─ '{}'", name, entry.value, entry.desc)?;
        }
        Ok(())
    }
}

/// Single entry within a [`ConfigSet`].
#[derive(Clone, Debug)]
pub struct ConfigSetEntry {
    value: DynConfigValueShared,
    desc: &'static str,
}

/// A builder for a [`ConfigSet`].
#[derive(Default, Debug)]
pub struct ConfigSetBuilder {
    configs: BTreeMap<CompactString, (DynConfigValue, &'static str)>,
}

impl ConfigSetBuilder {
    /// Register a [`Config`] into this [`ConfigSetBuilder`] with the default value.
    ///
    /// # Panics
    /// * If a [`Config`] with the same name was already registered.
    pub fn register<V: ConfigDefault>(&mut self, config: &'static Config<V>) -> &mut Self {
        let value = config.value.into_stored().into_dyn();
        let prev = self
            .configs
            .insert(CompactString::const_new(config.name), (value, config.desc));
        assert_none!(prev, "config '{}' registered more than once", config.name);
        self
    }

    /// Consumes this [`ConfigSetBuilder`] construting a [`ConfigSet`].
    pub fn build(self) -> ConfigSet {
        let configs = self
            .configs
            .into_iter()
            .map(|(name, (value, desc))| {
                let entry = ConfigSetEntry {
                    value: value.into_shared(),
                    desc,
                };
                (name, entry)
            })
            .collect();
        ConfigSet {
            configs: Arc::new(configs),
        }
    }
}
