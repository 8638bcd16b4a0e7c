//! Static configuration of an easy service
//!
//! The static config is a YAML document rooted at `components_manager`.
//! Every component (the HTTP server, logging, each route handler, each
//! dependency) owns one section under `components_manager.components`.
//!
//! Values inside a section are resolved in this order:
//! 1. `key: $name` looks `name` up in the config variables
//! 2. `key#env: VAR` reads environment variable `VAR`
//! 3. `key#fallback: value` is used when nothing above resolved
//!
//! A plain `key: value` always wins.

use crate::{Error, Result};
use serde_yaml::{Mapping, Value};
use std::path::Path;
use tracing::debug;

/// Root key of the static config document
pub const COMPONENTS_MANAGER: &str = "components_manager";
/// Key holding the per-component sections
pub const COMPONENTS: &str = "components";

/// Default HTTP listener port
pub const DEFAULT_PORT: u16 = 8080;
/// Default log level written into the base config
pub const DEFAULT_LOG_LEVEL: &str = "debug";

/// Static config document plus the variables used to resolve it
#[derive(Debug, Clone)]
pub struct StaticConfig {
    doc: Value,
    vars: ConfigVars,
}

impl StaticConfig {
    /// Base config: HTTP listener and default logger, no handlers
    pub fn base() -> Self {
        let mut doc = Value::Mapping(Mapping::new());
        set_path(
            &mut doc,
            &[COMPONENTS_MANAGER, COMPONENTS, "server", "listener", "port"],
            Value::from(DEFAULT_PORT),
        );
        set_path(
            &mut doc,
            &[COMPONENTS_MANAGER, COMPONENTS, "logging", "loggers", "default", "file_path"],
            Value::from("@stderr"),
        );
        set_path(
            &mut doc,
            &[COMPONENTS_MANAGER, COMPONENTS, "logging", "loggers", "default", "level"],
            Value::from(DEFAULT_LOG_LEVEL),
        );
        Self {
            doc,
            vars: ConfigVars::default(),
        }
    }

    /// Parse a complete config document
    pub fn from_yaml(text: &str) -> Result<Self> {
        let doc: Value = serde_yaml::from_str(text)?;
        if get_path(&doc, &[COMPONENTS_MANAGER, COMPONENTS]).is_none() {
            return Err(Error::Config(format!(
                "missing '{}.{}' section",
                COMPONENTS_MANAGER, COMPONENTS
            )));
        }
        Ok(Self {
            doc,
            vars: ConfigVars::default(),
        })
    }

    /// Load a config document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        debug!("Loaded static config from {}", path.display());
        Self::from_yaml(&text)
    }

    /// Serialize the document (variables are not included)
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.doc)?)
    }

    /// Attach config variables used for `$name` substitution
    pub fn with_vars(mut self, vars: ConfigVars) -> Self {
        self.vars = vars;
        self
    }

    pub fn vars(&self) -> &ConfigVars {
        &self.vars
    }

    pub fn document(&self) -> &Value {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut Value {
        &mut self.doc
    }

    /// Deep-merge a YAML fragment of component sections
    ///
    /// The fragment is a mapping `component name -> section`, the same shape
    /// as `components_manager.components`.
    pub fn merge_components(&mut self, fragment: &str) -> Result<()> {
        let overlay: Value = serde_yaml::from_str(fragment)?;
        if !overlay.is_mapping() {
            return Err(Error::Config(
                "components fragment must be a mapping of component sections".to_string(),
            ));
        }
        let components = components_mut(&mut self.doc);
        merge_values(components, overlay);
        Ok(())
    }

    /// Add a component section only when the component is not configured yet
    pub fn try_add_component(&mut self, name: &str, section: &str) -> Result<bool> {
        if self.has_component(name) {
            return Ok(false);
        }
        let section: Value = if section.trim().is_empty() {
            Value::Mapping(Mapping::new())
        } else {
            serde_yaml::from_str(section)?
        };
        self.set_component(name, section);
        Ok(true)
    }

    pub fn has_component(&self, name: &str) -> bool {
        get_path(&self.doc, &[COMPONENTS_MANAGER, COMPONENTS, name]).is_some()
    }

    pub fn set_component(&mut self, name: &str, section: Value) {
        if let Some(components) = components_mut(&mut self.doc).as_mapping_mut() {
            components.insert(Value::from(name), section);
        }
    }

    /// Names of all configured components in document order
    pub fn component_names(&self) -> Vec<String> {
        get_path(&self.doc, &[COMPONENTS_MANAGER, COMPONENTS])
            .and_then(Value::as_mapping)
            .map(|m| m.keys().filter_map(|k| k.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    /// Section of one component; a missing component yields an empty section
    pub fn component(&self, name: &str) -> ComponentConfig {
        let section = get_path(&self.doc, &[COMPONENTS_MANAGER, COMPONENTS, name])
            .cloned()
            .unwrap_or_else(|| Value::Mapping(Mapping::new()));
        ComponentConfig {
            name: name.to_string(),
            section,
            vars: self.vars.clone(),
        }
    }

    /// HTTP listener port (`server.listener.port`)
    pub fn listener_port(&self) -> Result<u16> {
        self.component("server").child("listener").get_u16_or("port", DEFAULT_PORT)
    }

    /// Default logger level (`logging.loggers.default.level`)
    pub fn log_level(&self) -> Result<String> {
        self.component("logging")
            .child("loggers")
            .child("default")
            .get_str_or("level", DEFAULT_LOG_LEVEL)
    }
}

fn components_mut(doc: &mut Value) -> &mut Value {
    let path = [COMPONENTS_MANAGER, COMPONENTS];
    if get_path(doc, &path).map_or(true, |v| !v.is_mapping()) {
        set_path(doc, &path, Value::Mapping(Mapping::new()));
    }
    let mut node = doc;
    for key in path {
        node = &mut node[key];
    }
    node
}

/// Config variables for `$name` substitution
#[derive(Debug, Clone, Default)]
pub struct ConfigVars {
    vars: Mapping,
}

impl ConfigVars {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(text)?;
        match value {
            Value::Mapping(vars) => Ok(Self { vars }),
            Value::Null => Ok(Self::default()),
            _ => Err(Error::Config("config_vars must be a mapping".to_string())),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.vars)?)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.vars.insert(Value::from(name), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// One component section with value resolution
#[derive(Debug, Clone)]
pub struct ComponentConfig {
    name: String,
    section: Value,
    vars: ConfigVars,
}

impl ComponentConfig {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn section(&self) -> &Value {
        &self.section
    }

    /// Nested section, resolved with the same variables
    pub fn child(&self, key: &str) -> ComponentConfig {
        let section = self
            .resolve(key)
            .ok()
            .flatten()
            .unwrap_or_else(|| Value::Mapping(Mapping::new()));
        ComponentConfig {
            name: format!("{}.{}", self.name, key),
            section,
            vars: self.vars.clone(),
        }
    }

    /// Resolve `key` through direct value, `$var`, `#env` and `#fallback`
    pub fn resolve(&self, key: &str) -> Result<Option<Value>> {
        if let Some(direct) = self.section.get(key) {
            match direct.as_str().and_then(|s| s.strip_prefix('$')) {
                Some(var) => {
                    if let Some(value) = self.vars.get(var) {
                        return Ok(Some(value.clone()));
                    }
                    debug!("{}: config var '{}' is not set", self.name, var);
                }
                None if !direct.is_null() => return Ok(Some(direct.clone())),
                None => {}
            }
        }

        if let Some(env_name) = self.section.get(format!("{}#env", key).as_str()) {
            let env_name = env_name.as_str().ok_or_else(|| {
                Error::Config(format!("{}: '{}#env' must name a variable", self.name, key))
            })?;
            if let Ok(raw) = std::env::var(env_name) {
                let value = serde_yaml::from_str(&raw).unwrap_or(Value::String(raw));
                return Ok(Some(value));
            }
        }

        Ok(self.section.get(format!("{}#fallback", key).as_str()).cloned())
    }

    fn require(&self, key: &str) -> Result<Value> {
        self.resolve(key)?
            .ok_or_else(|| Error::Config(format!("{}: missing required key '{}'", self.name, key)))
    }

    pub fn get_str(&self, key: &str) -> Result<String> {
        let value = self.require(key)?;
        scalar_to_string(&value).ok_or_else(|| self.type_error(key, "a string"))
    }

    pub fn get_str_or(&self, key: &str, default: &str) -> Result<String> {
        match self.resolve(key)? {
            Some(value) => scalar_to_string(&value).ok_or_else(|| self.type_error(key, "a string")),
            None => Ok(default.to_string()),
        }
    }

    pub fn get_i64(&self, key: &str) -> Result<i64> {
        let value = self.require(key)?;
        value_to_i64(&value).ok_or_else(|| self.type_error(key, "an integer"))
    }

    pub fn get_u16_or(&self, key: &str, default: u16) -> Result<u16> {
        match self.resolve(key)? {
            Some(value) => value_to_i64(&value)
                .and_then(|v| u16::try_from(v).ok())
                .ok_or_else(|| self.type_error(key, "a port number")),
            None => Ok(default),
        }
    }

    pub fn get_u32_or(&self, key: &str, default: u32) -> Result<u32> {
        match self.resolve(key)? {
            Some(value) => value_to_i64(&value)
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| self.type_error(key, "a non-negative 32-bit integer")),
            None => Ok(default),
        }
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.resolve(key)? {
            Some(Value::Bool(b)) => Ok(b),
            Some(Value::String(s)) => match s.as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(self.type_error(key, "a boolean")),
            },
            Some(_) => Err(self.type_error(key, "a boolean")),
            None => Ok(default),
        }
    }

    fn type_error(&self, key: &str, expected: &str) -> Error {
        Error::Config(format!("{}: '{}' must be {}", self.name, key, expected))
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Walk a mapping path
pub fn get_path<'a>(doc: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(doc, |node, key| node.get(*key))
}

/// Overwrite a nested field, creating intermediate mappings
///
/// Non-mapping nodes on the way are replaced by empty mappings.
pub fn set_path(doc: &mut Value, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *doc = value;
        return;
    };
    let mut node = doc;
    for key in parents {
        if !node.is_mapping() {
            *node = Value::Mapping(Mapping::new());
        }
        let map = match node.as_mapping_mut() {
            Some(map) => map,
            None => return,
        };
        node = map
            .entry(Value::from(*key))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
    }
    if !node.is_mapping() {
        *node = Value::Mapping(Mapping::new());
    }
    if let Some(map) = node.as_mapping_mut() {
        map.insert(Value::from(*last), value);
    }
}

/// Deep-merge `overlay` into `base`; mappings merge key by key, anything else replaces
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
