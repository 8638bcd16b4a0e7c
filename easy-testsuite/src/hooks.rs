//! Named hooks that patch a service config before startup

use easy_common::config::{set_path, COMPONENTS, COMPONENTS_MANAGER};
use easy_common::ConfigVars;
use serde_yaml::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::{Error, Result};

/// Hook rewriting the config document and its variables in place
pub type ConfigHook = Box<dyn Fn(&mut Value, &mut ConfigVars) -> Result<()> + Send + Sync>;

/// Name of the built-in hook setting `server.listener.port`
pub const PORT_HOOK: &str = "listener_port";
/// Name of the built-in hook setting the default logger level
pub const LOG_LEVEL_HOOK: &str = "log_level";
/// Name of the built-in hook pointing `sqlite-database` at a scratch database
pub const DATABASE_HOOK: &str = "sqlite_dbconnection";

/// Registry of config hooks, applied by name
#[derive(Default)]
pub struct ConfigHooks {
    hooks: HashMap<String, ConfigHook>,
}

impl ConfigHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook; a later registration under the same name replaces it
    pub fn register<F>(&mut self, name: &str, hook: F)
    where
        F: Fn(&mut Value, &mut ConfigVars) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.insert(name.to_string(), Box::new(hook));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    /// Run the named hooks in order
    ///
    /// Every name is checked before any hook runs, so an unknown name leaves
    /// the document untouched.
    pub fn apply<S: AsRef<str>>(
        &self,
        names: &[S],
        doc: &mut Value,
        vars: &mut ConfigVars,
    ) -> Result<()> {
        let hooks = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.hooks
                    .get(name)
                    .map(|hook| (name, hook))
                    .ok_or_else(|| Error::UnknownHook(name.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        for (name, hook) in hooks {
            debug!("Applying config hook '{}'", name);
            hook(&mut *doc, &mut *vars)?;
        }
        Ok(())
    }
}

/// Overwrite `components_manager.components.<component>.<field>`
///
/// `field` may be dotted (`listener.port`) to reach nested keys.
pub fn set_component_field(doc: &mut Value, component: &str, field: &str, value: impl Into<Value>) {
    let mut path = vec![COMPONENTS_MANAGER, COMPONENTS, component];
    path.extend(field.split('.'));
    set_path(doc, &path, value.into());
}

pub fn listener_port_hook(port: u16) -> impl Fn(&mut Value, &mut ConfigVars) -> Result<()> {
    move |doc: &mut Value, _vars: &mut ConfigVars| {
        set_component_field(doc, "server", "listener.port", port);
        Ok(())
    }
}

pub fn log_level_hook(level: String) -> impl Fn(&mut Value, &mut ConfigVars) -> Result<()> {
    move |doc: &mut Value, _vars: &mut ConfigVars| {
        set_component_field(doc, "logging", "loggers.default.level", level.as_str());
        Ok(())
    }
}

pub fn dbconnection_hook(url: String) -> impl Fn(&mut Value, &mut ConfigVars) -> Result<()> {
    move |doc: &mut Value, _vars: &mut ConfigVars| {
        set_component_field(
            doc,
            easy_common::deps::SQLITE_COMPONENT,
            "dbconnection",
            url.as_str(),
        );
        Ok(())
    }
}
