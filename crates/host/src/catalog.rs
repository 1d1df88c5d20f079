use std::fmt;

use indexmap::IndexMap;

use crate::contract::PluginContract;

/// Instantiates one plugin module.
pub type PluginFactory = fn() -> Box<dyn PluginContract>;

/// Modules compiled into the binary, keyed by the entry symbol artifacts refer to.
#[derive(Clone, Default)]
pub struct ModuleCatalog {
    modules: IndexMap<String, PluginFactory>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, entry: impl Into<String>, factory: PluginFactory) -> Self {
        self.register(entry, factory);
        self
    }

    /// Registers `factory` under `entry`, replacing any previous module.
    pub fn register(&mut self, entry: impl Into<String>, factory: PluginFactory) {
        self.modules.insert(entry.into(), factory);
    }

    pub fn resolve(&self, entry: &str) -> Option<PluginFactory> {
        self.modules.get(entry).copied()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.modules.contains_key(entry)
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl fmt::Debug for ModuleCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.modules.keys()).finish()
    }
}
