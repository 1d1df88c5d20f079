//! Plugins compiled into the Opsdeck binary.
//!
//! - `secrets`: browse, provision and delete vault entries.
//! - `settings`: inspect per-plugin YAML settings files.

pub mod secrets;
pub mod settings;

use opsdeck_host::ModuleCatalog;

/// The catalog the `opsdeck` binary ships with.
pub fn builtin_catalog() -> ModuleCatalog {
    ModuleCatalog::new()
        .with(secrets::ENTRY, secrets::factory)
        .with(settings::ENTRY, settings::factory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_modules_describe_themselves() {
        let catalog = builtin_catalog();
        for (entry, name) in [(secrets::ENTRY, secrets::PLUGIN_NAME), (settings::ENTRY, settings::PLUGIN_NAME)] {
            let loaded = opsdeck_host::instantiate(&catalog, entry, name).expect("valid module");
            assert!(!loaded.metadata.version.is_empty());
            assert!(loaded.metadata.tags.iter().any(|tag| tag == "builtin"));
        }
    }
}
