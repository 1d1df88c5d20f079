//! Maps vault entries onto the connection fields service integrations need.

use std::collections::BTreeMap;

use url::Url;

use crate::entry::SecretEntry;
use crate::error::VaultError;
use crate::path::SecretPath;
use crate::store::Vault;

/// Typed view of a [`SecretEntry`].
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    pub path: String,
    /// Title, or the last path segment when the title is blank.
    pub display_name: String,
    /// Raw `url` field.
    pub endpoint: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: String,
    pub password: String,
    pub attributes: BTreeMap<String, String>,
}

impl std::fmt::Debug for ResolvedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecret")
            .field("path", &self.path)
            .field("display_name", &self.display_name)
            .field("endpoint", &self.endpoint)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

impl ResolvedSecret {
    pub fn from_entry(entry: SecretEntry) -> Self {
        let (host, port) = parse_endpoint(&entry.url);
        let display_name = if entry.title.trim().is_empty() {
            entry.path.rsplit('/').next().unwrap_or_default().to_string()
        } else {
            entry.title.clone()
        };
        Self {
            path: entry.path,
            display_name,
            endpoint: entry.url,
            host,
            port,
            username: entry.user_name,
            password: entry.password,
            attributes: entry.custom_attributes,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Integer attribute; `default` when absent or unparsable.
    pub fn port(&self, name: &str, default: u16) -> u16 {
        self.attribute(name)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Boolean attribute: `true`/`1`/`yes`/`on` and `false`/`0`/`no`/`off`
    /// (case-insensitive); anything else yields `default`.
    pub fn flag(&self, name: &str, default: bool) -> bool {
        match self.attribute(name).map(|value| value.trim().to_ascii_lowercase()) {
            Some(value) if matches!(value.as_str(), "true" | "1" | "yes" | "on") => true,
            Some(value) if matches!(value.as_str(), "false" | "0" | "no" | "off") => false,
            _ => default,
        }
    }

    /// Comma-separated attribute, split and trimmed; blank items are dropped.
    pub fn list(&self, name: &str) -> Vec<String> {
        self.attribute(name)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_enabled(&self) -> bool {
        self.flag("enabled", true)
    }
}

fn parse_endpoint(raw: &str) -> (Option<String>, Option<u16>) {
    let raw = raw.trim();
    if raw.is_empty() {
        return (None, None);
    }
    let candidate = if raw.contains("://") { raw.to_string() } else { format!("tcp://{raw}") };
    match Url::parse(&candidate) {
        Ok(url) => (url.host_str().map(str::to_string), url.port_or_known_default()),
        Err(_) => (None, None),
    }
}

/// Resolves vault paths into [`ResolvedSecret`]s.
pub struct SecretResolver<'a> {
    vault: &'a Vault,
}

impl<'a> SecretResolver<'a> {
    pub fn new(vault: &'a Vault) -> Self {
        Self { vault }
    }

    pub fn resolve(&self, path: &str) -> Result<ResolvedSecret, VaultError> {
        self.vault.get(path).map(ResolvedSecret::from_entry)
    }

    /// Every enabled entry under `<service>/<environment>`.
    ///
    /// An empty group is [`VaultError::NotFound`] with an actionable message.
    pub fn resolve_group(&self, service: &str, environment: &str) -> Result<Vec<ResolvedSecret>, VaultError> {
        let group = SecretPath::from_segments([service, environment])?;
        let entries = self.vault.entries(group.as_str())?;
        if entries.is_empty() {
            return Err(VaultError::empty_group(service, environment));
        }
        Ok(entries
            .into_iter()
            .map(ResolvedSecret::from_entry)
            .filter(ResolvedSecret::is_enabled)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(entry: SecretEntry) -> ResolvedSecret {
        ResolvedSecret::from_entry(entry)
    }

    #[test]
    fn url_yields_host_and_port() {
        let secret = resolved(SecretEntry::new("rabbitmq/dev/main").with_url("amqp://broker.internal:5673/vhost"));
        assert_eq!(secret.host.as_deref(), Some("broker.internal"));
        assert_eq!(secret.port, Some(5673));
        assert_eq!(secret.display_name, "main");
    }

    #[test]
    fn bare_host_port_is_accepted() {
        let secret = resolved(SecretEntry::new("redis/dev/cache").with_url("localhost:6379").with_title("Cache"));
        assert_eq!(secret.host.as_deref(), Some("localhost"));
        assert_eq!(secret.port, Some(6379));
        assert_eq!(secret.display_name, "Cache");
    }

    #[test]
    fn typed_accessors_fall_back_to_defaults() {
        let secret = resolved(
            SecretEntry::new("kafka/dev/broker")
                .with_attribute("port", "not-a-number")
                .with_attribute("admin_port", "9644")
                .with_attribute("tls", "YES")
                .with_attribute("brokers", " a:9092 , b:9092,, "),
        );
        assert_eq!(secret.port("port", 9092), 9092);
        assert_eq!(secret.port("admin_port", 1), 9644);
        assert_eq!(secret.port("missing", 7), 7);
        assert!(secret.flag("tls", false));
        assert!(secret.flag("missing", true));
        assert_eq!(secret.list("brokers"), vec!["a:9092".to_string(), "b:9092".to_string()]);
        assert!(secret.list("missing").is_empty());
    }

    #[test]
    fn debug_output_hides_password() {
        let secret = resolved(SecretEntry::new("redis/dev/cache").with_credentials("default", "hunter2"));
        assert!(!format!("{secret:?}").contains("hunter2"));
    }
}
