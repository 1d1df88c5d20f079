use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One credential record.
///
/// Attribute values are always strings; typed interpretation lives in
/// [`crate::ResolvedSecret`].
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretEntry {
    pub path: String,
    pub title: String,
    pub url: String,
    pub user_name: String,
    pub password: String,
    pub notes: String,
    pub custom_attributes: BTreeMap<String, String>,
}

impl SecretEntry {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_credentials(mut self, user_name: impl Into<String>, password: impl Into<String>) -> Self {
        self.user_name = user_name.into();
        self.password = password.into();
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_attributes.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.custom_attributes.get(name).map(String::as_str)
    }
}

impl fmt::Debug for SecretEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("SecretEntry")
            .field("path", &self.path)
            .field("title", &self.title)
            .field("url", &self.url)
            .field("user_name", &self.user_name)
            .field("password", &password)
            .field("notes", &self.notes)
            .field("custom_attributes", &self.custom_attributes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_password() {
        let entry = SecretEntry::new("redis/production/cache").with_credentials("default", "s3cr3t");
        let rendered = format!("{entry:?}");
        assert!(!rendered.contains("s3cr3t"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let entry: SecretEntry = serde_json::from_str(r#"{"path":"kafka/dev/broker","title":"Broker"}"#).expect("parse entry");
        assert_eq!(entry.title, "Broker");
        assert!(entry.password.is_empty());
        assert!(entry.custom_attributes.is_empty());
    }
}
