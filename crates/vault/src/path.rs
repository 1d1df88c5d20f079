//! Hierarchical secret paths (`<service>/<environment>/<name>`).

use std::fmt;

use crate::error::VaultError;

/// A normalized, slash-separated vault path.
///
/// Surrounding slashes and whitespace are stripped; empty segments are
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SecretPath(String);

impl SecretPath {
    pub fn parse(raw: &str) -> Result<Self, VaultError> {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(VaultError::InvalidPath {
                path: raw.to_string(),
                reason: "path is empty".into(),
            });
        }
        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            let segment = segment.trim();
            if segment.is_empty() {
                return Err(VaultError::InvalidPath {
                    path: raw.to_string(),
                    reason: "path contains an empty segment".into(),
                });
            }
            segments.push(segment);
        }
        Ok(Self(segments.join("/")))
    }

    pub fn from_segments<I, S>(segments: I) -> Result<Self, VaultError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = segments
            .into_iter()
            .map(|segment| segment.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("/");
        Self::parse(&joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    pub fn service(&self) -> &str {
        self.segments().next().unwrap_or_default()
    }

    pub fn environment(&self) -> Option<&str> {
        self.segments().nth(1)
    }

    /// Final segment.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    pub fn join(&self, segment: &str) -> Result<Self, VaultError> {
        Self::parse(&format!("{}/{}", self.0, segment))
    }

    /// Segment-aware prefix test: `redis/prod` covers `redis/prod/x` but not
    /// `redis/production/x`.
    pub fn starts_with(&self, prefix: &SecretPath) -> bool {
        self.0 == prefix.0 || (self.0.starts_with(&prefix.0) && self.0.as_bytes().get(prefix.0.len()) == Some(&b'/'))
    }
}

impl fmt::Display for SecretPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SecretPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_surrounding_slashes() {
        let path = SecretPath::parse(" /redis/production/example/ ").expect("valid path");
        assert_eq!(path.as_str(), "redis/production/example");
        assert_eq!(path.service(), "redis");
        assert_eq!(path.environment(), Some("production"));
        assert_eq!(path.name(), "example");
        assert_eq!(path.depth(), 3);
    }

    #[test]
    fn rejects_empty_segments() {
        assert!(matches!(SecretPath::parse("redis//example"), Err(VaultError::InvalidPath { .. })));
        assert!(matches!(SecretPath::parse("///"), Err(VaultError::InvalidPath { .. })));
    }

    #[test]
    fn prefix_matching_respects_segments() {
        let entry = SecretPath::parse("redis/production/cache").expect("valid path");
        let exact_group = SecretPath::parse("redis/production").expect("valid path");
        let partial_word = SecretPath::parse("redis/prod").expect("valid path");
        assert!(entry.starts_with(&exact_group));
        assert!(entry.starts_with(&entry));
        assert!(!entry.starts_with(&partial_word));
    }

    #[test]
    fn join_appends_a_segment() {
        let group = SecretPath::from_segments(["kafka", "staging"]).expect("valid path");
        assert_eq!(group.join("example").expect("join").as_str(), "kafka/staging/example");
    }
}
