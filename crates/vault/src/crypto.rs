//! Master key handling and the encrypted database envelope.
//!
//! The database is a small JSON document wrapping an AES-256-GCM payload:
//!
//! ```json
//! { "format": "opsdeck-vault", "version": 1, "cipher": "aes-256-gcm", "payload": "<base64(nonce || ciphertext)>" }
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::VaultError;

pub const ENVELOPE_FORMAT: &str = "opsdeck-vault";
pub const ENVELOPE_VERSION: u32 = 1;
pub const ENVELOPE_CIPHER: &str = "aes-256-gcm";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
static KEYCHAIN_SERVICE: &str = "opsdeck";

/// Where the master key is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Base64 key in a local file (mode 0600 on unix).
    File(PathBuf),
    /// OS keychain entry under the `opsdeck` service.
    Keychain { account: String },
}

impl KeySource {
    pub fn keychain() -> Self {
        Self::Keychain {
            account: "vault-key".into(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            KeySource::File(path) => path.display().to_string(),
            KeySource::Keychain { account } => format!("keychain:{KEYCHAIN_SERVICE}/{account}"),
        }
    }
}

/// 256-bit symmetric key.
#[derive(Clone)]
pub struct MasterKey([u8; KEY_LEN]);

impl MasterKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, VaultError> {
        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|error| VaultError::DecryptFailed {
                reason: format!("key material is not base64: {error}"),
            })?;
        let bytes: [u8; KEY_LEN] = decoded.try_into().map_err(|bytes: Vec<u8>| VaultError::DecryptFailed {
            reason: format!("key must be {KEY_LEN} bytes, found {}", bytes.len()),
        })?;
        Ok(Self(bytes))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(&self.0.into())
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

/// Reads the key from `source`; `Ok(None)` when none has been stored yet.
pub fn read_key(source: &KeySource) -> Result<Option<MasterKey>, VaultError> {
    match source {
        KeySource::File(path) => match fs::read_to_string(path) {
            Ok(contents) => MasterKey::from_base64(&contents).map(Some),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(VaultError::KeyUnavailable {
                reason: format!("cannot read {}: {error}", path.display()),
            }),
        },
        KeySource::Keychain { account } => {
            let entry = keychain_entry(account)?;
            match entry.get_password() {
                Ok(encoded) => MasterKey::from_base64(&encoded).map(Some),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(error) => Err(VaultError::KeyUnavailable {
                    reason: error.to_string(),
                }),
            }
        }
    }
}

/// Stores a freshly generated key.
pub fn store_key(source: &KeySource, key: &MasterKey) -> Result<(), VaultError> {
    match source {
        KeySource::File(path) => {
            write_key_file(path, key).map_err(|error| VaultError::KeyUnavailable {
                reason: format!("cannot create {}: {error}", path.display()),
            })?;
            info!(path = %path.display(), "Created vault key file");
            Ok(())
        }
        KeySource::Keychain { account } => {
            let entry = keychain_entry(account)?;
            entry
                .set_password(&key.to_base64())
                .map_err(|error| VaultError::KeyUnavailable {
                    reason: error.to_string(),
                })?;
            debug!("Stored vault key in keychain: {}", account);
            Ok(())
        }
    }
}

fn keychain_entry(account: &str) -> Result<keyring::Entry, VaultError> {
    keyring::Entry::new(KEYCHAIN_SERVICE, account).map_err(|error| VaultError::KeyUnavailable {
        reason: error.to_string(),
    })
}

fn write_key_file(path: &Path, key: &MasterKey) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    writeln!(file, "{}", key.to_base64())?;
    file.sync_all()
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    format: String,
    version: u32,
    cipher: String,
    payload: String,
}

/// Encrypts `plaintext` into a serialized envelope.
pub fn seal(key: &MasterKey, plaintext: &[u8]) -> Result<String, VaultError> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = key
        .cipher()
        .encrypt(&nonce, plaintext)
        .map_err(|_| VaultError::write_failed("encryption failed"))?;
    let mut combined = nonce.to_vec();
    combined.extend_from_slice(&ciphertext);
    let envelope = Envelope {
        format: ENVELOPE_FORMAT.into(),
        version: ENVELOPE_VERSION,
        cipher: ENVELOPE_CIPHER.into(),
        payload: STANDARD.encode(combined),
    };
    serde_json::to_string_pretty(&envelope).map_err(VaultError::write_failed)
}

/// Decrypts a serialized envelope.
pub fn open(key: &MasterKey, raw: &str) -> Result<Vec<u8>, VaultError> {
    let envelope: Envelope = serde_json::from_str(raw).map_err(|error| VaultError::corrupt(format!("invalid envelope: {error}")))?;
    if envelope.format != ENVELOPE_FORMAT {
        return Err(VaultError::corrupt(format!("unexpected format `{}`", envelope.format)));
    }
    if envelope.version != ENVELOPE_VERSION {
        return Err(VaultError::corrupt(format!("unsupported version {}", envelope.version)));
    }
    if envelope.cipher != ENVELOPE_CIPHER {
        return Err(VaultError::corrupt(format!("unsupported cipher `{}`", envelope.cipher)));
    }
    let combined = STANDARD
        .decode(envelope.payload.trim())
        .map_err(|error| VaultError::corrupt(format!("payload is not base64: {error}")))?;
    if combined.len() <= NONCE_LEN {
        return Err(VaultError::corrupt("payload is truncated"));
    }
    let (nonce, ciphertext) = combined.split_at(NONCE_LEN);
    key.cipher()
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| VaultError::DecryptFailed {
            reason: "the key does not open this database".into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_payload_opens_with_same_key() {
        let key = MasterKey::generate();
        let sealed = seal(&key, b"{\"entries\":[]}").expect("seal");
        assert!(sealed.contains(ENVELOPE_FORMAT));
        assert_eq!(open(&key, &sealed).expect("open"), b"{\"entries\":[]}");
    }

    #[test]
    fn wrong_key_is_decrypt_failure() {
        let sealed = seal(&MasterKey::generate(), b"secret").expect("seal");
        let result = open(&MasterKey::generate(), &sealed);
        assert!(matches!(result, Err(VaultError::DecryptFailed { .. })));
    }

    #[test]
    fn garbage_is_corrupt() {
        let key = MasterKey::generate();
        assert!(matches!(open(&key, "not json"), Err(VaultError::Corrupt { .. })));
        let foreign = r#"{"format":"keepass","version":1,"cipher":"aes-256-gcm","payload":""}"#;
        assert!(matches!(open(&key, foreign), Err(VaultError::Corrupt { .. })));
    }

    #[test]
    fn key_file_is_created_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = KeySource::File(dir.path().join("keys").join("vault.key"));
        assert!(read_key(&source).expect("read absent key").is_none());

        let key = MasterKey::generate();
        store_key(&source, &key).expect("store key");
        let loaded = read_key(&source).expect("read key").expect("key present");
        assert_eq!(loaded.to_base64(), key.to_base64());
        assert!(store_key(&source, &MasterKey::generate()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("vault.key");
        store_key(&KeySource::File(path.clone()), &MasterKey::generate()).expect("store key");
        let mode = fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn short_key_is_rejected() {
        let result = MasterKey::from_base64(&STANDARD.encode([1u8; 16]));
        assert!(matches!(result, Err(VaultError::DecryptFailed { .. })));
    }
}
