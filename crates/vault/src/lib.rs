//! Encrypted credential vault.
//!
//! Entries are addressed by hierarchical paths (`<service>/<environment>/<name>`)
//! and kept in a single AES-256-GCM encrypted database unlocked by a local key
//! file (or an OS keychain entry). There is no interactive password: losing
//! the key makes every stored entry unrecoverable.

mod crypto;
mod entry;
mod error;
mod path;
mod provision;
mod resolve;
mod store;
mod watcher;

pub use crypto::{ENVELOPE_CIPHER, ENVELOPE_FORMAT, ENVELOPE_VERSION, KeySource, MasterKey};
pub use entry::SecretEntry;
pub use error::VaultError;
pub use path::SecretPath;
pub use provision::{DiscoveryReport, EXAMPLE_ENTRY_NAME, ServiceSchema, backfill, discover, ensure_example};
pub use resolve::{ResolvedSecret, SecretResolver};
pub use store::{Vault, VaultLocation};
pub use watcher::{VaultEvent, VaultWatcher};
