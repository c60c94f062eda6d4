//! Password-protected signature library.
//!
//! The vault file is `"SIGV" | version | salt | nonce | ciphertext`. The
//! key is derived from the master password with Argon2id; the plaintext is
//! the JSON map of signature records, sealed with ChaCha20-Poly1305. A fresh
//! nonce is drawn for every write.

use argon2::Argon2;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 4] = b"SIGV";
const VAULT_VERSION: u8 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const HEADER_LEN: usize = MAGIC.len() + 1 + SALT_LEN + NONCE_LEN;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("incorrect password")]
    WrongPassword,
    #[error("vault file is corrupted: {0}")]
    Corrupted(String),
    #[error("unsupported vault version {0}")]
    UnsupportedVersion(u8),
    #[error("vault not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("vault already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("cryptography error: {0}")]
    Crypto(String),
}

/// Whether a signature image is a full signature or initials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureKind {
    #[default]
    Signature,
    Initials,
}

impl SignatureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Signature => "signature",
            Self::Initials => "initials",
        }
    }
}

impl std::str::FromStr for SignatureKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "signature" => Ok(Self::Signature),
            "initials" => Ok(Self::Initials),
            other => Err(format!("unknown signature kind '{other}'")),
        }
    }
}

/// One stored signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRecord {
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub kind: SignatureKind,
    pub width: u32,
    pub height: u32,
    pub created: DateTime<Utc>,
}

/// An unlocked vault. Holding one means the password was right; every
/// mutation is written back before it returns.
pub struct SignatureVault {
    path: PathBuf,
    key: Key,
    salt: [u8; SALT_LEN],
    records: BTreeMap<String, SignatureRecord>,
}

impl std::fmt::Debug for SignatureVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVault")
            .field("path", &self.path)
            .field("records", &self.records.len())
            .finish_non_exhaustive()
    }
}

impl SignatureVault {
    /// `signatures.vault` in the platform's local data directory.
    pub fn default_path() -> Result<PathBuf, StorageError> {
        let dirs = ProjectDirs::from("dev", "PdfAnnotator", "PdfAnnotator")
            .ok_or(StorageError::NoDataDirectory)?;
        Ok(dirs.data_local_dir().join("signatures.vault"))
    }

    /// Creates an empty vault at `path`. Fails if one is already there.
    pub fn create(path: impl Into<PathBuf>, password: &str) -> Result<Self, StorageError> {
        let path = path.into();
        if path.exists() {
            return Err(StorageError::AlreadyExists(path));
        }

        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let key = derive_key(password, &salt)?;

        let vault = Self { path, key, salt, records: BTreeMap::new() };
        vault.persist()?;
        tracing::info!(path = %vault.path.display(), "signature vault created");
        Ok(vault)
    }

    /// Decrypts the vault at `path`. Nothing is exposed unless the password
    /// and the whole file check out.
    pub fn unlock(path: impl Into<PathBuf>, password: &str) -> Result<Self, StorageError> {
        let path = path.into();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(path))
            }
            Err(err) => return Err(err.into()),
        };

        let header = Header::parse(&bytes)?;
        let key = derive_key(password, &header.salt)?;
        let cipher = ChaCha20Poly1305::new(&key);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&header.nonce), &bytes[HEADER_LEN..])
            .map_err(|_| StorageError::WrongPassword)?;
        let records: BTreeMap<String, SignatureRecord> = serde_json::from_slice(&plaintext)
            .map_err(|err| StorageError::Corrupted(err.to_string()))?;

        tracing::debug!(path = %path.display(), records = records.len(), "signature vault unlocked");
        Ok(Self { path, key, salt: header.salt, records })
    }

    /// Unlocks the vault at `path`, creating it first if it does not exist.
    pub fn open_or_create(path: impl Into<PathBuf>, password: &str) -> Result<Self, StorageError> {
        let path = path.into();
        if path.exists() {
            Self::unlock(path, password)
        } else {
            Self::create(path, password)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stores `data` under `name`, replacing any existing entry.
    pub fn add(
        &mut self,
        name: &str,
        data: Vec<u8>,
        kind: SignatureKind,
        width: u32,
        height: u32,
    ) -> Result<(), StorageError> {
        let record = SignatureRecord { data, kind, width, height, created: Utc::now() };
        let previous = self.records.insert(name.to_owned(), record);
        if let Err(err) = self.persist() {
            match previous {
                Some(previous) => self.records.insert(name.to_owned(), previous),
                None => self.records.remove(name),
            };
            return Err(err);
        }
        tracing::debug!(name, "signature stored");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.records.get(name).map(|record| record.data.as_slice())
    }

    pub fn info(&self, name: &str) -> Option<&SignatureRecord> {
        self.records.get(name)
    }

    /// Returns whether `name` existed.
    pub fn delete(&mut self, name: &str) -> Result<bool, StorageError> {
        let Some(removed) = self.records.remove(name) else {
            return Ok(false);
        };
        if let Err(err) = self.persist() {
            self.records.insert(name.to_owned(), removed);
            return Err(err);
        }
        tracing::debug!(name, "signature deleted");
        Ok(true)
    }

    /// Names in sorted order.
    pub fn list(&self) -> Vec<&str> {
        self.records.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Seals the records under a new nonce and swaps the file in by rename.
    fn persist(&self) -> Result<(), StorageError> {
        let plaintext = serde_json::to_vec(&self.records)?;
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let cipher = ChaCha20Poly1305::new(&self.key);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|err| StorageError::Crypto(err.to_string()))?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        bytes.extend_from_slice(MAGIC);
        bytes.push(VAULT_VERSION);
        bytes.extend_from_slice(&self.salt);
        bytes.extend_from_slice(&nonce);
        bytes.extend_from_slice(&ciphertext);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let temp = self.path.with_extension("vault.tmp");
        fs::write(&temp, &bytes)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

struct Header {
    salt: [u8; SALT_LEN],
    nonce: [u8; NONCE_LEN],
}

impl Header {
    fn parse(bytes: &[u8]) -> Result<Self, StorageError> {
        if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
            return Err(StorageError::Corrupted("missing vault header".into()));
        }
        let version = bytes[MAGIC.len()];
        if version != VAULT_VERSION {
            return Err(StorageError::UnsupportedVersion(version));
        }

        let salt_start = MAGIC.len() + 1;
        let nonce_start = salt_start + SALT_LEN;
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&bytes[salt_start..nonce_start]);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[nonce_start..HEADER_LEN]);
        Ok(Self { salt, nonce })
    }
}

fn derive_key(password: &str, salt: &[u8]) -> Result<Key, StorageError> {
    let mut key = Key::default();
    Argon2::default()
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|err| StorageError::Crypto(err.to_string()))?;
    Ok(key)
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
