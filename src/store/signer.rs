//! Deletion tags
//!
//! A tag is HMAC-SHA512 over the entry id with the process key. It is never
//! stored; deletion recomputes it and compares in constant time.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use hmac::{Hmac, Mac};
use sha2::Sha512;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::config::SecurityConfig;
use crate::errors::{Result, ShortenerError};

type HmacSha512 = Hmac<Sha512>;

/// Bytes of key material written when no key file exists yet
const GENERATED_KEY_LEN: usize = 32;

#[derive(Clone)]
pub struct Signer {
    mac: HmacSha512,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}

impl Signer {
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.is_empty() {
            return Err(ShortenerError::config("signing key must not be empty"));
        }
        let mac = HmacSha512::new_from_slice(key)
            .map_err(|e| ShortenerError::config(format!("invalid signing key: {}", e)))?;
        Ok(Self { mac })
    }

    /// 从配置加载密钥：优先使用内联密钥，否则读取（或生成）密钥文件
    pub fn from_config(config: &SecurityConfig) -> Result<Self> {
        if !config.private_key.is_empty() {
            return Self::new(config.private_key.as_bytes());
        }
        let key = load_or_create_key_file(Path::new(&config.private_key_file))?;
        Self::new(&key)
    }

    pub fn sign(&self, id: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    /// Constant-time comparison of `tag` against the expected tag for `id`
    pub fn verify(&self, id: &str, tag: &[u8]) -> bool {
        self.sign(id).ct_eq(tag).into()
    }
}

fn load_or_create_key_file(path: &Path) -> Result<Vec<u8>> {
    match fs::read(path) {
        Ok(key) if key.is_empty() => Err(ShortenerError::config(format!(
            "private key file {} is empty",
            path.display()
        ))),
        Ok(key) => {
            info!("Loaded signing key from {}", path.display());
            Ok(key)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(
                "Private key file {} not found, generating a new one",
                path.display()
            );
            let key: [u8; GENERATED_KEY_LEN] = rand::random();
            write_key_file(path, &key)?;
            Ok(key.to_vec())
        }
        Err(e) => Err(ShortenerError::file_operation(format!(
            "could not read private key file {}: {}",
            path.display(),
            e
        ))),
    }
}

fn write_key_file(path: &Path, key: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| {
            ShortenerError::file_operation(format!(
                "could not create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }
    fs::write(path, key).map_err(|e| {
        ShortenerError::file_operation(format!(
            "could not write private key file {}: {}",
            path.display(),
            e
        ))
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
