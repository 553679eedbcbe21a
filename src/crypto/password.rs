//! Password hashing and verification in LDAP `userPassword` formats.
//!
//! Hashes are emitted as `{SCHEME}base64` (or `{SCHEME}` followed by a PHC
//! string for Argon2 and bcrypt), the format other directory servers and
//! clients expect.

use std::fmt;
use std::str::FromStr;

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHasher as _, PasswordVerifier as _};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use crate::errors::{CerberusError, Result};

/// Supported password hash schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashScheme {
    /// Salted SHA-1, the historical LDAP default
    Ssha,
    /// Salted SHA-256
    Ssha256,
    /// Salted SHA-512
    Ssha512,
    /// Unsalted SHA-256
    Sha256,
    /// Unsalted SHA-512
    Sha512,
    /// Unsalted MD5 (legacy)
    Md5,
    /// Salted MD5 (legacy)
    Smd5,
    /// Argon2id PHC string
    Argon2id,
    /// bcrypt
    Bcrypt,
}

impl HashScheme {
    const ALL: [HashScheme; 9] = [
        HashScheme::Ssha512,
        HashScheme::Ssha256,
        HashScheme::Ssha,
        HashScheme::Sha512,
        HashScheme::Sha256,
        HashScheme::Smd5,
        HashScheme::Md5,
        HashScheme::Argon2id,
        HashScheme::Bcrypt,
    ];

    /// The `{SCHEME}` prefix used on the wire.
    pub fn prefix(self) -> &'static str {
        match self {
            HashScheme::Ssha => "{SSHA}",
            HashScheme::Ssha256 => "{SSHA256}",
            HashScheme::Ssha512 => "{SSHA512}",
            HashScheme::Sha256 => "{SHA256}",
            HashScheme::Sha512 => "{SHA512}",
            HashScheme::Md5 => "{MD5}",
            HashScheme::Smd5 => "{SMD5}",
            HashScheme::Argon2id => "{ARGON2}",
            HashScheme::Bcrypt => "{BCRYPT}",
        }
    }

    /// Detects the scheme of an encoded hash from its prefix. Bare bcrypt
    /// strings (`$2...`) are recognized too.
    pub fn detect(hash: &str) -> Option<Self> {
        let upper = hash.to_uppercase();
        Self::ALL
            .into_iter()
            .find(|scheme| upper.starts_with(scheme.prefix()))
            .or_else(|| hash.starts_with("$2").then_some(HashScheme::Bcrypt))
    }
}

impl fmt::Display for HashScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

impl FromStr for HashScheme {
    type Err = CerberusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ssha" => Ok(HashScheme::Ssha),
            "ssha256" => Ok(HashScheme::Ssha256),
            "ssha512" => Ok(HashScheme::Ssha512),
            "sha256" => Ok(HashScheme::Sha256),
            "sha512" => Ok(HashScheme::Sha512),
            "md5" => Ok(HashScheme::Md5),
            "smd5" => Ok(HashScheme::Smd5),
            "argon2" | "argon2id" => Ok(HashScheme::Argon2id),
            "bcrypt" => Ok(HashScheme::Bcrypt),
            other => Err(CerberusError::UnsupportedHashScheme(other.to_string())),
        }
    }
}

/// Hashes a password with the given scheme, returning the full
/// `{SCHEME}...` string.
pub fn hash_password(password: &str, scheme: HashScheme) -> Result<String> {
    let encoded = match scheme {
        HashScheme::Ssha => salted_digest::<Sha1>(password),
        HashScheme::Ssha256 => salted_digest::<Sha256>(password),
        HashScheme::Ssha512 => salted_digest::<Sha512>(password),
        HashScheme::Smd5 => salted_digest::<md5::Md5>(password),
        HashScheme::Sha256 => plain_digest::<Sha256>(password),
        HashScheme::Sha512 => plain_digest::<Sha512>(password),
        HashScheme::Md5 => plain_digest::<md5::Md5>(password),
        HashScheme::Argon2id => {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map_err(|err| CerberusError::PasswordHash(err.to_string()))?
                .to_string()
        }
        HashScheme::Bcrypt => bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|err| CerberusError::PasswordHash(err.to_string()))?,
    };

    Ok(format!("{}{encoded}", scheme.prefix()))
}

/// Verifies a password against an encoded hash, detecting the scheme from
/// its prefix.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let scheme = HashScheme::detect(hash)
        .ok_or_else(|| CerberusError::UnsupportedHashScheme(hash.to_string()))?;
    let encoded = strip_prefix(hash, scheme);

    match scheme {
        HashScheme::Ssha => verify_salted::<Sha1>(password, encoded),
        HashScheme::Ssha256 => verify_salted::<Sha256>(password, encoded),
        HashScheme::Ssha512 => verify_salted::<Sha512>(password, encoded),
        HashScheme::Smd5 => verify_salted::<md5::Md5>(password, encoded),
        HashScheme::Sha256 => verify_plain::<Sha256>(password, encoded),
        HashScheme::Sha512 => verify_plain::<Sha512>(password, encoded),
        HashScheme::Md5 => verify_plain::<md5::Md5>(password, encoded),
        HashScheme::Argon2id => {
            let parsed = argon2::PasswordHash::new(encoded)
                .map_err(|err| CerberusError::PasswordVerify(err.to_string()))?;
            Ok(Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok())
        }
        HashScheme::Bcrypt => bcrypt::verify(password, encoded)
            .map_err(|err| CerberusError::PasswordVerify(err.to_string())),
    }
}

fn strip_prefix(hash: &str, scheme: HashScheme) -> &str {
    let prefix = scheme.prefix();
    if hash.len() >= prefix.len() && hash[..prefix.len()].eq_ignore_ascii_case(prefix) {
        &hash[prefix.len()..]
    } else {
        hash
    }
}

/// digest(password + salt) followed by the salt, base64-encoded.
fn salted_digest<D: Digest>(password: &str) -> String {
    let mut salt = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut salt);

    let digest = D::new()
        .chain_update(password.as_bytes())
        .chain_update(salt)
        .finalize();

    let mut raw = digest.to_vec();
    raw.extend_from_slice(&salt);
    BASE64.encode(raw)
}

fn verify_salted<D: Digest>(password: &str, encoded: &str) -> Result<bool> {
    let decoded = BASE64
        .decode(encoded)
        .map_err(|err| CerberusError::PasswordVerify(format!("invalid base64: {err}")))?;

    let digest_len = <D as Digest>::output_size();
    if decoded.len() < digest_len {
        return Err(CerberusError::PasswordVerify(
            "encoded hash is shorter than its digest".to_string(),
        ));
    }
    let (stored, salt) = decoded.split_at(digest_len);

    let computed = D::new()
        .chain_update(password.as_bytes())
        .chain_update(salt)
        .finalize();
    Ok(constant_time_eq(computed.as_slice(), stored))
}

fn plain_digest<D: Digest>(password: &str) -> String {
    BASE64.encode(D::digest(password.as_bytes()))
}

fn verify_plain<D: Digest>(password: &str, encoded: &str) -> Result<bool> {
    let decoded = BASE64
        .decode(encoded)
        .map_err(|err| CerberusError::PasswordVerify(format!("invalid base64: {err}")))?;

    let computed = D::digest(password.as_bytes());
    Ok(constant_time_eq(computed.as_slice(), &decoded))
}

/// Constant-time comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
