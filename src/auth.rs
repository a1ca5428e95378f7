//! Password hashing and verification.
//!
//! Stored hashes are self-describing strings:
//! `pbkdf2-sha256$<iterations>$<salt_b64>$<hash_b64>` with URL-safe,
//! unpadded base64. The iteration count travels with the hash so it can
//! be raised later without invalidating existing credentials.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

const SCHEME: &str = "pbkdf2-sha256";
const ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("stored password hash is malformed")]
    MalformedHash,
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut hash = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, ITERATIONS, &mut hash);

    format!(
        "{SCHEME}${ITERATIONS}${}${}",
        URL_SAFE_NO_PAD.encode(salt),
        URL_SAFE_NO_PAD.encode(hash)
    )
}

/// Verify a password against a stored hash string. Comparison of the
/// derived key is constant-time.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, AuthError> {
    let mut parts = stored.split('$');
    let scheme = parts.next().ok_or(AuthError::MalformedHash)?;
    if scheme != SCHEME {
        return Err(AuthError::MalformedHash);
    }
    let iterations: u32 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or(AuthError::MalformedHash)?;
    let salt = parts
        .next()
        .and_then(|s| URL_SAFE_NO_PAD.decode(s).ok())
        .ok_or(AuthError::MalformedHash)?;
    let expected = parts
        .next()
        .and_then(|s| URL_SAFE_NO_PAD.decode(s).ok())
        .ok_or(AuthError::MalformedHash)?;
    if parts.next().is_some() || expected.len() != HASH_LEN {
        return Err(AuthError::MalformedHash);
    }

    let mut derived = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut derived);

    Ok(derived.ct_eq(expected.as_slice()).into())
}
