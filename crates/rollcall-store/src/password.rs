//! Password hashing: salted, iterated SHA-256.
//!
//! Format: `sha256$<iterations>$<salt_b64>$<digest_b64>`. Iterations are
//! stored per hash so the work factor can be raised without invalidating
//! existing credentials.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use rand::RngCore;
use sha2::{Digest, Sha256};

const DEFAULT_ITERATIONS: u32 = 50_000;
const SALT_LEN: usize = 16;

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = derive(password, &salt, DEFAULT_ITERATIONS);
    format!(
        "sha256${DEFAULT_ITERATIONS}${}${}",
        B64.encode(salt),
        B64.encode(digest)
    )
}

/// Check a password against a stored hash. Malformed hashes verify false.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (scheme, iterations, salt, digest) = match (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) {
        (Some(scheme), Some(iter), Some(salt), Some(digest), None) => {
            (scheme, iter, salt, digest)
        }
        _ => return false,
    };
    if scheme != "sha256" {
        return false;
    }
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (B64.decode(salt), B64.decode(digest)) else {
        return false;
    };

    let actual = derive(password, &salt, iterations);
    constant_time_eq(&actual, &expected)
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let mut digest = hasher.finalize();
    for _ in 1..iterations.max(1) {
        digest = Sha256::digest(&digest);
    }
    digest.to_vec()
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
