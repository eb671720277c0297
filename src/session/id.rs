//! Session identifier generation
//!
//! Identifiers are 32 bytes from the OS random source, hex-encoded. When the
//! random source fails the generator falls back to hashing the wall clock
//! together with a process-local counter so that requests keep being served.
//! Fallback ids are shorter (32 hex chars) and weaker; every use is logged
//! at WARN.

use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Random bytes drawn per identifier
pub const ID_BYTES: usize = 32;

/// Length of a fallback identifier in bytes before hex encoding
pub const FALLBACK_ID_BYTES: usize = 16;

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generates a new session identifier from the OS random source
pub fn generate_id() -> String {
    generate_id_with(&mut OsRng)
}

/// Generates a session identifier from `rng`, falling back to a
/// timestamp hash if `rng` cannot fill the buffer
pub fn generate_id_with<R: RngCore + ?Sized>(rng: &mut R) -> String {
    let mut buf = [0u8; ID_BYTES];
    match rng.try_fill_bytes(&mut buf) {
        Ok(()) => hex::encode(buf),
        Err(e) => {
            warn!(
                error = %e,
                "Random source failed, using timestamp-derived session id"
            );
            fallback_id()
        }
    }
}

fn fallback_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let seq = FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed);

    let mut hasher = Sha256::new();
    hasher.update(nanos.to_le_bytes());
    hasher.update(seq.to_le_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..FALLBACK_ID_BYTES])
}

/// True if `id` has the shape of an identifier this module produces
pub fn is_well_formed(id: &str) -> bool {
    (id.len() == ID_BYTES * 2 || id.len() == FALLBACK_ID_BYTES * 2)
        && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
