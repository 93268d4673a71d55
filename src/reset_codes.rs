//! In-memory password-reset codes, keyed by normalized email.
//!
//! Codes are six digits, stored only as SHA-256 digests, expire after a fixed
//! TTL and burn out after `MAX_ATTEMPTS` wrong guesses.

use rand::Rng;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const MAX_ATTEMPTS: u32 = 5;

struct PendingCode {
    digest: [u8; 32],
    expires_at: Instant,
    failed_attempts: u32,
}

pub struct VerificationCodes {
    ttl: Duration,
    pending: Mutex<HashMap<String, PendingCode>>,
}

impl VerificationCodes {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Replaces any outstanding code for `email` and returns the new one.
    pub fn issue(&self, email: &str) -> String {
        self.issue_at(email, Instant::now())
    }

    pub fn issue_at(&self, email: &str, now: Instant) -> String {
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32));
        let entry = PendingCode {
            digest: digest(&code),
            // An unrepresentable expiry yields a code that is already expired.
            expires_at: now.checked_add(self.ttl).unwrap_or(now),
            failed_attempts: 0,
        };
        self.lock().insert(email.to_string(), entry);
        code
    }

    /// Consumes the code on success.
    pub fn verify(&self, email: &str, code: &str) -> bool {
        self.verify_at(email, code, Instant::now())
    }

    pub fn verify_at(&self, email: &str, code: &str, now: Instant) -> bool {
        let mut pending = self.lock();
        let Some(entry) = pending.get_mut(email) else {
            return false;
        };
        if now >= entry.expires_at {
            pending.remove(email);
            return false;
        }
        if entry.digest == digest(code.trim()) {
            pending.remove(email);
            return true;
        }
        entry.failed_attempts += 1;
        if entry.failed_attempts >= MAX_ATTEMPTS {
            pending.remove(email);
        }
        false
    }

    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let mut pending = self.lock();
        let before = pending.len();
        pending.retain(|_, e| now < e.expires_at);
        before - pending.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingCode>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn digest(code: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(code.as_bytes()));
    out
}
