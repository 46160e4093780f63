//! Privacy-preserving visitor fingerprints

use sha2::{Digest, Sha256};

/// Salted SHA-256 hasher for client IPs.
///
/// The raw IP never leaves this type: callers only see the 64-character
/// lowercase hex digest.
#[derive(Clone)]
pub struct IdentityHasher {
    salt: String,
}

impl IdentityHasher {
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    pub fn fingerprint(&self, ip: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(ip.as_bytes());
        hasher.update(self.salt.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl std::fmt::Debug for IdentityHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityHasher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic() {
        let hasher = IdentityHasher::new("pepper");
        assert_eq!(
            hasher.fingerprint("203.0.113.7"),
            hasher.fingerprint("203.0.113.7")
        );
    }

    #[test]
    fn fingerprint_is_fixed_length_hex() {
        let hasher = IdentityHasher::new("pepper");
        for ip in ["127.0.0.1", "2001:db8::1", ""] {
            let digest = hasher.fingerprint(ip);
            assert_eq!(digest.len(), 64);
            assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn fingerprint_never_contains_the_ip() {
        let hasher = IdentityHasher::new("pepper");
        for ip in ["10.0.0.1", "192.168.100.200", "8.8.8.8", "2001:db8::1"] {
            assert!(!hasher.fingerprint(ip).contains(ip));
        }
    }

    #[test]
    fn salt_changes_the_digest() {
        let a = IdentityHasher::new("one").fingerprint("10.0.0.1");
        let b = IdentityHasher::new("two").fingerprint("10.0.0.1");
        assert_ne!(a, b);
    }

    #[test]
    fn matches_sha256_of_ip_and_salt() {
        let hasher = IdentityHasher::new("salt");
        let expected = format!("{:x}", Sha256::digest(b"1.2.3.4salt"));
        assert_eq!(hasher.fingerprint("1.2.3.4"), expected);
    }
}
