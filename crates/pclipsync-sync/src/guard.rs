//! Content fingerprints and the two-slot echo-guard.
//!
//! Setting a selection from received data makes XFixes report an ownership
//! change, which would send the same content straight back. The guard
//! remembers the fingerprint of the last payload sent and the last payload
//! received; content matching either slot is suppressed on the outbound
//! path.
//!
//! Ordering is load-bearing: `record_received` must run before the
//! selection is mutated with that payload, and `record_sent` only after the
//! outgoing frame is fully flushed.

use sha2::{Digest, Sha256};

/// SHA-256 of a payload as 64 lowercase hex characters.
pub fn fingerprint(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    format!("{:x}", hasher.finalize())
}

/// The pair of fingerprints consulted on every send decision.
#[derive(Debug, Clone, Default)]
pub struct EchoGuard {
    last_sent: Option<String>,
    last_received: Option<String>,
}

impl EchoGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff `fp` matches neither the last-sent nor the last-received
    /// fingerprint.
    pub fn should_send(&self, fp: &str) -> bool {
        self.last_sent.as_deref() != Some(fp) && self.last_received.as_deref() != Some(fp)
    }

    /// Record a payload whose frame has been fully flushed to the peer.
    pub fn record_sent(&mut self, fp: String) {
        self.last_sent = Some(fp);
    }

    /// Record a received payload. Must happen before any selection is set
    /// with that payload.
    pub fn record_received(&mut self, fp: String) {
        self.last_received = Some(fp);
    }

    /// Reset both slots, e.g. when a client reconnects.
    pub fn clear(&mut self) {
        self.last_sent = None;
        self.last_received = None;
    }

    pub fn last_sent(&self) -> Option<&str> {
        self.last_sent.as_deref()
    }

    pub fn last_received(&self) -> Option<&str> {
        self.last_received.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_sha256_lowercase_hex() {
        // Well-known digest of the empty input.
        assert_eq!(
            fingerprint(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(fingerprint(b"hello").len(), 64);
        assert_ne!(fingerprint(b"hello"), fingerprint(b"world"));
    }

    #[test]
    fn fresh_guard_sends_everything() {
        let guard = EchoGuard::new();
        assert!(guard.should_send(&fingerprint(b"anything")));
    }

    #[test]
    fn sent_content_is_suppressed() {
        let mut guard = EchoGuard::new();
        let fp = fingerprint(b"copy");
        guard.record_sent(fp.clone());
        assert!(!guard.should_send(&fp));
        assert!(guard.should_send(&fingerprint(b"different")));
    }

    #[test]
    fn received_content_is_suppressed() {
        let mut guard = EchoGuard::new();
        let fp = fingerprint(b"paste");
        guard.record_received(fp.clone());
        assert!(!guard.should_send(&fp));
        assert!(guard.should_send(&fingerprint(b"different")));
    }

    #[test]
    fn slots_are_independent() {
        let mut guard = EchoGuard::new();
        let sent = fingerprint(b"sent");
        let received = fingerprint(b"received");
        guard.record_sent(sent.clone());
        guard.record_received(received.clone());
        assert!(!guard.should_send(&sent));
        assert!(!guard.should_send(&received));

        // A newer send only displaces the sent slot.
        guard.record_sent(fingerprint(b"newer"));
        assert!(guard.should_send(&sent));
        assert!(!guard.should_send(&received));
    }

    #[test]
    fn clear_resets_both_slots() {
        let mut guard = EchoGuard::new();
        guard.record_sent(fingerprint(b"a"));
        guard.record_received(fingerprint(b"b"));
        guard.clear();
        assert!(guard.last_sent().is_none());
        assert!(guard.last_received().is_none());
        assert!(guard.should_send(&fingerprint(b"a")));
        assert!(guard.should_send(&fingerprint(b"b")));
    }
}
