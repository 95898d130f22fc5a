use blake2::{Blake2b512, Digest};

/// Derives a coarse device fingerprint from whatever request signals are available (user agent,
/// accepted languages, platform hints and so on).
///
/// This is the fallback for when the client could not produce a stable device signal. It is
/// intentionally weak: the composite reduces trial abuse, it does not eliminate it, and anyone
/// willing to vary their request headers can defeat it. The primary defences remain the operator
/// and network-origin keys.
pub fn fallback_fingerprint(signals: &[&str]) -> String {
    let mut hasher = Blake2b512::new();
    for signal in signals {
        hasher.update(signal.trim().to_ascii_lowercase().as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    // 32 hex chars is plenty for a uniqueness key
    digest.iter().take(16).map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod test {
    use super::fallback_fingerprint;

    #[test]
    fn stable_for_equal_signals() {
        let a = fallback_fingerprint(&["Mozilla/5.0", "en-US,en", "Linux x86_64"]);
        let b = fallback_fingerprint(&["Mozilla/5.0 ", "EN-US,en", "linux x86_64"]);
        assert_eq!(a, b, "whitespace and case must not change the fingerprint");
    }

    #[test]
    fn sensitive_to_signal_boundaries() {
        let a = fallback_fingerprint(&["ab", "c"]);
        let b = fallback_fingerprint(&["a", "bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn different_signals_differ() {
        let a = fallback_fingerprint(&["Mozilla/5.0", "en-US"]);
        let b = fallback_fingerprint(&["Mozilla/5.0", "de-DE"]);
        assert_ne!(a, b);
    }
}
