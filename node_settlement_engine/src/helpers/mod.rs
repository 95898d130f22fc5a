mod fingerprint;

pub use fingerprint::fallback_fingerprint;
