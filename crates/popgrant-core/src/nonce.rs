use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

/// Supplies the per-flow anti-CSRF state value.
///
/// Each login flow asks for exactly one value and compares it against the
/// state the provider echoes back. Any value unique per flow works; a hosted
/// deployment may hand back a session identifier instead of a random string.
pub trait NonceSource: Send + Sync {
    fn next_nonce(&self) -> String;
}

/// Default source: a fresh random alphanumeric string per flow.
#[derive(Debug, Clone)]
pub struct RandomNonce {
    len: usize,
}

impl RandomNonce {
    pub fn new(len: usize) -> Self {
        Self { len }
    }
}

impl Default for RandomNonce {
    fn default() -> Self {
        Self::new(32)
    }
}

impl NonceSource for RandomNonce {
    fn next_nonce(&self) -> String {
        thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.len)
            .map(char::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonces_have_the_requested_length() {
        assert_eq!(RandomNonce::new(16).next_nonce().len(), 16);
        assert_eq!(RandomNonce::default().next_nonce().len(), 32);
    }

    #[test]
    fn consecutive_nonces_differ() {
        let source = RandomNonce::default();
        assert_ne!(source.next_nonce(), source.next_nonce());
    }
}
