//! Text normalization and cache-key hashing for the embedding service,
//! adapted from the teacher's `ml::tokenizer::TokenizerService`. The real
//! subword tokenizer (`tokenizers::Tokenizer`) is not exercised by the
//! core's placeholder provider, so only the normalization/hashing surface
//! the core actually uses is kept.

#[derive(Clone, Default)]
pub struct TokenizerService;

impl TokenizerService {
    pub fn new() -> Self {
        Self
    }

    /// Trim, lower-case, strip control characters, collapse whitespace.
    pub fn normalize(&self, text: &str) -> String {
        let lowered = text.trim().to_lowercase();
        let filtered: String = lowered
            .chars()
            .filter(|c| !c.is_control() || c.is_whitespace())
            .collect();

        let mut result = String::with_capacity(filtered.len());
        let mut prev_was_space = false;
        for ch in filtered.chars() {
            if ch.is_whitespace() {
                if !prev_was_space {
                    result.push(' ');
                    prev_was_space = true;
                }
            } else {
                result.push(ch);
                prev_was_space = false;
            }
        }
        result.trim().to_string()
    }

    /// Stable non-cryptographic 32-bit hash of the normalized text,
    /// rendered in base36 for the `embedding:<provider>:<model>:<hash>`
    /// cache key (§4.C).
    pub fn hash_base36(&self, text: &str) -> String {
        let normalized = self.normalize(text);
        let hash = farmhash::hash32(normalized.as_bytes());
        to_base36(hash)
    }
}

fn to_base36(mut value: u32) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while value > 0 {
        buf.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace_and_lowercases() {
        let service = TokenizerService::new();
        assert_eq!(service.normalize("  Hello   World  "), "hello world");
    }

    #[test]
    fn hash_is_stable_for_equivalent_whitespace() {
        let service = TokenizerService::new();
        assert_eq!(
            service.hash_base36("Hello World"),
            service.hash_base36("  hello   world  ")
        );
    }

    #[test]
    fn hash_differs_for_different_text() {
        let service = TokenizerService::new();
        assert_ne!(service.hash_base36("hello"), service.hash_base36("world"));
    }

    #[test]
    fn base36_round_trips_zero() {
        assert_eq!(to_base36(0), "0");
    }
}
