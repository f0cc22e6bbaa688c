//! Random payloads
//!
//! Payloads are drawn from the 52 ASCII letters, so a frame stays printable
//! when a link is being debugged with a terminal.

use rand::Rng;

/// Characters a payload is drawn from
pub const ALPHABET: &[u8; 52] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generate `len` random letters using the supplied generator
pub fn generate<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_exact_length() {
        let mut rng = StdRng::seed_from_u64(7);
        for len in [0, 1, 4, 52, 1000] {
            assert_eq!(generate(&mut rng, len).len(), len);
        }
    }

    #[test]
    fn test_letters_only() {
        let mut rng = StdRng::seed_from_u64(42);
        let payload = generate(&mut rng, 5000);
        assert!(payload.bytes().all(|b| b.is_ascii_alphabetic()));
    }

    #[test]
    fn test_seeded_is_deterministic() {
        let a = generate(&mut StdRng::seed_from_u64(1), 64);
        let b = generate(&mut StdRng::seed_from_u64(1), 64);
        assert_eq!(a, b);
    }

    #[test]
    fn test_successive_calls_differ() {
        let mut rng = StdRng::seed_from_u64(3);
        let a = generate(&mut rng, 32);
        let b = generate(&mut rng, 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_uses_whole_alphabet() {
        let mut rng = StdRng::seed_from_u64(99);
        let payload = generate(&mut rng, 20_000);
        for &c in ALPHABET.iter() {
            assert!(payload.as_bytes().contains(&c), "letter {} never drawn", c as char);
        }
    }
}
