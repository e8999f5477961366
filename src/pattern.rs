//! Deterministic payload pattern generation and verification.
//!
//! The pattern is position-dependent: byte `i` is `i mod 256`. Two buffers
//! of the same length generate identically, and corrupted, truncated, or
//! misaligned data diverges at the point of damage. This is a correctness
//! fixture for the transfer path, not a codec in the compression or crypto
//! sense.

/// Fill `buf` with the pattern: byte `i` is `i mod 256`.
pub fn fill(buf: &mut [u8]) {
    for (i, b) in buf.iter_mut().enumerate() {
        *b = i as u8;
    }
}

/// Check `buf` against the pattern without mutating it.
pub fn verify(buf: &[u8]) -> bool {
    first_mismatch(buf).is_none()
}

/// Position of the first byte that deviates from the pattern, if any.
pub fn first_mismatch(buf: &[u8]) -> Option<usize> {
    buf.iter().enumerate().find(|&(i, &b)| b != i as u8).map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_follows_index_rule() {
        let mut buf = vec![0u8; 600];
        fill(&mut buf);
        for (i, &b) in buf.iter().enumerate() {
            assert_eq!(b, i as u8, "byte {i} must be {i} mod 256");
        }
        // Wraps at 256
        assert_eq!(buf[255], 255);
        assert_eq!(buf[256], 0);
        assert_eq!(buf[511], 255);
    }

    #[test]
    fn test_generated_buffers_verify() {
        for len in [4096, 32 * 1024, 1024 * 1024] {
            let mut buf = vec![0u8; len];
            fill(&mut buf);
            assert!(verify(&buf), "generated {len}-byte buffer must verify");
        }
    }

    #[test]
    fn test_fill_is_idempotent() {
        let mut a = vec![0u8; 4096];
        let mut b = vec![0xffu8; 4096];
        fill(&mut a);
        fill(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_verify_does_not_mutate() {
        let mut buf = vec![0u8; 1024];
        fill(&mut buf);
        let before = buf.clone();
        let _ = verify(&buf);
        assert_eq!(buf, before);
    }

    #[test]
    fn test_corruption_is_located() {
        let mut buf = vec![0u8; 4096];
        fill(&mut buf);

        buf[777] ^= 0x55;
        assert!(!verify(&buf));
        assert_eq!(first_mismatch(&buf), Some(777));

        // First divergence wins even with later damage too
        buf[3000] ^= 0x01;
        assert_eq!(first_mismatch(&buf), Some(777));
    }

    #[test]
    fn test_misaligned_data_diverges_immediately() {
        let mut buf = vec![0u8; 1024];
        fill(&mut buf);
        // Drop the first byte: everything shifts left by one
        buf.remove(0);
        assert_eq!(first_mismatch(&buf), Some(0));
    }

    #[test]
    fn test_empty_buffer_verifies() {
        assert!(verify(&[]));
        assert_eq!(first_mismatch(&[]), None);
    }
}
