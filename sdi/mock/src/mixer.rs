// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Deterministic keyed mixing primitives.
//!
//! None of this is cryptography. The requirements are determinism,
//! sensitivity to every key and input byte, and exact invertibility for the
//! block transform, which is what the dispatch tests need.

use secore_sdi::AlgoId;

/// Mock cipher block size in bytes.
pub(crate) const BLOCK: usize = 16;

const FOLD_SEED: u64 = 0xcbf2_9ce4_8422_2325;

// Domain tags keep the independent transforms from colliding on the same
// key material.
pub(crate) const DOMAIN_MAC: u64 = 0x4d41_43;
pub(crate) const DOMAIN_KS: u64 = 0x4b53;
pub(crate) const DOMAIN_AEAD_TAG: u64 = 0x5441_47;
pub(crate) const DOMAIN_AEAD_STREAM: u64 = 0x4145_53;
pub(crate) const DOMAIN_ASYM_SIG: u64 = 0x5349_47;
pub(crate) const DOMAIN_ASYM_STREAM: u64 = 0x4153_59;
pub(crate) const DOMAIN_DERIVE: u64 = 0x4b44_46;
pub(crate) const DOMAIN_PUBLIC: u64 = 0x5055_42;

fn mix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

/// Incremental byte folder with a squeezable 64-bit state.
///
/// Absorbing a byte stream in pieces yields the same state as absorbing the
/// concatenation, which is what ties the streaming entry points to their
/// one-shot counterparts.
pub(crate) struct Folder(u64);

impl Folder {
    pub(crate) fn new(domain: u64) -> Self {
        Folder(mix64(FOLD_SEED ^ domain))
    }

    pub(crate) fn from_state(state: u64) -> Self {
        Folder(state)
    }

    pub(crate) fn state(&self) -> u64 {
        self.0
    }

    pub(crate) fn absorb(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = mix64(self.0 ^ u64::from(b));
        }
    }

    /// Absorb with a length prefix, so adjacent fields cannot bleed into
    /// each other.
    pub(crate) fn absorb_framed(&mut self, bytes: &[u8]) {
        self.absorb(&(bytes.len() as u64).to_le_bytes());
        self.absorb(bytes);
    }

    pub(crate) fn squeeze(&self, out: &mut [u8]) {
        let mut s = self.0;
        for chunk in out.chunks_mut(8) {
            s = mix64(s);
            let bytes = s.to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

/// Folder seeded with a domain, the algorithm id, and the key material.
pub(crate) fn keyed(domain: u64, material: &[u8], alg: AlgoId) -> Folder {
    let mut f = Folder::new(domain);
    f.absorb(&(alg as u32).to_le_bytes());
    f.absorb_framed(material);
    f
}

/// Expand key material into the round keys for the block transform.
pub(crate) fn key_schedule(material: &[u8]) -> [u8; 32] {
    let mut f = Folder::new(DOMAIN_KS);
    f.absorb_framed(material);
    let mut ks = [0u8; 32];
    f.squeeze(&mut ks);
    ks
}

/// Forward block transform, two add-rotate-xor rounds. Exactly inverted by
/// [`block_decrypt`].
pub(crate) fn block_encrypt(ks: &[u8; 32], block: &mut [u8]) {
    debug_assert_eq!(block.len(), BLOCK);
    for round in 0..2 {
        let rk = &ks[round * BLOCK..][..BLOCK];
        for i in 0..BLOCK {
            block[i] ^= rk[i];
        }
        block.rotate_left(round + 3);
        for i in 0..BLOCK {
            block[i] = block[i].wrapping_add(rk[(i * 5 + 3) % BLOCK]);
        }
    }
}

/// Inverse of [`block_encrypt`].
pub(crate) fn block_decrypt(ks: &[u8; 32], block: &mut [u8]) {
    debug_assert_eq!(block.len(), BLOCK);
    for round in (0..2).rev() {
        let rk = &ks[round * BLOCK..][..BLOCK];
        for i in 0..BLOCK {
            block[i] = block[i].wrapping_sub(rk[(i * 5 + 3) % BLOCK]);
        }
        block.rotate_right(round + 3);
        for i in 0..BLOCK {
            block[i] ^= rk[i];
        }
    }
}

/// XOR the data with a keystream expanded from `seed`. Self-inverse.
pub(crate) fn stream_xor(seed: u64, data: &mut [u8]) {
    let mut s = seed;
    for chunk in data.chunks_mut(8) {
        s = mix64(s);
        let ks = s.to_le_bytes();
        for (b, k) in chunk.iter_mut().zip(ks.iter()) {
            *b ^= k;
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_folder_concatenation_property() {
        let mut whole = Folder::new(1);
        whole.absorb(b"hello world");

        let mut pieces = Folder::new(1);
        pieces.absorb(b"hello");
        pieces.absorb(b" ");
        pieces.absorb(b"world");

        assert_eq!(whole.state(), pieces.state());
    }

    #[test]
    fn test_folder_framing_separates_fields() {
        let mut a = Folder::new(1);
        a.absorb_framed(b"ab");
        a.absorb_framed(b"c");

        let mut b = Folder::new(1);
        b.absorb_framed(b"a");
        b.absorb_framed(b"bc");

        assert_ne!(a.state(), b.state());
    }

    #[test]
    fn test_block_transform_roundtrip() {
        let ks = key_schedule(b"0123456789abcdef");
        let mut block = *b"fedcba9876543210";
        let original = block;

        block_encrypt(&ks, &mut block);
        assert_ne!(block, original);
        block_decrypt(&ks, &mut block);
        assert_eq!(block, original);
    }

    #[test]
    fn test_block_transform_key_sensitivity() {
        let mut a = *b"0000000000000000";
        let mut b = *b"0000000000000000";
        block_encrypt(&key_schedule(b"key-one"), &mut a);
        block_encrypt(&key_schedule(b"key-two"), &mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn test_stream_xor_self_inverse() {
        let mut data = b"some data that is not block aligned".to_vec();
        let original = data.clone();
        stream_xor(42, &mut data);
        assert_ne!(data, original);
        stream_xor(42, &mut data);
        assert_eq!(data, original);
    }
}
