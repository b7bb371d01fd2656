// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock driver interior state: the key store and live stream table.

use std::collections::HashMap;

use secore_sdi::AlgoId;
use secore_sdi::CipherDirection;
use secore_sdi::CollateralId;
use secore_sdi::KeyAttributes;
use secore_sdi::KeySlot;
use secore_sdi::SdiError;
use secore_sdi::SdiResult;
use zeroize::Zeroize;

/// One stored key.
#[derive(Debug)]
pub(crate) struct MockKey {
    pub attrs: KeyAttributes,
    pub material: Vec<u8>,
}

/// Multi-step MAC state: the folder state after key and preceding data.
#[derive(Debug)]
pub(crate) struct MacStream {
    pub state: u64,
    pub mac_len: usize,
}

/// Multi-step cipher state.
#[derive(Debug)]
pub(crate) struct CipherStream {
    pub ks: [u8; 32],
    pub alg: AlgoId,
    pub dir: CipherDirection,
    pub chain: Vec<u8>,
    pub iv_set: bool,
    pub started: bool,
    pub buf: Vec<u8>,
}

impl CipherStream {
    pub(crate) fn wipe(&mut self) {
        self.ks.zeroize();
        self.chain.zeroize();
        self.buf.zeroize();
    }
}

/// Derivation state: folded source key plus collected collateral.
#[derive(Debug)]
pub(crate) struct DerivationStream {
    pub key_state: u64,
    pub dest_size: usize,
    pub collateral: Vec<(CollateralId, Vec<u8>)>,
}

impl DerivationStream {
    pub(crate) fn wipe(&mut self) {
        for (_, data) in self.collateral.iter_mut() {
            data.zeroize();
        }
    }
}

#[derive(Debug)]
pub(crate) enum Stream {
    Mac(MacStream),
    Cipher(CipherStream),
    Derivation(DerivationStream),
}

/// Everything behind the mock's lock.
#[derive(Default)]
pub(crate) struct MockState {
    keys: HashMap<KeySlot, MockKey>,
    streams: HashMap<u64, Stream>,
    next_stream: u64,
}

impl MockState {
    pub(crate) fn key(&self, slot: KeySlot) -> SdiResult<&MockKey> {
        self.keys.get(&slot).ok_or(SdiError::EmptySlot)
    }

    pub(crate) fn insert_key(&mut self, slot: KeySlot, key: MockKey) -> SdiResult<()> {
        if self.keys.contains_key(&slot) {
            return Err(SdiError::OccupiedSlot);
        }
        self.keys.insert(slot, key);
        Ok(())
    }

    pub(crate) fn remove_key(&mut self, slot: KeySlot) -> SdiResult<()> {
        let mut key = self.keys.remove(&slot).ok_or(SdiError::EmptySlot)?;
        key.material.zeroize();
        Ok(())
    }

    pub(crate) fn new_stream(&mut self, stream: Stream) -> u64 {
        self.next_stream += 1;
        let id = self.next_stream;
        self.streams.insert(id, stream);
        id
    }

    pub(crate) fn stream_mut(&mut self, id: u64) -> SdiResult<&mut Stream> {
        self.streams.get_mut(&id).ok_or(SdiError::InvalidArgument)
    }

    pub(crate) fn take_stream(&mut self, id: u64) -> SdiResult<Stream> {
        self.streams.remove(&id).ok_or(SdiError::InvalidArgument)
    }

    /// Drop a stream if it is still live. Abort paths tolerate a stream
    /// that already ended.
    pub(crate) fn discard_stream(&mut self, id: u64) {
        if let Some(mut stream) = self.streams.remove(&id) {
            match &mut stream {
                Stream::Cipher(c) => c.wipe(),
                Stream::Derivation(d) => d.wipe(),
                Stream::Mac(_) => {}
            }
        }
    }
}
