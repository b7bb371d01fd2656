// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The mock driver proper.

use std::time::Duration;

use parking_lot::Mutex;
use rand::RngCore;
use secore_sdi::AeadCaps;
use secore_sdi::AeadDriver;
use secore_sdi::AlgoId;
use secore_sdi::AsymCaps;
use secore_sdi::AsymDriver;
use secore_sdi::CipherCaps;
use secore_sdi::CipherDirection;
use secore_sdi::CipherDriver;
use secore_sdi::CollateralId;
use secore_sdi::DerivationCaps;
use secore_sdi::DerivationDriver;
use secore_sdi::DriverCapabilities;
use secore_sdi::KeyAttributes;
use secore_sdi::KeyKind;
use secore_sdi::KeyMgmtCaps;
use secore_sdi::KeyMgmtDriver;
use secore_sdi::KeySlot;
use secore_sdi::MacCaps;
use secore_sdi::MacDriver;
use secore_sdi::SdiError;
use secore_sdi::SdiResult;
use secore_sdi::SeDriver;
use tracing::debug;

use crate::mixer::block_decrypt;
use crate::mixer::block_encrypt;
use crate::mixer::key_schedule;
use crate::mixer::keyed;
use crate::mixer::stream_xor;
use crate::mixer::Folder;
use crate::mixer::BLOCK;
use crate::mixer::DOMAIN_AEAD_STREAM;
use crate::mixer::DOMAIN_AEAD_TAG;
use crate::mixer::DOMAIN_ASYM_SIG;
use crate::mixer::DOMAIN_ASYM_STREAM;
use crate::mixer::DOMAIN_DERIVE;
use crate::mixer::DOMAIN_MAC;
use crate::mixer::DOMAIN_PUBLIC;
use crate::state::CipherStream;
use crate::state::DerivationStream;
use crate::state::MacStream;
use crate::state::MockKey;
use crate::state::MockState;
use crate::state::Stream;

/// Context bytes the mock asks the core to allocate per session.
const CONTEXT_SIZE: usize = 16;

const CTX_MAGIC: u32 = 0x5345_4d4b;

fn write_ctx(ctx: &mut [u8], id: u64) -> SdiResult<()> {
    if ctx.len() < CONTEXT_SIZE {
        return Err(SdiError::InvalidArgument);
    }
    ctx[..4].copy_from_slice(&CTX_MAGIC.to_le_bytes());
    ctx[4..8].fill(0);
    ctx[8..16].copy_from_slice(&id.to_le_bytes());
    Ok(())
}

fn read_ctx(ctx: &[u8]) -> SdiResult<u64> {
    if ctx.len() < CONTEXT_SIZE {
        return Err(SdiError::InvalidArgument);
    }
    let magic = ctx[..4]
        .try_into()
        .map(u32::from_le_bytes)
        .map_err(|_| SdiError::InvalidArgument)?;
    if magic != CTX_MAGIC {
        return Err(SdiError::InvalidArgument);
    }
    ctx[8..16]
        .try_into()
        .map(u64::from_le_bytes)
        .map_err(|_| SdiError::InvalidArgument)
}

fn full_capabilities() -> DriverCapabilities {
    DriverCapabilities {
        mac: Some(MacCaps {
            context_size: CONTEXT_SIZE,
            setup: true,
            update: true,
            finish: true,
            finish_verify: true,
            abort: true,
            compute: true,
            verify: true,
        }),
        cipher: Some(CipherCaps {
            context_size: CONTEXT_SIZE,
            block_size: BLOCK,
            setup: true,
            set_iv: true,
            update: true,
            finish: true,
            abort: true,
            ecb: true,
        }),
        aead: Some(AeadCaps {
            encrypt: true,
            decrypt: true,
        }),
        asym: Some(AsymCaps {
            sign: true,
            verify: true,
            encrypt: true,
            decrypt: true,
        }),
        key_mgmt: Some(KeyMgmtCaps {
            import: true,
            generate: true,
            destroy: true,
            export: true,
            export_public: true,
        }),
        derivation: Some(DerivationCaps {
            context_size: CONTEXT_SIZE,
            setup: true,
            collateral: true,
            derive: true,
            export: true,
            abort: true,
        }),
    }
}

/// In-memory driver implementing every SDI category.
///
/// Builder methods strip capabilities or inject faults; the default
/// configuration populates everything.
pub struct MockDriver {
    caps: DriverCapabilities,
    fail_destroy: bool,
    op_delay: Mutex<Option<Duration>>,
    state: Mutex<MockState>,
}

impl MockDriver {
    /// Context size the driver declares in every capability table.
    ///
    /// Tests that hand-build a [`DriverCapabilities`] must use this value or
    /// the driver will reject the core's context buffers.
    pub const CONTEXT_SIZE: usize = CONTEXT_SIZE;

    /// A driver with every entry point populated.
    pub fn new() -> Self {
        MockDriver {
            caps: full_capabilities(),
            fail_destroy: false,
            op_delay: Mutex::new(None),
            state: Mutex::new(MockState::default()),
        }
    }

    /// Drop the whole MAC category.
    pub fn without_mac(mut self) -> Self {
        self.caps.mac = None;
        self
    }

    /// Keep the MAC multi-step flow but drop the one-shot entry points.
    pub fn without_mac_one_shot(mut self) -> Self {
        if let Some(mac) = self.caps.mac.as_mut() {
            mac.compute = false;
            mac.verify = false;
        }
        self
    }

    /// Keep only the raw ECB cipher entry point, leaving block-mode
    /// chaining to the core.
    pub fn without_cipher_multi_step(mut self) -> Self {
        if let Some(cipher) = self.caps.cipher.as_mut() {
            cipher.setup = false;
            cipher.set_iv = false;
            cipher.update = false;
            cipher.finish = false;
            cipher.abort = false;
        }
        self
    }

    /// Drop the whole AEAD category.
    pub fn without_aead(mut self) -> Self {
        self.caps.aead = None;
        self
    }

    /// Drop the raw key export entry point.
    pub fn without_key_export(mut self) -> Self {
        if let Some(key_mgmt) = self.caps.key_mgmt.as_mut() {
            key_mgmt.export = false;
        }
        self
    }

    /// Make every destroy call report a hardware fault without wiping.
    pub fn with_failing_destroy(mut self) -> Self {
        self.fail_destroy = true;
        self
    }

    /// Sleep for `delay` at the start of every entry point.
    pub fn with_op_delay(self, delay: Duration) -> Self {
        self.set_op_delay(Some(delay));
        self
    }

    /// Change the per-entry-point sleep on a live driver.
    ///
    /// Lets a test register the driver and load keys at full speed, then
    /// slow the data path down afterwards.
    pub fn set_op_delay(&self, delay: Option<Duration>) {
        *self.op_delay.lock() = delay;
    }

    /// Replace the capability declaration wholesale. Intended for tests
    /// that feed deliberately broken declarations to registration.
    pub fn with_capabilities(mut self, caps: DriverCapabilities) -> Self {
        self.caps = caps;
        self
    }

    fn delay(&self) {
        let delay = *self.op_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn mac_folder(key: &MockKey, alg: AlgoId) -> SdiResult<(Folder, usize)> {
    let mac_len = alg.mac_len().ok_or(SdiError::InvalidArgument)?;
    Ok((keyed(DOMAIN_MAC, &key.material, alg), mac_len))
}

impl MacDriver for MockDriver {
    fn mac_setup(&self, ctx: &mut [u8], key: KeySlot, alg: AlgoId) -> SdiResult<()> {
        self.delay();
        let mut state = self.state.lock();
        let (folder, mac_len) = mac_folder(state.key(key)?, alg)?;
        let id = state.new_stream(Stream::Mac(MacStream {
            state: folder.state(),
            mac_len,
        }));
        write_ctx(ctx, id)
    }

    fn mac_update(&self, ctx: &mut [u8], data: &[u8]) -> SdiResult<()> {
        self.delay();
        let id = read_ctx(ctx)?;
        let mut state = self.state.lock();
        match state.stream_mut(id)? {
            Stream::Mac(st) => {
                let mut folder = Folder::from_state(st.state);
                folder.absorb(data);
                st.state = folder.state();
                Ok(())
            }
            _ => Err(SdiError::InvalidArgument),
        }
    }

    fn mac_finish(&self, ctx: &mut [u8], out: &mut [u8]) -> SdiResult<usize> {
        self.delay();
        let id = read_ctx(ctx)?;
        let mut state = self.state.lock();
        let required = match state.stream_mut(id)? {
            Stream::Mac(st) => st.mac_len,
            _ => return Err(SdiError::InvalidArgument),
        };
        if out.len() < required {
            // The operation stays live so the caller can retry with a
            // larger buffer.
            return Err(SdiError::InsufficientBufferSize { required });
        }
        match state.take_stream(id)? {
            Stream::Mac(st) => {
                Folder::from_state(st.state).squeeze(&mut out[..required]);
                Ok(required)
            }
            _ => Err(SdiError::InvalidArgument),
        }
    }

    fn mac_finish_verify(&self, ctx: &mut [u8], expected: &[u8]) -> SdiResult<()> {
        self.delay();
        let id = read_ctx(ctx)?;
        let mut state = self.state.lock();
        match state.take_stream(id)? {
            Stream::Mac(st) => {
                let mut computed = vec![0u8; st.mac_len];
                Folder::from_state(st.state).squeeze(&mut computed);
                if computed.as_slice() != expected {
                    return Err(SdiError::InvalidSignature);
                }
                Ok(())
            }
            _ => Err(SdiError::InvalidArgument),
        }
    }

    fn mac_abort(&self, ctx: &mut [u8]) -> SdiResult<()> {
        let id = read_ctx(ctx)?;
        self.state.lock().discard_stream(id);
        Ok(())
    }

    fn mac_compute(
        &self,
        key: KeySlot,
        alg: AlgoId,
        data: &[u8],
        out: &mut [u8],
    ) -> SdiResult<usize> {
        self.delay();
        let state = self.state.lock();
        let (mut folder, mac_len) = mac_folder(state.key(key)?, alg)?;
        if out.len() < mac_len {
            return Err(SdiError::InsufficientBufferSize { required: mac_len });
        }
        folder.absorb(data);
        folder.squeeze(&mut out[..mac_len]);
        Ok(mac_len)
    }

    fn mac_verify(&self, key: KeySlot, alg: AlgoId, data: &[u8], expected: &[u8]) -> SdiResult<()> {
        self.delay();
        let state = self.state.lock();
        let (mut folder, mac_len) = mac_folder(state.key(key)?, alg)?;
        folder.absorb(data);
        let mut computed = vec![0u8; mac_len];
        folder.squeeze(&mut computed);
        if computed.as_slice() != expected {
            return Err(SdiError::InvalidSignature);
        }
        Ok(())
    }
}

fn process_blocks(st: &mut CipherStream, input: &[u8]) -> SdiResult<Vec<u8>> {
    st.started = true;
    if st.alg == AlgoId::AesCbc && !st.iv_set {
        return Err(SdiError::InvalidArgument);
    }
    st.buf.extend_from_slice(input);
    let whole = st.buf.len() - st.buf.len() % BLOCK;
    let mut out = Vec::with_capacity(whole);
    if whole == 0 {
        return Ok(out);
    }
    let blocks: Vec<u8> = st.buf.drain(..whole).collect();
    for block in blocks.chunks(BLOCK) {
        let mut b = [0u8; BLOCK];
        b.copy_from_slice(block);
        match (st.alg, st.dir) {
            (AlgoId::AesEcb, CipherDirection::Encrypt) => block_encrypt(&st.ks, &mut b),
            (AlgoId::AesEcb, CipherDirection::Decrypt) => block_decrypt(&st.ks, &mut b),
            (AlgoId::AesCbc, CipherDirection::Encrypt) => {
                for i in 0..BLOCK {
                    b[i] ^= st.chain[i];
                }
                block_encrypt(&st.ks, &mut b);
                st.chain.copy_from_slice(&b);
            }
            (AlgoId::AesCbc, CipherDirection::Decrypt) => {
                let cin = b;
                block_decrypt(&st.ks, &mut b);
                for i in 0..BLOCK {
                    b[i] ^= st.chain[i];
                }
                st.chain.copy_from_slice(&cin);
            }
            _ => return Err(SdiError::NotSupported),
        }
        out.extend_from_slice(&b);
    }
    Ok(out)
}

impl CipherDriver for MockDriver {
    fn cipher_setup(
        &self,
        ctx: &mut [u8],
        key: KeySlot,
        alg: AlgoId,
        dir: CipherDirection,
    ) -> SdiResult<()> {
        self.delay();
        if !matches!(alg, AlgoId::AesEcb | AlgoId::AesCbc) {
            return Err(SdiError::NotSupported);
        }
        let mut state = self.state.lock();
        let ks = key_schedule(&state.key(key)?.material);
        let id = state.new_stream(Stream::Cipher(CipherStream {
            ks,
            alg,
            dir,
            chain: Vec::new(),
            iv_set: false,
            started: false,
            buf: Vec::new(),
        }));
        write_ctx(ctx, id)
    }

    fn cipher_set_iv(&self, ctx: &mut [u8], iv: &[u8]) -> SdiResult<()> {
        self.delay();
        let id = read_ctx(ctx)?;
        let mut state = self.state.lock();
        match state.stream_mut(id)? {
            Stream::Cipher(st) => {
                if st.alg == AlgoId::AesEcb {
                    // ECB takes no IV.
                    return Err(SdiError::InvalidArgument);
                }
                if st.started || st.iv_set || iv.len() != BLOCK {
                    return Err(SdiError::InvalidArgument);
                }
                st.chain = iv.to_vec();
                st.iv_set = true;
                Ok(())
            }
            _ => Err(SdiError::InvalidArgument),
        }
    }

    fn cipher_update(&self, ctx: &mut [u8], input: &[u8]) -> SdiResult<Vec<u8>> {
        self.delay();
        let id = read_ctx(ctx)?;
        let mut state = self.state.lock();
        match state.stream_mut(id)? {
            Stream::Cipher(st) => process_blocks(st, input),
            _ => Err(SdiError::InvalidArgument),
        }
    }

    fn cipher_finish(&self, ctx: &mut [u8]) -> SdiResult<Vec<u8>> {
        self.delay();
        let id = read_ctx(ctx)?;
        let mut state = self.state.lock();
        match state.stream_mut(id)? {
            Stream::Cipher(st) => {
                if !st.buf.is_empty() {
                    // Unpadded block modes need whole blocks; the
                    // operation stays live for abort.
                    return Err(SdiError::InvalidArgument);
                }
            }
            _ => return Err(SdiError::InvalidArgument),
        }
        state.discard_stream(id);
        Ok(Vec::new())
    }

    fn cipher_abort(&self, ctx: &mut [u8]) -> SdiResult<()> {
        let id = read_ctx(ctx)?;
        self.state.lock().discard_stream(id);
        Ok(())
    }

    fn cipher_ecb(
        &self,
        key: KeySlot,
        alg: AlgoId,
        dir: CipherDirection,
        input: &[u8],
        output: &mut [u8],
    ) -> SdiResult<()> {
        self.delay();
        if alg != AlgoId::AesEcb {
            return Err(SdiError::InvalidArgument);
        }
        if input.len() != output.len() || input.len() % BLOCK != 0 {
            return Err(SdiError::InvalidArgument);
        }
        let state = self.state.lock();
        let ks = key_schedule(&state.key(key)?.material);
        for (i, block) in input.chunks(BLOCK).enumerate() {
            let mut b = [0u8; BLOCK];
            b.copy_from_slice(block);
            match dir {
                CipherDirection::Encrypt => block_encrypt(&ks, &mut b),
                CipherDirection::Decrypt => block_decrypt(&ks, &mut b),
            }
            output[i * BLOCK..][..BLOCK].copy_from_slice(&b);
        }
        Ok(())
    }
}

fn aead_stream_seed(material: &[u8], alg: AlgoId, nonce: &[u8]) -> u64 {
    let mut f = keyed(DOMAIN_AEAD_STREAM, material, alg);
    f.absorb_framed(nonce);
    f.state()
}

fn aead_tag(material: &[u8], alg: AlgoId, nonce: &[u8], aad: &[u8], ct: &[u8], tag: &mut [u8]) {
    let mut f = keyed(DOMAIN_AEAD_TAG, material, alg);
    f.absorb_framed(nonce);
    f.absorb_framed(aad);
    f.absorb_framed(ct);
    f.squeeze(tag);
}

impl AeadDriver for MockDriver {
    fn aead_encrypt(
        &self,
        key: KeySlot,
        alg: AlgoId,
        nonce: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> SdiResult<Vec<u8>> {
        self.delay();
        let tag_len = alg.tag_len().ok_or(SdiError::InvalidArgument)?;
        if nonce.is_empty() {
            return Err(SdiError::InvalidArgument);
        }
        let state = self.state.lock();
        let material = &state.key(key)?.material;

        let mut out = plaintext.to_vec();
        stream_xor(aead_stream_seed(material, alg, nonce), &mut out);

        let mut tag = vec![0u8; tag_len];
        aead_tag(material, alg, nonce, aad, &out, &mut tag);
        out.extend_from_slice(&tag);
        Ok(out)
    }

    fn aead_decrypt(
        &self,
        key: KeySlot,
        alg: AlgoId,
        nonce: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
    ) -> SdiResult<Vec<u8>> {
        self.delay();
        let tag_len = alg.tag_len().ok_or(SdiError::InvalidArgument)?;
        if ciphertext.len() < tag_len {
            return Err(SdiError::InvalidArgument);
        }
        let state = self.state.lock();
        let material = &state.key(key)?.material;

        let (ct, tag) = ciphertext.split_at(ciphertext.len() - tag_len);
        let mut expected = vec![0u8; tag_len];
        aead_tag(material, alg, nonce, aad, ct, &mut expected);
        if expected.as_slice() != tag {
            // Tag first; no plaintext leaves on mismatch.
            return Err(SdiError::AuthenticationFailure);
        }

        let mut out = ct.to_vec();
        stream_xor(aead_stream_seed(material, alg, nonce), &mut out);
        Ok(out)
    }
}

impl AsymDriver for MockDriver {
    fn asym_sign(
        &self,
        key: KeySlot,
        alg: AlgoId,
        hash: &[u8],
        sig: &mut [u8],
    ) -> SdiResult<usize> {
        self.delay();
        let state = self.state.lock();
        let key = state.key(key)?;
        let required = key
            .attrs
            .kind
            .signature_len()
            .ok_or(SdiError::InvalidArgument)?;
        if sig.len() < required {
            return Err(SdiError::InsufficientBufferSize { required });
        }
        let mut f = keyed(DOMAIN_ASYM_SIG, &key.material, alg);
        f.absorb_framed(hash);
        f.squeeze(&mut sig[..required]);
        Ok(required)
    }

    fn asym_verify(&self, key: KeySlot, alg: AlgoId, hash: &[u8], sig: &[u8]) -> SdiResult<()> {
        self.delay();
        let state = self.state.lock();
        let key = state.key(key)?;
        let required = key
            .attrs
            .kind
            .signature_len()
            .ok_or(SdiError::InvalidArgument)?;
        let mut f = keyed(DOMAIN_ASYM_SIG, &key.material, alg);
        f.absorb_framed(hash);
        let mut expected = vec![0u8; required];
        f.squeeze(&mut expected);
        if expected.as_slice() != sig {
            return Err(SdiError::InvalidSignature);
        }
        Ok(())
    }

    fn asym_encrypt(&self, key: KeySlot, alg: AlgoId, input: &[u8]) -> SdiResult<Vec<u8>> {
        self.delay();
        let state = self.state.lock();
        let key = state.key(key)?;
        let mut out = input.to_vec();
        stream_xor(keyed(DOMAIN_ASYM_STREAM, &key.material, alg).state(), &mut out);
        Ok(out)
    }

    fn asym_decrypt(&self, key: KeySlot, alg: AlgoId, input: &[u8]) -> SdiResult<Vec<u8>> {
        self.delay();
        let state = self.state.lock();
        let key = state.key(key)?;
        let mut out = input.to_vec();
        stream_xor(keyed(DOMAIN_ASYM_STREAM, &key.material, alg).state(), &mut out);
        Ok(out)
    }
}

impl KeyMgmtDriver for MockDriver {
    fn key_import(&self, slot: KeySlot, attrs: &KeyAttributes, data: &[u8]) -> SdiResult<()> {
        self.delay();
        if let Some(expected) = attrs.kind.material_len() {
            if data.len() != expected {
                return Err(SdiError::InvalidArgument);
            }
        }
        let mut state = self.state.lock();
        state.insert_key(
            slot,
            MockKey {
                attrs: *attrs,
                material: data.to_vec(),
            },
        )?;
        debug!(slot = slot.0, kind = ?attrs.kind, "mock: imported key");
        Ok(())
    }

    fn key_generate(&self, slot: KeySlot, attrs: &KeyAttributes) -> SdiResult<()> {
        self.delay();
        let len = attrs.kind.material_len().unwrap_or(64);
        let mut material = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut material);
        let mut state = self.state.lock();
        state.insert_key(
            slot,
            MockKey {
                attrs: *attrs,
                material,
            },
        )?;
        debug!(slot = slot.0, kind = ?attrs.kind, "mock: generated key");
        Ok(())
    }

    fn key_destroy(&self, slot: KeySlot) -> SdiResult<()> {
        self.delay();
        if self.fail_destroy {
            return Err(SdiError::HardwareFailure);
        }
        let mut state = self.state.lock();
        state.remove_key(slot)?;
        debug!(slot = slot.0, "mock: destroyed key");
        Ok(())
    }

    fn key_export(&self, slot: KeySlot) -> SdiResult<Vec<u8>> {
        self.delay();
        let state = self.state.lock();
        Ok(state.key(slot)?.material.clone())
    }

    fn key_export_public(&self, slot: KeySlot) -> SdiResult<Vec<u8>> {
        self.delay();
        let state = self.state.lock();
        let key = state.key(slot)?;
        let len = match key.attrs.kind {
            KeyKind::EccP256 => 65,
            KeyKind::Rsa2048 => 270,
            _ => return Err(SdiError::InvalidArgument),
        };
        let f = keyed(DOMAIN_PUBLIC, &key.material, key.attrs.alg);
        let mut out = vec![0u8; len];
        f.squeeze(&mut out);
        Ok(out)
    }
}

fn derived_material(st: &DerivationStream) -> Vec<u8> {
    let mut f = Folder::from_state(st.key_state);
    let mut items: Vec<_> = st.collateral.iter().collect();
    // Ordering between different collateral ids is insignificant.
    items.sort_by_key(|(id, _)| *id);
    for (id, data) in items {
        f.absorb(&id.0.to_le_bytes());
        f.absorb_framed(data);
    }
    f.absorb(&(st.dest_size as u64).to_le_bytes());
    let mut out = vec![0u8; st.dest_size];
    f.squeeze(&mut out);
    out
}

impl DerivationDriver for MockDriver {
    fn derivation_setup(
        &self,
        ctx: &mut [u8],
        source: KeySlot,
        alg: AlgoId,
        dest_size: usize,
    ) -> SdiResult<()> {
        self.delay();
        if !matches!(alg, AlgoId::HkdfSha256 | AlgoId::KbkdfCmac | AlgoId::EcdhP256) {
            return Err(SdiError::NotSupported);
        }
        if dest_size == 0 {
            return Err(SdiError::InvalidArgument);
        }
        let mut state = self.state.lock();
        let key_state = keyed(DOMAIN_DERIVE, &state.key(source)?.material, alg).state();
        let id = state.new_stream(Stream::Derivation(DerivationStream {
            key_state,
            dest_size,
            collateral: Vec::new(),
        }));
        write_ctx(ctx, id)
    }

    fn derivation_collateral(
        &self,
        ctx: &mut [u8],
        id: CollateralId,
        data: &[u8],
    ) -> SdiResult<()> {
        self.delay();
        let stream_id = read_ctx(ctx)?;
        let mut state = self.state.lock();
        match state.stream_mut(stream_id)? {
            Stream::Derivation(st) => {
                st.collateral.push((id, data.to_vec()));
                Ok(())
            }
            _ => Err(SdiError::InvalidArgument),
        }
    }

    fn derivation_derive(
        &self,
        ctx: &mut [u8],
        dest: KeySlot,
        attrs: &KeyAttributes,
    ) -> SdiResult<()> {
        self.delay();
        let stream_id = read_ctx(ctx)?;
        let mut state = self.state.lock();
        let material = match state.stream_mut(stream_id)? {
            Stream::Derivation(st) => {
                if let Some(expected) = attrs.kind.material_len() {
                    if expected != st.dest_size {
                        return Err(SdiError::InvalidArgument);
                    }
                }
                derived_material(st)
            }
            _ => return Err(SdiError::InvalidArgument),
        };
        state.insert_key(
            dest,
            MockKey {
                attrs: *attrs,
                material,
            },
        )?;
        state.discard_stream(stream_id);
        debug!(slot = dest.0, "mock: derived key");
        Ok(())
    }

    fn derivation_export(&self, ctx: &mut [u8]) -> SdiResult<Vec<u8>> {
        self.delay();
        let stream_id = read_ctx(ctx)?;
        let mut state = self.state.lock();
        let material = match state.stream_mut(stream_id)? {
            Stream::Derivation(st) => derived_material(st),
            _ => return Err(SdiError::InvalidArgument),
        };
        state.discard_stream(stream_id);
        Ok(material)
    }

    fn derivation_abort(&self, ctx: &mut [u8]) -> SdiResult<()> {
        let id = read_ctx(ctx)?;
        self.state.lock().discard_stream(id);
        Ok(())
    }
}

impl SeDriver for MockDriver {
    fn capabilities(&self) -> DriverCapabilities {
        self.caps
    }
}

#[cfg(test)]
mod tests {
    use secore_sdi::KeyUsage;
    use test_log::test;

    use super::*;

    const SLOT: KeySlot = KeySlot(1);

    fn mac_attrs() -> KeyAttributes {
        KeyAttributes {
            kind: KeyKind::HmacSha256,
            alg: AlgoId::HmacSha256,
            usage: KeyUsage::all(),
        }
    }

    fn driver_with_mac_key() -> MockDriver {
        let driver = MockDriver::new();
        driver.key_import(SLOT, &mac_attrs(), &[0x42; 32]).unwrap();
        driver
    }

    #[test]
    fn test_mac_compute_is_deterministic() {
        let driver = driver_with_mac_key();
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        driver
            .mac_compute(SLOT, AlgoId::HmacSha256, b"hello", &mut a)
            .unwrap();
        driver
            .mac_compute(SLOT, AlgoId::HmacSha256, b"hello", &mut b)
            .unwrap();
        assert_eq!(a, b);

        driver
            .mac_compute(SLOT, AlgoId::HmacSha256, b"hellp", &mut b)
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_streaming_mac_equals_one_shot() {
        let driver = driver_with_mac_key();
        let mut ctx = vec![0u8; CONTEXT_SIZE];
        driver
            .mac_setup(&mut ctx, SLOT, AlgoId::HmacSha256)
            .unwrap();
        driver.mac_update(&mut ctx, b"hel").unwrap();
        driver.mac_update(&mut ctx, b"lo").unwrap();
        let mut streamed = [0u8; 32];
        driver.mac_finish(&mut ctx, &mut streamed).unwrap();

        let mut oneshot = [0u8; 32];
        driver
            .mac_compute(SLOT, AlgoId::HmacSha256, b"hello", &mut oneshot)
            .unwrap();
        assert_eq!(streamed, oneshot);
    }

    #[test]
    fn test_garbage_context_rejected() {
        let driver = driver_with_mac_key();
        let mut ctx = vec![0u8; CONTEXT_SIZE];
        assert_eq!(
            driver.mac_update(&mut ctx, b"data").unwrap_err(),
            SdiError::InvalidArgument
        );
    }

    #[test]
    fn test_ecb_roundtrip_multi_block() {
        let driver = MockDriver::new();
        let attrs = KeyAttributes {
            kind: KeyKind::Aes256,
            alg: AlgoId::AesEcb,
            usage: KeyUsage::all(),
        };
        driver.key_import(SLOT, &attrs, &[7u8; 32]).unwrap();

        let plaintext = [0x5A; 48];
        let mut ciphertext = [0u8; 48];
        driver
            .cipher_ecb(
                SLOT,
                AlgoId::AesEcb,
                CipherDirection::Encrypt,
                &plaintext,
                &mut ciphertext,
            )
            .unwrap();
        assert_ne!(plaintext, ciphertext);

        let mut recovered = [0u8; 48];
        driver
            .cipher_ecb(
                SLOT,
                AlgoId::AesEcb,
                CipherDirection::Decrypt,
                &ciphertext,
                &mut recovered,
            )
            .unwrap();
        assert_eq!(plaintext, recovered);
    }

    #[test]
    fn test_aead_tag_covers_everything() {
        let driver = MockDriver::new();
        let attrs = KeyAttributes {
            kind: KeyKind::Aes256,
            alg: AlgoId::AesGcm,
            usage: KeyUsage::all(),
        };
        driver.key_import(SLOT, &attrs, &[9u8; 32]).unwrap();

        let ct = driver
            .aead_encrypt(SLOT, AlgoId::AesGcm, b"nonce", b"aad", b"secret payload")
            .unwrap();
        let pt = driver
            .aead_decrypt(SLOT, AlgoId::AesGcm, b"nonce", b"aad", &ct)
            .unwrap();
        assert_eq!(pt, b"secret payload");

        let mut tampered = ct.clone();
        let last = tampered.len() - 1;
        tampered[last] ^= 1;
        assert_eq!(
            driver
                .aead_decrypt(SLOT, AlgoId::AesGcm, b"nonce", b"aad", &tampered)
                .unwrap_err(),
            SdiError::AuthenticationFailure
        );
        assert_eq!(
            driver
                .aead_decrypt(SLOT, AlgoId::AesGcm, b"nonce", b"other aad", &ct)
                .unwrap_err(),
            SdiError::AuthenticationFailure
        );
    }
}
