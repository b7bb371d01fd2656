// Copyright (C) Microsoft Corporation. All rights reserved.

//! Cipher dispatch: the multi-step session and the core-owned block mode
//! chaining fallback over a driver's stateless ECB entry point.

use std::sync::Arc;

use secore_sdi::AlgoId;
use secore_sdi::CipherDirection;
use secore_sdi::KeyHandle;
use secore_sdi::KeySlot;
use secore_sdi::SeDriver;
use tracing::debug;
use tracing::instrument;
use zeroize::Zeroize;

use crate::dispatch::ResolvedKey;
use crate::dispatch::SeCore;
use crate::error::SeError;
use crate::error::SeResult;
use crate::session::SessionPhase;

/// Core-run block mode scheduling over a driver's ECB entry point.
///
/// The driver only ever sees whole-block ECB calls; IV handling, the CBC
/// chain value and partial-block buffering live here and are wiped with the
/// session.
struct BlockChain {
    slot: KeySlot,
    alg: AlgoId,
    dir: CipherDirection,
    block: usize,
    chain: Vec<u8>,
    buf: Vec<u8>,
}

impl BlockChain {
    fn new(slot: KeySlot, alg: AlgoId, dir: CipherDirection, block: usize) -> Self {
        BlockChain {
            slot,
            alg,
            dir,
            block,
            chain: Vec::new(),
            buf: Vec::new(),
        }
    }

    fn set_iv(&mut self, iv: &[u8]) -> SeResult<()> {
        if self.alg == AlgoId::AesEcb || iv.len() != self.block {
            return Err(SeError::InvalidArgument);
        }
        self.chain = iv.to_vec();
        Ok(())
    }

    fn update(
        &mut self,
        core: &SeCore,
        driver: &Arc<dyn SeDriver>,
        input: &[u8],
    ) -> SeResult<Vec<u8>> {
        if self.alg == AlgoId::AesCbc && self.chain.is_empty() {
            // No IV was installed; same surface as a driver-run CBC.
            return Err(SeError::InvalidArgument);
        }
        self.buf.extend_from_slice(input);
        let whole = self.buf.len() - self.buf.len() % self.block;
        if whole == 0 {
            return Ok(Vec::new());
        }
        let pending: Vec<u8> = self.buf.drain(..whole).collect();

        match (self.alg, self.dir) {
            (AlgoId::AesEcb, _) => {
                let mut out = vec![0u8; pending.len()];
                core.timed(|| {
                    driver.cipher_ecb(self.slot, AlgoId::AesEcb, self.dir, &pending, &mut out)
                })?;
                Ok(out)
            }
            (AlgoId::AesCbc, CipherDirection::Encrypt) => {
                let mut out = Vec::with_capacity(pending.len());
                for block in pending.chunks(self.block) {
                    let mut xored: Vec<u8> = block
                        .iter()
                        .zip(self.chain.iter())
                        .map(|(p, c)| p ^ c)
                        .collect();
                    let mut enc = vec![0u8; self.block];
                    core.timed(|| {
                        driver.cipher_ecb(
                            self.slot,
                            AlgoId::AesEcb,
                            CipherDirection::Encrypt,
                            &xored,
                            &mut enc,
                        )
                    })?;
                    xored.zeroize();
                    self.chain.copy_from_slice(&enc);
                    out.extend_from_slice(&enc);
                }
                Ok(out)
            }
            (AlgoId::AesCbc, CipherDirection::Decrypt) => {
                let mut out = vec![0u8; pending.len()];
                core.timed(|| {
                    driver.cipher_ecb(
                        self.slot,
                        AlgoId::AesEcb,
                        CipherDirection::Decrypt,
                        &pending,
                        &mut out,
                    )
                })?;
                for (i, block) in out.chunks_mut(self.block).enumerate() {
                    for (j, byte) in block.iter_mut().enumerate() {
                        *byte ^= self.chain[j];
                    }
                    let start = i * self.block;
                    self.chain
                        .copy_from_slice(&pending[start..start + self.block]);
                }
                Ok(out)
            }
            // Setup only routes whole-block modes here.
            _ => Err(SeError::NotSupported),
        }
    }

    fn finish(&mut self) -> SeResult<Vec<u8>> {
        if !self.buf.is_empty() {
            // Unpadded block modes need whole blocks.
            return Err(SeError::InvalidArgument);
        }
        Ok(Vec::new())
    }

    fn wipe(&mut self) {
        self.chain.zeroize();
        self.buf.zeroize();
    }
}

enum Engine {
    /// Driver-run multi-step context.
    Native { ctx: Vec<u8> },
    /// Core-run chaining over driver ECB.
    Chained(BlockChain),
}

struct ActiveCipher {
    core: SeCore,
    key: ResolvedKey,
    iv_set: bool,
    started: bool,
    engine: Engine,
}

/// A multi-step symmetric cipher operation bound to one key.
///
/// Lifecycle mirrors [`MacSession`](crate::MacSession): `Idle → setup →
/// Active → update* → finish → Finished`, with `abort` from any
/// non-terminal state and implicit abort on drop.
///
/// When the driver has no multi-step cipher entry points but populates the
/// stateless ECB one, `setup` for a whole-block mode silently switches to
/// the core's own chaining engine; callers cannot tell the difference and
/// the bytes produced are identical.
pub struct CipherSession {
    phase: SessionPhase,
    active: Option<ActiveCipher>,
}

impl CipherSession {
    /// Creates an idle session with no key bound.
    pub fn new() -> Self {
        CipherSession {
            phase: SessionPhase::Idle,
            active: None,
        }
    }

    /// Binds the session to a key, algorithm and direction.
    ///
    /// # Arguments
    /// * `core` - The core the key lives in.
    /// * `key` - Handle of the cipher key.
    /// * `alg` - Cipher algorithm (mode included).
    /// * `dir` - Encrypt or decrypt.
    ///
    /// # Errors
    /// * `InvalidState` - the session already left `Idle`
    /// * `KeyBusy` - another operation holds the key
    /// * `NotPermitted` - the key does not allow the direction
    /// * `NotSupported` - neither the driver nor the fallback covers `alg`
    #[instrument(skip_all, fields(key = key.0, algo = ?alg, dir = ?dir))]
    pub fn setup(
        &mut self,
        core: &SeCore,
        key: KeyHandle,
        alg: AlgoId,
        dir: CipherDirection,
    ) -> SeResult<()> {
        if self.phase != SessionPhase::Idle {
            return Err(SeError::InvalidState);
        }
        let resolved = core.reserve(key)?;
        let usage = resolved.attrs.usage;
        let permitted = match dir {
            CipherDirection::Encrypt => usage.encrypt,
            CipherDirection::Decrypt => usage.decrypt,
        };
        if !permitted {
            return Err(SeError::NotPermitted);
        }
        let caps = resolved
            .driver
            .capabilities()
            .cipher
            .ok_or(SeError::NotSupported)?;

        let engine = if caps.setup {
            let mut ctx = vec![0u8; caps.context_size];
            if let Err(err) =
                core.timed(|| resolved.driver.cipher_setup(&mut ctx, resolved.slot, alg, dir))
            {
                ctx.zeroize();
                return Err(err);
            }
            Engine::Native { ctx }
        } else if caps.ecb && alg.is_block_mode() {
            Engine::Chained(BlockChain::new(resolved.slot, alg, dir, caps.block_size))
        } else {
            return Err(SeError::NotSupported);
        };

        self.active = Some(ActiveCipher {
            core: core.clone(),
            key: resolved,
            iv_set: false,
            started: false,
            engine,
        });
        self.phase = SessionPhase::Active;
        debug!("cipher session active");
        Ok(())
    }

    /// Installs the IV. Legal exactly once, before the first `update`.
    ///
    /// Whether the mode needs an IV at all is driver knowledge; omitting a
    /// required one surfaces as the driver's error at update time.
    ///
    /// # Errors
    /// * `InvalidState` - not `Active`, already set, or data already fed
    /// * `InvalidArgument` - the mode takes no IV or the length is wrong
    pub fn set_iv(&mut self, iv: &[u8]) -> SeResult<()> {
        let Some(s) = self.active.as_mut() else {
            return Err(SeError::InvalidState);
        };
        if s.iv_set || s.started {
            return Err(SeError::InvalidState);
        }
        match &mut s.engine {
            Engine::Native { ctx } => s.core.timed(|| s.key.driver.cipher_set_iv(ctx, iv))?,
            Engine::Chained(chain) => chain.set_iv(iv)?,
        }
        s.iv_set = true;
        Ok(())
    }

    /// Feeds input bytes and returns whatever output is ready.
    ///
    /// Block modes hold back partial blocks, so the returned buffer may be
    /// empty or shorter than the input.
    ///
    /// # Errors
    /// * `InvalidState` - the session is not `Active`
    pub fn update(&mut self, input: &[u8]) -> SeResult<Vec<u8>> {
        let Some(s) = self.active.as_mut() else {
            return Err(SeError::InvalidState);
        };
        s.started = true;
        let result = match &mut s.engine {
            Engine::Native { ctx } => s.core.timed(|| s.key.driver.cipher_update(ctx, input)),
            Engine::Chained(chain) => chain.update(&s.core, &s.key.driver, input),
        };
        match result {
            Ok(out) => Ok(out),
            Err(err) => {
                self.fail();
                Err(err)
            }
        }
    }

    /// Completes the operation and returns any final output. Terminal.
    ///
    /// # Errors
    /// * `InvalidState` - the session is not `Active`
    /// * `InvalidArgument` - a trailing partial block remains (no padding
    ///   in scope)
    #[instrument(skip_all)]
    pub fn finish(&mut self) -> SeResult<Vec<u8>> {
        let Some(s) = self.active.as_mut() else {
            return Err(SeError::InvalidState);
        };
        let result = match &mut s.engine {
            Engine::Native { ctx } => s.core.timed(|| s.key.driver.cipher_finish(ctx)),
            Engine::Chained(chain) => chain.finish(),
        };
        match result {
            Ok(tail) => {
                self.complete();
                debug!("cipher session finished");
                Ok(tail)
            }
            Err(err) => {
                self.fail();
                Err(err)
            }
        }
    }

    /// Abandons the operation and releases the context. Legal from `Idle`
    /// and `Active`; terminal states reject it.
    ///
    /// # Errors
    /// * `InvalidState` - the session is already terminal
    #[instrument(skip_all)]
    pub fn abort(&mut self) -> SeResult<()> {
        match self.phase {
            SessionPhase::Finished | SessionPhase::Aborted => Err(SeError::InvalidState),
            SessionPhase::Idle => {
                self.phase = SessionPhase::Aborted;
                Ok(())
            }
            SessionPhase::Active => {
                self.phase = SessionPhase::Aborted;
                let Some(mut s) = self.active.take() else {
                    return Ok(());
                };
                let result = match &mut s.engine {
                    Engine::Native { ctx } => {
                        let result = s.core.timed(|| s.key.driver.cipher_abort(ctx));
                        ctx.zeroize();
                        result
                    }
                    Engine::Chained(chain) => {
                        chain.wipe();
                        Ok(())
                    }
                };
                debug!("cipher session aborted");
                result
            }
        }
    }

    fn complete(&mut self) {
        if let Some(mut s) = self.active.take() {
            match &mut s.engine {
                Engine::Native { ctx } => ctx.zeroize(),
                Engine::Chained(chain) => chain.wipe(),
            }
        }
        self.phase = SessionPhase::Finished;
    }

    fn fail(&mut self) {
        self.discard();
        self.phase = SessionPhase::Aborted;
    }

    fn discard(&mut self) {
        if let Some(mut s) = self.active.take() {
            match &mut s.engine {
                Engine::Native { ctx } => {
                    if let Err(err) = s.key.driver.cipher_abort(ctx) {
                        debug!(?err, "driver context discard failed");
                    }
                    ctx.zeroize();
                }
                Engine::Chained(chain) => chain.wipe(),
            }
        }
    }
}

impl Default for CipherSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CipherSession {
    fn drop(&mut self) {
        if self.active.is_some() {
            debug!("cipher session dropped while active");
            self.discard();
        }
    }
}
