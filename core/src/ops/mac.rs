// Copyright (C) Microsoft Corporation. All rights reserved.

//! MAC dispatch: the multi-step session and the one-shot entry points.

use secore_sdi::AlgoId;
use secore_sdi::KeyHandle;
use secore_sdi::MacCaps;
use tracing::debug;
use tracing::instrument;
use zeroize::Zeroize;

use crate::dispatch::ResolvedKey;
use crate::dispatch::SeCore;
use crate::error::SeError;
use crate::error::SeResult;
use crate::session::verdict_from;
use crate::session::SessionPhase;
use crate::session::Verdict;

struct ActiveMac {
    core: SeCore,
    key: ResolvedKey,
    alg: AlgoId,
    caps: MacCaps,
    ctx: Vec<u8>,
}

/// A multi-step MAC operation bound to one key.
///
/// Lifecycle: `Idle → setup → Active → update* → finish | finish_verify →
/// Finished`, or `abort → Aborted` from any non-terminal state. The key's
/// busy reservation is held from `setup` to the terminal transition; the
/// driver context is zeroized on every exit path, including drop.
///
/// A driver failure during `update` or a finish variant aborts the session:
/// the context is discarded and later calls fail with `InvalidState`. The
/// one exception is a too-small `finish` buffer, which leaves the session
/// active for a retry.
pub struct MacSession {
    phase: SessionPhase,
    active: Option<ActiveMac>,
}

impl MacSession {
    /// Creates an idle session with no key bound.
    pub fn new() -> Self {
        MacSession {
            phase: SessionPhase::Idle,
            active: None,
        }
    }

    /// Binds the session to a key and algorithm.
    ///
    /// Reserves the key, allocates the driver's declared context size and
    /// invokes the driver setup entry point. On any failure the reservation
    /// is released and the session stays `Idle`.
    ///
    /// # Arguments
    /// * `core` - The core the key lives in.
    /// * `key` - Handle of the MAC key.
    /// * `alg` - MAC algorithm to run.
    ///
    /// # Errors
    /// * `InvalidState` - the session already left `Idle`
    /// * `UnknownHandle` - the handle names no live key
    /// * `KeyBusy` - another operation holds the key
    /// * `NotPermitted` - the key allows neither sign nor verify
    /// * `NotSupported` - the driver has no multi-step MAC entry points
    #[instrument(skip_all, fields(key = key.0, algo = ?alg))]
    pub fn setup(&mut self, core: &SeCore, key: KeyHandle, alg: AlgoId) -> SeResult<()> {
        if self.phase != SessionPhase::Idle {
            return Err(SeError::InvalidState);
        }
        let resolved = core.reserve(key)?;
        let usage = resolved.attrs.usage;
        if !usage.sign && !usage.verify {
            return Err(SeError::NotPermitted);
        }
        let caps = resolved
            .driver
            .capabilities()
            .mac
            .ok_or(SeError::NotSupported)?;
        if !caps.setup {
            return Err(SeError::NotSupported);
        }

        let mut ctx = vec![0u8; caps.context_size];
        if let Err(err) = core.timed(|| resolved.driver.mac_setup(&mut ctx, resolved.slot, alg)) {
            ctx.zeroize();
            return Err(err);
        }

        self.active = Some(ActiveMac {
            core: core.clone(),
            key: resolved,
            alg,
            caps,
            ctx,
        });
        self.phase = SessionPhase::Active;
        debug!("mac session active");
        Ok(())
    }

    /// Feeds message bytes, in order, any number of times.
    ///
    /// # Errors
    /// * `InvalidState` - the session is not `Active`
    pub fn update(&mut self, data: &[u8]) -> SeResult<()> {
        let Some(s) = self.active.as_mut() else {
            return Err(SeError::InvalidState);
        };
        let result = s.core.timed(|| s.key.driver.mac_update(&mut s.ctx, data));
        if let Err(err) = result {
            self.fail();
            return Err(err);
        }
        Ok(())
    }

    /// Produces the MAC over everything fed so far. Terminal.
    ///
    /// # Arguments
    /// * `out` - Destination buffer; must hold the algorithm's MAC length.
    ///
    /// # Returns
    /// * Number of MAC bytes written.
    ///
    /// # Errors
    /// * `InvalidState` - the session is not `Active`
    /// * `NotPermitted` - the key does not allow signing
    /// * `InsufficientBufferSize` - `out` is too small; the session stays
    ///   active and the call can be repeated with a larger buffer
    #[instrument(skip_all)]
    pub fn finish(&mut self, out: &mut [u8]) -> SeResult<usize> {
        let Some(s) = self.active.as_mut() else {
            return Err(SeError::InvalidState);
        };
        if !s.key.attrs.usage.sign {
            return Err(SeError::NotPermitted);
        }
        if !s.caps.finish {
            return Err(SeError::NotSupported);
        }
        if let Some(required) = s.alg.mac_len() {
            if out.len() < required {
                return Err(SeError::InsufficientBufferSize { required });
            }
        }

        let result = s.core.timed(|| s.key.driver.mac_finish(&mut s.ctx, out));
        match result {
            Ok(written) => {
                self.complete();
                debug!(written, "mac session finished");
                Ok(written)
            }
            // The driver may know a size the core cannot compute.
            Err(SeError::InsufficientBufferSize { required }) => {
                Err(SeError::InsufficientBufferSize { required })
            }
            Err(err) => {
                self.fail();
                Err(err)
            }
        }
    }

    /// Compares the MAC over everything fed so far against `expected`.
    /// Terminal.
    ///
    /// # Returns
    /// * `Verdict::Match` - the MAC verifies
    /// * `Verdict::Mismatch` - it does not; this is data, not an error
    ///
    /// # Errors
    /// * `InvalidState` - the session is not `Active`
    /// * `NotPermitted` - the key does not allow verification
    #[instrument(skip_all)]
    pub fn finish_verify(&mut self, expected: &[u8]) -> SeResult<Verdict> {
        let Some(s) = self.active.as_mut() else {
            return Err(SeError::InvalidState);
        };
        if !s.key.attrs.usage.verify {
            return Err(SeError::NotPermitted);
        }

        let result = if s.caps.finish_verify {
            verdict_from(
                s.core
                    .timed(|| s.key.driver.mac_finish_verify(&mut s.ctx, expected)),
            )
        } else {
            // Drivers may omit finish_verify; finish and compare instead.
            let Some(len) = s.alg.mac_len() else {
                return Err(SeError::InvalidArgument);
            };
            let mut computed = vec![0u8; len];
            match s
                .core
                .timed(|| s.key.driver.mac_finish(&mut s.ctx, &mut computed))
            {
                Ok(written) => Ok(if computed[..written] == expected[..] {
                    Verdict::Match
                } else {
                    Verdict::Mismatch
                }),
                Err(err) => Err(err),
            }
        };

        match result {
            Ok(verdict) => {
                self.complete();
                debug!(?verdict, "mac session verified");
                Ok(verdict)
            }
            Err(err) => {
                self.fail();
                Err(err)
            }
        }
    }

    /// Abandons the operation and releases the context. Legal from `Idle`
    /// and `Active`; a second abort, or an abort after finish, is a caller
    /// error.
    ///
    /// Cleanup runs before any driver abort failure is propagated, so the
    /// session is terminal afterwards either way.
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
                let result = s.core.timed(|| s.key.driver.mac_abort(&mut s.ctx));
                s.ctx.zeroize();
                debug!("mac session aborted");
                result
            }
        }
    }

    fn complete(&mut self) {
        if let Some(mut s) = self.active.take() {
            s.ctx.zeroize();
        }
        self.phase = SessionPhase::Finished;
    }

    fn fail(&mut self) {
        self.discard();
        self.phase = SessionPhase::Aborted;
    }

    fn discard(&mut self) {
        if let Some(mut s) = self.active.take() {
            if let Err(err) = s.key.driver.mac_abort(&mut s.ctx) {
                debug!(?err, "driver context discard failed");
            }
            s.ctx.zeroize();
        }
    }
}

impl Default for MacSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MacSession {
    fn drop(&mut self) {
        if self.active.is_some() {
            debug!("mac session dropped while active");
            self.discard();
        }
    }
}

fn synth_digest(
    core: &SeCore,
    resolved: &ResolvedKey,
    context_size: usize,
    alg: AlgoId,
    data: &[u8],
    out: &mut [u8],
) -> SeResult<usize> {
    let driver = &resolved.driver;
    let mut ctx = vec![0u8; context_size];
    if let Err(err) = core.timed(|| driver.mac_setup(&mut ctx, resolved.slot, alg)) {
        ctx.zeroize();
        return Err(err);
    }
    let result = match core.timed(|| driver.mac_update(&mut ctx, data)) {
        Ok(()) => core.timed(|| driver.mac_finish(&mut ctx, out)),
        Err(err) => Err(err),
    };
    match result {
        Ok(written) => {
            ctx.zeroize();
            Ok(written)
        }
        Err(err) => {
            if let Err(abort_err) = driver.mac_abort(&mut ctx) {
                debug!(?abort_err, "driver context discard failed");
            }
            ctx.zeroize();
            Err(err)
        }
    }
}

fn synth_finish_verify(
    core: &SeCore,
    resolved: &ResolvedKey,
    context_size: usize,
    alg: AlgoId,
    data: &[u8],
    expected: &[u8],
) -> SeResult<Verdict> {
    let driver = &resolved.driver;
    let mut ctx = vec![0u8; context_size];
    if let Err(err) = core.timed(|| driver.mac_setup(&mut ctx, resolved.slot, alg)) {
        ctx.zeroize();
        return Err(err);
    }
    let result = match core.timed(|| driver.mac_update(&mut ctx, data)) {
        Ok(()) => verdict_from(core.timed(|| driver.mac_finish_verify(&mut ctx, expected))),
        Err(err) => Err(err),
    };
    match result {
        Ok(verdict) => {
            ctx.zeroize();
            Ok(verdict)
        }
        Err(err) => {
            if let Err(abort_err) = driver.mac_abort(&mut ctx) {
                debug!(?abort_err, "driver context discard failed");
            }
            ctx.zeroize();
            Err(err)
        }
    }
}

impl SeCore {
    /// Computes a MAC in one call.
    ///
    /// Takes the key's busy reservation for the duration, so it fails with
    /// `KeyBusy` while a session holds the key. If the driver lacks the
    /// one-shot entry point but has the multi-step ones, the core runs
    /// setup, update and finish itself; the result is identical.
    ///
    /// # Arguments
    /// * `key` - Handle of the MAC key.
    /// * `alg` - MAC algorithm.
    /// * `data` - The whole message.
    /// * `out` - Destination buffer for the MAC.
    ///
    /// # Returns
    /// * Number of MAC bytes written.
    ///
    /// # Errors
    /// * `KeyBusy` - an operation holds the key
    /// * `NotPermitted` - the key does not allow signing
    /// * `InsufficientBufferSize` - `out` is too small
    /// * `NotSupported` - the driver has no usable MAC entry points
    #[instrument(skip_all, fields(key = key.0, algo = ?alg))]
    pub fn mac_compute(
        &self,
        key: KeyHandle,
        alg: AlgoId,
        data: &[u8],
        out: &mut [u8],
    ) -> SeResult<usize> {
        let resolved = self.reserve(key)?;
        if !resolved.attrs.usage.sign {
            return Err(SeError::NotPermitted);
        }
        let caps = resolved
            .driver
            .capabilities()
            .mac
            .ok_or(SeError::NotSupported)?;
        if let Some(required) = alg.mac_len() {
            if out.len() < required {
                return Err(SeError::InsufficientBufferSize { required });
            }
        }
        if caps.compute {
            return self.timed(|| resolved.driver.mac_compute(resolved.slot, alg, data, out));
        }
        // Synthesis needs the declared finish slot; a verify-only driver
        // cannot produce a MAC value.
        if !caps.setup || !caps.finish {
            return Err(SeError::NotSupported);
        }
        synth_digest(self, &resolved, caps.context_size, alg, data, out)
    }

    /// Verifies a MAC in one call.
    ///
    /// Same reservation and synthesis rules as [`mac_compute`]; a driver
    /// without one-shot verify is driven through the multi-step flow, and a
    /// driver without `finish_verify` is finished and compared by the core.
    ///
    /// # Returns
    /// * `Verdict::Match` / `Verdict::Mismatch` - the comparison outcome
    ///
    /// # Errors
    /// * `KeyBusy` - an operation holds the key
    /// * `NotPermitted` - the key does not allow verification
    /// * `NotSupported` - the driver has no usable MAC entry points
    ///
    /// [`mac_compute`]: SeCore::mac_compute
    #[instrument(skip_all, fields(key = key.0, algo = ?alg))]
    pub fn mac_verify(
        &self,
        key: KeyHandle,
        alg: AlgoId,
        data: &[u8],
        expected: &[u8],
    ) -> SeResult<Verdict> {
        let resolved = self.reserve(key)?;
        if !resolved.attrs.usage.verify {
            return Err(SeError::NotPermitted);
        }
        let caps = resolved
            .driver
            .capabilities()
            .mac
            .ok_or(SeError::NotSupported)?;
        if caps.verify {
            return verdict_from(
                self.timed(|| resolved.driver.mac_verify(resolved.slot, alg, data, expected)),
            );
        }
        if !caps.setup {
            return Err(SeError::NotSupported);
        }
        if !caps.finish {
            // Capability validation guarantees finish_verify here.
            return synth_finish_verify(self, &resolved, caps.context_size, alg, data, expected);
        }

        let required = alg.mac_len().ok_or(SeError::InvalidArgument)?;
        let mut computed = vec![0u8; required];
        let written = synth_digest(self, &resolved, caps.context_size, alg, data, &mut computed)?;
        Ok(if computed[..written] == expected[..] {
            Verdict::Match
        } else {
            Verdict::Mismatch
        })
    }
}
