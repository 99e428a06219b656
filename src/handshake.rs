//! Init handshake.
//!
//! Once per session the peer receives an init record before any other call.
//! The state moves `Idle -> PendingSend -> Sent`; an explicit re-init request
//! moves it back to `PendingSend` for exactly one more fetch and emit.

use std::sync::{Mutex, MutexGuard, PoisonError};

use callbridge_protocol::Value;
use tracing::debug;

/// Phase of the init handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitPhase {
    /// Nothing requested or fetched yet.
    Idle,
    /// Init params are fetched, or will be at the next exchange.
    PendingSend,
    /// Init was written to the peer and is still authoritative.
    Sent,
}

#[derive(Debug, Default)]
struct InitState {
    requested: bool,
    pending: Option<Vec<Option<Value>>>,
    sent: bool,
    /// Bumped by every re-init request.
    epoch: u64,
}

impl InitState {
    fn phase(&self) -> InitPhase {
        if self.pending.is_some() || (self.requested && !self.sent) {
            InitPhase::PendingSend
        } else if self.sent {
            InitPhase::Sent
        } else {
            InitPhase::Idle
        }
    }
}

/// What the next outbound batch carries for init.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitEmission {
    /// Init record to write before any queued call.
    pub params: Option<Vec<Option<Value>>>,
    /// Write the "init already sent" marker.
    pub already_sent: bool,
    /// Re-init epoch the emission was prepared in; pass it to
    /// [`InitController::commit`].
    pub epoch: u64,
}

/// Tracks the init handshake of one session.
#[derive(Debug, Default)]
pub struct InitController {
    state: Mutex<InitState>,
}

impl InitController {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, InitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> InitPhase {
        self.lock().phase()
    }

    /// Returns true if init params are waiting to be written.
    pub fn has_pending(&self) -> bool {
        self.lock().pending.is_some()
    }

    /// Store freshly fetched params unless some are already pending.
    ///
    /// `fetch` runs without the state lock held. If two fetches race, the
    /// first stored wins.
    fn fetch_into_pending<F>(&self, fetch: F) -> bool
    where
        F: FnOnce() -> Vec<Option<Value>>,
    {
        if self.lock().pending.is_some() {
            return false;
        }
        let params = fetch();
        let mut state = self.lock();
        if state.pending.is_some() {
            return false;
        }
        state.pending = Some(params);
        true
    }

    /// The peer asked for init.
    ///
    /// Fetches params unless a fetch is already pending. Returns true if a
    /// fetch happened.
    pub fn on_peer_request<F>(&self, fetch: F) -> bool
    where
        F: FnOnce() -> Vec<Option<Value>>,
    {
        let fetched = self.fetch_into_pending(fetch);
        debug!(fetched, "peer requested init");
        fetched
    }

    /// Force the init handshake to run again at the next exchange.
    pub fn request_reinit(&self) {
        let mut state = self.lock();
        state.sent = false;
        state.requested = true;
        state.epoch = state.epoch.wrapping_add(1);
        debug!(epoch = state.epoch, "init re-requested");
    }

    /// Decide what the next outbound batch carries.
    ///
    /// Fetches params first if init was never sent this session and either
    /// `eager` is set or a re-init was requested. Pending params stay pending
    /// until [`commit`](Self::commit) confirms they were written.
    pub fn prepare<F>(&self, eager: bool, fetch: F) -> InitEmission
    where
        F: FnOnce() -> Vec<Option<Value>>,
    {
        let needs_fetch = {
            let state = self.lock();
            !state.sent && state.pending.is_none() && (eager || state.requested)
        };
        if needs_fetch {
            self.fetch_into_pending(fetch);
        }

        let state = self.lock();
        InitEmission {
            params: state.pending.clone(),
            already_sent: state.sent && state.pending.is_none(),
            epoch: state.epoch,
        }
    }

    /// The init record prepared in `epoch` was written to the peer.
    ///
    /// A re-init requested since then keeps the handshake pending, so the
    /// next exchange fetches and sends fresh params.
    pub fn commit(&self, epoch: u64) {
        let mut state = self.lock();
        state.pending = None;
        if state.epoch == epoch {
            state.sent = true;
            state.requested = false;
        } else {
            debug!(prepared = epoch, current = state.epoch, "init superseded while being sent");
        }
    }
}
