//! Re-entrancy guard for the transport pump.
//!
//! The simulation thread and an optional background thread may both want to
//! pump the carrier; a single try-lock arbitrates. A skipped pump is fine,
//! the loser simply retries on its next call. The minimal-update flag is the
//! cooperative handoff: the simulation thread raises it around long blocking
//! work (level loads), and only while it is up does the background helper
//! pump at all.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, TryLockError,
};

use crate::carrier::Carrier;

#[derive(Clone, Default)]
pub struct SharedPumpLock {
    lock: Arc<Mutex<()>>,
    minimal_update: Arc<AtomicBool>,
}

impl SharedPumpLock {
    pub fn new() -> SharedPumpLock {
        SharedPumpLock::default()
    }

    /// Pumps the carrier if no other thread is pumping right now. Returns
    /// whether the pump ran. A poisoned lock is still a valid lock; the
    /// guard data is `()` so there is no state to mistrust.
    pub fn pump_if_free(&self, carrier: &mut dyn Carrier) -> bool {
        let _guard = match self.lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return false,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        carrier.pump();
        true
    }

    pub fn enter_minimal_update(&self) {
        self.minimal_update.store(true, Ordering::Release);
    }

    pub fn leave_minimal_update(&self) {
        self.minimal_update.store(false, Ordering::Release);
    }

    pub fn in_minimal_update(&self) -> bool {
        self.minimal_update.load(Ordering::Acquire)
    }

    /// Background-thread helper: pumps only while the simulation thread has
    /// the minimal-update flag raised.
    pub fn background_pump(&self, carrier: &mut dyn Carrier) -> bool {
        if !self.in_minimal_update() {
            return false;
        }
        self.pump_if_free(carrier)
    }
}
