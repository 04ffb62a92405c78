//! Process-wide crypto runtime: one-time initialisation, lock table, and teardown.
//!
//! [`init_static_state`] must run once before the cipher factory or the random
//! source is used, and [`cleanup_static_state`] once per successful init when the
//! process is done with cryptography. Both are idempotent and reference counted,
//! and neither may be called from inside a crypto operation. [`CryptoRuntime`]
//! pairs the two as an RAII guard.
//!
//! Initialisation probes the OS random source (the equivalent of seeding) and
//! allocates a flat table holding one lock per [`LockSlot`]. Callers never index
//! the table; they go through [`with_slot`].

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::{Arc, Mutex, PoisonError},
};

use aes_gcm::aead::{rand_core::RngCore, OsRng};
use tracing::{debug, info, trace, warn};

use super::error::CipherError;

/// Internal resources serialised through the runtime lock table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LockSlot {
    /// Draws from the OS random source.
    Random = 0,
    /// Content key and IV generation.
    KeyGeneration = 1,
}

impl LockSlot {
    /// Number of slots; the lock table has exactly this many entries.
    pub(crate) const COUNT: usize = 2;
}

struct RuntimeState {
    refs: usize,
    locks: Arc<[Mutex<()>]>,
}

static RUNTIME: Mutex<Option<RuntimeState>> = Mutex::new(None);

/// Initialise the crypto runtime, or add a reference if it is already initialised.
///
/// # Errors
///
/// Returns [`CipherError::RandomSourceFailure`] if the OS random source cannot
/// produce bytes. The runtime stays uninitialised in that case.
pub fn init_static_state() -> Result<(), CipherError> {
    let mut guard = RUNTIME.lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(state) = guard.as_mut() {
        state.refs += 1;
        debug!(refs = state.refs, "crypto runtime already initialised");
        return Ok(());
    }

    let mut probe = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut probe)
        .map_err(|e| CipherError::RandomSourceFailure(e.to_string()))?;
    probe.iter_mut().for_each(|b| *b = 0);

    let locks: Arc<[Mutex<()>]> = (0..LockSlot::COUNT).map(|_| Mutex::new(())).collect();
    *guard = Some(RuntimeState { refs: 1, locks });

    info!(lock_slots = LockSlot::COUNT, "crypto runtime initialised");
    Ok(())
}

/// Drop one reference to the crypto runtime, tearing it down when none remain.
///
/// Calling this without a matching init is a no-op.
pub fn cleanup_static_state() {
    let mut guard = RUNTIME.lock().unwrap_or_else(PoisonError::into_inner);

    match guard.as_mut() {
        None => warn!("crypto runtime cleanup without matching init"),
        Some(state) if state.refs > 1 => {
            state.refs -= 1;
            debug!(refs = state.refs, "crypto runtime reference released");
        }
        Some(_) => {
            *guard = None;
            info!("crypto runtime torn down");
        }
    }
}

/// Returns `true` while at least one init is outstanding.
pub fn is_initialized() -> bool {
    RUNTIME
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .is_some()
}

/// Fail with [`CipherError::RuntimeNotInitialized`] unless the runtime is up.
pub(crate) fn ensure_initialized() -> Result<(), CipherError> {
    if is_initialized() {
        Ok(())
    } else {
        Err(CipherError::RuntimeNotInitialized)
    }
}

/// Run `f` while holding the lock for `slot`.
///
/// The table is cloned out of the global state first so the global mutex is
/// not held while `f` runs.
pub(crate) fn with_slot<R>(slot: LockSlot, f: impl FnOnce() -> R) -> Result<R, CipherError> {
    let locks = RUNTIME
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map(|state| Arc::clone(&state.locks))
        .ok_or(CipherError::RuntimeNotInitialized)?;

    let _held = locks[slot as usize]
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    trace!(slot = ?slot, thread = thread_id(), "runtime lock acquired");
    Ok(f())
}

/// Stable numeric identity of the calling thread, for diagnostics.
pub fn thread_id() -> u64 {
    let mut hasher = DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    hasher.finish()
}

/// RAII guard pairing [`init_static_state`] with [`cleanup_static_state`].
#[derive(Debug)]
pub struct CryptoRuntime {
    _private: (),
}

impl CryptoRuntime {
    /// Initialise the runtime for the lifetime of the returned guard.
    ///
    /// # Errors
    ///
    /// See [`init_static_state`].
    pub fn init() -> Result<Self, CipherError> {
        init_static_state()?;
        Ok(Self { _private: () })
    }
}

impl Drop for CryptoRuntime {
    fn drop(&mut self) {
        cleanup_static_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tests share one process-wide runtime, so they only ever hold references
    // and never assert on the fully torn-down state.

    #[test]
    fn init_is_idempotent() {
        init_static_state().unwrap();
        init_static_state().unwrap();
        assert!(is_initialized());
        cleanup_static_state();
        assert!(is_initialized());
        cleanup_static_state();
    }

    #[test]
    fn guard_holds_runtime() {
        let guard = CryptoRuntime::init().unwrap();
        assert!(is_initialized());
        assert!(ensure_initialized().is_ok());
        drop(guard);
    }

    #[test]
    fn with_slot_runs_closure() {
        let _guard = CryptoRuntime::init().unwrap();
        let v = with_slot(LockSlot::Random, || 41 + 1).unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn slots_are_independent() {
        let _guard = CryptoRuntime::init().unwrap();
        let nested = with_slot(LockSlot::KeyGeneration, || {
            with_slot(LockSlot::Random, || "inner").unwrap()
        })
        .unwrap();
        assert_eq!(nested, "inner");
    }

    #[test]
    fn thread_ids_differ_across_threads() {
        let here = thread_id();
        assert_eq!(here, thread_id());
        let there = std::thread::spawn(thread_id).join().unwrap();
        assert_ne!(here, there);
    }
}
