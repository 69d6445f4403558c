//! Process-wide OpenSSL initialization
//!
//! Every `ContextService` and every `Context` holds an `EngineGuard`. The
//! first guard initializes the library; the count drops back to zero when the
//! last guard is dropped.

use std::sync::Mutex;

static ENGINE_USERS: Mutex<usize> = Mutex::new(0);

/// Reference-counted claim on the initialized engine
#[derive(Debug)]
pub struct EngineGuard {
    _private: (),
}

impl EngineGuard {
    /// Take a reference, initializing OpenSSL on the first one
    pub fn acquire() -> Self {
        let mut users = lock();
        if *users == 0 {
            openssl::init();
            log::debug!("OpenSSL initialized ({})", openssl::version::version());
        }
        *users += 1;
        EngineGuard { _private: () }
    }

    /// Number of live guards in the process
    pub fn active() -> usize {
        *lock()
    }
}

impl Clone for EngineGuard {
    fn clone(&self) -> Self {
        EngineGuard::acquire()
    }
}

impl Drop for EngineGuard {
    fn drop(&mut self) {
        let mut users = lock();
        *users = users.saturating_sub(1);
        if *users == 0 {
            // OpenSSL >= 1.1 tears itself down at exit.
            log::debug!("last OpenSSL user released");
        }
    }
}

fn lock() -> std::sync::MutexGuard<'static, usize> {
    // The counter is valid even if a holder panicked mid-update.
    ENGINE_USERS.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
