//! Render thread init handshake
//!
//! One-shot `Pending -> Ready(result)` cell. The render thread publishes the
//! outcome of its setup once; `start()` blocks in `wait()` until it does.

use std::sync::{Condvar, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
enum InitState {
    Pending,
    Ready(Result<(), String>),
}

#[derive(Debug)]
pub struct InitSignal {
    state: Mutex<InitState>,
    ready: Condvar,
}

impl InitSignal {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InitState::Pending),
            ready: Condvar::new(),
        }
    }

    /// Publish the setup outcome; later calls are ignored
    pub fn publish(&self, result: Result<(), String>) {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *state == InitState::Pending {
            *state = InitState::Ready(result);
            self.ready.notify_all();
        }
    }

    /// Block until the outcome is published
    pub fn wait(&self) -> Result<(), String> {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        loop {
            if let InitState::Ready(result) = &*state {
                return result.clone();
            }
            state = match self.ready.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    pub fn is_pending(&self) -> bool {
        match self.state.lock() {
            Ok(state) => *state == InitState::Pending,
            Err(poisoned) => *poisoned.into_inner() == InitState::Pending,
        }
    }
}

impl Default for InitSignal {
    fn default() -> Self {
        Self::new()
    }
}
