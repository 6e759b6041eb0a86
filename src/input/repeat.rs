//! Key repeat engine
//!
//! Delay/interval timers driven by the render loop's clock. Nothing here
//! sleeps: the loop asks for `next_deadline()` to size its wait and calls
//! `tick()` when it wakes, so callbacks run on the loop thread one at a time.

use log::debug;
use std::time::{Duration, Instant};

const TAG: &str = "lockbridge::repeat";

/// Repeat timing reported by the compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatInfo {
    /// Interval between repeats (ms)
    pub rate_ms: i32,
    /// Delay before the first repeat (ms)
    pub delay_ms: i32,
}

impl RepeatInfo {
    fn interval(&self) -> Duration {
        Duration::from_millis(self.rate_ms.max(1) as u64)
    }

    fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms.max(0) as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatPhase {
    Idle,
    ArmedPendingDelay,
    Repeating,
}

/// Repeats the most recently set payload until reset
pub struct RepeatEngine<E> {
    info: Option<RepeatInfo>,
    phase: RepeatPhase,
    event: Option<E>,
    deadline: Option<Instant>,
    callback: Option<Box<dyn FnMut(&E)>>,
}

impl<E> RepeatEngine<E> {
    pub fn new() -> Self {
        Self {
            info: None,
            phase: RepeatPhase::Idle,
            event: None,
            deadline: None,
            callback: None,
        }
    }

    /// Configure timing; a non-positive rate disables repeat
    pub fn set_repeat_info(&mut self, rate_ms: i32, delay_ms: i32) {
        if rate_ms <= 0 {
            self.reset();
            self.info = None;
            debug!(target: TAG, "Key repeat disabled");
            return;
        }
        self.info = Some(RepeatInfo { rate_ms, delay_ms });
        debug!(target: TAG, "Updated repeat info: rate={}ms delay={}ms", rate_ms, delay_ms);
    }

    pub fn repeat_info(&self) -> Option<RepeatInfo> {
        self.info
    }

    pub fn set_callback(&mut self, callback: impl FnMut(&E) + 'static) {
        self.callback = Some(Box::new(callback));
    }

    pub fn phase(&self) -> RepeatPhase {
        self.phase
    }

    /// Payload currently being repeated
    pub fn event(&self) -> Option<&E> {
        self.event.as_ref()
    }

    /// Arm with a new payload, dropping any previous one
    ///
    /// No-op while repeat info is unset.
    pub fn set(&mut self, event: E, now: Instant) {
        let Some(info) = self.info else {
            return;
        };
        self.reset();
        self.event = Some(event);
        self.phase = RepeatPhase::ArmedPendingDelay;
        self.deadline = Some(now + info.delay());
    }

    /// Cancel both timers and forget the payload
    pub fn reset(&mut self) {
        self.phase = RepeatPhase::Idle;
        self.event = None;
        self.deadline = None;
    }

    /// When the next callback is due, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Advance timers; fires at most one callback per call
    ///
    /// Returns true if the callback fired.
    pub fn tick(&mut self, now: Instant) -> bool {
        let (Some(deadline), Some(info)) = (self.deadline, self.info) else {
            return false;
        };
        if now < deadline {
            return false;
        }
        let Some(event) = self.event.as_ref() else {
            self.reset();
            return false;
        };

        if let Some(callback) = self.callback.as_mut() {
            callback(event);
        }
        self.phase = RepeatPhase::Repeating;
        self.deadline = Some(now + info.interval());
        true
    }
}

impl<E> Default for RepeatEngine<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn engine() -> (RepeatEngine<u32>, Rc<RefCell<Vec<u32>>>) {
        let fired = Rc::new(RefCell::new(Vec::new()));
        let sink = fired.clone();
        let mut engine = RepeatEngine::new();
        engine.set_callback(move |e: &u32| sink.borrow_mut().push(*e));
        (engine, fired)
    }

    #[test]
    fn test_unconfigured_set_is_noop() {
        let (mut engine, fired) = engine();
        engine.set(7, Instant::now());
        assert_eq!(engine.phase(), RepeatPhase::Idle);
        assert!(engine.next_deadline().is_none());
        assert!(!engine.tick(Instant::now() + Duration::from_secs(5)));
        assert!(fired.borrow().is_empty());
    }

    #[test]
    fn test_delay_then_rate() {
        let (mut engine, fired) = engine();
        engine.set_repeat_info(30, 500);
        let t0 = Instant::now();
        engine.set(7, t0);
        assert_eq!(engine.phase(), RepeatPhase::ArmedPendingDelay);

        // Nothing before the delay elapses
        assert!(!engine.tick(t0 + Duration::from_millis(499)));
        assert!(fired.borrow().is_empty());

        // Delay elapsed: exactly one immediate callback
        let t1 = t0 + Duration::from_millis(500);
        assert!(engine.tick(t1));
        assert_eq!(engine.phase(), RepeatPhase::Repeating);
        assert_eq!(*fired.borrow(), vec![7]);
        assert_eq!(engine.next_deadline(), Some(t1 + Duration::from_millis(30)));

        // One callback per interval
        assert!(!engine.tick(t1 + Duration::from_millis(29)));
        assert!(engine.tick(t1 + Duration::from_millis(30)));
        assert!(engine.tick(t1 + Duration::from_millis(60)));
        assert_eq!(*fired.borrow(), vec![7, 7, 7]);
    }

    #[test]
    fn test_reset_cancels_from_any_phase() {
        let (mut engine, fired) = engine();
        engine.set_repeat_info(30, 500);
        let t0 = Instant::now();

        engine.set(1, t0);
        engine.reset();
        assert_eq!(engine.phase(), RepeatPhase::Idle);
        assert!(!engine.tick(t0 + Duration::from_secs(1)));

        engine.set(2, t0);
        engine.tick(t0 + Duration::from_millis(500));
        assert_eq!(engine.phase(), RepeatPhase::Repeating);
        engine.reset();
        assert_eq!(engine.phase(), RepeatPhase::Idle);
        assert!(engine.event().is_none());
        assert!(!engine.tick(t0 + Duration::from_secs(10)));
        assert_eq!(*fired.borrow(), vec![2]);
    }

    #[test]
    fn test_set_again_rearms_with_new_payload() {
        let (mut engine, fired) = engine();
        engine.set_repeat_info(30, 500);
        let t0 = Instant::now();
        engine.set(1, t0);
        engine.tick(t0 + Duration::from_millis(500));

        let t1 = t0 + Duration::from_millis(510);
        engine.set(2, t1);
        assert_eq!(engine.phase(), RepeatPhase::ArmedPendingDelay);
        // The old interval deadline is gone; the new delay applies
        assert!(!engine.tick(t1 + Duration::from_millis(100)));
        assert!(engine.tick(t1 + Duration::from_millis(500)));
        assert_eq!(*fired.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_zero_rate_disables() {
        let (mut engine, _) = engine();
        engine.set_repeat_info(30, 500);
        engine.set(1, Instant::now());
        engine.set_repeat_info(0, 500);
        assert_eq!(engine.phase(), RepeatPhase::Idle);
        assert!(engine.repeat_info().is_none());
        engine.set(1, Instant::now());
        assert_eq!(engine.phase(), RepeatPhase::Idle);
    }
}
