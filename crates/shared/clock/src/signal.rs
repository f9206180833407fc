use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Stop flag a worker thread can sleep on
///
/// `wait_until` returns early as soon as `stop` is called from another thread.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        *self.stopped.lock() = true;
        self.condvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock()
    }

    /// Sleep until `deadline`; returns true if stopped meanwhile
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut stopped = self.stopped.lock();
        while !*stopped {
            if self.condvar.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }

    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.wait_until(Instant::now() + timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_wait_times_out_when_not_stopped() {
        let signal = StopSignal::new();
        let started = Instant::now();
        assert!(!signal.wait_for(Duration::from_millis(10)));
        assert!(started.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_stop_wakes_waiter() {
        let signal = Arc::new(StopSignal::new());
        let waiter = {
            let signal = signal.clone();
            thread::spawn(move || signal.wait_for(Duration::from_secs(10)))
        };
        thread::sleep(Duration::from_millis(10));
        signal.stop();

        assert!(waiter.join().unwrap());
        assert!(signal.is_stopped());
    }
}
