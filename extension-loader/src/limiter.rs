use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

////////////////////////////////////////////////////////////////////////////////////////////////

/// Coarse-window token-bucket rate limiter (§4.7): at most `rate` calls
/// succeed per `interval_ms` window; the window resets on the first call
/// observed after it has elapsed, rather than draining continuously.
///
/// Lock-free: a fixed-width `(window_start_ms, count)` pair is packed into
/// a single `AtomicI64` and advanced with compare-and-swap, the same way a
/// coarse rate limiter is normally built without a mutex.
pub struct TpsLimiter {
    rate: i64,
    interval_ms: i64,
    epoch: Instant,
    state: AtomicI64,
}

const COUNT_BITS: i64 = 20;
const COUNT_MASK: i64 = (1 << COUNT_BITS) - 1;

impl TpsLimiter {
    pub fn new(rate: i64, interval_ms: i64) -> Self {
        Self {
            rate,
            interval_ms: interval_ms.max(1),
            epoch: Instant::now(),
            state: AtomicI64::new(0),
        }
    }

    /// Returns `true` if this call consumed a slot in the current window,
    /// `false` if the window's budget is already exhausted.
    pub fn try_acquire(&self) -> bool {
        if self.rate <= 0 {
            return false;
        }

        let now_ms = self.epoch.elapsed().as_millis() as i64;

        loop {
            let packed = self.state.load(Ordering::Acquire);
            let (window_start, count) = unpack(packed);

            let (window_start, count) = if now_ms - window_start >= self.interval_ms {
                (now_ms, 0)
            } else {
                (window_start, count)
            };

            if count >= self.rate {
                return false;
            }

            let next = pack(window_start, count + 1);
            if self
                .state
                .compare_exchange_weak(packed, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }
}

fn pack(window_start_ms: i64, count: i64) -> i64 {
    (window_start_ms << COUNT_BITS) | (count & COUNT_MASK)
}

fn unpack(packed: i64) -> (i64, i64) {
    (packed >> COUNT_BITS, packed & COUNT_MASK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_rate_within_a_window() {
        let limiter = TpsLimiter::new(3, 10_000);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn zero_rate_always_rejects() {
        let limiter = TpsLimiter::new(0, 1_000);
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn resets_after_the_window_elapses() {
        let limiter = TpsLimiter::new(1, 20);
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        std::thread::sleep(std::time::Duration::from_millis(40));
        assert!(limiter.try_acquire());
    }
}
