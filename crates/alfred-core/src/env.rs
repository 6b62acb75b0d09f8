//! Environment abstraction for deterministic testing.
//!
//! Decouples the protocol engine from system time and randomness so that
//! retention sweeps and random `tx_id` generation can be exercised
//! deterministically in tests, while production uses real system resources.

use std::time::Duration;

/// Abstract environment providing monotonic time and randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards.
/// - `random_u16()` is infallible except in exceptional circumstances (e.g.
///   OS entropy exhaustion).
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`; simulation
    /// environments use a virtual clock advanced explicitly by tests.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// A random 16-bit value, used to generate fresh `tx_id`s for
    /// `sync_data`/`push_local_data` so they don't collide with
    /// peer-originated transactions.
    fn random_u16(&self) -> u16;

    /// Wall-clock seconds since the Unix epoch, for diagnostics/logging
    /// timestamps only — never used in TTL arithmetic.
    fn wall_clock_secs(&self) -> u64;
}

/// The production environment: real monotonic time and OS-backed randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl SystemEnvironment {
    /// Builds the production environment. Zero-sized; every instance is
    /// interchangeable.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnvironment {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn random_u16(&self) -> u16 {
        rand::random()
    }

    #[allow(clippy::disallowed_methods)]
    fn wall_clock_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A virtual-time, seeded-RNG environment for deterministic tests.
///
/// Not gated behind `#[cfg(test)]` so that `alfred-harness` and other crates'
/// integration tests can share it.
pub mod sim {
    use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::Environment;

    /// Deterministic environment: time only advances when told to, and
    /// randomness is a simple counter-derived sequence (not
    /// cryptographically secure, which is fine — nothing in tests needs it
    /// to be).
    #[derive(Clone, Default)]
    pub struct SimEnv {
        now_millis: Arc<AtomicU64>,
        next_random: Arc<AtomicU16>,
    }

    impl SimEnv {
        /// Starts the virtual clock at zero.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Advances the virtual clock by `duration`.
        pub fn advance(&self, duration: Duration) {
            let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
            self.now_millis.fetch_add(millis, Ordering::SeqCst);
        }
    }

    impl Environment for SimEnv {
        type Instant = Duration;

        fn now(&self) -> Self::Instant {
            Duration::from_millis(self.now_millis.load(Ordering::SeqCst))
        }

        fn random_u16(&self) -> u16 {
            self.next_random.fetch_add(0x1001, Ordering::SeqCst)
        }

        fn wall_clock_secs(&self) -> u64 {
            self.now_millis.load(Ordering::SeqCst) / 1000
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Environment, SystemEnvironment};

    #[test]
    fn system_clock_is_monotonic() {
        let env = SystemEnvironment::new();
        let first = env.now();
        let second = env.now();
        assert!(second >= first);
    }

    #[test]
    fn wall_clock_secs_is_plausible() {
        let env = SystemEnvironment::new();
        // Any time after this codec existed.
        assert!(env.wall_clock_secs() > 1_700_000_000);
    }
}
