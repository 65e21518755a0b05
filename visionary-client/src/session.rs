//! CoLa-2 session state.

use std::time::{Duration, Instant};

/// An open CoLa-2 session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: u32,
    opened_at: Instant,
    timeout: Duration,
}

impl Session {
    pub fn new(id: u32, timeout: Duration) -> Self {
        Self {
            id,
            opened_at: Instant::now(),
            timeout,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    /// Inactivity timeout negotiated at open.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_accessors() {
        let session = Session::new(0x0101_0101, Duration::from_secs(5));
        assert_eq!(session.id(), 0x0101_0101);
        assert_eq!(session.timeout(), Duration::from_secs(5));
        assert!(session.age() < Duration::from_secs(5));
        assert!(session.opened_at() <= Instant::now());
    }
}
