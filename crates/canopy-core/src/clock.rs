//! Millisecond wall clock with a fixed override.
//!
//! Grace-window and drag-gesture timing go through this handle so tests (and
//! snapshot comparisons) stay deterministic. By default the system clock is used.

#[derive(Debug, Clone, Default)]
pub struct Clock {
    fixed_now_ms: Option<i64>,
}

impl Clock {
    pub fn system() -> Self {
        Self::default()
    }

    /// Pins the clock to a fixed instant.
    ///
    /// This exists primarily to make grace-window tests deterministic.
    pub fn fixed(now_ms: i64) -> Self {
        Self {
            fixed_now_ms: Some(now_ms),
        }
    }

    pub fn now_ms(&self) -> i64 {
        match self.fixed_now_ms {
            Some(ms) => ms,
            None => chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Advances a fixed clock in place. No-op on a system clock.
    pub fn advance(&mut self, delta_ms: i64) {
        if let Some(ms) = self.fixed_now_ms.as_mut() {
            *ms += delta_ms;
        }
    }
}
