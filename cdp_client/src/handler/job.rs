use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_timer::Delay;

/// A timer that comes due every `period`, driven by whoever polls it.
#[derive(Debug)]
pub(crate) struct PeriodicJob {
    period: Duration,
    delay: Delay,
    /// How often the job came due so far
    runs: u64,
}

impl PeriodicJob {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            delay: Delay::new(period),
            runs: 0,
        }
    }

    /// Whether a run is due. Re-arms the timer when it is, so the next run
    /// is due one `period` later.
    pub fn poll_due(&mut self, cx: &mut Context<'_>) -> bool {
        match Pin::new(&mut self.delay).poll(cx) {
            Poll::Ready(()) => {
                self.delay.reset(self.period);
                self.runs += 1;
                true
            }
            Poll::Pending => false,
        }
    }

    pub fn runs(&self) -> u64 {
        self.runs
    }
}
