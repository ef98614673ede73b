use serde::{Deserialize, Serialize};

pub const TICKS_PER_10MS: u64 = 10;
pub const TICKS_PER_100MS: u64 = 100;

/// Cadences due in one millisecond, run in field order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DueTicks {
    pub tick_1ms: bool,
    pub tick_10ms: bool,
    pub tick_100ms: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SchedulerStats {
    pub elapsed_ms: u64,
    pub ticks_1ms: u64,
    pub ticks_10ms: u64,
    pub ticks_100ms: u64,
}

/// Turns elapsed milliseconds into 1/10/100 ms cadence ticks.
///
/// The first 10 ms tick lands on t = 10 ms and the first 100 ms tick on
/// t = 100 ms, so 100 ticks of the 1 ms cadence always separate two
/// 100 ms ticks.
#[derive(Debug, Default)]
pub struct TickScheduler {
    stats: SchedulerStats,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by one millisecond and report which cadences are due.
    pub fn step(&mut self) -> DueTicks {
        self.stats.elapsed_ms += 1;
        let now = self.stats.elapsed_ms;

        let due = DueTicks {
            tick_1ms: true,
            tick_10ms: now % TICKS_PER_10MS == 0,
            tick_100ms: now % TICKS_PER_100MS == 0,
        };

        self.stats.ticks_1ms += 1;
        if due.tick_10ms {
            self.stats.ticks_10ms += 1;
        }
        if due.tick_100ms {
            self.stats.ticks_100ms += 1;
        }

        due
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.stats.elapsed_ms
    }

    pub fn get_stats(&self) -> &SchedulerStats {
        &self.stats
    }
}
