/// Session segmentation: turn one account's arrival-ordered request timestamps
/// into a session count plus longest/shortest session length in whole minutes.
use serde::Serialize;

/// Default inactivity gap (seconds) that starts a new session.
pub const DEFAULT_GAP_SECS: i64 = 600;

/// Seconds per reported minute; also the floor for a lone session.
const MINUTE_SECS: i64 = 60;

/// Result of segmenting one account's timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Number of sessions (always >= 1).
    pub sessions: u64,
    /// Longest session length, whole minutes.
    pub longest_mins: i64,
    /// Shortest session length, whole minutes.
    pub shortest_mins: i64,
}

/// Splits timestamp sequences into sessions separated by `gap_secs` of inactivity.
#[derive(Debug, Clone, Copy)]
pub struct SessionEngine {
    gap_secs: i64,
}

impl SessionEngine {
    pub fn new(gap_secs: i64) -> Self {
        Self { gap_secs }
    }

    pub fn gap_secs(&self) -> i64 {
        self.gap_secs
    }

    /// Start an incremental tracker using this engine's gap threshold.
    pub fn tracker(&self) -> SessionTracker {
        SessionTracker::new(self.gap_secs)
    }

    /// Segment a whole sequence in arrival order.
    ///
    /// Returns `None` for an empty sequence; there is no session to describe.
    pub fn analyze(&self, timestamps: &[i64]) -> Option<SessionStats> {
        let mut tracker = self.tracker();
        for &ts in timestamps {
            tracker.push(ts);
        }
        tracker.finish()
    }
}

impl Default for SessionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_GAP_SECS)
    }
}

/// Single-pass session state.
///
/// Only the session currently being accumulated keeps its longest/shortest;
/// crossing a gap discards them and starts over. With several sessions the
/// final figures therefore describe the last one only.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    gap_secs: i64,
    seen: u64,
    sessions: u64,
    elapsed: i64,
    longest: i64,
    shortest: i64,
    prev: i64,
}

impl SessionTracker {
    pub fn new(gap_secs: i64) -> Self {
        Self {
            gap_secs,
            seen: 0,
            sessions: 1,
            elapsed: 0,
            longest: 0,
            shortest: MINUTE_SECS,
            prev: 0,
        }
    }

    /// Feed the next timestamp (seconds) in arrival order.
    pub fn push(&mut self, ts: i64) {
        let first = self.seen == 0;
        let delta = ts - self.prev;

        if !first {
            self.elapsed += delta;
        }

        if self.elapsed > self.longest {
            self.longest = self.elapsed;
        } else if self.elapsed > 0 && self.elapsed < self.shortest {
            self.shortest = self.elapsed;
        }

        if !first && delta > self.gap_secs {
            self.sessions += 1;
            self.elapsed = 0;
            self.longest = 0;
            self.shortest = MINUTE_SECS;
            tracing::trace!(ts, delta, sessions = self.sessions, "session boundary");
        }

        self.prev = ts;
        self.seen += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.seen == 0
    }

    /// Close out the sequence. `None` if nothing was pushed.
    pub fn finish(self) -> Option<SessionStats> {
        if self.is_empty() {
            return None;
        }

        let mut longest = self.longest;
        let mut shortest = self.shortest;

        // A lone session reports its length for both extremes, at least a minute.
        if self.sessions == 1 {
            longest = longest.max(MINUTE_SECS);
            shortest = longest;
        }

        Some(SessionStats {
            sessions: self.sessions,
            longest_mins: longest / MINUTE_SECS,
            shortest_mins: shortest / MINUTE_SECS,
        })
    }
}
