//! Logical time for the JSON CRDT Patch protocol.
//!
//! Every operation, node and sequence element is identified by a [`Ts`]:
//! a `(session, time)` pair that is never reused. Timestamps are totally
//! ordered by time first and session second, which is the tie-break every
//! LWW and RGA merge relies on.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::json_crdt_patch::enums::SESSION;

// ── Core structs ───────────────────────────────────────────────────────────

/// An immutable logical timestamp: `(session_id, logical_time)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ts {
    pub sid: u64,
    pub time: u64,
}

impl Ts {
    pub const fn new(sid: u64, time: u64) -> Self {
        Self { sid, time }
    }
}

impl Ord for Ts {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.sid.cmp(&other.sid))
    }
}

impl PartialOrd for Ts {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Ts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&print_ts(*self))
    }
}

/// An immutable logical time-span: `(session_id, logical_time, span)`.
///
/// Covers the `span` consecutive timestamps starting at `(sid, time)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tss {
    pub sid: u64,
    pub time: u64,
    pub span: u64,
}

impl Tss {
    pub const fn new(sid: u64, time: u64, span: u64) -> Self {
        Self { sid, time, span }
    }

    pub fn ts(&self) -> Ts {
        Ts::new(self.sid, self.time)
    }
}

impl fmt::Display for Tss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", print_ts(self.ts()), self.span)
    }
}

// ── Factory functions ──────────────────────────────────────────────────────

/// Create a timestamp.
#[inline]
pub fn ts(sid: u64, time: u64) -> Ts {
    Ts::new(sid, time)
}

/// Create a timespan.
#[inline]
pub fn tss(sid: u64, time: u64, span: u64) -> Tss {
    Tss::new(sid, time, span)
}

/// Advance a timestamp by `cycles` within its own session.
#[inline]
pub fn tick(stamp: Ts, cycles: u64) -> Ts {
    Ts::new(stamp.sid, stamp.time + cycles)
}

/// Returns `true` if both timestamps are equal.
#[inline]
pub fn equal(a: Ts, b: Ts) -> bool {
    a.time == b.time && a.sid == b.sid
}

/// Compare two timestamps: time first, then session ID.
#[inline]
pub fn compare(a: Ts, b: Ts) -> Ordering {
    a.cmp(&b)
}

/// Returns `true` if `[ts1, span1)` completely contains `[ts2, span2)`.
pub fn contains(ts1: Ts, span1: u64, ts2: Ts, span2: u64) -> bool {
    if ts1.sid != ts2.sid {
        return false;
    }
    if ts1.time > ts2.time {
        return false;
    }
    ts1.time + span1 >= ts2.time + span2
}

/// Returns `true` if the timespan `[ts1, span1)` contains point `ts2`.
pub fn contains_id(ts1: Ts, span1: u64, ts2: Ts) -> bool {
    ts1.sid == ts2.sid && ts1.time <= ts2.time && ts2.time < ts1.time + span1
}

/// Creates a timespan at offset `tick_offset` from `stamp` with length `span`.
pub fn interval(stamp: Ts, tick_offset: u64, span: u64) -> Tss {
    Tss::new(stamp.sid, stamp.time + tick_offset, span)
}

/// Human-readable representation of a timestamp.
pub fn print_ts(id: Ts) -> String {
    if id.sid == SESSION::SERVER {
        return format!(".{}", id.time);
    }
    let s = id.sid.to_string();
    let session = if s.len() > 4 {
        format!("..{}", &s[s.len() - 4..])
    } else {
        s
    };
    format!("{}.{}", session, id.time)
}

// ── ClockVector ────────────────────────────────────────────────────────────

/// A vector clock: the local session's next free time plus the latest
/// observed time of every other known session.
#[derive(Debug, Clone)]
pub struct ClockVector {
    pub sid: u64,
    pub time: u64,
    pub peers: HashMap<u64, Ts>,
}

impl ClockVector {
    pub fn new(sid: u64, time: u64) -> Self {
        Self {
            sid,
            time,
            peers: HashMap::new(),
        }
    }

    pub fn ts(&self) -> Ts {
        Ts::new(self.sid, self.time)
    }

    /// Reserves `cycles` consecutive local timestamps and returns the first.
    pub fn tick(&mut self, cycles: u64) -> Ts {
        let stamp = Ts::new(self.sid, self.time);
        self.time += cycles;
        stamp
    }

    /// Records that `[id, id + span)` has been seen.
    ///
    /// A foreign session's entry only moves forward. Local time is pushed past
    /// the observed edge, so anything ticked afterwards sorts after what was
    /// observed. Calling it again with the same arguments changes nothing.
    pub fn observe(&mut self, id: Ts, span: u64) {
        if span == 0 {
            return;
        }
        let edge = id.time + span - 1;
        let sid = id.sid;
        if sid != self.sid {
            self.peers
                .entry(sid)
                .and_modify(|e| {
                    if edge > e.time {
                        e.time = edge;
                    }
                })
                .or_insert_with(|| Ts::new(sid, edge));
        }
        if edge >= self.time {
            self.time = edge + 1;
        }
    }

    /// Latest observed time of `sid`, or `None` if the session is unknown.
    pub fn peer_time(&self, sid: u64) -> Option<u64> {
        self.peers.get(&sid).map(|p| p.time)
    }

    /// Deep copy with a (potentially different) session ID.
    ///
    /// When the session changes, the old session's last issued time becomes a
    /// peer entry of the copy.
    pub fn fork(&self, new_sid: u64) -> ClockVector {
        let mut clock = ClockVector::new(new_sid, self.time);
        if new_sid != self.sid && self.time > 0 {
            clock.observe(Ts::new(self.sid, self.time - 1), 1);
        }
        for peer in self.peers.values() {
            if peer.sid != new_sid {
                clock.observe(*peer, 1);
            }
        }
        clock
    }
}

impl fmt::Display for ClockVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clock {}.{}", self.sid, self.time)?;
        let mut peers: Vec<_> = self.peers.values().collect();
        peers.sort_by_key(|p| p.sid);
        for (i, peer) in peers.iter().enumerate() {
            let is_last = i == peers.len() - 1;
            write!(
                f,
                "\n{} {}.{}",
                if is_last { "└─" } else { "├─" },
                peer.sid,
                peer.time
            )?;
        }
        Ok(())
    }
}

// ── ServerClockVector ──────────────────────────────────────────────────────

/// A single monotonic counter owned by a central server.
///
/// All timestamps carry `SESSION::SERVER`; there are no peer entries.
#[derive(Debug, Clone)]
pub struct ServerClockVector {
    pub sid: u64,
    pub time: u64,
}

impl ServerClockVector {
    pub fn new(time: u64) -> Self {
        Self {
            sid: SESSION::SERVER,
            time,
        }
    }

    pub fn ts(&self) -> Ts {
        Ts::new(self.sid, self.time)
    }

    pub fn tick(&mut self, cycles: u64) -> Ts {
        let stamp = Ts::new(self.sid, self.time);
        self.time += cycles;
        stamp
    }

    /// Moves the counter past `[id, id + span)`. Never moves it backwards.
    pub fn observe(&mut self, id: Ts, span: u64) {
        let time = id.time + span;
        if time > self.time {
            self.time = time;
        }
    }
}

impl fmt::Display for ServerClockVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clock .{}", self.time)
    }
}

// ── Clock ──────────────────────────────────────────────────────────────────

/// The clock owned by a model or a patch builder.
#[derive(Debug, Clone)]
pub enum Clock {
    Vector(ClockVector),
    Server(ServerClockVector),
}

impl Clock {
    pub fn logical(sid: u64, time: u64) -> Self {
        Clock::Vector(ClockVector::new(sid, time))
    }

    pub fn server(time: u64) -> Self {
        Clock::Server(ServerClockVector::new(time))
    }

    pub fn sid(&self) -> u64 {
        match self {
            Clock::Vector(c) => c.sid,
            Clock::Server(c) => c.sid,
        }
    }

    /// The next timestamp `tick` would hand out.
    pub fn time(&self) -> u64 {
        match self {
            Clock::Vector(c) => c.time,
            Clock::Server(c) => c.time,
        }
    }

    pub fn ts(&self) -> Ts {
        Ts::new(self.sid(), self.time())
    }

    pub fn is_server(&self) -> bool {
        matches!(self, Clock::Server(_))
    }

    /// Reserves `cycles` consecutive timestamps and returns the first.
    pub fn tick(&mut self, cycles: u64) -> Ts {
        match self {
            Clock::Vector(c) => c.tick(cycles),
            Clock::Server(c) => c.tick(cycles),
        }
    }

    pub fn observe(&mut self, id: Ts, span: u64) {
        match self {
            Clock::Vector(c) => c.observe(id, span),
            Clock::Server(c) => c.observe(id, span),
        }
    }

    /// Copy of this clock for a new editing session. A server clock keeps its
    /// session, since the server is the only author of timestamps.
    pub fn fork(&self, new_sid: u64) -> Clock {
        match self {
            Clock::Vector(c) => Clock::Vector(c.fork(new_sid)),
            Clock::Server(c) => Clock::Server(c.clone()),
        }
    }
}

impl fmt::Display for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clock::Vector(c) => c.fmt(f),
            Clock::Server(c) => c.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ts_equality() {
        assert!(equal(ts(1, 100), ts(1, 100)));
        assert!(!equal(ts(1, 100), ts(1, 101)));
        assert!(!equal(ts(1, 100), ts(2, 100)));
    }

    #[test]
    fn ts_compare_time_first() {
        assert_eq!(compare(ts(1, 10), ts(2, 9)), Ordering::Greater);
        assert_eq!(compare(ts(2, 9), ts(1, 10)), Ordering::Less);
        assert_eq!(compare(ts(1, 10), ts(2, 10)), Ordering::Less);
        assert_eq!(compare(ts(2, 10), ts(1, 10)), Ordering::Greater);
        assert_eq!(compare(ts(1, 10), ts(1, 10)), Ordering::Equal);
        assert!(ts(5, 3) < ts(1, 4));
    }

    #[test]
    fn contains_spans() {
        assert!(contains(ts(1, 5), 10, ts(1, 7), 3));
        assert!(!contains(ts(1, 5), 10, ts(2, 7), 3));
        assert!(!contains(ts(1, 5), 3, ts(1, 7), 3));
    }

    #[test]
    fn contains_id_point() {
        assert!(contains_id(ts(1, 5), 10, ts(1, 5)));
        assert!(contains_id(ts(1, 5), 10, ts(1, 14)));
        assert!(!contains_id(ts(1, 5), 10, ts(1, 15)));
        assert!(!contains_id(ts(1, 5), 10, ts(2, 5)));
    }

    #[test]
    fn tick_never_reissues() {
        let mut clock = ClockVector::new(42, 100);
        let t0 = clock.tick(1);
        assert_eq!(t0, ts(42, 100));
        let t1 = clock.tick(3);
        assert_eq!(t1, ts(42, 101));
        assert_eq!(clock.time, 104);
        assert_eq!(clock.tick(1), ts(42, 104));
    }

    #[test]
    fn clock_vector_observe() {
        let mut cv = ClockVector::new(1, 0);
        cv.observe(ts(2, 5), 1);
        assert_eq!(cv.time, 6);
        assert_eq!(cv.peer_time(2), Some(5));

        cv.observe(ts(2, 3), 2);
        assert_eq!(cv.peer_time(2), Some(5), "older observation is ignored");

        cv.observe(ts(2, 6), 4);
        assert_eq!(cv.peer_time(2), Some(9));
        assert_eq!(cv.time, 10);
    }

    #[test]
    fn clock_vector_fork_keeps_old_session_as_peer() {
        let mut cv = ClockVector::new(100_000, 0);
        cv.tick(5);
        cv.observe(ts(200_000, 7), 1);
        let forked = cv.fork(300_000);
        assert_eq!(forked.sid, 300_000);
        assert_eq!(forked.peer_time(100_000), Some(7));
        assert_eq!(forked.peer_time(200_000), Some(7));
        assert!(forked.time > 7);
    }

    #[test]
    fn server_clock_observe_is_monotonic() {
        let mut clock = ServerClockVector::new(10);
        clock.observe(ts(SESSION::SERVER, 3), 2);
        assert_eq!(clock.time, 10);
        clock.observe(ts(SESSION::SERVER, 10), 4);
        assert_eq!(clock.time, 14);
        assert_eq!(clock.tick(1), ts(SESSION::SERVER, 14));
    }

    #[test]
    fn print_ts_server() {
        assert_eq!(print_ts(ts(SESSION::SERVER, 42)), ".42");
    }

    #[test]
    fn print_ts_long_session() {
        assert_eq!(print_ts(ts(123456789, 1)), "..6789.1");
    }

    #[test]
    fn interval_timespan() {
        let span = interval(ts(1, 10), 5, 3);
        assert_eq!(span, Tss::new(1, 15, 3));
    }
}
