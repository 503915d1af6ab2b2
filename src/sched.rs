//! Poll Engine: resolves an array of subscriptions into an
//! equally-sized array of events, with one coarse blocking sleep as
//! the engine's sole suspension point.
//!
//! No per-platform `poll(2)`/IOCP backend: real async I/O
//! multiplexing is out of scope, so readiness is resolved by directly
//! querying each fd's driver through `PollSource`.

use crate::error::Error;

/// Opaque token threaded through a subscription to its matching event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Userdata(pub u64);

impl From<u64> for Userdata {
    fn from(u: u64) -> Userdata {
        Userdata(u)
    }
}

impl From<Userdata> for u64 {
    fn from(u: Userdata) -> u64 {
        u.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockId {
    Realtime,
    Monotonic,
}

#[derive(Debug, Clone, Copy)]
pub struct SubscriptionClock {
    pub id: ClockId,
    pub timeout: u64,
    pub precision: u64,
    pub abstime: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum Subscription {
    Clock(SubscriptionClock),
    FdRead(u32),
    FdWrite(u32),
}

/// What a resolved subscription reports, minus the `type` tag which
/// the dispatcher re-derives from the subscription.
#[derive(Debug)]
pub struct SubscriptionResult {
    pub error: Option<Error>,
    pub nbytes: u64,
}

impl SubscriptionResult {
    fn ok(nbytes: u64) -> Self {
        SubscriptionResult { error: None, nbytes }
    }

    fn err(e: Error) -> Self {
        SubscriptionResult { error: Some(e), nbytes: 0 }
    }
}

/// Queried by the poll engine to learn fd readiness, without the engine
/// itself knowing about the FD table or device drivers.
pub trait PollSource {
    fn bytes_available(&self, fd: u32) -> Result<u64, Error>;
    /// Existence + right check only; write readiness is assumed once
    /// the fd is valid.
    fn write_ready(&self, fd: u32) -> Result<(), Error>;
}

/// The blocking host sleep.
pub trait HostTimer {
    fn sleep(&self, milliseconds: u64);
}

/// The host's notion of wall-clock and monotonic time, each in
/// nanoseconds.
pub trait HostClock {
    fn realtime(&self) -> u64;
    fn monotonic(&self) -> u64;
}

pub struct Poll {
    subs: Vec<(Subscription, Userdata)>,
}

impl Poll {
    pub fn new() -> Self {
        Poll { subs: Vec::new() }
    }

    pub fn push(&mut self, sub: Subscription, ud: Userdata) {
        self.subs.push((sub, ud));
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }
}

impl Default for Poll {
    fn default() -> Self {
        Poll::new()
    }
}

fn effective_timeout(clock: &SubscriptionClock, host_clock: &dyn HostClock) -> u64 {
    if clock.abstime {
        let now = match clock.id {
            ClockId::Realtime => host_clock.realtime(),
            ClockId::Monotonic => host_clock.monotonic(),
        };
        clock.timeout.saturating_sub(now)
    } else {
        clock.timeout
    }
}

fn resolve_fd_subs(subs: &[(Subscription, Userdata)], source: &dyn PollSource) -> Vec<Option<SubscriptionResult>> {
    subs.iter()
        .map(|(sub, _)| match sub {
            Subscription::FdRead(fd) => Some(match source.bytes_available(*fd) {
                Ok(n) => SubscriptionResult::ok(n),
                Err(e) => SubscriptionResult::err(e),
            }),
            Subscription::FdWrite(fd) => Some(match source.write_ready(*fd) {
                Ok(()) => SubscriptionResult::ok(0),
                Err(e) => SubscriptionResult::err(e),
            }),
            Subscription::Clock(_) => None,
        })
        .collect()
}

/// Runs the coarse sleep-then-reevaluate algorithm and returns one
/// result per subscription, in subscription order.
pub fn poll_oneoff(
    poll: &Poll,
    source: &dyn PollSource,
    host_clock: &dyn HostClock,
    timer: &dyn HostTimer,
) -> Vec<(SubscriptionResult, Userdata)> {
    let mut fd_results = resolve_fd_subs(&poll.subs, source);

    // An fd subscription that merely errored is not "data available" —
    // it belongs to the not-ready set just as much as nbytes==0 does,
    // so it must not suppress the coarse clock sleep below.
    let any_fd_ready = fd_results.iter().flatten().any(|r| r.nbytes > 0);

    let earliest_clock = poll
        .subs
        .iter()
        .filter_map(|(sub, _)| match sub {
            Subscription::Clock(c) => Some(*c),
            _ => None,
        })
        .map(|c| effective_timeout(&c, host_clock))
        .min();

    if !any_fd_ready {
        if let Some(timeout_ns) = earliest_clock {
            if timeout_ns > 0 {
                timer.sleep(timeout_ns / 1_000_000);
                fd_results = resolve_fd_subs(&poll.subs, source);
            }
        }
    }

    poll.subs
        .iter()
        .zip(fd_results)
        .map(|((sub, ud), fd_result)| {
            let result = match (sub, fd_result) {
                // A clock event always reports nbytes=0; the effective
                // timeout only ever feeds the sleep-duration choice above.
                (Subscription::Clock(_), _) => SubscriptionResult::ok(0),
                (_, Some(r)) => r,
                (_, None) => unreachable!("fd subscription always resolves to Some"),
            };
            (result, *ud)
        })
        .collect()
}

/// `sched_yield`: no-op under the cooperative single-thread model
/// since there is no other runnable task to cede to.
pub fn sched_yield() -> Result<(), Error> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClock(u64);
    impl HostClock for FixedClock {
        fn realtime(&self) -> u64 {
            self.0
        }
        fn monotonic(&self) -> u64 {
            self.0
        }
    }

    struct NeverReady;
    impl PollSource for NeverReady {
        fn bytes_available(&self, _fd: u32) -> Result<u64, Error> {
            Ok(0)
        }
        fn write_ready(&self, _fd: u32) -> Result<(), Error> {
            Ok(())
        }
    }

    struct CountingTimer {
        calls: std::cell::Cell<u32>,
    }
    impl HostTimer for CountingTimer {
        fn sleep(&self, _milliseconds: u64) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    #[test]
    fn single_clock_with_timeout_sleeps_once_and_reports_event() {
        let mut poll = Poll::new();
        poll.push(
            Subscription::Clock(SubscriptionClock {
                id: ClockId::Realtime,
                timeout: 50_000_000,
                precision: 0,
                abstime: false,
            }),
            Userdata(7),
        );
        let timer = CountingTimer { calls: std::cell::Cell::new(0) };
        let results = poll_oneoff(&poll, &NeverReady, &FixedClock(0), &timer);
        assert_eq!(timer.calls.get(), 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1, Userdata(7));
        assert_eq!(results[0].0.nbytes, 0);
        assert!(results[0].0.error.is_none());
    }

    #[test]
    fn zero_timeout_does_not_sleep() {
        let mut poll = Poll::new();
        poll.push(
            Subscription::Clock(SubscriptionClock {
                id: ClockId::Realtime,
                timeout: 0,
                precision: 0,
                abstime: false,
            }),
            Userdata(1),
        );
        let timer = CountingTimer { calls: std::cell::Cell::new(0) };
        poll_oneoff(&poll, &NeverReady, &FixedClock(0), &timer);
        assert_eq!(timer.calls.get(), 0);
    }

    struct AlreadyReady;
    impl PollSource for AlreadyReady {
        fn bytes_available(&self, _fd: u32) -> Result<u64, Error> {
            Ok(5)
        }
        fn write_ready(&self, _fd: u32) -> Result<(), Error> {
            Ok(())
        }
    }

    #[test]
    fn ready_fd_subscription_skips_sleep() {
        let mut poll = Poll::new();
        poll.push(Subscription::FdRead(3), Userdata(1));
        poll.push(
            Subscription::Clock(SubscriptionClock {
                id: ClockId::Realtime,
                timeout: 50_000_000,
                precision: 0,
                abstime: false,
            }),
            Userdata(2),
        );
        let timer = CountingTimer { calls: std::cell::Cell::new(0) };
        let results = poll_oneoff(&poll, &AlreadyReady, &FixedClock(0), &timer);
        assert_eq!(timer.calls.get(), 0);
        assert_eq!(results[0].0.nbytes, 5);
    }

    struct AlwaysErrors;
    impl PollSource for AlwaysErrors {
        fn bytes_available(&self, _fd: u32) -> Result<u64, Error> {
            Err(Error::Badf)
        }
        fn write_ready(&self, _fd: u32) -> Result<(), Error> {
            Err(Error::Badf)
        }
    }

    #[test]
    fn erroring_fd_subscription_does_not_suppress_clock_sleep() {
        let mut poll = Poll::new();
        poll.push(Subscription::FdRead(3), Userdata(1));
        poll.push(
            Subscription::Clock(SubscriptionClock {
                id: ClockId::Realtime,
                timeout: 50_000_000,
                precision: 0,
                abstime: false,
            }),
            Userdata(2),
        );
        let timer = CountingTimer { calls: std::cell::Cell::new(0) };
        let results = poll_oneoff(&poll, &AlwaysErrors, &FixedClock(0), &timer);
        assert_eq!(timer.calls.get(), 1);
        let fd_result = results.iter().find(|(_, ud)| *ud == Userdata(1)).unwrap();
        assert!(fd_result.0.error.is_some());
    }
}
