//! A tick stream for validator duties.
//!
//! Each slot produces two ticks: one at the start, when blocks are proposed,
//! and one at the midpoint, when attestations are due. The stream is built
//! on [`tokio::time::interval_at`], so tests can drive it with paused time.

use core::time::Duration;
use std::time::{Instant, SystemTime};

use anyhow::Result;
use futures::stream::{Stream, StreamExt as _};
use thiserror::Error;
use tokio_stream::wrappers::IntervalStream;

use types::{
    config::Config,
    phase0::{
        consts::GENESIS_SLOT,
        primitives::{Slot, UnixMillis, UnixSeconds},
    },
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Tick {
    pub slot: Slot,
    pub kind: TickKind,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum TickKind {
    /// The start of a slot; proposals are due.
    SlotStart,
    /// Halfway through a slot; attestations are due.
    SlotMidpoint,
}

#[derive(Debug, Error)]
pub enum ClockError {
    #[error("system time is before the Unix epoch")]
    TimeBeforeUnixEpoch,
    #[error("ran out of slots")]
    RanOutOfSlots,
}

impl Tick {
    #[must_use]
    pub const fn start_of_slot(slot: Slot) -> Self {
        Self {
            slot,
            kind: TickKind::SlotStart,
        }
    }

    /// The tick in force at `time`. Times before genesis map to the start of
    /// the genesis slot.
    #[must_use]
    pub fn at_time(config: &Config, time: UnixMillis, genesis_time: UnixSeconds) -> Self {
        let genesis_millis = genesis_time * 1000;

        if time <= genesis_millis {
            return Self::start_of_slot(GENESIS_SLOT);
        }

        let slot_duration = config.slot_duration_millis();
        let since_genesis = time - genesis_millis;
        let slot = GENESIS_SLOT + since_genesis / slot_duration;

        let kind = if since_genesis % slot_duration < slot_duration / 2 {
            TickKind::SlotStart
        } else {
            TickKind::SlotMidpoint
        };

        Self { slot, kind }
    }

    pub fn next(self) -> Result<Self, ClockError> {
        match self.kind {
            TickKind::SlotStart => Ok(Self {
                slot: self.slot,
                kind: TickKind::SlotMidpoint,
            }),
            TickKind::SlotMidpoint => {
                let slot = self.slot.checked_add(1).ok_or(ClockError::RanOutOfSlots)?;
                Ok(Self::start_of_slot(slot))
            }
        }
    }

    #[must_use]
    pub const fn is_start_of_slot(self) -> bool {
        matches!(self.kind, TickKind::SlotStart)
    }
}

/// A stream of ticks, two per slot, starting with the next one after now.
pub fn ticks(
    config: &Config,
    genesis_time: UnixSeconds,
) -> Result<impl Stream<Item = Result<Tick, ClockError>>> {
    let now_instant = Instant::now();
    let now_millis = unix_millis(SystemTime::now())?;

    let (first_tick, delay) = next_tick_with_delay(config, now_millis, genesis_time);

    let half_slot = Duration::from_millis(config.slot_duration_millis() / 2);
    let interval =
        tokio::time::interval_at((now_instant + Duration::from_millis(delay)).into(), half_slot);

    let mut next_tick = Some(first_tick);

    Ok(IntervalStream::new(interval).map(move |_| {
        let current = next_tick.take().ok_or(ClockError::RanOutOfSlots)?;
        next_tick = current.next().ok();
        Ok(current)
    }))
}

fn unix_millis(time: SystemTime) -> Result<UnixMillis, ClockError> {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map_err(|_| ClockError::TimeBeforeUnixEpoch)
        .map(|duration| duration.as_millis() as UnixMillis)
}

/// The first tick strictly after `now` and how long until it fires.
fn next_tick_with_delay(
    config: &Config,
    now: UnixMillis,
    genesis_time: UnixSeconds,
) -> (Tick, UnixMillis) {
    let genesis_millis = genesis_time * 1000;

    if now < genesis_millis {
        return (Tick::start_of_slot(GENESIS_SLOT), genesis_millis - now);
    }

    let half_slot = config.slot_duration_millis() / 2;
    let half_ticks_since_genesis = (now - genesis_millis) / half_slot + 1;

    let slot = GENESIS_SLOT + half_ticks_since_genesis / 2;
    let kind = if half_ticks_since_genesis % 2 == 0 {
        TickKind::SlotStart
    } else {
        TickKind::SlotMidpoint
    };

    let delay = genesis_millis + half_ticks_since_genesis * half_slot - now;

    (Tick { slot, kind }, delay)
}

#[cfg(test)]
mod tests {
    use futures::future::FutureExt as _;
    use test_case::test_case;

    use super::*;

    #[test_case(0, Tick::start_of_slot(0); "before genesis")]
    #[test_case(600_000, Tick::start_of_slot(0); "at genesis")]
    #[test_case(602_999, Tick::start_of_slot(0); "late in the first half slot")]
    #[test_case(603_000, Tick { slot: 0, kind: TickKind::SlotMidpoint }; "at the first midpoint")]
    #[test_case(606_000, Tick::start_of_slot(1); "at the second slot")]
    #[test_case(621_500, Tick { slot: 3, kind: TickKind::SlotMidpoint }; "mid fourth slot")]
    fn tick_at_time(now: UnixMillis, expected: Tick) {
        assert_eq!(Tick::at_time(&Config::minimal(), now, 600), expected);
    }

    #[test_case(599_000, Tick::start_of_slot(0), 1000; "before genesis")]
    #[test_case(600_000, Tick { slot: 0, kind: TickKind::SlotMidpoint }, 3000; "at genesis")]
    #[test_case(602_000, Tick { slot: 0, kind: TickKind::SlotMidpoint }, 1000; "during the first half slot")]
    #[test_case(603_000, Tick::start_of_slot(1), 3000; "at the first midpoint")]
    fn next_tick(now: UnixMillis, expected: Tick, expected_delay: UnixMillis) {
        let (tick, delay) = next_tick_with_delay(&Config::minimal(), now, 600);
        assert_eq!(tick, expected);
        assert_eq!(delay, expected_delay);
    }

    #[test]
    fn ticks_alternate_between_start_and_midpoint() {
        let start = Tick::start_of_slot(4);
        let midpoint = start.next().expect("slots do not overflow here");
        let next_start = midpoint.next().expect("slots do not overflow here");

        assert_eq!(midpoint.kind, TickKind::SlotMidpoint);
        assert_eq!(midpoint.slot, 4);
        assert_eq!(next_start, Tick::start_of_slot(5));
    }

    #[tokio::test(start_paused = true)]
    async fn the_stream_fires_twice_per_slot() -> Result<()> {
        let config = Config::minimal();
        let genesis_time = unix_millis(SystemTime::now())? / 1000 + 1;

        let mut ticks = ticks(&config, genesis_time)?;
        let mut next = || ticks.next().now_or_never().flatten().transpose();

        assert_eq!(next()?, None);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(next()?, Some(Tick::start_of_slot(0)));
        assert_eq!(next()?, None);

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(
            next()?,
            Some(Tick {
                slot: 0,
                kind: TickKind::SlotMidpoint,
            }),
        );

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(next()?, Some(Tick::start_of_slot(1)));

        Ok(())
    }
}
