//! The periodic positioning cycle of a tag
//!
//! Each cycle picks the 4 anchors closest to the last fix, ranges against
//! them one after the other and solves for a new fix. Fixes are handed to the
//! downstream transport through a small single-producer, single-consumer
//! queue, so a slow transport never holds up ranging.

use embedded_hal::delay::DelayNs;
use heapless::spsc::{Consumer, Producer};
#[allow(unused_imports)]
use num_traits::Float;

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::{
    configs::{AnchorSet, PositioningConfig},
    radio::Transceiver,
    rtls::{find_position, Fix, Measurement, Position},
    twr::Session,
    Error,
};

/// Size of the fix queue; it holds one fix less than this
pub const FIX_QUEUE_LEN: usize = 4;

/// Queue between the positioning cycle and the downstream transport
pub type FixQueue = heapless::spsc::Queue<Fix, FIX_QUEUE_LEN>;

/// Tag-side positioning
pub struct Positioning<'a, R, D> {
    session: Session<R, D>,
    anchors: AnchorSet<'a>,
    last_fix: Position,
    config: PositioningConfig,
}

impl<'a, R, D> Positioning<'a, R, D>
where
    R: Transceiver,
    D: DelayNs,
{
    /// Creates the positioning cycle on top of a ranging session
    ///
    /// Until the first fix, anchors are selected by their distance to the
    /// origin.
    pub fn new(session: Session<R, D>, anchors: AnchorSet<'a>, config: PositioningConfig) -> Self {
        Positioning {
            session,
            anchors,
            last_fix: Position::default(),
            config,
        }
    }

    /// Runs one positioning cycle
    ///
    /// Any failed exchange ends the cycle without a fix; no distance is
    /// guessed. The last fix is only updated on success.
    pub fn perform(&mut self) -> Result<Fix, Error<R::Error>> {
        let selected = self.anchors.select_nearby(self.last_fix);
        let mut measurements = [Measurement::default(); 4];

        for (anchor, measurement) in selected.iter().zip(measurements.iter_mut()) {
            let distance = self.session.initiate(anchor.addr).map_err(|error| {
                warn!("ranging with anchor {} failed: {}", anchor.addr, error.kind());
                error
            })?;

            *measurement = Measurement {
                anchor_pos: anchor.pos,
                distance,
            };
            self.session.delay_mut().delay_ms(self.config.exchange_gap_ms);
        }

        let fix = find_position(&measurements).map_err(|error| {
            warn!(
                "no fix, anchors {} {} {} {} are coplanar",
                selected[0].addr,
                selected[1].addr,
                selected[2].addr,
                selected[3].addr
            );
            error
        })?;
        self.last_fix = fix.pos;

        info!(
            "fix {} / {} / {}, error {}",
            fix.pos.x, fix.pos.y, fix.pos.z, fix.error
        );
        Ok(fix)
    }

    /// Runs one positioning cycle and queues the fix, if there is one
    pub fn step(
        &mut self,
        producer: &mut Producer<'_, Fix, FIX_QUEUE_LEN>,
    ) -> Result<Fix, Error<R::Error>> {
        let fix = self.perform()?;
        publish(producer, fix);
        Ok(fix)
    }

    /// Runs the positioning cycle forever, once per period
    ///
    /// `uptime_ms` is a monotonic millisecond clock. Fixes are queued into
    /// `producer`; the other end is emptied with [`drain`].
    pub fn run<F>(&mut self, mut uptime_ms: F, producer: &mut Producer<'_, Fix, FIX_QUEUE_LEN>) -> !
    where
        F: FnMut() -> u32,
    {
        let mut cadence = Cadence::new(self.config.period_ms, uptime_ms());

        loop {
            // Failures are logged where they happen; the next cycle retries.
            let _ = self.step(producer);

            let sleep_ms = cadence.next_delay(uptime_ms());
            debug!("next positioning in {} ms", sleep_ms);
            self.session.delay_mut().delay_ms(sleep_ms);
        }
    }

    /// Position of the last fix, the origin before the first one
    pub fn last_fix(&self) -> Position {
        self.last_fix
    }

    /// The ranging session
    pub fn session_mut(&mut self) -> &mut Session<R, D> {
        &mut self.session
    }

    /// Ends positioning and hands back the ranging session
    pub fn release(self) -> Session<R, D> {
        self.session
    }
}

/// Fixed-period schedule of the positioning cycle
///
/// Deadlines are spaced one period apart. When a cycle overruns its deadline,
/// the schedule slips forward to the current time instead of running cycles
/// back to back to catch up.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct Cadence {
    period_ms: u32,
    last_ms: u32,
}

impl Cadence {
    /// Starts a schedule whose first deadline is one period after `start_ms`
    pub fn new(period_ms: u32, start_ms: u32) -> Self {
        Cadence {
            period_ms,
            last_ms: start_ms,
        }
    }

    /// Returns how long to sleep from `now_ms` until the next cycle
    ///
    /// The millisecond clock may wrap around.
    pub fn next_delay(&mut self, now_ms: u32) -> u32 {
        let deadline = self.last_ms.wrapping_add(self.period_ms);
        let remaining = deadline.wrapping_sub(now_ms) as i32;

        if remaining >= 0 {
            self.last_ms = deadline;
            remaining as u32
        } else {
            warn!("positioning overran its period by {} ms", remaining.unsigned_abs());
            self.last_ms = now_ms;
            0
        }
    }
}

/// Queues a fix for the downstream transport
///
/// If the queue is full the new fix is dropped. Returns whether it was queued.
pub fn publish(producer: &mut Producer<'_, Fix, FIX_QUEUE_LEN>, fix: Fix) -> bool {
    match producer.enqueue(fix) {
        Ok(()) => true,
        Err(_) => {
            warn!("fix queue is full, dropping fix");
            false
        }
    }
}

/// A fix in the form sent downstream
///
/// All values are in millimetres, saturating at the limits of `i16`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Location {
    /// x coordinate
    pub x: i16,
    /// y coordinate
    pub y: i16,
    /// z coordinate
    pub z: i16,
    /// Residual of the fix, scaled like a distance
    pub err: i16,
}

impl From<&Fix> for Location {
    fn from(fix: &Fix) -> Self {
        Location {
            x: to_millimetres(fix.pos.x),
            y: to_millimetres(fix.pos.y),
            z: to_millimetres(fix.pos.z),
            err: to_millimetres(fix.error),
        }
    }
}

fn to_millimetres(meters: f64) -> i16 {
    // Float to int casts saturate, and map NaN to 0.
    (meters * 1000.0).round() as i16
}

/// The downstream transport of locations
pub trait Publish {
    /// Error of the transport
    type Error;

    /// Sends one location, fire and forget
    fn publish(&mut self, location: &Location) -> Result<(), Self::Error>;
}

/// Sends every queued fix downstream
///
/// Best effort: a location the sink fails to take is logged and dropped.
/// Returns the number of locations sent.
pub fn drain<P>(consumer: &mut Consumer<'_, Fix, FIX_QUEUE_LEN>, sink: &mut P) -> usize
where
    P: Publish,
{
    let mut sent = 0;

    while let Some(fix) = consumer.dequeue() {
        let location = Location::from(&fix);

        match sink.publish(&location) {
            Ok(()) => {
                sent += 1;
                info!(
                    "published location {} / {} / {} mm",
                    location.x, location.y, location.z
                );
            }
            Err(_) => warn!("publishing location failed"),
        }
    }

    sent
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Collect(Vec<Location>);

    impl Publish for Collect {
        type Error = ();

        fn publish(&mut self, location: &Location) -> Result<(), ()> {
            self.0.push(*location);
            Ok(())
        }
    }

    struct Refuse;

    impl Publish for Refuse {
        type Error = ();

        fn publish(&mut self, _: &Location) -> Result<(), ()> {
            Err(())
        }
    }

    fn fix(x: f64) -> Fix {
        Fix {
            pos: Position::new(x, 0.0, 0.0),
            error: 0.0,
        }
    }

    #[test]
    fn cadence_keeps_fixed_period() {
        let mut cadence = Cadence::new(200, 1000);

        assert_eq!(cadence.next_delay(1050), 150);
        assert_eq!(cadence.next_delay(1390), 10);
        assert_eq!(cadence.next_delay(1600), 0);
    }

    #[test]
    fn cadence_slips_forward_on_overrun() {
        let mut cadence = Cadence::new(200, 1000);

        assert_eq!(cadence.next_delay(1450), 0);
        // The schedule restarted from the overrun, with no catch-up cycles.
        assert_eq!(cadence.next_delay(1500), 150);
    }

    #[test]
    fn cadence_across_clock_wrap() {
        let mut cadence = Cadence::new(200, u32::MAX - 50);

        assert_eq!(cadence.next_delay(u32::MAX), 150);
        assert_eq!(cadence.next_delay(100), 249);
    }

    #[test]
    fn full_queue_drops_newest() {
        let mut queue = FixQueue::new();
        let (mut producer, mut consumer) = queue.split();

        assert!(publish(&mut producer, fix(1.0)));
        assert!(publish(&mut producer, fix(2.0)));
        assert!(publish(&mut producer, fix(3.0)));
        assert!(!publish(&mut producer, fix(4.0)));

        let mut sink = Collect(Vec::new());
        assert_eq!(drain(&mut consumer, &mut sink), 3);
        let xs: Vec<i16> = sink.0.iter().map(|location| location.x).collect();
        assert_eq!(xs, [1000, 2000, 3000]);
    }

    #[test]
    fn failed_publish_still_empties_queue() {
        let mut queue = FixQueue::new();
        let (mut producer, mut consumer) = queue.split();
        publish(&mut producer, fix(1.0));
        publish(&mut producer, fix(2.0));

        assert_eq!(drain(&mut consumer, &mut Refuse), 0);
        assert!(consumer.dequeue().is_none());
    }

    #[test]
    fn location_in_millimetres() {
        let location = Location::from(&Fix {
            pos: Position::new(0.9, -1.2345, 0.2),
            error: 0.0216,
        });

        assert_eq!(
            location,
            Location {
                x: 900,
                y: -1235,
                z: 200,
                err: 22,
            }
        );
    }

    #[test]
    fn location_saturates() {
        let location = Location::from(&Fix {
            pos: Position::new(40.0, -40.0, f64::NAN),
            error: 1e9,
        });

        assert_eq!(location.x, i16::MAX);
        assert_eq!(location.y, i16::MIN);
        assert_eq!(location.z, 0);
        assert_eq!(location.err, i16::MAX);
    }
}
