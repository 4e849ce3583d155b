mod common;

use embedded_hal_mock::eh1::delay::NoopDelay;

use common::{init_logger, SimRadio, VirtualAnchor};
use uwb_rtls::{
    positioning::{drain, FixQueue, Publish},
    Anchor, AnchorSet, Config, Error, Location, Position, Positioning, PositioningConfig,
    Session,
};

const PAN_ID: u16 = 0xDECA;
const TAG: u16 = 0x1234;

static ANCHORS: [Anchor; 6] = [
    Anchor::new(1, Position::new(0.0, 0.0, 0.0)),
    Anchor::new(2, Position::new(0.0, 1.8, 0.345)),
    Anchor::new(3, Position::new(1.8, 1.8, 0.0)),
    Anchor::new(4, Position::new(1.8, 0.0, 0.395)),
    Anchor::new(5, Position::new(6.0, 0.0, 2.0)),
    Anchor::new(6, Position::new(6.0, 4.0, 2.5)),
];

fn virtual_anchors(anchors: &[Anchor]) -> Vec<VirtualAnchor> {
    anchors
        .iter()
        .map(|anchor| VirtualAnchor::new(anchor.addr, anchor.pos))
        .collect()
}

fn positioning(anchors: &[Anchor], truth: Position) -> Positioning<'_, SimRadio, NoopDelay> {
    init_logger();
    let radio = SimRadio::new(PAN_ID, TAG)
        .with_anchors(&virtual_anchors(anchors))
        .at(truth);
    let session = Session::new(radio, NoopDelay::new(), Config::new(PAN_ID, TAG));

    Positioning::new(
        session,
        AnchorSet::new(anchors).unwrap(),
        PositioningConfig::default(),
    )
}

fn assert_near(actual: Position, expected: Position) {
    assert!(
        actual.distance_squared(&expected).sqrt() < 0.1,
        "{:?} is too far from {:?}",
        actual,
        expected
    );
}

#[test]
fn fix_from_the_four_reference_anchors() {
    let truth = Position::new(0.9, 0.9, 0.2);
    let mut positioning = positioning(&ANCHORS[..4], truth);

    let fix = positioning.perform().unwrap();

    assert_near(fix.pos, truth);
    assert!(fix.error < 0.01, "error = {}", fix.error);
    assert_eq!(positioning.last_fix(), fix.pos);
}

#[test]
fn anchors_follow_the_last_fix() {
    let truth = Position::new(4.5, 2.5, 1.0);
    let mut positioning = positioning(&ANCHORS, truth);

    // Before the first fix, the anchors closest to the origin are used.
    let first = positioning.perform().unwrap();
    assert_near(first.pos, truth);

    let second = positioning.perform().unwrap();
    assert_near(second.pos, truth);

    let polled = &positioning.session_mut().radio_mut().polled;
    assert_eq!(polled[..4], [1, 2, 4, 3]);
    assert_eq!(polled[4..], [6, 3, 5, 4]);
}

#[test]
fn failed_exchange_skips_the_fix() {
    let truth = Position::new(0.9, 0.9, 0.2);
    let mut positioning = positioning(&ANCHORS[..4], truth);
    positioning.session_mut().radio_mut().anchors[3].silent = true;

    let result = positioning.perform();

    assert!(matches!(result, Err(Error::Timeout)), "{:?}", result);
    assert_eq!(positioning.last_fix(), Position::default());
}

#[test]
fn coplanar_anchors_skip_the_fix() {
    let flat = [
        Anchor::new(1, Position::new(0.0, 0.0, 0.0)),
        Anchor::new(2, Position::new(0.0, 1.8, 0.0)),
        Anchor::new(3, Position::new(1.8, 1.8, 0.0)),
        Anchor::new(4, Position::new(1.8, 0.0, 0.0)),
    ];
    let mut positioning = positioning(&flat, Position::new(0.9, 0.9, 1.0));

    assert!(matches!(
        positioning.perform(),
        Err(Error::DegenerateGeometry)
    ));
    assert_eq!(positioning.last_fix(), Position::default());
}

struct Sink(Vec<Location>);

impl Publish for Sink {
    type Error = ();

    fn publish(&mut self, location: &Location) -> Result<(), ()> {
        self.0.push(*location);
        Ok(())
    }
}

#[test]
fn fixes_flow_to_the_sink() {
    let truth = Position::new(0.9, 0.9, 0.2);
    let mut positioning = positioning(&ANCHORS[..4], truth);
    let mut queue = FixQueue::new();
    let (mut producer, mut consumer) = queue.split();

    for _ in 0..4 {
        positioning.step(&mut producer).unwrap();
    }

    // The queue holds 3 fixes; the fourth was dropped.
    let mut sink = Sink(Vec::new());
    assert_eq!(drain(&mut consumer, &mut sink), 3);

    for location in &sink.0 {
        assert!((location.x - 900).abs() < 100, "{:?}", location);
        assert!((location.y - 900).abs() < 100, "{:?}", location);
        assert!((location.z - 200).abs() < 100, "{:?}", location);
    }
}
