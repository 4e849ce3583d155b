use heapless::Vec;

use super::{Anchor, Position};
use crate::configs::{AnchorSet, MAX_ANCHORS};

impl<'a> AnchorSet<'a> {
    /// Picks the 4 anchors closest to `last_fix`
    ///
    /// Anchors come back ordered by distance, closest first. Anchors at the
    /// same distance keep their table order.
    pub fn select_nearby(&self, last_fix: Position) -> [&'a Anchor; 4] {
        select_nearby_anchors(self.anchors(), last_fix)
    }
}

/// Picks the 4 anchors of `anchors` closest to `last_fix`
///
/// The caller guarantees 4 <= `anchors.len()` <= [`MAX_ANCHORS`]; use
/// [`AnchorSet`] to have that checked once up front.
pub(crate) fn select_nearby_anchors(anchors: &[Anchor], last_fix: Position) -> [&Anchor; 4] {
    // Only the ordering matters, so compare squared distances.
    let mut ranked: Vec<(f64, usize), MAX_ANCHORS> = anchors
        .iter()
        .take(MAX_ANCHORS)
        .map(|anchor| anchor.pos.distance_squared(&last_fix))
        .enumerate()
        .map(|(index, distance)| (distance, index))
        .collect();

    // The index tie-break makes the unstable sort behave like a stable one.
    ranked.sort_unstable_by(|(a, a_index), (b, b_index)| {
        a.total_cmp(b).then(a_index.cmp(b_index))
    });

    [
        &anchors[ranked[0].1],
        &anchors[ranked[1].1],
        &anchors[ranked[2].1],
        &anchors[ranked[3].1],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANCHORS: [Anchor; 6] = [
        Anchor::new(1, Position::new(0.0, 0.0, 0.0)),
        Anchor::new(2, Position::new(0.0, 1.8, 0.345)),
        Anchor::new(3, Position::new(1.8, 1.8, 0.0)),
        Anchor::new(4, Position::new(1.8, 0.0, 0.395)),
        Anchor::new(5, Position::new(6.0, 0.0, 2.0)),
        Anchor::new(6, Position::new(6.0, 4.0, 2.5)),
    ];

    fn addrs(selected: [&Anchor; 4]) -> [u16; 4] {
        selected.map(|anchor| anchor.addr)
    }

    #[test]
    fn picks_the_four_nearest() {
        let set = AnchorSet::new(&ANCHORS).unwrap();

        let near_origin = set.select_nearby(Position::new(0.5, 0.5, 0.0));
        assert_eq!(addrs(near_origin), [1, 2, 4, 3]);

        let far_corner = set.select_nearby(Position::new(5.0, 3.0, 2.0));
        assert_eq!(addrs(far_corner), [6, 5, 3, 4]);
    }

    #[test]
    fn origin_before_first_fix() {
        let set = AnchorSet::new(&ANCHORS).unwrap();

        let selected = set.select_nearby(Position::default());

        assert_eq!(addrs(selected), [1, 2, 4, 3]);
    }

    #[test]
    fn invariant_to_table_order() {
        let last_fix = Position::new(4.0, 1.0, 1.0);
        let expected = {
            let mut a = addrs(select_nearby_anchors(&ANCHORS, last_fix));
            a.sort_unstable();
            a
        };

        let mut shuffled = ANCHORS;
        shuffled.reverse();
        shuffled.swap(0, 3);
        shuffled.swap(1, 5);

        let mut selected = addrs(select_nearby_anchors(&shuffled, last_fix));
        selected.sort_unstable();

        assert_eq!(selected, expected);
    }

    #[test]
    fn ties_keep_table_order() {
        let anchors = [
            Anchor::new(10, Position::new(1.0, 0.0, 0.0)),
            Anchor::new(11, Position::new(-1.0, 0.0, 0.0)),
            Anchor::new(12, Position::new(0.0, 1.0, 0.0)),
            Anchor::new(13, Position::new(0.0, -1.0, 0.0)),
            Anchor::new(14, Position::new(0.0, 0.0, 1.0)),
        ];

        let selected = select_nearby_anchors(&anchors, Position::default());

        assert_eq!(addrs(selected), [10, 11, 12, 13]);
    }
}
