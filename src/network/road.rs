use crate::error::LayoutError;
use crate::math::{angle_signed, rotate, Point2d, Vector2d};
use crate::{LaneId, RoadId};
use cgmath::prelude::*;
use itertools::Itertools;

/// A road is a bundle of parallel lanes built from a single centre line.
#[derive(Clone, Debug)]
pub struct Road {
    /// The road ID.
    id: RoadId,
    /// The lanes of the road, ordered right to left.
    pub(crate) lanes: Vec<LaneId>,
}

/// The nodes of one lane generated from a road's path.
#[derive(Clone, Debug, Default)]
pub(crate) struct LaneNodes {
    pub center: Vec<Point2d>,
    pub left: Vec<Point2d>,
    pub right: Vec<Point2d>,
}

impl Road {
    pub(crate) fn new(id: RoadId) -> Self {
        Self { id, lanes: vec![] }
    }

    /// Gets the road's ID.
    pub fn id(&self) -> RoadId {
        self.id
    }

    /// The lanes of the road, ordered from rightmost to leftmost.
    pub fn lanes(&self) -> &[LaneId] {
        &self.lanes
    }

    /// Gets the lane with the given index, 0 being the rightmost.
    pub fn lane(&self, index: usize) -> Option<LaneId> {
        self.lanes.get(index).copied()
    }

    /// The number of lanes.
    pub fn num_lanes(&self) -> usize {
        self.lanes.len()
    }
}

/// Calculates the unit normal of a path at `current`, pointing to the left of the
/// direction of travel and bisecting the turn between the neighbouring nodes.
/// Returns `None` if `current` coincides with either of its neighbours.
pub(crate) fn road_normal(pred: Point2d, current: Point2d, succ: Point2d) -> Option<Vector2d> {
    let ahead = succ - current;
    let back = pred - current;
    let mut angle = angle_signed(ahead, back)?;
    if angle > 0.0 {
        angle -= 360.0;
    }
    Some(rotate(ahead, 0.5 * angle).normalize())
}

/// Generates the nodes of `num_lanes` parallel lanes from a path,
/// which is the centre line of the rightmost lane.
///
/// Every interior point of the path produces one node per lane, so the end points
/// of the path only serve to orient the first and last nodes.
pub(crate) fn lane_nodes(
    path: &[Point2d],
    num_lanes: usize,
    lane_width: f64,
) -> Result<Vec<LaneNodes>, LayoutError> {
    if path.len() < 3 {
        return Err(LayoutError::PathTooShort(path.len()));
    }
    if num_lanes == 0 {
        return Err(LayoutError::NoLanes);
    }

    let mut lanes = vec![LaneNodes::default(); num_lanes];
    for (i, (pred, node, succ)) in path.iter().tuple_windows().enumerate() {
        let normal = road_normal(*pred, *node, *succ).ok_or(if pred == node {
            LayoutError::DegeneratePath(i, i + 1)
        } else {
            LayoutError::DegeneratePath(i + 1, i + 2)
        })?;

        for (j, lane) in lanes.iter_mut().enumerate() {
            let center = *node + normal * (lane_width * j as f64);
            lane.center.push(center);
            lane.left.push(center + normal * (0.5 * lane_width));
            lane.right.push(center - normal * (0.5 * lane_width));
        }
    }

    Ok(lanes)
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn normal_points_left() {
        let n = road_normal(
            Point2d::new(0.0, 0.0),
            Point2d::new(1.0, 0.0),
            Point2d::new(2.0, 0.0),
        )
        .unwrap();
        assert_approx_eq!(n.x, 0.0);
        assert_approx_eq!(n.y, 1.0);

        // Left turn: the normal bisects the inside of the corner
        let n = road_normal(
            Point2d::new(0.0, 0.0),
            Point2d::new(1.0, 0.0),
            Point2d::new(1.0, 1.0),
        )
        .unwrap();
        assert_approx_eq!(n.x, -0.5f64.sqrt());
        assert_approx_eq!(n.y, 0.5f64.sqrt());

        // Right turn: the normal bisects the outside of the corner
        let n = road_normal(
            Point2d::new(0.0, 0.0),
            Point2d::new(1.0, 0.0),
            Point2d::new(1.0, -1.0),
        )
        .unwrap();
        assert_approx_eq!(n.x, 0.5f64.sqrt());
        assert_approx_eq!(n.y, 0.5f64.sqrt());
    }

    #[test]
    fn coincident_points_are_rejected() {
        let path = [
            Point2d::new(0.0, 0.0),
            Point2d::new(10.0, 0.0),
            Point2d::new(10.0, 0.0),
            Point2d::new(20.0, 0.0),
        ];
        assert_eq!(
            lane_nodes(&path, 1, 4.0).unwrap_err(),
            LayoutError::DegeneratePath(1, 2)
        );
        assert_eq!(
            lane_nodes(&path[..2], 1, 4.0).unwrap_err(),
            LayoutError::PathTooShort(2)
        );
        assert_eq!(lane_nodes(&path[1..], 0, 4.0).unwrap_err(), LayoutError::NoLanes);
    }

    #[test]
    fn lanes_are_offset_leftwards() {
        let path = [
            Point2d::new(0.0, 0.0),
            Point2d::new(0.0, 10.0),
            Point2d::new(0.0, 20.0),
            Point2d::new(0.0, 30.0),
        ];
        let lanes = lane_nodes(&path, 3, 4.0).unwrap();
        assert_eq!(lanes.len(), 3);
        for (j, lane) in lanes.iter().enumerate() {
            assert_eq!(lane.center.len(), 2);
            // Travelling north, left is west
            assert_approx_eq!(lane.center[0].x, -4.0 * j as f64);
            assert_approx_eq!(lane.center[1].y, 20.0);
        }
    }
}
