//! Spatial queries against the lane network.
//!
//! Every query starts from a lane but considers the whole chain of lanes reachable
//! through its front and back connections, so positions which have crossed into a
//! connected lane still resolve. Travel distances are continuous along a chain.

use super::Network;
use crate::math::{heading, project_onto_line, projects_onto_segment, Point2d};
use crate::vehicle::Vehicle;
use crate::{LaneId, VehicleId, VehicleSet};
use cgmath::prelude::*;

/// Tolerance for deciding whether a node lies ahead of a position, in m.
pub const EPSILON: f64 = 0.001;

/// The resolution of cache keys, in m.
const CACHE_RESOLUTION: f64 = 1e-6;

/// A node on a lane's centre line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeRef {
    pub lane: LaneId,
    pub index: usize,
}

/// A segment of a lane's centre line, or a single node if `second` is `None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    pub lane: LaneId,
    pub first: usize,
    pub second: Option<usize>,
}

/// A position quantized for use as a cache key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct PosKey(i64, i64);

impl From<Point2d> for PosKey {
    fn from(pos: Point2d) -> Self {
        let q = |v: f64| (v / CACHE_RESOLUTION).round() as i64;
        Self(q(pos.x), q(pos.y))
    }
}

impl Network {
    /// Iterates over the given lane and the lanes ahead of it.
    pub fn chain_forward(&self, lane: LaneId) -> impl Iterator<Item = LaneId> + '_ {
        std::iter::successors(Some(lane), |id| self.lanes[*id].front)
    }

    /// Iterates over the given lane and the lanes behind it.
    pub fn chain_backward(&self, lane: LaneId) -> impl Iterator<Item = LaneId> + '_ {
        std::iter::successors(Some(lane), |id| self.lanes[*id].back)
    }

    /// Finds the centre line node closest to `pos` among the lanes connected to `lane`.
    pub fn closest_node(&self, lane: LaneId, pos: Point2d) -> NodeRef {
        let key = PosKey::from(pos);
        if let Some(node) = self.lanes[lane].node_cache.borrow().get(&key) {
            return *node;
        }

        let mut closest = NodeRef { lane, index: 0 };
        let mut dist = f64::INFINITY;
        for id in self.chain_forward(lane).chain(self.chain_backward(lane)) {
            for (index, node) in self.lanes[id].center.iter().enumerate() {
                let d = pos.distance(*node);
                if d < dist {
                    dist = d;
                    closest = NodeRef { lane: id, index };
                }
            }
        }

        self.lanes[lane].node_cache.borrow_mut().insert(key, closest);
        closest
    }

    /// Finds the centre line segment adjacent to the closest node which `pos` projects onto.
    /// If there is no such segment, the closest node is returned on its own.
    pub fn closest_segment(&self, lane: LaneId, pos: Point2d) -> Segment {
        let key = PosKey::from(pos);
        if let Some(segment) = self.lanes[lane].segment_cache.borrow().get(&key) {
            return *segment;
        }

        let segment = self.find_segment(lane, pos);
        self.lanes[lane].segment_cache.borrow_mut().insert(key, segment);
        segment
    }

    fn find_segment(&self, lane: LaneId, pos: Point2d) -> Segment {
        let NodeRef { lane, index } = self.closest_node(lane, pos);
        let l = &self.lanes[lane];
        let last = l.center.len() - 1;
        let on = |l: LaneId, first: usize, second: usize| {
            let c = &self.lanes[l].center;
            projects_onto_segment(pos, c[first], c[second]).then_some(Segment {
                lane: l,
                first,
                second: Some(second),
            })
        };

        let behind = if index > 0 {
            on(lane, index - 1, index)
        } else {
            l.back
                .map(|back| (back, self.lanes[back].center.len()))
                .filter(|(_, len)| *len >= 2)
                .and_then(|(back, len)| on(back, len - 2, len - 1))
        };
        if let Some(segment) = behind {
            return segment;
        }

        let ahead = if index < last {
            on(lane, index, index + 1)
        } else {
            l.front
                .filter(|front| self.lanes[*front].center.len() >= 2)
                .and_then(|front| on(front, 0, 1))
        };

        ahead.unwrap_or(Segment {
            lane,
            first: index,
            second: None,
        })
    }

    /// Projects `pos` onto the closest segment of the lane chain.
    pub fn projected_position(&self, lane: LaneId, pos: Point2d) -> Point2d {
        let segment = self.closest_segment(lane, pos);
        let c = &self.lanes[segment.lane].center;
        match segment.second {
            Some(second) => project_onto_line(pos, c[segment.first], c[second]),
            None => c[segment.first],
        }
    }

    /// The travel distance along the lane chain at the projection of `pos`.
    pub fn travel_distance(&self, lane: LaneId, pos: Point2d) -> f64 {
        let segment = self.closest_segment(lane, pos);
        let l = &self.lanes[segment.lane];
        let first = l.center[segment.first];
        let base = l.accumulated[segment.first];
        match segment.second {
            Some(second) => base + first.distance(project_onto_line(pos, first, l.center[second])),
            None => base,
        }
    }

    /// The absolute difference in travel distance between two positions.
    pub fn travel_gap(&self, lane: LaneId, a: Point2d, b: Point2d) -> f64 {
        (self.travel_distance(lane, a) - self.travel_distance(lane, b)).abs()
    }

    /// The gap between the bumpers of two vehicles along the lane chain.
    /// Negative if the vehicles overlap.
    pub fn bumper_distance(&self, lane: LaneId, a: &Vehicle, b: &Vehicle) -> f64 {
        self.travel_gap(lane, a.position(), b.position()) - a.half_length() - b.half_length()
    }

    /// The speed of a vehicle along the lane chain, which is never negative.
    pub fn projected_velocity(&self, lane: LaneId, vehicle: &Vehicle) -> f64 {
        let segment = self.closest_segment(lane, vehicle.position());
        let c = &self.lanes[segment.lane].center;
        let (first, second) = match segment.second {
            Some(second) => (segment.first, second),
            None if c.len() < 2 => return vehicle.velocity(),
            None if segment.first == 0 => (0, 1),
            None => (segment.first - 1, segment.first),
        };
        let (first, second) = (first.min(second), first.max(second));

        let dir = c[second] - c[first];
        if dir.magnitude2() == 0.0 {
            return vehicle.velocity();
        }
        let vel = heading(vehicle.orientation()) * vehicle.velocity();
        vel.dot(dir.normalize()).abs()
    }

    /// The rate at which `a` closes in on `b` along the lane chain.
    /// Negative if the gap is opening; swapping the arguments negates the result.
    pub fn approaching_velocity(&self, lane: LaneId, a: &Vehicle, b: &Vehicle) -> f64 {
        self.projected_velocity(lane, a) - self.projected_velocity(lane, b)
    }

    /// Finds the nearest vehicle at or ahead of `pos`, searching forward along the lane chain.
    ///
    /// # Parameters
    /// * `vehicles` - The vehicles in the simulation
    /// * `lane` - The lane to start from
    /// * `pos` - The position to search from
    /// * `exclude` - A vehicle to ignore, usually the one at `pos`
    pub fn find_front_vehicle(
        &self,
        vehicles: &VehicleSet,
        lane: LaneId,
        pos: Point2d,
        exclude: Option<VehicleId>,
    ) -> Option<VehicleId> {
        let start = self.closest_node(lane, pos).lane;
        let dist = self.travel_distance(start, pos);
        self.chain_forward(start).find_map(|id| {
            self.lanes[id].vehicles.iter().copied().find(|v| {
                Some(*v) != exclude && dist <= self.travel_distance(id, vehicles[*v].position())
            })
        })
    }

    /// Finds the nearest vehicle at or behind `pos`, searching backward along the lane chain.
    /// See [Self::find_front_vehicle].
    pub fn find_back_vehicle(
        &self,
        vehicles: &VehicleSet,
        lane: LaneId,
        pos: Point2d,
        exclude: Option<VehicleId>,
    ) -> Option<VehicleId> {
        let start = self.closest_node(lane, pos).lane;
        let dist = self.travel_distance(start, pos);
        self.chain_backward(start).find_map(|id| {
            self.lanes[id].vehicles.iter().rev().copied().find(|v| {
                Some(*v) != exclude && dist >= self.travel_distance(id, vehicles[*v].position())
            })
        })
    }

    /// Finds the next centre line node ahead of `pos`, which may be on a connected lane.
    /// Returns `None` at the end of the lane chain.
    pub fn next_node(&self, lane: LaneId, pos: Point2d) -> Option<Point2d> {
        let dist = self.travel_distance(lane, pos);
        let NodeRef { lane, index } = self.closest_node(lane, pos);
        let l = &self.lanes[lane];
        if l.accumulated[index] - EPSILON > dist {
            Some(l.center[index])
        } else if index + 1 < l.center.len() {
            Some(l.center[index + 1])
        } else {
            l.front
                .and_then(|front| self.lanes[front].center.get(1))
                .copied()
        }
    }

    /// Travels `distance` along the lane chain from `pos`, moving node to node.
    /// Returns `None` if the end of the chain is reached first.
    pub fn traverse(&self, lane: LaneId, pos: Point2d, mut distance: f64) -> Option<Point2d> {
        let mut curr = pos;
        while let Some(succ) = self.next_node(lane, curr) {
            if succ == curr {
                log::warn!("Traversal from {:?} is stuck at node {:?}", pos, succ);
                return None;
            }
            let step = curr.distance(succ);
            if distance < step {
                return Some(curr + (succ - curr) * (distance / step));
            }
            distance -= step;
            curr = succ;
        }
        None
    }
}
