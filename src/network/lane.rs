use super::query::{NodeRef, PosKey, Segment};
use crate::math::Point2d;
use crate::{LaneId, RoadId, VehicleId};
use arrayvec::ArrayVec;
use itertools::Itertools;
use std::cell::RefCell;
use std::collections::HashMap;

/// A lane represents a single lane of traffic on a [Road](super::Road).
#[derive(Clone, Debug)]
pub struct Lane {
    /// The lane ID.
    pub(crate) id: LaneId,
    /// The road which owns the lane.
    road: RoadId,
    /// The index of the lane within its road, 0 being the rightmost.
    index: usize,
    /// The centre line nodes.
    pub(crate) center: Vec<Point2d>,
    /// The left boundary nodes, one per centre node.
    pub(crate) left: Vec<Point2d>,
    /// The right boundary nodes, one per centre node.
    pub(crate) right: Vec<Point2d>,
    /// The travel distance at each centre node, continued across back connections.
    pub(crate) accumulated: Vec<f64>,
    /// The vehicles on the lane, ordered by ascending travel distance.
    pub(crate) vehicles: Vec<VehicleId>,
    /// The adjacent lane to the left in the same road.
    pub(crate) left_neighbor: Option<LaneId>,
    /// The adjacent lane to the right in the same road.
    pub(crate) right_neighbor: Option<LaneId>,
    /// The lane which continues this one.
    pub(crate) front: Option<LaneId>,
    /// The lane this one continues.
    pub(crate) back: Option<LaneId>,
    /// The extra MOBIL threshold for changing into this lane.
    pub(crate) bias: f64,
    /// The display colour.
    color: [f32; 3],
    /// Cached results of closest node queries, cleared every frame.
    pub(crate) node_cache: RefCell<HashMap<PosKey, NodeRef>>,
    /// Cached results of closest segment queries, cleared every frame.
    pub(crate) segment_cache: RefCell<HashMap<PosKey, Segment>>,
}

impl Lane {
    /// Creates a new, unconnected lane.
    pub(crate) fn new(id: LaneId, road: RoadId, index: usize) -> Self {
        Self {
            id,
            road,
            index,
            center: vec![],
            left: vec![],
            right: vec![],
            accumulated: vec![],
            vehicles: vec![],
            left_neighbor: None,
            right_neighbor: None,
            front: None,
            back: None,
            bias: 0.0,
            color: [0.5, 0.5, 0.5],
            node_cache: Default::default(),
            segment_cache: Default::default(),
        }
    }

    /// Gets the lane's ID.
    pub fn id(&self) -> LaneId {
        self.id
    }

    /// Gets the ID of the road the lane belongs to.
    pub fn road_id(&self) -> RoadId {
        self.road
    }

    /// The index of the lane within its road, 0 being the rightmost.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The centre line of the lane.
    pub fn center(&self) -> &[Point2d] {
        &self.center
    }

    /// The left boundary of the lane.
    pub fn left(&self) -> &[Point2d] {
        &self.left
    }

    /// The right boundary of the lane.
    pub fn right(&self) -> &[Point2d] {
        &self.right
    }

    /// The travel distance at each centre node.
    pub fn accumulated_distance(&self) -> &[f64] {
        &self.accumulated
    }

    /// The vehicles on the lane, ordered from back to front.
    pub fn vehicles(&self) -> &[VehicleId] {
        &self.vehicles
    }

    /// The display colour of the lane.
    pub fn color(&self) -> [f32; 3] {
        self.color
    }

    /// The adjacent lane to the left.
    pub fn left_neighbor(&self) -> Option<LaneId> {
        self.left_neighbor
    }

    /// The adjacent lane to the right.
    pub fn right_neighbor(&self) -> Option<LaneId> {
        self.right_neighbor
    }

    /// The lanes a vehicle may change into, right before left.
    pub fn neighbors(&self) -> ArrayVec<LaneId, 2> {
        self.right_neighbor
            .into_iter()
            .chain(self.left_neighbor)
            .collect()
    }

    /// The lane which continues this one.
    pub fn front_connection(&self) -> Option<LaneId> {
        self.front
    }

    /// The lane this one continues.
    pub fn back_connection(&self) -> Option<LaneId> {
        self.back
    }

    /// The extra lane changing threshold of the lane.
    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// The boundary polygon of the lane.
    pub fn mesh(&self) -> Vec<Point2d> {
        self.right
            .iter()
            .chain(self.left.iter().rev())
            .copied()
            .collect()
    }

    /// Empties the per-frame query caches.
    pub(crate) fn reset_caches(&self) {
        self.node_cache.borrow_mut().clear();
        self.segment_cache.borrow_mut().clear();
    }

    /// Recomputes the travel distance table from the centre line.
    pub(crate) fn init_accumulated_distances(&mut self) {
        let steps = self
            .center
            .iter()
            .tuple_windows()
            .map(|(a, b)| cgmath::MetricSpace::distance(*a, *b));
        self.accumulated = std::iter::once(0.0)
            .chain(steps.scan(0.0, |dist, step| {
                *dist += step;
                Some(*dist)
            }))
            .take(self.center.len())
            .collect();
    }

    /// Appends a node to the end of the lane, extending the travel distance table.
    pub(crate) fn push_node(&mut self, center: Point2d, left: Point2d, right: Point2d) {
        let dist = match (self.center.last(), self.accumulated.last()) {
            (Some(prev), Some(acc)) => acc + cgmath::MetricSpace::distance(*prev, center),
            _ => 0.0,
        };
        self.center.push(center);
        self.left.push(left);
        self.right.push(right);
        self.accumulated.push(dist);
    }

    /// The position of a vehicle in the ordered vehicle list.
    pub(crate) fn vehicle_index(&self, id: VehicleId) -> Option<usize> {
        self.vehicles.iter().position(|v| *v == id)
    }

    /// Removes the vehicle with the given ID from the lane.
    /// Returns `false` if it was not on the lane.
    pub(crate) fn remove_vehicle(&mut self, id: VehicleId) -> bool {
        match self.vehicle_index(id) {
            Some(idx) => {
                self.vehicles.remove(idx);
                true
            }
            None => false,
        }
    }
}
