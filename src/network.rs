use crate::error::LayoutError;
use crate::math::{Point2d, Vector2d};
use crate::{LaneId, LaneSet, RoadId, VehicleId, VehicleSet};
pub use lane::Lane;
pub use query::{NodeRef, Segment};
pub use road::Road;
use road::{lane_nodes, road_normal};
use slotmap::SlotMap;

mod lane;
mod query;
mod road;

/// The lane network: an arena of roads and the lanes they own.
///
/// Lanes refer to their neighbours and connections by ID, so the
/// network can be freely connected without ownership cycles.
#[derive(Clone, Debug)]
pub struct Network {
    /// The roads in the network.
    roads: SlotMap<RoadId, Road>,
    /// The lanes of all roads.
    pub(crate) lanes: LaneSet,
    /// The width of every lane in m.
    lane_width: f64,
}

impl Network {
    /// Creates an empty network.
    pub fn new(lane_width: f64) -> Self {
        Self {
            roads: Default::default(),
            lanes: Default::default(),
            lane_width,
        }
    }

    /// The width of every lane in m.
    pub fn lane_width(&self) -> f64 {
        self.lane_width
    }

    /// Adds a road of `num_lanes` parallel lanes.
    ///
    /// # Parameters
    /// * `path` - The centre line of the rightmost lane, at least 3 points.
    ///   Additional lanes are placed to its left.
    /// * `num_lanes` - The number of lanes
    pub fn add_road(&mut self, path: &[Point2d], num_lanes: usize) -> Result<RoadId, LayoutError> {
        let nodes = lane_nodes(path, num_lanes, self.lane_width)?;
        let road_id = self.roads.insert_with_key(Road::new);

        let lane_ids = nodes
            .into_iter()
            .enumerate()
            .map(|(index, nodes)| {
                self.lanes.insert_with_key(|id| {
                    let mut lane = Lane::new(id, road_id, index);
                    lane.center = nodes.center;
                    lane.left = nodes.left;
                    lane.right = nodes.right;
                    lane.init_accumulated_distances();
                    lane
                })
            })
            .collect::<Vec<_>>();

        for (index, id) in lane_ids.iter().enumerate() {
            let lane = &mut self.lanes[*id];
            lane.right_neighbor = index.checked_sub(1).map(|i| lane_ids[i]);
            lane.left_neighbor = lane_ids.get(index + 1).copied();
        }

        self.roads[road_id].lanes = lane_ids;
        Ok(road_id)
    }

    /// Connects the end of the `from` road to the start of the `to` road.
    ///
    /// Each pair `(a, b)` joins lane `a` of `from` to lane `b` of `to`. The last node of
    /// lane `a` is spliced onto the first node of lane `b`, the boundaries at the junction
    /// are re-oriented, and the travel distances of lane `b` and every lane ahead of it are
    /// offset so they continue from lane `a`. Pairs which shift in lock-step with another
    /// pair keep the junction parallel across lanes.
    pub fn connect(
        &mut self,
        from: RoadId,
        to: RoadId,
        pairs: &[(usize, usize)],
    ) -> Result<(), LayoutError> {
        let from_lanes = self.roads[from].lanes.clone();
        let to_lanes = self.roads[to].lanes.clone();
        let lane_index = |lanes: &[LaneId], index: usize| {
            lanes.get(index).copied().ok_or(LayoutError::LaneIndex {
                index,
                count: lanes.len(),
            })
        };

        for &(a, b) in pairs {
            let pred = lane_index(&from_lanes, a)?;
            let succ = lane_index(&to_lanes, b)?;
            if self.lanes[pred].center.len() < 2 || self.lanes[succ].center.len() < 2 {
                return Err(LayoutError::LaneTooShort);
            }
            if self.chain_forward(succ).any(|id| id == pred)
                || self.chain_backward(pred).any(|id| id == succ)
            {
                return Err(LayoutError::Cycle);
            }
        }

        for &(a, b) in pairs {
            let pred = from_lanes[a];
            let succ = to_lanes[b];

            let (pred_prev, pred_last) = {
                let c = &self.lanes[pred].center;
                (c[c.len() - 2], c[c.len() - 1])
            };
            let (succ_first, succ_next) = {
                let c = &self.lanes[succ].center;
                (c[0], c[1])
            };
            let pred_normal = road_normal(pred_prev, pred_last, succ_first)
                .ok_or(LayoutError::DegenerateJunction)?;
            let succ_normal = road_normal(pred_last, succ_first, succ_next)
                .ok_or(LayoutError::DegenerateJunction)?;

            self.place_last_node(pred, pred_last, pred_normal);
            self.place_first_node(succ, succ_first, succ_normal);

            // Moving the junction of one lane moves the junctions of the lanes paired beside it
            for i in (1..).take_while(|i| a + i < from_lanes.len()) {
                if !pairs.contains(&(a + i, b + i)) {
                    continue;
                }
                let offset = self.lane_width * i as f64;
                self.place_last_node(
                    from_lanes[a + i],
                    pred_last + pred_normal * offset,
                    pred_normal,
                );
                self.place_first_node(
                    to_lanes[b + i],
                    succ_first + succ_normal * offset,
                    succ_normal,
                );
            }

            let (center, left, right) = {
                let l = &self.lanes[succ];
                (l.center[0], l.left[0], l.right[0])
            };
            self.lanes[pred].push_node(center, left, right);
        }

        for &(a, b) in pairs {
            let pred = from_lanes[a];
            let succ = to_lanes[b];
            self.lanes[pred].front = Some(succ);
            self.lanes[succ].back = Some(pred);

            let offset = self.lanes[pred].accumulated.last().copied().unwrap_or(0.0);
            let chain = self.chain_forward(succ).collect::<Vec<_>>();
            for id in chain {
                for dist in &mut self.lanes[id].accumulated {
                    *dist += offset;
                }
            }
        }

        Ok(())
    }

    /// Moves the last node of a lane, keeping the travel distances consistent.
    fn place_last_node(&mut self, lane: LaneId, center: Point2d, normal: Vector2d) {
        let half = 0.5 * self.lane_width;
        let l = &mut self.lanes[lane];
        let idx = l.center.len() - 1;
        l.center[idx] = center;
        l.left[idx] = center + normal * half;
        l.right[idx] = center - normal * half;
        Self::refresh_distances(l);
    }

    /// Moves the first node of a lane, keeping the travel distances consistent.
    fn place_first_node(&mut self, lane: LaneId, center: Point2d, normal: Vector2d) {
        let half = 0.5 * self.lane_width;
        let l = &mut self.lanes[lane];
        l.center[0] = center;
        l.left[0] = center + normal * half;
        l.right[0] = center - normal * half;
        Self::refresh_distances(l);
    }

    /// Recomputes a lane's travel distances while keeping the distance at its first node.
    fn refresh_distances(lane: &mut Lane) {
        let base = lane.accumulated.first().copied().unwrap_or(0.0);
        lane.init_accumulated_distances();
        for dist in &mut lane.accumulated {
            *dist += base;
        }
    }

    /// Sets the extra lane changing threshold for vehicles changing into the lane.
    pub fn set_lane_bias(&mut self, lane: LaneId, bias: f64) {
        self.lanes[lane].bias = bias;
    }

    /// Gets a reference to the road with the given ID.
    pub fn road(&self, id: RoadId) -> &Road {
        &self.roads[id]
    }

    /// Gets a reference to the lane with the given ID.
    pub fn lane(&self, id: LaneId) -> &Lane {
        &self.lanes[id]
    }

    /// Gets the lane with the given index on a road.
    pub fn road_lane(&self, road: RoadId, index: usize) -> Option<LaneId> {
        self.roads.get(road)?.lane(index)
    }

    /// Returns an iterator over all the roads in the network.
    pub fn iter_roads(&self) -> impl Iterator<Item = &Road> {
        self.roads.values()
    }

    /// Returns an iterator over all the lanes in the network.
    pub fn iter_lanes(&self) -> impl Iterator<Item = &Lane> {
        self.lanes.values()
    }

    /// The boundary polygon of a road: the right edge of its rightmost lane
    /// followed by the left edge of its leftmost lane, reversed.
    pub fn road_mesh(&self, id: RoadId) -> Vec<Point2d> {
        let road = &self.roads[id];
        let (Some(first), Some(last)) = (road.lanes.first(), road.lanes.last()) else {
            return vec![];
        };
        self.lanes[*first]
            .right
            .iter()
            .chain(self.lanes[*last].left.iter().rev())
            .copied()
            .collect()
    }

    /// Clears the spatial query caches of every lane.
    pub(crate) fn reset_caches(&self) {
        for lane in self.lanes.values() {
            lane.reset_caches();
        }
    }

    /// Inserts a vehicle into a lane's ordered vehicle list, behind the vehicles ahead of it.
    pub(crate) fn insert_vehicle(&mut self, vehicles: &VehicleSet, lane: LaneId, id: VehicleId) {
        let pos = vehicles[id].position();
        let back = self.find_back_vehicle(vehicles, lane, pos, Some(id));
        let l = &mut self.lanes[lane];
        let idx = back
            .and_then(|back| l.vehicle_index(back))
            .map_or(0, |idx| idx + 1);
        l.vehicles.insert(idx, id);
    }

    /// Removes a vehicle from a lane's vehicle list.
    /// Returns `false` if it was not on the lane.
    pub(crate) fn remove_vehicle(&mut self, lane: LaneId, id: VehicleId) -> bool {
        self.lanes[lane].remove_vehicle(id)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use cgmath::MetricSpace;

    fn straight(x0: f64, x1: f64, y: f64, n: usize) -> Vec<Point2d> {
        (0..n)
            .map(|i| Point2d::new(x0 + (x1 - x0) * i as f64 / (n - 1) as f64, y))
            .collect()
    }

    #[test]
    fn single_lane_boundaries() {
        let mut network = Network::new(4.0);
        let road = network.add_road(&straight(0.0, 30.0, 0.0, 4), 1).unwrap();
        let lane = network.lane(network.road(road).lanes()[0]);

        assert_eq!(lane.center().len(), 2);
        for i in 0..2 {
            let c = lane.center()[i];
            assert_approx_eq!(c.y, 0.0);
            assert_approx_eq!(lane.left()[i].y, 2.0);
            assert_approx_eq!(lane.right()[i].y, -2.0);
            assert_approx_eq!(lane.left()[i].x, c.x);
            assert_approx_eq!(lane.right()[i].x, c.x);
        }
        assert_eq!(lane.accumulated_distance(), &[0.0, 10.0]);
        assert_eq!(lane.neighbors().len(), 0);
    }

    #[test]
    fn neighbours_follow_lane_index() {
        let mut network = Network::new(4.0);
        let road = network.add_road(&straight(0.0, 30.0, 0.0, 4), 3).unwrap();
        let ids = network.road(road).lanes().to_vec();

        assert_eq!(network.lane(ids[0]).right_neighbor(), None);
        assert_eq!(network.lane(ids[0]).left_neighbor(), Some(ids[1]));
        assert_eq!(network.lane(ids[1]).neighbors().as_slice(), &[ids[0], ids[2]]);
        assert_eq!(network.lane(ids[2]).left_neighbor(), None);

        let mesh = network.road_mesh(road);
        assert_eq!(mesh.len(), 4);
        assert_approx_eq!(mesh[0].y, -2.0);
        assert_approx_eq!(mesh[3].y, 10.0);
    }

    #[test]
    fn connection_continues_travel_distance() {
        let mut network = Network::new(4.0);
        let a = network.add_road(&straight(0.0, 30.0, 0.0, 4), 2).unwrap();
        let b = network.add_road(&straight(40.0, 70.0, 0.0, 4), 2).unwrap();
        network.connect(a, b, &[(0, 0), (1, 1)]).unwrap();

        for index in 0..2 {
            let pred = network.lane(network.road_lane(a, index).unwrap());
            let succ = network.lane(network.road_lane(b, index).unwrap());
            assert_eq!(pred.front_connection(), Some(succ.id()));
            assert_eq!(succ.back_connection(), Some(pred.id()));

            // The last node of the predecessor is the first node of the successor
            assert_eq!(pred.center().len(), 3);
            assert_eq!(pred.center()[2], succ.center()[0]);

            let pred_acc = pred.accumulated_distance();
            let succ_acc = succ.accumulated_distance();
            assert!(pred_acc.windows(2).all(|w| w[0] < w[1]));
            assert_approx_eq!(succ_acc[0], pred_acc[2]);
            assert_approx_eq!(succ_acc[0], 40.0);
            assert!(succ_acc[1] > succ_acc[0]);
        }
    }

    #[test]
    fn connection_offsets_whole_chain() {
        let mut network = Network::new(4.0);
        let a = network.add_road(&straight(0.0, 30.0, 0.0, 4), 1).unwrap();
        let b = network.add_road(&straight(40.0, 70.0, 0.0, 4), 1).unwrap();
        let c = network.add_road(&straight(80.0, 110.0, 0.0, 4), 1).unwrap();
        network.connect(b, c, &[(0, 0)]).unwrap();
        network.connect(a, b, &[(0, 0)]).unwrap();

        let lane_c = network.lane(network.road_lane(c, 0).unwrap());
        // c starts 40 m along b, which starts 40 m along a
        assert_approx_eq!(lane_c.accumulated_distance()[0], 80.0);
        assert_approx_eq!(lane_c.accumulated_distance()[1], 90.0);
    }

    #[test]
    fn invalid_connections() {
        let mut network = Network::new(4.0);
        let a = network.add_road(&straight(0.0, 30.0, 0.0, 4), 1).unwrap();
        let b = network.add_road(&straight(40.0, 70.0, 0.0, 4), 1).unwrap();

        assert_eq!(
            network.connect(a, b, &[(0, 1)]),
            Err(LayoutError::LaneIndex { index: 1, count: 1 })
        );
        network.connect(a, b, &[(0, 0)]).unwrap();
        assert_eq!(network.connect(b, a, &[(0, 0)]), Err(LayoutError::Cycle));
    }

    #[test]
    fn curved_junction_keeps_lanes_parallel() {
        let mut network = Network::new(4.0);
        let a = network.add_road(&straight(0.0, 30.0, 0.0, 4), 2).unwrap();
        let path = [
            Point2d::new(35.0, 0.0),
            Point2d::new(40.0, 5.0),
            Point2d::new(45.0, 15.0),
            Point2d::new(50.0, 30.0),
        ];
        let b = network.add_road(&path, 2).unwrap();
        network.connect(a, b, &[(0, 0), (1, 1)]).unwrap();

        let right = network.lane(network.road_lane(a, 0).unwrap());
        let left = network.lane(network.road_lane(a, 1).unwrap());
        let n = right.center().len() - 2;
        assert_approx_eq!(right.center()[n].distance(left.center()[n]), 4.0);

        let right = network.lane(network.road_lane(b, 0).unwrap());
        let left = network.lane(network.road_lane(b, 1).unwrap());
        assert_approx_eq!(right.center()[0].distance(left.center()[0]), 4.0);
        for lane in [right, left] {
            let c = lane.center();
            assert_approx_eq!(lane.left()[0].distance(c[0]), 2.0);
            assert_approx_eq!(lane.right()[0].distance(c[0]), 2.0);
        }
    }
}
