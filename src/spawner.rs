//! Feeds vehicles from the spawn pool onto the network.

use crate::math::Point2d;
use crate::network::Network;
use crate::{LaneId, RoadId, VehicleId, VehicleSet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// The vehicles waiting to be spawned.
#[derive(Clone, Debug, Default)]
pub struct SpawnPool {
    vehicles: Vec<VehicleId>,
}

impl SpawnPool {
    /// Returns a vehicle to the pool.
    pub(crate) fn push(&mut self, id: VehicleId) {
        self.vehicles.push(id);
    }

    /// Removes the vehicle at `index` from the pool.
    pub(crate) fn take(&mut self, index: usize) -> VehicleId {
        self.vehicles.remove(index)
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn contains(&self, id: VehicleId) -> bool {
        self.vehicles.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.vehicles.iter().copied()
    }
}

/// Periodically spawns a vehicle from the pool onto a road,
/// provided the entry point is clear.
#[derive(Clone, Debug)]
pub struct Spawner {
    /// The road to spawn vehicles onto.
    road: RoadId,
    /// The lane index to spawn onto, or `None` to pick one at random each time.
    lane: Option<usize>,
    /// The centre line node vehicles are placed at.
    node: usize,
    /// The time between spawns in s.
    delay: f64,
    /// The time since the last spawn in s.
    timer: f64,
    /// The seed of the random number generator.
    seed: Option<u64>,
    rng: Option<StdRng>,
}

impl Spawner {
    /// Creates a spawner which places vehicles at the start of a random lane of `road`
    /// every frame it can.
    pub fn new(road: RoadId) -> Self {
        Self {
            road,
            lane: None,
            node: 0,
            delay: 0.0,
            timer: 0.0,
            seed: None,
            rng: None,
        }
    }

    /// Always spawns onto the lane with this index.
    pub fn lane(mut self, index: usize) -> Self {
        self.lane = Some(index);
        self
    }

    /// Spawns at this node of the lane's centre line.
    pub fn node(mut self, node: usize) -> Self {
        self.node = node;
        self
    }

    /// Waits at least `delay` seconds between spawns.
    pub fn delay(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }

    /// Seeds the spawner's random number generator.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self.rng = None;
        self
    }

    pub fn road(&self) -> RoadId {
        self.road
    }

    pub fn lane_index(&self) -> Option<usize> {
        self.lane
    }

    pub fn node_index(&self) -> usize {
        self.node
    }

    /// The seed in use, once the spawner has started.
    pub fn seed_value(&self) -> Option<u64> {
        self.seed
    }

    /// Gets the random number generator, seeding it on first use.
    pub(crate) fn rng(&mut self) -> &mut StdRng {
        let seed = *self.seed.get_or_insert_with(|| rand::thread_rng().gen());
        let road = self.road;
        self.rng.get_or_insert_with(|| {
            log::info!("Seed for spawner on {:?}: {}", road, seed);
            StdRng::seed_from_u64(seed)
        })
    }

    /// Advances the spawn timer and attempts a spawn once the delay has passed.
    /// The timer only restarts when a vehicle is actually spawned.
    ///
    /// # Parameters
    /// * `dt` - The time step in s
    /// * `pool` - The vehicles available to spawn
    /// * `network` - The lane network
    /// * `vehicles` - The vehicles in the simulation
    /// * `min_space` - The minimum bumper distance to the vehicles ahead and behind in m
    pub(crate) fn update(
        &mut self,
        dt: f64,
        pool: &mut SpawnPool,
        network: &mut Network,
        vehicles: &mut VehicleSet,
        min_space: f64,
    ) -> Option<VehicleId> {
        self.timer += dt;
        if self.timer < self.delay {
            return None;
        }
        let spawned = self.spawn(pool, network, vehicles, min_space);
        if spawned.is_some() {
            self.timer = 0.0;
        }
        spawned
    }

    fn spawn(
        &mut self,
        pool: &mut SpawnPool,
        network: &mut Network,
        vehicles: &mut VehicleSet,
        min_space: f64,
    ) -> Option<VehicleId> {
        if pool.is_empty() {
            return None;
        }
        let (road, lane, node) = (self.road, self.lane, self.node);
        let num_lanes = network.road(road).num_lanes();
        let rng = self.rng();
        let index = rng.gen_range(0..pool.len());
        let lane_index = lane.unwrap_or_else(|| rng.gen_range(0..num_lanes));

        let lane = network.road_lane(road, lane_index)?;
        let center = network.lane(lane).center();
        let (start, target) = (*center.get(node)?, *center.get(node + 1)?);
        let id = pool.vehicles[index];
        if !spawn_area_clear(network, vehicles, lane, id, start, min_space) {
            return None;
        }

        pool.take(index);
        vehicles[id].activate(lane, start, target);
        network.insert_vehicle(vehicles, lane, id);
        log::debug!("Spawned {:?} onto {:?} at {:?}", id, lane, start);
        Some(id)
    }
}

/// Checks that vehicle `id` placed at `pos` would leave at least `min_space`
/// between its bumpers and those of the vehicles ahead and behind.
fn spawn_area_clear(
    network: &Network,
    vehicles: &VehicleSet,
    lane: LaneId,
    id: VehicleId,
    pos: Point2d,
    min_space: f64,
) -> bool {
    let half_len = vehicles[id].half_length();
    let front = network.find_front_vehicle(vehicles, lane, pos, Some(id));
    let back = network.find_back_vehicle(vehicles, lane, pos, Some(id));
    front.into_iter().chain(back).all(|other| {
        let other = &vehicles[other];
        let gap = network.travel_gap(lane, pos, other.position());
        gap - half_len - other.half_length() >= min_space
    })
}
