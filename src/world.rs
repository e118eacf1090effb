use crate::config::SimulationConfig;
use crate::error::{Error, LayoutError};
use crate::event::{Event, EventKind};
use crate::math::Point2d;
use crate::network::Network;
use crate::spawner::{SpawnPool, Spawner};
use crate::vehicle::{dynamics, Leader, TurnSignal, Vehicle, VehicleAttributes};
use crate::{EventId, LaneId, RoadId, VehicleId, VehicleSet};
use cgmath::MetricSpace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use slotmap::SlotMap;

mod lane_change;

/// A vehicle found overlapping the vehicle ahead of it.
///
/// The simulation carries on when this happens, with the vehicle's
/// acceleration forced to zero for that frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Anomaly {
    /// The frame the overlap was detected in.
    pub frame: usize,
    /// The following vehicle.
    pub vehicle: VehicleId,
    /// The vehicle ahead.
    pub leader: VehicleId,
    /// The (non-positive) bumper distance in m.
    pub bumper_distance: f64,
}

/// A traffic simulation.
pub struct World {
    /// The simulation parameters.
    config: SimulationConfig,
    /// The lane network.
    network: Network,
    /// The vehicles being simulated, including ghosts.
    vehicles: VehicleSet,
    /// The vehicles updated each frame, in order of creation.
    agents: Vec<VehicleId>,
    /// The pending events of all vehicles.
    events: SlotMap<EventId, Event>,
    /// The spawners, in order of addition.
    spawners: Vec<Spawner>,
    /// The vehicles waiting to be spawned.
    pool: SpawnPool,
    /// The serial number of the next vehicle created.
    next_serial: u64,
    /// The seed of `rng`.
    seed: u64,
    /// Draws the turn signal delays.
    rng: StdRng,
    /// The current frame of simulation.
    frame: usize,
    /// Anomalies recorded since they were last taken.
    anomalies: Vec<Anomaly>,
}

impl World {
    /// Creates an empty world, after validating the config.
    pub fn new(config: SimulationConfig) -> Result<Self, Error> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());
        log::info!("Seed for world: {}", seed);
        Ok(Self {
            network: Network::new(config.lane_width),
            config,
            vehicles: Default::default(),
            agents: vec![],
            events: Default::default(),
            spawners: vec![],
            pool: Default::default(),
            next_serial: 0,
            seed,
            rng: StdRng::seed_from_u64(seed),
            frame: 0,
            anomalies: vec![],
        })
    }

    /// The simulation parameters.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// The seed of the world's random number generator.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Adds a road along `path` with `num_lanes` parallel lanes.
    pub fn add_road(&mut self, path: &[Point2d], num_lanes: usize) -> Result<RoadId, LayoutError> {
        self.network.add_road(path, num_lanes)
    }

    /// Connects lanes of the road `from` to lanes of the road `to`.
    /// See [Network::connect].
    pub fn connect_roads(
        &mut self,
        from: RoadId,
        to: RoadId,
        pairs: &[(usize, usize)],
    ) -> Result<(), LayoutError> {
        self.network.connect(from, to, pairs)
    }

    /// Sets the extra lane change threshold of a lane.
    pub fn set_lane_bias(&mut self, lane: LaneId, bias: f64) {
        self.network.set_lane_bias(lane, bias);
    }

    /// Adds a spawner, checking that its entry node has a successor on every lane it may use.
    pub fn add_spawner(&mut self, mut spawner: Spawner) -> Result<(), LayoutError> {
        let road = self.network.road(spawner.road());
        let lanes = match spawner.lane_index() {
            Some(index) => vec![road.lane(index).ok_or(LayoutError::LaneIndex {
                index,
                count: road.num_lanes(),
            })?],
            None => road.lanes().to_vec(),
        };
        let node = spawner.node_index();
        for lane in lanes {
            let len = self.network.lane(lane).center().len();
            if node + 1 >= len {
                return Err(LayoutError::SpawnNode { node, len });
            }
        }
        spawner.rng();
        self.spawners.push(spawner);
        Ok(())
    }

    /// The attributes of a default vehicle driven with the configured driver parameters.
    pub fn default_attributes(&self) -> VehicleAttributes {
        VehicleAttributes {
            driver: self.config.driver,
            ..Default::default()
        }
    }

    /// Adds a vehicle to the spawn pool.
    pub fn add_vehicle(&mut self, attributes: &VehicleAttributes) -> VehicleId {
        let id = self.create_vehicle(attributes);
        self.pool.push(id);
        id
    }

    /// Adds a vehicle directly onto a lane, at rest at `node` and facing the node after it.
    pub fn place_vehicle(
        &mut self,
        attributes: &VehicleAttributes,
        lane: LaneId,
        node: usize,
    ) -> Result<VehicleId, LayoutError> {
        let center = self.network.lane(lane).center();
        let (start, target) = match (center.get(node), center.get(node + 1)) {
            (Some(start), Some(target)) => (*start, *target),
            _ => {
                let len = center.len();
                return Err(LayoutError::SpawnNode { node, len });
            }
        };
        let id = self.create_vehicle(attributes);
        self.vehicles[id].activate(lane, start, target);
        self.network.insert_vehicle(&self.vehicles, lane, id);
        Ok(id)
    }

    /// Adds a static obstacle to a lane.
    pub fn add_obstacle(&mut self, lane: LaneId, position: Point2d) -> VehicleId {
        let serial = self.take_serial();
        let id = self
            .vehicles
            .insert_with_key(|id| Vehicle::obstacle(id, serial, lane, position));
        self.network.insert_vehicle(&self.vehicles, lane, id);
        self.agents.push(id);
        id
    }

    /// Schedules a change of a vehicle's turn signal, after `timer` seconds
    /// or once the `trigger` event has fired, whichever comes first.
    /// Returns `None` if the vehicle doesn't exist.
    pub fn schedule_turn_signal(
        &mut self,
        vehicle: VehicleId,
        signal: TurnSignal,
        timer: Option<f64>,
        trigger: Option<EventId>,
    ) -> Option<EventId> {
        self.vehicles.contains_key(vehicle).then(|| {
            self.schedule(vehicle, EventKind::TurnSignal(signal), timer, trigger)
        })
    }

    /// Advances the simulation by `dt` seconds.
    pub fn update(&mut self, dt: f64) {
        self.network.reset_caches();
        self.update_accelerations();
        self.update_positions(dt);
        self.update_lanes();
        self.update_lane_changes();
        self.update_events(dt);
        self.update_spawners(dt);
        self.frame += 1;
    }

    /// Gets the current simulation frame index.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// The lane network.
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Returns an iterator over the vehicles on the network, including obstacles and ghosts.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values().filter(|v| v.is_active())
    }

    /// Gets a reference to the vehicle with the given ID.
    pub fn get_vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    /// Gets a pending event.
    pub fn get_event(&self, id: EventId) -> Option<&Event> {
        self.events.get(id)
    }

    /// The vehicles waiting to be spawned.
    pub fn pool(&self) -> &SpawnPool {
        &self.pool
    }

    /// Takes the anomalies recorded since the last call.
    pub fn take_anomalies(&mut self) -> Vec<Anomaly> {
        std::mem::take(&mut self.anomalies)
    }

    fn take_serial(&mut self) -> u64 {
        let serial = self.next_serial;
        self.next_serial += 1;
        serial
    }

    fn create_vehicle(&mut self, attributes: &VehicleAttributes) -> VehicleId {
        let serial = self.take_serial();
        let id = self
            .vehicles
            .insert_with_key(|id| Vehicle::new(id, serial, attributes));
        self.agents.push(id);
        id
    }

    fn schedule(
        &mut self,
        owner: VehicleId,
        kind: EventKind,
        timer: Option<f64>,
        trigger: Option<EventId>,
    ) -> EventId {
        let id = self.events.insert(Event::new(owner, kind, timer, trigger));
        self.vehicles[owner].events.push(id);
        id
    }

    /// The vehicles which drive themselves this frame.
    fn driving(&self) -> Vec<VehicleId> {
        self.agents
            .iter()
            .copied()
            .filter(|id| self.vehicles[*id].is_driving())
            .collect()
    }

    /// Lets the driver of a vehicle choose its acceleration
    /// in response to the vehicle ahead of it.
    fn follow(&self, id: VehicleId) -> (f64, Option<Anomaly>) {
        let vehicle = &self.vehicles[id];
        let Some(lane) = vehicle.lane_id() else {
            return (0.0, None);
        };
        let leader = self
            .network
            .find_front_vehicle(&self.vehicles, lane, vehicle.position(), Some(id));
        let Some(leader) = leader else {
            let acc = vehicle.driver().decide_acceleration(&vehicle.kinematics(), None);
            return (acc, None);
        };

        let front = &self.vehicles[leader];
        let bumper_distance = self.network.bumper_distance(lane, vehicle, front);
        if bumper_distance <= 0.0 {
            let anomaly = Anomaly {
                frame: self.frame,
                vehicle: id,
                leader,
                bumper_distance,
            };
            return (0.0, Some(anomaly));
        }
        let leader = Leader {
            bumper_distance,
            approaching_velocity: self.network.approaching_velocity(lane, vehicle, front),
        };
        let acc = vehicle
            .driver()
            .decide_acceleration(&vehicle.kinematics(), Some(leader));
        (acc, None)
    }

    fn record_anomaly(&mut self, anomaly: Anomaly) {
        let vehicle = &self.vehicles[anomaly.vehicle];
        let leader = &self.vehicles[anomaly.leader];
        log::error!(
            "Negative bumper distance occurred: {:?}{:?} - {:?}{:?} distance: {}",
            anomaly.vehicle,
            vehicle.position(),
            anomaly.leader,
            leader.position(),
            anomaly.bumper_distance
        );
        self.anomalies.push(anomaly);
    }

    /// Decides every vehicle's acceleration, then applies them.
    fn update_accelerations(&mut self) {
        let decisions = self
            .driving()
            .into_iter()
            .map(|id| (id, self.follow(id)))
            .collect::<Vec<_>>();
        for (id, (acc, anomaly)) in decisions {
            if let Some(anomaly) = anomaly {
                self.record_anomaly(anomaly);
            }
            self.vehicles[id].set_acceleration(acc);
        }
    }

    fn update_positions(&mut self, dt: f64) {
        for id in self.driving() {
            self.advance(id, dt);
        }
    }

    /// Integrates a vehicle's motion. Once it reaches its waypoint it is placed back
    /// onto its lane by the distance it overshot, and given the next waypoint.
    /// If there is none, it has left the network and is retired.
    fn advance(&mut self, id: VehicleId, dt: f64) {
        let vehicle = &mut self.vehicles[id];
        dynamics::integrate(vehicle, dt);
        let (pos, target) = (vehicle.position(), vehicle.target());
        if !dynamics::reached_target(pos, vehicle.orientation(), target) {
            return;
        }

        let network = &self.network;
        let next = vehicle.lane_id().and_then(|lane| {
            let fixed = network.traverse(lane, target, pos.distance(target))?;
            Some((fixed, network.next_node(lane, fixed)?))
        });
        match next {
            Some((fixed, next)) => {
                vehicle.set_position(fixed);
                vehicle.set_target(next);
            }
            None => self.retire(id),
        }
    }

    fn update_lanes(&mut self) {
        for id in self.driving() {
            self.resolve_lane(id);
        }
    }

    /// Moves a vehicle into the vehicle list of the lane it has driven onto.
    fn resolve_lane(&mut self, id: VehicleId) {
        let vehicle = &self.vehicles[id];
        let Some(lane) = vehicle.lane_id() else {
            return;
        };
        let closest = self.network.closest_segment(lane, vehicle.position()).lane;
        if closest != lane {
            self.network.remove_vehicle(lane, id);
            self.vehicles[id].set_lane(Some(closest));
            self.network.insert_vehicle(&self.vehicles, closest, id);
        }
    }

    /// Takes a vehicle off the network and returns it to the spawn pool if it respawns.
    /// Its pending events are discarded.
    fn retire(&mut self, id: VehicleId) {
        let vehicle = &mut self.vehicles[id];
        if let Some(lane) = vehicle.lane_id() {
            self.network.remove_vehicle(lane, id);
        }
        vehicle.deactivate();
        let events = std::mem::take(&mut vehicle.events);
        let respawn = vehicle.respawns();
        for event in events {
            self.discard_event(event);
        }
        if respawn {
            self.pool.push(id);
        }
        log::debug!("Retired {:?} in frame {}", id, self.frame);
    }

    /// Removes a ghost from its lane and from the simulation.
    fn vanish(&mut self, id: VehicleId) {
        if let Some(ghost) = self.vehicles.remove(id) {
            if let Some(lane) = ghost.lane_id() {
                self.network.remove_vehicle(lane, id);
            }
        }
    }

    fn discard_event(&mut self, id: EventId) {
        if let Some(event) = self.events.remove(id) {
            if let EventKind::BlockLane { ghost, .. } = event.kind() {
                self.vanish(ghost);
            }
        }
    }

    /// Removes an event and applies its effect to its owner.
    fn fire(&mut self, id: EventId) {
        let Some(event) = self.events.remove(id) else {
            return;
        };
        let owner = event.owner();
        match event.kind() {
            EventKind::TurnSignal(signal) => {
                if let Some(vehicle) = self.vehicles.get_mut(owner) {
                    vehicle.turn_signal = signal;
                }
            }
            EventKind::ChangePermit => {
                if let Some(vehicle) = self.vehicles.get_mut(owner) {
                    vehicle.change_permit = true;
                }
            }
            EventKind::BlockLane { ghost, .. } => {
                if let Some(vehicle) = self.vehicles.get_mut(owner) {
                    vehicle.turn_signal = TurnSignal::None;
                }
                self.vanish(ghost);
            }
        }
    }

    fn update_events(&mut self, dt: f64) {
        for id in self.driving() {
            let events = self.vehicles[id].events.clone();
            let mut fired = false;
            for event in events {
                fired |= self.update_event(event, dt);
            }
            if fired {
                let pending = &self.events;
                self.vehicles[id]
                    .events
                    .retain(|event| pending.contains_key(*event));
            }
        }
    }

    /// Ticks an event, firing it if it is due. Returns whether it is gone.
    fn update_event(&mut self, id: EventId, dt: f64) -> bool {
        let Some(event) = self.events.get(id) else {
            return true;
        };
        if let EventKind::BlockLane { target, ghost } = event.kind() {
            let owner = event.owner();
            return self.update_block_lane(id, owner, target, ghost, dt);
        }

        let trigger_fired = event
            .trigger()
            .map_or(false, |trigger| {
                self.events.get(trigger).map_or(true, Event::has_fired)
            });
        let due = self.events[id].tick(dt, trigger_fired);
        if due {
            self.fire(id);
        }
        due
    }

    /// Drives the ghost of a lane change for one frame. The ghost never
    /// accelerates harder than its owner. The event fires once the ghost has
    /// left the network or the owner has moved on from its lane change waypoint.
    fn update_block_lane(
        &mut self,
        id: EventId,
        owner: VehicleId,
        target: Point2d,
        ghost: VehicleId,
        dt: f64,
    ) -> bool {
        if !self.vehicles.contains_key(ghost) {
            self.fire(id);
            return true;
        }

        let (acc, anomaly) = self.follow(ghost);
        if let Some(anomaly) = anomaly {
            self.record_anomaly(anomaly);
        }
        let owner_acc = self.vehicles[owner].acceleration();
        self.vehicles[ghost].set_acceleration(acc.min(owner_acc));
        self.advance(ghost, dt);
        if !self.vehicles[ghost].is_active() {
            self.fire(id);
            return true;
        }

        self.resolve_lane(ghost);
        if self.vehicles[owner].target() != target {
            self.fire(id);
            return true;
        }
        false
    }

    fn update_spawners(&mut self, dt: f64) {
        let min_space = self.config.min_spawn_space;
        for spawner in &mut self.spawners {
            spawner.update(
                dt,
                &mut self.pool,
                &mut self.network,
                &mut self.vehicles,
                min_space,
            );
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vehicle::VehicleKind;

    fn world() -> World {
        World::new(SimulationConfig {
            seed: Some(5),
            ..Default::default()
        })
        .unwrap()
    }

    fn straight(length: f64, spacing: f64) -> Vec<Point2d> {
        let n = (length / spacing) as usize;
        (0..=n)
            .map(|i| Point2d::new(0.0, spacing * i as f64))
            .collect()
    }

    #[test]
    fn vehicle_drives_forward() {
        let mut world = world();
        let road = world.add_road(&straight(200.0, 10.0), 1).unwrap();
        let lane = world.network().road_lane(road, 0).unwrap();
        let attribs = world.default_attributes();
        let id = world.place_vehicle(&attribs, lane, 0).unwrap();

        for _ in 0..50 {
            world.update(0.1);
        }
        let vehicle = world.get_vehicle(id).unwrap();
        assert!(vehicle.is_active());
        assert!(vehicle.velocity() > 0.0);
        assert!(vehicle.position().y > 12.0);
        assert!(vehicle.position().x.abs() < 1e-6);
        assert!(vehicle.target().y > vehicle.position().y);
        assert_eq!(world.frame(), 50);
    }

    #[test]
    fn vehicle_retires_at_end() {
        let mut world = world();
        let road = world.add_road(&straight(30.0, 10.0), 1).unwrap();
        let lane = world.network().road_lane(road, 0).unwrap();
        let attribs = world.default_attributes();
        let id = world.place_vehicle(&attribs, lane, 0).unwrap();

        for _ in 0..100 {
            world.update(0.1);
        }
        assert!(!world.get_vehicle(id).unwrap().is_active());
        assert!(world.pool().contains(id));
        assert!(world.network().lane(lane).vehicles().is_empty());
        assert_eq!(world.iter_vehicles().count(), 0);
    }

    #[test]
    fn overlap_is_recorded() {
        let mut world = world();
        let road = world.add_road(&straight(100.0, 10.0), 1).unwrap();
        let lane = world.network().road_lane(road, 0).unwrap();
        let attribs = world.default_attributes();
        let a = world.place_vehicle(&attribs, lane, 0).unwrap();
        let b = world.place_vehicle(&attribs, lane, 0).unwrap();

        world.update(0.1);
        let anomalies = world.take_anomalies();
        assert_eq!(anomalies.len(), 2);
        assert!(anomalies.iter().all(|a| a.frame == 0 && a.bumper_distance <= 0.0));
        assert_eq!(world.get_vehicle(a).unwrap().acceleration(), 0.0);
        assert_eq!(world.get_vehicle(b).unwrap().acceleration(), 0.0);
        assert!(world.take_anomalies().is_empty());
    }

    #[test]
    fn vehicle_stops_behind_obstacle() {
        let mut world = world();
        let road = world.add_road(&straight(200.0, 10.0), 1).unwrap();
        let lane = world.network().road_lane(road, 0).unwrap();
        let attribs = world.default_attributes();
        let id = world.place_vehicle(&attribs, lane, 0).unwrap();
        let obstacle_pos = world.network().lane(lane).center()[6];
        let obstacle = world.add_obstacle(lane, obstacle_pos);

        for _ in 0..600 {
            world.update(0.1);
        }
        let vehicle = world.get_vehicle(id).unwrap();
        assert!(vehicle.is_active());
        assert!(vehicle.velocity() < 0.1);
        assert!(vehicle.position().y < obstacle_pos.y);
        assert_eq!(world.get_vehicle(obstacle).unwrap().position(), obstacle_pos);
        assert!(world.take_anomalies().is_empty());
    }

    #[test]
    fn chained_turn_signals() {
        let mut world = world();
        let road = world.add_road(&straight(200.0, 10.0), 1).unwrap();
        let lane = world.network().road_lane(road, 0).unwrap();
        let attribs = world.default_attributes();
        let id = world.place_vehicle(&attribs, lane, 0).unwrap();

        let left = world
            .schedule_turn_signal(id, TurnSignal::Left, Some(0.25), None)
            .unwrap();
        world
            .schedule_turn_signal(id, TurnSignal::Right, None, Some(left))
            .unwrap();
        assert_eq!(world.get_vehicle(id).unwrap().events().len(), 2);

        world.update(0.1);
        world.update(0.1);
        assert_eq!(world.get_vehicle(id).unwrap().turn_signal(), TurnSignal::None);
        assert_eq!(world.get_vehicle(id).unwrap().events().len(), 2);

        world.update(0.1);
        let vehicle = world.get_vehicle(id).unwrap();
        assert_eq!(vehicle.turn_signal(), TurnSignal::Right);
        assert!(vehicle.events().is_empty());
        assert!(world.get_event(left).is_none());
    }

    #[test]
    fn lane_change_around_obstacle() {
        let mut world = world();
        let road = world.add_road(&straight(400.0, 10.0), 2).unwrap();
        let lane0 = world.network().road_lane(road, 0).unwrap();
        let lane1 = world.network().road_lane(road, 1).unwrap();
        let attribs = world.default_attributes();
        let id = world.place_vehicle(&attribs, lane0, 0).unwrap();
        let obstacle_pos = world.network().lane(lane0).center()[8];
        world.add_obstacle(lane0, obstacle_pos);

        let mut signalled = false;
        let mut ghosted = false;
        for _ in 0..300 {
            world.update(0.1);
            let vehicle = world.get_vehicle(id).unwrap();
            signalled |= vehicle.turn_signal() != TurnSignal::None;
            ghosted |= world
                .iter_vehicles()
                .any(|v| v.kind() == VehicleKind::Ghost(id));
        }

        let vehicle = world.get_vehicle(id).unwrap();
        assert!(signalled);
        assert!(ghosted);
        assert!(vehicle.is_active());
        assert_eq!(vehicle.lane_id(), Some(lane1));
        assert_eq!(vehicle.turn_signal(), TurnSignal::None);
        assert!(vehicle.position().y > obstacle_pos.y);
        assert!(world.iter_vehicles().all(|v| v.kind() != VehicleKind::Ghost(id)));
        assert!(world.network().lane(lane0).vehicles().len() == 1);
    }

    #[test]
    fn spawner_validation() {
        let mut world = world();
        let road = world.add_road(&straight(30.0, 10.0), 2).unwrap();
        assert_eq!(
            world.add_spawner(Spawner::new(road).node(1)),
            Err(LayoutError::SpawnNode { node: 1, len: 2 })
        );
        assert_eq!(
            world.add_spawner(Spawner::new(road).lane(2)),
            Err(LayoutError::LaneIndex { index: 2, count: 2 })
        );
        assert!(world.add_spawner(Spawner::new(road).seed(3)).is_ok());
    }

    #[test]
    fn spawned_vehicle_cycles_through_pool() {
        let mut world = world();
        let road = world.add_road(&straight(30.0, 10.0), 1).unwrap();
        world.add_spawner(Spawner::new(road).seed(9)).unwrap();
        let attribs = VehicleAttributes::sportscar();
        let id = world.add_vehicle(&attribs);
        assert_eq!(world.pool().len(), 1);

        world.update(0.1);
        assert!(world.get_vehicle(id).unwrap().is_active());
        assert!(world.pool().is_empty());

        // The vehicle leaves the network at the end of the road and is spawned again
        let mut respawned = false;
        let mut last_y = world.get_vehicle(id).unwrap().position().y;
        for _ in 0..100 {
            world.update(0.1);
            let y = world.get_vehicle(id).unwrap().position().y;
            respawned |= y < last_y;
            last_y = y;
        }
        assert!(respawned);
    }
}
