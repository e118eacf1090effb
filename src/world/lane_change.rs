use super::World;
use crate::event::EventKind;
use crate::vehicle::{Leader, MobilAccelerations, TurnSignal, Vehicle};
use crate::{LaneId, VehicleId};
use rand_distr::{Distribution, Uniform};

/// The lane change decision of a vehicle for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Decision {
    /// Move into the given lane now.
    Change(LaneId),
    /// Signal and wait for a change permit.
    Signal(TurnSignal),
    /// Give up on a signalled lane change.
    Abort,
}

impl World {
    /// Decides every vehicle's lane change, then carries them out in order.
    pub(super) fn update_lane_changes(&mut self) {
        let decisions = self
            .driving()
            .into_iter()
            .filter_map(|id| Some((id, self.decide_lane_change(id)?)))
            .collect::<Vec<_>>();

        for (id, decision) in decisions {
            match decision {
                Decision::Change(lane) => self.change_lane(id, lane),
                Decision::Signal(signal) => {
                    let delay = self.config.lane_change.signal_delay;
                    let delay = Uniform::new_inclusive(delay.min, delay.max);
                    let timer = delay.sample(&mut self.rng);
                    self.vehicles[id].turn_signal = signal;
                    self.schedule(id, EventKind::ChangePermit, Some(timer), None);
                }
                Decision::Abort => {
                    let vehicle = &mut self.vehicles[id];
                    vehicle.turn_signal = TurnSignal::None;
                    vehicle.change_permit = false;
                }
            }
        }
    }

    fn decide_lane_change(&self, id: VehicleId) -> Option<Decision> {
        let vehicle = &self.vehicles[id];
        if vehicle.turn_signal() != TurnSignal::None && !vehicle.has_change_permit() {
            return None;
        }
        let lane = vehicle.lane_id()?;

        let mut value = 0.0;
        let mut best = None;
        for cand in self.network.lane(lane).neighbors() {
            let incentive = self.lane_change_incentive(id, lane, cand);
            if value < incentive && incentive < f64::INFINITY {
                value = incentive;
                best = Some(cand);
            }
        }

        match best {
            Some(cand) if vehicle.has_change_permit() => Some(Decision::Change(cand)),
            Some(cand) => {
                let signal = if self.network.lane(lane).left_neighbor() == Some(cand) {
                    TurnSignal::Left
                } else {
                    TurnSignal::Right
                };
                Some(Decision::Signal(signal))
            }
            None if vehicle.velocity() >= 0.5 * vehicle.max_velocity() => Some(Decision::Abort),
            None => None,
        }
    }

    /// Evaluates the MOBIL incentive for vehicle `id` to move from `lane` into `cand`.
    ///
    /// ```text
    /// -------------------------------
    ///   cand_back   ^   cand_front     cand
    /// --------------|----------------
    ///   back       ego  front          lane
    /// -------------------------------
    /// ```
    fn lane_change_incentive(&self, id: VehicleId, lane: LaneId, cand: LaneId) -> f64 {
        let (network, vehicles) = (&self.network, &self.vehicles);
        let ego = &vehicles[id];
        let pos = ego.position();
        let get = |id: Option<VehicleId>| id.map(|id| &vehicles[id]);
        let back = get(network.find_back_vehicle(vehicles, lane, pos, Some(id)));
        let front = get(network.find_front_vehicle(vehicles, lane, pos, Some(id)));
        let cand_back = get(network.find_back_vehicle(vehicles, cand, pos, Some(id)));
        let cand_front = get(network.find_front_vehicle(vehicles, cand, pos, Some(id)));

        let (back, back_change) = back.map_or((0.0, 0.0), |back| {
            (
                self.following_acceleration(lane, back, Some(ego)),
                self.following_acceleration(lane, back, front),
            )
        });
        let (cand_back, cand_back_change) = cand_back.map_or((0.0, 0.0), |cand_back| {
            (
                self.following_acceleration(cand, cand_back, cand_front),
                self.following_acceleration(cand, cand_back, Some(ego)),
            )
        });
        let accs = MobilAccelerations {
            ego: self.following_acceleration(lane, ego, front),
            ego_change: self.following_acceleration(cand, ego, cand_front),
            back,
            back_change,
            cand_back,
            cand_back_change,
        };
        ego.driver().lane_change_incentive(
            &accs,
            ego.has_change_permit(),
            network.lane(cand).bias(),
        )
    }

    /// The acceleration `follower`'s driver would choose behind `leader` on `lane`.
    fn following_acceleration(
        &self,
        lane: LaneId,
        follower: &Vehicle,
        leader: Option<&Vehicle>,
    ) -> f64 {
        let leader = leader.map(|leader| Leader {
            bumper_distance: self.network.bumper_distance(lane, follower, leader),
            approaching_velocity: self.network.approaching_velocity(lane, follower, leader),
        });
        follower
            .driver()
            .decide_acceleration(&follower.kinematics(), leader)
    }

    /// Moves a vehicle into `cand`, heading for a point ahead on the new lane.
    /// A ghost of the vehicle takes its place on the old lane until the change is complete.
    fn change_lane(&mut self, id: VehicleId, cand: LaneId) {
        let lc = self.config.lane_change;
        let vehicle = &mut self.vehicles[id];
        vehicle.change_permit = false;
        let Some(lane) = vehicle.lane_id() else {
            return;
        };
        let start = self.network.projected_position(cand, vehicle.position());
        let distance = vehicle.velocity() * lc.speed_factor + lc.lookahead;
        let Some(target) = self.network.traverse(cand, start, distance) else {
            vehicle.turn_signal = TurnSignal::None;
            return;
        };

        let snapshot = vehicle.clone();
        vehicle.set_target(target);
        let serial = self.take_serial();
        let ghost = self
            .vehicles
            .insert_with_key(|ghost| Vehicle::ghost(ghost, serial, &snapshot));
        self.network.insert_vehicle(&self.vehicles, lane, ghost);
        self.schedule(id, EventKind::BlockLane { target, ghost }, None, None);

        self.network.remove_vehicle(lane, id);
        self.vehicles[id].set_lane(Some(cand));
        self.network.insert_vehicle(&self.vehicles, cand, id);
        log::debug!("{:?} changed from {:?} to {:?}", id, lane, cand);
    }
}
