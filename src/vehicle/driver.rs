use serde::{Deserialize, Serialize};

/// The parameters of a driver's car following (IDM) and lane changing (MOBIL) models.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverParams {
    /// The minimum bumper to bumper gap to the vehicle ahead in m.
    pub min_spacing: f64,
    /// The desired gap to the vehicle ahead in s.
    pub time_headway: f64,
    /// The comfortable braking deceleration, a positive number in m/s<sup>2</sup>.
    pub comf_brake: f64,
    /// The exponent of the free road term.
    pub delta: f64,
    /// How much the braking of other vehicles weighs against own gains, from 0 to 1.
    pub politeness: f64,
    /// The maximum braking a lane change may impose on the new follower, in m/s<sup>2</sup>.
    pub b_safe: f64,
    /// The acceleration gain needed before changing lanes, in m/s<sup>2</sup>.
    pub threshold: f64,
}

impl Default for DriverParams {
    fn default() -> Self {
        Self {
            min_spacing: 12.0,
            time_headway: 1.0,
            comf_brake: 3.0,
            delta: 4.0,
            politeness: 0.5,
            b_safe: 3.0,
            threshold: 0.4,
        }
    }
}

/// The decision model used by a [Driver].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverModel {
    /// The intelligent driver model.
    Intelligent,
    /// Never accelerates. Used for static obstacles.
    Dummy,
}

/// Decides the acceleration and lane changing incentive of a vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Driver {
    model: DriverModel,
    params: DriverParams,
}

/// The kinematic state of a vehicle as seen by its driver.
#[derive(Clone, Copy, Debug)]
pub struct Kinematics {
    /// The velocity in m/s.
    pub velocity: f64,
    /// The maximum velocity in m/s.
    pub max_velocity: f64,
    /// The maximum acceleration in m/s<sup>2</sup>.
    pub max_acceleration: f64,
}

/// The vehicle being followed, relative to the follower.
#[derive(Clone, Copy, Debug)]
pub struct Leader {
    /// The bumper to bumper gap in m. May be negative if the vehicles overlap.
    pub bumper_distance: f64,
    /// The follower's velocity minus the leader's velocity, in m/s.
    pub approaching_velocity: f64,
}

/// The six accelerations weighed up by the MOBIL model.
///
/// ```text
/// -----------------------------------
///   cand_back    ^    cand_front      candidate lane
/// ---------------|-------------------
///   back        ego   front           current lane
/// -----------------------------------
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct MobilAccelerations {
    /// Ego's acceleration behind `front`.
    pub ego: f64,
    /// Ego's acceleration behind `cand_front`.
    pub ego_change: f64,
    /// The acceleration of `back` behind ego, or 0 if there is no such vehicle.
    pub back: f64,
    /// The acceleration of `back` behind `front`, or 0 if there is no such vehicle.
    pub back_change: f64,
    /// The acceleration of `cand_back` behind `cand_front`, or 0 if there is no such vehicle.
    pub cand_back: f64,
    /// The acceleration of `cand_back` behind ego, or 0 if there is no such vehicle.
    pub cand_back_change: f64,
}

impl Driver {
    /// Creates a driver following the intelligent driver model.
    pub fn intelligent(params: DriverParams) -> Self {
        Self {
            model: DriverModel::Intelligent,
            params,
        }
    }

    /// Creates a driver which never accelerates.
    pub fn dummy() -> Self {
        Self {
            model: DriverModel::Dummy,
            params: DriverParams::default(),
        }
    }

    /// The decision model of the driver.
    pub fn model(&self) -> DriverModel {
        self.model
    }

    /// The driver's parameters.
    pub fn params(&self) -> &DriverParams {
        &self.params
    }

    /// Decides the acceleration of the `ego` vehicle following `leader`.
    ///
    /// Without a leader the vehicle accelerates freely. A leader which already overlaps
    /// the vehicle results in an infinite deceleration.
    pub fn decide_acceleration(&self, ego: &Kinematics, leader: Option<Leader>) -> f64 {
        match self.model {
            DriverModel::Dummy => 0.0,
            DriverModel::Intelligent => self.idm(ego, leader),
        }
    }

    /// Computes an acceleration using the intelligent driver model.
    fn idm(&self, ego: &Kinematics, leader: Option<Leader>) -> f64 {
        let Some(leader) = leader else {
            return ego.max_acceleration;
        };
        if leader.bumper_distance <= 0.0 {
            return f64::NEG_INFINITY;
        }

        let p = &self.params;
        let vel = ego.velocity;
        let factor = 1. / (2. * (ego.max_acceleration * p.comf_brake).sqrt());
        let ss = p.min_spacing + vel * p.time_headway + vel * leader.approaching_velocity * factor;
        let term = ss / leader.bumper_distance;
        ego.max_acceleration * (1. - (vel / ego.max_velocity).powf(p.delta) - term * term)
    }

    /// Computes the MOBIL incentive to change into a candidate lane.
    /// A positive value means the change is worthwhile, negative infinity that it is unsafe.
    ///
    /// # Parameters
    /// * `accs` - The accelerations of the vehicles involved before and after the change
    /// * `permit` - Whether the vehicle has signalled and waited for a change permit,
    ///   which makes it more willing to force its way into a gap
    /// * `lane_bias` - The extra threshold of the candidate lane
    pub fn lane_change_incentive(
        &self,
        accs: &MobilAccelerations,
        permit: bool,
        lane_bias: f64,
    ) -> f64 {
        let mut b_safe = self.params.b_safe;
        let mut politeness = self.params.politeness;
        let mut threshold = self.params.threshold;
        if permit {
            b_safe *= 4.0;
            politeness /= 5.0;
            threshold = 0.0;
        }

        if accs.cand_back_change < -b_safe {
            return f64::NEG_INFINITY;
        }

        let gain = accs.ego_change - accs.ego;
        let hinder =
            politeness * (accs.back + accs.cand_back - accs.back_change - accs.cand_back_change);
        gain - hinder - (threshold + lane_bias)
    }
}
