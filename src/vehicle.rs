pub use self::driver::{Driver, DriverModel, DriverParams, Kinematics, Leader, MobilAccelerations};
use crate::math::{heading, orientation_of, rotate, Point2d, Vector2d};
use crate::{EventId, LaneId, VehicleId};
use smallvec::SmallVec;

mod driver;
pub(crate) mod dynamics;

/// The state of a vehicle's turn signal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TurnSignal {
    #[default]
    None,
    Left,
    Right,
}

/// The role a vehicle plays in the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VehicleKind {
    /// A vehicle which drives, changes lanes and returns to the spawn pool.
    Agent,
    /// A static vehicle which never moves.
    Obstacle,
    /// A stand-in left on the lane vacated by a lane change, owned by the changing vehicle.
    Ghost(VehicleId),
}

/// A simulated vehicle.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The vehicle's ID
    pub(crate) id: VehicleId,
    /// A number unique to the vehicle, increasing in order of creation.
    serial: u64,
    /// The role of the vehicle.
    kind: VehicleKind,
    /// Whether the vehicle is on the network.
    active: bool,
    /// Whether the vehicle returns to the spawn pool when it leaves the network.
    respawn: bool,
    /// The world space coordinates of the centre of the vehicle.
    position: Point2d,
    /// The heading in degrees, clockwise from the positive y-axis.
    orientation: f64,
    /// The display colour.
    color: [f32; 3],
    /// The boundary polygon in local space.
    mesh: Vec<Vector2d>,
    /// Half the vehicle's length in m.
    half_len: f64,
    /// Half the vehicle's width in m.
    half_wid: f64,
    /// The velocity in m/s.
    velocity: f64,
    /// The maximum velocity in m/s.
    max_velocity: f64,
    /// The acceleration in m/s<sup>2</sup>.
    acceleration: f64,
    /// The maximum acceleration in m/s<sup>2</sup>.
    max_acceleration: f64,
    /// The waypoint the vehicle is driving towards.
    target: Point2d,
    /// The lane whose vehicle list contains the vehicle.
    lane: Option<LaneId>,
    /// The driver of the vehicle.
    driver: Driver,
    /// The turn signal state.
    pub(crate) turn_signal: TurnSignal,
    /// Whether the vehicle has waited out its signal and may change lanes.
    pub(crate) change_permit: bool,
    /// The pending events of the vehicle.
    pub(crate) events: SmallVec<[EventId; 4]>,
}

/// The attributes of a simulated vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VehicleAttributes {
    /// The vehicle width in m.
    pub width: f64,
    /// The vehicle length in m.
    pub length: f64,
    /// The maximum velocity in m/s.
    pub max_velocity: f64,
    /// The maximum acceleration in m/s<sup>2</sup>.
    pub max_acceleration: f64,
    /// The display colour.
    pub color: [f32; 3],
    /// The driver's parameters.
    pub driver: DriverParams,
}

impl Default for VehicleAttributes {
    fn default() -> Self {
        Self {
            width: 2.5,
            length: 4.0,
            max_velocity: 10.0,
            max_acceleration: 1.0,
            color: [0.0, 0.0, 0.0],
            driver: DriverParams::default(),
        }
    }
}

impl VehicleAttributes {
    /// Attributes of a small, quick car with an impatient driver.
    pub fn sportscar() -> Self {
        Self {
            width: 1.4,
            length: 4.0,
            max_velocity: 42.0,
            max_acceleration: 6.0,
            color: [0.8, 0.1, 0.1],
            driver: DriverParams {
                min_spacing: 6.0,
                time_headway: 0.75,
                comf_brake: 4.0,
                politeness: 0.3,
                b_safe: 3.5,
                ..Default::default()
            },
        }
    }

    /// Attributes of a family car.
    pub fn minivan() -> Self {
        Self {
            width: 2.0,
            length: 5.0,
            max_velocity: 30.0,
            max_acceleration: 3.5,
            color: [0.2, 0.3, 0.8],
            driver: DriverParams {
                min_spacing: 10.0,
                time_headway: 1.0,
                comf_brake: 3.0,
                politeness: 0.4,
                b_safe: 3.0,
                ..Default::default()
            },
        }
    }

    /// Attributes of a long, slow truck with a careful driver.
    pub fn truck() -> Self {
        Self {
            width: 2.5,
            length: 12.0,
            max_velocity: 22.0,
            max_acceleration: 2.0,
            color: [0.9, 0.7, 0.1],
            driver: DriverParams {
                min_spacing: 14.0,
                time_headway: 1.5,
                comf_brake: 2.5,
                politeness: 0.5,
                b_safe: 2.5,
                ..Default::default()
            },
        }
    }
}

impl Vehicle {
    /// Creates a new vehicle, which is inactive until spawned.
    pub(crate) fn new(id: VehicleId, serial: u64, attributes: &VehicleAttributes) -> Self {
        let (hw, hl) = (0.5 * attributes.width, 0.5 * attributes.length);
        Self {
            id,
            serial,
            kind: VehicleKind::Agent,
            active: false,
            respawn: true,
            position: Point2d::new(0.0, 0.0),
            orientation: 90.0,
            color: attributes.color,
            mesh: vec![
                Vector2d::new(hw, hl),
                Vector2d::new(-hw, hl),
                Vector2d::new(-hw, -hl),
                Vector2d::new(hw, -hl),
            ],
            half_len: hl,
            half_wid: hw,
            velocity: 0.0,
            max_velocity: attributes.max_velocity,
            acceleration: 0.0,
            max_acceleration: attributes.max_acceleration,
            target: Point2d::new(0.0, 0.0),
            lane: None,
            driver: Driver::intelligent(attributes.driver),
            turn_signal: TurnSignal::None,
            change_permit: false,
            events: SmallVec::new(),
        }
    }

    /// Creates a static obstacle at the given position.
    pub(crate) fn obstacle(id: VehicleId, serial: u64, lane: LaneId, position: Point2d) -> Self {
        let attributes = VehicleAttributes {
            width: 1.0,
            length: 1.0,
            max_velocity: 0.0,
            max_acceleration: 0.0,
            ..Default::default()
        };
        Self {
            kind: VehicleKind::Obstacle,
            active: true,
            respawn: false,
            position,
            target: position,
            lane: Some(lane),
            driver: Driver::dummy(),
            ..Self::new(id, serial, &attributes)
        }
    }

    /// Creates a ghost of `owner`, which keeps driving towards the owner's target on its lane.
    pub(crate) fn ghost(id: VehicleId, serial: u64, owner: &Vehicle) -> Self {
        Self {
            id,
            serial,
            kind: VehicleKind::Ghost(owner.id),
            active: true,
            respawn: false,
            turn_signal: TurnSignal::None,
            change_permit: false,
            events: SmallVec::new(),
            ..owner.clone()
        }
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// A number unique to the vehicle, increasing in order of creation.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// The role of the vehicle.
    pub fn kind(&self) -> VehicleKind {
        self.kind
    }

    /// Whether the vehicle is on the network.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the vehicle returns to the spawn pool when it leaves the network.
    pub fn respawns(&self) -> bool {
        self.respawn
    }

    /// The coordinates in world space of the centre of the vehicle.
    pub fn position(&self) -> Point2d {
        self.position
    }

    /// The heading in degrees, clockwise from the positive y-axis.
    pub fn orientation(&self) -> f64 {
        self.orientation
    }

    /// A unit vector in world space aligned with the vehicle's heading.
    pub fn direction(&self) -> Vector2d {
        heading(self.orientation)
    }

    /// The display colour.
    pub fn color(&self) -> [f32; 3] {
        self.color
    }

    /// The boundary polygon in local space.
    pub fn mesh(&self) -> &[Vector2d] {
        &self.mesh
    }

    /// The boundary polygon in world space.
    pub fn world_mesh(&self) -> Vec<Point2d> {
        self.mesh
            .iter()
            .map(|p| self.position + rotate(*p, self.orientation))
            .collect()
    }

    /// The vehicle's width in m.
    pub fn width(&self) -> f64 {
        2.0 * self.half_wid
    }

    /// The vehicle's length in m.
    pub fn length(&self) -> f64 {
        2.0 * self.half_len
    }

    /// Half the vehicle's length in m.
    pub fn half_length(&self) -> f64 {
        self.half_len
    }

    /// The vehicle's velocity in m/s.
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// The vehicle's maximum velocity in m/s.
    pub fn max_velocity(&self) -> f64 {
        self.max_velocity
    }

    /// The vehicle's acceleration in m/s<sup>2</sup>.
    pub fn acceleration(&self) -> f64 {
        self.acceleration
    }

    /// The vehicle's maximum acceleration in m/s<sup>2</sup>.
    pub fn max_acceleration(&self) -> f64 {
        self.max_acceleration
    }

    /// The waypoint the vehicle is driving towards.
    pub fn target(&self) -> Point2d {
        self.target
    }

    /// The ID of the lane the vehicle is on.
    pub fn lane_id(&self) -> Option<LaneId> {
        self.lane
    }

    /// The vehicle's driver.
    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    /// The turn signal state.
    pub fn turn_signal(&self) -> TurnSignal {
        self.turn_signal
    }

    /// Whether the vehicle may execute its signalled lane change.
    pub fn has_change_permit(&self) -> bool {
        self.change_permit
    }

    /// The pending events of the vehicle.
    pub fn events(&self) -> &[EventId] {
        &self.events
    }

    /// Whether the vehicle takes part in the per-frame update phases.
    pub(crate) fn is_driving(&self) -> bool {
        self.active && self.kind == VehicleKind::Agent
    }

    /// The kinematic state as seen by the vehicle's driver.
    pub(crate) fn kinematics(&self) -> Kinematics {
        Kinematics {
            velocity: self.velocity,
            max_velocity: self.max_velocity,
            max_acceleration: self.max_acceleration,
        }
    }

    /// Sets the velocity, clamped to `[0, max_velocity]`.
    pub(crate) fn set_velocity(&mut self, velocity: f64) {
        self.velocity = f64::max(velocity, 0.0).min(self.max_velocity);
    }

    /// Sets the acceleration, capped at `max_acceleration`.
    /// There is no lower limit, so any deceleration is allowed.
    pub(crate) fn set_acceleration(&mut self, acceleration: f64) {
        self.acceleration = f64::min(acceleration, self.max_acceleration);
    }

    pub(crate) fn set_position(&mut self, position: Point2d) {
        self.position = position;
    }

    /// Sets the waypoint and turns the vehicle to face it.
    pub(crate) fn set_target(&mut self, target: Point2d) {
        self.target = target;
        if let Some(orientation) = orientation_of(target - self.position) {
            self.orientation = orientation;
        }
    }

    pub(crate) fn set_lane(&mut self, lane: Option<LaneId>) {
        self.lane = lane;
    }

    /// Places the vehicle on a lane at rest, facing `target`.
    pub(crate) fn activate(&mut self, lane: LaneId, position: Point2d, target: Point2d) {
        self.active = true;
        self.position = position;
        self.set_target(target);
        self.velocity = 0.0;
        self.acceleration = 0.0;
        self.lane = Some(lane);
        self.turn_signal = TurnSignal::None;
        self.change_permit = false;
    }

    /// Takes the vehicle off the network.
    pub(crate) fn deactivate(&mut self) {
        self.active = false;
        self.lane = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use slotmap::KeyData;

    fn vehicle() -> Vehicle {
        let id = VehicleId::from(KeyData::from_ffi(1));
        Vehicle::new(id, 0, &VehicleAttributes::default())
    }

    #[test]
    fn dimensions_from_attributes() {
        let v = Vehicle::new(
            VehicleId::default(),
            3,
            &VehicleAttributes::truck(),
        );
        assert_eq!(v.length(), 12.0);
        assert_eq!(v.width(), 2.5);
        assert_eq!(v.half_length(), 6.0);
        assert_eq!(v.serial(), 3);
        assert!(!v.is_active());
        assert!(v.respawns());
    }

    #[test]
    fn velocity_and_acceleration_limits() {
        let mut v = vehicle();
        v.set_velocity(25.0);
        assert_eq!(v.velocity(), 10.0);
        v.set_velocity(-3.0);
        assert_eq!(v.velocity(), 0.0);
        v.set_velocity(f64::NAN);
        assert_eq!(v.velocity(), 0.0);

        v.set_acceleration(5.0);
        assert_eq!(v.acceleration(), 1.0);
        v.set_acceleration(-50.0);
        assert_eq!(v.acceleration(), -50.0);
    }

    #[test]
    fn target_sets_orientation() {
        let mut v = vehicle();
        v.set_position(Point2d::new(0.0, 0.0));
        v.set_target(Point2d::new(0.0, 10.0));
        assert_approx_eq!(v.orientation(), 0.0);
        v.set_target(Point2d::new(-10.0, 0.0));
        assert_approx_eq!(v.orientation(), -90.0);

        // A target on top of the vehicle keeps its heading
        v.set_target(Point2d::new(0.0, 0.0));
        assert_approx_eq!(v.orientation(), -90.0);
    }

    #[test]
    fn world_mesh_follows_heading() {
        let mut v = vehicle();
        v.set_position(Point2d::new(5.0, 5.0));
        v.set_target(Point2d::new(100.0, 5.0));
        let mesh = v.world_mesh();
        // The front left corner of a vehicle facing +x
        assert_approx_eq!(mesh[1].x, 7.0);
        assert_approx_eq!(mesh[1].y, 6.25);
    }
}
