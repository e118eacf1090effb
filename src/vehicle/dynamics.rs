use super::Vehicle;
use crate::math::{angle_unsigned, heading, Point2d};
use cgmath::InnerSpace;

/// The largest angle in degrees between the heading and the offset from the target
/// at which the target counts as passed.
const PASSED_ANGLE: f64 = 0.001;

/// Advances the vehicle's velocity by its acceleration,
/// then its position along its heading by the new velocity.
pub fn integrate(vehicle: &mut Vehicle, dt: f64) {
    vehicle.set_velocity(vehicle.velocity() + vehicle.acceleration() * dt);
    let step = heading(vehicle.orientation()) * (vehicle.velocity() * dt);
    vehicle.set_position(vehicle.position() + step);
}

/// Whether a vehicle at `pos` facing `orientation` has reached or driven past `target`.
pub fn reached_target(pos: Point2d, orientation: f64, target: Point2d) -> bool {
    let offset = pos - target;
    if offset.magnitude2() == 0.0 {
        return true;
    }
    angle_unsigned(heading(orientation), offset).map_or(false, |angle| angle < PASSED_ANGLE)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vehicle::VehicleAttributes;
    use crate::VehicleId;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn integrate_moves_along_heading() {
        let mut v = Vehicle::new(VehicleId::default(), 0, &VehicleAttributes::default());
        v.set_target(Point2d::new(100.0, 0.0));
        v.set_acceleration(1.0);
        integrate(&mut v, 2.0);
        assert_approx_eq!(v.velocity(), 2.0);
        assert_approx_eq!(v.position().x, 4.0);
        assert_approx_eq!(v.position().y, 0.0);

        v.set_acceleration(-10.0);
        integrate(&mut v, 1.0);
        assert_eq!(v.velocity(), 0.0);
        assert_approx_eq!(v.position().x, 4.0);
    }

    #[test]
    fn target_reached_once_passed() {
        let target = Point2d::new(10.0, 0.0);
        assert!(!reached_target(Point2d::new(9.0, 0.0), 90.0, target));
        assert!(reached_target(Point2d::new(10.0, 0.0), 90.0, target));
        assert!(reached_target(Point2d::new(10.5, 0.0), 90.0, target));
        assert!(!reached_target(Point2d::new(10.5, 3.0), 90.0, target));
    }
}
