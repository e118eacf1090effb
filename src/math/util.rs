use super::{Point2d, Vector2d};
use crate::util::Interval;
use cgmath::prelude::*;

/// The unit vector a zero orientation points along.
pub const FORWARD: Vector2d = Vector2d::new(0.0, 1.0);

/// Rotates a vector by the given angle in degrees.
/// Positive angles rotate clockwise, negative angles anti-clockwise.
pub fn rotate(vec: Vector2d, degrees: f64) -> Vector2d {
    let (s, c) = degrees.to_radians().sin_cos();
    Vector2d::new(c * vec.x + s * vec.y, -s * vec.x + c * vec.y)
}

/// Gets the unit heading vector for an orientation in degrees.
pub fn heading(orientation: f64) -> Vector2d {
    rotate(FORWARD, orientation)
}

/// The perp dot product, `|a||b|sin(theta)`.
pub fn perp_dot(a: Vector2d, b: Vector2d) -> f64 {
    a.x * b.y - a.y * b.x
}

/// The unsigned angle between two vectors, in degrees within `[0, 180]`.
/// Returns `None` if either vector has zero length.
pub fn angle_unsigned(a: Vector2d, b: Vector2d) -> Option<f64> {
    let mag = a.magnitude() * b.magnitude();
    if mag == 0.0 {
        return None;
    }
    let cos = (a.dot(b) / mag).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}

/// The signed angle which rotates `a` onto `b`, in degrees within `(-180, 180]`.
/// Clockwise is positive, matching [rotate].
pub fn angle_signed(a: Vector2d, b: Vector2d) -> Option<f64> {
    let angle = angle_unsigned(a, b)?;
    if perp_dot(a, b) > 0.0 {
        Some(-angle)
    } else {
        Some(angle)
    }
}

/// Gets the orientation in degrees which faces along `dir`.
pub fn orientation_of(dir: Vector2d) -> Option<f64> {
    angle_signed(FORWARD, dir)
}

/// Projects a point onto the infinite line through `a` and `b`.
pub fn project_onto_line(point: Point2d, a: Point2d, b: Point2d) -> Point2d {
    let u = b - a;
    let len2 = u.magnitude2();
    if len2 == 0.0 {
        return a;
    }
    a + ((point - a).dot(u) / len2) * u
}

/// Projects a point onto the line segment between `a` and `b`,
/// or returns `None` if the projection falls outside of the segment.
pub fn project_onto_segment(point: Point2d, a: Point2d, b: Point2d) -> Option<Point2d> {
    projects_onto_segment(point, a, b).then(|| project_onto_line(point, a, b))
}

/// Checks whether the projection of `point` onto the line through `a` and `b`
/// lies between the two.
pub fn projects_onto_segment(point: Point2d, a: Point2d, b: Point2d) -> bool {
    let s = b - a;
    Interval::new(0.0, s.magnitude2()).contains(s.dot(point - a))
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn rotation_is_clockwise() {
        let v = rotate(Vector2d::new(0.0, 1.0), 90.0);
        assert_approx_eq!(v.x, 1.0);
        assert_approx_eq!(v.y, 0.0);

        let v = rotate(Vector2d::new(1.0, 0.0), -90.0);
        assert_approx_eq!(v.x, 0.0);
        assert_approx_eq!(v.y, 1.0);
    }

    #[test]
    fn signed_angles() {
        let up = Vector2d::new(0.0, 1.0);
        assert_approx_eq!(angle_signed(up, Vector2d::new(1.0, 0.0)).unwrap(), 90.0);
        assert_approx_eq!(angle_signed(up, Vector2d::new(-1.0, 0.0)).unwrap(), -90.0);
        assert_approx_eq!(angle_signed(up, Vector2d::new(0.0, -1.0)).unwrap(), 180.0);
        assert_approx_eq!(angle_unsigned(up, Vector2d::new(-1.0, -1.0)).unwrap(), 135.0);
        assert_eq!(angle_signed(up, Vector2d::new(0.0, 0.0)), None);

        // Rotating by the signed angle maps one vector onto the other
        let a = Vector2d::new(3.0, 1.0).normalize();
        let b = Vector2d::new(-2.0, 5.0).normalize();
        let r = rotate(a, angle_signed(a, b).unwrap());
        assert_approx_eq!(r.x, b.x);
        assert_approx_eq!(r.y, b.y);
    }

    #[test]
    fn orientation_round_trips_heading() {
        for deg in [-135.0, -90.0, 0.0, 45.0, 90.0, 170.0] {
            assert_approx_eq!(orientation_of(heading(deg)).unwrap(), deg);
        }
    }

    #[test]
    fn projection() {
        let a = Point2d::new(0.0, 0.0);
        let b = Point2d::new(10.0, 0.0);

        let p = project_onto_line(Point2d::new(3.0, 4.0), a, b);
        assert_eq!(p, Point2d::new(3.0, 0.0));

        let p = project_onto_line(Point2d::new(-3.0, 4.0), a, b);
        assert_eq!(p, Point2d::new(-3.0, 0.0));
        assert_eq!(project_onto_segment(Point2d::new(-3.0, 4.0), a, b), None);

        assert!(projects_onto_segment(a, a, b));
        assert!(projects_onto_segment(b, a, b));
        assert!(!projects_onto_segment(Point2d::new(10.1, 0.0), a, b));
    }

    #[test]
    fn projection_of_point_on_segment_is_fixed() {
        let a = Point2d::new(1.0, 2.0);
        let b = Point2d::new(5.0, 10.0);
        let p = Point2d::new(2.0, 4.0);
        let q = project_onto_segment(p, a, b).unwrap();
        assert_approx_eq!(q.x, p.x);
        assert_approx_eq!(q.y, p.y);
    }
}
