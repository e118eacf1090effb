//! Miscellaneous utility structs and functions.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

/// An interval on the real number line.
#[derive(Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval<T> {
    pub min: T,
    pub max: T,
}

impl<T> Interval<T> {
    /// Creates a new interval.
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }
}

impl<T: std::cmp::PartialOrd> Interval<T> {
    /// Returns true if this interval contains the value.
    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }

    /// Returns true if the interval contains at least one value.
    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }
}

impl<T: std::ops::Sub<T, Output = T> + Copy> Interval<T> {
    /// Gets the magnitude of the interval.
    pub fn length(&self) -> T {
        self.max - self.min
    }
}

impl<T: Debug> Debug for Interval<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interval({:?}, {:?})", &self.min, &self.max)
    }
}

#[cfg(test)]
mod test {
    use super::Interval;

    #[test]
    fn closed_bounds() {
        let i = Interval::new(0.5, 1.5);
        assert!(i.contains(0.5));
        assert!(i.contains(1.5));
        assert!(!i.contains(1.50001));
        assert!(i.is_valid());
        assert_eq!(i.length(), 1.0);
        assert!(!Interval::new(2.0, 1.0).is_valid());
    }
}
