//! One-shot actions deferred until a timer runs out or another event fires.

use crate::math::Point2d;
use crate::vehicle::TurnSignal;
use crate::{EventId, VehicleId};

/// The effect of an event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EventKind {
    /// Sets the owner's turn signal.
    TurnSignal(TurnSignal),
    /// Grants the owner permission to execute its signalled lane change.
    ChangePermit,
    /// Keeps a ghost of the owner driving on the lane it left, until the ghost
    /// leaves the network or the owner turns away from `target`.
    BlockLane {
        /// The waypoint the owner was given by its lane change.
        target: Point2d,
        /// The ghost vehicle blocking the vacated lane.
        ghost: VehicleId,
    },
}

/// A pending action of a vehicle.
#[derive(Clone, Debug)]
pub struct Event {
    owner: VehicleId,
    kind: EventKind,
    /// The time left until the event fires in s.
    timer: Option<f64>,
    /// An event whose firing also fires this one.
    trigger: Option<EventId>,
    fired: bool,
}

impl Event {
    pub(crate) fn new(
        owner: VehicleId,
        kind: EventKind,
        timer: Option<f64>,
        trigger: Option<EventId>,
    ) -> Self {
        Self {
            owner,
            kind,
            timer,
            trigger,
            fired: false,
        }
    }

    /// The vehicle the event acts on.
    pub fn owner(&self) -> VehicleId {
        self.owner
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// The time left until the event fires in s, if it has a timer.
    pub fn timer(&self) -> Option<f64> {
        self.timer
    }

    pub fn trigger(&self) -> Option<EventId> {
        self.trigger
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Counts down the timer and checks the trigger.
    /// Returns `true` exactly once, on the tick the event fires.
    ///
    /// # Parameters
    /// * `dt` - The time step in s
    /// * `trigger_fired` - Whether the trigger event has fired, if there is one
    pub(crate) fn tick(&mut self, dt: f64, trigger_fired: bool) -> bool {
        if self.fired {
            return false;
        }
        let timed_out = match self.timer.as_mut() {
            Some(timer) => {
                *timer -= dt;
                *timer <= 0.0
            }
            None => false,
        };
        let triggered = self.trigger.is_some() && trigger_fired;
        self.fired = timed_out || triggered;
        self.fired
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use slotmap::KeyData;

    fn owner() -> VehicleId {
        VehicleId::from(KeyData::from_ffi(1))
    }

    #[test]
    fn timer_fires_once() {
        let mut event = Event::new(owner(), EventKind::ChangePermit, Some(1.0), None);
        assert!(!event.tick(0.4, false));
        assert!(!event.tick(0.4, false));
        assert!(event.tick(0.4, false));
        assert!(event.has_fired());
        assert!(!event.tick(0.4, false));
    }

    #[test]
    fn trigger_fires() {
        let trigger = EventId::from(KeyData::from_ffi(2));
        let kind = EventKind::TurnSignal(TurnSignal::Left);
        let mut event = Event::new(owner(), kind, None, Some(trigger));
        assert!(!event.tick(10.0, false));
        assert!(event.tick(0.0, true));
        assert!(!event.tick(0.0, true));
    }

    #[test]
    fn timer_or_trigger() {
        let trigger = EventId::from(KeyData::from_ffi(2));
        let mut event = Event::new(owner(), EventKind::ChangePermit, Some(5.0), Some(trigger));
        assert!(event.tick(0.1, true));

        let mut event = Event::new(owner(), EventKind::ChangePermit, Some(0.5), Some(trigger));
        assert!(event.tick(1.0, false));
    }

    #[test]
    fn untimed_event_waits() {
        let mut event = Event::new(owner(), EventKind::ChangePermit, None, None);
        assert!(!event.tick(100.0, true));
        assert!(!event.tick(100.0, false));
        assert!(!event.has_fired());
    }
}
