pub use cgmath;
pub use config::{LaneChangeConfig, SimulationConfig};
pub use error::{ConfigError, Error, LayoutError};
pub use event::{Event, EventKind};
pub use network::{Lane, Network, NodeRef, Road, Segment};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use spawner::{SpawnPool, Spawner};
pub use util::Interval;
pub use vehicle::{
    Driver, DriverModel, DriverParams, Kinematics, Leader, MobilAccelerations, TurnSignal,
    Vehicle, VehicleAttributes, VehicleKind,
};
pub use world::{Anomaly, World};

mod config;
mod error;
mod event;
pub mod math;
mod network;
pub mod scenario;
mod spawner;
mod util;
mod vehicle;
mod world;

new_key_type! {
    /// Unique ID of a [Road].
    pub struct RoadId;
    /// Unique ID of a [Lane].
    pub struct LaneId;
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
    /// Unique ID of an [Event].
    pub struct EventId;
}

type LaneSet = SlotMap<LaneId, Lane>;
type VehicleSet = SlotMap<VehicleId, Vehicle>;
