//! The six coordination problems. Each has a coordinator (the shared state
//! and its protocol, written once against [`SyncStrategy`](crate::strategy::SyncStrategy))
//! and an `actors` module with the thread bodies that drive it.

pub mod barber;
pub mod buffer;
pub mod charging;
pub mod dining;
pub mod readers_writers;
pub mod smokers;

pub use barber::BarberShop;
pub use buffer::BufferCoordinator;
pub use charging::ChargingStation;
pub use dining::TableCoordinator;
pub use readers_writers::Blackboard;
pub use smokers::SmokersTable;
