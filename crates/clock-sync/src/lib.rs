//! Tempo Clock Synchronization
//!
//! Keeps the clocks of several participants aligned to one timing master.
//!
//! ```text
//!        timing master                          slave participant
//! ┌────────────────────────┐   syncTimeEvent   ┌──────────────────────────────┐
//! │ ClockService           │ ────────────────► │ ClockSyncSlaveService        │
//! │   └─► ClockSyncMaster  │                   │   └─► DiscreteSlaveClock     │
//! │        (event sink)    │ ◄──────────────── │       ContinuousSlaveClock   │
//! └────────────────────────┘   getMasterTime,  └──────────────────────────────┘
//!                              (un)registerSyncSlave
//! ```
//!
//! The master relays only the events each slave registered for. Continuous
//! slaves poll the master's time and interpolate between polls; discrete
//! slaves step exactly when the master steps.

pub mod config;
mod connection;
mod interpolation;
mod loopback;
mod master;
pub mod protocol;
mod slave;
mod slave_service;

pub use config::ClockSyncConfig;
pub use connection::MasterConnection;
pub use interpolation::InterpolationTime;
pub use loopback::LoopbackRpc;
pub use master::ClockSyncMaster;
pub use protocol::{ClockSyncRequest, ClockSyncResponse, MASTER_SERVICE, SLAVE_SERVICE};
pub use slave::{
    ContinuousSlaveClock, DiscreteSlaveClock, SLAVE_MASTER_ON_DEMAND,
    SLAVE_MASTER_ON_DEMAND_DISCRETE, SyncEventTarget,
};
pub use slave_service::ClockSyncSlaveService;
