//! Tempo Ports
//!
//! Port definitions (traits) for the Tempo timing core.
//! These define the boundaries between the timing logic and its collaborators:
//! clocks and their event sinks, jobs, the logger, the service bus (RPC) and
//! the property store.

mod clock;
mod error;
mod job;
mod logger;
mod properties;
mod rpc;

pub use clock::{Clock, ClockEventId, ClockEventMask, ClockType, EventSink, TimeSource};
pub use error::RpcError;
pub use job::Job;
pub use logger::{LogFacadeLogger, LogLevel, Logger, MemoryLogger};
pub use properties::{PropertyMap, PropertyStore};
pub use rpc::{RequesterResolver, RpcRequester, RpcService, ServiceRegistry};
