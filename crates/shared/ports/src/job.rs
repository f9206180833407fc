use tempo_core::{Result, Timestamp};

/// A three-phase unit of scheduled work
///
/// The scheduler calls the phases in order for every trigger time:
/// read inputs, compute, publish outputs. Implementations are shared between
/// the registry and the scheduler, so they take `&self` and keep their own
/// interior state.
pub trait Job: Send + Sync {
    fn execute_data_in(&self, time: Timestamp) -> Result<()>;

    fn execute(&self, time: Timestamp) -> Result<()>;

    fn execute_data_out(&self, time: Timestamp) -> Result<()>;
}
