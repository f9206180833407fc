use crate::protocol::{ClockSyncRequest, ClockSyncResponse, SLAVE_SERVICE, format_time};
use crate::slave::SyncEventTarget;
use parking_lot::RwLock;
use std::sync::Arc;
use tempo_core::{Error, Result};
use tempo_ports::RpcService;

/// The `clock_sync_slave` RPC service of a participant
///
/// Dispatches `syncTimeEvent` into the attached slave clock and answers with
/// the slave's time after applying it.
#[derive(Default)]
pub struct ClockSyncSlaveService {
    target: RwLock<Option<Arc<dyn SyncEventTarget>>>,
}

impl ClockSyncSlaveService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, target: Arc<dyn SyncEventTarget>) {
        *self.target.write() = Some(target);
    }

    pub fn detach(&self) {
        self.target.write().take();
    }

    pub fn is_attached(&self) -> bool {
        self.target.read().is_some()
    }

    fn handle(&self, request: ClockSyncRequest) -> Result<String> {
        let ClockSyncRequest::SyncTimeEvent {
            event_id,
            new_time,
            old_time,
        } = request
        else {
            return Err(Error::InvalidArg(format!(
                "only syncTimeEvent is served by {SLAVE_SERVICE}"
            )));
        };

        let target = self
            .target
            .read()
            .clone()
            .ok_or_else(|| Error::InvalidState("no slave clock attached".into()))?;
        let time = target.on_sync_event(event_id, old_time, new_time)?;
        Ok(format_time(time))
    }
}

impl RpcService for ClockSyncSlaveService {
    fn service_name(&self) -> &str {
        SLAVE_SERVICE
    }

    fn handle_request(&self, request: &str) -> String {
        let result = ClockSyncRequest::from_json(request).and_then(|request| self.handle(request));
        ClockSyncResponse::from_result(result).to_json()
    }
}
