use crate::protocol::{ClockSyncRequest, ClockSyncResponse, MASTER_SERVICE, parse_time};
use std::sync::Arc;
use tempo_core::{Duration, Error, Result, Timestamp};
use tempo_ports::{ClockEventMask, ClockType, RequesterResolver};

/// A slave's view of its timing master's `clock_sync_master` service
pub struct MasterConnection {
    participant_name: String,
    master_name: String,
    resolver: Arc<dyn RequesterResolver>,
    timeout: Duration,
}

impl MasterConnection {
    pub fn new(
        participant_name: impl Into<String>,
        master_name: impl Into<String>,
        resolver: Arc<dyn RequesterResolver>,
        timeout: Duration,
    ) -> Self {
        Self {
            participant_name: participant_name.into(),
            master_name: master_name.into(),
            resolver,
            timeout,
        }
    }

    pub fn participant_name(&self) -> &str {
        &self.participant_name
    }

    pub fn master_name(&self) -> &str {
        &self.master_name
    }

    pub fn register(&self, event_mask: ClockEventMask) -> Result<()> {
        self.call(&ClockSyncRequest::RegisterSyncSlave {
            event_mask,
            participant_name: self.participant_name.clone(),
        })
        .map(|_| ())
    }

    pub fn unregister(&self) -> Result<()> {
        self.call(&ClockSyncRequest::UnregisterSyncSlave {
            participant_name: self.participant_name.clone(),
        })
        .map(|_| ())
    }

    pub fn master_time(&self) -> Result<Timestamp> {
        parse_time(&self.call(&ClockSyncRequest::GetMasterTime)?)
    }

    pub fn master_type(&self) -> Result<ClockType> {
        let reply = self.call(&ClockSyncRequest::GetMasterType)?;
        reply
            .trim()
            .parse::<i32>()
            .ok()
            .and_then(ClockType::from_i32)
            .ok_or_else(|| Error::InvalidArg(format!("'{reply}' is not a clock type")))
    }

    pub fn report_synced(&self, ack: Timestamp) -> Result<()> {
        self.call(&ClockSyncRequest::SlaveSyncedEvent {
            participant_name: self.participant_name.clone(),
            ack,
        })
        .map(|_| ())
    }

    fn call(&self, request: &ClockSyncRequest) -> Result<String> {
        let requester = self.resolver.resolve(&self.master_name).ok_or_else(|| {
            Error::NotFound(format!("timing master '{}'", self.master_name))
        })?;

        let request = request.to_json()?;
        let mut reply = None;
        requester.send_request(
            MASTER_SERVICE,
            &request,
            &mut |text| reply = Some(text.to_string()),
            self.timeout,
        )?;

        let reply = reply.ok_or_else(|| {
            Error::Failed(format!("empty reply from timing master '{}'", self.master_name))
        })?;
        ClockSyncResponse::from_json(&reply)?.into_result()
    }
}
