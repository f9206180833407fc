use crate::protocol::{
    ClockSyncRequest, ClockSyncResponse, MASTER_SERVICE, SLAVE_SERVICE, format_time, parse_time,
};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempo_core::{Duration, Error, ErrorStateHandle, Result, Timestamp};
use tempo_ports::{
    ClockEventId, ClockEventMask, EventSink, Logger, RequesterResolver, RpcError, RpcRequester,
    RpcService, TimeSource,
};

#[derive(Debug, Clone, Copy)]
struct SlaveEntry {
    mask: ClockEventMask,
    last_ack: Option<Timestamp>,
}

/// Relays the participant's clock events to registered sync slaves
///
/// Registered as an event sink of the clock service and served as the
/// `clock_sync_master` RPC service. Relaying never fails the clock: timeouts
/// and transport errors are logged, unexpected errors additionally move the
/// participant into its error state.
pub struct ClockSyncMaster {
    slaves: Mutex<BTreeMap<String, SlaveEntry>>,
    requesters: DashMap<String, Arc<dyn RpcRequester>>,
    resolver: Arc<dyn RequesterResolver>,
    timeout: RwLock<Duration>,
    time_source: Arc<dyn TimeSource>,
    logger: Arc<dyn Logger>,
    error_state: ErrorStateHandle,
}

impl ClockSyncMaster {
    pub fn new(
        time_source: Arc<dyn TimeSource>,
        resolver: Arc<dyn RequesterResolver>,
        timeout: Duration,
        logger: Arc<dyn Logger>,
        error_state: ErrorStateHandle,
    ) -> Self {
        Self {
            slaves: Mutex::new(BTreeMap::new()),
            requesters: DashMap::new(),
            resolver,
            timeout: RwLock::new(timeout),
            time_source,
            logger,
            error_state,
        }
    }

    /// Register `participant_name`, or replace its mask if already registered
    pub fn register_slave(&self, participant_name: &str, mask: ClockEventMask) {
        let mut slaves = self.slaves.lock();
        slaves
            .entry(participant_name.to_string())
            .and_modify(|entry| entry.mask = mask)
            .or_insert(SlaveEntry {
                mask,
                last_ack: None,
            });
        log::info!(
            "sync slave '{participant_name}' registered for events {:#04x}",
            mask.bits()
        );
    }

    pub fn unregister_slave(&self, participant_name: &str) -> Result<()> {
        self.slaves
            .lock()
            .remove(participant_name)
            .ok_or_else(|| Error::NotFound(format!("sync slave '{participant_name}'")))?;
        self.requesters.remove(participant_name);
        log::info!("sync slave '{participant_name}' unregistered");
        Ok(())
    }

    /// Record the time a slave reports it has synchronized to
    pub fn slave_synced(&self, participant_name: &str, ack: Timestamp) -> Result<()> {
        let mut slaves = self.slaves.lock();
        let entry = slaves
            .get_mut(participant_name)
            .ok_or_else(|| Error::NotFound(format!("sync slave '{participant_name}'")))?;
        entry.last_ack = Some(ack);
        Ok(())
    }

    pub fn slave_ack(&self, participant_name: &str) -> Option<Timestamp> {
        self.slaves
            .lock()
            .get(participant_name)
            .and_then(|entry| entry.last_ack)
    }

    /// Registered slaves and their masks, sorted by name
    pub fn registered_slaves(&self) -> Vec<(String, ClockEventMask)> {
        self.slaves
            .lock()
            .iter()
            .map(|(name, entry)| (name.clone(), entry.mask))
            .collect()
    }

    /// Takes effect on the next relayed event
    pub fn update_timeout(&self, timeout: Duration) {
        *self.timeout.write() = timeout;
    }

    pub fn timeout(&self) -> Duration {
        *self.timeout.read()
    }

    fn relay(&self, event: ClockEventId, old_time: Timestamp, new_time: Timestamp) {
        let targets: Vec<String> = self
            .slaves
            .lock()
            .iter()
            .filter(|(_, entry)| entry.mask.contains(event))
            .map(|(name, _)| name.clone())
            .collect();

        for slave in targets {
            self.notify(&slave, event, old_time, new_time);
        }
    }

    fn notify(&self, slave: &str, event: ClockEventId, old_time: Timestamp, new_time: Timestamp) {
        let Some(requester) = self.requester(slave) else {
            let _ = self
                .logger
                .log_error(&format!("clock sync slave '{slave}' not found, {event} skipped"));
            return;
        };

        let request = ClockSyncRequest::SyncTimeEvent {
            event_id: event,
            new_time,
            old_time,
        };
        let request = match request.to_json() {
            Ok(request) => request,
            Err(e) => {
                let _ = self.logger.log_error(&e.to_string());
                return;
            }
        };

        let timeout = self.timeout();
        let mut reply = None;
        let sent = requester.send_request(
            SLAVE_SERVICE,
            &request,
            &mut |text| reply = Some(text.to_string()),
            timeout,
        );

        match sent {
            Ok(()) => self.handle_reply(slave, event, reply),
            Err(RpcError::Timeout { .. }) => {
                let _ = self.logger.log_error(&format!(
                    "clock sync slave '{slave}': timeout after {timeout} relaying {event}"
                ));
            }
            Err(RpcError::Transport(message)) => {
                let _ = self.logger.log_error(&format!(
                    "clock sync slave '{slave}': {event} not delivered: {message}"
                ));
            }
            Err(RpcError::Unexpected(message)) => {
                self.escalate(&format!(
                    "clock sync slave '{slave}': unexpected error relaying {event}: {message}"
                ));
            }
        }
    }

    fn handle_reply(&self, slave: &str, event: ClockEventId, reply: Option<String>) {
        let response = reply
            .ok_or_else(|| Error::Failed("empty reply".into()))
            .and_then(|text| ClockSyncResponse::from_json(&text));
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                self.escalate(&format!(
                    "clock sync slave '{slave}': malformed reply to {event}: {e}"
                ));
                return;
            }
        };

        match response.into_result() {
            Ok(ack) => match parse_time(&ack) {
                Ok(ack) => {
                    // The slave may have unregistered meanwhile
                    let _ = self.slave_synced(slave, ack);
                }
                Err(e) => self.escalate(&format!(
                    "clock sync slave '{slave}': malformed acknowledgement of {event}: {e}"
                )),
            },
            Err(e) => {
                let _ = self.logger.log_error(&format!(
                    "clock sync slave '{slave}' rejected {event}: {e}"
                ));
            }
        }
    }

    fn escalate(&self, message: &str) {
        let _ = self.logger.log_error(message);
        if let Err(e) = self.error_state.escalate(message) {
            let _ = self
                .logger
                .log_error(&format!("failed to enter error state: {e}"));
        }
    }

    fn requester(&self, slave: &str) -> Option<Arc<dyn RpcRequester>> {
        if let Some(requester) = self.requesters.get(slave) {
            return Some(requester.clone());
        }
        let requester = self.resolver.resolve(slave)?;
        self.requesters.insert(slave.to_string(), requester.clone());
        Some(requester)
    }

    fn handle(&self, request: ClockSyncRequest) -> Result<String> {
        match request {
            ClockSyncRequest::RegisterSyncSlave {
                event_mask,
                participant_name,
            } => {
                self.register_slave(&participant_name, event_mask);
                Ok(String::new())
            }
            ClockSyncRequest::UnregisterSyncSlave { participant_name } => {
                self.unregister_slave(&participant_name)?;
                Ok(String::new())
            }
            ClockSyncRequest::SlaveSyncedEvent {
                participant_name,
                ack,
            } => {
                self.slave_synced(&participant_name, ack)?;
                Ok(String::new())
            }
            ClockSyncRequest::GetMasterTime => Ok(format_time(self.time_source.time())),
            ClockSyncRequest::GetMasterType => {
                Ok(self.time_source.clock_type().as_i32().to_string())
            }
            ClockSyncRequest::SyncTimeEvent { .. } => Err(Error::InvalidArg(format!(
                "syncTimeEvent is not served by {MASTER_SERVICE}"
            ))),
        }
    }
}

impl EventSink for ClockSyncMaster {
    fn time_update_begin(&self, old_time: Timestamp, new_time: Timestamp) {
        self.relay(ClockEventId::UpdateBegin, old_time, new_time);
    }

    fn time_updating(&self, new_time: Timestamp) {
        self.relay(ClockEventId::Updating, new_time, new_time);
    }

    fn time_update_end(&self, new_time: Timestamp) {
        self.relay(ClockEventId::UpdateEnd, new_time, new_time);
    }

    fn time_reset_begin(&self, old_time: Timestamp, new_time: Timestamp) {
        self.relay(ClockEventId::ResetBegin, old_time, new_time);
    }

    fn time_reset_end(&self, new_time: Timestamp) {
        self.relay(ClockEventId::ResetEnd, new_time, new_time);
    }
}

impl RpcService for ClockSyncMaster {
    fn service_name(&self) -> &str {
        MASTER_SERVICE
    }

    fn handle_request(&self, request: &str) -> String {
        let result = ClockSyncRequest::from_json(request).and_then(|request| self.handle(request));
        ClockSyncResponse::from_result(result).to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use tempo_ports::{ClockType, LogLevel, MemoryLogger};

    struct FixedTime(Timestamp);

    impl TimeSource for FixedTime {
        fn time(&self) -> Timestamp {
            self.0
        }

        fn clock_type(&self) -> ClockType {
            ClockType::Discrete
        }
    }

    /// What the scripted requester answers
    #[derive(Clone)]
    enum Reply {
        Ack,
        Fail(RpcError),
        Garbage,
    }

    struct ScriptedRequester {
        reply: Reply,
        requests: StdMutex<Vec<(String, ClockSyncRequest)>>,
    }

    impl RpcRequester for ScriptedRequester {
        fn send_request(
            &self,
            service_name: &str,
            request: &str,
            response: &mut dyn FnMut(&str),
            _timeout: Duration,
        ) -> std::result::Result<(), RpcError> {
            let request = ClockSyncRequest::from_json(request).unwrap();
            let ack = match &request {
                ClockSyncRequest::SyncTimeEvent { new_time, .. } => *new_time,
                _ => Timestamp::ZERO,
            };
            self.requests
                .lock()
                .unwrap()
                .push((service_name.to_string(), request));
            match &self.reply {
                Reply::Ack => {
                    response(&ClockSyncResponse::ok(format_time(ack)).to_json());
                    Ok(())
                }
                Reply::Fail(e) => Err(e.clone()),
                Reply::Garbage => {
                    response("<html>");
                    Ok(())
                }
            }
        }
    }

    struct SingleResolver {
        name: String,
        requester: Arc<ScriptedRequester>,
    }

    impl RequesterResolver for SingleResolver {
        fn resolve(&self, participant_name: &str) -> Option<Arc<dyn RpcRequester>> {
            if participant_name == self.name {
                let requester: Arc<dyn RpcRequester> = self.requester.clone();
                Some(requester)
            } else {
                None
            }
        }
    }

    struct Fixture {
        master: ClockSyncMaster,
        requester: Arc<ScriptedRequester>,
        logger: Arc<MemoryLogger>,
        error_state: ErrorStateHandle,
    }

    fn fixture(reply: Reply) -> Fixture {
        let requester = Arc::new(ScriptedRequester {
            reply,
            requests: StdMutex::new(Vec::new()),
        });
        let resolver = Arc::new(SingleResolver {
            name: "s1".into(),
            requester: requester.clone(),
        });
        let logger = Arc::new(MemoryLogger::new());
        let error_state = ErrorStateHandle::detached();
        let master = ClockSyncMaster::new(
            Arc::new(FixedTime(Timestamp(1234))),
            resolver,
            Duration::from_millis(100),
            logger.clone(),
            error_state.clone(),
        );
        Fixture {
            master,
            requester,
            logger,
            error_state,
        }
    }

    fn sent(fixture: &Fixture) -> Vec<(String, ClockSyncRequest)> {
        fixture.requester.requests.lock().unwrap().clone()
    }

    #[test]
    fn test_relays_only_masked_events() {
        let f = fixture(Reply::Ack);
        f.master.register_slave("s1", ClockEventMask::UPDATING);

        f.master.time_update_begin(Timestamp(0), Timestamp(10));
        f.master.time_updating(Timestamp(10));
        f.master.time_update_end(Timestamp(10));

        assert_eq!(
            sent(&f),
            vec![(
                SLAVE_SERVICE.to_string(),
                ClockSyncRequest::SyncTimeEvent {
                    event_id: ClockEventId::Updating,
                    new_time: Timestamp(10),
                    old_time: Timestamp(10),
                }
            )]
        );
        assert_eq!(f.master.slave_ack("s1"), Some(Timestamp(10)));
    }

    #[test]
    fn test_no_relay_after_unregister() {
        let f = fixture(Reply::Ack);
        f.master.register_slave("s1", ClockEventMask::UPDATING);
        f.master.unregister_slave("s1").unwrap();

        f.master.time_updating(Timestamp(10));
        assert!(sent(&f).is_empty());
        assert!(matches!(
            f.master.unregister_slave("s1"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_register_is_idempotent_and_updates_mask() {
        let f = fixture(Reply::Ack);
        f.master.register_slave("s1", ClockEventMask::UPDATING);
        f.master.register_slave("s1", ClockEventMask::RESET_BEGIN);

        assert_eq!(
            f.master.registered_slaves(),
            vec![("s1".to_string(), ClockEventMask::RESET_BEGIN)]
        );
        f.master.time_updating(Timestamp(10));
        assert!(sent(&f).is_empty());
    }

    #[test]
    fn test_timeout_is_logged_and_relaying_continues() {
        let f = fixture(Reply::Fail(RpcError::Timeout {
            service: SLAVE_SERVICE.into(),
            timeout: Duration::from_millis(100),
        }));
        f.master.register_slave("s1", ClockEventMask::ALL);

        f.master.time_updating(Timestamp(10));
        f.master.time_updating(Timestamp(20));

        let errors = f.logger.messages(LogLevel::Error);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("s1"));
        assert!(errors[0].contains("timeout"));
        assert!(!f.error_state.is_escalated());
        assert_eq!(sent(&f).len(), 2);
    }

    #[test]
    fn test_transport_error_is_logged_without_escalation() {
        let f = fixture(Reply::Fail(RpcError::Transport("connection refused".into())));
        f.master.register_slave("s1", ClockEventMask::UPDATING);

        f.master.time_updating(Timestamp(10));

        let errors = f.logger.messages(LogLevel::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("connection refused"));
        assert!(!f.error_state.is_escalated());
    }

    #[test]
    fn test_unexpected_error_escalates_once() {
        let f = fixture(Reply::Fail(RpcError::Unexpected("peer crashed".into())));
        f.master.register_slave("s1", ClockEventMask::UPDATING);

        f.master.time_updating(Timestamp(10));
        f.master.time_updating(Timestamp(20));

        assert!(f.error_state.is_escalated());
        assert!(f.error_state.reason().unwrap().contains("peer crashed"));
        assert_eq!(f.logger.messages(LogLevel::Error).len(), 2);
    }

    #[test]
    fn test_malformed_reply_escalates() {
        let f = fixture(Reply::Garbage);
        f.master.register_slave("s1", ClockEventMask::UPDATING);

        f.master.time_updating(Timestamp(10));
        assert!(f.error_state.is_escalated());
    }

    #[test]
    fn test_unresolvable_slave_is_skipped() {
        let f = fixture(Reply::Ack);
        f.master.register_slave("ghost", ClockEventMask::UPDATING);
        f.master.register_slave("s1", ClockEventMask::UPDATING);

        f.master.time_updating(Timestamp(10));

        assert_eq!(sent(&f).len(), 1);
        let errors = f.logger.messages(LogLevel::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("ghost"));
    }

    #[test]
    fn test_update_timeout() {
        let f = fixture(Reply::Ack);
        f.master.update_timeout(Duration::from_millis(7));
        assert_eq!(f.master.timeout(), Duration::from_millis(7));
    }

    #[test]
    fn test_rpc_surface() {
        let f = fixture(Reply::Ack);
        let call = |request: &str| ClockSyncResponse::from_json(&f.master.handle_request(request)).unwrap();

        let registered = call(
            r#"{"method":"registerSyncSlave","params":{"event_mask":2,"participant_name":"s1"}}"#,
        );
        assert_eq!(registered.status, 0);
        assert_eq!(
            f.master.registered_slaves(),
            vec![("s1".to_string(), ClockEventMask::UPDATING)]
        );

        assert_eq!(call(r#"{"method":"getMasterTime"}"#).result, "1234");
        assert_eq!(call(r#"{"method":"getMasterType"}"#).result, "1");

        let synced = call(
            r#"{"method":"slaveSyncedEvent","params":{"participant_name":"s1","ack":"99"}}"#,
        );
        assert_eq!(synced.status, 0);
        assert_eq!(f.master.slave_ack("s1"), Some(Timestamp(99)));

        let unknown = call(
            r#"{"method":"slaveSyncedEvent","params":{"participant_name":"s2","ack":"1"}}"#,
        );
        assert_eq!(unknown.status, Error::NotFound(String::new()).code());

        let malformed = call("not json");
        assert_eq!(malformed.status, Error::InvalidArg(String::new()).code());

        let unregistered =
            call(r#"{"method":"unregisterSyncSlave","params":{"participant_name":"s1"}}"#);
        assert_eq!(unregistered.status, 0);
        assert!(f.master.registered_slaves().is_empty());
    }
}
