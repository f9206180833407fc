use crossbeam_channel::RecvTimeoutError;
use dashmap::DashMap;
use std::sync::Arc;
use std::thread;
use tempo_core::{Duration, Error, Result};
use tempo_ports::{RequesterResolver, RpcError, RpcRequester, RpcService, ServiceRegistry};

type ServiceKey = (String, String);

/// In-process service bus connecting participants of one process
///
/// Every request is handled on its own thread while the caller waits on a
/// reply channel, so a service that hangs surfaces as [`RpcError::Timeout`]
/// instead of blocking the caller.
#[derive(Default, Clone)]
pub struct LoopbackRpc {
    services: Arc<DashMap<ServiceKey, Arc<dyn RpcService>>>,
}

impl LoopbackRpc {
    pub fn new() -> Self {
        Self::default()
    }

    fn has_participant(&self, participant_name: &str) -> bool {
        self.services
            .iter()
            .any(|entry| entry.key().0 == participant_name)
    }
}

impl ServiceRegistry for LoopbackRpc {
    fn register_service(&self, participant_name: &str, service: Arc<dyn RpcService>) -> Result<()> {
        let key = (
            participant_name.to_string(),
            service.service_name().to_string(),
        );
        if self.services.contains_key(&key) {
            return Err(Error::ResourceInUse(format!(
                "service '{}' of '{}' is already registered",
                key.1, key.0
            )));
        }
        log::debug!("loopback: '{}' serves '{}'", key.0, key.1);
        self.services.insert(key, service);
        Ok(())
    }

    fn unregister_service(&self, participant_name: &str, service_name: &str) -> Result<()> {
        self.services
            .remove(&(participant_name.to_string(), service_name.to_string()))
            .map(|_| ())
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "service '{service_name}' of '{participant_name}'"
                ))
            })
    }
}

impl RequesterResolver for LoopbackRpc {
    fn resolve(&self, participant_name: &str) -> Option<Arc<dyn RpcRequester>> {
        if !self.has_participant(participant_name) {
            return None;
        }
        Some(Arc::new(LoopbackRequester {
            services: self.services.clone(),
            participant_name: participant_name.to_string(),
        }))
    }
}

/// Requester bound to one participant of a [`LoopbackRpc`]
struct LoopbackRequester {
    services: Arc<DashMap<ServiceKey, Arc<dyn RpcService>>>,
    participant_name: String,
}

impl RpcRequester for LoopbackRequester {
    fn send_request(
        &self,
        service_name: &str,
        request: &str,
        response: &mut dyn FnMut(&str),
        timeout: Duration,
    ) -> std::result::Result<(), RpcError> {
        let service = self
            .services
            .get(&(self.participant_name.clone(), service_name.to_string()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                RpcError::Transport(format!(
                    "participant '{}' does not serve '{service_name}'",
                    self.participant_name
                ))
            })?;

        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let request = request.to_string();
        thread::Builder::new()
            .name(format!("rpc-{service_name}"))
            .spawn(move || {
                let reply = service.handle_request(&request);
                // The caller may have given up already
                let _ = reply_tx.send(reply);
            })
            .map_err(|e| RpcError::Transport(format!("failed to dispatch request: {e}")))?;

        match reply_rx.recv_timeout(timeout.to_std()) {
            Ok(reply) => {
                response(&reply);
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => Err(RpcError::Timeout {
                service: service_name.to_string(),
                timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(RpcError::Unexpected(format!(
                "service '{service_name}' of '{}' dropped the request",
                self.participant_name
            ))),
        }
    }
}
