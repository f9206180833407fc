use crate::error::RpcError;
use std::sync::Arc;
use tempo_core::{Duration, Result};

/// Client side of the service bus, bound to one remote participant
pub trait RpcRequester: Send + Sync {
    /// Send `request` to `service_name` and wait at most `timeout` for the reply
    ///
    /// On success the reply payload is handed to `response` before returning.
    fn send_request(
        &self,
        service_name: &str,
        request: &str,
        response: &mut dyn FnMut(&str),
        timeout: Duration,
    ) -> std::result::Result<(), RpcError>;
}

/// Server side of the service bus: one named service answering requests
pub trait RpcService: Send + Sync {
    fn service_name(&self) -> &str;

    /// Handle one request payload and produce the reply payload
    fn handle_request(&self, request: &str) -> String;
}

/// Looks up a requester for a participant by name
pub trait RequesterResolver: Send + Sync {
    fn resolve(&self, participant_name: &str) -> Option<Arc<dyn RpcRequester>>;
}

/// Where a participant exposes its services
pub trait ServiceRegistry: Send + Sync {
    fn register_service(&self, participant_name: &str, service: Arc<dyn RpcService>) -> Result<()>;

    fn unregister_service(&self, participant_name: &str, service_name: &str) -> Result<()>;
}
