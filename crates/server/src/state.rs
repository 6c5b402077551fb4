//! Shared application state wiring.

use std::path::PathBuf;
use std::sync::Arc;

use mb::{MessageDispatcher, PairingArtifactProducer, SessionLifecycleController, SessionRegistry};
use mb_runtime::{DriverConfig, DriverTransportFactory, TransportFactory};

use crate::cli::ServerArgs;

/// Handles shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<SessionLifecycleController>,
    pub dispatcher: Arc<MessageDispatcher>,
}

impl AppState {
    /// Wires the production driver-backed stack from CLI arguments.
    pub fn from_args(args: &ServerArgs) -> Self {
        let factory = Arc::new(DriverTransportFactory::new(DriverConfig {
            program: args.driver.clone(),
            args: args.driver_args.clone(),
            session_root: args.session_root.clone(),
        }));
        Self::with_factory(factory, args.pairing_dir.clone(), args.public_base_url())
    }

    /// Wires the stack over an arbitrary transport factory; tests hand in
    /// the fake.
    pub fn with_factory(
        factory: Arc<dyn TransportFactory>,
        pairing_dir: PathBuf,
        public_base_url: String,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let producer = Arc::new(PairingArtifactProducer::new(pairing_dir, public_base_url));
        let controller = Arc::new(SessionLifecycleController::new(
            Arc::clone(&registry),
            factory,
            producer,
        ));
        let dispatcher = Arc::new(MessageDispatcher::new(registry));
        Self {
            controller,
            dispatcher,
        }
    }
}
