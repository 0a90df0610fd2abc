//! Agent bootstrap: from configuration to a serving request processor.
//!
//! The transport owns the connection lifecycle; this module only assembles
//! the engine around it. Registry population happens here, once, before
//! the processor sees its first envelope.

use std::sync::Arc;

use tether_modules::results::ResultsStore;

use crate::config::AgentConfig;
use crate::connector::Connector;
use crate::loader;
use crate::processor::RequestProcessor;

/// Builds the request processor for the given configuration.
///
/// Loads built-in and on-disk modules, prepares the results store, and
/// wires the processor to the connector. Module loading failures are
/// logged and skipped; the processor always comes up.
#[must_use]
pub fn bootstrap(config: &AgentConfig, connector: Arc<dyn Connector>) -> Arc<RequestProcessor> {
    let registry = loader::build_registry(
        config.modules_dir.as_deref(),
        config.modules_config_dir.as_deref(),
    );
    let results_store = ResultsStore::new(config.spool_dir.clone());
    Arc::new(RequestProcessor::new(
        Arc::new(registry),
        connector,
        results_store,
        config.max_workers,
    ))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::connector::ConnectionError;
    use crate::messages::ResponseMessage;

    use super::*;

    struct NullConnector;

    impl Connector for NullConnector {
        fn send(
            &self,
            _endpoint: &str,
            _message: ResponseMessage,
            _timeout: Duration,
        ) -> Result<(), ConnectionError> {
            Ok(())
        }
    }

    #[test]
    fn bootstrap_always_yields_a_serving_processor() {
        let config = AgentConfig::default();
        let processor = bootstrap(&config, Arc::new(NullConnector));
        assert!(processor.registry().get("echo").is_some());
    }
}
