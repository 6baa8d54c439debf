use crate::{VcliConfig, core::infrastructure::inventory_client::InventoryClient};
use std::sync::Arc;

/// Everything one invocation shares: the remote client and the configuration.
///
/// Built once per invocation and lent to every service.
#[derive(Clone)]
pub struct VcliContext {
    client: Arc<dyn InventoryClient>,
    config: Arc<VcliConfig>,
}

impl VcliContext {
    pub fn new(client: Arc<dyn InventoryClient>, config: VcliConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }

    pub fn client(&self) -> &dyn InventoryClient {
        self.client.as_ref()
    }

    pub fn config(&self) -> &VcliConfig {
        &self.config
    }
}

impl std::fmt::Debug for VcliContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VcliContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
