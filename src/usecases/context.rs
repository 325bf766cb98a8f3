use crate::{backend::memory::MemoryBackend, infra::config::AppConfig};

#[derive(Debug)]
pub struct AppContext {
    pub config: AppConfig,
    pub backend: MemoryBackend,
}

impl AppContext {
    pub fn new(config: AppConfig, backend: MemoryBackend) -> Self {
        Self { config, backend }
    }
}
