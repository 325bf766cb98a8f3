use std::path::Path;

use crate::{
    backend::memory::MemoryBackend,
    infra::{self, config::FileConfigAdapter, contracts::ConfigAdapter, error::AppError},
    usecases::context::AppContext,
};

pub fn bootstrap(config_path: Option<&Path>) -> Result<AppContext, AppError> {
    let context = build_context(config_path)?;
    infra::logging::init(&context.config.logging)?;
    seed_sandbox(&context)?;

    Ok(context)
}

fn build_context(config_path: Option<&Path>) -> Result<AppContext, AppError> {
    let config_adapter = FileConfigAdapter::new(config_path);
    let config = config_adapter.load().map_err(AppError::Other)?;

    Ok(AppContext::new(config, MemoryBackend::new()))
}

fn seed_sandbox(context: &AppContext) -> Result<(), AppError> {
    for user in &context.config.sandbox.users {
        let id = context
            .backend
            .register_user(&user.name, &user.email, &user.password)
            .map_err(|error| AppError::Other(error.into()))?;
        tracing::debug!(user_id = %id, email = %user.email, "sandbox account provisioned");
    }

    Ok(())
}
