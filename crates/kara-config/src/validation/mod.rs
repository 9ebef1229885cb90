//! Configuration validation.
//!
//! Every check pushes into a shared error list so a single
//! `ConfigError` reports all problems at once.

mod helpers;


use kara_common::ConfigError;

use crate::schema::KaraConfig;

use helpers::{validate_loopback, validate_non_empty, validate_range};

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &KaraConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_non_empty(&mut errors, "app.id", &config.app.id);

    validate_non_empty(&mut errors, "transport.host", &config.transport.host);
    validate_loopback(&mut errors, "transport.host", &config.transport.host);
    validate_range(
        &mut errors,
        "transport.grace_period_ms",
        config.transport.grace_period_ms,
        1,
        60_000,
    );

    validate_non_empty(&mut errors, "renderer.program", &config.renderer.program);

    if let Some(timeout) = config.ipc.invoke_timeout_ms {
        validate_range(&mut errors, "ipc.invoke_timeout_ms", timeout, 1, 3_600_000);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
