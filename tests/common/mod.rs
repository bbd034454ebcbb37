//! Shared utilities for integration tests.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use capconf::ServiceConfig;

/// Write a properties file, replacing any previous content.
#[allow(dead_code)]
pub fn write_properties(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
}

/// Service config with watching off and `variables` available to `@NAME@` locators.
#[allow(dead_code)]
pub fn unwatched_config(variables: &[(&str, &Path)]) -> ServiceConfig {
    let mut config = watched_config(variables);
    config.watch.enabled = false;
    config
}

/// Service config with a fast watch loop.
#[allow(dead_code)]
pub fn watched_config(variables: &[(&str, &Path)]) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.watch.idle_poll_ms = 10;
    config.watch.debounce_ms = 20;
    config.watch.poll_interval_ms = 100;
    config.resolver.variables = variables
        .iter()
        .map(|(name, path)| (name.to_string(), path.display().to_string()))
        .collect::<HashMap<_, _>>();
    config
}

/// Path of `name` inside `dir`.
#[allow(dead_code)]
pub fn file_in(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

/// Poll `check` until it holds or `timeout` elapses.
#[allow(dead_code)]
pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
