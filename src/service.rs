//! The configuration service.
//!
//! # Responsibilities
//! - Own the cache, the watch registry and the watch loop as one unit
//! - Hand out typed capabilities
//! - Tear everything down on `shutdown` or drop
//!
//! Several services can run side by side; they share nothing, including
//! the metrics switch.

use std::any::TypeId;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;

use crate::cache::{ReloadCache, ReloadReport};
use crate::config::loader::ConfigError;
use crate::config::schema::{FactoryKind, ServiceConfig};
use crate::config::validation::validate_config;
use crate::contract::Contract;
use crate::error::{Error, Result};
use crate::lifecycle::Shutdown;
use crate::module::{BytecodeFactory, Capability, DispatchTableFactory, InstanceFactory};
use crate::observability::metrics::Metrics;
use crate::resolver::{ContractResolver, ResolutionWarning};
use crate::source::{LocatorResolver, PropertiesReader, SourceReader};
use crate::watch::{WatchCoordinator, WatchError, WatchRegistry};

/// Configuration-backed capabilities with hot reload.
pub struct ConfigService {
    config: ServiceConfig,
    cache: Arc<ReloadCache>,
    registry: Arc<WatchRegistry>,
    shutdown: Shutdown,
    watch_task: Mutex<Option<JoinHandle<()>>>,
}

impl ConfigService {
    /// Start a service reading `.properties` sources with the configured factory.
    ///
    /// With `watch.enabled` this must run inside a Tokio runtime.
    pub fn start(config: ServiceConfig) -> Result<Self> {
        let factory = factory_for(&config);
        Self::start_with(config, Arc::new(PropertiesReader), factory)
    }

    /// Start a service with a custom source reader and instance factory.
    pub fn start_with(
        config: ServiceConfig,
        reader: Arc<dyn SourceReader>,
        factory: Arc<dyn InstanceFactory>,
    ) -> Result<Self> {
        validate_config(&config).map_err(|e| Error::Config(ConfigError::Validation(e)))?;

        let registry = Arc::new(WatchRegistry::new());
        let locator = LocatorResolver::new(
            config.resolver.marker,
            config.resolver.variables.clone(),
            config.resolver.base_dir.clone(),
        );
        let resolver = ContractResolver::new(reader, locator, registry.clone());
        let cache = Arc::new(
            ReloadCache::new(resolver, factory.clone())
                .with_metrics(Metrics::new(config.observability.metrics_enabled)),
        );
        let shutdown = Shutdown::new();

        let watch_task = if config.watch.enabled {
            let runtime = tokio::runtime::Handle::try_current().map_err(|_| WatchError::NoRuntime)?;
            let coordinator = WatchCoordinator::new(registry.clone(), &config.watch);
            Some(coordinator.start(&runtime, cache.clone(), shutdown.subscribe())?)
        } else {
            tracing::info!("File watching disabled");
            None
        };

        tracing::info!(
            factory = factory.name(),
            watching = watch_task.is_some(),
            "Configuration service started"
        );

        Ok(Self {
            config,
            cache,
            registry,
            shutdown,
            watch_task: Mutex::new(watch_task),
        })
    }

    /// The current instance of contract `C`, built on first use.
    pub fn get<C: Contract>(&self) -> Result<Capability<C>> {
        if self.shutdown.is_triggered() {
            return Err(Error::ShutDown);
        }
        let module = self.cache.get(TypeId::of::<C>(), C::declaration)?;
        Ok(Capability::new(module))
    }

    /// Drop the cached instance of `C` so the next `get` rebuilds it.
    pub fn invalidate<C: Contract>(&self) -> bool {
        self.cache.invalidate(TypeId::of::<C>())
    }

    /// Run a reload pass now, as the watch loop would.
    pub fn reload_all(&self) -> ReloadReport {
        self.cache.reload_all()
    }

    /// Warnings recorded when the current instance of `C` was built.
    pub fn warnings<C: Contract>(&self) -> Vec<ResolutionWarning> {
        self.cache
            .entry(TypeId::of::<C>())
            .map(|entry| entry.warnings.clone())
            .unwrap_or_default()
    }

    pub fn reload_passes(&self) -> u64 {
        self.cache.reload_passes()
    }

    pub fn cached_contracts(&self) -> usize {
        self.cache.len()
    }

    pub fn is_watching(&self) -> bool {
        self.watch_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Stop watching and clear all state. Calling it again does nothing.
    pub fn shutdown(&self) {
        if !self.shutdown.trigger() {
            return;
        }
        self.cache.clear();
        self.registry.clear();
        tracing::info!("Configuration service shut down");
    }

    /// Wait for the watch loop to exit after `shutdown`.
    pub async fn join_watcher(&self) {
        let task = self
            .watch_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Watch loop ended abnormally");
            }
        }
    }
}

impl Drop for ConfigService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn factory_for(config: &ServiceConfig) -> Arc<dyn InstanceFactory> {
    match config.module.factory {
        FactoryKind::Bytecode => Arc::new(BytecodeFactory::new(config.module.dump_dir.clone())),
        FactoryKind::Dispatch => Arc::new(DispatchTableFactory),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::contract! {
        struct Defaults: DefaultsAccess from "@CAPCONF_TEST_UNSET_VARIABLE@" {
            fn retries() -> i32 = ("retries", "3");
        }
    }

    fn unwatched() -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.watch.enabled = false;
        config
    }

    #[test]
    fn test_start_without_runtime_needs_watch_disabled() {
        assert!(matches!(
            ConfigService::start(ServiceConfig::default()),
            Err(Error::Watch(WatchError::NoRuntime))
        ));
        assert!(ConfigService::start(unwatched()).is_ok());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = unwatched();
        config.watch.idle_poll_ms = 0;
        assert!(matches!(
            ConfigService::start(config),
            Err(Error::Config(ConfigError::Validation(_)))
        ));
    }

    #[test]
    fn test_get_after_shutdown_fails() {
        let service = ConfigService::start(unwatched()).unwrap();
        let caps = service.get::<Defaults>().unwrap();
        assert_eq!(caps.retries(), 3);
        assert_eq!(service.cached_contracts(), 1);

        service.shutdown();
        service.shutdown();
        assert_eq!(service.cached_contracts(), 0);
        assert!(matches!(service.get::<Defaults>(), Err(Error::ShutDown)));
    }

    #[test]
    fn test_warnings_are_kept_per_contract() {
        let service = ConfigService::start(unwatched()).unwrap();
        assert!(service.warnings::<Defaults>().is_empty());
        service.get::<Defaults>().unwrap();
        assert!(matches!(
            service.warnings::<Defaults>().as_slice(),
            [ResolutionWarning::UnresolvedVariable { .. }]
        ));
    }

    #[test]
    fn test_metrics_switch_is_per_service() {
        use crate::observability::metrics::testing::CountingRecorder;

        let mut quiet_config = unwatched();
        quiet_config.observability.metrics_enabled = false;
        let quiet = ConfigService::start(quiet_config).unwrap();
        let loud = ConfigService::start(unwatched()).unwrap();

        let recorder = CountingRecorder::default();
        metrics::with_local_recorder(&recorder, || quiet.get::<Defaults>().unwrap());
        assert_eq!(recorder.registrations(), 0);

        metrics::with_local_recorder(&recorder, || loud.get::<Defaults>().unwrap());
        assert!(recorder.registrations() > 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_stops_watch_loop() {
        let service = ConfigService::start(ServiceConfig::default()).unwrap();
        assert!(service.is_watching());
        service.shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(5), service.join_watcher())
            .await
            .unwrap();
        assert!(!service.is_watching());
    }
}
