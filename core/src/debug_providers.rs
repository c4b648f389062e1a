//! Debug configuration provider registry.
//!
//! Providers are keyed by debugger type (e.g. `coreclr`). The host asks the
//! provider for initial `launch.json` entries and lets it complete a
//! configuration right before a debug session starts.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use csharp_host_types::DebugConfiguration;

use crate::Disposable;

/// Provider future type alias.
pub type ProviderFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("No debug configuration provider registered for '{debug_type}'")]
    NoProvider { debug_type: String },
    #[error("A provider is already registered for '{debug_type}'")]
    DuplicateProvider { debug_type: String },
    #[error("Workspace debug information unavailable: {message}")]
    WorkspaceInformation { message: String },
}

pub trait DebugConfigurationProvider: Send + Sync {
    /// Initial configurations for a folder without a `launch.json`.
    fn provide_debug_configurations<'a>(
        &'a self,
        folder: &'a Path,
    ) -> ProviderFut<'a, Vec<DebugConfiguration>>;

    /// Complete `config` before launch. `Ok(None)` aborts the launch.
    fn resolve_debug_configuration<'a>(
        &'a self,
        folder: &'a Path,
        config: DebugConfiguration,
    ) -> ProviderFut<'a, Option<DebugConfiguration>>;
}

type ProviderMap = HashMap<String, Arc<dyn DebugConfigurationProvider>>;

#[derive(Clone, Default)]
pub struct DebugConfigurationProviderRegistry {
    providers: Arc<Mutex<ProviderMap>>,
}

impl DebugConfigurationProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        debug_type: &str,
        provider: Arc<dyn DebugConfigurationProvider>,
    ) -> Result<Disposable, ProviderError> {
        {
            let mut providers = self.lock();
            if providers.contains_key(debug_type) {
                return Err(ProviderError::DuplicateProvider {
                    debug_type: debug_type.to_string(),
                });
            }
            providers.insert(debug_type.to_string(), provider);
        }
        tracing::debug!(debug_type, "Registered debug configuration provider");

        let providers = Arc::clone(&self.providers);
        let key = debug_type.to_string();
        Ok(Disposable::new(
            format!("debug-provider:{debug_type}"),
            move || {
                providers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&key);
            },
        ))
    }

    #[must_use]
    pub fn contains(&self, debug_type: &str) -> bool {
        self.lock().contains_key(debug_type)
    }

    pub async fn provide(
        &self,
        debug_type: &str,
        folder: &Path,
    ) -> Result<Vec<DebugConfiguration>, ProviderError> {
        let provider = self.provider(debug_type)?;
        provider.provide_debug_configurations(folder).await
    }

    pub async fn resolve(
        &self,
        debug_type: &str,
        folder: &Path,
        config: DebugConfiguration,
    ) -> Result<Option<DebugConfiguration>, ProviderError> {
        let provider = self.provider(debug_type)?;
        provider.resolve_debug_configuration(folder, config).await
    }

    fn provider(&self, debug_type: &str) -> Result<Arc<dyn DebugConfigurationProvider>, ProviderError> {
        self.lock()
            .get(debug_type)
            .cloned()
            .ok_or_else(|| ProviderError::NoProvider {
                debug_type: debug_type.to_string(),
            })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProviderMap> {
        self.providers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for DebugConfigurationProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<String> = self.lock().keys().cloned().collect();
        types.sort();
        f.debug_struct("DebugConfigurationProviderRegistry")
            .field("debug_types", &types)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl DebugConfigurationProvider for Fixed {
        fn provide_debug_configurations<'a>(
            &'a self,
            _folder: &'a Path,
        ) -> ProviderFut<'a, Vec<DebugConfiguration>> {
            Box::pin(async { Ok(vec![DebugConfiguration::new("fixed", "coreclr", "launch")]) })
        }

        fn resolve_debug_configuration<'a>(
            &'a self,
            _folder: &'a Path,
            config: DebugConfiguration,
        ) -> ProviderFut<'a, Option<DebugConfiguration>> {
            Box::pin(async move { Ok(Some(config.with("resolved", true))) })
        }
    }

    #[tokio::test]
    async fn provide_and_resolve_route_by_debug_type() {
        let registry = DebugConfigurationProviderRegistry::new();
        let _registration = registry.register("coreclr", Arc::new(Fixed)).unwrap();

        let configs = registry.provide("coreclr", Path::new("/ws")).await.unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].name, "fixed");

        let resolved = registry
            .resolve("coreclr", Path::new("/ws"), DebugConfiguration::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.get("resolved"), Some(&serde_json::json!(true)));
    }

    #[tokio::test]
    async fn missing_provider_is_error() {
        let registry = DebugConfigurationProviderRegistry::new();
        let err = registry.provide("node", Path::new("/ws")).await.unwrap_err();
        assert!(matches!(err, ProviderError::NoProvider { .. }));
    }

    #[test]
    fn duplicate_and_dispose() {
        let registry = DebugConfigurationProviderRegistry::new();
        let registration = registry.register("coreclr", Arc::new(Fixed)).unwrap();
        assert!(matches!(
            registry.register("coreclr", Arc::new(Fixed)),
            Err(ProviderError::DuplicateProvider { .. })
        ));
        registration.dispose();
        assert!(!registry.contains("coreclr"));
    }
}
