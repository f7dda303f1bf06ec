use std::collections::HashMap;

use crate::{
    config::ModelConfig,
    error::{GenerationError, Result},
    generation::{HttpService, InferenceService, PlaceholderService},
};

type ServiceFactory = Box<dyn Fn(&ModelConfig) -> Result<Box<dyn InferenceService>> + Send + Sync>;

/// Registry for managing available inference services
///
/// Services are registered by name and instantiated on demand from the
/// model configuration.
pub struct ServiceRegistry {
    services: HashMap<String, ServiceFactory>,
}

impl ServiceRegistry {
    /// Create a new registry with the built-in services
    pub fn new() -> Self {
        let mut registry = Self {
            services: HashMap::new(),
        };
        registry.register_builtin_services();
        registry
    }

    fn register_builtin_services(&mut self) {
        self.register("placeholder".to_string(), |_| {
            Ok(Box::new(PlaceholderService::new()))
        });

        self.register("http".to_string(), |config| {
            Ok(Box::new(HttpService::new(config)?))
        });
    }

    /// Register a custom service factory
    pub fn register<F>(&mut self, name: String, factory: F)
    where
        F: Fn(&ModelConfig) -> Result<Box<dyn InferenceService>> + Send + Sync + 'static,
    {
        self.services.insert(name, Box::new(factory));
    }

    /// Instantiate the service called `name`
    pub fn create(&self, name: &str, config: &ModelConfig) -> Result<Box<dyn InferenceService>> {
        let factory = self
            .services
            .get(name)
            .ok_or_else(|| GenerationError::ServiceNotFound {
                name: name.to_string(),
            })?;
        factory(config)
    }

    /// Get all available service names, sorted
    pub fn available_services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_service(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReelError;

    #[test]
    fn test_builtin_services_available() {
        let registry = ServiceRegistry::new();

        assert!(registry.has_service("placeholder"));
        assert!(registry.has_service("http"));
        assert_eq!(registry.available_services(), vec!["http", "placeholder"]);
    }

    #[test]
    fn test_create_service() {
        let registry = ServiceRegistry::new();
        let config = ModelConfig::default();

        let service = registry.create("placeholder", &config).unwrap();
        assert_eq!(service.name(), "placeholder");

        let unknown = registry.create("dall-e", &config);
        assert!(matches!(
            unknown,
            Err(ReelError::Generation(GenerationError::ServiceNotFound { ref name })) if name == "dall-e"
        ));
    }

    #[test]
    fn test_custom_service_registration() {
        let mut registry = ServiceRegistry::new();
        registry.register("noisy".to_string(), |_| {
            Ok(Box::new(PlaceholderService::with_noise(1.0)))
        });

        assert!(registry.has_service("noisy"));
        assert_eq!(registry.len(), 3);
    }
}
