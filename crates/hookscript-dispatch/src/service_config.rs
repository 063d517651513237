//! Per-service script configuration: storage layers and the resolver that
//! merges them behind the scripting kill-switch

use async_trait::async_trait;
use hookscript_config::DisablePolicy;
use hookscript_core::schema::{cache_config_schema, script_config_schema};
use hookscript_core::{
    value, CacheConfig, ConfigSchemaField, Error, Result, ScriptMap, ServiceScriptConfig,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Persists the base script configuration of each service
#[async_trait]
pub trait ServiceConfigStore: Send + Sync {
    /// Load the configuration of a service
    async fn get(&self, service_id: i64) -> Result<Option<ServiceScriptConfig>>;

    /// Insert or replace the configuration of a service
    async fn put(&self, config: ServiceScriptConfig) -> Result<()>;

    /// Remove the configuration of a service, returning whether one existed
    async fn delete(&self, service_id: i64) -> Result<bool>;
}

/// Persists the cache-configuration layer of each service
#[async_trait]
pub trait CacheConfigStore: Send + Sync {
    /// Load the cache configuration of a service
    async fn get(&self, service_id: i64) -> Result<Option<CacheConfig>>;

    /// Insert or replace the cache configuration of a service
    async fn put(&self, config: CacheConfig) -> Result<()>;

    /// Remove the cache configuration of a service, returning whether one existed
    async fn delete(&self, service_id: i64) -> Result<bool>;
}

/// In-process configuration store keyed by service id
#[derive(Debug)]
pub struct InMemoryConfigStore<T> {
    rows: RwLock<HashMap<i64, T>>,
}

impl<T> Default for InMemoryConfigStore<T> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Clone + Send + Sync> InMemoryConfigStore<T> {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    async fn load(&self, service_id: i64) -> Option<T> {
        self.rows.read().await.get(&service_id).cloned()
    }

    async fn store(&self, service_id: i64, row: T) {
        self.rows.write().await.insert(service_id, row);
    }

    async fn remove(&self, service_id: i64) -> bool {
        self.rows.write().await.remove(&service_id).is_some()
    }
}

#[async_trait]
impl ServiceConfigStore for InMemoryConfigStore<ServiceScriptConfig> {
    async fn get(&self, service_id: i64) -> Result<Option<ServiceScriptConfig>> {
        Ok(self.load(service_id).await)
    }

    async fn put(&self, config: ServiceScriptConfig) -> Result<()> {
        self.store(config.service_id, config).await;
        Ok(())
    }

    async fn delete(&self, service_id: i64) -> Result<bool> {
        Ok(self.remove(service_id).await)
    }
}

#[async_trait]
impl CacheConfigStore for InMemoryConfigStore<CacheConfig> {
    async fn get(&self, service_id: i64) -> Result<Option<CacheConfig>> {
        Ok(self.load(service_id).await)
    }

    async fn put(&self, config: CacheConfig) -> Result<()> {
        self.store(config.service_id, config).await;
        Ok(())
    }

    async fn delete(&self, service_id: i64) -> Result<bool> {
        Ok(self.remove(service_id).await)
    }
}

/// Reads and writes the merged configuration of scripted services of one type
///
/// Reads return the base layer with the cache layer merged over it. Reads
/// and writes first consult the [`DisablePolicy`]; deletes do not.
#[derive(Clone)]
pub struct ConfigResolver {
    script_type: String,
    policy: DisablePolicy,
    base: Arc<dyn ServiceConfigStore>,
    cache: Arc<dyn CacheConfigStore>,
}

impl std::fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigResolver")
            .field("script_type", &self.script_type)
            .field("policy", &self.policy)
            .finish()
    }
}

impl ConfigResolver {
    /// Create a resolver over the given stores
    pub fn new(
        script_type: impl Into<String>,
        policy: DisablePolicy,
        base: Arc<dyn ServiceConfigStore>,
        cache: Arc<dyn CacheConfigStore>,
    ) -> Self {
        Self {
            script_type: script_type.into(),
            policy,
            base,
            cache,
        }
    }

    /// Create a resolver over fresh in-memory stores
    pub fn in_memory(script_type: impl Into<String>, policy: DisablePolicy) -> Self {
        Self::new(
            script_type,
            policy,
            Arc::new(InMemoryConfigStore::<ServiceScriptConfig>::new()),
            Arc::new(InMemoryConfigStore::<CacheConfig>::new()),
        )
    }

    /// Script type this resolver serves
    pub fn script_type(&self) -> &str {
        &self.script_type
    }

    /// Active kill-switch policy
    pub fn policy(&self) -> &DisablePolicy {
        &self.policy
    }

    /// Merged configuration of a service
    ///
    /// A service with no stored base row reads as the default configuration.
    /// Cache-layer values win on collision. The two layers share no field
    /// other than `service_id`, so that is the only key the cache row can
    /// override.
    pub async fn get_config(&self, service_id: i64) -> Result<ScriptMap> {
        self.policy.check(&self.script_type)?;

        let base = self
            .base
            .get(service_id)
            .await?
            .unwrap_or_else(|| ServiceScriptConfig {
                service_id,
                ..Default::default()
            });
        let mut config = base.to_map()?;

        if let Some(cache) = self.cache.get(service_id).await? {
            value::merge_shallow(&mut config, &cache.to_map()?);
        }

        Ok(config)
    }

    /// Store configuration for a service
    ///
    /// Keys update the existing rows; keys belonging to neither layer are
    /// rejected before anything is written. The cache layer is written first.
    pub async fn set_config(&self, service_id: i64, config: ScriptMap) -> Result<()> {
        self.policy.check(&self.script_type)?;

        let mut base_fields = ScriptMap::new();
        let mut cache_fields = ScriptMap::new();
        for (key, field) in config {
            if key == "service_id" {
                continue;
            }
            if CacheConfig::FIELDS.contains(&key.as_str()) {
                cache_fields.insert(key, field);
            } else if ServiceScriptConfig::FIELDS.contains(&key.as_str()) {
                base_fields.insert(key, field);
            } else {
                return Err(Error::Validation(format!(
                    "unknown configuration key '{key}' for service {service_id}"
                )));
            }
        }

        let previous_cache = self.cache.get(service_id).await?;
        let mut cache_map = match &previous_cache {
            Some(existing) => existing.to_map()?,
            None => ScriptMap::new(),
        };
        value::merge_shallow(&mut cache_map, &cache_fields);
        let cache = CacheConfig::from_map(service_id, cache_map)?;

        let mut base_map = match self.base.get(service_id).await? {
            Some(existing) => existing.to_map()?,
            None => ScriptMap::new(),
        };
        value::merge_shallow(&mut base_map, &base_fields);
        let base = ServiceScriptConfig::from_map(service_id, base_map)?;

        self.cache.put(cache).await?;

        if let Err(e) = self.base.put(base).await {
            self.restore_cache(service_id, previous_cache).await;
            return Err(e);
        }

        info!(
            service_id,
            script_type = %self.script_type,
            "Service script configuration stored"
        );
        Ok(())
    }

    async fn restore_cache(&self, service_id: i64, previous: Option<CacheConfig>) {
        let restored = match previous {
            Some(previous) => self.cache.put(previous).await,
            None => self.cache.delete(service_id).await.map(|_| ()),
        };
        if let Err(e) = restored {
            warn!(service_id, error = %e, "Failed to restore cache configuration");
        }
    }

    /// Remove both configuration layers of a service
    pub async fn delete_config(&self, service_id: i64) -> Result<()> {
        let cache_removed = self.cache.delete(service_id).await?;
        let base_removed = self.base.delete(service_id).await?;

        debug!(service_id, cache_removed, base_removed, "Service script configuration deleted");
        Ok(())
    }

    /// Administrative schema: script fields followed by cache fields
    pub fn get_config_schema(&self) -> Vec<ConfigSchemaField> {
        let mut schema = script_config_schema();
        schema.extend(cache_config_schema());
        schema
    }
}
