//! Rhai script executor

use crate::error::ScriptError;
use crate::executor::ScriptExecutor;
use async_trait::async_trait;
use hookscript_core::{EventEnvelope, Result, ScriptMap};
use rhai::{Dynamic, Engine, Scope, AST};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

/// Cache statistics for the executor
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of compiled scripts in cache
    pub cached_scripts: usize,
    /// Cache hits
    pub hits: u64,
    /// Cache misses
    pub misses: u64,
}

impl CacheStats {
    /// Get cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug)]
struct CompiledScript {
    content: String,
    ast: AST,
}

/// Executes `rhai` scripts with AST caching
///
/// Scripts see the envelope as `event` and their configuration as `config`.
/// The value of the last expression is the result; a script ending in a
/// statement (unit) has nothing to do.
#[derive(Debug)]
pub struct RhaiExecutor {
    engine: Engine,
    /// script name -> compiled source
    ast_cache: Arc<RwLock<HashMap<String, CompiledScript>>>,
    cache_hits: Arc<AtomicU64>,
    cache_misses: Arc<AtomicU64>,
}

impl RhaiExecutor {
    /// Create executor with default limits
    pub fn new() -> Self {
        Self::with_limits(100_000, 1024 * 1024)
    }

    /// Create executor with custom limits
    pub fn with_limits(max_operations: u64, max_string_size: usize) -> Self {
        let mut engine = Engine::new();

        engine.set_max_expr_depths(64, 32);
        engine.set_max_operations(max_operations);
        engine.set_max_string_size(max_string_size);
        engine.set_max_array_size(10_000);
        engine.set_max_map_size(10_000);

        Self::register_functions(&mut engine);

        Self {
            engine,
            ast_cache: Arc::new(RwLock::new(HashMap::new())),
            cache_hits: Arc::new(AtomicU64::new(0)),
            cache_misses: Arc::new(AtomicU64::new(0)),
        }
    }

    fn register_functions(engine: &mut Engine) {
        engine.register_fn("base64_encode", |s: &str| -> String {
            use base64::{engine::general_purpose, Engine as _};
            general_purpose::STANDARD.encode(s.as_bytes())
        });

        engine.register_fn("base64_decode", |s: &str| -> String {
            use base64::{engine::general_purpose, Engine as _};
            general_purpose::STANDARD
                .decode(s.as_bytes())
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .unwrap_or_default()
        });

        engine.register_fn("unix_time", || -> i64 {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or_default()
        });

        engine.register_fn("uuid", || -> String { uuid::Uuid::new_v4().to_string() });

        engine.register_fn("log_debug", |msg: &str| {
            debug!(script_log = msg);
        });

        engine.register_fn("log_info", |msg: &str| {
            tracing::info!(script_log = msg);
        });

        engine.register_fn("log_warn", |msg: &str| {
            warn!(script_log = msg);
        });
    }

    /// Get or compile the AST for `name`, recompiling when content changed
    async fn get_ast(&self, name: &str, content: &str) -> std::result::Result<AST, ScriptError> {
        {
            let cache = self.ast_cache.read().await;
            if let Some(compiled) = cache.get(name) {
                if compiled.content == content {
                    self.cache_hits.fetch_add(1, Ordering::Relaxed);
                    trace!(script = %name, "AST cache hit");
                    return Ok(compiled.ast.clone());
                }
            }
        }

        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        trace!(script = %name, "AST cache miss, compiling");

        let ast = self.engine.compile(content)?;

        {
            let mut cache = self.ast_cache.write().await;
            cache.insert(
                name.to_string(),
                CompiledScript {
                    content: content.to_string(),
                    ast: ast.clone(),
                },
            );
        }

        debug!(script = %name, "Script compiled and cached");
        Ok(ast)
    }

    fn run(
        &self,
        ast: &AST,
        config: &ScriptMap,
        data: &EventEnvelope,
    ) -> std::result::Result<Option<Value>, ScriptError> {
        let mut scope = Scope::new();

        let event = rhai::serde::to_dynamic(data)
            .map_err(|e| ScriptError::type_error(format!("event data: {e}")))?;
        let config = rhai::serde::to_dynamic(config)
            .map_err(|e| ScriptError::type_error(format!("script config: {e}")))?;
        scope.push_dynamic("event", event);
        scope.push_dynamic("config", config);

        let result: Dynamic = self.engine.eval_ast_with_scope(&mut scope, ast)?;

        if result.is_unit() {
            return Ok(None);
        }

        let value = rhai::serde::from_dynamic::<Value>(&result)
            .map_err(|e| ScriptError::type_error(format!("script result: {e}")))?;
        Ok(Some(value))
    }

    /// Drop all compiled scripts
    pub async fn clear_cache(&self) {
        let mut cache = self.ast_cache.write().await;
        cache.clear();
        debug!("Rhai AST cache cleared");
    }

    /// Get cache statistics
    pub async fn cache_stats(&self) -> CacheStats {
        let cache = self.ast_cache.read().await;
        CacheStats {
            cached_scripts: cache.len(),
            hits: self.cache_hits.load(Ordering::Relaxed),
            misses: self.cache_misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for RhaiExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScriptExecutor for RhaiExecutor {
    async fn execute(
        &self,
        name: &str,
        content: &str,
        _script_type: &str,
        config: &ScriptMap,
        data: &EventEnvelope,
    ) -> Result<Option<Value>> {
        let start = std::time::Instant::now();

        let ast = self
            .get_ast(name, content)
            .await
            .map_err(|e| e.into_fault(name))?;
        let result = self.run(&ast, config, data).map_err(|e| e.into_fault(name))?;

        trace!(
            script = %name,
            elapsed_us = start.elapsed().as_micros(),
            produced_result = result.is_some(),
            "Rhai script executed"
        );

        Ok(result)
    }
}
