//! Resolution facade orchestrating the configuration pipeline.
//!
//! The single entry point: classify → load → validate → map. The facade
//! owns the end-to-end pipeline and is the only component that
//! constructs an [`AppConfig`]. It also owns the process-wide resolved
//! configuration: resolution normally happens once per process at cold
//! start, and repeat calls serve the cached result until it is
//! explicitly invalidated.
//!
//! Consumers are expected to treat a resolution failure at process start
//! as fatal and stop; failures from a later, explicit re-resolution come
//! back as an ordinary `Result` and do not crash anything.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::cache::{CacheStats, SecretCache};
use crate::core::constants::DEFAULT_TTL_SECS;
use crate::core::context::{classify, DeploymentContext};
use crate::core::env::{EnvSnapshot, RawEnvironment, SourceCounts};
use crate::core::loader::{build, local, runtime, RemotePolicy};
use crate::core::mapper::{self, AppConfig};
use crate::core::schema::{self, Schema};
use crate::core::store::SecretStore;
use crate::error::{Error, Result, UsageError};

/// One stage of the resolution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStage {
    Classify,
    Load,
    Validate,
    Map,
}

impl ResolutionStage {
    /// Stable identifier used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStage::Classify => "classify",
            ResolutionStage::Load => "load",
            ResolutionStage::Validate => "validate",
            ResolutionStage::Map => "map",
        }
    }
}

impl fmt::Display for ResolutionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Duration of one completed pipeline stage.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StageTiming {
    pub stage: ResolutionStage,
    pub duration_ms: u64,
}

/// Observability summary of one resolution run.
///
/// The engine emits the same data as structured log events; the report
/// is for consumers that export metrics themselves.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionReport {
    /// Context the classifier (or the caller's override) selected.
    pub context: DeploymentContext,
    /// Per-stage durations, in pipeline order.
    pub stages: Vec<StageTiming>,
    /// Resolved keys by provenance.
    pub counts: SourceCounts,
    /// Secret cache state after the run.
    pub cache: CacheStats,
    /// When the run finished.
    pub resolved_at: DateTime<Utc>,
}

impl ResolutionReport {
    /// Render the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Caller-controlled knobs for one resolution call.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Skip classification and use this context.
    pub force_context: Option<DeploymentContext>,
    /// Disable schema validation; violations are logged and substituted
    /// instead of failing. Enabled by default.
    pub skip_validation: bool,
    /// Emit info-level events per pipeline stage.
    pub log_stages: bool,
}

impl ResolveOptions {
    /// Force a specific deployment context.
    pub fn force_context(mut self, context: DeploymentContext) -> Self {
        self.force_context = Some(context);
        self
    }

    /// Disable schema validation.
    pub fn skip_validation(mut self) -> Self {
        self.skip_validation = true;
        self
    }

    /// Enable per-stage observability logging.
    pub fn log_stages(mut self) -> Self {
        self.log_stages = true;
        self
    }
}

/// Builder for [`Resolver`].
pub struct ResolverBuilder {
    store: Arc<dyn SecretStore>,
    ttl: Duration,
    policy: RemotePolicy,
    schema: Schema,
    local_dir: PathBuf,
}

impl ResolverBuilder {
    fn new(store: Arc<dyn SecretStore>) -> Self {
        Self {
            store,
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            policy: RemotePolicy::default(),
            schema: Schema::application(),
            local_dir: PathBuf::from("."),
        }
    }

    /// Time-to-live for cached remote secrets.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Whether remote-store outages are fatal in managed runtimes.
    pub fn remote_policy(mut self, policy: RemotePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the field registry.
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Directory the local loader reads override files from.
    pub fn local_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_dir = dir.into();
        self
    }

    /// Build the resolver.
    pub fn build(self) -> Resolver {
        Resolver {
            cache: SecretCache::with_ttl(self.store, self.ttl),
            schema: self.schema,
            policy: self.policy,
            local_dir: self.local_dir,
            resolved: Mutex::new(None),
        }
    }
}

/// The resolution facade.
///
/// Construct one at process start and share it by reference or `Arc`;
/// it replaces any module-level "loaded once" configuration state.
pub struct Resolver {
    cache: SecretCache,
    schema: Schema,
    policy: RemotePolicy,
    local_dir: PathBuf,
    resolved: Mutex<Option<Arc<AppConfig>>>,
}

impl Resolver {
    /// Create a resolver with default TTL, policy, and schema.
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self::builder(store).build()
    }

    /// Start building a customized resolver.
    pub fn builder(store: Arc<dyn SecretStore>) -> ResolverBuilder {
        ResolverBuilder::new(store)
    }

    /// Resolve the configuration from the current process environment.
    ///
    /// Serves the previously-resolved configuration when one exists;
    /// otherwise runs the full pipeline and caches the result
    /// process-wide.
    ///
    /// # Errors
    ///
    /// Any stage failure short-circuits the pipeline; the returned
    /// error names its stage via [`Error::stage`].
    pub async fn resolve(&self, options: &ResolveOptions) -> Result<Arc<AppConfig>> {
        let snapshot = EnvSnapshot::from_process();
        self.resolve_from(&snapshot, options).await
    }

    /// Resolve from an explicit snapshot.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Resolver::resolve`].
    pub async fn resolve_from(
        &self,
        snapshot: &EnvSnapshot,
        options: &ResolveOptions,
    ) -> Result<Arc<AppConfig>> {
        if let Some(config) = self.cached() {
            debug!("serving previously resolved configuration");
            return Ok(config);
        }

        let (config, _) = self.pipeline(snapshot, options).await?;
        let config = Arc::new(config);
        self.store_resolved(config.clone());
        Ok(config)
    }

    /// Resolve and return the observability report.
    ///
    /// Always runs the pipeline, replacing any previously-resolved
    /// configuration, since a report of a cache hit would be empty.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Resolver::resolve`].
    pub async fn resolve_with_report(
        &self,
        options: &ResolveOptions,
    ) -> Result<(Arc<AppConfig>, ResolutionReport)> {
        let snapshot = EnvSnapshot::from_process();
        self.resolve_with_report_from(&snapshot, options).await
    }

    /// Resolve with report from an explicit snapshot.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Resolver::resolve`].
    pub async fn resolve_with_report_from(
        &self,
        snapshot: &EnvSnapshot,
        options: &ResolveOptions,
    ) -> Result<(Arc<AppConfig>, ResolutionReport)> {
        let (config, report) = self.pipeline(snapshot, options).await?;
        let config = Arc::new(config);
        self.store_resolved(config.clone());
        Ok((config, report))
    }

    /// Synchronous resolution for contexts whose loader does no network
    /// I/O.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::SyncInManagedRuntime`] when classification
    /// selects the managed runtime; that context's loader must be
    /// awaited through [`Resolver::resolve`].
    pub fn resolve_sync(&self, options: &ResolveOptions) -> Result<Arc<AppConfig>> {
        let snapshot = EnvSnapshot::from_process();
        self.resolve_sync_from(&snapshot, options)
    }

    /// Synchronous resolution from an explicit snapshot.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Resolver::resolve_sync`].
    pub fn resolve_sync_from(
        &self,
        snapshot: &EnvSnapshot,
        options: &ResolveOptions,
    ) -> Result<Arc<AppConfig>> {
        if let Some(config) = self.cached() {
            debug!("serving previously resolved configuration");
            return Ok(config);
        }

        let (config, _) = self.pipeline_sync(snapshot, options)?;
        let config = Arc::new(config);
        self.store_resolved(config.clone());
        Ok(config)
    }

    /// Drop the process-wide resolved configuration so the next call
    /// re-runs the pipeline. Intended for tests and controlled reloads.
    pub fn reset(&self) {
        *self.resolved_lock() = None;
        debug!("resolved configuration dropped");
    }

    /// Invalidate one cached secret, or all of them, and drop the
    /// resolved configuration so the next resolution refetches.
    pub fn invalidate_cache(&self, key: Option<&str>) {
        self.cache.invalidate(key);
        self.reset();
    }

    /// Secret cache entry counts.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// The configured remote policy.
    pub fn remote_policy(&self) -> RemotePolicy {
        self.policy
    }

    async fn pipeline(
        &self,
        snapshot: &EnvSnapshot,
        options: &ResolveOptions,
    ) -> Result<(AppConfig, ResolutionReport)> {
        let mut clock = StageClock::new(options.log_stages);

        let context = clock.run(ResolutionStage::Classify, || {
            Ok(options.force_context.unwrap_or_else(|| classify(snapshot)))
        })?;
        debug!(context = %context, "deployment context selected");

        let started = std::time::Instant::now();
        let loaded = match context {
            DeploymentContext::BuildTime => build::load(snapshot, &self.schema).map_err(Error::from),
            DeploymentContext::Local => {
                local::load(snapshot, &self.local_dir).map_err(Error::from)
            }
            DeploymentContext::ManagedRuntime => {
                runtime::load(snapshot, &self.schema, &self.cache, self.policy)
                    .await
                    .map_err(Error::from)
            }
        };
        let env = clock.observe(ResolutionStage::Load, started, loaded)?;

        self.finish(context, env, options, clock)
    }

    fn pipeline_sync(
        &self,
        snapshot: &EnvSnapshot,
        options: &ResolveOptions,
    ) -> Result<(AppConfig, ResolutionReport)> {
        let mut clock = StageClock::new(options.log_stages);

        let context = clock.run(ResolutionStage::Classify, || {
            let context = options.force_context.unwrap_or_else(|| classify(snapshot));
            if context.needs_network() {
                return Err(UsageError::SyncInManagedRuntime.into());
            }
            Ok(context)
        })?;

        let started = std::time::Instant::now();
        let loaded = match context {
            DeploymentContext::BuildTime => build::load(snapshot, &self.schema).map_err(Error::from),
            DeploymentContext::Local => {
                local::load(snapshot, &self.local_dir).map_err(Error::from)
            }
            DeploymentContext::ManagedRuntime => Err(UsageError::SyncInManagedRuntime.into()),
        };
        let env = clock.observe(ResolutionStage::Load, started, loaded)?;

        self.finish(context, env, options, clock)
    }

    fn finish(
        &self,
        context: DeploymentContext,
        env: RawEnvironment,
        options: &ResolveOptions,
        mut clock: StageClock,
    ) -> Result<(AppConfig, ResolutionReport)> {
        let validated = clock.run(ResolutionStage::Validate, || {
            if options.skip_validation {
                Ok(schema::coerce(&env, &self.schema))
            } else {
                schema::validate(&env, &self.schema).map_err(Error::from)
            }
        })?;

        let config = clock.run(ResolutionStage::Map, || {
            mapper::map(&validated).map_err(Error::from)
        })?;

        let counts = env.source_counts();
        let report = ResolutionReport {
            context,
            stages: clock.timings,
            counts,
            cache: self.cache.stats(),
            resolved_at: Utc::now(),
        };

        if options.log_stages {
            info!(
                context = %context,
                environment = counts.environment,
                local_file = counts.local_file,
                remote_store = counts.remote_store,
                fallback_default = counts.fallback_default,
                "configuration resolved"
            );
        }

        Ok((config, report))
    }

    fn cached(&self) -> Option<Arc<AppConfig>> {
        self.resolved_lock().clone()
    }

    fn store_resolved(&self, config: Arc<AppConfig>) {
        *self.resolved_lock() = Some(config);
    }

    fn resolved_lock(&self) -> MutexGuard<'_, Option<Arc<AppConfig>>> {
        self.resolved.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Times pipeline stages and emits their observability events.
struct StageClock {
    timings: Vec<StageTiming>,
    log: bool,
}

impl StageClock {
    fn new(log: bool) -> Self {
        Self {
            timings: Vec::new(),
            log,
        }
    }

    fn run<T>(
        &mut self,
        stage: ResolutionStage,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let started = std::time::Instant::now();
        self.observe(stage, started, f())
    }

    fn observe<T>(
        &mut self,
        stage: ResolutionStage,
        started: std::time::Instant,
        result: Result<T>,
    ) -> Result<T> {
        let duration_ms = started.elapsed().as_millis() as u64;
        self.timings.push(StageTiming { stage, duration_ms });

        match &result {
            Ok(_) => {
                if self.log {
                    info!(stage = %stage, duration_ms, "stage complete");
                } else {
                    debug!(stage = %stage, duration_ms, "stage complete");
                }
            }
            Err(err) => warn!(stage = %stage, duration_ms, error = %err, "stage failed"),
        }

        result
    }
}
