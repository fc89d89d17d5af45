//! Wellspring - context-aware configuration resolution for services.
//!
//! Resolves a validated, typed application configuration from process
//! environment values, local override files, build-time placeholders,
//! and a remote secret/parameter store, selecting the strategy that fits
//! the deployment context the process is running in.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── error             # Layered error types
//! └── core/             # Core library components
//!     ├── context       # Deployment context classifier
//!     ├── env           # Raw environment + provenance tracking
//!     ├── loader/       # Source loaders
//!     │   ├── build     # Build-time placeholders
//!     │   ├── local     # Process values + .env override files
//!     │   └── runtime   # Process values + remote secret cache
//!     ├── store/        # Remote store backends
//!     │   ├── mod       # SecretStore trait
//!     │   ├── memory    # In-memory implementation
//!     │   └── aws       # AWS SSM Parameter Store (feature "aws")
//!     ├── cache         # TTL cache over the remote store
//!     ├── schema        # Field registry + validator
//!     ├── mapper        # Validated config → application config
//!     └── resolver      # Resolution facade
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wellspring::{MemoryStore, ResolveOptions, Resolver};
//!
//! # async fn run() -> wellspring::Result<()> {
//! let resolver = Resolver::new(Arc::new(MemoryStore::new()));
//! let config = resolver.resolve(&ResolveOptions::default()).await?;
//! println!("listening on port {}", config.port);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - Per-context source loaders with per-key provenance
//! - TTL-cached remote secrets that degrade instead of failing
//! - All-or-nothing schema validation with secret-safe violations
//! - Single renaming site between external keys and application fields
//! - Structured per-stage observability events and reports

pub mod core;
pub mod error;

pub use crate::core::cache::{BatchFetch, CacheStats, SecretCache};
pub use crate::core::context::{classify, DeploymentContext};
pub use crate::core::env::{EnvSnapshot, RawEnvironment, Source, SourceCounts};
pub use crate::core::loader::RemotePolicy;
pub use crate::core::mapper::{AnnotatedConfig, AppConfig, ProvenanceReport};
pub use crate::core::resolver::{
    ResolutionReport, ResolutionStage, ResolveOptions, Resolver, ResolverBuilder, StageTiming,
};
pub use crate::core::schema::{FieldKind, FieldSpec, FieldValue, Schema, Stage, ValidatedConfig};
pub use crate::core::store::{MemoryStore, SecretStore};
pub use crate::error::{Error, Result};
