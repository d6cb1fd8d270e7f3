pub mod auth;
pub mod cache;
pub mod candidates;
pub mod classifier;
pub mod config;
pub mod external_catalog;
pub mod harvester;
pub mod lifecycle;
pub mod metrics;
pub mod page;
pub mod storage;
pub mod testing;

pub use auth::{
    create_authenticator, AccessLevel, AuthError, AuthRequest, Authenticator, Identity,
    NoneAuthenticator,
};
pub use cache::{CacheConfig, CacheEntry, TwoTierCache};
pub use candidates::{CandidateError, CandidateSource, FileCandidateSource, StaticCandidateSource};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthMethod, Config, ConfigError,
    SanitizedConfig,
};
pub use external_catalog::{
    CatalogItem, ExternalCatalogError, Genre, MediaKind, SeriesCatalog, TmdbClient, TmdbConfig,
};
pub use harvester::{BatchProgress, HarvestResult, Harvester};
pub use lifecycle::{
    ControllerStatus, DoramaController, LifecycleError, LifecycleState, RunOutcome, RunSummary,
};
pub use page::{page_slice, Page};
pub use storage::{KeyValueStore, SqliteKeyValueStore, StorageError};
