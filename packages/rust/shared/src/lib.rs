//! Shared types, error model, and configuration for eventgraph.
//!
//! This crate is the foundation depended on by all other eventgraph crates.
//! It provides:
//! - [`EventGraphError`], the unified error type
//! - Domain types ([`Event`], [`Article`], [`EntityReference`], [`LocationReference`],
//!   [`Period`], [`GraphType`])
//! - Configuration ([`AppConfig`], [`ServiceConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, MAX_RETRIES_LIMIT, OutputConfig, PortalConfig, ServiceConfig, ServicesConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{EventGraphError, Result};
pub use types::{
    Article, Coordinate, DateSpan, DayRange, EntityMention, EntityReference, Event, GraphType,
    InfoboxRow, InfoboxValue, LocationMention, LocationReference, LookupFailure, OneHopFact,
    OsmElement, Period, RunId, SourceLink, Term, TextFragment, TimeSpan, Topic,
    WIKIDATA_ENTITY_NS, YearMonth, article_key, location_key, normalize_whitespace, sha256_hex,
    slugify,
};
