//! Enrichment stages, graph assembly, analytics and run orchestration.
//!
//! A run walks its periods through the crawler, then [`resolver`],
//! [`geocoding`] and [`onehop`], and hands the enriched events to the
//! [`assembler`]. [`pipeline`] drives it all; [`analytics`] keeps the counts.
//! [`dataset`] folds written periods into one merged dataset.

pub mod analytics;
pub mod assembler;
pub mod dataset;
pub mod geocoding;
pub mod onehop;
pub mod pipeline;
pub mod resolver;
pub mod services;

pub use analytics::{AnalyticsAggregator, AnalyticsRecord, Counters, analytics_path};
pub use assembler::{GraphAssembler, PeriodData};
pub use dataset::{DATASET_PREFIX, merge_dataset};
pub use geocoding::GeocodingEnricher;
pub use onehop::{Expansion, OneHopExpander};
pub use pipeline::{
    PeriodOutcome, PeriodStatus, ProgressReporter, RunConfig, RunController, RunSummary,
    SilentProgress, run,
};
pub use resolver::EntityResolver;
pub use services::Services;
