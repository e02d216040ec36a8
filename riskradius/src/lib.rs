//! # riskradius
//!
//! Rayons de risque SARA autour d'une facility de matières dangereuses :
//! buffers cumulatifs, estimation de population par répartition surfacique
//! sur les blocs de recensement, et facilities vulnérables par rayon.
//!
//! ## Exemple
//!
//! ```rust,ignore
//! use riskradius::{execute, CancelToken, RunOptions, RunParameters};
//!
//! let outcome = execute(&params, &options, &provider, &CancelToken::new())?;
//! for summary in &outcome.summaries {
//!     println!("{}: {}", summary.distance, summary.total("POP10"));
//! }
//! ```

pub mod aggregate;
pub mod apportion;
pub mod error;
pub mod export;
pub mod facilities;
pub mod floodplain;
pub mod messages;
pub mod pool;
pub mod projection;
pub mod provider;
pub mod rings;
pub mod run;
pub mod types;

pub use aggregate::{aggregate_rings, AggregateContext};
pub use apportion::{area_ratio, Apportionment, ApportionmentEngine, AREA_TOLERANCE};
pub use error::{RiskRadiusError, RunStage};
pub use export::ReportFormatter;
pub use facilities::{
    empty_match_message, render_output_name, report_intersections, CategoryDescriptor,
    DEFAULT_OUTPUT_TEMPLATE,
};
pub use floodplain::{assess, FloodplainOutcome, FloodplainSources};
pub use messages::{MessageLevel, MessageLog, RunMessage};
pub use pool::{CancelToken, WorkerPool};
pub use projection::{LiteProjector, Projector, US_SURVEY_FOOT, WGS84};
pub use provider::{
    ClipRecord, FeatureSource, GeometryProvider, PlanarProvider, SourceFeature, ZoneSource,
};
pub use rings::{BuildStage, BuiltRings, RingBuilder};
pub use run::{execute, RunOptions, RunOutcome, RunParameters};
pub use types::*;

