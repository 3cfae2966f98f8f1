//! `repricer-engine`: price band classification, deviation checks and
//! price correction for outlet item lists.
//!
//! Pure engine crate: receives joined records, returns evaluated and
//! corrected items plus per-band reconciliation reports.
//! No CLI or IO dependencies.

pub mod band;
pub mod correct;
pub mod dataset;
pub mod deviation;
pub mod engine;
pub mod error;
pub mod model;
pub mod report;

pub use band::{classify, Band};
pub use correct::{FixedJitter, Jitter, RandomJitter};
pub use dataset::{join, CatalogRow, Dataset, Identifiers, OutletRow, OutletTable};
pub use deviation::{evaluate, Evaluation};
pub use engine::{check, run, CheckResult, Pipeline, RepriceMeta, RepriceResult, RepriceSummary, Stage};
pub use error::{PriceField, RepriceError};
pub use model::{FieldValue, ItemRecord, Pass};
pub use report::{report, BandCounts, ReconciliationReport};
