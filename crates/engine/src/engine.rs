use std::fmt;

use serde::Serialize;

use crate::correct::Jitter;
use crate::dataset::Dataset;
use crate::error::RepriceError;
use crate::model::Pass;
use crate::report::{report, ReconciliationReport};

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Lifecycle of one folder's dataset. Each step moves exactly one stage on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Joined,
    Classified,
    EvaluatedBefore,
    ReportedBefore,
    Corrected,
    EvaluatedAfter,
    ReportedAfter,
    Exported,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Joined => write!(f, "joined"),
            Self::Classified => write!(f, "classified"),
            Self::EvaluatedBefore => write!(f, "evaluated(before)"),
            Self::ReportedBefore => write!(f, "reported(before)"),
            Self::Corrected => write!(f, "corrected"),
            Self::EvaluatedAfter => write!(f, "evaluated(after)"),
            Self::ReportedAfter => write!(f, "reported(after)"),
            Self::Exported => write!(f, "exported"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Step-by-step driver over a joined dataset.
#[derive(Debug)]
pub struct Pipeline {
    dataset: Dataset,
    stage: Stage,
}

impl Pipeline {
    /// Accepts the dataset only when every item has a target price.
    pub fn new(dataset: Dataset) -> Result<Self, RepriceError> {
        dataset.ensure_targets()?;
        Ok(Self {
            dataset,
            stage: Stage::Joined,
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    fn advance(&mut self, expected: Stage, next: Stage) -> Result<(), RepriceError> {
        if self.stage != expected {
            return Err(RepriceError::StageOrder {
                expected,
                found: self.stage,
            });
        }
        self.stage = next;
        Ok(())
    }

    fn require(&self, expected: Stage) -> Result<(), RepriceError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(RepriceError::StageOrder {
                expected,
                found: self.stage,
            })
        }
    }

    pub fn classify(&mut self) -> Result<(), RepriceError> {
        self.require(Stage::Joined)?;
        for item in &mut self.dataset.items {
            item.classify()?;
        }
        self.advance(Stage::Joined, Stage::Classified)
    }

    pub fn evaluate_before(&mut self) -> Result<(), RepriceError> {
        self.evaluate(Pass::Before, Stage::Classified, Stage::EvaluatedBefore)
    }

    pub fn report_before(&mut self) -> Result<ReconciliationReport, RepriceError> {
        self.report(Pass::Before, Stage::EvaluatedBefore, Stage::ReportedBefore)
    }

    pub fn correct(&mut self, jitter: &mut dyn Jitter) -> Result<(), RepriceError> {
        self.require(Stage::ReportedBefore)?;
        for item in &mut self.dataset.items {
            item.apply_correction(jitter)?;
        }
        self.advance(Stage::ReportedBefore, Stage::Corrected)
    }

    pub fn evaluate_after(&mut self) -> Result<(), RepriceError> {
        self.evaluate(Pass::After, Stage::Corrected, Stage::EvaluatedAfter)
    }

    pub fn report_after(&mut self) -> Result<ReconciliationReport, RepriceError> {
        self.report(Pass::After, Stage::EvaluatedAfter, Stage::ReportedAfter)
    }

    fn evaluate(&mut self, pass: Pass, from: Stage, to: Stage) -> Result<(), RepriceError> {
        self.require(from)?;
        for item in &mut self.dataset.items {
            item.evaluate(pass)?;
        }
        self.advance(from, to)
    }

    fn report(&mut self, pass: Pass, from: Stage, to: Stage) -> Result<ReconciliationReport, RepriceError> {
        self.require(from)?;
        let tally = report(&self.dataset.items, pass)?;
        self.advance(from, to)?;
        Ok(tally)
    }

    pub fn into_dataset(self) -> Dataset {
        self.dataset
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RepriceMeta {
    pub engine_version: String,
    pub run_at: String,
}

impl RepriceMeta {
    fn now() -> Self {
        Self {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RepriceSummary {
    pub items: usize,
    /// Items out of tolerance before correction.
    pub repriced: usize,
    /// Items still out of tolerance after correction (jitter residue).
    pub residual: usize,
}

/// Output of [`check`]: the before pass only.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub meta: RepriceMeta,
    pub before: ReconciliationReport,
    #[serde(skip)]
    pub dataset: Dataset,
}

/// Output of a full [`run`].
#[derive(Debug, Clone, Serialize)]
pub struct RepriceResult {
    pub meta: RepriceMeta,
    pub stage: Stage,
    pub summary: RepriceSummary,
    pub before: ReconciliationReport,
    pub after: ReconciliationReport,
    #[serde(skip)]
    pub dataset: Dataset,
}

impl RepriceResult {
    /// Record that the caller has written the folder's outputs.
    pub fn mark_exported(&mut self) {
        self.stage = Stage::Exported;
    }
}

/// Run the before pass only: precondition, classify, evaluate, report.
pub fn check(dataset: Dataset) -> Result<CheckResult, RepriceError> {
    let mut pipeline = Pipeline::new(dataset)?;
    pipeline.classify()?;
    pipeline.evaluate_before()?;
    let before = pipeline.report_before()?;
    Ok(CheckResult {
        meta: RepriceMeta::now(),
        before,
        dataset: pipeline.into_dataset(),
    })
}

/// Run the whole repricing pipeline up to `ReportedAfter`.
pub fn run(dataset: Dataset, jitter: &mut dyn Jitter) -> Result<RepriceResult, RepriceError> {
    let mut pipeline = Pipeline::new(dataset)?;
    pipeline.classify()?;
    pipeline.evaluate_before()?;
    let before = pipeline.report_before()?;
    pipeline.correct(jitter)?;
    pipeline.evaluate_after()?;
    let after = pipeline.report_after()?;
    let stage = pipeline.stage();
    let dataset = pipeline.into_dataset();

    let summary = RepriceSummary {
        items: dataset.len(),
        repriced: before.total_above(),
        residual: after.total_above(),
    };

    Ok(RepriceResult {
        meta: RepriceMeta::now(),
        stage,
        summary,
        before,
        after,
        dataset,
    })
}
