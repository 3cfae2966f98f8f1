use serde::Serialize;

use crate::band::{classify, Band};
use crate::correct::{corrected_price, Jitter};
use crate::deviation::{evaluate, Evaluation};
use crate::engine::Stage;
use crate::error::{PriceField, RepriceError};

// ---------------------------------------------------------------------------
// Passthrough cells
// ---------------------------------------------------------------------------

/// A spreadsheet cell carried through from the outlet table untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Empty,
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Number(n) => format_number(*n),
            Self::Text(s) => s.clone(),
        }
    }
}

/// Integral values render without a fractional part (`1234.0` -> `1234`).
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// ---------------------------------------------------------------------------
// Item record
// ---------------------------------------------------------------------------

/// Which price an evaluation pass looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    /// The outlet's current price.
    Before,
    /// The corrected price.
    After,
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Before => write!(f, "before correction"),
            Self::After => write!(f, "after correction"),
        }
    }
}

/// One outlet item moving through the repricing pipeline.
///
/// Derived fields are private: they can only be filled by the pipeline steps,
/// and changing the current price clears everything derived from it.
#[derive(Debug, Clone, Serialize)]
pub struct ItemRecord {
    pub item_id: String,
    current_price: f64,
    #[serde(skip)]
    price_text: Option<String>,
    target_price: Option<f64>,
    band: Option<Band>,
    before: Option<Evaluation>,
    corrected_price: Option<f64>,
    after: Option<Evaluation>,
    /// Remaining outlet columns, aligned with [`crate::Dataset::columns`].
    #[serde(skip)]
    pub fields: Vec<FieldValue>,
}

impl ItemRecord {
    pub fn new(item_id: impl Into<String>, current_price: f64, target_price: Option<f64>) -> Self {
        Self {
            item_id: item_id.into(),
            current_price,
            price_text: None,
            target_price,
            band: None,
            before: None,
            corrected_price: None,
            after: None,
            fields: Vec::new(),
        }
    }

    /// Keep the source text of a price cell that did not parse, for error messages.
    pub fn with_price_text(mut self, text: Option<String>) -> Self {
        self.price_text = text;
        self
    }

    pub fn with_fields(mut self, fields: Vec<FieldValue>) -> Self {
        self.fields = fields;
        self
    }

    pub fn current_price(&self) -> f64 {
        self.current_price
    }

    pub fn target_price(&self) -> Option<f64> {
        self.target_price
    }

    pub fn band(&self) -> Option<Band> {
        self.band
    }

    pub fn corrected_price(&self) -> Option<f64> {
        self.corrected_price
    }

    pub fn evaluation(&self, pass: Pass) -> Option<Evaluation> {
        match pass {
            Pass::Before => self.before,
            Pass::After => self.after,
        }
    }

    /// Furthest stage this item has reached, read from its derived fields.
    /// Report stages are dataset-wide and never show up here.
    pub fn stage(&self) -> Stage {
        if self.after.is_some() {
            Stage::EvaluatedAfter
        } else if self.corrected_price.is_some() {
            Stage::Corrected
        } else if self.before.is_some() {
            Stage::EvaluatedBefore
        } else if self.band.is_some() {
            Stage::Classified
        } else {
            Stage::Joined
        }
    }

    fn out_of_order(&self, expected: Stage) -> RepriceError {
        RepriceError::StageOrder {
            expected,
            found: self.stage(),
        }
    }

    /// Flagged in the before pass.
    pub fn needs_reprice(&self) -> bool {
        self.before.is_some_and(|e| e.flagged)
    }

    /// Replace the current price. Re-bands the item and drops every
    /// evaluation and correction derived from the old price.
    pub fn set_current_price(&mut self, price: f64) -> Result<Band, RepriceError> {
        self.current_price = price;
        self.price_text = None;
        self.band = None;
        self.before = None;
        self.corrected_price = None;
        self.after = None;
        self.classify()
    }

    pub fn classify(&mut self) -> Result<Band, RepriceError> {
        let band = classify(self.current_price).map_err(|e| match &self.price_text {
            Some(text) => RepriceError::InvalidPriceValue {
                item_id: self.item_id.clone(),
                field: PriceField::Current,
                value: text.clone(),
            },
            None => RepriceError::invalid_price(&self.item_id, PriceField::Current, e.0),
        })?;
        self.band = Some(band);
        Ok(band)
    }

    /// Evaluate the price selected by `pass` against the target.
    pub fn evaluate(&mut self, pass: Pass) -> Result<Evaluation, RepriceError> {
        let band = self.band.ok_or_else(|| self.out_of_order(Stage::Classified))?;
        let target = self.checked_target()?;
        let price = match pass {
            Pass::Before => self.current_price,
            Pass::After => self
                .corrected_price
                .ok_or_else(|| self.out_of_order(Stage::Corrected))?,
        };
        let eval = evaluate(price, target, band);
        match pass {
            Pass::Before => self.before = Some(eval),
            Pass::After => self.after = Some(eval),
        }
        Ok(eval)
    }

    /// Compute and store the corrected price. Requires the before pass.
    pub fn apply_correction(&mut self, jitter: &mut dyn Jitter) -> Result<f64, RepriceError> {
        let (band, before) = match (self.band, self.before) {
            (Some(band), Some(before)) => (band, before),
            _ => return Err(self.out_of_order(Stage::EvaluatedBefore)),
        };
        let target = self.checked_target()?;
        let price = corrected_price(self.current_price, target, band, before, jitter);
        if !price.is_finite() {
            return Err(RepriceError::invalid_price(&self.item_id, PriceField::Corrected, price));
        }
        self.corrected_price = Some(price);
        self.after = None;
        Ok(price)
    }

    fn checked_target(&self) -> Result<f64, RepriceError> {
        let target = self.target_price.ok_or_else(|| RepriceError::MissingTargetPrice {
            item_ids: vec![self.item_id.clone()],
        })?;
        if !target.is_finite() || target < 0.0 {
            return Err(RepriceError::invalid_price(&self.item_id, PriceField::Target, target));
        }
        Ok(target)
    }
}
