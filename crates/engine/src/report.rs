use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::band::Band;
use crate::engine::Stage;
use crate::error::RepriceError;
use crate::model::{ItemRecord, Pass};

/// In/out of tolerance counts for one band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BandCounts {
    /// `|deviation| < tolerance`
    pub below: usize,
    /// `|deviation| >= tolerance`
    pub above: usize,
}

impl BandCounts {
    pub fn total(&self) -> usize {
        self.below + self.above
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BandRow {
    pub band: Band,
    pub tolerance: f64,
    #[serde(flatten)]
    pub counts: BandCounts,
}

/// Per-band tally of one evaluation pass. Every band is present, empty or not.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub pass: Pass,
    pub bands: Vec<BandRow>,
}

impl ReconciliationReport {
    pub fn counts(&self, band: Band) -> BandCounts {
        self.bands[band.index()].counts
    }

    pub fn total_items(&self) -> usize {
        self.bands.iter().map(|r| r.counts.total()).sum()
    }

    pub fn total_above(&self) -> usize {
        self.bands.iter().map(|r| r.counts.above).sum()
    }
}

impl fmt::Display for ReconciliationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.pass)?;
        writeln!(f, "  {:<12} {:>6} {:>10} {:>10}", "band", "tol", "below", "at/above")?;
        for row in &self.bands {
            writeln!(
                f,
                "  {:<12} {:>5}% {:>10} {:>10}",
                row.band.label(),
                tolerance_percent(row.tolerance),
                row.counts.below,
                row.counts.above,
            )?;
        }
        Ok(())
    }
}

fn tolerance_percent(tolerance: f64) -> String {
    crate::model::format_number((tolerance * 1000.0).round() / 10.0)
}

/// Tally items by band and by whether the `pass` evaluation is in tolerance.
///
/// Fails if any item has not been evaluated for `pass`, so counts are never
/// built from stale or missing derived state.
pub fn report(items: &[ItemRecord], pass: Pass) -> Result<ReconciliationReport, RepriceError> {
    let mut counts: BTreeMap<Band, BandCounts> =
        Band::ALL.iter().map(|&b| (b, BandCounts::default())).collect();

    for item in items {
        let (band, eval) = match (item.band(), item.evaluation(pass)) {
            (Some(band), Some(eval)) => (band, eval),
            _ => {
                return Err(RepriceError::StageOrder {
                    expected: match pass {
                        Pass::Before => Stage::EvaluatedBefore,
                        Pass::After => Stage::EvaluatedAfter,
                    },
                    found: item.stage(),
                })
            }
        };
        let entry = counts.entry(band).or_default();
        if eval.deviation.abs() < band.tolerance() {
            entry.below += 1;
        } else {
            entry.above += 1;
        }
    }

    Ok(ReconciliationReport {
        pass,
        bands: counts
            .into_iter()
            .map(|(band, counts)| BandRow {
                band,
                tolerance: band.tolerance(),
                counts,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluated(id: &str, price: f64, target: f64) -> ItemRecord {
        let mut item = ItemRecord::new(id, price, Some(target));
        item.classify().unwrap();
        item.evaluate(Pass::Before).unwrap();
        item
    }

    #[test]
    fn counts_per_band() {
        let items = vec![
            evaluated("a", 100.0, 100.0),   // A, in
            evaluated("b", 100.0, 200.0),   // A, out (-0.5)
            evaluated("c", 600.0, 1000.0),  // B, out
            evaluated("d", 25000.0, 25500.0), // G, in
        ];
        let report = report(&items, Pass::Before).unwrap();
        assert_eq!(report.bands.len(), 7);
        assert_eq!(report.counts(Band::A), BandCounts { below: 1, above: 1 });
        assert_eq!(report.counts(Band::B), BandCounts { below: 0, above: 1 });
        assert_eq!(report.counts(Band::C), BandCounts::default());
        assert_eq!(report.counts(Band::G), BandCounts { below: 1, above: 0 });
        assert_eq!(report.total_items(), 4);
        assert_eq!(report.total_above(), 2);
    }

    #[test]
    fn unevaluated_item_is_rejected() {
        let mut item = ItemRecord::new("x", 10.0, Some(10.0));
        item.classify().unwrap();
        assert!(report(&[item], Pass::Before).is_err());
    }

    #[test]
    fn after_pass_needs_after_evaluation() {
        let items = vec![evaluated("a", 100.0, 100.0)];
        assert_eq!(
            report(&items, Pass::After).unwrap_err(),
            RepriceError::StageOrder {
                expected: Stage::EvaluatedAfter,
                found: Stage::EvaluatedBefore
            }
        );
    }

    #[test]
    fn renders_table() {
        let items = vec![evaluated("c", 600.0, 1000.0)];
        let text = report(&items, Pass::Before).unwrap().to_string();
        assert!(text.starts_with("before correction:"));
        assert!(text.contains("500-1000"));
        assert!(text.contains("20%"));
        assert!(text.contains("6%"));
    }

    #[test]
    fn empty_input_reports_all_bands_empty() {
        let report = report(&[], Pass::Before).unwrap();
        assert_eq!(report.bands.len(), 7);
        assert_eq!(report.total_items(), 0);
    }
}
