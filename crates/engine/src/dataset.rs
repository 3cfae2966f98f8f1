//! Dataset builder: catalog preparation and the outlet ↔ catalog join.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::RepriceError;
use crate::model::{FieldValue, ItemRecord};

// ---------------------------------------------------------------------------
// Input rows
// ---------------------------------------------------------------------------

/// One catalog row after cell coercion (blank prices already read as 0).
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRow {
    pub item_id: String,
    pub reference_price: f64,
    pub fallback_price: f64,
}

/// One outlet row after cell coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct OutletRow {
    pub item_id: String,
    pub current_price: f64,
    /// Source cell text when the price cell was not numeric.
    pub price_text: Option<String>,
    /// Cells of the passthrough columns, aligned with [`OutletTable::columns`].
    pub fields: Vec<FieldValue>,
}

#[derive(Debug, Clone, Default)]
pub struct OutletTable {
    pub columns: Vec<String>,
    pub rows: Vec<OutletRow>,
}

/// Operator-supplied identifiers stamped on every exported row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Identifiers {
    pub qc_id: String,
    pub pg_id: String,
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// Joined outlet items, ready for the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub identifiers: Identifiers,
    /// Passthrough column headers, in outlet order.
    pub columns: Vec<String>,
    pub items: Vec<ItemRecord>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Ids of items that found no catalog entry, in outlet order.
    pub fn unmatched(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|item| item.target_price().is_none())
            .map(|item| item.item_id.clone())
            .collect()
    }

    /// Fail-fast precondition for correction: every item has a target.
    pub fn ensure_targets(&self) -> Result<(), RepriceError> {
        let item_ids = self.unmatched();
        if item_ids.is_empty() {
            Ok(())
        } else {
            Err(RepriceError::MissingTargetPrice { item_ids })
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog preparation + join
// ---------------------------------------------------------------------------

/// Resolve each catalog row's target price.
///
/// Rows with both prices zero carry no usable reference and are dropped; a
/// zero reference price falls back to the secondary price.
pub fn prepare_catalog(rows: &[CatalogRow]) -> Vec<(String, f64)> {
    rows.iter()
        .filter_map(|row| {
            if row.reference_price == 0.0 && row.fallback_price == 0.0 {
                None
            } else if row.reference_price == 0.0 {
                Some((row.item_id.clone(), row.fallback_price))
            } else {
                Some((row.item_id.clone(), row.reference_price))
            }
        })
        .collect()
}

/// Join outlet rows to the catalog by exact item id. The first catalog row
/// for an id wins; unmatched outlet rows keep no target price.
pub fn join(catalog: &[CatalogRow], outlet: OutletTable, identifiers: Identifiers) -> Dataset {
    let mut targets: HashMap<String, f64> = HashMap::new();
    for (item_id, price) in prepare_catalog(catalog) {
        targets.entry(item_id).or_insert(price);
    }

    let items = outlet
        .rows
        .into_iter()
        .map(|row| {
            let target = targets.get(&row.item_id).copied();
            ItemRecord::new(row.item_id, row.current_price, target)
                .with_price_text(row.price_text)
                .with_fields(row.fields)
        })
        .collect();

    Dataset {
        identifiers,
        columns: outlet.columns,
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat(id: &str, reference: f64, fallback: f64) -> CatalogRow {
        CatalogRow {
            item_id: id.into(),
            reference_price: reference,
            fallback_price: fallback,
        }
    }

    fn outlet(ids_prices: &[(&str, f64)]) -> OutletTable {
        OutletTable {
            columns: vec!["Brand".into()],
            rows: ids_prices
                .iter()
                .map(|(id, p)| OutletRow {
                    item_id: (*id).into(),
                    current_price: *p,
                    price_text: None,
                    fields: vec![FieldValue::Text(format!("brand-{id}"))],
                })
                .collect(),
        }
    }

    #[test]
    fn fallback_and_drop_rules() {
        let rows = vec![cat("a", 100.0, 90.0), cat("b", 0.0, 120.0), cat("c", 0.0, 0.0)];
        let prepared = prepare_catalog(&rows);
        assert_eq!(
            prepared,
            vec![("a".to_string(), 100.0), ("b".to_string(), 120.0)]
        );
    }

    #[test]
    fn join_matches_first_catalog_row() {
        let catalog = vec![cat("a", 100.0, 0.0), cat("a", 999.0, 0.0), cat("b", 0.0, 50.0)];
        let ds = join(&catalog, outlet(&[("a", 80.0), ("b", 55.0)]), Identifiers::default());
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.items[0].target_price(), Some(100.0));
        assert_eq!(ds.items[1].target_price(), Some(50.0));
        assert_eq!(ds.items[0].fields, vec![FieldValue::Text("brand-a".into())]);
        assert_eq!(ds.columns, vec!["Brand".to_string()]);
        assert!(ds.ensure_targets().is_ok());
    }

    #[test]
    fn unmatched_items_fail_precondition() {
        let catalog = vec![cat("a", 100.0, 0.0), cat("z", 0.0, 0.0)];
        let ds = join(
            &catalog,
            outlet(&[("a", 80.0), ("missing", 1.0), ("z", 3.0)]),
            Identifiers::default(),
        );
        assert_eq!(ds.unmatched(), vec!["missing".to_string(), "z".to_string()]);
        let err = ds.ensure_targets().unwrap_err();
        assert_eq!(
            err,
            RepriceError::MissingTargetPrice {
                item_ids: vec!["missing".into(), "z".into()]
            }
        );
    }

    #[test]
    fn empty_outlet_yields_empty_dataset() {
        let ds = join(&[cat("a", 1.0, 1.0)], OutletTable::default(), Identifiers::default());
        assert!(ds.is_empty());
    }
}
