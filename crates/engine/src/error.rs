use std::fmt;

use thiserror::Error;

use crate::engine::Stage;

/// Which price field of an item a validation error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceField {
    Current,
    Target,
    Corrected,
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => write!(f, "current price"),
            Self::Target => write!(f, "target price"),
            Self::Corrected => write!(f, "corrected price"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RepriceError {
    /// Outlet items with no catalog entry. Fatal for the whole folder.
    #[error("{} outlet item(s) have no target price: {}", .item_ids.len(), preview_ids(.item_ids))]
    MissingTargetPrice { item_ids: Vec<String> },

    /// A price that is negative, non-finite, or was non-numeric upstream.
    #[error("item '{item_id}': invalid {field} '{value}'")]
    InvalidPriceValue {
        item_id: String,
        field: PriceField,
        value: String,
    },

    /// A pipeline step was invoked before its predecessor completed.
    #[error("pipeline out of order: expected stage {expected}, found {found}")]
    StageOrder { expected: Stage, found: Stage },
}

impl RepriceError {
    pub(crate) fn invalid_price(item_id: &str, field: PriceField, value: f64) -> Self {
        Self::InvalidPriceValue {
            item_id: item_id.to_string(),
            field,
            value: value.to_string(),
        }
    }
}

/// Up to five ids, then a count of the rest.
fn preview_ids(ids: &[String]) -> String {
    const SHOWN: usize = 5;
    let head = ids.iter().take(SHOWN).map(String::as_str).collect::<Vec<_>>().join(", ");
    if ids.len() > SHOWN {
        format!("{head} (+{} more)", ids.len() - SHOWN)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_target_message_truncates_long_lists() {
        let ids: Vec<String> = (1..=7).map(|i| format!("it{i}")).collect();
        let err = RepriceError::MissingTargetPrice { item_ids: ids };
        let msg = err.to_string();
        assert!(msg.starts_with("7 outlet item(s)"));
        assert!(msg.contains("it1, it2, it3, it4, it5 (+2 more)"));
        assert!(!msg.contains("it6"));
    }

    #[test]
    fn invalid_price_names_field() {
        let err = RepriceError::invalid_price("A-1", PriceField::Current, -3.0);
        assert_eq!(err.to_string(), "item 'A-1': invalid current price '-3'");
    }
}
