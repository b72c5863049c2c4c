//! Column role inference.
//!
//! Roles are inferred from column names alone, by case-sensitive substring
//! markers. A name may match several roles.

use crate::domain::ColumnMarkers;

/// Column roles inferred for one dataset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnRoles {
    /// Candidates for grouping/filtering.
    pub grouping: Vec<String>,
    /// Amount-like measures (left axis).
    pub amount: Vec<String>,
    /// Quantity-like measures (right axis).
    pub quantity: Vec<String>,
}

impl ColumnRoles {
    /// Every measure column, in dataset column order, without duplicates.
    pub fn measures(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .filter(|c| self.amount.contains(*c) || self.quantity.contains(*c))
            .cloned()
            .collect()
    }

    pub fn has_measures(&self) -> bool {
        !self.amount.is_empty() || !self.quantity.is_empty()
    }
}

/// Classify columns by name. The date column is excluded from every role.
pub fn classify_columns(columns: &[String], date_column: &str, markers: &ColumnMarkers) -> ColumnRoles {
    let matches = |name: &str, set: &[String]| set.iter().any(|m| !m.is_empty() && name.contains(m.as_str()));

    let mut roles = ColumnRoles::default();
    for name in columns.iter().filter(|c| c.as_str() != date_column) {
        if matches(name, &markers.grouping) {
            roles.grouping.push(name.clone());
        }
        if matches(name, &markers.amount) {
            roles.amount.push(name.clone());
        }
        if matches(name, &markers.quantity) {
            roles.quantity.push(name.clone());
        }
    }
    roles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_markers_classify_sales_columns() {
        let columns = cols(&["CDATE", "RegionCd", "LogisticCenter", "CustCn", "SalesAmt", "SalesQty", "Memo"]);
        let roles = classify_columns(&columns, "CDATE", &ColumnMarkers::default());

        assert_eq!(roles.grouping, cols(&["RegionCd", "LogisticCenter", "CustCn"]));
        assert_eq!(roles.amount, cols(&["SalesAmt"]));
        assert_eq!(roles.quantity, cols(&["SalesQty"]));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let columns = cols(&["regioncd", "salesamt", "QTY"]);
        let roles = classify_columns(&columns, "CDATE", &ColumnMarkers::default());
        assert_eq!(roles, ColumnRoles::default());
        assert!(!roles.has_measures());
    }

    #[test]
    fn a_column_can_hold_several_roles() {
        let columns = cols(&["AmtCd", "QtyAmt"]);
        let roles = classify_columns(&columns, "CDATE", &ColumnMarkers::default());

        assert_eq!(roles.grouping, cols(&["AmtCd"]));
        assert_eq!(roles.amount, cols(&["AmtCd", "QtyAmt"]));
        assert_eq!(roles.quantity, cols(&["QtyAmt"]));
        assert_eq!(roles.measures(&columns), cols(&["AmtCd", "QtyAmt"]));
    }

    #[test]
    fn custom_markers_replace_defaults() {
        let markers = ColumnMarkers {
            grouping: cols(&["Region"]),
            amount: cols(&["Revenue"]),
            quantity: vec![],
        };
        let columns = cols(&["RegionCd", "Revenue", "SalesAmt"]);
        let roles = classify_columns(&columns, "CDATE", &markers);

        assert_eq!(roles.grouping, cols(&["RegionCd"]));
        assert_eq!(roles.amount, cols(&["Revenue"]));
        assert!(roles.quantity.is_empty());
    }
}
