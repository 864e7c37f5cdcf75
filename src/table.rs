//! In-memory tabular model and the long-to-wide reshape at the heart of the
//! pipeline: one long row per observed data point, one wide row per
//! (period, facility, report) with one column per data element + category
//! option combo pair.

use std::collections::HashMap;

/// The three fixed leading columns of every wide report table.
pub const KEY_COLUMNS: [&str; 3] = ["date", "facility", "report_name"];

/// Structured composite column key: the data element and the category option
/// combo qualifying it. Flattened to `"{element}_{combo}"` only when a column
/// name is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    pub data_element: String,
    pub category_combo: String,
}

impl CompositeKey {
    pub fn column_name(&self) -> String {
        format!("{}_{}", self.data_element, self.category_combo)
    }
}

/// One observed data point in long form, already joined with the facility
/// and report display names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongRow {
    pub period: String,
    pub facility: String,
    pub report_name: String,
    pub key: CompositeKey,
    pub value: String,
}

/// A named-column table with optional (NULL-able) text cells. Every row has
/// exactly `columns.len()` cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl DataTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reshapes long rows into wide form. Rows are grouped by
/// (period, facility, report name) and columns by composite key, both in
/// first-encounter order, which makes the result deterministic for a given
/// input order. Duplicate observations for the same group and column keep
/// the first value; later ones are dropped, never combined. Cells with no
/// observation are NULL.
pub fn reshape_wide(long_rows: &[LongRow]) -> DataTable {
    let mut columns: Vec<String> = KEY_COLUMNS.iter().map(|c| (*c).to_string()).collect();
    let mut column_index: HashMap<String, usize> = HashMap::new();

    let mut group_order: Vec<(String, String, String)> = Vec::new();
    let mut group_index: HashMap<(String, String, String), usize> = HashMap::new();
    let mut cells: Vec<HashMap<usize, String>> = Vec::new();

    for row in long_rows {
        let group_key = (
            row.period.clone(),
            row.facility.clone(),
            row.report_name.clone(),
        );
        let group = match group_index.get(&group_key) {
            Some(idx) => *idx,
            None => {
                group_order.push(group_key.clone());
                group_index.insert(group_key, group_order.len() - 1);
                cells.push(HashMap::new());
                group_order.len() - 1
            }
        };

        let column_name = row.key.column_name();
        let column = match column_index.get(&column_name) {
            Some(idx) => *idx,
            None => {
                columns.push(column_name.clone());
                column_index.insert(column_name, columns.len() - 1);
                columns.len() - 1
            }
        };

        // First value wins on duplicate (group, column) observations.
        cells[group].entry(column).or_insert_with(|| row.value.clone());
    }

    let width = columns.len();
    let mut table = DataTable::new(columns);
    for (group, (period, facility, report_name)) in group_order.into_iter().enumerate() {
        let mut out = vec![None; width];
        out[0] = Some(period);
        out[1] = Some(facility);
        out[2] = Some(report_name);
        for (column, value) in &cells[group] {
            out[*column] = Some(value.clone());
        }
        table.rows.push(out);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_row(period: &str, facility: &str, element: &str, combo: &str, value: &str) -> LongRow {
        LongRow {
            period: period.to_string(),
            facility: facility.to_string(),
            report_name: "Malaria Health Facility Report".to_string(),
            key: CompositeKey {
                data_element: element.to_string(),
                category_combo: combo.to_string(),
            },
            value: value.to_string(),
        }
    }

    #[test]
    fn reshape_produces_one_row_per_period_and_facility() {
        let rows = vec![
            long_row("202401", "Chileka HC", "X", "Y", "10"),
            long_row("202401", "Chileka HC", "X2", "Y", "4"),
            long_row("202402", "Chileka HC", "X", "Y", "7"),
            long_row("202401", "Mwaiwathu", "X", "Y", "3"),
        ];
        let table = reshape_wide(&rows);
        assert_eq!(
            table.columns,
            vec!["date", "facility", "report_name", "X_Y", "X2_Y"]
        );
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0][3], Some("10".to_string()));
        assert_eq!(table.rows[0][4], Some("4".to_string()));
        // No X2_Y observation for the second group.
        assert_eq!(table.rows[1][4], None);
    }

    #[test]
    fn reshape_first_value_wins_on_duplicates() {
        let rows = vec![
            long_row("202401", "Chileka HC", "X", "Y", "10"),
            long_row("202401", "Chileka HC", "X", "Y", "20"),
        ];
        let table = reshape_wide(&rows);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.columns.len(), 4);
        assert_eq!(table.rows[0][3], Some("10".to_string()));
    }

    #[test]
    fn reshape_is_idempotent_for_identical_input() {
        let rows = vec![
            long_row("202401", "Chileka HC", "X", "Y", "10"),
            long_row("202402", "Mwaiwathu", "Z", "W", "2"),
            long_row("202401", "Chileka HC", "Z", "W", "5"),
        ];
        assert_eq!(reshape_wide(&rows), reshape_wide(&rows));
    }

    #[test]
    fn reshape_of_nothing_is_empty_with_key_columns() {
        let table = reshape_wide(&[]);
        assert!(table.is_empty());
        assert_eq!(table.columns, vec!["date", "facility", "report_name"]);
    }
}
