//! Table-rendering helpers shared by every layer that wants to print rows
//! for debugging or test output (scan results, buffer-pool frame contents,
//! page-file stats).

use crate::RecordId;
use tabled::{Table, builder::Builder, settings};
use types::Value;

/// Predefined output styles that map to `tabled` styles.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TableStyleKind {
    #[default]
    Modern,
    Ascii,
    Plain,
}

impl TableStyleKind {
    fn apply(self, table: &mut Table) {
        match self {
            Self::Modern => table.with(settings::Style::modern()),
            Self::Ascii => table.with(settings::Style::ascii()),
            Self::Plain => table.with(settings::Style::empty()),
        };
    }
}

/// Render arbitrary string rows with the provided style.
pub fn render_string_table(
    headers: &[&str],
    rows: Vec<Vec<String>>,
    style: TableStyleKind,
) -> String {
    if headers.is_empty() && rows.is_empty() {
        return "<empty>".into();
    }

    let mut builder = Builder::default();

    if !headers.is_empty() {
        builder.push_record(headers.iter().copied());
    }

    for row in rows {
        builder.push_record(row);
    }

    let mut table = builder.build();
    style.apply(&mut table);
    table.to_string()
}

/// Format a single value for display.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Int(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Str(text) => format!("'{}'", text),
        Value::Bool(b) => b.to_string(),
    }
}

/// Format a `RecordId` as `(page_id, slot)`.
pub fn format_record_id(rid: &RecordId) -> String {
    format!("({}, {})", rid.page_id.0, rid.slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PageId;

    #[test]
    fn string_table_with_headers_renders() {
        let rendered = render_string_table(
            &["id", "name"],
            vec![vec!["1".into(), "Ada".into()]],
            TableStyleKind::Modern,
        );
        assert!(rendered.contains("id"));
        assert!(rendered.contains("Ada"));
    }

    #[test]
    fn empty_table_renders_placeholder() {
        assert_eq!(
            render_string_table(&[], vec![], TableStyleKind::Plain),
            "<empty>"
        );
    }

    #[test]
    fn format_value_quotes_strings() {
        assert_eq!(format_value(&Value::Str("Ada".into())), "'Ada'");
        assert_eq!(format_value(&Value::Int(42)), "42");
        assert_eq!(format_value(&Value::Bool(true)), "true");
    }

    #[test]
    fn format_record_id_matches_rid_shape() {
        let rid = RecordId {
            page_id: PageId(3),
            slot: 7,
        };
        assert_eq!(format_record_id(&rid), "(3, 7)");
    }
}
