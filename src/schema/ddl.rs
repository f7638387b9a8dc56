//! DDL Synthesizer
//!
//! Turns a difference set into statements that are safe to re-run. Order:
//! tables, then columns, then index drops, then index creation. Sequences
//! named by `nextval` defaults come before the table or column using them.

use super::{ColumnDef, DifferenceSet, SchemaSnapshot};
use crate::data::value::quote_literal;
use crate::executor::{quote_ident, Statement};

/// Synthesize the statements that bring a replica to the master's structure
pub fn synthesize(diff: &DifferenceSet, master: &SchemaSnapshot) -> Vec<Statement> {
    let mut statements = Vec::new();

    for table in &diff.missing_tables {
        let Some(columns) = master.tables.get(table) else {
            tracing::warn!("Missing table {} is absent from the master snapshot", table);
            continue;
        };

        push_sequences(&mut statements, columns);
        statements.push(Statement::CreateTable {
            table: table.clone(),
            columns: columns.clone(),
        });
    }

    for (table, columns) in &diff.missing_columns {
        push_sequences(&mut statements, columns);
        for column in columns {
            statements.push(Statement::AddColumn {
                table: table.clone(),
                column: column.clone(),
            });
        }
    }

    for (table, indexes) in &diff.extra_indexes {
        for index in indexes {
            statements.push(Statement::DropIndex {
                table: table.clone(),
                name: index.name.clone(),
            });
        }
    }

    for (table, indexes) in &diff.missing_indexes {
        for index in indexes {
            statements.push(Statement::CreateIndex {
                table: table.clone(),
                name: index.name.clone(),
                definition: with_if_not_exists(&index.definition),
            });
        }
    }

    statements
}

/// A `nextval` default needs its sequence to exist before the column does
fn push_sequences(statements: &mut Vec<Statement>, columns: &[ColumnDef]) {
    for column in columns {
        if let Some(sequence) = column.default.as_deref().and_then(sequence_name) {
            let statement = Statement::CreateSequence { name: sequence };
            if !statements.contains(&statement) {
                statements.push(statement);
            }
        }
    }
}

/// Render `"name" type [NOT NULL] [DEFAULT ...]`
pub fn column_definition(column: &ColumnDef) -> String {
    let mut def = format!("{} {}", quote_ident(&column.name), column.data_type);
    if !column.nullable {
        def.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        def.push_str(" DEFAULT ");
        def.push_str(&format_default(default));
    }
    def
}

/// Render a catalog default expression for reuse in DDL
///
/// Sequence calls, timestamp functions, casts, array literals, quoted strings
/// and bare numbers pass through verbatim; anything else becomes a quoted
/// string literal.
pub fn format_default(default: &str) -> String {
    let trimmed = default.trim();
    let upper = trimmed.to_uppercase();

    if trimmed.starts_with("nextval(")
        || upper == "CURRENT_TIMESTAMP"
        || upper == "NOW()"
        || trimmed.contains("::")
        || trimmed.starts_with("ARRAY[")
        || (trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\''))
        || is_bare_number(trimmed)
    {
        return trimmed.to_string();
    }

    quote_literal(trimmed)
}

/// Rewrite `CREATE [UNIQUE] INDEX` into its existence-checked form
pub fn with_if_not_exists(definition: &str) -> String {
    if definition.contains("IF NOT EXISTS") {
        return definition.to_string();
    }
    if definition.contains("CREATE UNIQUE INDEX") {
        return definition.replacen("CREATE UNIQUE INDEX", "CREATE UNIQUE INDEX IF NOT EXISTS", 1);
    }
    if definition.contains("CREATE INDEX") {
        return definition.replacen("CREATE INDEX", "CREATE INDEX IF NOT EXISTS", 1);
    }
    definition.to_string()
}

// f64 parsing also accepts `inf` and `NaN`, which are not SQL numbers
fn is_bare_number(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit()) && s.parse::<f64>().map_or(false, f64::is_finite)
}

/// `nextval('item_id_seq'::regclass)` -> `item_id_seq`
fn sequence_name(default: &str) -> Option<String> {
    let rest = default.trim().strip_prefix("nextval(")?;
    let start = rest.find('\'')? + 1;
    let len = rest[start..].find('\'')?;
    Some(rest[start..start + len].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{diff_schemas, ColumnRecord, IndexRecord};

    fn column(table: &str, name: &str, position: i32, data_type: &str) -> ColumnRecord {
        ColumnRecord {
            table: table.into(),
            column: name.into(),
            position,
            data_type: data_type.into(),
            udt_name: String::new(),
            nullable: true,
            default: None,
            char_max_length: None,
            numeric_precision: None,
            numeric_scale: None,
        }
    }

    #[test]
    fn test_format_default() {
        assert_eq!(
            format_default("nextval('item_id_seq'::regclass)"),
            "nextval('item_id_seq'::regclass)"
        );
        assert_eq!(format_default("CURRENT_TIMESTAMP"), "CURRENT_TIMESTAMP");
        assert_eq!(format_default("now()"), "now()");
        assert_eq!(format_default("'magic'::character varying"), "'magic'::character varying");
        assert_eq!(format_default("ARRAY[]::integer[]"), "ARRAY[]::integer[]");
        assert_eq!(format_default("'pending'"), "'pending'");
        assert_eq!(format_default("-1.5"), "-1.5");
        assert_eq!(format_default("0"), "0");
        assert_eq!(format_default("Bob's"), "'Bob''s'");
        assert_eq!(format_default("-"), "'-'");
        assert_eq!(format_default("1e3"), "1e3");
    }

    #[test]
    fn test_malformed_numbers_are_quoted() {
        assert_eq!(format_default("1-2"), "'1-2'");
        assert_eq!(format_default("1.2.3"), "'1.2.3'");
        assert_eq!(format_default("--1"), "'--1'");
        assert_eq!(format_default("inf"), "'inf'");
    }

    #[test]
    fn test_index_rewrite() {
        assert_eq!(
            with_if_not_exists("CREATE INDEX idx_a ON public.a USING btree (x)"),
            "CREATE INDEX IF NOT EXISTS idx_a ON public.a USING btree (x)"
        );
        assert_eq!(
            with_if_not_exists("CREATE UNIQUE INDEX idx_b ON public.b USING btree (y)"),
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_b ON public.b USING btree (y)"
        );
        let already = "CREATE INDEX IF NOT EXISTS idx_c ON public.c USING btree (z)";
        assert_eq!(with_if_not_exists(already), already);
    }

    #[test]
    fn test_statement_order_and_rendering() {
        let mut id = column("item", "id", 1, "integer");
        id.nullable = false;
        id.default = Some("nextval('item_id_seq'::regclass)".into());
        let mut name = column("item", "name", 2, "character varying");
        name.char_max_length = Some(255);
        name.nullable = false;

        let master = SchemaSnapshot::from_records(
            vec![
                id,
                name,
                column("mod", "id", 1, "integer"),
                column("mod", "weight", 2, "numeric"),
            ],
            vec![IndexRecord {
                table: "item".into(),
                name: "idx_item_name".into(),
                definition: "CREATE INDEX idx_item_name ON public.item USING btree (name)".into(),
            }],
        );
        let replica = SchemaSnapshot::from_records(
            vec![column("mod", "id", 1, "integer")],
            vec![IndexRecord {
                table: "mod".into(),
                name: "idx_mod_old".into(),
                definition: "CREATE INDEX idx_mod_old ON public.mod USING btree (id)".into(),
            }],
        );

        let statements = synthesize(&diff_schemas(&master, &replica), &master);
        let sql: Vec<String> = statements.iter().map(|s| s.to_sql()).collect();
        assert_eq!(
            sql,
            vec![
                "CREATE SEQUENCE IF NOT EXISTS item_id_seq".to_string(),
                "CREATE TABLE IF NOT EXISTS \"item\" (\"id\" integer NOT NULL DEFAULT nextval('item_id_seq'::regclass), \"name\" character varying(255) NOT NULL)".to_string(),
                "ALTER TABLE \"mod\" ADD COLUMN IF NOT EXISTS \"weight\" numeric".to_string(),
                "DROP INDEX IF EXISTS \"idx_mod_old\"".to_string(),
                "CREATE INDEX IF NOT EXISTS idx_item_name ON public.item USING btree (name)".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_column_bootstraps_its_sequence() {
        let mut seq_no = column("mod", "seq_no", 2, "integer");
        seq_no.default = Some("nextval('mod_seq_no_seq'::regclass)".into());
        let master = SchemaSnapshot::from_records(
            vec![column("mod", "id", 1, "integer"), seq_no],
            vec![],
        );
        let replica = SchemaSnapshot::from_records(vec![column("mod", "id", 1, "integer")], vec![]);

        let sql: Vec<String> = synthesize(&diff_schemas(&master, &replica), &master)
            .iter()
            .map(|s| s.to_sql())
            .collect();
        assert_eq!(
            sql,
            vec![
                "CREATE SEQUENCE IF NOT EXISTS mod_seq_no_seq".to_string(),
                "ALTER TABLE \"mod\" ADD COLUMN IF NOT EXISTS \"seq_no\" integer DEFAULT nextval('mod_seq_no_seq'::regclass)".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_diff_synthesizes_nothing() {
        let master = SchemaSnapshot::from_records(vec![column("mod", "id", 1, "integer")], vec![]);
        assert!(synthesize(&diff_schemas(&master, &master), &master).is_empty());
    }
}
