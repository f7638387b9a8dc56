//! Operator Interaction
//!
//! Confirmation before a mutating pass and the choice between conflicting
//! lookup rows.

use std::io::{BufRead, Write};

use crate::lookup::ConflictRecord;

/// The person (or script) driving a pass
pub trait Operator: Send {
    /// Ask to go ahead; `false` aborts the pass
    fn confirm(&mut self, prompt: &str) -> bool;

    /// Pick a group index of `record`, or `None` to skip it
    fn choose(&mut self, record: &ConflictRecord) -> Option<usize>;
}

/// Interactive operator on stdin/stdout
pub struct ConsoleOperator<R = std::io::BufReader<std::io::Stdin>, W = std::io::Stdout> {
    input: R,
    output: W,
}

impl ConsoleOperator {
    pub fn new() -> Self {
        Self {
            input: std::io::BufReader::new(std::io::stdin()),
            output: std::io::stdout(),
        }
    }
}

impl Default for ConsoleOperator {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: BufRead, W: Write> ConsoleOperator<R, W> {
    /// Operator over arbitrary streams
    pub fn with_streams(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

impl<R: BufRead + Send, W: Write + Send> Operator for ConsoleOperator<R, W> {
    fn confirm(&mut self, prompt: &str) -> bool {
        let _ = write!(self.output, "{} [y/N]: ", prompt);
        let _ = self.output.flush();
        matches!(
            self.read_line().as_deref().map(str::to_lowercase).as_deref(),
            Some("y") | Some("yes")
        )
    }

    fn choose(&mut self, record: &ConflictRecord) -> Option<usize> {
        let rule = "=".repeat(80);
        let _ = writeln!(self.output, "\n{}", rule);
        let _ = writeln!(self.output, "CONFLICT FOUND FOR: {}.{}", record.table, record.key);
        let _ = writeln!(self.output, "{}", rule);

        for (i, group) in record.groups.iter().enumerate() {
            let _ = writeln!(
                self.output,
                "\nOption {} (Found in: {}):",
                i + 1,
                group.databases.join(", ")
            );
            for (column, value) in group.row.iter() {
                let _ = writeln!(self.output, "  {}: {}", column, value);
            }
        }

        let count = record.groups.len();
        loop {
            let _ = write!(self.output, "\nSelect option (1-{}) or 's' to skip: ", count);
            let _ = self.output.flush();

            let line = self.read_line()?;
            if line.eq_ignore_ascii_case("s") {
                return None;
            }
            match line.parse::<usize>() {
                Ok(n) if (1..=count).contains(&n) => return Some(n - 1),
                Ok(_) => {
                    let _ = writeln!(self.output, "Please enter a number between 1 and {}", count);
                }
                Err(_) => {
                    let _ = writeln!(self.output, "Invalid input. Please enter a number or 's'");
                }
            }
        }
    }
}

/// Non-interactive operator: confirms everything and skips every conflict
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Operator for AssumeYes {
    fn confirm(&mut self, prompt: &str) -> bool {
        tracing::info!("{} (assumed yes)", prompt);
        true
    }

    fn choose(&mut self, record: &ConflictRecord) -> Option<usize> {
        tracing::warn!(
            "Skipping conflict for {}.{} ({} versions) in non-interactive mode",
            record.table,
            record.key,
            record.groups.len()
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LookupTableConfig;
    use crate::data::{Row, RowSnapshot, TableLayout, Value};
    use crate::lookup::find_conflicts;
    use std::sync::Arc;

    fn record() -> ConflictRecord {
        let table = LookupTableConfig {
            name: "spells".into(),
            key_fields: vec!["name".into()],
            id_field: None,
            propagate_updates: false,
        };
        let layout = Arc::new(TableLayout::new("spells", vec!["name".into(), "level".into()]));
        let snapshot = |level| {
            let row = Row::new(Arc::clone(&layout), vec![Value::Text("Haste".into()), Value::Int(level)]).unwrap();
            RowSnapshot::build(&table, vec![row])
        };
        let snapshots = vec![("master".to_string(), snapshot(3)), ("loot_db_1".to_string(), snapshot(4))];
        find_conflicts(&table, &snapshots).remove(0)
    }

    #[test]
    fn test_console_choice_retries_invalid_input() {
        let input = std::io::Cursor::new("7\nabc\n2\n");
        let mut output = Vec::new();
        let mut operator = ConsoleOperator::with_streams(input, &mut output);

        assert_eq!(operator.choose(&record()), Some(1));
        let printed = String::from_utf8(output).unwrap();
        assert!(printed.contains("CONFLICT FOUND FOR: spells.Haste"));
        assert!(printed.contains("Please enter a number between 1 and 2"));
        assert!(printed.contains("Invalid input"));
    }

    #[test]
    fn test_console_skip_and_confirm() {
        let mut operator = ConsoleOperator::with_streams(std::io::Cursor::new("s\ny\n"), Vec::new());
        assert_eq!(operator.choose(&record()), None);
        assert!(operator.confirm("Apply changes?"));

        let mut operator = ConsoleOperator::with_streams(std::io::Cursor::new(""), Vec::new());
        assert!(!operator.confirm("Apply changes?"));
    }
}
