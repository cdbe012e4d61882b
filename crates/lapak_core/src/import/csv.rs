//! Minimal CSV reader for spreadsheet exports.
//!
//! # Invariants
//! - Fields are comma separated; quoted fields may contain commas, quotes
//!   (doubled) and line breaks.
//! - `\n`, `\r\n` and lone `\r` all end a record.
//! - A leading UTF-8 BOM is dropped; blank lines are skipped.
//! - Every record remembers the 1-based line it starts on.

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRecord {
    pub line: usize,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsvError {
    /// Quoted field still open at end of input.
    UnterminatedQuote { line: usize },
    /// Quote inside an unquoted field, or text right after a closing quote.
    UnexpectedQuote { line: usize },
}

impl Display for CsvError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnterminatedQuote { line } => {
                write!(f, "unterminated quoted field starting on line {line}")
            }
            Self::UnexpectedQuote { line } => write!(f, "unexpected quote on line {line}"),
        }
    }
}

impl Error for CsvError {}

#[derive(Default)]
struct RecordBuilder {
    fields: Vec<String>,
    field: String,
    quoted: bool,
    closed_quote: bool,
}

impl RecordBuilder {
    fn end_field(&mut self) {
        self.fields.push(std::mem::take(&mut self.field));
        self.quoted = false;
        self.closed_quote = false;
    }

    fn is_blank(&self) -> bool {
        self.fields.is_empty() && self.field.is_empty() && !self.quoted
    }

    fn finish(&mut self, line: usize) -> Option<CsvRecord> {
        if self.is_blank() {
            return None;
        }
        self.end_field();
        Some(CsvRecord {
            line,
            fields: std::mem::take(&mut self.fields),
        })
    }
}

/// Parses `input` into records. The header, if any, is the first record.
pub fn parse_csv(input: &str) -> Result<Vec<CsvRecord>, CsvError> {
    let text = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut records = Vec::new();
    let mut builder = RecordBuilder::default();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    builder.field.push('"');
                }
                '"' => {
                    in_quotes = false;
                    builder.closed_quote = true;
                }
                '\n' => {
                    line += 1;
                    builder.field.push('\n');
                }
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    line += 1;
                    builder.field.push('\n');
                }
                other => builder.field.push(other),
            }
            continue;
        }

        match ch {
            ',' => builder.end_field(),
            '\r' | '\n' => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                if let Some(record) = builder.finish(record_line) {
                    records.push(record);
                }
                line += 1;
                record_line = line;
            }
            '"' if builder.field.is_empty() && !builder.quoted => {
                in_quotes = true;
                builder.quoted = true;
            }
            '"' => return Err(CsvError::UnexpectedQuote { line }),
            other if builder.closed_quote => {
                if other.is_whitespace() {
                    continue;
                }
                return Err(CsvError::UnexpectedQuote { line });
            }
            other => builder.field.push(other),
        }
    }

    if in_quotes {
        return Err(CsvError::UnterminatedQuote { line: record_line });
    }
    if let Some(record) = builder.finish(record_line) {
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::{parse_csv, CsvError};

    fn fields(input: &str) -> Vec<Vec<String>> {
        parse_csv(input)
            .unwrap()
            .into_iter()
            .map(|record| record.fields)
            .collect()
    }

    #[test]
    fn parses_quoted_commas_escaped_quotes_and_crlf() {
        let rows = fields("sku,name\r\nA1,\"Kopi, Susu\"\r\nB2,\"Teh \"\"Manis\"\"\"\r\n");
        assert_eq!(
            rows,
            vec![
                vec!["sku".to_string(), "name".to_string()],
                vec!["A1".to_string(), "Kopi, Susu".to_string()],
                vec!["B2".to_string(), "Teh \"Manis\"".to_string()],
            ]
        );
    }

    #[test]
    fn multiline_field_keeps_start_line_and_advances_counter() {
        let records = parse_csv("a,b\n1,\"line one\nline two\"\n\n2,x").unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].line, 2);
        assert_eq!(records[1].fields[1], "line one\nline two");
        assert_eq!(records[2].line, 5);
    }

    #[test]
    fn strips_bom_and_keeps_empty_trailing_field() {
        let rows = fields("\u{feff}a,b,\n");
        assert_eq!(rows, vec![vec!["a".to_string(), "b".to_string(), String::new()]]);
    }

    #[test]
    fn quoted_empty_line_is_a_record() {
        let rows = fields("\"\"\n");
        assert_eq!(rows, vec![vec![String::new()]]);
    }

    #[test]
    fn rejects_unterminated_and_stray_quotes() {
        assert_eq!(
            parse_csv("a\n\"open,1\n").unwrap_err(),
            CsvError::UnterminatedQuote { line: 2 }
        );
        assert_eq!(
            parse_csv("a\nab\"c\n").unwrap_err(),
            CsvError::UnexpectedQuote { line: 2 }
        );
        assert_eq!(
            parse_csv("\"a\"b\n").unwrap_err(),
            CsvError::UnexpectedQuote { line: 1 }
        );
    }
}
