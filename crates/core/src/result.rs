//! Command results
//!
//! A response batch is zero or more data lines followed by an `error` line:
//!
//! ```text
//! clid=1 cid=1 client_nickname=alice|clid=2 cid=3 client_nickname=bob
//! error id=0 msg=ok
//! ```

use std::fmt;

use crate::wire::WireMap;

/// Error code used when the error line cannot be parsed
pub const MALFORMED_ERROR_CODE: i32 = -1;

/// One record of a response
pub type ResultRow = WireMap;

/// Parsed response to a single command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    rows: Vec<ResultRow>,
    error_code: i32,
    error_message: String,
}

impl QueryResult {
    /// Parse a complete response batch. The last line is the error line.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let Some((last, data)) = lines.split_last() else {
            return Self {
                rows: Vec::new(),
                error_code: MALFORMED_ERROR_CODE,
                error_message: String::new(),
            };
        };

        let rows = data
            .iter()
            .flat_map(|line| line.as_ref().split('|'))
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .map(WireMap::parse)
            .collect();

        let (error_code, error_message) = parse_error_line(last.as_ref());

        Self {
            rows,
            error_code,
            error_message,
        }
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<ResultRow> {
        self.rows
    }

    pub fn first(&self) -> Option<&ResultRow> {
        self.rows.first()
    }

    pub fn error_code(&self) -> i32 {
        self.error_code
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    pub fn is_ok(&self) -> bool {
        self.error_code == 0
    }

    pub fn has_error(&self) -> bool {
        !self.is_ok()
    }
}

/// Extract `id` and `msg` from `error id=<code> msg=<text>`
fn parse_error_line(line: &str) -> (i32, String) {
    let args = line
        .trim()
        .split_once(char::is_whitespace)
        .map(|(_, rest)| rest)
        .unwrap_or("");
    let map = WireMap::parse(args);

    let code = map.get_as::<i32>("id").unwrap_or(MALFORMED_ERROR_CODE);
    let message = map.get("msg").unwrap_or_default().to_string();
    (code, message)
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error Code: {}\nError Message: {}",
            self.error_code, self.error_message
        )?;
        for row in &self.rows {
            write!(f, "\n{}", row)?;
        }
        Ok(())
    }
}
