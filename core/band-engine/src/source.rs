//! FILENAME: core/band-engine/src/source.rs
//! PURPOSE: The row source abstraction consumed by the band processor.
//! CONTEXT: Rows are pulled one at a time in a single forward pass, so a
//! report never needs the full row set in memory. End of stream (`None`)
//! and a fetch failure (`Some(Err(..))`) are distinct signals.

use expr_engine::Row;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{message}")]
pub struct RowSourceError {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl RowSourceError {
    pub fn new(message: impl Into<String>) -> Self {
        RowSourceError {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RowSourceError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// A lazy, single-pass sequence of rows.
pub trait RowSource {
    /// Returns the next row, `None` at end of stream, or the fetch error.
    fn next_row(&mut self) -> Option<Result<Row, RowSourceError>>;
}

impl<S: RowSource + ?Sized> RowSource for &mut S {
    fn next_row(&mut self) -> Option<Result<Row, RowSourceError>> {
        (**self).next_row()
    }
}

impl<S: RowSource + ?Sized> RowSource for Box<S> {
    fn next_row(&mut self) -> Option<Result<Row, RowSourceError>> {
        (**self).next_row()
    }
}

/// Adapts an infallible iterator of rows.
pub struct IterSource<I> {
    rows: I,
}

impl<I: Iterator<Item = Row>> IterSource<I> {
    pub fn new(rows: impl IntoIterator<IntoIter = I>) -> Self {
        IterSource {
            rows: rows.into_iter(),
        }
    }
}

impl<I: Iterator<Item = Row>> RowSource for IterSource<I> {
    fn next_row(&mut self) -> Option<Result<Row, RowSourceError>> {
        self.rows.next().map(Ok)
    }
}

/// Adapts an iterator whose items may be fetch errors.
pub struct TryIterSource<I> {
    rows: I,
}

impl<I: Iterator<Item = Result<Row, RowSourceError>>> TryIterSource<I> {
    pub fn new(rows: impl IntoIterator<IntoIter = I>) -> Self {
        TryIterSource {
            rows: rows.into_iter(),
        }
    }
}

impl<I: Iterator<Item = Result<Row, RowSourceError>>> RowSource for TryIterSource<I> {
    fn next_row(&mut self) -> Option<Result<Row, RowSourceError>> {
        self.rows.next()
    }
}

/// Reads one JSON object per line. Blank lines are skipped.
pub struct JsonLinesSource<R> {
    lines: std::io::Lines<R>,
    line_number: u64,
}

impl<R: std::io::BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        JsonLinesSource {
            lines: reader.lines(),
            line_number: 0,
        }
    }
}

impl<R: std::io::BufRead> RowSource for JsonLinesSource<R> {
    fn next_row(&mut self) -> Option<Result<Row, RowSourceError>> {
        loop {
            let line = self.lines.next()?;
            self.line_number += 1;
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    return Some(Err(RowSourceError::with_source(
                        format!("read failed at line {}", self.line_number),
                        e,
                    )))
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(serde_json::from_str::<Row>(&line).map_err(|e| {
                RowSourceError::with_source(
                    format!("invalid row at line {}", self.line_number),
                    e,
                )
            }));
        }
    }
}
