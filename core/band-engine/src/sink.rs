//! FILENAME: core/band-engine/src/sink.rs
//! PURPOSE: Receivers for band output fragments.
//! CONTEXT: The processor hands each activation's `BandOutput` to a sink as
//! soon as it is built. `DocumentCollector` keeps them all to form a finite
//! document; a closure sink can stream them onward instead, keeping memory
//! bounded for very large reports.

use layout_ir::BandOutput;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("sink rejected band output: {0}")]
pub struct SinkError(pub String);

pub trait ReportSink {
    fn accept(&mut self, output: BandOutput) -> Result<(), SinkError>;
}

impl<F> ReportSink for F
where
    F: FnMut(BandOutput) -> Result<(), SinkError>,
{
    fn accept(&mut self, output: BandOutput) -> Result<(), SinkError> {
        self(output)
    }
}

/// Collects every fragment, in firing order.
#[derive(Debug, Default)]
pub struct DocumentCollector {
    bands: Vec<BandOutput>,
}

impl DocumentCollector {
    pub fn new() -> Self {
        DocumentCollector::default()
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn into_bands(self) -> Vec<BandOutput> {
        self.bands
    }
}

impl ReportSink for DocumentCollector {
    fn accept(&mut self, output: BandOutput) -> Result<(), SinkError> {
        self.bands.push(output);
        Ok(())
    }
}

/// Counts fragments without keeping them.
#[derive(Debug, Default)]
pub struct CountingSink {
    pub count: u64,
}

impl ReportSink for CountingSink {
    fn accept(&mut self, _output: BandOutput) -> Result<(), SinkError> {
        self.count += 1;
        Ok(())
    }
}
