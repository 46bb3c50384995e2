use crate::domain::endpoint::Endpoint;
use crate::domain::order::{Attempt, AttemptOutcome};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct CandidateRow<'a> {
    rank: usize,
    id: &'a str,
    name: &'a str,
    sort_weight: i64,
}

#[derive(Serialize)]
struct AttemptRow<'a> {
    attempt: usize,
    endpoint: &'a str,
    outcome: AttemptOutcome,
}

/// Writes candidate orderings and attempt histories as CSV.
pub struct ReportWriter<W: Write> {
    writer: W,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_candidates(&mut self, candidates: &[Endpoint]) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(&mut self.writer);
        for (rank, endpoint) in candidates.iter().enumerate() {
            wtr.serialize(CandidateRow {
                rank,
                id: endpoint.id.as_str(),
                name: &endpoint.name,
                sort_weight: endpoint.sort_weight,
            })?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_attempts(&mut self, attempts: &[Attempt]) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(&mut self.writer);
        for attempt in attempts {
            wtr.serialize(AttemptRow {
                attempt: attempt.index,
                endpoint: attempt.endpoint.as_str(),
                outcome: attempt.outcome,
            })?;
        }
        wtr.flush()?;
        Ok(())
    }
}
