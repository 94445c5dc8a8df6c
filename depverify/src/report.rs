use std::fmt;

use depverify_core::{Outcome, VerificationResult};

/// Results of one verification session, in input order.
#[derive(Clone, Debug, Default)]
pub struct SessionReport {
    pub results: Vec<VerificationResult>,
}

/// Number of results per outcome kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub trusted: usize,
    pub verified: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl SessionReport {
    pub fn new(results: Vec<VerificationResult>) -> Self {
        Self { results }
    }

    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for result in &self.results {
            match result.outcome {
                Outcome::Trusted(_) => counts.trusted += 1,
                Outcome::Verified(_) => counts.verified += 1,
                Outcome::Failed(_) => counts.failed += 1,
                Outcome::Skipped(_) => counts.skipped += 1,
            }
        }
        counts
    }

    pub fn failures(&self) -> impl Iterator<Item = &VerificationResult> {
        self.results.iter().filter(|result| result.outcome.is_failure())
    }

    /// Whether the build should stop: any artifact failed verification.
    pub fn should_abort(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = self.counts();
        writeln!(
            f,
            "{} artifacts: {} verified, {} trusted, {} skipped, {} failed",
            self.results.len(),
            counts.verified,
            counts.trusted,
            counts.skipped,
            counts.failed
        )?;
        for result in &self.results {
            for notice in &result.notices {
                writeln!(f, "  warning: {}: {notice}", result.artifact)?;
            }
        }
        for result in self.failures() {
            writeln!(f, "  {}:", result.artifact)?;
            for reason in result.outcome.failures() {
                writeln!(f, "    - {reason}")?;
            }
        }
        Ok(())
    }
}
