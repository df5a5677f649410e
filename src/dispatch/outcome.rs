use std::fmt;

use crate::targets::TargetId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    Succeeded { id: Option<String> },
    Failed(String),
    Skipped(String),
}

impl OutcomeStatus {
    pub fn failed(reason: impl Into<String>) -> Self {
        OutcomeStatus::Failed(reason.into())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Succeeded { .. } => "succeeded",
            OutcomeStatus::Failed(_) => "failed",
            OutcomeStatus::Skipped(_) => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub target: TargetId,
    pub status: OutcomeStatus,
}

/// Outcomes of one dispatch, in target configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub outcomes: Vec<DispatchOutcome>,
}

impl DispatchSummary {
    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Succeeded { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Skipped(_)))
    }

    pub fn status_of(&self, target: TargetId) -> Option<&OutcomeStatus> {
        self.outcomes.iter().find(|o| o.target == target).map(|o| &o.status)
    }

    fn count(&self, predicate: impl Fn(&OutcomeStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }
}

/// Human readable report sent back to the submitter.
impl fmt::Display for DispatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.outcomes.is_empty() {
            return write!(f, "Nothing was published: no target accepts this kind of message.");
        }
        write!(
            f,
            "Published to {} of {} targets ({} failed, {} skipped)",
            self.succeeded(),
            self.outcomes.len(),
            self.failed(),
            self.skipped()
        )?;
        for outcome in &self.outcomes {
            let label = outcome.target.label();
            match &outcome.status {
                OutcomeStatus::Succeeded { id: Some(id) } => write!(f, "\n✅ {}: posted ({})", label, id)?,
                OutcomeStatus::Succeeded { id: None } => write!(f, "\n✅ {}: posted", label)?,
                OutcomeStatus::Failed(reason) => write!(f, "\n❌ {}: {}", label, reason)?,
                OutcomeStatus::Skipped(reason) => write!(f, "\n⏭ {}: skipped, {}", label, reason)?,
            }
        }
        Ok(())
    }
}
