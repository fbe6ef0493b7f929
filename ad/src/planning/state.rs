//! PlanningState - the record threaded through every stage of the loop

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::domain::Task;
use crate::gateway::{Decision, Relevance, Support};
use crate::retriever::Chunk;

/// Text used for GeneratePlan when no documents survived filtering
pub const NO_DOCUMENTATION: &str = "No documentation available.";

/// Position in the planning state machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanningStage {
    #[default]
    Summarize,
    Retrieve,
    Filter,
    GeneratePlan,
    VerifySupport,
    RatePlan,
    DecideRetrieve,
    Terminal,
}

impl fmt::Display for PlanningStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlanningStage::Summarize => "summarize",
            PlanningStage::Retrieve => "retrieve",
            PlanningStage::Filter => "filter",
            PlanningStage::GeneratePlan => "generate-plan",
            PlanningStage::VerifySupport => "verify-support",
            PlanningStage::RatePlan => "rate-plan",
            PlanningStage::DecideRetrieve => "decide-retrieve",
            PlanningStage::Terminal => "terminal",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterScore {
    #[default]
    Unscored,
    Relevant,
    Irrelevant,
}

impl From<Relevance> for FilterScore {
    fn from(r: Relevance) -> Self {
        match r {
            Relevance::Relevant => FilterScore::Relevant,
            Relevance::Irrelevant => FilterScore::Irrelevant,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerifyScore {
    #[default]
    Unscored,
    FullySupported,
    PartiallySupported,
    NoSupport,
}

impl VerifyScore {
    pub fn support(&self) -> Option<Support> {
        match self {
            VerifyScore::Unscored => None,
            VerifyScore::FullySupported => Some(Support::FullySupported),
            VerifyScore::PartiallySupported => Some(Support::PartiallySupported),
            VerifyScore::NoSupport => Some(Support::NoSupport),
        }
    }
}

impl From<Support> for VerifyScore {
    fn from(s: Support) -> Self {
        match s {
            Support::FullySupported => VerifyScore::FullySupported,
            Support::PartiallySupported => VerifyScore::PartiallySupported,
            Support::NoSupport => VerifyScore::NoSupport,
        }
    }
}

/// Aggregate verification of the current plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verification {
    #[default]
    Unknown,
    FullySupported,
    PartiallySupported,
    NoSupport,
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verification::Unknown => "unknown",
            Verification::FullySupported => "fully-supported",
            Verification::PartiallySupported => "partially-supported",
            Verification::NoSupport => "no-support",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetrieveDecision {
    #[default]
    Unknown,
    Yes,
    No,
}

impl From<Decision> for RetrieveDecision {
    fn from(d: Decision) -> Self {
        match d {
            Decision::Yes => RetrieveDecision::Yes,
            Decision::No => RetrieveDecision::No,
        }
    }
}

/// Combine per-document verdicts into one
///
/// Any `no-support` makes the plan partially supported; it is fully supported
/// only when there is at least one verdict and all are `fully-supported`.
pub fn aggregate_support(verdicts: impl IntoIterator<Item = Support>) -> Verification {
    let mut seen = 0usize;
    let mut all_full = true;
    for verdict in verdicts {
        seen += 1;
        match verdict {
            Support::NoSupport => return Verification::PartiallySupported,
            Support::PartiallySupported => all_full = false,
            Support::FullySupported => {}
        }
    }
    if seen > 0 && all_full {
        Verification::FullySupported
    } else {
        Verification::PartiallySupported
    }
}

/// A retrieved document and its scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub content: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub filter_score: FilterScore,
    pub verify_score: VerifyScore,
}

impl From<Chunk> for DocumentRecord {
    fn from(chunk: Chunk) -> Self {
        Self {
            id: chunk.id,
            content: chunk.content,
            metadata: chunk.metadata,
            filter_score: FilterScore::Unscored,
            verify_score: VerifyScore::Unscored,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanningState {
    pub requirements: String,
    pub search_query: String,
    /// Insertion order is retrieval order
    pub documents: IndexMap<String, DocumentRecord>,
    pub plan: String,
    pub verification: Verification,
    /// 0 until the plan is rated, then 1..=5
    pub rating: u8,
    pub retrieve_decision: RetrieveDecision,
    pub iteration: u32,
    pub done: bool,
    pub stage: PlanningStage,
}

impl PlanningState {
    pub fn new(requirements: impl Into<String>) -> Self {
        Self {
            requirements: requirements.into(),
            ..Default::default()
        }
    }

    /// Insert chunks whose ids are not yet known; returns how many were added
    ///
    /// Existing records keep their content and scores. Within one batch the
    /// first occurrence of an id wins.
    pub fn merge_chunks(&mut self, chunks: impl IntoIterator<Item = Chunk>) -> usize {
        let mut inserted = 0;
        for chunk in chunks {
            if !self.documents.contains_key(&chunk.id) {
                self.documents.insert(chunk.id.clone(), chunk.into());
                inserted += 1;
            }
        }
        inserted
    }

    /// Ids awaiting relevance classification, in retrieval order
    pub fn unfiltered_ids(&self) -> Vec<String> {
        self.documents
            .values()
            .filter(|d| d.filter_score == FilterScore::Unscored)
            .map(|d| d.id.clone())
            .collect()
    }

    /// Ids awaiting support verification, in retrieval order
    pub fn unverified_ids(&self) -> Vec<String> {
        self.documents
            .values()
            .filter(|d| d.verify_score == VerifyScore::Unscored)
            .map(|d| d.id.clone())
            .collect()
    }

    /// Drop every document not marked relevant; returns how many were removed
    pub fn retain_relevant(&mut self) -> usize {
        let before = self.documents.len();
        // shift-based retain keeps insertion order
        self.documents.retain(|_, d| d.filter_score == FilterScore::Relevant);
        before - self.documents.len()
    }

    /// Retained document texts joined by a blank line
    pub fn documentation(&self) -> String {
        if self.documents.is_empty() {
            return NO_DOCUMENTATION.to_string();
        }
        self.documents
            .values()
            .map(|d| d.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Aggregate verification over every scored document
    pub fn aggregate_verification(&self) -> Verification {
        aggregate_support(self.documents.values().filter_map(|d| d.verify_score.support()))
    }

    pub fn document_ids(&self) -> Vec<String> {
        self.documents.keys().cloned().collect()
    }
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Termination {
    /// Iteration bound reached
    MaxIterations,
    /// Fully supported and rated at or above the acceptance bar
    Accepted,
    /// The model declined further retrieval before the bar was met
    NoFurtherRetrieval,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Termination::MaxIterations => "max-iterations",
            Termination::Accepted => "accepted",
            Termination::NoFurtherRetrieval => "no-further-retrieval",
        };
        f.write_str(name)
    }
}

/// Result of a complete planning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanOutcome {
    pub state: PlanningState,
    pub termination: Termination,
    pub tasks: Vec<Task>,
}
