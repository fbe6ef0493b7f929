//! PlanningController - drives a PlanningState to a terminal stage

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use super::batch::score_batch;
use super::decompose::build_tasks;
use super::state::{PlanOutcome, PlanningStage, PlanningState, RetrieveDecision, Termination, Verification};
use super::PlanningError;
use crate::config::PlanningConfig;
use crate::gateway::{Gateway, Schema};
use crate::prompts::names;
use crate::retriever::{Retriever, SearchQuery};

/// Appended to the search query from the second retrieval on
pub const REFINE_CLAUSE: &str = "\n\nRefine the search using the current plan:\n";

/// Receives a snapshot after every completed iteration and the final outcome
pub trait PlanObserver: Send {
    fn iteration_complete(&mut self, state: &PlanningState);

    fn finished(&mut self, _outcome: &PlanOutcome) {}
}

struct NoopObserver;

impl PlanObserver for NoopObserver {
    fn iteration_complete(&mut self, _state: &PlanningState) {}
}

/// Decide what follows DecideRetrieve; `None` loops back to Summarize
pub fn termination_for(state: &PlanningState, config: &PlanningConfig) -> Option<Termination> {
    if state.iteration >= config.max_iterations {
        Some(Termination::MaxIterations)
    } else if state.verification == Verification::FullySupported && state.rating >= config.acceptance_rating {
        Some(Termination::Accepted)
    } else if state.retrieve_decision == RetrieveDecision::Yes {
        None
    } else {
        Some(Termination::NoFurtherRetrieval)
    }
}

pub struct PlanningController {
    gateway: Arc<dyn Gateway>,
    retriever: Arc<dyn Retriever>,
    config: PlanningConfig,
}

impl PlanningController {
    pub fn new(gateway: Arc<dyn Gateway>, retriever: Arc<dyn Retriever>, config: PlanningConfig) -> Self {
        Self {
            gateway,
            retriever,
            config,
        }
    }

    pub async fn run(&self, requirements: &str) -> Result<PlanOutcome, PlanningError> {
        self.run_observed(requirements, &mut NoopObserver).await
    }

    /// Run the loop to completion, reporting each iteration to `observer`
    pub async fn run_observed(
        &self,
        requirements: &str,
        observer: &mut dyn PlanObserver,
    ) -> Result<PlanOutcome, PlanningError> {
        if requirements.trim().is_empty() {
            return Err(PlanningError::Configuration("requirements are empty".to_string()));
        }
        self.config
            .validate()
            .map_err(|e| PlanningError::Configuration(e.to_string()))?;

        info!(max_iterations = self.config.max_iterations, "Planning run started");
        let mut state = PlanningState::new(requirements);
        let mut termination = None;

        while state.stage != PlanningStage::Terminal {
            debug!(stage = %state.stage, iteration = state.iteration, "run_observed: entering stage");
            state.stage = match state.stage {
                PlanningStage::Summarize => {
                    self.summarize(&mut state).await?;
                    PlanningStage::Retrieve
                }
                PlanningStage::Retrieve => {
                    self.retrieve(&mut state).await?;
                    PlanningStage::Filter
                }
                PlanningStage::Filter => {
                    self.filter(&mut state).await?;
                    PlanningStage::GeneratePlan
                }
                PlanningStage::GeneratePlan => {
                    self.generate_plan(&mut state).await?;
                    PlanningStage::VerifySupport
                }
                PlanningStage::VerifySupport => {
                    self.verify_support(&mut state).await?;
                    PlanningStage::RatePlan
                }
                PlanningStage::RatePlan => {
                    self.rate_plan(&mut state).await?;
                    PlanningStage::DecideRetrieve
                }
                PlanningStage::DecideRetrieve => {
                    self.decide_retrieve(&mut state).await?;
                    termination = termination_for(&state, &self.config);
                    info!(
                        iteration = state.iteration,
                        documents = state.documents.len(),
                        verification = %state.verification,
                        rating = state.rating,
                        ?termination,
                        "Iteration complete"
                    );
                    match termination {
                        Some(reason) => {
                            state.done = reason == Termination::Accepted;
                            state.stage = PlanningStage::Terminal;
                            observer.iteration_complete(&state);
                            PlanningStage::Terminal
                        }
                        None => {
                            observer.iteration_complete(&state);
                            PlanningStage::Summarize
                        }
                    }
                }
                PlanningStage::Terminal => PlanningStage::Terminal,
            };
        }

        let termination = termination.ok_or_else(|| {
            PlanningError::ContractViolation("planning reached a terminal stage without a decision".to_string())
        })?;
        if termination != Termination::Accepted {
            warn!(%termination, rating = state.rating, verification = %state.verification, "Plan not accepted");
        }

        let tasks = build_tasks(self.gateway.as_ref(), &state, self.config.decompose).await?;
        let outcome = PlanOutcome {
            state,
            termination,
            tasks,
        };
        observer.finished(&outcome);
        info!(%termination, tasks = outcome.tasks.len(), "Planning run finished");
        Ok(outcome)
    }

    async fn summarize(&self, state: &mut PlanningState) -> Result<(), PlanningError> {
        let vars = json!({
            "requirements": state.requirements,
            "plan": state.plan,
        });
        state.search_query = self.gateway.complete(names::SUMMARIZE, &vars).await?;
        debug!(query = %state.search_query, "summarize: query produced");
        Ok(())
    }

    async fn retrieve(&self, state: &mut PlanningState) -> Result<(), PlanningError> {
        state.iteration += 1;
        let text = if state.iteration == 1 {
            state.search_query.clone()
        } else {
            format!("{}{}{}", state.search_query, REFINE_CLAUSE, state.plan)
        };
        let query = SearchQuery {
            text,
            top_k: self.config.top_k,
            mode: self.config.search_mode,
            columns: self.config.columns.clone(),
        };

        let chunks = self.retriever.search(&query).await?;
        let returned = chunks.len();
        let inserted = state.merge_chunks(chunks);
        debug!(iteration = state.iteration, returned, inserted, "retrieve: merged");
        Ok(())
    }

    async fn filter(&self, state: &mut PlanningState) -> Result<(), PlanningError> {
        let ids = state.unfiltered_ids();
        if ids.is_empty() {
            debug!("filter: nothing to classify");
            return Ok(());
        }

        let inputs = ids
            .iter()
            .map(|id| {
                json!({
                    "requirements": state.requirements,
                    "search_query": state.search_query,
                    "document": state.documents[id].content,
                })
            })
            .collect();
        let verdicts = score_batch(self.gateway.as_ref(), names::FILTER, Schema::Relevance, inputs)
            .await?
            .into_iter()
            .map(|v| v.into_relevance())
            .collect::<Result<Vec<_>, _>>()?;

        for (id, verdict) in ids.iter().zip(verdicts) {
            if let Some(doc) = state.documents.get_mut(id) {
                doc.filter_score = verdict.into();
            }
        }
        let removed = state.retain_relevant();
        debug!(classified = ids.len(), removed, retained = state.documents.len(), "filter: done");
        Ok(())
    }

    async fn generate_plan(&self, state: &mut PlanningState) -> Result<(), PlanningError> {
        let vars = json!({
            "requirements": state.requirements,
            "documentation": state.documentation(),
            "previous_plan": state.plan,
        });
        state.plan = self.gateway.complete(names::GENERATE, &vars).await?;
        Ok(())
    }

    async fn verify_support(&self, state: &mut PlanningState) -> Result<(), PlanningError> {
        let ids = state.unverified_ids();
        if !ids.is_empty() {
            let inputs = ids
                .iter()
                .map(|id| {
                    json!({
                        "plan": state.plan,
                        "document": state.documents[id].content,
                    })
                })
                .collect();
            let verdicts = score_batch(self.gateway.as_ref(), names::VERIFY, Schema::Verification, inputs)
                .await?
                .into_iter()
                .map(|v| v.into_support())
                .collect::<Result<Vec<_>, _>>()?;

            for (id, verdict) in ids.iter().zip(verdicts) {
                if let Some(doc) = state.documents.get_mut(id) {
                    doc.verify_score = verdict.into();
                }
            }
        }
        state.verification = state.aggregate_verification();
        debug!(verified = ids.len(), verification = %state.verification, "verify_support: done");
        Ok(())
    }

    async fn rate_plan(&self, state: &mut PlanningState) -> Result<(), PlanningError> {
        let vars = json!({
            "requirements": state.requirements,
            "plan": state.plan,
            "verification": state.verification.to_string(),
        });
        state.rating = self
            .gateway
            .complete_structured(names::RATE, &vars, Schema::Rating)
            .await?
            .into_rating()?;
        Ok(())
    }

    async fn decide_retrieve(&self, state: &mut PlanningState) -> Result<(), PlanningError> {
        let vars = json!({
            "requirements": state.requirements,
            "plan": state.plan,
            "verification": state.verification.to_string(),
            "rating": state.rating,
            "document_count": state.documents.len(),
            "iteration": state.iteration,
        });
        state.retrieve_decision = self
            .gateway
            .complete_structured(names::DECIDE, &vars, Schema::Decision)
            .await?
            .into_decision()?
            .into();
        Ok(())
    }
}
