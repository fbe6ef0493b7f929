//! Turn an accepted plan into worker tasks

use serde_json::json;
use tracing::{debug, info};

use super::{PlanningError, PlanningState};
use crate::domain::Task;
use crate::gateway::{Gateway, Schema};
use crate::prompts::names;

/// Build the tasks for the final plan of `state`
///
/// With `decompose` the model splits the plan; otherwise a single task carries
/// the whole plan with one step per non-empty line.
pub async fn build_tasks(
    gateway: &dyn Gateway,
    state: &PlanningState,
    decompose: bool,
) -> Result<Vec<Task>, PlanningError> {
    let documentation = state.documentation();

    if !decompose {
        debug!("build_tasks: decomposition disabled");
        return Ok(vec![single_task(&state.plan, documentation)]);
    }

    let vars = json!({
        "requirements": state.requirements,
        "plan": state.plan,
    });
    let drafts = gateway
        .complete_structured(names::DECOMPOSE, &vars, Schema::TaskList)
        .await?
        .into_tasks()?;

    let tasks: Vec<Task> = drafts
        .into_iter()
        .map(|draft| Task::new(draft.objective.trim(), draft.steps, documentation.clone()))
        .collect();
    info!(count = tasks.len(), "Plan decomposed into tasks");
    Ok(tasks)
}

fn single_task(plan: &str, documentation: String) -> Task {
    let steps = plan
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();
    Task::new(plan.trim(), steps, documentation)
}
