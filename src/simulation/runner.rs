use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use strum::{Display, EnumString};
use tokio::task::JoinSet;
use tracing::{error, info};

use super::{SimulationInput, SimulationResult, YieldSimulator};
use crate::devices::DeviceModel;
use crate::domain::ArrayConfig;
use crate::error::PipelineError;

/// What to do when one array fails.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailurePolicy {
    /// The first failure aborts the run
    #[default]
    Abort,
    /// Failed arrays are reported and left out of the results
    Isolate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayFailure {
    pub name: String,
    pub reason: String,
}

/// Results of a multi-array run, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub results: Vec<SimulationResult>,
    pub failures: Vec<ArrayFailure>,
}

/// Simulate every array concurrently over the same input.
///
/// Each array runs on the blocking pool; the input and device model are
/// shared read-only. A panicking array counts as a failed array.
pub async fn run_arrays(
    arrays: &[ArrayConfig],
    input: Arc<SimulationInput>,
    device: Arc<dyn DeviceModel>,
    policy: FailurePolicy,
) -> Result<RunOutcome, PipelineError> {
    let mut tasks = JoinSet::new();
    for (index, array) in arrays.iter().cloned().enumerate() {
        let input = Arc::clone(&input);
        let device = Arc::clone(&device);
        tasks.spawn_blocking(move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                YieldSimulator::new(&array, device.as_ref(), &input).run()
            }));
            let outcome = match outcome {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(e)) => Err(e.to_string()),
                Err(panic) => Err(panic_message(panic)),
            };
            (index, array.name().to_string(), outcome)
        });
    }

    let mut slots: Vec<Option<SimulationResult>> = vec![None; arrays.len()];
    let mut failures = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        let (index, name, outcome) = joined.map_err(|e| PipelineError::Task(e.to_string()))?;
        match outcome {
            Ok(result) => slots[index] = Some(result),
            Err(reason) => {
                error!(array = %name, %reason, "array simulation failed");
                if policy == FailurePolicy::Abort {
                    tasks.abort_all();
                    return Err(PipelineError::ArrayFailed { name, reason });
                }
                failures.push((index, ArrayFailure { name, reason }));
            }
        }
    }

    failures.sort_by_key(|(index, _)| *index);
    let outcome = RunOutcome {
        results: slots.into_iter().flatten().collect(),
        failures: failures.into_iter().map(|(_, f)| f).collect(),
    };
    info!(
        succeeded = outcome.results.len(),
        failed = outcome.failures.len(),
        "array run finished"
    );
    Ok(outcome)
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
