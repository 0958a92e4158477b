//! Step progress on standard error.

use dockyard_core::{PipelineObserver, PipelineState, StepOutcome};

/// Prints one line per finished step. Child output goes to stdout, so
/// progress stays on stderr.
pub struct ProgressPrinter;

impl PipelineObserver for ProgressPrinter {
    fn on_state(&self, pipeline: &str, state: PipelineState) {
        if let PipelineState::Failed { step } = state {
            eprintln!("✗ {} stopped at step {}", pipeline, step + 1);
        }
    }

    fn on_step(&self, label: &str, outcome: Option<StepOutcome>) {
        match outcome {
            Some(StepOutcome::Done) => eprintln!("✓ {}", label),
            Some(StepOutcome::Provisioned(outcome)) => eprintln!("✓ {} ({})", label, outcome),
            None => eprintln!("✗ {}", label),
        }
    }
}
