//! Interactive step selection when no subcommand is given.

use dialoguer::{Input, Select};

use crime_grid_cli_utils::MultiProgress;
use crime_grid_pipeline::PipelineConfig;

/// Steps offered at the prompt.
enum Step {
    Run,
    BuildGrid,
    Aggregate,
}

impl Step {
    const ALL: &[Self] = &[Self::Run, Self::BuildGrid, Self::Aggregate];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Run => "Run full pipeline",
            Self::BuildGrid => "Build hex grid",
            Self::Aggregate => "Aggregate onto saved grid",
        }
    }

    const fn builds_grid(&self) -> bool {
        matches!(self, Self::Run | Self::BuildGrid)
    }

    const fn aggregates(&self) -> bool {
        matches!(self, Self::Run | Self::Aggregate)
    }
}

/// Prompts for a step and its parameters, then runs it.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected step fails.
pub fn run(
    mut config: PipelineConfig,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Crime Grid Pipeline");
    println!();

    let labels: Vec<&str> = Step::ALL.iter().map(Step::label).collect();
    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;
    let step = &Step::ALL[idx];

    if step.builds_grid() {
        config.hex_diameter = Input::new()
            .with_prompt("Hex diameter")
            .default(config.hex_diameter)
            .validate_with(|value: &f64| {
                if value.is_finite() && *value > 0.0 {
                    Ok(())
                } else {
                    Err("must be a positive number")
                }
            })
            .interact_text()?;
    }
    if step.aggregates() {
        config.batch_size = Input::new()
            .with_prompt("Batch size")
            .default(config.batch_size)
            .validate_with(|value: &usize| {
                if *value > 0 {
                    Ok(())
                } else {
                    Err("must be at least 1")
                }
            })
            .interact_text()?;
    }

    log::debug!("Running \"{}\" with {config:?}", step.label());

    match step {
        Step::Run => crate::run(&config, multi),
        Step::BuildGrid => crate::build_grid(&config),
        Step::Aggregate => crate::aggregate(&config, multi),
    }
}
