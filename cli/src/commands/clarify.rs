use clap::Args;
use serde_json::json;
use spotter_core::clarification::{pick_clarification_choice, render_clarification_prompt};
use spotter_core::config::ResolutionConfig;
use spotter_core::pipeline::FeedbackTurnOutcome;

use super::resolve::{ScenarioArgs, load_scenario, run_scenario};
use crate::episodes::DryRunRecorder;
use crate::util::{exit_error, print_json};

#[derive(Args)]
pub struct ClarifyArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,

    /// The user's answer to the clarification prompt ("2", "the push one")
    #[arg(long)]
    pub reply: Option<String>,
}

/// Show the clarification prompt for a scenario, or map a reply to it back
/// to a routine. Never records an episode.
pub fn run(config: ResolutionConfig, args: ClarifyArgs, raw: bool) -> i32 {
    let scenario = load_scenario(&args.scenario);
    let turn = run_scenario(config, &scenario, &DryRunRecorder);

    let FeedbackTurnOutcome::Clarification { candidates } = turn.outcome else {
        return print_json(
            &json!({
                "clarification_needed": false,
                "outcome": turn.outcome,
            }),
            raw,
        );
    };

    match args.reply.as_deref() {
        None => print_json(
            &json!({
                "clarification_needed": true,
                "prompt": render_clarification_prompt(&candidates),
                "candidates": candidates,
            }),
            raw,
        ),
        Some(reply) => match pick_clarification_choice(reply, &candidates) {
            Some(routine_id) => print_json(&json!({ "routine_id": routine_id }), raw),
            None => exit_error(
                &format!("Reply '{reply}' does not pick one of the offered routines"),
                Some("Answer with the routine's number or a distinctive part of its title."),
            ),
        },
    }
}
