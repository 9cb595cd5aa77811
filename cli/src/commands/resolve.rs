use std::path::PathBuf;

use clap::Args;
use spotter_core::config::ResolutionConfig;
use spotter_core::error::ErrorBody;
use spotter_core::pipeline::{EpisodeRecorder, FeedbackEngine, FeedbackTurn};

use crate::episodes::{DryRunRecorder, JsonlEpisodeRecorder};
use crate::scenario::Scenario;
use crate::util::{default_episodes_path, exit_error, exit_with, print_json, read_json_from_file};

#[derive(Args)]
pub struct ScenarioArgs {
    /// Scenario JSON file (use '-' for stdin)
    #[arg(long, short = 's')]
    pub scenario: String,
}

#[derive(Args)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,

    /// Append resolved episodes to this JSON-lines file
    /// (default: <data dir>/spotter/episodes.jsonl)
    #[arg(long, conflicts_with = "dry_run")]
    pub episodes: Option<PathBuf>,

    /// Resolve without persisting the episode
    #[arg(long)]
    pub dry_run: bool,

    /// Include detection, signals and score breakdowns in the output
    #[arg(long)]
    pub diagnostics: bool,
}

pub fn run(config: ResolutionConfig, args: ResolveArgs, raw: bool) -> i32 {
    let scenario = load_scenario(&args.scenario);
    let recorder: Box<dyn EpisodeRecorder> = if args.dry_run {
        Box::new(DryRunRecorder)
    } else {
        Box::new(JsonlEpisodeRecorder::new(
            args.episodes.unwrap_or_else(default_episodes_path),
        ))
    };

    let turn = run_scenario(config, &scenario, recorder.as_ref());
    if args.diagnostics {
        print_json(&turn, raw)
    } else {
        print_json(&turn.outcome, raw)
    }
}

pub(crate) fn load_scenario(args: &ScenarioArgs) -> Scenario {
    read_json_from_file(&args.scenario)
        .and_then(Scenario::from_value)
        .unwrap_or_else(|e| {
            exit_error(
                &e,
                Some("Provide a scenario with user_id, chat_id, message and candidates."),
            )
        })
}

pub(crate) fn run_scenario(
    config: ResolutionConfig,
    scenario: &Scenario,
    recorder: &dyn EpisodeRecorder,
) -> FeedbackTurn {
    let extractor = scenario.recorded_extractor();
    let mut engine = FeedbackEngine::new(config, scenario, scenario, recorder);
    if let Some(extractor) = extractor.as_ref() {
        engine = engine.with_extractor(extractor);
    }

    engine
        .run_turn(
            &scenario.user_id,
            &scenario.chat_id,
            &scenario.message,
            scenario.evaluation_time(),
        )
        .unwrap_or_else(|err| {
            exit_with(
                &ErrorBody::from(&err)
                    .with_hint("Can't process this feedback right now; nothing was recorded."),
            )
        })
}
