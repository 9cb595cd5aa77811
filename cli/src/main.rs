use clap::{Parser, Subcommand};

mod commands;
mod episodes;
mod scenario;
mod util;

use commands::clarify::ClarifyArgs;
use commands::inspect::MessageArgs;
use commands::resolve::ResolveArgs;
use util::{exit_error, init_tracing, load_config};

#[derive(Parser)]
#[command(
    name = "spotter",
    version,
    about = "Spotter CLI: resolve training feedback to the routine it is about"
)]
struct Cli {
    /// Resolution config JSON (missing fields use defaults)
    #[arg(long, global = true, env = "SPOTTER_CONFIG")]
    config: Option<String>,

    /// Skip pretty-printing (raw JSON for piping)
    #[arg(long, global = true)]
    raw: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full feedback turn over a scenario file
    Resolve(ResolveArgs),
    /// Show or answer the clarification prompt for a scenario
    Clarify(ClarifyArgs),
    /// Extract target signals from a message (keyword rules)
    Signals(MessageArgs),
    /// Detect feedback and classify its outcome (keyword rules)
    Classify(MessageArgs),
}

fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).unwrap_or_else(|e| {
        exit_error(
            &e,
            Some("Pass --config with a JSON object of resolution settings, or omit it."),
        )
    });

    let code = match cli.command {
        Commands::Resolve(args) => commands::resolve::run(config, args, cli.raw),
        Commands::Clarify(args) => commands::clarify::run(config, args, cli.raw),
        Commands::Signals(args) => commands::inspect::signals(args, cli.raw),
        Commands::Classify(args) => commands::inspect::classify(&config, args, cli.raw),
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Commands};

    #[test]
    fn resolve_accepts_scenario_and_flags() {
        let cli = Cli::try_parse_from([
            "spotter",
            "resolve",
            "--scenario",
            "turn.json",
            "--dry-run",
            "--diagnostics",
            "--raw",
        ])
        .unwrap();
        assert!(cli.raw);
        let Commands::Resolve(args) = cli.command else {
            panic!("expected resolve");
        };
        assert_eq!(args.scenario.scenario, "turn.json");
        assert!(args.dry_run);
        assert!(args.diagnostics);
    }

    #[test]
    fn dry_run_conflicts_with_episode_path() {
        let parsed = Cli::try_parse_from([
            "spotter",
            "resolve",
            "-s",
            "-",
            "--dry-run",
            "--episodes",
            "/tmp/episodes.jsonl",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn clarify_takes_optional_reply() {
        let cli =
            Cli::try_parse_from(["spotter", "clarify", "-s", "turn.json", "--reply", "2"]).unwrap();
        let Commands::Clarify(args) = cli.command else {
            panic!("expected clarify");
        };
        assert_eq!(args.reply.as_deref(), Some("2"));
    }
}
