//! CLI command definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use conclave_domain::Complexity;
use std::path::PathBuf;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable, colored when the terminal supports it
    Text,
    /// Pretty-printed JSON
    Json,
}

/// CLI arguments for conclave
#[derive(Parser, Debug)]
#[command(name = "conclave")]
#[command(author, version, about = "Plan, reach consensus and spawn agents against a planning server")]
#[command(long_about = r#"
Conclave submits an objective to a planning server, follows the agents'
consensus round over the live event stream, and spawns the planned agents
once the round completes.

Configuration files are loaded from (in priority order):
1. --config <path>                      Explicit config file
2. ./conclave.toml or ./.conclave.toml  Project-level config
3. ~/.config/conclave/config.toml       Global config
4. CONCLAVE_<SECTION>__<KEY>            Environment variables

Example:
  conclave plan "Implement OAuth login" --complexity high --execute
  conclave events c-42 --limit 20
  conclave config
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit an objective and follow it through consensus
    Plan(PlanArgs),

    /// Show the stored plan of a coordination
    Status {
        coordination_id: String,
    },

    /// List orchestration sessions
    Sessions,

    /// List spawned agents
    Agents,

    /// List recent coordination events
    Events {
        coordination_id: String,

        /// Maximum number of events to fetch
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show configuration sources and the effective configuration
    Config,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// What the agents should accomplish
    pub objective: String,

    /// Planning depth: low, medium or high
    #[arg(long, default_value = "medium")]
    pub complexity: Complexity,

    /// Strategy tag (e.g. "P∥" parallel, "S→" sequential)
    #[arg(long)]
    pub pattern: Option<String>,

    /// Upper bound on the consensus roster
    #[arg(long, value_name = "N")]
    pub max_agents: Option<u32>,

    /// Free-text context forwarded to the planner
    #[arg(long)]
    pub context: Option<String>,

    /// Spawn the planned agents once consensus completes
    #[arg(long)]
    pub execute: bool,

    /// How long to wait for the consensus round
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    pub wait_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan() {
        let cli = Cli::try_parse_from([
            "conclave",
            "plan",
            "Implement auth",
            "--complexity",
            "high",
            "--max-agents",
            "3",
            "--execute",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.output, OutputFormat::Text);
        let Command::Plan(args) = cli.command else {
            panic!("expected plan command");
        };
        assert_eq!(args.objective, "Implement auth");
        assert_eq!(args.complexity, Complexity::High);
        assert_eq!(args.max_agents, Some(3));
        assert!(args.execute);
        assert_eq!(args.wait_secs, 60);
    }

    #[test]
    fn test_parse_events_with_global_flags() {
        let cli = Cli::try_parse_from([
            "conclave", "events", "c1", "--limit", "5", "--output", "json",
        ])
        .unwrap();

        assert_eq!(cli.output, OutputFormat::Json);
        assert!(matches!(
            cli.command,
            Command::Events { ref coordination_id, limit: Some(5) } if coordination_id == "c1"
        ));
    }

    #[test]
    fn test_rejects_unknown_complexity() {
        let result = Cli::try_parse_from(["conclave", "plan", "x", "--complexity", "extreme"]);
        assert!(result.is_err());
    }
}
