use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "zlink")]
#[command(version)]
#[command(about = "Declarative Zabbix template links, graphs and dashboards", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $ZLINK_CONFIG_DIR/config.toml)
    #[arg(short, long, global = true, env = "ZLINK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Reconcile items, triggers and discovery rules linked to templates
    #[command(subcommand)]
    Link(LinkCommand),

    /// Manage graphs
    #[command(subcommand)]
    Graph(GraphCommand),

    /// Manage dashboards
    #[command(subcommand)]
    Dashboard(DashboardCommand),

    /// Inspect the configuration file
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Link Commands
// ============================================================================

#[derive(Subcommand)]
pub enum LinkCommand {
    /// Show what apply would delete, without deleting
    Plan {
        /// Only this template_link
        name: Option<String>,
    },

    /// Delete children dropped from the config, then record the result
    Apply(LinkApplyArgs),

    /// Show the children currently on a template
    Show {
        /// Template id
        template_id: String,
    },
}

#[derive(Parser)]
pub struct LinkApplyArgs {
    /// Only this template_link
    pub name: Option<String>,

    /// Don't prompt for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Preview changes without deleting
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum ids per delete call
    #[arg(long, default_value = "100", value_parser = clap::value_parser!(u16).range(1..))]
    pub batch_size: u16,
}

// ============================================================================
// Graph Commands
// ============================================================================

#[derive(Subcommand)]
pub enum GraphCommand {
    /// Create or update declared graphs
    Apply {
        /// Only this graph
        name: Option<String>,
    },

    /// Show a graph as the server reports it
    Show {
        /// Graph id
        id: String,
    },

    /// Delete a declared graph and forget it
    Delete {
        /// Graph name
        name: String,
    },
}

// ============================================================================
// Dashboard Commands
// ============================================================================

#[derive(Subcommand)]
pub enum DashboardCommand {
    /// Create or update declared dashboards
    Apply {
        /// Only this dashboard
        name: Option<String>,
    },

    /// Show a dashboard as the server reports it
    Show {
        /// Dashboard id
        id: String,
    },

    /// Delete a declared dashboard and forget it
    Delete {
        /// Dashboard name
        name: String,
    },
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Summarize the loaded configuration
    Show,

    /// Validate declarations without contacting the server
    Validate,

    /// Print config and state file paths
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_link_apply_args() {
        let cli = Cli::try_parse_from([
            "zlink",
            "-vv",
            "link",
            "apply",
            "web",
            "--yes",
            "--batch-size",
            "25",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Link(LinkCommand::Apply(args)) => {
                assert_eq!(args.name.as_deref(), Some("web"));
                assert!(args.yes);
                assert!(!args.dry_run);
                assert_eq!(args.batch_size, 25);
            }
            _ => panic!("Expected link apply"),
        }
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        assert!(Cli::try_parse_from(["zlink", "link", "apply", "--batch-size", "0"]).is_err());
    }
}
