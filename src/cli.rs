use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "hebgb-study",
    version,
    about = "Log in to the Hebei cadre training portal and play through enrolled courses"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Courses to learn: `all`, `3`, `1,4-6`, `5-2`. Prompts when omitted.
    #[arg(short, long, value_name = "EXPR")]
    pub select: Option<String>,

    /// Seed for the pauses between courses.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Credentials file (JSON array with `uname` and `upass`).
    #[arg(short, long, value_name = "PATH", global = true)]
    pub credentials: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and print the enrolled courses.
    Courses,
    /// Print configuration paths and whether a run is in progress.
    Status,
    /// Check credentials and the external tools the run depends on.
    Doctor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_flow_takes_selection_and_seed() {
        let cli = Cli::parse_from(["hebgb-study", "--select", "1,3-5", "--seed", "9"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.select.as_deref(), Some("1,3-5"));
        assert_eq!(cli.seed, Some(9));
    }

    #[test]
    fn subcommand_accepts_global_credentials() {
        let cli = Cli::parse_from(["hebgb-study", "courses", "--credentials", "me.json"]);
        assert!(matches!(cli.command, Some(Commands::Courses)));
        assert_eq!(cli.credentials, Some(PathBuf::from("me.json")));
    }
}
