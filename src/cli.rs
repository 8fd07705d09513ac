//! Command-line interface.
//!
//! Argument parsing only; the commands themselves live in `lib.rs`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Sort scanned documents into an organised directory tree.
#[derive(Parser, Debug)]
#[command(name = "docsort")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file. Defaults to config.json in the working directory.
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Process every document under the source directory.
    Run,

    /// Create the database and the vector collection.
    Init,

    /// Print the current directory tree of the organised root.
    Tree,

    /// Extract one file and print its languages and identity. Writes nothing.
    Detect {
        /// File to extract.
        file: PathBuf,
    },
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_globals() {
        let cli = Cli::try_parse_from(["docsort", "run", "--config", "c.json", "-v"]).unwrap();
        assert_eq!(cli.command, Commands::Run);
        assert_eq!(cli.config, Some(PathBuf::from("c.json")));
        assert!(cli.verbose);
    }

    #[test]
    fn detect_needs_file() {
        assert!(Cli::try_parse_from(["docsort", "detect"]).is_err());
        let cli = Cli::try_parse_from(["docsort", "detect", "scan.pdf"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Detect {
                file: PathBuf::from("scan.pdf")
            }
        );
    }

    #[test]
    fn subcommand_required() {
        assert!(Cli::try_parse_from(["docsort"]).is_err());
    }

    #[test]
    fn verify_command() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
