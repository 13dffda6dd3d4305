use clap::Parser;
use std::path::PathBuf;

use crate::logging::LogLevel;
use crate::orchestrator::DEFAULT_BUILDFILE;

#[derive(Debug, Parser)]
#[command(
    author,
    name = "mason",
    about = "Mason: a declarative, incremental build tool.",
    after_help = "Rules are run in the order given; with no rules, the Buildfile's \
                  `default_rule` is run."
)]
#[command(version)]
pub struct Cli {
    /// Path to the build description file (conventionally named `Buildfile`).
    #[arg(value_name = "SRC_FILE", default_value = DEFAULT_BUILDFILE)]
    pub src_file: PathBuf,

    /// Rules to run, in order.
    #[arg(value_name = "RULE")]
    pub rules: Vec<String>,

    #[clap(flatten)]
    pub global_options: GlobalConfigArgs,
}

/// All configuration options that can be passed "globally".
#[derive(Debug, Default, Clone, clap::Args)]
pub struct GlobalConfigArgs {
    #[clap(flatten)]
    log_level_args: LogLevelArgs,
}

impl GlobalConfigArgs {
    pub fn log_level(&self) -> LogLevel {
        LogLevel::from(&self.log_level_args)
    }
}

#[derive(Debug, Default, Clone, clap::Args)]
pub struct LogLevelArgs {
    /// Enable verbose logging.
    #[arg(
        short,
        long,
        global = true,
        group = "verbosity",
        help_heading = "Log levels"
    )]
    pub verbose: bool,
    /// Print spawned commands, but nothing else.
    #[arg(
        short,
        long,
        global = true,
        group = "verbosity",
        help_heading = "Log levels"
    )]
    pub quiet: bool,
    /// Disable all logging (but still exit with status code "1" upon a failed build).
    #[arg(
        short,
        long,
        global = true,
        group = "verbosity",
        help_heading = "Log levels"
    )]
    pub silent: bool,
}

impl From<&LogLevelArgs> for LogLevel {
    fn from(args: &LogLevelArgs) -> Self {
        if args.silent {
            Self::Silent
        } else if args.quiet {
            Self::Quiet
        } else if args.verbose {
            Self::Verbose
        } else {
            Self::Default
        }
    }
}
