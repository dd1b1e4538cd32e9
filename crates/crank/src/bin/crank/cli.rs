//! crank cli interface

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; crank ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Enumerate every combination of a promise's iterable variables
    ///
    /// Reads variables as a JSON object from stdin unless any other source
    /// is provided (via --input-*)
    #[command(alias = "it")]
    Iterate(IterateCommand),

    /// Expand the scalar references in a string and print the result
    Expand(ExpandCommand),

    /// Print debug information for development
    Dev(DevCommand),
}

#[derive(Parser, Debug)]
pub struct IterateCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub output: OutputArgs,

    /// Promise text to iterate
    pub promise: String,
}

#[derive(Parser, Debug)]
pub struct ExpandCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    /// Text to expand
    pub text: String,
}

#[derive(Parser, Debug)]
pub struct InputArgs {
    /// Load *.vars.json files from the work directory
    #[clap(short = 'w', long = "input-workdir")]
    pub workdir: bool,

    /// Load a variables file
    #[clap(short = 'f', long = "input-file")]
    pub files: Vec<PathBuf>,

    /// Load *.vars.json files from the given directory
    #[clap(short = 'd', long = "input-dir")]
    pub directories: Vec<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

#[derive(Parser, Debug)]
pub struct DevCommand {
    #[command(subcommand)]
    pub command: DevSubCommand,
}

#[derive(Subcommand, Debug)]
pub enum DevSubCommand {
    /// Prepare a promise text and dump the wheel registry
    Wheels {
        #[clap(flatten)]
        input: InputArgs,

        /// Promise text to prepare
        promise: String,
    },
}
