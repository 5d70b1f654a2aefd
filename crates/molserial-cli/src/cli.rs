use clap::{Args, Parser, Subcommand};
use molserial::io::format::MolFormat;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "molserial - streaming readers and writers for small-molecule structure files.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a molecule file between the supported formats, normalizing
    /// records and merging adjacent multiconformer duplicates on the way.
    Convert(ConvertArgs),
}

/// Arguments for the `convert` subcommand.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Path to the input molecule file (.sdf, .smi, .bin, optionally .gz).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path for the output molecule file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Input format, overriding the file suffix (sdf, smi, bin).
    #[arg(long, value_name = "FORMAT")]
    pub in_format: Option<MolFormat>,

    /// Output format, overriding the file suffix (sdf, smi, bin).
    #[arg(long, value_name = "FORMAT")]
    pub out_format: Option<MolFormat>,

    /// Keep explicit hydrogens instead of folding them into heavy atoms.
    #[arg(long)]
    pub keep_hydrogens: bool,

    /// Keep counter-ion fragments instead of retaining only the largest one.
    #[arg(long)]
    pub keep_salts: bool,

    /// Drop stereochemistry annotations from the output.
    #[arg(long)]
    pub no_stereo: bool,

    /// Skip records that fail to parse instead of aborting the conversion.
    #[arg(long)]
    pub skip_bad_records: bool,
}
