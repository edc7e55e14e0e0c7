use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "ticketeval",
    version,
    about = "Ground-truth construction and LLM judge evaluation for support-ticket patterns"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    BuildGroundTruth(BuildGroundTruthArgs),
    Evaluate(EvaluateArgs),
    Summarize(SummarizeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct BuildGroundTruthArgs {
    #[arg(long, default_value = "data/poc")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub patterns_csv: PathBuf,

    #[arg(long)]
    pub universe_csv: PathBuf,

    #[arg(long)]
    pub overrides: Option<PathBuf>,

    #[arg(long)]
    pub pattern_mapping: Option<PathBuf>,

    #[arg(long, default_value = crate::model::DEFAULT_TICKET_ID_PATTERN)]
    pub ticket_id_pattern: String,

    #[arg(long)]
    pub out_csv: Option<PathBuf>,

    #[arg(long)]
    pub out_json: Option<PathBuf>,

    #[arg(long, default_value_t = 20)]
    pub show_unmapped: usize,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum EvalMode {
    RecallOnly,
    Full,
    Both,
}

impl EvalMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RecallOnly => "recall-only",
            Self::Full => "full",
            Self::Both => "both",
        }
    }

    pub fn includes_recall(self) -> bool {
        matches!(self, Self::RecallOnly | Self::Both)
    }

    pub fn includes_full(self) -> bool {
        matches!(self, Self::Full | Self::Both)
    }
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[arg(long, default_value = "data/poc")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub results_dir: PathBuf,

    #[arg(long)]
    pub ground_truth: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = EvalMode::Both)]
    pub mode: EvalMode,

    #[arg(long, default_value_t = 50)]
    pub show_misses: usize,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SummarizeArgs {
    #[arg(long, default_value = "data/poc")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub results_dir: PathBuf,

    #[arg(long)]
    pub ground_truth: Option<PathBuf>,

    #[arg(long)]
    pub universe_csv: Option<PathBuf>,

    #[arg(long)]
    pub out: Option<PathBuf>,
}
