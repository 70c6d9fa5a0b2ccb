//! 命令行参数定义

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::models::Difficulty;

#[derive(Parser, Debug)]
#[command(
    name = "paper-builder",
    version,
    about = "Browse the question bank you are entitled to and assemble printable papers"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Draft to work on.
    #[arg(long, global = true, default_value = "default", value_name = "NAME")]
    pub draft: String,

    /// Configuration file (TOML). Environment variables are used when omitted.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show debug logs.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List visible questions, marking those already in the paper.
    List(FilterArgs),

    /// List visible study resources.
    Resources,

    /// Show one visible question with its answer.
    Show {
        /// Question id.
        id: String,
    },

    /// Add questions to the paper (already selected ones are skipped).
    Add {
        /// Question ids, added in the given order.
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Remove questions from the paper.
    Remove {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Remove every question from the paper, keeping the header.
    Clear,

    /// Move a selected question (positions are 1-based).
    Move(MoveArgs),

    /// Set the paper header.
    Meta {
        #[arg(long)]
        institute: Option<String>,
        #[arg(long)]
        title: Option<String>,
    },

    /// Print the selected questions; optionally write the interactive HTML list.
    Preview {
        #[command(flatten)]
        filter: FilterArgs,
        /// Write the interactive list to this HTML file.
        #[arg(long, value_name = "FILE")]
        html: Option<PathBuf>,
    },

    /// Export the paper to PDF.
    Export {
        #[command(flatten)]
        filter: FilterArgs,
        /// Override the configured pagination.
        #[arg(long, value_enum)]
        pagination: Option<PaginationArg>,
    },

    /// Manage named drafts.
    Drafts {
        #[command(subcommand)]
        action: DraftsAction,
    },

    /// Administrative catalog tools.
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

/// Display filter, applied on top of what the viewer is entitled to see.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only these subjects (repeatable).
    #[arg(long = "subject", value_name = "SUBJECT")]
    pub subjects: Vec<String>,
    /// Only these chapters (repeatable).
    #[arg(long = "chapter", value_name = "CHAPTER")]
    pub chapters: Vec<String>,
    /// Case-insensitive search in content, subject and chapter.
    #[arg(long, short)]
    pub query: Option<String>,
}

#[derive(Args, Debug)]
pub struct MoveArgs {
    /// Current position.
    pub from: usize,
    /// New position.
    #[arg(
        long,
        required_unless_present_any = ["up", "down"],
        conflicts_with_all = ["up", "down"]
    )]
    pub to: Option<usize>,
    /// Move one step up.
    #[arg(long, conflicts_with = "down")]
    pub up: bool,
    /// Move one step down.
    #[arg(long)]
    pub down: bool,
}

#[derive(Subcommand, Debug)]
pub enum DraftsAction {
    /// List saved drafts.
    List,
    /// Create an empty draft.
    New { name: String },
    /// Delete a draft.
    Discard { name: String },
}

#[derive(Subcommand, Debug)]
pub enum AdminAction {
    /// Unfiltered catalog listing.
    List {
        #[arg(long, short)]
        search: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        /// Only questions assigned to this user reference.
        #[arg(long)]
        user: Option<String>,
    },
    /// Parse pasted question text and import it into the catalog folder.
    Parse(ParseArgs),
}

#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Text file with the pasted questions.
    pub file: PathBuf,
    #[arg(long)]
    pub subject: String,
    #[arg(long)]
    pub chapter: String,
    #[arg(long, value_enum, default_value = "medium")]
    pub difficulty: DifficultyArg,
    /// Prefix for generated question ids.
    #[arg(long, default_value = "bulk")]
    pub prefix: String,
    /// Only report what would be imported.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum DifficultyArg {
    Easy,
    Medium,
    Hard,
}

impl From<DifficultyArg> for Difficulty {
    fn from(arg: DifficultyArg) -> Self {
        match arg {
            DifficultyArg::Easy => Difficulty::Easy,
            DifficultyArg::Medium => Difficulty::Medium,
            DifficultyArg::Hard => Difficulty::Hard,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PaginationArg {
    Single,
    Paged,
}

impl Cli {
    /// 日志里显示的命令名
    pub fn command_name(&self) -> &'static str {
        match &self.command {
            Command::List(_) => "list",
            Command::Resources => "resources",
            Command::Show { .. } => "show",
            Command::Add { .. } => "add",
            Command::Remove { .. } => "remove",
            Command::Clear => "clear",
            Command::Move(_) => "move",
            Command::Meta { .. } => "meta",
            Command::Preview { .. } => "preview",
            Command::Export { .. } => "export",
            Command::Drafts { .. } => "drafts",
            Command::Admin { .. } => "admin",
        }
    }
}
