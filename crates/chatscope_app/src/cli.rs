use std::path::PathBuf;

use chatscope_core::{DataKind, FilterConfig, SearchQuery, DEFAULT_FUZZY_CUTOFF};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "chatscope")]
#[command(about = "Upload chat exports, group senders and run chat analyses")]
pub(crate) struct Cli {
    /// Configuration file (defaults to ./chatscope.ron)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Backend API root, e.g. http://localhost:5328/api
    #[arg(long, global = true)]
    pub base_url: Option<String>,
    /// Session cookie (`name=value`) printed by an earlier `run`
    #[arg(long, global = true)]
    pub session: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Upload, filter and analyze chat exports, then write every result as JSON
    Run(RunArgs),
    /// Show the status of one backend task
    Status {
        task_id: String,
        /// Decode the result as an analysis report
        #[arg(long)]
        analysis: bool,
    },
    /// Ask the backend to cancel a task
    Cancel { task_id: String },
    /// List the tasks of the current session
    Tasks,
    /// Download session data from the backend
    Fetch {
        #[arg(value_enum)]
        kind: DataArg,
        /// Output directory (defaults to the configured one)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Drop every task and all data of the current session
    Clear,
    /// Search the filtered messages of the current session
    Search(SearchArgs),
    /// Validate an exported JSON file and summarize it
    Inspect {
        file: PathBuf,
        /// Data kind; guessed from the file name when omitted
        #[arg(long, value_enum)]
        kind: Option<DataArg>,
    },
}

#[derive(Debug, clap::Args)]
pub(crate) struct RunArgs {
    /// Chat exports to upload (.json, .html or .zip)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    /// Sender group as `Group=Sender1,Sender2`; repeatable
    #[arg(long = "group", value_parser = parse_group)]
    pub groups: Vec<GroupArg>,
    /// Sender whose messages are dropped; repeatable
    #[arg(long = "remove")]
    pub removed: Vec<String>,
    /// Label for senders without a group
    #[arg(long)]
    pub other_label: Option<String>,
    /// Analysis module to run; repeatable, all modules when omitted
    #[arg(long = "module")]
    pub modules: Vec<String>,
    /// Print a per-module summary of the report
    #[arg(long)]
    pub dashboard: bool,
    /// Keyword to count per sender once filtering is done; repeatable
    #[arg(long = "keyword")]
    pub keywords: Vec<String>,
}

impl RunArgs {
    pub(crate) fn modules(&self) -> Option<Vec<String>> {
        if self.modules.is_empty() {
            None
        } else {
            Some(self.modules.clone())
        }
    }

    /// Filter settings described by the flags, before any sender is known.
    pub(crate) fn filter_config(&self) -> FilterConfig {
        let mut config = FilterConfig::default();
        for group in &self.groups {
            for sender in &group.senders {
                config.assign(sender, &group.name);
            }
        }
        for sender in &self.removed {
            config.mark_removed(sender);
        }
        if let Some(label) = &self.other_label {
            config.set_other_label(label);
        }
        config
    }
}

#[derive(Debug, clap::Args)]
pub(crate) struct SearchArgs {
    /// Keyword to count, or phrase to look for with --fuzzy
    pub text: String,
    /// Rank messages by similarity instead of counting a keyword
    #[arg(long)]
    pub fuzzy: bool,
    /// Minimum similarity in percent for --fuzzy
    #[arg(
        long,
        default_value_t = DEFAULT_FUZZY_CUTOFF,
        value_parser = clap::value_parser!(u8).range(0..=100)
    )]
    pub cutoff: u8,
}

impl SearchArgs {
    pub(crate) fn query(&self) -> SearchQuery {
        if self.fuzzy {
            SearchQuery::Fuzzy {
                query: self.text.clone(),
                cutoff: self.cutoff,
            }
        } else {
            SearchQuery::Keyword(self.text.clone())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GroupArg {
    pub name: String,
    pub senders: Vec<String>,
}

pub(crate) fn parse_group(raw: &str) -> Result<GroupArg, String> {
    let (name, senders) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected Group=Sender1,Sender2, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("group name is empty".to_string());
    }
    let senders: Vec<String> = senders
        .split(',')
        .map(str::trim)
        .filter(|sender| !sender.is_empty())
        .map(str::to_string)
        .collect();
    if senders.is_empty() {
        return Err(format!("group `{name}` has no senders"));
    }
    Ok(GroupArg {
        name: name.to_string(),
        senders,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum DataArg {
    Processed,
    Filtered,
    Report,
}

impl From<DataArg> for DataKind {
    fn from(arg: DataArg) -> Self {
        match arg {
            DataArg::Processed => DataKind::Processed,
            DataArg::Filtered => DataKind::Filtered,
            DataArg::Report => DataKind::Report,
        }
    }
}
