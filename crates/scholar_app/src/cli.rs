use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use scholar_core::{JobKind, Variant};

use crate::config::SettingsOverrides;

#[derive(Parser, Debug)]
#[command(name = "scholar")]
#[command(about = "Read, translate and discuss papers with the scholar server")]
pub struct Cli {
    /// RON configuration file.
    #[arg(long, default_value = "scholar.ron")]
    pub config: PathBuf,
    /// Server base url, overrides the configuration file.
    #[arg(long)]
    pub server: Option<String>,
    /// Scope workspaces to this user.
    #[arg(long)]
    pub user: Option<String>,
    /// Directory holding the remembered client state.
    #[arg(long)]
    pub state_dir: Option<PathBuf>,
    /// Also log to the terminal.
    #[arg(short, long)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            base_url: self.server.clone(),
            username: self.user.clone(),
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List workspaces.
    Workspaces,
    /// Show an artifact of a workspace (the last one used when omitted).
    Open {
        workspace: Option<String>,
        #[arg(long, value_enum, default_value_t = VariantArg::Origin)]
        variant: VariantArg,
    },
    /// Convert a PDF file or URL into a new workspace.
    Ingest { source: String },
    /// Translate the document of a workspace.
    Translate { workspace: Option<String> },
    /// Explain the document of a workspace.
    Explain { workspace: Option<String> },
    /// Turn the document of a workspace into a thread.
    Thread { workspace: Option<String> },
    /// Replace an artifact with the contents of a local file.
    Save {
        #[arg(value_enum)]
        variant: VariantArg,
        file: PathBuf,
        #[arg(long)]
        workspace: Option<String>,
    },
    /// List saved conversations of a workspace.
    Sessions { workspace: Option<String> },
    /// Ask the agent about a workspace's document.
    Chat {
        message: String,
        #[arg(long)]
        workspace: Option<String>,
        /// Continue from a saved conversation.
        #[arg(long)]
        session: Option<String>,
        /// Image file or url to send along.
        #[arg(long = "attach")]
        attachments: Vec<String>,
    },
    /// Delete a workspace, or one of its generated artifacts.
    Delete {
        workspace: String,
        #[arg(long, value_enum)]
        variant: Option<VariantArg>,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Save a workspace as a zip archive.
    Download {
        destination: PathBuf,
        #[arg(long)]
        workspace: Option<String>,
    },
    /// Interactive shell.
    Shell,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantArg {
    Origin,
    Trans,
    Explain,
    Thread,
}

impl From<VariantArg> for Variant {
    fn from(value: VariantArg) -> Self {
        match value {
            VariantArg::Origin => Variant::Origin,
            VariantArg::Trans => Variant::Trans,
            VariantArg::Explain => Variant::Explain,
            VariantArg::Thread => Variant::Thread,
        }
    }
}

impl Command {
    /// Kind of run the command starts on an existing workspace.
    pub fn derive_kind(&self) -> Option<JobKind> {
        match self {
            Command::Translate { .. } => Some(JobKind::Translate),
            Command::Explain { .. } => Some(JobKind::Explain),
            Command::Thread { .. } => Some(JobKind::Threadify),
            _ => None,
        }
    }
}
