#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

mod command;

use clap::{Parser, Subcommand, ValueEnum};
use command::{
    ChatInput, ChatStrategy, CommandStrategy, InfoStrategy, InitStrategy, VersionStrategy,
};
use lexia_core::AttachmentKind;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lexia")]
#[command(about = "Lexia AI agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent on a conversation thread
    Chat {
        /// Thread to use
        #[arg(short = 't', long = "thread", default_value = "cli:default")]
        thread_id: String,

        /// Single message to send
        #[arg(short = 'm', long)]
        message: Option<String>,

        /// Model to use
        #[arg(short = 'M', long)]
        model: Option<String>,

        /// System prompt for this session
        #[arg(long)]
        system: Option<String>,

        /// URL of a file to attach to the first message
        #[arg(long)]
        attach: Option<String>,

        #[arg(long, value_enum, default_value_t = AttachKind::Text, requires = "attach")]
        attach_kind: AttachKind,

        /// Force a tool by name (repeatable)
        #[arg(long = "force-tool")]
        force_tools: Vec<String>,
    },
    /// Initialize configuration
    Init,
    /// Show configuration
    Info,
    /// Show version
    Version,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AttachKind {
    Pdf,
    Image,
    Text,
}

impl From<AttachKind> for AttachmentKind {
    fn from(kind: AttachKind) -> Self {
        match kind {
            AttachKind::Pdf => Self::Pdf,
            AttachKind::Image => Self::Image,
            AttachKind::Text => Self::Text,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat {
            thread_id,
            message,
            model,
            system,
            attach,
            attach_kind,
            force_tools,
        } => {
            let input = ChatInput {
                thread_id,
                message,
                model,
                system,
                attachment: attach.map(|url| (url, attach_kind.into())),
                force_tools,
            };
            ChatStrategy.execute(input).await
        }
        Commands::Init => InitStrategy.execute(()).await,
        Commands::Info => InfoStrategy.execute(()).await,
        Commands::Version => VersionStrategy.execute(()).await,
    }
}
