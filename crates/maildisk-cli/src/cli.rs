use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "maildisk",
    about = "Content-addressed file storage inside an IMAP mailbox",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file [default: ~/.maildisk.toml]
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the storage mailbox on the server
    Init,
    /// Upload a local file to a remote path
    Put(PutArgs),
    /// Download a remote path (or a digest) to a local file
    Get(GetArgs),
    /// List remote paths
    List(ListArgs),
}

#[derive(Args)]
pub struct PutArgs {
    pub local: PathBuf,
    pub remote: String,
}

#[derive(Args)]
pub struct GetArgs {
    /// Remote path, or a hex root digest with --digest
    pub source: String,
    pub local: PathBuf,
    /// Treat SOURCE as a root digest and skip the path index
    #[arg(long)]
    pub digest: bool,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(default_value = "")]
    pub prefix: String,
}
