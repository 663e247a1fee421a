use std::io::Write;
use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use maildisk_sdk::{Connector, Digest, DiskConfig, MailDisk, PathIndex, SdkError};
use serde_json::json;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(DiskConfig::default_path);
    let config = DiskConfig::load(&config_path)?;
    let disk = MailDisk::open_imap(&config)?;

    let mut stdout = std::io::stdout().lock();
    execute_then_close(&disk, cli.command, cli.format, &mut stdout).await
}

/// Run one command, then close the disk. A failed command is reported
/// ahead of any failure to close.
pub async fn execute_then_close<C: Connector, I: PathIndex>(
    disk: &MailDisk<C, I>,
    command: Command,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let result = execute(disk, command, format, out).await;
    let closed = disk.close().await;
    result?;
    closed?;
    Ok(())
}

/// Run one command against an open disk, writing its report to `out`.
pub async fn execute<C: Connector, I: PathIndex>(
    disk: &MailDisk<C, I>,
    command: Command,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match command {
        Command::Init => cmd_init(disk, format, out).await,
        Command::Put(args) => cmd_put(disk, args, format, out).await,
        Command::Get(args) => cmd_get(disk, args, format, out).await,
        Command::List(args) => cmd_list(disk, args, format, out),
    }
}

async fn cmd_init<C: Connector, I: PathIndex>(
    disk: &MailDisk<C, I>,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let mailbox = &disk.namespacer().store().pool().config().mailbox;
    let created = match disk.init().await {
        Ok(()) => true,
        Err(SdkError::Store(e)) if e.is_informational() => false,
        Err(e) => return Err(e.into()),
    };

    match format {
        OutputFormat::Json => writeln!(out, "{}", json!({ "mailbox": mailbox, "created": created }))?,
        OutputFormat::Text if created => {
            writeln!(out, "{} Created storage mailbox {}", "✓".green().bold(), mailbox.bold())?
        }
        OutputFormat::Text => writeln!(
            out,
            "{} storage mailbox {} already exists",
            "note:".yellow().bold(),
            mailbox.bold()
        )?,
    }
    Ok(())
}

async fn cmd_put<C: Connector, I: PathIndex>(
    disk: &MailDisk<C, I>,
    args: PutArgs,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let data = tokio::fs::read(&args.local)
        .await
        .with_context(|| format!("reading {}", args.local.display()))?;
    let root = disk.put(&args.remote, &data).await?;

    match format {
        OutputFormat::Json => writeln!(
            out,
            "{}",
            json!({ "path": args.remote, "digest": root.to_hex(), "size": data.len() })
        )?,
        OutputFormat::Text => {
            writeln!(
                out,
                "{} Stored {} ({} bytes) at {}",
                "✓".green().bold(),
                args.local.display(),
                data.len(),
                args.remote.bold()
            )?;
            writeln!(out, "  Digest: {}", root.to_hex().yellow())?;
        }
    }
    Ok(())
}

async fn cmd_get<C: Connector, I: PathIndex>(
    disk: &MailDisk<C, I>,
    args: GetArgs,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let data = if args.digest {
        let root = Digest::from_hex(&args.source).map_err(SdkError::from)?;
        disk.get_digest(root.as_bytes()).await?
    } else {
        disk.get(&args.source).await?
    };
    write_local(&args.local, &data).await?;

    match format {
        OutputFormat::Json => writeln!(
            out,
            "{}",
            json!({ "source": args.source, "file": args.local.display().to_string(), "size": data.len() })
        )?,
        OutputFormat::Text => writeln!(
            out,
            "{} Wrote {} bytes to {}",
            "✓".green().bold(),
            data.len(),
            args.local.display()
        )?,
    }
    Ok(())
}

async fn write_local(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    tokio::fs::write(path, data)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

fn cmd_list<C: Connector, I: PathIndex>(
    disk: &MailDisk<C, I>,
    args: ListArgs,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let entries = disk.list(&args.prefix)?;
    match format {
        OutputFormat::Json => {
            let items: Vec<_> = entries
                .iter()
                .map(|(path, digest)| json!({ "path": path, "digest": digest.to_hex() }))
                .collect();
            writeln!(out, "{}", serde_json::Value::Array(items))?;
        }
        OutputFormat::Text => {
            for (path, digest) in &entries {
                writeln!(out, "{}  {}", digest.to_hex().dimmed(), path)?;
            }
        }
    }
    Ok(())
}
