//! Shell Bot Example
//!
//! A console front end for Quill: every line read from stdin is dispatched as
//! a message from `--from`, and every reply is printed to stdout.
//!
//! Commands are YAML files in `./command` (see the samples next to this
//! crate). Edit them while the bot runs and type `!refresh command`.
//!
//! # Usage
//!
//! ```bash
//! cd demos/shell_bot
//! cargo run --package shell-bot
//! > !help
//! > !uptime
//! ```

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use quill::prelude::*;
use quill::runtime::ConfigLoader;

#[derive(Debug, Parser)]
#[command(name = "shell-bot", about = "Serve YAML-declared shell commands on the console")]
struct Cli {
    /// Configuration file (otherwise quill.toml / quill.yaml is searched).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. "production".
    #[arg(short, long)]
    profile: Option<String>,

    /// Directory of command definitions, overriding plugins.command.dir.
    #[arg(short = 'd', long)]
    commands_dir: Option<PathBuf>,

    /// Sender address attached to console messages.
    #[arg(long, default_value = "console")]
    from: String,
}

fn load_config(cli: &Cli) -> Result<QuillConfig> {
    let mut loader = ConfigLoader::new().with_current_dir().with_user_config_dir();
    if let Some(path) = &cli.config {
        loader = loader.file(path);
    }
    if let Some(profile) = &cli.profile {
        loader = loader.profile(profile.clone());
    }
    let mut config = loader.load()?;

    if let Some(dir) = &cli.commands_dir {
        let section = config
            .plugins
            .entry("command".to_string())
            .or_insert_with(|| serde_json::json!({}));
        if let Some(table) = section.as_object_mut() {
            table.insert("dir".to_string(), serde_json::json!(dir));
        }
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let runtime = QuillRuntime::from_config(&config);
    runtime.register_configured::<CommandPlugin>().await?;

    let (sink, mut replies) = ChannelSink::new();
    let printer = tokio::spawn(async move {
        while let Some(reply) = replies.recv().await {
            println!("[{}] {}", reply.from, reply.text.trim_end());
        }
    });

    // Stdin is read on a plain thread so a pending read never blocks shutdown.
    let (tx, inbound) = runtime.inbound_channel();
    let from = cli.from.clone();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => {
                    if tx.blocking_send(Message::new(line, from.clone())).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to read stdin");
                    break;
                }
            }
        }
        info!("Console input closed");
    });

    runtime.serve(inbound, Arc::new(sink)).await?;

    // Dropping the runtime releases the last sink handle and ends the printer.
    drop(runtime);
    printer.await?;

    Ok(())
}
