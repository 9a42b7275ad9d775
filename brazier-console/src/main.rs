//! An interactive line console driving a brazier command manager.
//!
//! Lines are dispatched as commands; a line starting with `?` asks for
//! completions instead. `quit` leaves.

mod commands;
mod config;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use brazier::manager::CommandManager;
use brazier::permission::PermissionChecker;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::ConsoleConfig;

/// The sender identity of the interactive console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleSender {
    /// The one and only local operator.
    Console,
}

/// A snapshot of registered commands, injected into the help handler.
#[derive(Clone)]
pub struct CommandList(pub Vec<(String, String)>);

/// Grants exactly the permissions listed in the configuration file.
struct GrantedPermissions(Vec<String>);

impl PermissionChecker<ConsoleSender> for GrantedPermissions {
    fn has_permission(&self, _sender: &ConsoleSender, permission: &str) -> bool {
        self.0.iter().any(|granted| granted == permission)
    }
}

fn init_logger() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();
    let config = ConsoleConfig::load_or_create(Path::new("config/console.json"))?;

    let manager = Arc::new(
        CommandManager::new(config.settings.clone())
            .with_permission_checker(GrantedPermissions(config.granted_permissions.clone())),
    );

    // The help handler pulls the command list out of thin air via injection.
    let listing = Arc::downgrade(&manager);
    manager
        .register_injector(move |_ctx| {
            listing.upgrade().map(|manager| {
                CommandList(
                    manager
                        .commands()
                        .iter()
                        .map(|command| {
                            (
                                command.syntax(),
                                command.description().unwrap_or_default().to_string(),
                            )
                        })
                        .collect(),
                )
            })
        })
        .context("registering the command list injector")?;

    commands::register_all(&manager).context("registering commands")?;
    manager.lock_registration();
    log::info!(
        "{} commands ready; '?<input>' completes, 'quit' leaves",
        manager.commands().len()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt(&config.prompt)?;
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if matches!(trimmed, "quit" | "exit") {
            break;
        }
        if let Some(partial) = line.trim_start().strip_prefix('?') {
            // Completions; trailing whitespace is significant here.
            let suggestions = manager.suggest(ConsoleSender::Console, partial).await;
            if suggestions.is_empty() {
                println!("(no completions)");
            } else {
                let texts: Vec<&str> = suggestions.iter().map(|s| s.text()).collect();
                println!("{}", texts.join("  "));
            }
        } else if !trimmed.is_empty() {
            match manager.execute(ConsoleSender::Console, trimmed).await {
                Ok(_) => {}
                Err(error) => {
                    log::debug!("dispatch failed with caption {:?}", error.caption().key);
                    println!("error: {error}");
                }
            }
        }
        prompt(&config.prompt)?;
    }

    Ok(())
}

fn prompt(prompt: &str) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{prompt}")?;
    stdout.flush()?;
    Ok(())
}
