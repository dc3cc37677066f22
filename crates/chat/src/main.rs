// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{error, info};

use ticketchat::config::ChatConfig;
use ticketchat::controller::{ChatController, Principal};
use ticketchat::protocol::Message;
use ticketchat::ChatRuntime;

/// Attach to a ticket's chat channel from the terminal.
#[derive(Debug, Parser)]
#[command(name = "ticketchat", version, about)]
struct Cli {
    #[command(flatten)]
    chat: ChatConfig,

    /// Conversation (ticket) to attach to.
    #[arg(long, env = "TICKETCHAT_CONVERSATION")]
    conversation: String,

    /// Signed-in user id.
    #[arg(long, env = "TICKETCHAT_USER_ID")]
    user_id: Option<String>,

    /// Signed-in user display name.
    #[arg(long, env = "TICKETCHAT_USER_NAME", default_value = "analyst")]
    user_name: String,

    /// Log format (json or text).
    #[arg(long, env = "TICKETCHAT_LOG_FORMAT", default_value = "text")]
    log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "TICKETCHAT_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.chat.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    init_tracing(&cli);

    if let Err(e) = run(cli).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(cli: &Cli) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match cli.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Without a user id the controller has no principal and never connects.
    let principal = cli.user_id.map(|id| Principal { id, name: cli.user_name.clone() });
    if principal.is_none() {
        anyhow::bail!("--user-id is required to join a conversation");
    }

    let runtime = ChatRuntime::start_ws(cli.chat);
    let controller = runtime.controller(&cli.conversation, principal);
    info!(conversation = %cli.conversation, tab = %runtime.tab_id(), "attaching");

    let printer = tokio::spawn(print_updates(controller.clone()));
    controller.mount();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if !handle_line(&controller, line.trim()) {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    controller.disconnect();
    printer.abort();
    runtime.shutdown().await;
    Ok(())
}

/// Apply one line of user input. Returns `false` to quit.
fn handle_line(controller: &ChatController, line: &str) -> bool {
    match line {
        "" => {}
        "/quit" => return false,
        "/clear" => controller.clear_messages(),
        "/reconnect" => {
            controller.disconnect();
            controller.connect();
        }
        "/online" => controller.network_online(),
        text => {
            if !controller.send_message(text) {
                eprintln!("[not connected: message not sent]");
            }
        }
    }
    true
}

async fn print_updates(controller: ChatController) {
    let mut status = controller.subscribe_status();
    let mut messages = controller.subscribe();

    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *status.borrow_and_update();
                eprintln!("[{state}]");
            }
            msg = messages.recv() => {
                match msg {
                    Ok(msg) => println!("{}", render(&msg)),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        eprintln!("[skipped {n} messages]");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

fn render(msg: &Message) -> String {
    match &msg.author {
        Some(author) => format!("[{}] {}: {}", msg.kind, author.name, msg.payload),
        None => format!("[{}] {}", msg.kind, msg.payload),
    }
}
