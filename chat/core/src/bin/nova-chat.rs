//! Nova Chat REPL
//!
//! Minimal terminal front end for the chat core. Reads lines from stdin,
//! streams responses to stdout, and keeps input live while a response is
//! streaming.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a backend on the default address (http://localhost:8000)
//! nova-chat
//!
//! # Custom backend
//! NOVA_API_URL=http://localhost:9000 nova-chat
//!
//! # With verbose logging
//! RUST_LOG=debug nova-chat
//! ```
//!
//! # Commands
//!
//! - `/stop` — cancel the in-flight response
//! - `/clear` — clear the conversation
//! - `/models` — list companies and models
//! - `/use <company> [model]` — switch model
//! - `/quit` — exit

use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use chat_core::{
    ChatController, ClientConfig, ConversationStore, HttpChatApi, ModelSelection, Role,
    SessionEvent,
};

/// Print whatever new content the tail assistant message gained
///
/// Tracks how much of the in-progress message has been printed and emits
/// only the delta, so streaming output appears token by token.
struct TailPrinter {
    printed: usize,
    streaming: bool,
}

impl TailPrinter {
    fn new() -> Self {
        Self {
            printed: 0,
            streaming: false,
        }
    }

    fn render(&mut self, store: &ConversationStore) {
        let snapshot = store.snapshot();
        let Some(last) = snapshot.last() else {
            self.printed = 0;
            self.streaming = false;
            return;
        };
        if last.role != Role::Assistant {
            return;
        }

        if last.streaming {
            if !self.streaming {
                self.streaming = true;
                self.printed = 0;
            }
            if last.content.len() > self.printed {
                print!("{}", &last.content[self.printed..]);
                let _ = std::io::stdout().flush();
                self.printed = last.content.len();
            }
        } else if self.streaming {
            // Finalization may rewrite the content wholesale (error or
            // stopped notice); print whatever the delta is and close the line.
            if last.content.len() > self.printed && last.content.is_char_boundary(self.printed) {
                print!("{}", &last.content[self.printed..]);
            }
            println!();
            self.streaming = false;
            self.printed = 0;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("nova_chat=info".parse()?)
                .add_directive("chat_core=warn".parse()?),
        )
        .with_target(false)
        .init();

    let config = ClientConfig::load()?;
    info!(base_url = %config.base_url, "Connecting to backend");

    let api = HttpChatApi::new(&config)?;
    let store = Arc::new(ConversationStore::new());
    let (events_tx, mut events_rx) = mpsc::channel::<SessionEvent>(16);
    let controller = Arc::new(ChatController::new(api.clone(), Arc::clone(&store), events_tx));

    // Model catalog is best-effort; the built-in default still works.
    let mut selection = match chat_core::ChatTransport::fetch_models(&api).await {
        Ok(catalog) => ModelSelection::from_catalog(catalog),
        Err(err) => {
            warn!(error = %err, "Could not fetch model catalog; using defaults");
            ModelSelection::default()
        }
    };
    info!(
        company = %selection.choice().company,
        model = %selection.choice().model,
        "Model selected"
    );

    // Streaming output: follow store revisions, print tail deltas.
    let store_for_render = Arc::clone(&store);
    let mut revisions = store.subscribe();
    tokio::spawn(async move {
        let mut printer = TailPrinter::new();
        while revisions.changed().await.is_ok() {
            printer.render(&store_for_render);
        }
    });

    // Lifecycle notices.
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                SessionEvent::Completed { cancelled: true, .. } => {
                    info!("Response stopped by server");
                }
                SessionEvent::Completed { .. } => {}
                SessionEvent::Errored { message } => warn!(%message, "Session failed"),
                SessionEvent::Aborted => info!("Response stopped"),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("nova-chat ready. /quit to exit, /stop to cancel a response.");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        match line.as_str() {
            "" => {}
            "/quit" | "/exit" => break,
            "/stop" => {
                if !controller.stop_stream().await {
                    println!("(nothing to stop)");
                }
            }
            "/clear" => {
                store.clear();
                println!("(conversation cleared)");
            }
            "/models" => {
                for company in selection.companies() {
                    println!("{company}:");
                    for (id, entry) in selection.models_for(company) {
                        println!("  {id}: {} ({})", entry.name, entry.description);
                    }
                }
            }
            cmd if cmd.starts_with("/use ") => {
                let mut parts = cmd["/use ".len()..].split_whitespace();
                let company = parts.next().unwrap_or_default();
                if !selection.select_company(company) {
                    println!("unknown company: {company}");
                    continue;
                }
                if let Some(model) = parts.next() {
                    if !selection.select_model(model) {
                        println!("unknown model for {company}: {model}");
                        continue;
                    }
                }
                println!(
                    "using {} / {}",
                    selection.choice().company,
                    selection.choice().model
                );
            }
            _ => {
                // Spawned so /stop stays responsive while streaming; a new
                // message supersedes (aborts) the previous session.
                let controller = Arc::clone(&controller);
                let choice = selection.choice().clone();
                tokio::spawn(async move {
                    controller.send_message(&line, &choice).await;
                });
            }
        }
    }

    info!("nova-chat exiting");
    Ok(())
}
