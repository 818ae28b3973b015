//! SYSMSG daemon - runs a processing context and reads commands from stdin.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sysmsg_core::{AttrListener, CategoryListener, MsgCode};
use sysmsg_task::{Args, Command, Reply, Runtime};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sysmsgd=info,sysmsg_core=info,sysmsg_task=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting SYSMSG daemon");

    // Parse command-line arguments
    let args = Args::parse();
    let watch: Vec<MsgCode> = args.watch.iter().copied().map(MsgCode::new).collect();
    let config = args.into_config();

    tracing::info!(
        queue_capacity = config.queue_capacity,
        thread = %config.thread_name,
        attr_delivery = ?config.attr_delivery,
        "configuration loaded"
    );

    let runtime = Runtime::start(&config)?;

    // Log every attribute change with its new value. Reading the table here
    // takes the shared lock again, which the delivery path may already hold.
    let table = Arc::clone(runtime.table());
    runtime.registry().register_attr_listener(
        AttrListener::named("attr-logger").with_callback(move |ids| {
            for &id in ids {
                match table.get(id) {
                    Some(value) => tracing::info!(attr = %id, %value, "attribute changed"),
                    None => tracing::info!(attr = %id, "attribute cleared"),
                }
            }
        }),
    )?;

    if !watch.is_empty() {
        runtime.registry().register_category_listener(
            CategoryListener::named("watch")
                .with_categories(watch.iter().copied())
                .with_callback(|msg| {
                    tracing::info!(
                        code = %msg.code,
                        payload = %msg.bytes().map(hex::encode).unwrap_or_default(),
                        "message received"
                    );
                }),
        )?;
        tracing::info!(codes = ?watch, "watching message categories");
    }

    tracing::info!("daemon ready, reading commands from stdin");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let reply = line.parse::<Command>().and_then(|command| runtime.execute(command));
        match reply {
            Ok(Reply::Text(text)) => writeln!(stdout, "{}", text)?,
            Ok(Reply::Quit) => break,
            Err(e) => writeln!(stdout, "error: {}", e)?,
        }
        stdout.flush()?;
    }

    tracing::info!("shutting down");
    runtime.shutdown();

    Ok(())
}
