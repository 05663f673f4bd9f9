//! Subcommand implementations.

use anyhow::{Context, Result};
use chrono::Utc;
use threadflow_core::{CompletedItem, Item, Priority};
use threadflow_sync::{
    CompletionSource, Completions, HttpCompletionSource, StatusWatch, SyncConfig, SyncFacade,
    SyncStatus, TransportKind,
};
use tracing::{debug, info, warn};

use crate::board::TaskBoard;
use crate::shutdown_signal;

/// `watch`: stream completions and status changes until interrupted.
pub async fn watch(mut config: SyncConfig, transport: Option<TransportKind>) -> Result<()> {
    if let Some(transport) = transport {
        config.sync.transport = transport;
    }
    let facade = SyncFacade::from_config(&config).context("failed to build sync engine")?;
    let mut completions = facade
        .completions()
        .context("completion stream already taken")?;
    let mut status = facade.watch();

    println!("Watching completions over {} (Ctrl-C to stop)", facade.transport());
    facade.start();

    run_until_shutdown(&mut completions, &mut status, |item| {
        print_completion(item);
        false
    })
    .await;

    facade.stop();
    info!("Sync stopped");
    Ok(())
}

/// `submit`: post one task, optionally waiting for it to finish.
pub async fn submit(config: SyncConfig, payload: &str, priority: i64, wait: bool) -> Result<()> {
    let priority_value = Priority::new(priority).context("invalid priority")?;
    let source = HttpCompletionSource::from_config(&config)?;
    let id = source
        .submit(payload, priority)
        .await
        .context("failed to submit task")?;
    println!("Submitted {} (priority {})", id, priority_value);

    if !wait {
        return Ok(());
    }

    let mut board = TaskBoard::new();
    board.track(Item::pending(id.clone(), payload, priority_value));

    let facade = SyncFacade::from_config(&config).context("failed to build sync engine")?;
    let mut completions = facade
        .completions()
        .context("completion stream already taken")?;
    let mut status = facade.watch();
    facade.start();

    let finished = run_until_shutdown(&mut completions, &mut status, |item| {
        match board.apply(item, Utc::now()) {
            Some(done) => print_completion_of(done),
            None => debug!(task_id = %item.id, "Ignoring completion of another task"),
        }
        board.all_completed()
    })
    .await;

    facade.stop();
    if !finished {
        let pending = board.pending().count();
        warn!(pending, tracked = board.len(), "Stopped before the task completed");
    } else if let Some(item) = board.get(&id) {
        debug!(task_id = %item.id, status = %item.status, "Task finished");
    }
    Ok(())
}

/// `health`: probe `/health` once and report the queue depth.
pub async fn health(config: &SyncConfig) -> Result<()> {
    let source = HttpCompletionSource::from_config(config)?;
    let health = source
        .check_health()
        .await
        .with_context(|| format!("server at {} is not healthy", source.base_url()))?;

    println!("Server:  {}", source.base_url());
    println!("Status:  {}", health.status);
    if let Some(version) = &health.version {
        println!("Version: {}", version);
    }
    if let Some(uptime) = health.uptime {
        println!("Uptime:  {}s", uptime);
    }

    match source.queue_depth().await {
        Ok(depth) => println!("Queue:   {} task(s) waiting", depth),
        Err(e) => warn!(error = %e, "Queue depth unavailable"),
    }
    Ok(())
}

/// Pumps completions into `on_item` and prints status transitions.
///
/// Returns true once `on_item` reports done, false on shutdown or when the
/// engine goes away.
async fn run_until_shutdown<F>(
    completions: &mut Completions,
    status: &mut StatusWatch,
    mut on_item: F,
) -> bool
where
    F: FnMut(&CompletedItem) -> bool,
{
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut last: SyncStatus = status.current();
    print_status(&last);

    loop {
        tokio::select! {
            _ = &mut shutdown => return false,
            item = completions.next() => match item {
                Some(item) => {
                    if on_item(&item) {
                        return true;
                    }
                }
                None => return false,
            },
            changed = status.changed() => match changed {
                Ok(current) if current != last => {
                    print_status(&current);
                    last = current;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Status stream closed");
                    return false;
                }
            },
        }
    }
}

fn print_status(status: &SyncStatus) {
    println!("[status] {}", status);
}

fn print_completion(item: &CompletedItem) {
    let when = item
        .completion_time
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".into());
    match &item.data {
        Some(data) => println!("[{}] {} done: {}", when, item.id, data),
        None => println!("[{}] {} done", when, item.id),
    }
}

fn print_completion_of(item: &Item) {
    let when = item
        .completion_time
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_default();
    println!(
        "[{}] {} done: {} (priority {})",
        when, item.id, item.payload, item.priority
    );
}
