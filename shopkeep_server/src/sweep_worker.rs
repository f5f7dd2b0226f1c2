use std::time::Duration;

use chrono::Utc;
use log::*;
use shopkeep_engine::{SqliteDatabase, SweepApi, SweepReport};
use tokio::task::JoinHandle;

/// Starts the expiration sweep. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_sweep_worker(api: SweepApi<SqliteDatabase>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Expiration sweep worker started. Running every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            debug!("🕰️ Running expiration sweep");
            match api.run(Utc::now()).await {
                Ok(report) if report.is_empty() => trace!("🕰️ Nothing to sweep"),
                Ok(report) => log_report(&report),
                Err(e) => error!("🕰️ Error running expiration sweep: {e}"),
            }
        }
    })
}

fn log_report(report: &SweepReport) {
    info!(
        "🕰️ Sweep complete. {} invoices expired, {} orders cancelled, {} reminders sent, {} deposits forfeited",
        report.expired.len(),
        report.cancelled_orders.len(),
        report.reminders,
        report.forfeited.len()
    );
    if !report.expired.is_empty() {
        debug!("🕰️ Expired invoices: {}", join(&report.expired));
    }
    if !report.forfeited.is_empty() {
        debug!("🕰️ Forfeited orders: {}", join(&report.forfeited));
    }
    if report.errors > 0 {
        warn!("🕰️ {} invoices could not be swept. They will be retried on the next run.", report.errors);
    }
}

fn join<T: ToString>(items: &[T]) -> String {
    items.iter().map(|i| i.to_string()).collect::<Vec<String>>().join(", ")
}
