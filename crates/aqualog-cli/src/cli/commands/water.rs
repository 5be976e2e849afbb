//! Water tracking commands.

use anyhow::Result;
use aqualog_core::session::SessionStore;
use aqualog_core::water::{DailyTracker, GOAL_GLASSES};

/// Fetches today's entry and prints the intake summary.
pub async fn show(base_url: &str) -> Result<()> {
    let mut tracker = authed_tracker(base_url).await?;
    tracker.fetch_today().await?;
    print_summary(&tracker);
    Ok(())
}

/// Fetches, applies a delta, saves, and prints the result.
pub async fn adjust(base_url: &str, delta: i32) -> Result<()> {
    let mut tracker = authed_tracker(base_url).await?;
    tracker.fetch_today().await?;
    tracker.adjust(delta);
    tracker.save().await?;
    print_summary(&tracker);
    Ok(())
}

/// Fetches, replaces the count, saves, and prints the result.
pub async fn set(base_url: &str, glasses: u32) -> Result<()> {
    let mut tracker = authed_tracker(base_url).await?;
    tracker.fetch_today().await?;
    tracker.set_count(glasses);
    tracker.save().await?;
    print_summary(&tracker);
    Ok(())
}

/// Bootstraps the session and builds a tracker carrying its bearer token.
async fn authed_tracker(base_url: &str) -> Result<DailyTracker> {
    let mut store = SessionStore::new(base_url);
    store.bootstrap().await;

    let Some(token) = store.token() else {
        anyhow::bail!("Not logged in. Run `aqualog login` first.");
    };
    Ok(DailyTracker::new(base_url, token))
}

fn print_summary(tracker: &DailyTracker) {
    let glasses = tracker.glasses();
    println!(
        "Today: {glasses}/{GOAL_GLASSES} glasses ({} ml, {}%)",
        tracker.total_ml(),
        tracker.percentage()
    );

    let filled = "#".repeat(glasses as usize);
    let empty = ".".repeat((GOAL_GLASSES - glasses) as usize);
    println!("[{filled}{empty}] {}", tracker.status().label());
    println!("Goal: {GOAL_GLASSES} glasses per day");
}
