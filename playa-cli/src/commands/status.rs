//! Show event, unlock and sync state.

use anyhow::Result;
use chrono::{DateTime, Utc};
use playa_client::{StateStore, UnlockLatch};
use playa_core::Clock;

use super::Context;

/// Run the status command.
pub async fn run(ctx: &Context) -> Result<()> {
    let now = ctx.clock.now();
    let window = &ctx.window;
    let event = window.config();

    println!("=== playa status ===");
    println!();

    println!("Event:");
    println!("  ID:     {}", event.event_id);
    println!("  Dates:  {} to {}", event.start_date, event.end_date);
    println!(
        "  Center: {:.6}, {:.6} (radius {} km)",
        event.center_latitude, event.center_longitude, event.geofence_radius_km
    );
    let phase = if window.is_event_active(now) {
        "ACTIVE"
    } else if window.is_event_over(now) {
        "OVER"
    } else {
        "UPCOMING"
    };
    println!("  Status: {phase}");
    println!();

    let store = ctx.open_state().await?;

    let latch = UnlockLatch::load(store.clone(), ctx.clock.clone(), window.clone()).await?;
    println!("Unlock:");
    match latch.unlocked_at().await {
        Some(at) => println!("  State:  UNLOCKED (since {})", format_instant(at)),
        None => println!("  State:  LOCKED"),
    }
    println!();

    println!("Sync:");
    println!("  Device: {}", ctx.device_id);
    match store.load_sync_snapshot(&ctx.device_id).await? {
        Some(snapshot) => {
            let session = &snapshot.session;
            println!(
                "  Used:   {} / {} bytes",
                session.storage_used_bytes, ctx.config.storage.capacity_bytes
            );
            println!("  Installed: {} package(s)", snapshot.installed.len());
            for installed in &snapshot.installed {
                let package = &installed.package;
                println!(
                    "    {} v{} (priority {}, {} bytes)",
                    package.id, package.version, package.priority, package.size_bytes
                );
            }
            println!("  Last full sync:        {}", format_optional(session.last_full_sync_at));
            println!(
                "  Last incremental sync: {}",
                format_optional(session.last_incremental_sync_at)
            );
            if let Some(error) = &session.error_message {
                println!("  Last error: {error}");
            }
        }
        None => {
            println!("  NEVER SYNCED");
            println!();
            println!("Run 'playa sync --catalog <dir>' to fetch content.");
        }
    }

    Ok(())
}

fn format_instant(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn format_optional(at: Option<DateTime<Utc>>) -> String {
    at.map(format_instant).unwrap_or_else(|| "never".to_string())
}
