//! Evaluate the unlock gate.

use anyhow::{Context as _, Result};
use playa_client::UnlockLatch;

use super::{sample, Context};

/// Run the unlock command.
pub async fn run(ctx: &Context, coords: Option<(f64, f64)>, bypass: bool) -> Result<()> {
    let store = ctx.open_state().await?;
    let latch = UnlockLatch::load(store, ctx.clock.clone(), ctx.window.clone()).await?;
    latch.set_bypass(bypass || ctx.config.unlock.bypass);

    let location = sample(coords);
    let unlocked = latch
        .is_unlocked(location.as_ref())
        .await
        .context("Failed to record unlock")?;

    if unlocked {
        println!("Unlock: UNLOCKED");
    } else {
        println!("Unlock: LOCKED");
    }
    if latch.is_bypassed() {
        println!("  (debug bypass, nothing persisted)");
    }
    if let Some(at) = latch.unlocked_at().await {
        println!("  Since: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some((lat, lon)) = coords {
        println!(
            "  Distance to center: {:.3} km (radius {} km)",
            latch.distance_to_center_km(lat, lon),
            ctx.window.radius_km()
        );
    }

    Ok(())
}
