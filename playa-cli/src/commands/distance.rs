//! Great-circle distance.

use playa_core::distance_km;

use super::Context;

/// Run the distance command. Without a target, measures to the event center.
pub fn run(ctx: &Context, from: (f64, f64), to: Option<(f64, f64)>) {
    let (to_lat, to_lon) = to.unwrap_or_else(|| ctx.window.center());
    let km = distance_km(from.0, from.1, to_lat, to_lon);
    println!("{km:.3} km");

    if to.is_none() {
        let inside = km <= ctx.window.radius_km();
        println!(
            "{} the event geofence ({} km)",
            if inside { "Inside" } else { "Outside" },
            ctx.window.radius_km()
        );
    }
}
