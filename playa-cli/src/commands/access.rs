//! Decide access to a content type.

use playa_core::{AccessDecision, Clock, ContentAccessValidator, LocationRequirement};
use playa_types::ContentType;

use super::{sample, Context};

/// Run the access command.
pub fn run(
    ctx: &Context,
    content_type: ContentType,
    coords: Option<(f64, f64)>,
    spot: Option<(f64, f64)>,
    spot_radius: Option<f64>,
) {
    let validator = ContentAccessValidator::new(ctx.window.clone());
    let location = sample(coords);
    let radius = spot_radius.unwrap_or(ctx.config.event.default_requirement_radius_m);
    let requirement = spot.map(|(lat, lon)| LocationRequirement::with_radius(lat, lon, radius));

    let decision = validator.evaluate(
        content_type,
        location.as_ref(),
        ctx.clock.now(),
        requirement.as_ref(),
    );
    println!("{content_type}: {}", describe(&decision));
}

fn describe(decision: &AccessDecision) -> String {
    let label = match decision {
        AccessDecision::Granted(_) => "GRANTED",
        AccessDecision::Limited(_) => "LIMITED",
        AccessDecision::Denied(_) => "DENIED",
    };
    format!("{label} ({})", decision.reason())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_includes_reason() {
        assert_eq!(
            describe(&AccessDecision::Limited("preview".into())),
            "LIMITED (preview)"
        );
        assert_eq!(describe(&AccessDecision::Denied("no".into())), "DENIED (no)");
    }
}
