//! One-shot rescue strategies for elements the main document lacks

use probe_browser::{Driver, ElementAction, RescueScope};
use tracing::{debug, warn};

/// Rescue order: iframes first, then shadow roots
pub const RESCUES: &[RescueScope] = &[RescueScope::Frames, RescueScope::ShadowRoots];

/// Run each rescue once, stopping at the first that finds the element.
///
/// A rescue that errors counts as a miss.
pub async fn first_rescue(
    driver: &dyn Driver,
    selector: &str,
    action: &ElementAction,
) -> Option<RescueScope> {
    for scope in RESCUES {
        match driver.act_in(*scope, selector, action).await {
            Ok(true) => {
                debug!(%scope, selector, "Rescue found element");
                return Some(*scope);
            }
            Ok(false) => debug!(%scope, selector, "Rescue found nothing"),
            Err(e) => warn!(%scope, selector, "Rescue failed: {}", e),
        }
    }
    None
}
