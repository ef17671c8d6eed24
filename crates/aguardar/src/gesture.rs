//! Gestures followed by verification.
//!
//! Swipes are side-effecting, so they are performed exactly as requested and
//! never retried. Verification of what the gesture revealed goes through the
//! normal fallback chain afterwards.

use crate::driver::{GestureDriver, Resolver};
use crate::fallback::{FallbackChain, Resolved};
use crate::locator::LocatorStrategy;
use crate::result::{AguardarError, AguardarResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Rectangle a swipe travels through, in device pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwipeRegion {
    /// Left edge
    pub left: u32,
    /// Top edge
    pub top: u32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl SwipeRegion {
    /// Create a region
    #[must_use]
    pub const fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Horizontal band across the middle 80% of a screen.
    ///
    /// The band is `band_height` tall and centred vertically; it is clipped
    /// to the screen when the screen is shorter than the band.
    #[must_use]
    pub const fn centered_band(width: u32, height: u32, band_height: u32) -> Self {
        let band = if band_height > height { height } else { band_height };
        Self {
            left: width / 10,
            top: (height - band) / 2,
            width: width / 10 * 8,
            height: band,
        }
    }

    /// Centre point of the region
    #[must_use]
    pub const fn center(&self) -> (u32, u32) {
        (self.left + self.width / 2, self.top + self.height / 2)
    }
}

/// Direction the content is pushed towards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwipeDirection {
    /// Finger moves right to left
    Left,
    /// Finger moves left to right
    Right,
    /// Finger moves bottom to top
    Up,
    /// Finger moves top to bottom
    Down,
}

impl fmt::Display for SwipeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Up => "up",
            Self::Down => "down",
        };
        f.write_str(name)
    }
}

/// A swipe gesture, possibly repeated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Swipe {
    /// Region to swipe in
    pub region: SwipeRegion,
    /// Direction
    pub direction: SwipeDirection,
    /// Fraction of the region to travel (0.0-1.0)
    #[serde(default = "default_magnitude")]
    pub magnitude: f64,
    /// Number of swipes
    #[serde(default = "default_repeat")]
    pub repeat: usize,
    /// Pause between swipes in milliseconds
    #[serde(default)]
    pub settle_ms: u64,
}

const fn default_magnitude() -> f64 {
    1.0
}

const fn default_repeat() -> usize {
    1
}

impl Swipe {
    /// Single full-length swipe
    #[must_use]
    pub const fn new(region: SwipeRegion, direction: SwipeDirection) -> Self {
        Self {
            region,
            direction,
            magnitude: 1.0,
            repeat: 1,
            settle_ms: 0,
        }
    }

    /// Travel only a fraction of the region
    #[must_use]
    pub const fn magnitude(mut self, magnitude: f64) -> Self {
        self.magnitude = magnitude;
        self
    }

    /// Swipe `times` times
    #[must_use]
    pub const fn repeat(mut self, times: usize) -> Self {
        self.repeat = times;
        self
    }

    /// Pause between consecutive swipes
    #[must_use]
    pub const fn settle(mut self, ms: u64) -> Self {
        self.settle_ms = ms;
        self
    }

    /// Perform the swipe `repeat` times
    ///
    /// # Errors
    ///
    /// Returns [`AguardarError::Configuration`] for a magnitude outside
    /// `0.0..=1.0` and [`AguardarError::Gesture`] on the first failed swipe.
    pub async fn perform<G: GestureDriver>(&self, gesture: &G) -> AguardarResult<()> {
        if !(0.0..=1.0).contains(&self.magnitude) {
            return Err(AguardarError::configuration(format!(
                "swipe magnitude must be within 0.0..=1.0, got {}",
                self.magnitude
            )));
        }
        for n in 0..self.repeat {
            if n > 0 && self.settle_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.settle_ms)).await;
            }
            debug!(direction = %self.direction, swipe = n + 1, of = self.repeat, "swipe");
            gesture
                .perform_swipe(&self.region, self.direction, self.magnitude)
                .await
                .map_err(|err| {
                    warn!(direction = %self.direction, swipe = n + 1, error = %err, "swipe failed");
                    AguardarError::Gesture {
                        message: format!(
                            "swipe {} {}/{}: {err}",
                            self.direction,
                            n + 1,
                            self.repeat
                        ),
                    }
                })?;
        }
        Ok(())
    }
}

/// Perform `swipe`, then resolve `strategies` through `chain`
///
/// # Errors
///
/// Gesture failures abort before any resolution is attempted; resolution
/// failures are those of [`FallbackChain::resolve`].
pub async fn swipe_then_resolve<G, R>(
    gesture: &G,
    swipe: &Swipe,
    chain: &FallbackChain,
    resolver: &R,
    strategies: &[LocatorStrategy],
) -> AguardarResult<Resolved<R::Handle>>
where
    G: GestureDriver,
    R: Resolver,
{
    swipe.perform(gesture).await?;
    chain.resolve(resolver, strategies).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::scripted::{ScriptedElement, ScriptedUi};
    use crate::wait::WaitPolicy;

    mod region_tests {
        use super::*;

        #[test]
        fn test_centered_band_geometry() {
            let band = SwipeRegion::centered_band(1080, 1920, 200);
            assert_eq!(band, SwipeRegion::new(108, 860, 864, 200));
            assert_eq!(band.center(), (540, 960));
        }

        #[test]
        fn test_centered_band_clipped_to_screen() {
            let band = SwipeRegion::centered_band(100, 50, 200);
            assert_eq!(band.top, 0);
            assert_eq!(band.height, 50);
        }

        #[test]
        fn test_direction_display_and_serde() {
            assert_eq!(SwipeDirection::Left.to_string(), "left");
            let d: SwipeDirection = serde_yaml_ng::from_str("up").unwrap();
            assert_eq!(d, SwipeDirection::Up);
        }

        #[test]
        fn test_swipe_defaults_from_yaml() {
            let swipe: Swipe = serde_yaml_ng::from_str(
                "region: { left: 0, top: 0, width: 10, height: 10 }\ndirection: left\n",
            )
            .unwrap();
            assert_eq!(swipe.repeat, 1);
            assert!((swipe.magnitude - 1.0).abs() < f64::EPSILON);
        }
    }

    mod perform_tests {
        use super::*;

        fn carousel() -> ScriptedUi {
            ScriptedUi::with_elements([ScriptedElement::new("card-3")
                .text("Fully compatible with iOS and Android")
                .after_swipes(3)])
        }

        #[tokio::test(start_paused = true)]
        async fn test_repeat_with_settle() {
            let ui = carousel();
            let start = tokio::time::Instant::now();
            Swipe::new(SwipeRegion::centered_band(1080, 1920, 200), SwipeDirection::Left)
                .repeat(3)
                .settle(250)
                .perform(&ui)
                .await
                .unwrap();
            assert_eq!(ui.swipes().len(), 3);
            assert_eq!(start.elapsed(), Duration::from_millis(500));
        }

        #[tokio::test(start_paused = true)]
        async fn test_gesture_failure_is_not_retried() {
            let ui = carousel();
            ui.fail_gestures(true);
            let err = Swipe::new(SwipeRegion::new(0, 0, 10, 10), SwipeDirection::Right)
                .repeat(3)
                .perform(&ui)
                .await
                .unwrap_err();
            assert!(matches!(err, AguardarError::Gesture { .. }));
            assert_eq!(ui.call_count("swipe:right"), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_invalid_magnitude_rejected() {
            let ui = carousel();
            let err = Swipe::new(SwipeRegion::new(0, 0, 10, 10), SwipeDirection::Up)
                .magnitude(1.5)
                .perform(&ui)
                .await
                .unwrap_err();
            assert!(matches!(err, AguardarError::Configuration { .. }));
            assert!(ui.swipes().is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn test_swipe_then_resolve_finds_revealed_card() {
            let ui = carousel();
            let chain = FallbackChain::new(WaitPolicy::new(2000, 500).unwrap());
            let resolved = swipe_then_resolve(
                &ui,
                &Swipe::new(SwipeRegion::centered_band(1080, 1920, 200), SwipeDirection::Left)
                    .repeat(3),
                &chain,
                &ui,
                &[LocatorStrategy::text_matches("(?i).*compatible.*")],
            )
            .await
            .unwrap();
            assert_eq!(resolved.handle.id(), "card-3");
            assert_eq!(resolved.elapsed, Duration::ZERO);
        }

        #[tokio::test(start_paused = true)]
        async fn test_swipe_failure_skips_resolution() {
            let ui = carousel();
            ui.fail_gestures(true);
            let chain = FallbackChain::new(WaitPolicy::default());
            let err = swipe_then_resolve(
                &ui,
                &Swipe::new(SwipeRegion::new(0, 0, 10, 10), SwipeDirection::Left),
                &chain,
                &ui,
                &[LocatorStrategy::text_contains("compatible")],
            )
            .await
            .unwrap_err();
            assert!(matches!(err, AguardarError::Gesture { .. }));
            assert!(!ui.was_called("find:"));
        }
    }
}
