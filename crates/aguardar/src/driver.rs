//! Driver boundary: the collaborator traits the engine consumes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  Host automation driver (Appium, WebDriver, CDP, scripted UI)    │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  Resolver        find(strategy) -> [ElementHandle]               │
//! │  ElementHandle   exists / is_visible / read_text / click / set   │
//! │  GestureDriver   perform_swipe(region, direction, magnitude)     │
//! │  SnapshotSource  page_source / screenshot                        │
//! └──────────────────────────────────────────────────────────────────┘
//!                │ every call may fail with DriverError
//!                ▼
//!        Poller / FallbackChain / Classifier / Capturer
//! ```
//!
//! The engine never interprets selector expressions and never retries a
//! side-effecting call on its own; it only re-asks the driver for state.

use crate::gesture::{SwipeDirection, SwipeRegion};
use crate::locator::LocatorStrategy;
use async_trait::async_trait;
use std::time::SystemTime;
use thiserror::Error;

/// Transport-level failure reported by a driver collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// The connection to the device/browser failed or the command errored
    #[error("transport: {message}")]
    Transport {
        /// Error message
        message: String,
    },

    /// The element handle no longer refers to a live element
    #[error("stale element: {message}")]
    StaleElement {
        /// Error message
        message: String,
    },

    /// The driver does not implement this operation
    #[error("unsupported operation: {operation}")]
    Unsupported {
        /// Operation name
        operation: String,
    },
}

impl DriverError {
    /// Create a transport error
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a stale element error
    #[must_use]
    pub fn stale(message: impl Into<String>) -> Self {
        Self::StaleElement {
            message: message.into(),
        }
    }

    /// Create an unsupported operation error
    #[must_use]
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }
}

/// Result type for driver calls
pub type DriverResult<T> = Result<T, DriverError>;

/// A live element returned by a [`Resolver`]
#[async_trait]
pub trait ElementHandle: Send + Sync {
    /// Whether the element is attached to the current UI
    async fn exists(&self) -> DriverResult<bool>;

    /// Whether the element is displayed
    async fn is_visible(&self) -> DriverResult<bool>;

    /// Visible text of the element
    async fn read_text(&self) -> DriverResult<String>;

    /// Tap / click the element
    async fn click(&self) -> DriverResult<()>;

    /// Replace the element's value
    async fn set_value(&self, value: &str) -> DriverResult<()>;
}

/// Finds elements for one locator strategy
///
/// An empty vector means the query ran and matched nothing; an error means
/// the query itself could not be carried out. The engine keeps the two apart.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Handle type produced by this resolver
    type Handle: ElementHandle;

    /// Find all elements matching `strategy`
    async fn find(&self, strategy: &LocatorStrategy) -> DriverResult<Vec<Self::Handle>>;
}

/// Injects gestures into the device/page
#[async_trait]
pub trait GestureDriver: Send + Sync {
    /// Swipe inside `region` towards `direction`; `magnitude` is the fraction
    /// of the region to travel (0.0-1.0)
    async fn perform_swipe(
        &self,
        region: &SwipeRegion,
        direction: SwipeDirection,
        magnitude: f64,
    ) -> DriverResult<()>;
}

/// Produces the raw material of a diagnostic bundle
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Structural snapshot (page source / view hierarchy XML)
    async fn page_source(&self) -> DriverResult<String>;

    /// Visual snapshot (PNG)
    async fn screenshot(&self) -> DriverResult<Screenshot>;
}

/// Screenshot data with metadata
#[derive(Debug, Clone)]
pub struct Screenshot {
    /// Raw PNG data
    pub data: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Timestamp when screenshot was taken
    pub timestamp: SystemTime,
}

impl Screenshot {
    /// Create a new screenshot
    #[must_use]
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp: SystemTime::now(),
        }
    }

    /// Get the size in bytes
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Check if screenshot is valid (has data)
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.data.is_empty() && self.width > 0 && self.height > 0
    }
}
