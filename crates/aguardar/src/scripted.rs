//! Scripted UI: an in-memory driver whose elements come and go on a timeline.
//!
//! `ScriptedUi` implements [`Resolver`], [`GestureDriver`] and
//! [`SnapshotSource`], so every engine component can be exercised without a
//! device or browser. Time is measured with `tokio::time`, which makes the
//! timeline deterministic under a paused test clock.
//!
//! Matching rules:
//! - an element matches a strategy listed in its `locators`, or any textual
//!   strategy whose text test accepts the element's current text
//! - `find` returns a handle for every matching element that is declared,
//!   even before it appears; the handle's `exists()` tells the truth
//! - a strategy matching no declared element yields an empty set

use crate::driver::{
    DriverError, DriverResult, ElementHandle, GestureDriver, Resolver, Screenshot, SnapshotSource,
};
use crate::gesture::{SwipeDirection, SwipeRegion};
use crate::locator::LocatorStrategy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// PNG signature, used as the body of scripted screenshots
const PNG_MAGIC: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// One element on the scripted timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedElement {
    /// Stable identifier, used in the page source
    pub id: String,
    /// Strategies that find this element regardless of its text
    #[serde(default)]
    pub locators: Vec<LocatorStrategy>,
    /// Visible text
    #[serde(default)]
    pub text: String,
    /// Milliseconds after the UI starts before the element exists
    #[serde(default)]
    pub appears_at_ms: u64,
    /// Milliseconds after the UI starts when the element is removed
    #[serde(default)]
    pub disappears_at_ms: Option<u64>,
    /// Number of swipes required before the element exists
    #[serde(default)]
    pub after_swipes: usize,
    /// Whether the element is displayed once it exists
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Clicking raises a transport error
    #[serde(default)]
    pub click_fails: bool,
}

const fn default_visible() -> bool {
    true
}

impl ScriptedElement {
    /// Create an element present from the start
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            locators: Vec::new(),
            text: String::new(),
            appears_at_ms: 0,
            disappears_at_ms: None,
            after_swipes: 0,
            visible: true,
            click_fails: false,
        }
    }

    /// Add a strategy that finds this element
    #[must_use]
    pub fn locator(mut self, strategy: LocatorStrategy) -> Self {
        self.locators.push(strategy);
        self
    }

    /// Set visible text
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Appear after `ms` milliseconds
    #[must_use]
    pub const fn appears_at(mut self, ms: u64) -> Self {
        self.appears_at_ms = ms;
        self
    }

    /// Disappear after `ms` milliseconds
    #[must_use]
    pub const fn disappears_at(mut self, ms: u64) -> Self {
        self.disappears_at_ms = Some(ms);
        self
    }

    /// Appear only after `count` swipes
    #[must_use]
    pub const fn after_swipes(mut self, count: usize) -> Self {
        self.after_swipes = count;
        self
    }

    /// Exist without being displayed
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Make clicks raise a transport error
    #[must_use]
    pub const fn failing_click(mut self) -> Self {
        self.click_fails = true;
        self
    }

    fn matches(&self, strategy: &LocatorStrategy) -> bool {
        self.locators.contains(strategy)
            || (strategy.kind().is_textual() && strategy.matches_text(&self.text))
    }

    fn exists_at(&self, now: Duration, swipes: usize) -> bool {
        let appeared = now >= Duration::from_millis(self.appears_at_ms);
        let gone = self
            .disappears_at_ms
            .is_some_and(|ms| now >= Duration::from_millis(ms));
        appeared && !gone && swipes >= self.after_swipes
    }
}

/// Swipe recorded by the scripted gesture driver
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSwipe {
    /// Region swiped
    pub region: SwipeRegion,
    /// Direction
    pub direction: SwipeDirection,
    /// Magnitude
    pub magnitude: f64,
}

#[derive(Debug, Default)]
struct UiState {
    elements: Vec<ScriptedElement>,
    find_failures: HashMap<LocatorStrategy, usize>,
    swipes: Vec<RecordedSwipe>,
    call_history: Vec<String>,
    fail_gestures: bool,
    fail_page_source: bool,
    fail_screenshot: bool,
}

/// In-memory UI driven by a timeline
#[derive(Debug, Clone)]
pub struct ScriptedUi {
    epoch: Instant,
    state: Arc<Mutex<UiState>>,
}

impl Default for ScriptedUi {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedUi {
    /// Create an empty UI; its clock starts now
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            state: Arc::new(Mutex::new(UiState::default())),
        }
    }

    /// Create a UI holding `elements`
    #[must_use]
    pub fn with_elements(elements: impl IntoIterator<Item = ScriptedElement>) -> Self {
        let ui = Self::new();
        for element in elements {
            ui.add(element);
        }
        ui
    }

    /// Add an element to the timeline
    pub fn add(&self, element: ScriptedElement) {
        self.lock().elements.push(element);
    }

    /// Make the next `count` finds for `strategy` raise a transport error
    pub fn fail_next_finds(&self, strategy: LocatorStrategy, count: usize) {
        self.lock().find_failures.insert(strategy, count);
    }

    /// Make every gesture raise a transport error
    pub fn fail_gestures(&self, fail: bool) {
        self.lock().fail_gestures = fail;
    }

    /// Make page source capture fail
    pub fn fail_page_source(&self, fail: bool) {
        self.lock().fail_page_source = fail;
    }

    /// Make screenshot capture fail
    pub fn fail_screenshot(&self, fail: bool) {
        self.lock().fail_screenshot = fail;
    }

    /// Time since the UI was created
    #[must_use]
    pub fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Swipes performed so far
    #[must_use]
    pub fn swipes(&self) -> Vec<RecordedSwipe> {
        self.lock().swipes.clone()
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().call_history.clone()
    }

    /// Check if a call starting with `prefix` was made
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.lock().call_history.iter().any(|c| c.starts_with(prefix))
    }

    /// Count calls starting with `prefix`
    #[must_use]
    pub fn call_count(&self, prefix: &str) -> usize {
        self.lock()
            .call_history
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Current text of element `id`
    #[must_use]
    pub fn text_of(&self, id: &str) -> Option<String> {
        self.lock()
            .elements
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.text.clone())
    }

    fn lock(&self) -> MutexGuard<'_, UiState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn element_exists(&self, index: usize) -> bool {
        let now = self.now();
        let state = self.lock();
        let swipes = state.swipes.len();
        state
            .elements
            .get(index)
            .is_some_and(|e| e.exists_at(now, swipes))
    }
}

#[async_trait]
impl Resolver for ScriptedUi {
    type Handle = ScriptedHandle;

    async fn find(&self, strategy: &LocatorStrategy) -> DriverResult<Vec<ScriptedHandle>> {
        let mut state = self.lock();
        state.call_history.push(format!("find:{strategy}"));

        if let Some(remaining) = state.find_failures.get_mut(strategy) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(DriverError::transport(format!(
                    "scripted failure finding {strategy}"
                )));
            }
        }

        Ok(state
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.matches(strategy))
            .map(|(index, _)| ScriptedHandle {
                ui: self.clone(),
                index,
            })
            .collect())
    }
}

#[async_trait]
impl GestureDriver for ScriptedUi {
    async fn perform_swipe(
        &self,
        region: &SwipeRegion,
        direction: SwipeDirection,
        magnitude: f64,
    ) -> DriverResult<()> {
        let mut state = self.lock();
        state.call_history.push(format!("swipe:{direction}"));
        if state.fail_gestures {
            return Err(DriverError::transport("scripted gesture failure"));
        }
        state.swipes.push(RecordedSwipe {
            region: *region,
            direction,
            magnitude,
        });
        Ok(())
    }
}

#[async_trait]
impl SnapshotSource for ScriptedUi {
    async fn page_source(&self) -> DriverResult<String> {
        let now = self.now();
        let mut state = self.lock();
        state.call_history.push("page_source".to_string());
        if state.fail_page_source {
            return Err(DriverError::transport("scripted page source failure"));
        }
        let swipes = state.swipes.len();
        let mut xml = String::from("<hierarchy>\n");
        for element in state.elements.iter().filter(|e| e.exists_at(now, swipes)) {
            let _ = writeln!(
                xml,
                "  <node id=\"{}\" text=\"{}\" displayed=\"{}\"/>",
                escape_xml(&element.id),
                escape_xml(&element.text),
                element.visible
            );
        }
        xml.push_str("</hierarchy>\n");
        Ok(xml)
    }

    async fn screenshot(&self) -> DriverResult<Screenshot> {
        let mut state = self.lock();
        state.call_history.push("screenshot".to_string());
        if state.fail_screenshot {
            return Err(DriverError::transport("scripted screenshot failure"));
        }
        Ok(Screenshot::new(PNG_MAGIC.to_vec(), 1080, 1920))
    }
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Handle to one scripted element
#[derive(Debug, Clone)]
pub struct ScriptedHandle {
    ui: ScriptedUi,
    index: usize,
}

impl ScriptedHandle {
    /// Identifier of the underlying element
    #[must_use]
    pub fn id(&self) -> String {
        self.ui
            .lock()
            .elements
            .get(self.index)
            .map(|e| e.id.clone())
            .unwrap_or_default()
    }

    fn require_live(&self, operation: &str) -> DriverResult<()> {
        if self.ui.element_exists(self.index) {
            Ok(())
        } else {
            Err(DriverError::stale(format!("{operation} on {}", self.id())))
        }
    }
}

#[async_trait]
impl ElementHandle for ScriptedHandle {
    async fn exists(&self) -> DriverResult<bool> {
        Ok(self.ui.element_exists(self.index))
    }

    async fn is_visible(&self) -> DriverResult<bool> {
        let exists = self.ui.element_exists(self.index);
        let visible = self
            .ui
            .lock()
            .elements
            .get(self.index)
            .is_some_and(|e| e.visible);
        Ok(exists && visible)
    }

    async fn read_text(&self) -> DriverResult<String> {
        self.require_live("read_text")?;
        Ok(self
            .ui
            .lock()
            .elements
            .get(self.index)
            .map(|e| e.text.clone())
            .unwrap_or_default())
    }

    async fn click(&self) -> DriverResult<()> {
        self.require_live("click")?;
        let mut state = self.ui.lock();
        let (id, fails) = state
            .elements
            .get(self.index)
            .map(|e| (e.id.clone(), e.click_fails))
            .unwrap_or_default();
        state.call_history.push(format!("click:{id}"));
        if fails {
            return Err(DriverError::transport(format!("click on {id} was not delivered")));
        }
        Ok(())
    }

    async fn set_value(&self, value: &str) -> DriverResult<()> {
        self.require_live("set_value")?;
        let mut state = self.ui.lock();
        if let Some(element) = state.elements.get_mut(self.index) {
            element.text = value.to_string();
            let entry = format!("set_value:{}", element.id);
            state.call_history.push(entry);
        }
        Ok(())
    }
}
