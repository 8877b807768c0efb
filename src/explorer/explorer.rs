use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::driver::selector::ScrollDirection;
use crate::driver::{Driver, DriverError};
use crate::guard::{AppGuard, GuardEvent, CheckDepth, HealthState};
use crate::screen::classifier::resolve_element;
use crate::screen::{ElementDescriptor, ScreenSignature, compute_signature, discover};
use crate::trace::{CrawlEvent, CrawlEventKind, TraceLogger};

use super::nav_graph::{ExplorerConfig, NavigationGraph, NavigationStep};
use super::policy::{generate_test_value, is_toggle, should_skip};
use super::state::{
    ElementKey, ExplorationState, Incident, IncidentKind, Interaction, InteractionOutcome,
    VisitKey,
};

/// Downward scrolls per screen during discovery.
const MAX_DISCOVERY_SCROLLS: usize = 5;

/// Scrolls in a row that reveal nothing before discovery gives up.
const MAX_IDLE_SCROLLS: usize = 2;

/// Back presses tried when restoring a screen after a popup item.
const MAX_RESTORE_BACKS: usize = 3;

// ============================================================================
// Outcomes
// ============================================================================

/// How a `visit` ended, as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitOutcome {
    Explored,
    AlreadyCovered,
    LimitReached,
    /// The visit already pressed back itself
    BackedOut,
    Abandoned,
}

/// Result of one guarded recovery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovery {
    Healthy,
    CrashDismissed,
    /// The app was relaunched; the crawl is back on the launch screen
    Restarted,
    Fatal,
}

#[derive(Debug)]
enum TapOutcome {
    Navigated(ScreenSignature),
    Popup(Vec<ElementDescriptor>),
    NoChange,
    Disrupted(Recovery),
    Failed(String),
    /// The tap went through but the resulting screen could not be measured
    Unmeasured,
}

/// Why the run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Every reachable clickable was exhausted
    Completed,
    TimedOut,
    CrashCeiling,
    AppUnrecoverable,
}

// ============================================================================
// ExplorationReport
// ============================================================================

/// Everything a finished run produced. Always returned, even after a fatal crash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationReport {
    pub app_package: String,
    pub graph: NavigationGraph,
    pub screens_discovered: usize,
    pub total_elements: usize,
    pub elements_interacted: usize,
    /// Screen explorations performed, including re-explorations
    pub screen_visits: usize,
    pub interactions: Vec<Interaction>,
    pub incidents: Vec<Incident>,
    pub crash_count: usize,
    pub stuck_escapes: u32,
    pub elapsed_ms: u128,
    pub termination: Termination,
}

impl ExplorationReport {
    /// Incidents pointing at app instability.
    pub fn critical_incidents(&self) -> Vec<&Incident> {
        self.incidents.iter().filter(|i| i.is_critical()).collect()
    }

    /// Incidents caused by the automation channel rather than the app.
    pub fn noise_incidents(&self) -> Vec<&Incident> {
        self.incidents.iter().filter(|i| !i.is_critical()).collect()
    }

    pub fn incidents_of(&self, kind: IncidentKind) -> usize {
        self.incidents.iter().filter(|i| i.kind == kind).count()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ============================================================================
// Explorer
// ============================================================================

/// Depth-first crawler over the screens of one app.
///
/// Owns the driver borrow for the whole run. Each screen goes through
/// discovery, scroll discovery, form filling, toggling and then one tap per
/// clickable, recursing whenever a tap leads to a different screen.
pub struct Explorer<'a> {
    driver: &'a mut dyn Driver,
    config: ExplorerConfig,
    guard: AppGuard,
    graph: NavigationGraph,
    state: ExplorationState,
    tracer: TraceLogger,
    screen_visits: usize,
}

impl<'a> Explorer<'a> {
    pub fn new(driver: &'a mut dyn Driver, config: ExplorerConfig) -> Self {
        let guard = AppGuard::new(&config.app_package)
            .with_max_crashes(config.max_crash_recoveries)
            .with_pacing(config.pacing.retry_pause_ms, config.pacing.after_restart_ms);

        Self {
            driver,
            config,
            guard,
            graph: NavigationGraph::new(),
            state: ExplorationState::new(),
            tracer: TraceLogger::disabled(),
            screen_visits: 0,
        }
    }

    pub fn with_tracer(mut self, tracer: TraceLogger) -> Self {
        self.tracer = tracer;
        self
    }

    /// Crawl from the current screen until every branch is exhausted or a limit hits.
    pub fn explore(mut self) -> ExplorationReport {
        info!(
            package = %self.config.app_package,
            max_depth = self.config.max_depth,
            dedup = ?self.config.dedup,
            "starting exploration"
        );
        self.state = ExplorationState::new();
        self.trace(CrawlEvent::now(CrawlEventKind::RunStarted, 0).with_detail(&self.config.app_package));

        self.visit(&[]);

        let report = self.into_report();
        info!(
            screens = report.screens_discovered,
            elements = report.total_elements,
            interacted = report.elements_interacted,
            termination = ?report.termination,
            "exploration finished"
        );
        report
    }

    fn into_report(self) -> ExplorationReport {
        let termination = if self.state.timed_out {
            Termination::TimedOut
        } else if self.guard.ceiling_reached() {
            Termination::CrashCeiling
        } else if self.state.fatal {
            Termination::AppUnrecoverable
        } else {
            Termination::Completed
        };

        self.tracer.log(
            &CrawlEvent::now(CrawlEventKind::RunFinished, 0).with_detail(format!("{:?}", termination)),
        );

        let crash_count = self
            .state
            .incidents
            .iter()
            .filter(|i| i.kind.is_crash())
            .count();

        ExplorationReport {
            app_package: self.config.app_package.clone(),
            screens_discovered: self.graph.screen_count(),
            total_elements: self.graph.total_elements(),
            elements_interacted: self.state.interacted.len(),
            screen_visits: self.screen_visits,
            crash_count,
            stuck_escapes: self.state.stuck_escapes,
            elapsed_ms: self.state.elapsed().as_millis(),
            termination,
            interactions: self.state.interactions,
            incidents: self.state.incidents,
            graph: self.graph,
        }
    }

    // ------------------------------------------------------------------------
    // Screen visit
    // ------------------------------------------------------------------------

    fn visit(&mut self, path: &[NavigationStep]) -> VisitOutcome {
        if self.out_of_time() {
            return VisitOutcome::LimitReached;
        }
        if self.state.depth >= self.config.max_depth {
            debug!(depth = self.state.depth, "max depth reached");
            return VisitOutcome::LimitReached;
        }

        let mut signature = self.measure();

        if self
            .state
            .observe_visit(&signature, self.config.stuck_threshold)
        {
            warn!(%signature, "same screen keeps coming back, backing out");
            self.incident(
                IncidentKind::Stuck,
                Some(&signature),
                format!("{} consecutive visits", self.config.stuck_threshold),
            );
            self.trace(CrawlEvent::now(CrawlEventKind::Stuck, self.state.depth).with_screen(&signature));
            self.back();
            return VisitOutcome::BackedOut;
        }

        match self.recover(CheckDepth::Deep, Some(&signature)) {
            Recovery::Fatal => return VisitOutcome::Abandoned,
            // Relaunched onto the launch screen, which is only this screen at the root
            Recovery::Restarted if !path.is_empty() => return VisitOutcome::Abandoned,
            // The dismissed dialog's text may have leaked into the first measurement
            Recovery::Restarted | Recovery::CrashDismissed => signature = self.measure(),
            Recovery::Healthy => {}
        }

        if signature.is_fallback() {
            warn!("screen could not be identified, skipping it");
            self.incident(
                IncidentKind::DriverError,
                None,
                "screen signature unavailable".to_string(),
            );
            return VisitOutcome::Abandoned;
        }

        let key = VisitKey::new(self.config.dedup, &signature, self.state.depth);
        if !self.state.mark_visited(key) {
            debug!(%signature, "screen already explored");
            if let Some(node) = self.graph.screens.get_mut(&signature) {
                node.offer_path(path);
            }
            self.trace(
                CrawlEvent::now(CrawlEventKind::AlreadyExplored, self.state.depth)
                    .with_screen(&signature),
            );
            return VisitOutcome::AlreadyCovered;
        }

        self.state.depth += 1;
        let outcome = self.explore_screen(&signature, path);
        self.state.depth -= 1;
        outcome
    }

    fn explore_screen(&mut self, signature: &ScreenSignature, path: &[NavigationStep]) -> VisitOutcome {
        self.screen_visits += 1;
        info!(depth = self.state.depth, %signature, "exploring screen");
        self.trace(CrawlEvent::now(CrawlEventKind::ScreenEntered, self.state.depth).with_screen(signature));

        if self.graph.root.is_none() {
            self.graph.root = Some(signature.clone());
        }
        self.graph.node_mut(signature).offer_path(path);

        if self.guard.crash_dialog_check(self.driver) == HealthState::CrashDialogDetected {
            warn!(%signature, "crash dialog present on entry");
            match self.recover(CheckDepth::Quick, Some(signature)) {
                Recovery::Healthy | Recovery::CrashDismissed => {}
                _ => return VisitOutcome::Abandoned,
            }
        }

        let elements = discover(self.driver);
        if elements.is_empty() {
            debug!(%signature, "no elements discovered");
            match self.recover(CheckDepth::Deep, Some(signature)) {
                Recovery::Healthy | Recovery::CrashDismissed => {}
                _ => return VisitOutcome::Abandoned,
            }
        }
        self.graph.node_mut(signature).merge_elements(&elements);

        if self.config.scroll_to_discover {
            self.scroll_discover(signature);
        }
        if self.config.fill_forms {
            self.fill_forms(signature);
        }
        if self.config.toggle_switches {
            self.toggle_switches(signature);
        }

        self.interact_with_clickables(signature, path)
    }

    // ------------------------------------------------------------------------
    // Discovery phases
    // ------------------------------------------------------------------------

    fn scroll_discover(&mut self, signature: &ScreenSignature) {
        let mut scrolled = 0;
        let mut idle = 0;

        for _ in 0..MAX_DISCOVERY_SCROLLS {
            if let Err(e) = self.driver.scroll(ScrollDirection::Down) {
                debug!("scroll down failed: {}", e);
                break;
            }
            scrolled += 1;
            self.driver.settle(self.config.pacing.after_scroll_ms);

            let found = discover(self.driver);
            let added = self.graph.node_mut(signature).merge_elements(&found);
            if added > 0 {
                debug!(added, "scrolling revealed new elements");
                idle = 0;
            } else {
                idle += 1;
                if idle >= MAX_IDLE_SCROLLS {
                    break;
                }
            }
        }

        // Best effort; a screen that is not fully back at the top is tolerated
        for _ in 0..scrolled {
            if self.driver.scroll(ScrollDirection::Up).is_err() {
                break;
            }
            self.driver.settle(self.config.pacing.after_scroll_ms);
        }
    }

    fn fill_forms(&mut self, signature: &ScreenSignature) {
        let fields: Vec<ElementDescriptor> = match self.graph.node(signature) {
            Some(node) => node.text_fields().filter(|f| !should_skip(f)).cloned().collect(),
            None => return,
        };

        for field in &fields {
            let key = ElementKey::direct(signature, &field.id);
            if !self.state.mark_interacted(key) {
                continue;
            }

            let value = generate_test_value(&field.id);
            match self.type_into(field, value) {
                Ok(()) => {
                    debug!(field = %field.id, value, "filled text field");
                    self.state.record_interaction(
                        signature,
                        &field.id,
                        None,
                        InteractionOutcome::Filled {
                            value: value.to_string(),
                        },
                    );
                    self.trace(
                        CrawlEvent::now(CrawlEventKind::Filled, self.state.depth)
                            .with_screen(signature)
                            .with_element(&field.id)
                            .with_detail(value),
                    );
                }
                Err(e) => {
                    self.state.record_interaction(
                        signature,
                        &field.id,
                        None,
                        InteractionOutcome::Failed {
                            reason: e.to_string(),
                        },
                    );
                    self.incident(
                        IncidentKind::InteractionFailed,
                        Some(signature),
                        format!("fill {}: {}", field.id, e),
                    );
                }
            }
        }

        if let Err(e) = self.driver.hide_keyboard() {
            debug!("hide keyboard: {}", e);
        }
    }

    fn type_into(&mut self, field: &ElementDescriptor, value: &str) -> Result<(), DriverError> {
        let handle = resolve_element(self.driver, field)?;
        self.driver.type_text(&handle, value)?;
        self.driver.settle(self.config.pacing.after_type_ms);
        Ok(())
    }

    /// Flip each switch/checkbox and flip it back, leaving the screen as found.
    fn toggle_switches(&mut self, signature: &ScreenSignature) {
        let toggles: Vec<ElementDescriptor> = match self.graph.node(signature) {
            Some(node) => node
                .clickables()
                .filter(|e| is_toggle(e) && !should_skip(e))
                .cloned()
                .collect(),
            None => return,
        };

        for toggle in &toggles {
            if !self.state.mark_interacted(ElementKey::direct(signature, &toggle.id)) {
                continue;
            }

            let result = self.tap_element(toggle).and_then(|()| self.tap_element(toggle));
            let outcome = match result {
                Ok(()) => InteractionOutcome::Toggled,
                Err(e) => {
                    self.incident(
                        IncidentKind::InteractionFailed,
                        Some(signature),
                        format!("toggle {}: {}", toggle.id, e),
                    );
                    InteractionOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            if outcome == InteractionOutcome::Toggled {
                self.trace(
                    CrawlEvent::now(CrawlEventKind::Toggled, self.state.depth)
                        .with_screen(signature)
                        .with_element(&toggle.id),
                );
            }
            self.state.record_interaction(signature, &toggle.id, None, outcome);
        }
    }

    // ------------------------------------------------------------------------
    // Clickable interaction
    // ------------------------------------------------------------------------

    fn interact_with_clickables(
        &mut self,
        signature: &ScreenSignature,
        path: &[NavigationStep],
    ) -> VisitOutcome {
        let clickables: Vec<ElementDescriptor> = match self.graph.node(signature) {
            // Popup items are only reachable through their trigger
            Some(node) => node
                .clickables()
                .filter(|e| e.triggered_by.is_none())
                .cloned()
                .collect(),
            None => return VisitOutcome::Explored,
        };

        for element in &clickables {
            if self.out_of_time() {
                break;
            }
            let key = ElementKey::direct(signature, &element.id);
            if self.state.has_interacted(&key) || should_skip(element) {
                continue;
            }

            match self.recover(CheckDepth::Quick, Some(signature)) {
                Recovery::Fatal => break,
                Recovery::Restarted | Recovery::CrashDismissed => {
                    if !self.verify_return(signature, path) {
                        return self.abandon_screen(signature);
                    }
                }
                Recovery::Healthy => {}
            }

            let before = match self.measure() {
                measured if measured.is_fallback() => signature.clone(),
                measured => measured,
            };
            self.state.mark_interacted(key);
            debug!(element = %element.id, "tapping");
            self.trace(
                CrawlEvent::now(CrawlEventKind::Tap, self.state.depth)
                    .with_screen(signature)
                    .with_element(&element.id),
            );

            match self.tap_and_classify(element, &before, signature) {
                TapOutcome::Failed(reason) => {
                    self.incident(
                        IncidentKind::InteractionFailed,
                        Some(signature),
                        format!("tap {}: {}", element.id, reason),
                    );
                    self.state.record_interaction(
                        signature,
                        &element.id,
                        None,
                        InteractionOutcome::Failed { reason },
                    );
                }
                TapOutcome::Disrupted(recovery) => {
                    self.state.record_interaction(
                        signature,
                        &element.id,
                        None,
                        InteractionOutcome::Crashed,
                    );
                    if recovery == Recovery::Fatal {
                        break;
                    }
                    if !self.verify_return(&before, path) {
                        return self.abandon_screen(signature);
                    }
                }
                TapOutcome::Unmeasured => {
                    self.unmeasured_tap(signature, element, None);
                    if !self.verify_return(&before, path) {
                        return self.abandon_screen(signature);
                    }
                }
                TapOutcome::NoChange => {
                    self.trace(
                        CrawlEvent::now(CrawlEventKind::NoChange, self.state.depth)
                            .with_screen(signature)
                            .with_element(&element.id),
                    );
                    self.state.record_interaction(
                        signature,
                        &element.id,
                        None,
                        InteractionOutcome::NoChange,
                    );
                }
                TapOutcome::Navigated(target) => {
                    self.follow(signature, path, element, None, target);
                    if !self.verify_return(&before, path) {
                        return self.abandon_screen(signature);
                    }
                }
                TapOutcome::Popup(revealed) => {
                    if !self.explore_popup(signature, path, element, &before, revealed) {
                        return self.abandon_screen(signature);
                    }
                }
            }
        }

        VisitOutcome::Explored
    }

    /// Tap `element` and work out what the tap did.
    fn tap_and_classify(
        &mut self,
        element: &ElementDescriptor,
        before: &ScreenSignature,
        screen: &ScreenSignature,
    ) -> TapOutcome {
        if let Err(e) = self.tap_element(element) {
            return TapOutcome::Failed(e.to_string());
        }

        match self.recover(CheckDepth::Quick, Some(screen)) {
            Recovery::Healthy => {}
            other => return TapOutcome::Disrupted(other),
        }

        let after = self.measure();
        if after.is_fallback() {
            return TapOutcome::Unmeasured;
        }
        if &after != before {
            return TapOutcome::Navigated(after);
        }

        let known = self.graph.node(screen);
        let revealed: Vec<ElementDescriptor> = discover(self.driver)
            .into_iter()
            .filter(|e| known.is_none_or(|n| n.element(&e.id).is_none()))
            .collect();

        if revealed.is_empty() {
            TapOutcome::NoChange
        } else {
            TapOutcome::Popup(revealed)
        }
    }

    /// Record the edge for a navigating tap, recurse, and come back.
    fn follow(
        &mut self,
        screen: &ScreenSignature,
        path: &[NavigationStep],
        element: &ElementDescriptor,
        via_trigger: Option<&str>,
        target: ScreenSignature,
    ) {
        info!(from = %screen, element = %element.id, to = %target, "navigated");
        self.trace(
            CrawlEvent::now(CrawlEventKind::Navigated, self.state.depth)
                .with_screen(screen)
                .with_element(&element.id)
                .with_target(&target),
        );
        self.state.record_interaction(
            screen,
            &element.id,
            via_trigger,
            InteractionOutcome::Navigated { to: target.clone() },
        );

        let step = NavigationStep {
            from_screen: screen.clone(),
            element_tapped: element.id.clone(),
            to_screen: target,
        };
        self.graph.node_mut(screen).add_edge(step.clone());

        let mut child_path = path.to_vec();
        child_path.push(step);
        match self.visit(&child_path) {
            VisitOutcome::BackedOut => {}
            // A restart or failed replay may already have left the child
            VisitOutcome::Abandoned if self.measure() == *screen => {}
            _ => self.back(),
        }
    }

    /// Log a tap whose effect could not be observed.
    fn unmeasured_tap(
        &mut self,
        screen: &ScreenSignature,
        element: &ElementDescriptor,
        via_trigger: Option<&str>,
    ) {
        let reason = "screen unreadable after tap".to_string();
        self.incident(
            IncidentKind::DriverError,
            Some(screen),
            format!("{}: {}", element.id, reason),
        );
        self.state.record_interaction(
            screen,
            &element.id,
            via_trigger,
            InteractionOutcome::Failed { reason },
        );
    }

    // ------------------------------------------------------------------------
    // Popups
    // ------------------------------------------------------------------------

    /// Handle elements that a tap revealed without leaving the screen.
    ///
    /// Each clickable item is reached by re-opening the popup through its
    /// trigger, since the popup closes as soon as anything else is touched.
    /// Returns false when the screen could not be restored.
    fn explore_popup(
        &mut self,
        screen: &ScreenSignature,
        path: &[NavigationStep],
        trigger: &ElementDescriptor,
        before: &ScreenSignature,
        revealed: Vec<ElementDescriptor>,
    ) -> bool {
        info!(trigger = %trigger.id, items = revealed.len(), "popup revealed elements");
        self.trace(
            CrawlEvent::now(CrawlEventKind::Popup, self.state.depth)
                .with_screen(screen)
                .with_element(&trigger.id)
                .with_detail(revealed.len()),
        );
        self.state.record_interaction(
            screen,
            &trigger.id,
            None,
            InteractionOutcome::Popup {
                revealed: revealed.len(),
            },
        );

        let items: Vec<ElementDescriptor> = revealed
            .into_iter()
            .map(|mut e| {
                e.triggered_by = Some(trigger.id.clone());
                e.path_to_trigger = Some(path.to_vec());
                e
            })
            .collect();
        self.graph.node_mut(screen).merge_elements(&items);

        if !self.restore_screen(before, path, &items) {
            return false;
        }

        for item in items.iter().filter(|e| e.is_clickable && !should_skip(e)) {
            if self.out_of_time() {
                break;
            }
            if !self.state.mark_interacted(ElementKey::menu(screen, &item.id)) {
                continue;
            }

            if self.recover(CheckDepth::Quick, Some(screen)) == Recovery::Fatal {
                return false;
            }

            if let Err(e) = self.tap_element(trigger) {
                self.incident(
                    IncidentKind::InteractionFailed,
                    Some(screen),
                    format!("reopen {} for {}: {}", trigger.id, item.id, e),
                );
                self.state.record_interaction(
                    screen,
                    &item.id,
                    Some(trigger.id.as_str()),
                    InteractionOutcome::Failed {
                        reason: e.to_string(),
                    },
                );
                continue;
            }

            match self.tap_and_classify(item, before, screen) {
                TapOutcome::Navigated(target) => {
                    self.follow(screen, path, item, Some(trigger.id.as_str()), target);
                }
                TapOutcome::Disrupted(recovery) => {
                    self.state.record_interaction(
                        screen,
                        &item.id,
                        Some(trigger.id.as_str()),
                        InteractionOutcome::Crashed,
                    );
                    if recovery == Recovery::Fatal {
                        return false;
                    }
                }
                TapOutcome::Unmeasured => {
                    self.unmeasured_tap(screen, item, Some(trigger.id.as_str()));
                }
                TapOutcome::Failed(reason) => {
                    self.incident(
                        IncidentKind::InteractionFailed,
                        Some(screen),
                        format!("tap {} via {}: {}", item.id, trigger.id, reason),
                    );
                    self.state.record_interaction(
                        screen,
                        &item.id,
                        Some(trigger.id.as_str()),
                        InteractionOutcome::Failed { reason },
                    );
                }
                // Nested popups are not explored further
                TapOutcome::NoChange | TapOutcome::Popup(_) => {
                    self.state.record_interaction(
                        screen,
                        &item.id,
                        Some(trigger.id.as_str()),
                        InteractionOutcome::NoChange,
                    );
                }
            }

            if !self.restore_screen(before, path, &items) {
                return false;
            }
        }

        true
    }

    fn popup_open(&mut self, items: &[ElementDescriptor]) -> bool {
        items
            .iter()
            .any(|item| resolve_element(self.driver, item).is_ok())
    }

    /// Get back to `expected` with the popup closed: a few back presses, then a path replay.
    fn restore_screen(
        &mut self,
        expected: &ScreenSignature,
        path: &[NavigationStep],
        popup: &[ElementDescriptor],
    ) -> bool {
        for _ in 0..MAX_RESTORE_BACKS {
            if self.guard.quick_health_check(self.driver) != HealthState::Healthy {
                break;
            }
            if &self.measure() == expected && !self.popup_open(popup) {
                return true;
            }
            self.back();
        }

        if self.guard.quick_health_check(self.driver) == HealthState::Healthy
            && &self.measure() == expected
            && !self.popup_open(popup)
        {
            return true;
        }
        self.replay_path(expected, path)
    }

    // ------------------------------------------------------------------------
    // Returning to a screen
    // ------------------------------------------------------------------------

    /// Confirm the crawl is on `expected`; replay `path` from the root if not.
    fn verify_return(&mut self, expected: &ScreenSignature, path: &[NavigationStep]) -> bool {
        let now = self.measure();
        if &now == expected {
            return true;
        }
        debug!(%expected, actual = %now, "not on the expected screen, replaying path");
        self.replay_path(expected, path)
    }

    /// Back out to the root screen (relaunching if the app is left), then replay `path`.
    fn replay_path(&mut self, expected: &ScreenSignature, path: &[NavigationStep]) -> bool {
        if self.state.fatal || self.guard.ceiling_reached() {
            return false;
        }
        let Some(root) = self.graph.root.clone() else {
            return false;
        };

        let mut at_root = false;
        for _ in 0..=self.config.max_depth {
            if self.guard.quick_health_check(self.driver) != HealthState::Healthy {
                break;
            }
            if self.measure() == root {
                at_root = true;
                break;
            }
            self.back();
        }

        if !at_root {
            if !self.restart() {
                return false;
            }
            at_root = self.measure() == root;
        }

        if at_root && path.iter().all(|step| self.replay_step(step)) {
            if &self.measure() == expected {
                return true;
            }
        }

        warn!(%expected, "could not return to screen");
        self.incident(
            IncidentKind::ReturnFailed,
            Some(expected),
            format!("path replay of {} steps failed", path.len()),
        );
        self.trace(CrawlEvent::now(CrawlEventKind::ReturnFailed, self.state.depth).with_screen(expected));
        false
    }

    fn replay_step(&mut self, step: &NavigationStep) -> bool {
        let Some(element) = self
            .graph
            .element(&step.from_screen, &step.element_tapped)
            .cloned()
        else {
            return false;
        };

        if let Some(trigger_id) = &element.triggered_by {
            let Some(trigger) = self.graph.element(&step.from_screen, trigger_id).cloned() else {
                return false;
            };
            if self.tap_element(&trigger).is_err() {
                return false;
            }
        }

        self.tap_element(&element).is_ok() && self.measure() == step.to_screen
    }

    fn abandon_screen(&mut self, signature: &ScreenSignature) -> VisitOutcome {
        warn!(%signature, "abandoning remaining elements of screen");
        VisitOutcome::Abandoned
    }

    // ------------------------------------------------------------------------
    // Driver helpers
    // ------------------------------------------------------------------------

    fn tap_element(&mut self, element: &ElementDescriptor) -> Result<(), DriverError> {
        let handle = resolve_element(self.driver, element)?;
        self.driver.tap(&handle)?;
        self.driver.settle(self.config.pacing.after_tap_ms);
        Ok(())
    }

    fn back(&mut self) {
        if let Err(e) = self.driver.navigate_back() {
            debug!("back failed: {}", e);
        }
        self.driver.settle(self.config.pacing.after_back_ms);

        // Backing out of the launch screen closes the app; that is not a crash
        if !self.state.fatal
            && self.guard.quick_health_check(self.driver) == HealthState::OutsideApp
        {
            info!("back closed the app, relaunching");
            self.incident(
                IncidentKind::LeftApp,
                None,
                "back closed the app".to_string(),
            );
            self.restart();
        }
    }

    /// Measure the current screen, retrying once when the driver hiccups.
    fn measure(&mut self) -> ScreenSignature {
        let signature = compute_signature(self.driver);
        if !signature.is_fallback() {
            return signature;
        }
        debug!("screen measurement failed, retrying");
        self.driver.settle(self.config.pacing.retry_pause_ms);
        compute_signature(self.driver)
    }

    fn restart(&mut self) -> bool {
        let restarted = self.guard.restart_app(self.driver);
        self.drain_guard_events(None);
        if !restarted {
            self.state.fatal = true;
        }
        restarted
    }

    // ------------------------------------------------------------------------
    // Guard bridge
    // ------------------------------------------------------------------------

    fn recover(&mut self, depth: CheckDepth, screen: Option<&ScreenSignature>) -> Recovery {
        let healthy = self.guard.recover(self.driver, depth);
        let events = self.drain_guard_events(screen);

        if !healthy {
            self.state.fatal = true;
            return Recovery::Fatal;
        }
        if events.contains(&GuardEvent::Restarted) {
            Recovery::Restarted
        } else if events
            .iter()
            .any(|e| matches!(e, GuardEvent::CrashDismissed { .. }))
        {
            Recovery::CrashDismissed
        } else {
            Recovery::Healthy
        }
    }

    /// Move guard events into the incident log.
    fn drain_guard_events(&mut self, screen: Option<&ScreenSignature>) -> Vec<GuardEvent> {
        let events = self.guard.take_events();
        for event in &events {
            let (kind, detail) = match event {
                GuardEvent::LeftApp { package } => (
                    IncidentKind::LeftApp,
                    format!("foreground package {}", package.as_deref().unwrap_or("unknown")),
                ),
                GuardEvent::AppDied { package } => (
                    IncidentKind::AppDied,
                    format!(
                        "app task gone, foreground package {}",
                        package.as_deref().unwrap_or("unknown")
                    ),
                ),
                GuardEvent::CrashDismissed { crash_count } => {
                    (IncidentKind::Crash, format!("crash dialog dismissed ({} this run)", crash_count))
                }
                GuardEvent::CeilingReached { crash_count } => (
                    IncidentKind::CrashCeiling,
                    format!("{} crashes, giving up", crash_count),
                ),
                GuardEvent::Restarted => (IncidentKind::Restarted, "app restarted".to_string()),
                GuardEvent::RestartFailed => {
                    (IncidentKind::RestartFailed, "app could not be restarted".to_string())
                }
            };
            self.incident(kind, screen, detail);
        }
        events
    }

    fn incident(&mut self, kind: IncidentKind, screen: Option<&ScreenSignature>, detail: String) {
        let mut event = CrawlEvent::now(CrawlEventKind::Incident, self.state.depth)
            .with_detail(format!("{:?}: {}", kind, detail));
        if let Some(screen) = screen {
            event = event.with_screen(screen);
        }
        self.trace(event);
        self.state.record_incident(kind, screen, detail);
    }

    fn out_of_time(&mut self) -> bool {
        if !self.state.timed_out
            && self.state.elapsed() >= Duration::from_secs(self.config.timeout_secs)
        {
            warn!(timeout_secs = self.config.timeout_secs, "exploration timed out");
            self.state.timed_out = true;
            self.incident(
                IncidentKind::Timeout,
                None,
                format!("{}s budget exhausted", self.config.timeout_secs),
            );
        }
        self.state.timed_out
    }

    fn trace(&self, event: CrawlEvent) {
        self.tracer.log(&event);
    }
}
