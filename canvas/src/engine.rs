//! Engine: routes input events through the draft buffer and reconciler.
//!
//! `EngineCore` is the sans-IO state machine. Every handler returns a list of
//! [`Action`]s for the host to carry out; nothing here touches the network or
//! the DOM. `Engine` wraps it with the browser canvas for drawing and export.
//!
//! Gestures read [`ToolSettings`] once, at pointer-down (or caret open). A
//! tool change while a draft is active is ignored.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlAnchorElement, HtmlCanvasElement};

use crate::bulk::{ClearFlow, EXPORT_FILE_NAME, EXPORT_MIME};
use crate::draft::{Caret, DraftBuffer};
use crate::element::{ArrivalToken, Element, Point, Record, RemoteRecord, Rgb};
use crate::input::{Button, Key, Modifiers, Tool, ToolSettings};
use crate::outbox::{CommitId, CommitState, Outbox};
use crate::reconcile::{Reconciler, RenderList};
use crate::render;

/// User-visible condition the host should surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A commit was given up on. It stays on screen as unsynced until the
    /// user retries or discards it.
    CommitFailed { id: CommitId, reason: String },
    /// `clear_all` failed; the board is unchanged.
    ClearFailed { reason: String },
    /// The live feed dropped and was re-established.
    Reconnected,
}

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Append `record` to the board's event log and report back through
    /// [`EngineCore::commit_acknowledged`] or [`EngineCore::commit_failed`].
    Commit { id: CommitId, record: Record },
    /// Show a text input at the caret.
    OpenCaret(Caret),
    /// Hide the text input.
    CloseCaret,
    /// Change the canvas cursor (CSS cursor name).
    SetCursor(&'static str),
    /// Ask the user to confirm a board clear.
    ConfirmClear,
    /// Issue `clear_all` and report back through [`EngineCore::clear_finished`].
    ClearBoard,
    Notify(Notice),
    RenderNeeded,
}

/// Core engine state: all logic that doesn't depend on the canvas element.
///
/// Separated from `Engine` so it can be tested without WASM/browser dependencies.
pub struct EngineCore {
    pub settings: ToolSettings,
    draft: DraftBuffer,
    reconciler: Reconciler,
    outbox: Outbox,
    clear: ClearFlow,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub dpr: f64,
}

impl Default for EngineCore {
    fn default() -> Self {
        Self {
            settings: ToolSettings::default(),
            draft: DraftBuffer::new(),
            reconciler: Reconciler::new(),
            outbox: Outbox::new(),
            clear: ClearFlow::default(),
            viewport_width: 0.0,
            viewport_height: 0.0,
            dpr: 1.0,
        }
    }
}

impl EngineCore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Pointer ---

    /// Start a stroke (pen/eraser) or open a caret (text). Ignored while a
    /// caret is open; the host closes it through blur or Enter.
    pub fn on_pointer_down(&mut self, at: Point, button: Button, _modifiers: Modifiers) -> Vec<Action> {
        if button != Button::Primary || !self.draft.is_idle() {
            return Vec::new();
        }
        let ToolSettings { tool, color, stroke_width, font_size } = self.settings;

        match tool.stroke_tool() {
            Some(stroke_tool) => {
                self.draft.begin_stroke(stroke_tool, at, color, stroke_width);
                vec![Action::RenderNeeded]
            }
            None => {
                self.draft.begin_label(at, font_size, color);
                self.draft
                    .caret()
                    .map(|caret| vec![Action::OpenCaret(caret.clone())])
                    .unwrap_or_default()
            }
        }
    }

    pub fn on_pointer_move(&mut self, at: Point, _modifiers: Modifiers) -> Vec<Action> {
        if self.draft.extend(at) { vec![Action::RenderNeeded] } else { Vec::new() }
    }

    /// Finish the stroke in progress. A stroke with fewer than two distinct
    /// points is dropped without a commit.
    pub fn on_pointer_up(&mut self, at: Point, button: Button, _modifiers: Modifiers) -> Vec<Action> {
        if button != Button::Primary || !self.draft.is_drafting_stroke() {
            return Vec::new();
        }
        self.draft.extend(at);
        let mut actions = Vec::new();
        if let Some(element) = self.draft.end() {
            actions.push(self.commit(element));
        }
        actions.push(Action::RenderNeeded);
        actions
    }

    // --- Text ---

    /// Replace the open caret's text with the host input's current value.
    pub fn on_text_input(&mut self, text: &str) -> Vec<Action> {
        self.draft.set_text(text);
        Vec::new()
    }

    /// Enter without modifiers submits the caret; Escape cancels it.
    pub fn on_key_down(&mut self, key: &Key, modifiers: Modifiers) -> Vec<Action> {
        if self.draft.caret().is_none() {
            return Vec::new();
        }
        if key.is_enter() && !modifiers.any() {
            return self.submit_caret();
        }
        if key.is_escape() {
            self.draft.cancel();
            return vec![Action::CloseCaret];
        }
        Vec::new()
    }

    /// Focus left the text input: submit whatever was typed.
    pub fn on_blur(&mut self) -> Vec<Action> {
        self.submit_caret()
    }

    fn submit_caret(&mut self) -> Vec<Action> {
        if self.draft.caret().is_none() {
            return Vec::new();
        }
        let mut actions = vec![Action::CloseCaret];
        if let Some(element) = self.draft.submit() {
            actions.push(self.commit(element));
            actions.push(Action::RenderNeeded);
        }
        actions
    }

    fn commit(&mut self, element: Element) -> Action {
        let commit = self.outbox.enqueue(element);
        log::debug!("engine: commit {} ({})", commit.id, commit.element.kind());
        Action::Commit { id: commit.id, record: commit.record() }
    }

    // --- Toolbar ---

    /// Switch tools. Ignored while a stroke or caret is active.
    pub fn set_tool(&mut self, tool: Tool) -> Vec<Action> {
        if !self.draft.is_idle() {
            log::debug!("engine: ignoring tool change to {tool:?} during a gesture");
            return Vec::new();
        }
        self.settings.tool = tool;
        vec![Action::SetCursor(tool.cursor())]
    }

    pub fn set_color(&mut self, color: Rgb) {
        self.settings.color = color;
    }

    /// Step the active size control; returns the new value.
    pub fn step_size(&mut self, increase: bool) -> f64 {
        self.settings.step_size(increase);
        self.settings.active_size()
    }

    // --- Event log ---

    /// Replace the confirmed list with a full snapshot from the log.
    pub fn apply_snapshot(&mut self, records: Vec<RemoteRecord>) -> Vec<Action> {
        let report = self.reconciler.apply_snapshot(records);
        let reconciler = &self.reconciler;
        let settled = self.outbox.settle(|nonce| reconciler.contains_nonce(nonce));
        log::debug!(
            "engine: snapshot accepted={} skipped={} settled={settled}",
            report.accepted,
            report.skipped
        );
        vec![Action::RenderNeeded]
    }

    /// The log stored commit `id` under `token`.
    pub fn commit_acknowledged(&mut self, id: CommitId, token: ArrivalToken) {
        if !self.outbox.acknowledge(id, token) {
            log::debug!("engine: ack for settled commit {id}");
        }
    }

    /// The host gave up on commit `id`.
    pub fn commit_failed(&mut self, id: CommitId, reason: &str) -> Vec<Action> {
        if !self.outbox.mark_failed(id, reason) {
            return Vec::new();
        }
        log::warn!("engine: commit {id} failed: {reason}");
        vec![
            Action::Notify(Notice::CommitFailed { id, reason: reason.to_owned() }),
            Action::RenderNeeded,
        ]
    }

    /// Resubmit a failed commit with its original nonce.
    pub fn retry_failed(&mut self, id: CommitId) -> Vec<Action> {
        match self.outbox.retry(id) {
            Some(record) => vec![Action::Commit { id, record }, Action::RenderNeeded],
            None => Vec::new(),
        }
    }

    /// Drop a failed commit from the screen for good.
    pub fn discard_failed(&mut self, id: CommitId) -> Vec<Action> {
        match self.outbox.discard(id) {
            Some(_) => vec![Action::RenderNeeded],
            None => Vec::new(),
        }
    }

    // --- Bulk ---

    /// Begin the clear flow. Ignored while a clear is already underway.
    pub fn request_clear(&mut self) -> Vec<Action> {
        if self.clear.request() { vec![Action::ConfirmClear] } else { Vec::new() }
    }

    pub fn confirm_clear(&mut self, confirmed: bool) -> Vec<Action> {
        if self.clear.confirm(confirmed) { vec![Action::ClearBoard] } else { Vec::new() }
    }

    /// `clear_all` returned. Success changes nothing locally: the next
    /// snapshot empties the board.
    pub fn clear_finished(&mut self, result: Result<(), String>) -> Vec<Action> {
        if !self.clear.finish() {
            return Vec::new();
        }
        match result {
            Ok(()) => Vec::new(),
            Err(reason) => {
                log::warn!("engine: clear failed: {reason}");
                vec![Action::Notify(Notice::ClearFailed { reason })]
            }
        }
    }

    // --- Queries ---

    /// Confirmed elements followed by the stroke being drawn.
    #[must_use]
    pub fn render_list(&self) -> RenderList<'_> {
        self.reconciler.render_list(self.draft.preview())
    }

    /// Commits not yet in any snapshot, with whether each has failed.
    pub fn unsynced(&self) -> impl Iterator<Item = (&Element, bool)> {
        self.outbox.iter().map(|c| (&c.element, c.is_failed()))
    }

    /// Commits still on their way to the log. These are drawn like confirmed
    /// elements, so an export includes them; failed commits are left out.
    pub fn exportable_unsynced(&self) -> impl Iterator<Item = (&Element, bool)> {
        self.outbox.iter().filter(|c| !c.is_failed()).map(|c| (&c.element, false))
    }

    /// Id and reason of every failed commit.
    pub fn failed_commits(&self) -> impl Iterator<Item = (CommitId, &str)> {
        self.outbox.failed().filter_map(|c| match &c.state {
            CommitState::Failed { reason } => Some((c.id, reason.as_str())),
            CommitState::Pending | CommitState::Acknowledged { .. } => None,
        })
    }

    #[must_use]
    pub fn caret(&self) -> Option<&Caret> {
        self.draft.caret()
    }

    #[must_use]
    pub fn tool(&self) -> Tool {
        self.settings.tool
    }

    #[must_use]
    pub fn is_drafting(&self) -> bool {
        !self.draft.is_idle()
    }

    #[must_use]
    pub fn clear_flow(&self) -> ClearFlow {
        self.clear
    }

    #[must_use]
    pub fn pending_commits(&self) -> usize {
        self.outbox.len()
    }
}

/// The full canvas engine. Wraps `EngineCore` and owns the browser canvas element.
pub struct Engine {
    canvas: HtmlCanvasElement,
    pub core: EngineCore,
}

impl Engine {
    /// Create a new engine bound to the given canvas element.
    #[must_use]
    pub fn new(canvas: HtmlCanvasElement) -> Self {
        Self { canvas, core: EngineCore::new() }
    }

    // --- Viewport ---

    /// Update viewport dimensions and device pixel ratio, resizing the
    /// canvas backing store to match.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn set_viewport(&mut self, width_css: f64, height_css: f64, dpr: f64) {
        self.core.viewport_width = width_css;
        self.core.viewport_height = height_css;
        self.core.dpr = dpr;
        self.canvas.set_width((width_css * dpr).round() as u32);
        self.canvas.set_height((height_css * dpr).round() as u32);
    }

    // --- Delegated input events ---

    pub fn on_pointer_down(&mut self, at: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        self.core.on_pointer_down(at, button, modifiers)
    }

    pub fn on_pointer_move(&mut self, at: Point, modifiers: Modifiers) -> Vec<Action> {
        self.core.on_pointer_move(at, modifiers)
    }

    pub fn on_pointer_up(&mut self, at: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        self.core.on_pointer_up(at, button, modifiers)
    }

    pub fn on_text_input(&mut self, text: &str) -> Vec<Action> {
        self.core.on_text_input(text)
    }

    pub fn on_key_down(&mut self, key: &Key, modifiers: Modifiers) -> Vec<Action> {
        self.core.on_key_down(key, modifiers)
    }

    pub fn on_blur(&mut self) -> Vec<Action> {
        self.core.on_blur()
    }

    pub fn set_tool(&mut self, tool: Tool) -> Vec<Action> {
        self.core.set_tool(tool)
    }

    pub fn apply_snapshot(&mut self, records: Vec<RemoteRecord>) -> Vec<Action> {
        self.core.apply_snapshot(records)
    }

    // --- Render ---

    fn context(&self) -> Result<CanvasRenderingContext2d, JsValue> {
        self.canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("canvas has no 2d context"))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(JsValue::from)
    }

    /// Draw the render list followed by the unsynced overlay.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the 2D context is unavailable or a draw call fails.
    pub fn render(&self) -> Result<(), JsValue> {
        let ctx = self.context()?;
        render::draw(
            &ctx,
            &self.core.render_list(),
            self.core.unsynced(),
            self.core.viewport_width,
            self.core.viewport_height,
            self.core.dpr,
        )
    }

    // --- Export ---

    /// Render the board as the user sees it, minus failed commits, and encode
    /// it as a PNG data URL. The live view is redrawn afterwards.
    ///
    /// # Errors
    ///
    /// Returns `Err` if drawing or encoding fails.
    pub fn export_image(&self) -> Result<String, JsValue> {
        let ctx = self.context()?;
        render::draw(
            &ctx,
            &self.core.render_list(),
            self.core.exportable_unsynced(),
            self.core.viewport_width,
            self.core.viewport_height,
            self.core.dpr,
        )?;
        let url = self.canvas.to_data_url_with_type(EXPORT_MIME);
        self.render()?;
        url
    }

    /// Offer the exported image as a browser download.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the export fails or the DOM is unavailable.
    pub fn download_export(&self) -> Result<(), JsValue> {
        let url = self.export_image()?;
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let anchor = document
            .create_element("a")?
            .dyn_into::<HtmlAnchorElement>()
            .map_err(JsValue::from)?;
        anchor.set_href(&url);
        anchor.set_download(EXPORT_FILE_NAME);
        anchor.click();
        Ok(())
    }
}
