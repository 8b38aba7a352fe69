//! Tooltip placement and show/hide lifecycle
//!
//! The tooltip sits at the cursor plus an offset and flips to the other side
//! of the cursor when it would overflow the viewport. The final rectangle is
//! always clamped inside the viewport, minus a margin.

use super::camera::ViewportRect;
use super::timer::Debounce;
use crate::gcode::PointRecord;
use pathlens_settings::TooltipSettings;
use serde::Serialize;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::trace;

/// Tooltip rectangle in screen pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TooltipRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl TooltipRect {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_within(&self, viewport: &ViewportRect) -> bool {
        const SLACK: f64 = 1e-9;
        self.x >= viewport.x - SLACK
            && self.y >= viewport.y - SLACK
            && self.right() <= viewport.x + viewport.width + SLACK
            && self.bottom() <= viewport.y + viewport.height + SLACK
    }
}

pub struct TooltipManager {
    settings: TooltipSettings,
    viewport: ViewportRect,
    visible: bool,
    record: Option<Rc<PointRecord>>,
    lines: Vec<String>,
    rect: TooltipRect,
    hide_timer: Debounce,
    epoch: u64,
    visibility_changes: u64,
}

impl TooltipManager {
    pub fn new(settings: TooltipSettings, viewport: ViewportRect) -> Self {
        let hide_timer = Debounce::new(settings.hide_delay());
        Self {
            settings,
            viewport,
            visible: false,
            record: None,
            lines: Vec::new(),
            rect: TooltipRect::default(),
            hide_timer,
            epoch: 0,
            visibility_changes: 0,
        }
    }

    pub fn set_viewport(&mut self, viewport: ViewportRect) {
        self.viewport = viewport;
    }

    pub fn viewport(&self) -> ViewportRect {
        self.viewport
    }

    /// Show or update the tooltip. Cancels any pending hide.
    pub fn show(&mut self, record: Rc<PointRecord>, mouse_x: f64, mouse_y: f64) {
        self.hide_timer.cancel();
        let same_record = self
            .record
            .as_ref()
            .is_some_and(|r| Rc::ptr_eq(r, &record) || **r == *record);
        if !same_record {
            self.lines = record.display.lines().into_iter().map(String::from).collect();
            self.record = Some(record);
        }
        self.rect = self.layout(mouse_x, mouse_y);
        if !self.visible {
            self.visible = true;
            self.visibility_changes += 1;
            trace!("Tooltip shown at ({:.0}, {:.0})", self.rect.x, self.rect.y);
        }
    }

    /// Hide now when `delay` is zero, otherwise after `delay` unless shown again.
    pub fn hide(&mut self, delay: Duration, now: Instant) {
        if delay.is_zero() {
            self.dismiss();
        } else if self.visible && !self.hide_timer.is_pending() {
            self.hide_timer.schedule_after(now, delay, self.epoch);
        }
    }

    /// Hide now and cancel any pending hide.
    pub fn dismiss(&mut self) {
        self.hide_timer.cancel();
        self.hide_now();
    }

    /// Hide after the configured delay.
    pub fn hide_delayed(&mut self, now: Instant) {
        self.hide(self.settings.hide_delay(), now);
    }

    /// Fire a pending hide. Returns true if the tooltip was hidden.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.hide_timer.poll(now, self.epoch) {
            self.hide_now();
            return true;
        }
        false
    }

    fn hide_now(&mut self) {
        if self.visible {
            self.visible = false;
            self.visibility_changes += 1;
            trace!("Tooltip hidden");
        }
        self.record = None;
        self.lines.clear();
    }

    /// Hide immediately and drop timers armed under an older epoch.
    pub fn reset(&mut self, epoch: u64) {
        self.hide_timer.cancel();
        self.hide_now();
        self.epoch = epoch;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_hide_pending(&self) -> bool {
        self.hide_timer.is_pending()
    }

    pub fn rect(&self) -> Option<TooltipRect> {
        self.visible.then_some(self.rect)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn record(&self) -> Option<&Rc<PointRecord>> {
        self.record.as_ref()
    }

    /// Times the tooltip went from hidden to shown or back.
    pub fn visibility_changes(&self) -> u64 {
        self.visibility_changes
    }

    /// Content size before viewport clamping.
    fn content_size(&self) -> (f64, f64) {
        let s = &self.settings;
        let longest = self.lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let width = (longest as f64 * s.char_width as f64 + 2.0 * s.padding as f64)
            .min(s.max_width as f64);
        let height = self.lines.len() as f64 * s.line_height as f64 + 2.0 * s.padding as f64;
        (width, height)
    }

    /// Place the tooltip for a cursor position.
    pub fn layout(&self, mouse_x: f64, mouse_y: f64) -> TooltipRect {
        let vp = &self.viewport;
        let (content_w, content_h) = self.content_size();
        let (x, width) = place_axis(
            mouse_x,
            self.settings.offset_x as f64,
            content_w,
            vp.x,
            vp.width,
            self.settings.margin as f64,
        );
        let (y, height) = place_axis(
            mouse_y,
            self.settings.offset_y as f64,
            content_h,
            vp.y,
            vp.height,
            self.settings.margin as f64,
        );
        TooltipRect {
            x,
            y,
            width,
            height,
        }
    }
}

/// Position and size along one axis: offset from the cursor, flipped when
/// overflowing the far edge, then clamped inside `[origin + m, origin + extent - m]`.
fn place_axis(
    cursor: f64,
    offset: f64,
    size: f64,
    origin: f64,
    extent: f64,
    margin: f64,
) -> (f64, f64) {
    let extent = extent.max(0.0);
    let margin = margin.max(0.0).min(extent / 2.0);
    let size = size.max(0.0).min(extent - 2.0 * margin);
    let low = origin + margin;
    let high = origin + extent - margin - size;

    let cursor = if cursor.is_finite() { cursor } else { origin };
    let mut pos = cursor + offset;
    if pos + size > origin + extent - margin {
        pos = cursor - offset - size;
    }
    (pos.min(high).max(low), size)
}
