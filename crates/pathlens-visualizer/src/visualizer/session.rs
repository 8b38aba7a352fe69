//! Viewer session
//!
//! Owns the parsed toolpath, every derived GPU resource, and every timer.
//! All mutation happens here on the caller's thread: `load` and `dispose`
//! replace the toolpath, input events and `frame` only read it. Each load
//! bumps an epoch so timers armed for the previous toolpath never fire.

use super::backend::{DrawCall, GpuBackend};
use super::camera::ViewState;
use super::geometry::GeometryManager;
use super::lod::LodSystem;
use super::picking::ToolpathPointDetector;
use super::render_queue::{RenderObject, RenderQueue};
use super::seek::{SeekController, SeekUpdate};
use super::toolpath_cache::ToolpathCache;
use super::tooltip::TooltipManager;
use crate::gcode::{Compiler, ParsedToolpath, PointRecord, ToolpathParser, ToolpathStats};
use glam::DVec3;
use pathlens_core::{LoadError, RenderError};
use pathlens_settings::{ConfigError, ViewerConfig};
use serde::Serialize;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// What the host UI should present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    /// Nothing loaded yet, or disposed
    Empty,
    Ready,
    /// The last load produced no drawable segments
    NothingToDisplay,
    /// The graphics context is gone; the host must recreate it and reload
    ContextLost,
}

/// Per-frame numbers for a performance overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FrameStats {
    pub lod_tier: usize,
    pub lod_changed: bool,
    pub draw_calls: usize,
    pub state_changes: usize,
    pub unsorted_state_changes: usize,
    pub instances_drawn: usize,
    /// Cumulative since load
    pub ray_casts: u64,
    /// Cumulative since load
    pub cache_hits: u64,
}

pub struct ViewerSession<B: GpuBackend> {
    config: ViewerConfig,
    backend: B,
    parser: ToolpathParser,
    cache: ToolpathCache,
    toolpath: Option<Rc<ParsedToolpath>>,
    geometry: GeometryManager,
    lod: LodSystem,
    queue: RenderQueue<usize>,
    picker: ToolpathPointDetector,
    tooltip: TooltipManager,
    seek: SeekController,
    last_seek: Option<SeekUpdate>,
    /// Record for the tool position at the applied seek index
    seek_record: Option<Rc<PointRecord>>,
    last_view: Option<ViewState>,
    epoch: u64,
    state: SessionState,
}

impl<B: GpuBackend> ViewerSession<B> {
    /// Create a session. Fails when `config` does not validate.
    pub fn new(config: ViewerConfig, backend: B) -> Result<Self, ConfigError> {
        config.validate()?;
        let viewport = super::camera::ViewportRect::sized(800.0, 600.0);
        Ok(Self {
            parser: ToolpathParser::with_settings(&config.parser),
            cache: ToolpathCache::new(),
            toolpath: None,
            geometry: GeometryManager::new(config.styles.clone()),
            lod: LodSystem::new(&config.lod),
            queue: RenderQueue::new(),
            picker: ToolpathPointDetector::new(config.picking.clone()),
            tooltip: TooltipManager::new(config.tooltip.clone(), viewport),
            seek: SeekController::new(&config.seek),
            last_seek: None,
            seek_record: None,
            last_view: None,
            epoch: 0,
            state: SessionState::Empty,
            config,
            backend,
        })
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn toolpath(&self) -> Option<&Rc<ParsedToolpath>> {
        self.toolpath.as_ref()
    }

    pub fn stats(&self) -> Option<ToolpathStats> {
        self.toolpath.as_ref().map(|t| t.stats())
    }

    pub fn geometry(&self) -> &GeometryManager {
        &self.geometry
    }

    pub fn lod(&self) -> &LodSystem {
        &self.lod
    }

    pub fn picker(&self) -> &ToolpathPointDetector {
        &self.picker
    }

    pub fn tooltip(&self) -> &TooltipManager {
        &self.tooltip
    }

    pub fn seek_controller(&self) -> &SeekController {
        &self.seek
    }

    pub fn last_seek(&self) -> Option<SeekUpdate> {
        self.last_seek
    }

    /// Point data at the applied seek position, `None` before the first
    /// segment.
    pub fn seek_record(&self) -> Option<&Rc<PointRecord>> {
        self.seek_record.as_ref()
    }

    /// Center of the loaded toolpath's bounding box.
    pub fn model_center(&self) -> DVec3 {
        self.toolpath
            .as_ref()
            .map_or(DVec3::ZERO, |t| t.bounds.center().to_dvec3())
    }

    /// Parse `text` and rebuild all derived resources.
    pub fn load(&mut self, text: &str, now: Instant) -> Result<ToolpathStats, LoadError> {
        if let Err(e) = self.backend.check_context() {
            self.state = SessionState::ContextLost;
            return Err(e.into());
        }

        let parsed = self.cache.get_or_parse(text, &self.parser);
        self.release_resources();
        self.epoch += 1;
        self.tooltip.reset(self.epoch);
        self.lod.reset();
        self.last_seek = None;
        self.seek_record = None;

        if parsed.is_empty() {
            warn!(
                "Toolpath has no drawable segments ({} lines, {} warnings)",
                parsed.raw_lines.len(),
                parsed.warnings.len()
            );
            self.seek.reset(&[], self.epoch);
            self.state = SessionState::NothingToDisplay;
            return Err(LoadError::NothingToDisplay {
                lines: parsed.raw_lines.len(),
            });
        }

        if let Err(e) = self.geometry.load(&mut self.backend, &parsed.segments) {
            error!("Failed to build toolpath geometry: {}", e);
            self.release_resources();
            self.state = if e == RenderError::ContextLost {
                SessionState::ContextLost
            } else {
                SessionState::Empty
            };
            return Err(e.into());
        }
        self.picker.build(Rc::clone(&parsed));
        self.seek.reset(&parsed.segments, self.epoch);

        let stats = parsed.stats();
        info!(
            "Loaded toolpath: {} segments ({}), {} warnings, epoch {}, took {:?}",
            stats.segment_count,
            stats.mode_counts,
            stats.warning_count,
            self.epoch,
            now.elapsed()
        );
        self.toolpath = Some(parsed);
        self.state = SessionState::Ready;
        Ok(stats)
    }

    /// Load raw bytes, rejecting input that is not text.
    pub fn load_bytes(&mut self, bytes: &[u8], now: Instant) -> Result<ToolpathStats, LoadError> {
        let text = ToolpathParser::decode(bytes)?;
        self.load(text, now)
    }

    /// Compile `source` to G-code and load the result.
    pub fn load_source(
        &mut self,
        compiler: &dyn Compiler,
        source: &str,
        now: Instant,
    ) -> Result<ToolpathStats, LoadError> {
        let gcode = compiler.compile(source)?;
        debug!(
            "Compiler produced {} bytes of G-code from {} bytes of source",
            gcode.len(),
            source.len()
        );
        self.load(&gcode, now)
    }

    /// Hover at a screen position. Shows the tooltip on a hit and schedules
    /// a delayed hide on a miss.
    pub fn pointer_moved(
        &mut self,
        x: f64,
        y: f64,
        now: Instant,
        view: &ViewState,
    ) -> Option<Rc<PointRecord>> {
        if self.state != SessionState::Ready {
            return None;
        }
        self.picker.set_view(*view);
        self.tooltip.set_viewport(view.viewport);
        self.last_view = Some(*view);
        match self.picker.query_at(x, y, now) {
            Some(record) => {
                self.tooltip.show(Rc::clone(&record), x, y);
                Some(record)
            }
            None => {
                self.tooltip.hide_delayed(now);
                None
            }
        }
    }

    /// The pointer left the viewport.
    pub fn pointer_left(&mut self, now: Instant) {
        self.tooltip.hide(Duration::ZERO, now);
    }

    /// Scrub tick; returns the new current index.
    pub fn seek(&mut self, position: f64, now: Instant) -> usize {
        self.seek.seek(position, now)
    }

    /// Scrub released; applies the final index immediately.
    pub fn commit_seek(&mut self) -> Option<SeekUpdate> {
        if self.state != SessionState::Ready {
            return None;
        }
        let update = self.seek.commit();
        self.apply_seek(update);
        Some(update)
    }

    fn apply_seek(&mut self, update: SeekUpdate) {
        if update.epoch != self.epoch {
            debug!("Dropping seek update from epoch {}", update.epoch);
            return;
        }
        self.geometry.set_visible_prefix(update.index);
        self.picker.set_pick_limit(update.index);
        self.last_seek = Some(update);
        self.show_seek_point(update.index);
    }

    /// Show the tooltip at the tool position after `index` segments.
    fn show_seek_point(&mut self, index: usize) {
        let segment = index
            .checked_sub(1)
            .and_then(|last| Some((last, self.toolpath.as_ref()?.segments.get(last)?.end)));
        let record = segment
            .and_then(|(last, end)| self.picker.record_for_segment(last, end))
            .map(Rc::new);

        match record {
            Some(record) => {
                let viewport = self.tooltip.viewport();
                let (x, y) = self
                    .last_view
                    .and_then(|view| view.world_to_screen(record.coordinates.to_dvec3()))
                    .unwrap_or((
                        viewport.x + viewport.width / 2.0,
                        viewport.y + viewport.height / 2.0,
                    ));
                self.tooltip.show(Rc::clone(&record), x, y);
                self.seek_record = Some(record);
            }
            None => {
                self.tooltip.dismiss();
                self.seek_record = None;
            }
        }
    }

    /// Advance timers, update level of detail, and draw.
    pub fn frame(&mut self, now: Instant, view: &ViewState) -> Result<FrameStats, RenderError> {
        match self.render_frame(now, view) {
            Err(RenderError::ContextLost) => {
                if self.state != SessionState::ContextLost {
                    error!("Graphics context lost, a reload is required");
                }
                self.state = SessionState::ContextLost;
                Err(RenderError::ContextLost)
            }
            other => other,
        }
    }

    fn render_frame(&mut self, now: Instant, view: &ViewState) -> Result<FrameStats, RenderError> {
        self.backend.check_context()?;

        self.picker.set_view(*view);
        self.tooltip.set_viewport(view.viewport);
        self.last_view = Some(*view);
        self.tooltip.tick(now);
        if let Some(update) = self.seek.poll(now, self.epoch) {
            self.apply_seek(update);
        }

        let mut stats = FrameStats::default();
        self.backend.begin_frame(view.view_projection())?;
        if self.state != SessionState::Ready {
            return Ok(stats);
        }

        let lod = self.lod.update(view.eye_dvec3(), self.model_center());
        if lod.changed {
            let fraction = self.lod.detail_fraction(lod.tier);
            self.geometry.set_detail(&mut self.backend, fraction)?;
        }
        stats.lod_tier = lod.tier;
        stats.lod_changed = lod.changed;

        for (i, batch) in self.geometry.batches().iter().enumerate() {
            self.queue.submit(RenderObject {
                key: batch.material_key,
                visible: batch.visible_count > 0,
                item: i,
            });
        }
        let (ordered, queue_stats) = self.queue.flush();
        stats.draw_calls = queue_stats.draw_calls;
        stats.state_changes = queue_stats.state_changes;
        stats.unsorted_state_changes = queue_stats.unsorted_state_changes;

        for object in ordered {
            let Some(batch) = self.geometry.batches().get(object.item) else {
                continue;
            };
            let primitive = self
                .geometry
                .primitive_handle(&batch.primitive)
                .ok_or(RenderError::UnknownHandle(batch.instance_buffer.0))?;
            self.backend.draw_instanced(&DrawCall {
                primitive,
                instances: batch.instance_buffer,
                instance_count: batch.visible_count as u32,
                color: batch.color,
                transparent: batch.transparent,
            })?;
            stats.instances_drawn += batch.visible_count;
        }

        let pick = self.picker.stats();
        stats.ray_casts = pick.ray_casts;
        stats.cache_hits = pick.cache_hits;
        Ok(stats)
    }

    fn release_resources(&mut self) {
        self.geometry.dispose(&mut self.backend);
        self.picker.dispose();
        self.queue.clear();
        self.toolpath = None;
    }

    /// Release every GPU resource and forget the toolpath.
    pub fn dispose(&mut self) {
        self.release_resources();
        self.cache.clear();
        self.epoch += 1;
        self.tooltip.reset(self.epoch);
        self.seek.reset(&[], self.epoch);
        self.lod.reset();
        self.last_seek = None;
        self.seek_record = None;
        self.last_view = None;
        self.state = SessionState::Empty;
        debug!("Session disposed, epoch {}", self.epoch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visualizer::backend::HeadlessBackend;
    use crate::visualizer::camera::{Camera, ViewportRect};

    fn session() -> ViewerSession<HeadlessBackend> {
        ViewerSession::new(ViewerConfig::default(), HeadlessBackend::new()).unwrap()
    }

    fn view_for(session: &ViewerSession<HeadlessBackend>) -> ViewState {
        let mut camera = Camera::default();
        if let Some(t) = session.toolpath() {
            camera.fit_to_bounds(&t.bounds);
        }
        camera.view_state(ViewportRect::sized(800.0, 600.0))
    }

    #[test]
    fn test_load_builds_batches_and_draws() {
        let mut s = session();
        let now = Instant::now();
        let stats = s.load("G0 Z5\nG1 X10\nG2 X20 Y0 I5 J0", now).unwrap();
        assert_eq!(stats.segment_count, 2 + 32);
        assert_eq!(s.state(), SessionState::Ready);

        let view = view_for(&s);
        let frame = s.frame(now, &view).unwrap();
        assert_eq!(frame.draw_calls, 3);
        assert_eq!(frame.instances_drawn, 34);
        assert!(frame.state_changes <= frame.unsorted_state_changes);
        assert!(frame.lod_changed);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = ViewerConfig::default();
        config.picking.quantization = 0.0;
        assert!(matches!(
            ViewerSession::new(config, HeadlessBackend::new()),
            Err(ConfigError::ValueOutOfRange { .. })
        ));

        let mut gapped = ViewerConfig::default();
        gapped.lod.tiers[1].min_distance += 5.0;
        assert!(matches!(
            ViewerSession::new(gapped, HeadlessBackend::new()),
            Err(ConfigError::InvalidLodTiers(_))
        ));
    }

    #[test]
    fn test_nothing_to_display() {
        let mut s = session();
        let err = s.load("; only a comment\nM3 S1000", Instant::now()).unwrap_err();
        assert_eq!(err, LoadError::NothingToDisplay { lines: 2 });
        assert_eq!(s.state(), SessionState::NothingToDisplay);
        assert_eq!(s.backend().live_resources(), 0);
    }

    #[test]
    fn test_context_loss_surfaces() {
        let mut s = session();
        let now = Instant::now();
        s.load("G1 X1", now).unwrap();
        s.backend_mut().lose_context();
        let view = view_for(&s);
        assert_eq!(s.frame(now, &view), Err(RenderError::ContextLost));
        assert_eq!(s.state(), SessionState::ContextLost);
        assert!(s.load("G1 X2", now).unwrap_err().requires_reload());
    }

    #[test]
    fn test_reload_and_dispose_release_everything() {
        let mut s = session();
        let now = Instant::now();
        s.load("G0 X1\nG1 X2\nG3 X4 Y0 R1", now).unwrap();
        let after_first = s.backend().live_resources();
        s.load("G0 X1\nG1 X2\nG3 X4 Y0 R1", now).unwrap();
        assert_eq!(s.backend().live_resources(), after_first);
        s.dispose();
        assert_eq!(s.backend().live_resources(), 0);
        assert_eq!(s.state(), SessionState::Empty);
    }
}
