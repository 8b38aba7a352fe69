//! Ray-cast point picking
//!
//! One invisible sphere sits at the start point of every segment. Queries
//! are throttled to roughly one per frame, and results are cached briefly by
//! a coarse quantization of the normalized device coordinates, so hovering
//! in place costs no ray casts at all.

use super::camera::{Ray, ViewState};
use super::timer::Throttle;
use crate::gcode::{ArcSpan, ParsedToolpath, PickHit, PointDataExtractor, PointRecord};
use glam::DVec3;
use pathlens_core::Point3;
use pathlens_settings::PickSettings;
use serde::Serialize;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, trace};

/// Counters for a performance overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PickStats {
    pub ray_casts: u64,
    pub cache_hits: u64,
    /// Queries dropped by the throttle
    pub dropped: u64,
}

#[derive(Debug, Clone, Copy)]
struct PickSphere {
    center: DVec3,
    segment_index: usize,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    result: Option<Rc<PointRecord>>,
    at: Instant,
}

type CacheKey = (i64, i64);

pub struct ToolpathPointDetector {
    settings: PickSettings,
    extractor: PointDataExtractor,
    toolpath: Option<Rc<ParsedToolpath>>,
    /// Indexed by pick primitive id
    spheres: Vec<PickSphere>,
    bounding_center: DVec3,
    bounding_radius: f64,
    /// Segments at or past this index are hidden by a seek
    limit: Option<usize>,
    view: Option<ViewState>,
    throttle: Throttle,
    cache: HashMap<CacheKey, CacheEntry>,
    last_result: Option<Rc<PointRecord>>,
    stats: PickStats,
}

impl ToolpathPointDetector {
    pub fn new(settings: PickSettings) -> Self {
        let throttle = Throttle::new(settings.debounce());
        Self {
            settings,
            extractor: PointDataExtractor::new(),
            toolpath: None,
            spheres: Vec::new(),
            bounding_center: DVec3::ZERO,
            bounding_radius: 0.0,
            limit: None,
            view: None,
            throttle,
            cache: HashMap::new(),
            last_result: None,
            stats: PickStats::default(),
        }
    }

    /// Build pick geometry for a newly loaded toolpath.
    pub fn build(&mut self, toolpath: Rc<ParsedToolpath>) {
        self.clear();
        self.limit = None;
        self.spheres = toolpath
            .segments
            .iter()
            .enumerate()
            .map(|(segment_index, s)| PickSphere {
                center: s.start.to_dvec3(),
                segment_index,
            })
            .collect();

        self.bounding_center = toolpath.bounds.center().to_dvec3();
        self.bounding_radius = self
            .spheres
            .iter()
            .map(|s| s.center.distance(self.bounding_center))
            .fold(0.0, f64::max)
            + self.settings.pick_radius;

        debug!(
            "Pick geometry built: {} spheres, bounding radius {:.2}",
            self.spheres.len(),
            self.bounding_radius
        );
        self.toolpath = Some(toolpath);
    }

    pub fn len(&self) -> usize {
        self.spheres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spheres.is_empty()
    }

    /// Segment index a pick primitive stands for.
    pub fn segment_of(&self, primitive_id: usize) -> Option<usize> {
        self.spheres.get(primitive_id).map(|s| s.segment_index)
    }

    /// Install the camera for subsequent queries. A different view
    /// invalidates every cached result.
    pub fn set_view(&mut self, view: ViewState) {
        if self.view.as_ref() != Some(&view) {
            if !self.cache.is_empty() {
                trace!("View changed, dropping {} cached picks", self.cache.len());
            }
            self.cache.clear();
            self.last_result = None;
            self.view = Some(view);
        }
    }

    /// Only segments before `limit` can be picked. A new limit invalidates
    /// every cached result.
    pub fn set_pick_limit(&mut self, limit: usize) {
        if self.limit != Some(limit) {
            if !self.cache.is_empty() {
                trace!("Pick limit now {}, dropping {} cached picks", limit, self.cache.len());
            }
            self.cache.clear();
            self.last_result = None;
            self.limit = Some(limit);
        }
    }

    pub fn pick_limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn stats(&self) -> PickStats {
        self.stats
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Resolve a screen coordinate to the toolpath point under it.
    pub fn query_at(&mut self, screen_x: f64, screen_y: f64, now: Instant) -> Option<Rc<PointRecord>> {
        let view = self.view?;
        self.toolpath.as_ref()?;
        let (nx, ny) = view.screen_to_ndc(screen_x, screen_y)?;

        if !self.throttle.try_acquire(now) {
            self.stats.dropped += 1;
            return self.last_result.clone();
        }

        let key = self.cache_key(nx, ny);
        let ttl = self.settings.cache_ttl();
        if let Some(entry) = self.cache.get(&key) {
            if now.saturating_duration_since(entry.at) < ttl {
                self.stats.cache_hits += 1;
                self.last_result = entry.result.clone();
                return entry.result.clone();
            }
        }

        let result = view
            .ray_from_ndc(nx, ny)
            .and_then(|ray| self.cast(&ray))
            .map(Rc::new);

        self.cache.insert(
            key,
            CacheEntry {
                result: result.clone(),
                at: now,
            },
        );
        self.evict(now);
        self.last_result = result.clone();
        result
    }

    fn cache_key(&self, nx: f64, ny: f64) -> CacheKey {
        let q = self.settings.quantization.max(f64::EPSILON);
        ((nx / q).floor() as i64, (ny / q).floor() as i64)
    }

    fn evict(&mut self, now: Instant) {
        let capacity = self.settings.cache_capacity.max(1);
        if self.cache.len() <= capacity {
            return;
        }
        let ttl = self.settings.cache_ttl();
        self.cache
            .retain(|_, entry| now.saturating_duration_since(entry.at) < ttl);
        while self.cache.len() > capacity {
            let oldest = self
                .cache
                .iter()
                .min_by_key(|(_, entry)| entry.at)
                .map(|(key, _)| *key);
            match oldest {
                Some(key) => {
                    self.cache.remove(&key);
                }
                None => break,
            }
        }
    }

    /// Closest pick sphere along `ray`, as a full record.
    fn cast(&mut self, ray: &Ray) -> Option<PointRecord> {
        self.stats.ray_casts += 1;
        let toolpath = self.toolpath.as_ref()?;
        let radius = self.settings.pick_radius;

        ray.intersect_sphere(self.bounding_center, self.bounding_radius)?;

        let limit = self.limit.unwrap_or(usize::MAX);
        let mut best: Option<(f64, &PickSphere)> = None;
        for sphere in self.spheres.iter().filter(|s| s.segment_index < limit) {
            if let Some(t) = ray.intersect_sphere(sphere.center, radius) {
                if best.map_or(true, |(best_t, _)| t < best_t) {
                    best = Some((t, sphere));
                }
            }
        }
        let (distance, sphere) = best?;

        let index = sphere.segment_index;
        let start = toolpath.segments.get(index)?.start;
        let record = self.record_for_segment(index, start)?;
        trace!("Pick hit segment {} at t={:.3}", index, distance);
        Some(record.with_hit(PickHit {
            distance,
            world_point: ray.at(distance).into(),
        }))
    }

    /// Inspection record for segment `index`, reported at `coordinates`.
    pub fn record_for_segment(&self, index: usize, coordinates: Point3) -> Option<PointRecord> {
        let toolpath = self.toolpath.as_ref()?;
        let segment = toolpath.segments.get(index)?;
        Some(self.extractor.extract(
            index,
            coordinates,
            segment.mode,
            segment.source_line_index,
            &toolpath.raw_lines,
            arc_span(toolpath, index),
        ))
    }

    /// Forget cached results and the throttle state.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.last_result = None;
        self.throttle.reset();
    }

    /// Release pick geometry and the toolpath reference.
    pub fn dispose(&mut self) {
        self.clear();
        self.spheres.clear();
        self.toolpath = None;
        self.limit = None;
        self.bounding_radius = 0.0;
    }
}

/// Endpoints of the arc command that produced segment `index`.
fn arc_span(toolpath: &ParsedToolpath, index: usize) -> Option<ArcSpan> {
    let segments = &toolpath.segments;
    let segment = segments.get(index)?;
    if !segment.mode.is_arc() {
        return None;
    }
    let same_arc = |i: usize| {
        segments[i].source_line_index == segment.source_line_index && segments[i].mode == segment.mode
    };
    let mut first = index;
    while first > 0 && same_arc(first - 1) {
        first -= 1;
    }
    let mut last = index;
    while last + 1 < segments.len() && same_arc(last + 1) {
        last += 1;
    }
    Some(ArcSpan {
        start: segments[first].start,
        end: segments[last].end,
    })
}
