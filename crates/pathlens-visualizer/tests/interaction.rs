//! Picking, tooltip, seek, level-of-detail, and draw-order behavior

use glam::{DVec3, Vec3};
use pathlens_core::{MotionMode, Point3};
use pathlens_settings::{LodSettings, PickSettings, SeekSettings, TooltipSettings};
use pathlens_visualizer::{
    Camera, LodSystem, MaterialKey, PointDataExtractor, RenderObject, RenderQueue,
    SeekController, ToolpathParser, ToolpathPointDetector, TooltipManager, ViewState,
    ViewportRect,
};
use proptest::prelude::*;
use std::rc::Rc;
use std::time::{Duration, Instant};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn top_down_view() -> ViewState {
    let mut camera = Camera::new(Vec3::new(5.0, 5.0, 0.0), 60.0);
    camera.set_view(0.0, 89.0);
    camera.view_state(ViewportRect::sized(800.0, 800.0))
}

fn detector(text: &str, view: ViewState) -> ToolpathPointDetector {
    let parsed = Rc::new(ToolpathParser::new().parse(text));
    let mut detector = ToolpathPointDetector::new(PickSettings::default());
    detector.build(parsed);
    detector.set_view(view);
    detector
}

#[test]
fn test_same_bucket_within_ttl_reuses_result() {
    let view = top_down_view();
    let mut picker = detector("G0 X10 Y0\nG1 X10 Y10\nG1 X0 Y10", view);
    let (sx, sy) = view.world_to_screen(DVec3::new(10.0, 10.0, 0.0)).unwrap();
    let t0 = Instant::now();

    let first = picker.query_at(sx, sy, t0).unwrap();
    // Past the throttle interval but inside the cache lifetime
    let second = picker.query_at(sx, sy, t0 + ms(40)).unwrap();

    assert_eq!(first.segment_index, 2);
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(picker.stats().ray_casts, 1);
    assert_eq!(picker.stats().cache_hits, 1);
}

#[test]
fn test_expired_cache_entry_recasts() {
    let view = top_down_view();
    let mut picker = detector("G0 X10 Y0\nG1 X10 Y10", view);
    let (sx, sy) = view.world_to_screen(DVec3::new(10.0, 0.0, 0.0)).unwrap();
    let t0 = Instant::now();
    picker.query_at(sx, sy, t0);
    picker.query_at(sx, sy, t0 + ms(150));
    assert_eq!(picker.stats().ray_casts, 2);
}

#[test]
fn test_rapid_queries_are_throttled() {
    let view = top_down_view();
    let mut picker = detector("G0 X10 Y0\nG1 X10 Y10", view);
    let (sx, sy) = view.world_to_screen(DVec3::new(10.0, 0.0, 0.0)).unwrap();
    let t0 = Instant::now();

    let first = picker.query_at(sx, sy, t0);
    for i in 1..10 {
        // Far away from the hit, but inside the throttle window
        let dropped = picker.query_at(50.0, 50.0 + i as f64, t0 + ms(i));
        assert_eq!(dropped.map(|r| r.segment_index), first.as_ref().map(|r| r.segment_index));
    }
    assert_eq!(picker.stats().ray_casts, 1);
    assert_eq!(picker.stats().dropped, 9);

    assert!(picker.query_at(50.0, 50.0, t0 + ms(20)).is_none());
    assert_eq!(picker.stats().ray_casts, 2);
}

#[test]
fn test_pick_record_carries_arc_info() {
    let view = top_down_view();
    let mut picker = detector("G2 X10 Y0 I5 J0 F800", view);
    let (sx, sy) = view.world_to_screen(DVec3::new(5.0, 5.0, 0.0)).unwrap();
    let record = picker.query_at(sx, sy, Instant::now()).unwrap();
    assert_eq!(record.mode, MotionMode::ArcCw);
    let arc = record.arc_info.as_ref().unwrap();
    assert!((arc.radius.unwrap() - 5.0).abs() < 1e-6);
    assert_eq!(arc.i, Some(5.0));
    assert_eq!(record.parameter('F'), Some(800.0));
    assert!(record.display.arc.is_some());
}

#[test]
fn test_seek_coalesces_drag_ticks() {
    let parsed = ToolpathParser::new().parse("G0 X1\nG1 X2\nG1 X3\nG2 X5 Y0 R1\nG0 X0");
    let mut seek = SeekController::new(&SeekSettings::default());
    seek.reset(&parsed.segments, 1);
    let total = seek.total();
    let t0 = Instant::now();

    for i in 0..20u64 {
        let position = i as f64 / 19.0;
        let index = seek.seek(position, t0 + ms(10 * i));
        assert_eq!(index, (position * total as f64).round() as usize);
        assert!(seek.poll(t0 + ms(10 * i), 1).is_none());
    }
    assert_eq!(seek.expensive_runs(), 0);

    let update = seek.poll(t0 + ms(190 + 150), 1).unwrap();
    assert_eq!(update.index, total);
    assert_eq!(update.counts, parsed.mode_counts);
    assert_eq!(seek.expensive_runs(), 1);
    assert!(seek.poll(t0 + ms(1000), 1).is_none());
}

#[test]
fn test_seek_from_old_epoch_is_dropped() {
    let parsed = ToolpathParser::new().parse("G1 X1\nG1 X2");
    let mut seek = SeekController::new(&SeekSettings::default());
    seek.reset(&parsed.segments, 3);
    let t0 = Instant::now();
    seek.seek(0.5, t0);
    assert!(seek.poll(t0 + ms(500), 4).is_none());
    assert_eq!(seek.expensive_runs(), 0);
}

#[test]
fn test_seek_commit_is_immediate() {
    let parsed = ToolpathParser::new().parse("G0 X1\nG1 X2\nG1 X3");
    let mut seek = SeekController::new(&SeekSettings::default());
    seek.reset(&parsed.segments, 1);
    seek.seek(1.0 / 3.0, Instant::now());
    let update = seek.commit();
    assert_eq!(update.index, 1);
    assert_eq!(update.counts.get(MotionMode::Rapid), 1);
    assert_eq!(update.counts.get(MotionMode::Linear), 0);
    assert!(!seek.is_pending());
}

fn key_strategy() -> impl Strategy<Value = (u32, u64, bool)> {
    (0u32..2, 0u64..5, prop::bool::weighted(0.85))
}

proptest! {
    #[test]
    fn sorted_queue_never_costs_more(keys in prop::collection::vec(key_strategy(), 0..64)) {
        let mut queue = RenderQueue::new();
        for (i, (shader, material, visible)) in keys.iter().enumerate() {
            queue.submit(RenderObject {
                key: MaterialKey::new(*shader, *material),
                visible: *visible,
                item: i,
            });
        }
        let (ordered, stats) = queue.flush();
        let visible = keys.iter().filter(|k| k.2).count();

        prop_assert!(stats.state_changes <= stats.unsorted_state_changes);
        prop_assert_eq!(stats.draw_calls, visible);
        prop_assert_eq!(ordered.len(), visible);
        for pair in ordered.windows(2) {
            prop_assert!(pair[0].key <= pair[1].key);
            if pair[0].key == pair[1].key {
                prop_assert!(pair[0].item < pair[1].item);
            }
        }
        prop_assert!(queue.is_empty());
    }

    #[test]
    fn lod_tier_is_monotonic(a in 0.0f64..2000.0, b in 0.0f64..2000.0) {
        let lod = LodSystem::new(&LodSettings::default());
        let (near, far) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(lod.select_tier(near) <= lod.select_tier(far));
        let fraction = |d: f64| lod.detail_fraction(lod.select_tier(d));
        prop_assert!(fraction(near) >= fraction(far));
    }

    #[test]
    fn lod_update_is_idempotent(x in -800.0f64..800.0, y in -800.0f64..800.0, z in -800.0f64..800.0) {
        let mut lod = LodSystem::new(&LodSettings::default());
        let eye = DVec3::new(x, y, z);
        let first = lod.update(eye, DVec3::ZERO);
        let second = lod.update(eye, DVec3::ZERO);
        prop_assert!(first.changed);
        prop_assert!(!second.changed);
        prop_assert_eq!(first.tier, second.tier);
        prop_assert_eq!(lod.switches(), 1);
    }

    #[test]
    fn tooltip_stays_inside_viewport(
        width in 1.0f64..2500.0,
        height in 1.0f64..1500.0,
        fx in 0.0f64..=1.0,
        fy in 0.0f64..=1.0,
        line_len in 0usize..240,
    ) {
        let raw_line = format!("G1 X1{}", "0".repeat(line_len));
        let record = PointDataExtractor::new().extract(
            0,
            Point3::new(1.0, 2.0, 3.0),
            MotionMode::Linear,
            0,
            &[raw_line],
            None,
        );
        let viewport = ViewportRect::sized(width, height);
        let mut tooltip = TooltipManager::new(TooltipSettings::default(), viewport);
        tooltip.show(Rc::new(record), fx * width, fy * height);
        let rect = tooltip.rect().unwrap();
        prop_assert!(rect.is_within(&viewport), "{:?} outside {:?}", rect, viewport);
    }
}
