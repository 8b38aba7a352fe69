//! Toolpath parser behavior on complete programs

use pathlens_core::{MotionMode, Point3};
use pathlens_visualizer::gcode::ArcSpec;
use pathlens_visualizer::{ParseWarningKind, ToolpathParser};
use proptest::prelude::*;

fn parse(text: &str) -> pathlens_visualizer::ParsedToolpath {
    ToolpathParser::new().parse(text)
}

#[test]
fn test_two_linear_moves() {
    let parsed = parse("G1 X10 Y0\nG1 X10 Y10");
    assert_eq!(parsed.segments.len(), 2);
    assert!(parsed
        .segments
        .iter()
        .all(|s| s.mode == MotionMode::Linear));
    assert_eq!(parsed.segments[0].start, Point3::ZERO);
    assert_eq!(parsed.segments[0].end, Point3::new(10.0, 0.0, 0.0));
    assert_eq!(parsed.segments[1].start, Point3::new(10.0, 0.0, 0.0));
    assert_eq!(parsed.segments[1].end, Point3::new(10.0, 10.0, 0.0));
    assert_eq!(parsed.line_map, vec![0, 1]);
    assert_eq!(parsed.mode_counts.get(MotionMode::Linear), 2);
}

#[test]
fn test_offset_arc_lies_on_circle() {
    let parsed = parse("G2 X10 Y0 I5 J0");
    let center = Point3::new(5.0, 0.0, 0.0);
    assert_eq!(parsed.segments.len(), 32);
    for segment in &parsed.segments {
        assert_eq!(segment.mode, MotionMode::ArcCw);
        assert!((segment.start.distance(center) - 5.0).abs() < 1e-9);
        assert!((segment.end.distance(center) - 5.0).abs() < 1e-9);
        // Clockwise from (0,0) to (10,0) about (5,0) passes over the top
        assert!(segment.end.y >= -1e-9);
    }
    assert!(parsed.segments[0].start.approx_eq(Point3::ZERO, 1e-6));
    assert!(parsed.segments[31]
        .end
        .approx_eq(Point3::new(10.0, 0.0, 0.0), 1e-6));
    assert!(parsed.segments[15].end.approx_eq(Point3::new(5.0, 5.0, 0.0), 1e-6));
}

#[test]
fn test_z_carried_forward() {
    let parsed = parse("G0 Z10\nG1 X5");
    assert_eq!(parsed.segments.len(), 2);
    assert_eq!(parsed.segments[0].mode, MotionMode::Rapid);
    assert_eq!(parsed.segments[1].mode, MotionMode::Linear);
    assert_eq!(parsed.segments[1].start.z, 10.0);
    assert_eq!(parsed.segments[1].end, Point3::new(5.0, 0.0, 10.0));
}

#[test]
fn test_impossible_radius_is_a_warning() {
    let parsed = parse("G2 X100 Y0 R1");
    assert!(parsed.segments.is_empty());
    assert_eq!(parsed.warnings.len(), 1);
    assert_eq!(parsed.warnings[0].line_index, 0);
    assert!(matches!(
        parsed.warnings[0].kind,
        ParseWarningKind::DegenerateArc(_)
    ));
}

#[test]
fn test_bad_line_does_not_stop_parse() {
    let parsed = parse("G1 X1\nG2 X100 Y0 R1\nG1 X2 Y#3\nG1 Y4");
    let warned: Vec<usize> = parsed.warnings.iter().map(|w| w.line_index).collect();
    assert!(warned.contains(&1));
    assert!(warned.contains(&2));
    assert_eq!(parsed.line_map, vec![0, 2, 3]);
    assert_eq!(parsed.segments.last().map(|s| s.end), Some(Point3::new(2.0, 4.0, 0.0)));
}

#[test]
fn test_line_numbers_case_and_spacing() {
    let parsed = parse("N10 g0 x1 y2\nn20 G 1 X 3");
    assert_eq!(parsed.segments.len(), 2);
    assert_eq!(parsed.segments[0].mode, MotionMode::Rapid);
    assert_eq!(parsed.segments[1].end, Point3::new(3.0, 2.0, 0.0));
}

#[test]
fn test_radius_sign_selects_minor_or_major_arc() {
    let minor = parse("G2 X10 Y0 R10");
    let major = parse("G2 X10 Y0 R-10");
    let length = |p: &pathlens_visualizer::ParsedToolpath| -> f64 {
        p.segments.iter().map(|s| s.length()).sum()
    };
    assert!(length(&minor) < length(&major));
    // Minor clockwise arc from (0,0) to (10,0) bulges upward
    assert!(minor.segments.iter().all(|s| s.end.y >= -1e-9));
}

#[test]
fn test_helical_arc_interpolates_z() {
    let parsed = parse("G0 X10\nG3 X-10 Y0 Z-4 I-10 J0");
    let arc: Vec<_> = parsed
        .segments
        .iter()
        .filter(|s| s.mode == MotionMode::ArcCcw)
        .collect();
    assert_eq!(arc.len(), 32);
    assert!((arc[15].end.z + 2.0).abs() < 1e-9);
    assert!((arc[31].end.z + 4.0).abs() < 1e-9);
}

#[test]
fn test_rounded_full_circle_draws_in_both_directions() {
    // Relative moves leave the position at 0.30000000000000004
    for word in ["G2", "G3"] {
        let program = format!("G0 X0.1 Y0.1\nG91 G0 X0.2 Y0.2\nG90 {word} X0.3 Y0.3 I-1 J0");
        let parsed = parse(&program);
        let arc: Vec<_> = parsed.segments.iter().filter(|s| s.mode.is_arc()).collect();
        assert_eq!(arc.len(), 32, "{word}");
        assert!(parsed.warnings.is_empty(), "{word}");
        let length: f64 = arc.iter().map(|s| s.length()).sum();
        assert!((length - std::f64::consts::TAU).abs() < 0.02, "{word}: {length}");
    }
}

#[test]
fn test_binary_input_rejected() {
    assert!(ToolpathParser::new().parse_bytes(&[0x47, 0x31, 0x00]).is_err());
}

fn point() -> impl Strategy<Value = (f64, f64, f64)> {
    (-500.0f64..500.0, -500.0f64..500.0, -50.0f64..50.0)
}

proptest! {
    #[test]
    fn arc_endpoints_match_declared(
        start in point(),
        radius in 0.1f64..200.0,
        start_angle in -3.2f64..3.2,
        end_angle in -3.2f64..3.2,
        end_z in -50.0f64..50.0,
        clockwise in any::<bool>(),
        segments in 1u32..96,
    ) {
        let start = Point3::new(start.0, start.1, start.2);
        let center = Point3::new(
            start.x - radius * start_angle.cos(),
            start.y - radius * start_angle.sin(),
            0.0,
        );
        let end = Point3::new(
            center.x + radius * end_angle.cos(),
            center.y + radius * end_angle.sin(),
            end_z,
        );
        let arc = ArcSpec::from_offsets(start, end, center.x - start.x, center.y - start.y, clockwise)
            .unwrap();
        let points = arc.interpolate(segments);
        prop_assert_eq!(points.len(), segments as usize + 1);
        prop_assert!(points[0].approx_eq(start, 1e-6));
        prop_assert!(points[points.len() - 1].approx_eq(end, 1e-6));
        if clockwise {
            prop_assert!(arc.sweep_angle < 0.0);
        } else {
            prop_assert!(arc.sweep_angle > 0.0);
        }
    }

    #[test]
    fn parsed_arc_ends_at_target(
        target in point(),
        i in -100.0f64..100.0,
        j in -100.0f64..100.0,
        clockwise in any::<bool>(),
    ) {
        prop_assume!(i.hypot(j) > 0.01);
        let word = if clockwise { "G2" } else { "G3" };
        // Project the target onto the circle so the arc is consistent
        let r = i.hypot(j);
        let angle = (target.1 - j).atan2(target.0 - i);
        let (ex, ey) = (i + r * angle.cos(), j + r * angle.sin());
        prop_assume!(ex.hypot(ey) > 1e-3);
        let text = format!("{} X{} Y{} Z{} I{} J{}", word, ex, ey, target.2, i, j);
        let parsed = ToolpathParser::new().parse(&text);
        prop_assert!(!parsed.segments.is_empty());
        let first = parsed.segments[0].start;
        let last = parsed.segments[parsed.segments.len() - 1].end;
        prop_assert!(first.approx_eq(Point3::ZERO, 1e-6));
        prop_assert!(last.approx_eq(Point3::new(ex, ey, target.2), 1e-6));
    }

    #[test]
    fn mode_counts_sum_to_segment_count(
        lines in prop::collection::vec((0u32..4, -100.0f64..100.0, -100.0f64..100.0, 0.5f64..50.0), 0..60)
    ) {
        let text: String = lines
            .iter()
            .map(|(g, x, y, r)| match g {
                0 | 1 => format!("G{} X{} Y{}\n", g, x, y),
                _ => format!("G{} X{} Y{} R{}\n", g, x, y, r),
            })
            .collect();
        let parsed = ToolpathParser::new().parse(&text);
        prop_assert_eq!(parsed.mode_counts.total(), parsed.segments.len());
        prop_assert_eq!(parsed.line_map.len(), parsed.segments.len());
        for (segment, line) in parsed.segments.iter().zip(&parsed.line_map) {
            prop_assert_eq!(segment.source_line_index, *line);
        }
    }
}
