//! # PathLens Visualizer
//!
//! Toolpath reconstruction, rendering, and point inspection.
//! Includes the G-code toolpath parser with arc expansion, the point data
//! extractor, instanced geometry batching, level-of-detail selection,
//! draw ordering, ray-cast picking, tooltip layout, and scrub seeking,
//! all driven through a single [`ViewerSession`].

pub mod gcode;
pub mod visualizer;

pub use gcode::{
    ArcDisplayInfo, ArcError, ArcSpan, ArcSpec, Compiler, DisplayStrings, ParseWarning,
    ParseWarningKind, ParsedToolpath, PassthroughCompiler, PickHit, PointDataExtractor,
    PointRecord, ToolpathParser, ToolpathStats,
};

pub use visualizer::{
    Camera, Debounce, DrawCall, FrameStats, GeometryManager, GlowBackend, GpuBackend, GpuHandle,
    HeadlessBackend, InstanceData, LodSystem, LodUpdate, MaterialKey, PickStats, QueueStats,
    RenderBatch, RenderObject, RenderQueue, SeekController, SeekUpdate, SessionState, Throttle,
    ToolpathCache, ToolpathPointDetector, TooltipManager, TooltipRect, ViewState, ViewerSession,
    ViewportRect,
};
