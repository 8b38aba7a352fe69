//! # PathLens Core
//!
//! Core types shared by every PathLens crate.
//! Provides the toolpath data model (points, motion modes, segments),
//! bounding boxes, constants, and the error taxonomy used across
//! parsing, loading, and rendering.

pub mod constants;
pub mod data;
pub mod error;

pub use data::{Bounds, ModeCounts, MotionMode, Point3, Segment};

pub use error::{CompileError, Error, LoadError, ParseError, RenderError, Result};
