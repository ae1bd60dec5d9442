//! Limn2d is the retained-mode 2D render graph behind a timeline editor.
//!
//! Each frame the scene walk replays its drawables through a
//! [`GraphicsContext2D`], which diffs the calls against the node tree kept
//! from the previous frame. Unchanged nodes keep their cached operations;
//! changed nodes are updated in place and reprocessed; nodes that are not
//! revisited are evicted. A [`RenderNodeProcessor`] then lowers the tree into
//! a flat list of [`RenderNodeOperation`]s: boundable, hit-testable drawing
//! instructions consumed by the renderer and the picking layer.
//!
//! # Pass overview
//!
//! 1. **Reconcile**: drawable scene + previous tree -> updated tree
//! 2. **Process**: tree -> `Vec<Rc<RenderNodeOperation>>` (cache-aware)
//! 3. **Render**: operations -> pixels via a [`Canvas`] sink
//! 4. **Pick**: operations -> hit test, topmost first
//!
//! Design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Deterministic**: processing is a pure function of node parameters and
//!   upstream operations.
//! - **Single-threaded passes**: sibling nodes are never processed or
//!   disposed concurrently.
//! - **Premultiplied RGBA8** end-to-end in the CPU backend.
#![forbid(unsafe_code)]

mod canvas;
mod effects;
mod foundation;
mod geometry;
mod graph;
mod image_source;
mod paint;
mod pixels;
mod render;

pub use canvas::{Canvas, RenderTarget, SurfaceCache, SurfaceFactory};
pub use effects::context::{
    BoundsTransformFn, CustomEffectContext, CustomEffectFn, CustomFeItem, EffectTarget, FeItem,
    FeItemKind, FilterEffectContext,
};
pub use effects::filter::{Blur, DropShadow, FilterEffect, FilterEffectGroup};
pub use foundation::core::{Affine, BezPath, Color, PixelSize, Point, Rect, Size, Vec2};
pub use foundation::error::{LimnError, LimnResult};
pub use geometry::{FillRule, Geometry};
pub use graph::context::RenderNodeContext;
pub use graph::draw::{
    ClearRenderNode, EllipseRenderNode, GeometryRenderNode, ImageSourceRenderNode,
    RectangleRenderNode,
};
pub use graph::layer::{
    FilterEffectRenderNode, OpacityRenderNode, RectClipRenderNode, TransformRenderNode,
};
pub use graph::node::{ContainerRenderNode, NodeState, RenderNode};
pub use graph::op::RenderNodeOperation;
pub use graph::processor::{RenderNodeProcessor, hit_test_ops, render_ops};
pub use graph::reconcile::{GraphicsContext2D, UntrackedFn};
pub use image_source::ImageSource;
pub use paint::{Brush, Pen};
pub use render::cpu::{CpuCanvas, CpuSurfaceFactory};
