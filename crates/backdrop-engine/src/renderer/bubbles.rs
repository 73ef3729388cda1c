//! Bubbles presented as display-tree nodes.
//!
//! Each bubble becomes one node carrying its geometry and a declarative
//! animation (duration + delay). The host animates the node; this renderer
//! does no per-frame work and expiry is purely time-based.

use std::time::Duration;

use backdrop_core::{BubbleVariant, ElementKind, Rgba, RendererKind, Viewport};

use super::{RenderFault, Renderer};
use crate::element::{RenderHandle, VisualElement};

/// Identifier of a node appended to a display tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

/// Host display tree the bubble container lives in.
pub trait DisplayTree {
    /// Append a node to the container.
    fn append(&mut self, node: BubbleNode) -> Result<NodeId, RenderFault>;

    /// Detach a node. Returns `false` if it was no longer attached.
    fn remove(&mut self, id: NodeId) -> bool;
}

/// Radial fill of a bubble.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BubbleFill {
    pub variant: BubbleVariant,
    pub tint: Rgba,
}

impl BubbleFill {
    /// Highlight position of the gradient, as a fraction of the node box.
    pub const HIGHLIGHT: (f32, f32) = (0.3, 0.3);

    /// CSS `background` value for the fill.
    pub fn to_css(self) -> String {
        match self.variant {
            BubbleVariant::Glow => format!(
                "radial-gradient(circle at 30% 30%, {}, transparent 70%)",
                self.tint
            ),
            BubbleVariant::Glass => format!(
                "radial-gradient(circle at 30% 30%, rgba(255,255,255,0.3), {})",
                self.tint
            ),
        }
    }
}

/// Everything a host needs to place and animate one bubble.
#[derive(Debug, Clone, PartialEq)]
pub struct BubbleNode {
    /// Diameter in pixels.
    pub size: f32,
    /// Horizontal offset as a percentage of the container width.
    pub left_percent: f32,
    /// Vertical offset from the bottom as a percentage of the height.
    pub bottom_percent: f32,
    pub fill: BubbleFill,
    /// Length of the rise animation.
    pub duration: Duration,
    /// Wait before the animation starts.
    pub delay: Duration,
}

impl BubbleNode {
    pub fn class_name(&self) -> String {
        format!("ai-bubble {}", self.fill.variant.class_name())
    }
}

/// Renderer mounting bubbles into a [`DisplayTree`].
pub struct BubbleRenderer {
    tree: Box<dyn DisplayTree>,
    viewport: Viewport,
    mounted: usize,
}

impl BubbleRenderer {
    pub fn new(tree: Box<dyn DisplayTree>, viewport: Viewport) -> Self {
        Self {
            tree,
            viewport,
            mounted: 0,
        }
    }

    /// Nodes currently attached through this renderer.
    pub fn mounted(&self) -> usize {
        self.mounted
    }

    fn node_for(&self, element: &VisualElement) -> Result<BubbleNode, RenderFault> {
        let start = element.position.plane().ok_or(RenderFault::WrongKind {
            renderer: "bubbles",
            kind: element.kind,
        })?;
        let width = self.viewport.width.max(1.0);
        let height = self.viewport.height.max(1.0);

        Ok(BubbleNode {
            size: element.size,
            left_percent: start.x / width * 100.0,
            bottom_percent: (height - start.y) / height * 100.0,
            fill: BubbleFill {
                variant: element.variant,
                tint: element.color,
            },
            duration: element.duration,
            delay: element.delay,
        })
    }
}

impl Renderer for BubbleRenderer {
    fn name(&self) -> &'static str {
        "bubbles"
    }

    fn mode(&self) -> Option<RendererKind> {
        Some(RendererKind::Bubbles)
    }

    fn spawns(&self) -> Option<ElementKind> {
        Some(ElementKind::Bubble)
    }

    fn mount(&mut self, element: &VisualElement) -> Result<RenderHandle, RenderFault> {
        if element.kind != ElementKind::Bubble {
            return Err(RenderFault::WrongKind {
                renderer: "bubbles",
                kind: element.kind,
            });
        }
        let node = self.node_for(element)?;
        let id = self.tree.append(node)?;
        self.mounted += 1;
        Ok(RenderHandle::Node(id))
    }

    fn unmount(&mut self, handle: RenderHandle) {
        let RenderHandle::Node(id) = handle else {
            tracing::warn!(?handle, "bubble renderer asked to release a foreign handle");
            return;
        };
        self.mounted = self.mounted.saturating_sub(1);
        if !self.tree.remove(id) {
            tracing::debug!(node = id.0, "bubble node was already detached");
        }
    }

    fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }
}
