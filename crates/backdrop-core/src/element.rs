//! Kinds of visual elements the engine animates.

/// What a spawned element is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// A floating bubble mounted in a display tree.
    Bubble,
    /// One point of the rotating 3D field.
    Point,
    /// A 2D particle with velocity.
    Particle,
}

/// Fill style of a bubble.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BubbleVariant {
    /// White highlight fading into the tint.
    #[default]
    Glass,
    /// Tint fading into transparency.
    Glow,
}

impl BubbleVariant {
    /// Class name a display tree can style on.
    pub fn class_name(self) -> &'static str {
        match self {
            BubbleVariant::Glass => "glass",
            BubbleVariant::Glow => "glow",
        }
    }
}
