//! Core types for the backdrop ambient animation engine.
//!
//! Shared between the engine, the configuration loader and hosts: colours,
//! geometry, element kinds, the engine configuration and environment state.

mod color;
mod config;
mod element;
mod environment;
mod geometry;

pub use color::Rgba;
pub use config::{
    ConfigError, ConfigPatch, EngineConfig, ForceSettings, MAX_SECONDS, PointCloudSettings,
    RendererKind,
};
pub use element::{BubbleVariant, ElementKind};
pub use environment::EnvironmentState;
pub use geometry::{Rect, Vec2, Vec3, Viewport};
