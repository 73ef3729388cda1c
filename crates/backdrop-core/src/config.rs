//! Engine configuration, per-mode presets and partial updates.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::Rgba;
use crate::element::ElementKind;

/// Errors raised while validating or parsing configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A count or interval that must be positive was zero or negative.
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    /// A min/max pair is inverted, negative or not finite.
    #[error("invalid {field} range: min {min} must not exceed max {max}")]
    InvalidRange {
        field: &'static str,
        min: f32,
        max: f32,
    },

    /// A scalar is outside the interval it must lie in.
    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f32,
        max: f32,
        value: f32,
    },

    /// The colour palette has no entries.
    #[error("colour palette must not be empty")]
    EmptyPalette,

    /// A colour string could not be parsed.
    #[error("invalid colour: {0:?}")]
    InvalidColor(String),
}

/// Presentation strategy requested by the configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Floating bubbles in a display tree, animated declaratively by the host.
    #[default]
    Bubbles,
    /// 2D canvas particles with proximity connections and pointer attraction.
    Particles,
    /// Rotating 3D point field drawn by a GPU-style point backend.
    Points,
}

impl RendererKind {
    /// Cycle to the next mode.
    pub fn next(self) -> Self {
        match self {
            RendererKind::Bubbles => RendererKind::Particles,
            RendererKind::Particles => RendererKind::Points,
            RendererKind::Points => RendererKind::Bubbles,
        }
    }

    /// Display name for the mode.
    pub fn name(self) -> &'static str {
        match self {
            RendererKind::Bubbles => "bubbles",
            RendererKind::Particles => "particles",
            RendererKind::Points => "points",
        }
    }

    /// Kind of element this mode spawns.
    pub fn element_kind(self) -> ElementKind {
        match self {
            RendererKind::Bubbles => ElementKind::Bubble,
            RendererKind::Particles => ElementKind::Particle,
            RendererKind::Points => ElementKind::Point,
        }
    }
}

/// Settings for the rotating point field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointCloudSettings {
    /// Inner radius of the spherical shell points are seeded in.
    pub radius_min: f32,
    /// Outer radius of the shell.
    pub radius_max: f32,
    /// Upper bound of the random per-point size (0.5 is always added).
    pub particle_size: f32,
    /// Rotation around the x axis in radians per second; y turns at half.
    pub rotation_speed: f32,
    /// Radians added per frame per unit of normalised pointer offset.
    pub mouse_influence: f32,
    /// Material opacity handed to the backend.
    pub opacity: f32,
}

impl Default for PointCloudSettings {
    fn default() -> Self {
        Self {
            radius_min: 30.0,
            radius_max: 70.0,
            particle_size: 2.0,
            rotation_speed: 0.018,
            mouse_influence: 0.000_05,
            opacity: 0.6,
        }
    }
}

/// Settings for the 2D force-directed particle field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceSettings {
    /// Pointer attraction radius in pixels.
    pub attraction_radius: f32,
    /// Acceleration toward the pointer at zero distance, px/s².
    pub attraction_strength: f32,
    /// Speed ceiling applied after every impulse, px/s.
    pub max_speed: f32,
    /// Lower bound of the initial speed, px/s.
    pub min_speed: f32,
    /// Upper bound of the initial speed, px/s.
    pub initial_speed: f32,
    /// Opacity of the per-frame fade rectangle.
    pub fade_alpha: f32,
    /// Colour the fade rectangle paints with.
    pub background: Rgba,
    /// Colour of connection lines before distance opacity is applied.
    pub line_color: Rgba,
}

impl Default for ForceSettings {
    fn default() -> Self {
        Self {
            attraction_radius: 150.0,
            attraction_strength: 240.0,
            max_speed: 90.0,
            min_speed: 10.0,
            initial_speed: 40.0,
            fade_alpha: 0.12,
            background: Rgba::rgb(10, 14, 26),
            line_color: Rgba::rgb(78, 203, 255),
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Requested presentation strategy.
    pub mode: RendererKind,
    /// Population ceiling on wide viewports.
    pub max_count: usize,
    /// Population ceiling below `breakpoint_width`.
    pub narrow_max_count: usize,
    /// Viewport width (px) under which the narrow ceiling applies.
    pub breakpoint_width: f32,
    pub min_size: f32,
    pub max_size: f32,
    /// Shortest animation duration in seconds.
    pub min_duration: f32,
    /// Longest animation duration in seconds.
    pub max_duration: f32,
    /// Upper bound of the random start delay in seconds.
    pub max_delay: f32,
    pub spawn_interval_ms: u64,
    /// Number of leading spawns paced by `burst_stagger_ms`.
    pub initial_burst: usize,
    pub burst_stagger_ms: u64,
    pub colors: Vec<Rgba>,
    /// Connection threshold for the particle field, px.
    pub connection_distance: f32,
    /// Overrides the host's reduced-motion preference when set.
    pub reduced_motion: Option<bool>,
    pub point_cloud: PointCloudSettings,
    pub force: ForceSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::preset(RendererKind::Bubbles)
    }
}

impl EngineConfig {
    /// Defaults for a mode, matching the site's shipped tuning.
    pub fn preset(mode: RendererKind) -> Self {
        let base = Self {
            mode,
            max_count: 12,
            narrow_max_count: 8,
            breakpoint_width: 768.0,
            min_size: 15.0,
            max_size: 60.0,
            min_duration: 10.0,
            max_duration: 18.0,
            max_delay: 2.0,
            spawn_interval_ms: 2500,
            initial_burst: 5,
            burst_stagger_ms: 500,
            colors: vec![
                Rgba::rgba(78, 203, 255, 0.3),
                Rgba::rgba(0, 119, 255, 0.25),
                Rgba::rgba(0, 212, 255, 0.2),
                Rgba::rgba(100, 180, 255, 0.25),
            ],
            connection_distance: 120.0,
            reduced_motion: None,
            point_cloud: PointCloudSettings::default(),
            force: ForceSettings::default(),
        };

        match mode {
            RendererKind::Bubbles => base,
            RendererKind::Particles => Self {
                max_count: 90,
                narrow_max_count: 45,
                min_size: 1.5,
                max_size: 3.5,
                min_duration: 20.0,
                max_duration: 40.0,
                max_delay: 0.0,
                spawn_interval_ms: 250,
                initial_burst: 0,
                colors: vec![
                    Rgba::rgba(78, 203, 255, 0.9),
                    Rgba::rgba(0, 119, 255, 0.9),
                    Rgba::rgba(255, 255, 255, 0.8),
                ],
                ..base
            },
            RendererKind::Points => Self {
                max_count: 800,
                narrow_max_count: 800,
                min_size: 0.5,
                max_size: 2.5,
                min_duration: 0.0,
                max_duration: 0.0,
                max_delay: 0.0,
                spawn_interval_ms: 1000,
                initial_burst: 0,
                colors: vec![
                    Rgba::rgb(79, 204, 255),
                    Rgba::rgb(0, 120, 255),
                    Rgba::WHITE,
                ],
                ..base
            },
        }
    }

    pub fn spawn_interval(&self) -> Duration {
        Duration::from_millis(self.spawn_interval_ms)
    }

    pub fn burst_stagger(&self) -> Duration {
        Duration::from_millis(self.burst_stagger_ms)
    }

    /// Population ceiling for a viewport of the given width.
    pub fn capacity_for_width(&self, width: f32) -> usize {
        if width < self.breakpoint_width {
            self.narrow_max_count.min(self.max_count)
        } else {
            self.max_count
        }
    }

    /// Check every invariant the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_count == 0 {
            return Err(ConfigError::NotPositive { field: "max_count" });
        }
        if self.narrow_max_count == 0 {
            return Err(ConfigError::NotPositive {
                field: "narrow_max_count",
            });
        }
        if !(self.breakpoint_width >= 0.0) {
            return Err(ConfigError::NotPositive {
                field: "breakpoint_width",
            });
        }
        check_range("size", self.min_size, self.max_size)?;
        check_range("duration", self.min_duration, self.max_duration)?;
        check_range("delay", 0.0, self.max_delay)?;
        check_seconds("max_duration", self.max_duration)?;
        check_seconds("max_delay", self.max_delay)?;
        if self.spawn_interval_ms == 0 {
            return Err(ConfigError::NotPositive {
                field: "spawn_interval_ms",
            });
        }
        if self.initial_burst > 0 && self.burst_stagger_ms == 0 {
            return Err(ConfigError::NotPositive {
                field: "burst_stagger_ms",
            });
        }
        if self.colors.is_empty() {
            return Err(ConfigError::EmptyPalette);
        }

        match self.mode {
            RendererKind::Bubbles => {}
            RendererKind::Particles => {
                if !(self.connection_distance > 0.0) {
                    return Err(ConfigError::NotPositive {
                        field: "connection_distance",
                    });
                }
                let f = &self.force;
                check_range("speed", f.min_speed, f.initial_speed)?;
                if !(f.max_speed > 0.0) {
                    return Err(ConfigError::NotPositive { field: "max_speed" });
                }
                if !(f.attraction_radius >= 0.0) {
                    return Err(ConfigError::NotPositive {
                        field: "attraction_radius",
                    });
                }
                check_unit("fade_alpha", f.fade_alpha)?;
            }
            RendererKind::Points => {
                let p = &self.point_cloud;
                check_range("radius", p.radius_min, p.radius_max)?;
                if !(p.particle_size >= 0.0) {
                    return Err(ConfigError::NotPositive {
                        field: "particle_size",
                    });
                }
                check_unit("opacity", p.opacity)?;
            }
        }

        Ok(())
    }

    /// Merge a partial update into a copy and validate the result.
    pub fn patched(&self, patch: &ConfigPatch) -> Result<EngineConfig, ConfigError> {
        let mut next = self.clone();
        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = &patch.$field { next.$field = v.clone(); })*
            };
        }
        take!(
            max_count,
            narrow_max_count,
            breakpoint_width,
            min_size,
            max_size,
            min_duration,
            max_duration,
            max_delay,
            spawn_interval_ms,
            initial_burst,
            burst_stagger_ms,
            colors,
            connection_distance,
            point_cloud,
            force,
        );
        if patch.reduced_motion.is_some() {
            next.reduced_motion = patch.reduced_motion;
        }
        next.validate()?;
        Ok(next)
    }
}

/// Partial configuration update; absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigPatch {
    pub max_count: Option<usize>,
    pub narrow_max_count: Option<usize>,
    pub breakpoint_width: Option<f32>,
    pub min_size: Option<f32>,
    pub max_size: Option<f32>,
    pub min_duration: Option<f32>,
    pub max_duration: Option<f32>,
    pub max_delay: Option<f32>,
    pub spawn_interval_ms: Option<u64>,
    pub initial_burst: Option<usize>,
    pub burst_stagger_ms: Option<u64>,
    pub colors: Option<Vec<Rgba>>,
    pub connection_distance: Option<f32>,
    pub reduced_motion: Option<bool>,
    pub point_cloud: Option<PointCloudSettings>,
    pub force: Option<ForceSettings>,
}

fn check_range(field: &'static str, min: f32, max: f32) -> Result<(), ConfigError> {
    if min.is_finite() && max.is_finite() && min >= 0.0 && min <= max {
        Ok(())
    } else {
        Err(ConfigError::InvalidRange { field, min, max })
    }
}

/// Longest duration or delay accepted, in seconds (one day).
pub const MAX_SECONDS: f32 = 86_400.0;

fn check_seconds(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value <= MAX_SECONDS {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            min: 0.0,
            max: MAX_SECONDS,
            value,
        })
    }
}

fn check_unit(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            min: 0.0,
            max: 1.0,
            value,
        })
    }
}
