//! Randomised creation of visual elements.
//!
//! Every draw goes through the injected random source, so a seeded generator
//! reproduces the exact same spawn sequence.

use std::f32::consts::TAU;
use std::time::Duration;

use backdrop_core::{
    BubbleVariant, ElementKind, EngineConfig, EnvironmentState, Rgba, Vec2, Vec3,
};
use rand::Rng;

use crate::element::{ElementId, Position, VisualElement};

/// How far below the bottom edge bubbles start, as a fraction of the height.
const BUBBLE_START_BELOW: f32 = 0.1;

/// Extra size added to every point so none is invisible.
const POINT_MIN_SIZE: f32 = 0.5;

/// Create one unmounted element of the given kind.
pub fn create<R: Rng + ?Sized>(
    id: ElementId,
    kind: ElementKind,
    config: &EngineConfig,
    env: &EnvironmentState,
    now: Duration,
    rng: &mut R,
) -> VisualElement {
    match kind {
        ElementKind::Bubble => create_bubble(id, config, env, now, rng),
        ElementKind::Point => create_point(id, config, now, rng),
        ElementKind::Particle => create_particle(id, config, env, now, rng),
    }
}

fn create_bubble<R: Rng + ?Sized>(
    id: ElementId,
    config: &EngineConfig,
    env: &EnvironmentState,
    now: Duration,
    rng: &mut R,
) -> VisualElement {
    let size = uniform(rng, config.min_size, config.max_size);
    let duration = uniform(rng, config.min_duration, config.max_duration);
    let x = uniform(rng, 0.0, env.viewport.width);
    let color = pick_color(rng, &config.colors);
    let variant = if rng.gen_bool(0.5) {
        BubbleVariant::Glow
    } else {
        BubbleVariant::Glass
    };
    let delay = uniform(rng, 0.0, config.max_delay);

    let duration = seconds(duration);
    let delay = seconds(delay);
    let start = Vec2::new(x, env.viewport.height * (1.0 + BUBBLE_START_BELOW));

    let mut bubble = VisualElement::new(
        id,
        ElementKind::Bubble,
        Position::Plane(start),
        None,
        size,
        color,
        now,
        Some(delay.saturating_add(duration)),
    );
    bubble.duration = duration;
    bubble.delay = delay;
    bubble.variant = variant;
    bubble
}

fn create_point<R: Rng + ?Sized>(
    id: ElementId,
    config: &EngineConfig,
    now: Duration,
    rng: &mut R,
) -> VisualElement {
    let settings = &config.point_cloud;
    let radius = uniform(rng, settings.radius_min, settings.radius_max);
    let position = sample_sphere(rng, radius);
    let color = pick_color(rng, &config.colors);
    let size = uniform(rng, 0.0, settings.particle_size) + POINT_MIN_SIZE;

    VisualElement::new(
        id,
        ElementKind::Point,
        Position::Space(position),
        None,
        size,
        color,
        now,
        None,
    )
}

fn create_particle<R: Rng + ?Sized>(
    id: ElementId,
    config: &EngineConfig,
    env: &EnvironmentState,
    now: Duration,
    rng: &mut R,
) -> VisualElement {
    let position = Vec2::new(
        uniform(rng, 0.0, env.viewport.width),
        uniform(rng, 0.0, env.viewport.height),
    );
    let heading = uniform(rng, 0.0, TAU);
    let speed = uniform(rng, config.force.min_speed, config.force.initial_speed);
    let velocity = Vec2::new(heading.cos() * speed, heading.sin() * speed);
    let size = uniform(rng, config.min_size, config.max_size);
    let color = pick_color(rng, &config.colors);
    let lifetime = uniform(rng, config.min_duration, config.max_duration);

    VisualElement::new(
        id,
        ElementKind::Particle,
        Position::Plane(position),
        Some(velocity),
        size,
        color,
        now,
        Some(seconds(lifetime)),
    )
}

/// Uniform point on a sphere of the given radius.
///
/// `phi` comes from `acos(2u - 1)`, not a uniform angle: picking the polar
/// angle uniformly would crowd points around the poles.
pub fn sample_sphere<R: Rng + ?Sized>(rng: &mut R, radius: f32) -> Vec3 {
    let theta = uniform(rng, 0.0, TAU);
    let phi = (2.0 * uniform(rng, 0.0, 1.0) - 1.0).clamp(-1.0, 1.0).acos();

    Vec3::new(
        radius * phi.sin() * theta.cos(),
        radius * phi.sin() * theta.sin(),
        radius * phi.cos(),
    )
}

/// Uniform float in `[min, max)`; a degenerate range yields `min`.
fn uniform<R: Rng + ?Sized>(rng: &mut R, min: f32, max: f32) -> f32 {
    if max > min {
        rng.gen_range(min..max)
    } else {
        min
    }
}

/// Seconds as a `Duration`, saturating instead of panicking on values a
/// `Duration` cannot hold.
fn seconds(value: f32) -> Duration {
    Duration::try_from_secs_f32(value).unwrap_or(if value > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}

fn pick_color<R: Rng + ?Sized>(rng: &mut R, palette: &[Rgba]) -> Rgba {
    match palette.len() {
        0 => Rgba::WHITE,
        len => palette[rng.gen_range(0..len)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backdrop_core::{RendererKind, Viewport};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn env() -> EnvironmentState {
        EnvironmentState {
            viewport: Viewport::new(1000.0, 500.0),
            ..EnvironmentState::default()
        }
    }

    #[test]
    fn bubble_fields_stay_in_configured_ranges() {
        let config = EngineConfig::preset(RendererKind::Bubbles);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let now = Duration::from_secs(3);

        for i in 0..500 {
            let b = create(ElementId(i), ElementKind::Bubble, &config, &env(), now, &mut rng);
            assert!(b.size >= config.min_size && b.size <= config.max_size);
            let duration = b.duration.as_secs_f32();
            assert!(duration >= config.min_duration && duration <= config.max_duration + 1e-3);
            assert!(b.delay.as_secs_f32() <= config.max_delay + 1e-3);
            assert_eq!(b.lifetime, Some(b.delay + b.duration));
            assert!(config.colors.contains(&b.color));
            let p = b.position.plane().unwrap();
            assert!(p.x >= 0.0 && p.x < 1000.0);
            assert!(p.y > 500.0);
            assert_eq!(b.born_at, now);
            assert!(!b.is_mounted());
        }
    }

    #[test]
    fn seeded_sources_reproduce_the_same_sequence() {
        let config = EngineConfig::preset(RendererKind::Particles);
        let mut a = ChaCha8Rng::seed_from_u64(42);
        let mut b = ChaCha8Rng::seed_from_u64(42);

        for i in 0..50 {
            let x = create(ElementId(i), ElementKind::Particle, &config, &env(), Duration::ZERO, &mut a);
            let y = create(ElementId(i), ElementKind::Particle, &config, &env(), Duration::ZERO, &mut b);
            assert_eq!(x.position, y.position);
            assert_eq!(x.velocity, y.velocity);
            assert_eq!(x.color, y.color);
            assert_eq!(x.lifetime, y.lifetime);
        }
    }

    #[test]
    fn particle_speed_within_initial_bounds() {
        let config = EngineConfig::preset(RendererKind::Particles);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for i in 0..200 {
            let p = create(ElementId(i), ElementKind::Particle, &config, &env(), Duration::ZERO, &mut rng);
            let speed = p.velocity.unwrap().length();
            assert!(speed >= config.force.min_speed - 1e-3);
            assert!(speed <= config.force.initial_speed + 1e-3);
        }
    }

    #[test]
    fn degenerate_ranges_yield_the_minimum() {
        let config = EngineConfig {
            min_size: 20.0,
            max_size: 20.0,
            min_duration: 5.0,
            max_duration: 5.0,
            max_delay: 0.0,
            ..EngineConfig::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let b = create(ElementId(0), ElementKind::Bubble, &config, &env(), Duration::ZERO, &mut rng);
        assert_eq!(b.size, 20.0);
        assert_eq!(b.lifetime, Some(Duration::from_secs(5)));
    }

    #[test]
    fn oversized_seconds_saturate_instead_of_panicking() {
        assert_eq!(seconds(1e20), Duration::MAX);
        assert_eq!(seconds(f32::NAN), Duration::ZERO);
        assert_eq!(seconds(2.5), Duration::from_millis(2500));

        let config = EngineConfig {
            min_duration: 1e20,
            max_duration: 1e20,
            ..EngineConfig::preset(RendererKind::Bubbles)
        };
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let b = create(ElementId(0), ElementKind::Bubble, &config, &env(), Duration::ZERO, &mut rng);
        assert_eq!(b.lifetime, Some(Duration::MAX));
    }

    #[test]
    fn points_lie_in_the_configured_shell_and_never_expire() {
        let config = EngineConfig::preset(RendererKind::Points);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for i in 0..300 {
            let p = create(ElementId(i), ElementKind::Point, &config, &env(), Duration::ZERO, &mut rng);
            let r = p.position.space().unwrap().length();
            assert!(r >= config.point_cloud.radius_min - 1e-3);
            assert!(r <= config.point_cloud.radius_max + 1e-3);
            assert!(p.lifetime.is_none());
            assert!(!p.is_expired(Duration::from_secs(1_000_000)));
        }
    }

    /// Chi-square statistic of polar angles bucketed into equal-area bands.
    ///
    /// Band `k` covers `cos(phi)` in an equal slice of [-1, 1], so a uniform
    /// sphere puts the same expected count in every band.
    fn phi_chi_square(phis: &[f32], buckets: usize) -> f32 {
        let mut counts = vec![0usize; buckets];
        for &phi in phis {
            let u = (1.0 - phi.cos()) / 2.0;
            let idx = ((u * buckets as f32) as usize).min(buckets - 1);
            counts[idx] += 1;
        }
        let expected = phis.len() as f32 / buckets as f32;
        counts
            .iter()
            .map(|&c| (c as f32 - expected).powi(2) / expected)
            .sum()
    }

    // 9 degrees of freedom, p = 0.001.
    const CHI_SQUARE_CRITICAL: f32 = 27.88;

    #[test]
    fn sphere_sampling_is_uniform() {
        let mut rng = ChaCha8Rng::seed_from_u64(2024);
        let phis: Vec<f32> = (0..20_000)
            .map(|_| {
                let p = sample_sphere(&mut rng, 1.0);
                (p.z / p.length()).clamp(-1.0, 1.0).acos()
            })
            .collect();

        let chi = phi_chi_square(&phis, 10);
        assert!(chi < CHI_SQUARE_CRITICAL, "chi-square {chi} indicates clustering");
    }

    #[test]
    fn uniform_polar_angle_clusters_at_the_poles() {
        let mut rng = ChaCha8Rng::seed_from_u64(2024);
        let phis: Vec<f32> = (0..20_000)
            .map(|_| rng.gen_range(0.0..std::f32::consts::PI))
            .collect();

        let chi = phi_chi_square(&phis, 10);
        assert!(chi > CHI_SQUARE_CRITICAL, "naive sampling passed with {chi}");
    }
}
