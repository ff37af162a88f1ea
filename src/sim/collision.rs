//! Collision detection and response for the board geometry
//!
//! Everything on a Plinko board is either a circle (balls, pegs) or an
//! axis-aligned rectangle (barriers, bucket sensors), so two narrow-phase
//! tests cover the whole domain.

use glam::Vec2;

/// Result of a collision check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionResult {
    /// Whether a collision occurred
    pub hit: bool,
    /// Contact point on the other shape's surface (if hit)
    pub point: Vec2,
    /// Surface normal pointing from the other shape toward the circle
    pub normal: Vec2,
    /// Penetration depth (for position correction)
    pub penetration: f32,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            point: Vec2::ZERO,
            normal: Vec2::ZERO,
            penetration: 0.0,
        }
    }
}

/// Check collision between a circle and another circle
pub fn circle_circle_collision(
    pos: Vec2,
    radius: f32,
    other_pos: Vec2,
    other_radius: f32,
) -> CollisionResult {
    let delta = pos - other_pos;
    let reach = radius + other_radius;
    let dist_sq = delta.length_squared();

    if dist_sq >= reach * reach {
        return CollisionResult::miss();
    }

    let dist = dist_sq.sqrt();
    // Concentric circles: push straight up, the only direction that never
    // drives a falling ball deeper into the board
    let normal = if dist > f32::EPSILON {
        delta / dist
    } else {
        Vec2::NEG_Y
    };

    CollisionResult {
        hit: true,
        point: other_pos + normal * other_radius,
        normal,
        penetration: reach - dist,
    }
}

/// Check collision between a circle and an axis-aligned rectangle
///
/// When the circle centre is outside the rectangle the normal runs from the
/// closest point on the rectangle to the centre. When the centre is inside,
/// the circle is pushed out along the axis of least penetration.
pub fn circle_rect_collision(
    pos: Vec2,
    radius: f32,
    center: Vec2,
    half_extents: Vec2,
) -> CollisionResult {
    let min = center - half_extents;
    let max = center + half_extents;
    let closest = pos.clamp(min, max);
    let delta = pos - closest;
    let dist_sq = delta.length_squared();

    if dist_sq > 0.0 {
        if dist_sq >= radius * radius {
            return CollisionResult::miss();
        }
        let dist = dist_sq.sqrt();
        return CollisionResult {
            hit: true,
            point: closest,
            normal: delta / dist,
            penetration: radius - dist,
        };
    }

    // Centre inside the rectangle (tunnelling or spawn overlap)
    let to_min = pos - min;
    let to_max = max - pos;
    let exits = [
        (to_min.x, Vec2::NEG_X),
        (to_max.x, Vec2::X),
        (to_min.y, Vec2::NEG_Y),
        (to_max.y, Vec2::Y),
    ];
    let (depth, normal) = exits
        .into_iter()
        .fold((f32::INFINITY, Vec2::NEG_Y), |best, cand| {
            if cand.0 < best.0 { cand } else { best }
        });

    CollisionResult {
        hit: true,
        point: pos + normal * depth,
        normal,
        penetration: depth + radius,
    }
}

/// Bounce velocity off a surface
///
/// Only the approaching normal component is reflected (scaled by
/// restitution); the tangential component loses `friction` of its magnitude.
/// A separating velocity is returned unchanged.
#[inline]
pub fn bounce_velocity(velocity: Vec2, normal: Vec2, restitution: f32, friction: f32) -> Vec2 {
    let vn = velocity.dot(normal);
    if vn >= 0.0 {
        return velocity;
    }
    let normal_part = normal * vn;
    let tangent_part = velocity - normal_part;
    tangent_part * (1.0 - friction) - normal_part * restitution
}
