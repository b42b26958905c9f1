//! Pairwise collision and penetration tests.
//!
//! [`test`] dispatches on the unordered pair of shape kinds in a single
//! `match`.  Mixed pairs are mirrored by or-patterns, and same-kind pairs are
//! put in a canonical order before testing, so `test(a, b)` and `test(b, a)`
//! return bit-identical results.
//!
//! # Capsule–box approximation
//!
//! Capsule–box distance is not computed exactly.  The segment is sampled at
//! [`Tolerances::capsule_box_samples`] evenly spaced points and the smallest
//! point-to-box distance is used.  A box corner or edge that pokes between two
//! samples can be missed when it lies closer to the segment than to any
//! sample, so thin near-misses may go undetected.  Callers that need an exact
//! answer should sample more densely or inflate the capsule by the worst-case
//! sampling gap.
//!
//! # Example
//!
//! ```rust
//! use ironclad_collision::{test, test_with_margin, CollisionResult, Shape, Vec3};
//!
//! let a = Shape::sphere(Vec3::ZERO, 1.0);
//! let b = Shape::sphere(Vec3::new(1.5, 0.0, 0.0), 1.0);
//! assert_eq!(test(&a, &b), CollisionResult::Collision { penetration_depth: 0.5 });
//!
//! let far = Shape::sphere(Vec3::new(3.0, 0.0, 0.0), 1.0);
//! assert_eq!(test(&a, &far), CollisionResult::NoCollision);
//! assert!(test_with_margin(&a, &far, 0.6).is_collision());
//! ```

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::math::Vec3;
use crate::shape::{Capsule, Obb, Shape, Sphere};

/// Number of points sampled along a capsule's segment for capsule–box tests.
pub const CAPSULE_BOX_SAMPLES: usize = 9;

/// Squared lengths below this are treated as zero: degenerate segments
/// collapse to points and near-parallel SAT cross axes are skipped.  Segment
/// pairs count as parallel when `sin²θ` of the angle between them falls
/// below it.
pub const DEGENERACY_EPSILON: f64 = 1e-10;

// ────────────────────────────────────────────────────────────────────────────
// Result & tolerances
// ────────────────────────────────────────────────────────────────────────────

/// Outcome of a pairwise test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CollisionResult {
    NoCollision,
    /// The shapes overlap.  `penetration_depth` is never negative.
    Collision { penetration_depth: f64 },
}

impl CollisionResult {
    pub fn is_collision(&self) -> bool {
        matches!(self, CollisionResult::Collision { .. })
    }

    pub fn penetration_depth(&self) -> Option<f64> {
        match self {
            CollisionResult::NoCollision => None,
            CollisionResult::Collision { penetration_depth } => Some(*penetration_depth),
        }
    }

    fn collision(depth: f64) -> Self {
        CollisionResult::Collision {
            penetration_depth: depth.max(0.0),
        }
    }
}

/// Numerical knobs of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    /// Samples along a capsule for capsule–box tests.  Values below 2 are
    /// treated as 2 (the two end points).
    pub capsule_box_samples: usize,
    /// See [`DEGENERACY_EPSILON`].
    pub degeneracy_epsilon: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            capsule_box_samples: CAPSULE_BOX_SAMPLES,
            degeneracy_epsilon: DEGENERACY_EPSILON,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Public API
// ────────────────────────────────────────────────────────────────────────────

/// Test two world-space shapes with the default [`Tolerances`].
pub fn test(a: &Shape, b: &Shape) -> CollisionResult {
    test_with(a, b, &Tolerances::default())
}

/// Inflate both shapes by `margin` and test them.  A `margin` that is not
/// strictly positive leaves the shapes untouched.
pub fn test_with_margin(a: &Shape, b: &Shape, margin: f64) -> CollisionResult {
    test_with_margin_and(a, b, margin, &Tolerances::default())
}

/// [`test_with_margin`] with explicit tolerances.
pub fn test_with_margin_and(
    a: &Shape,
    b: &Shape,
    margin: f64,
    tol: &Tolerances,
) -> CollisionResult {
    if margin > 0.0 {
        test_with(&a.inflate(margin), &b.inflate(margin), tol)
    } else {
        test_with(a, b, tol)
    }
}

/// Test two world-space shapes with explicit tolerances.
pub fn test_with(a: &Shape, b: &Shape, tol: &Tolerances) -> CollisionResult {
    match (a, b) {
        (Shape::Sphere(s1), Shape::Sphere(s2)) => {
            let (s1, s2) = canonical(s1, s2, Sphere::key);
            sphere_sphere(s1, s2)
        }
        (Shape::Capsule(c1), Shape::Capsule(c2)) => {
            let (c1, c2) = canonical(c1, c2, Capsule::key);
            capsule_capsule(c1, c2, tol)
        }
        (Shape::Box(o1), Shape::Box(o2)) => {
            let (o1, o2) = canonical(o1, o2, Obb::key);
            box_box(o1, o2, tol)
        }
        (Shape::Sphere(s), Shape::Capsule(c)) | (Shape::Capsule(c), Shape::Sphere(s)) => {
            sphere_capsule(s, c, tol)
        }
        (Shape::Sphere(s), Shape::Box(o)) | (Shape::Box(o), Shape::Sphere(s)) => sphere_box(s, o),
        (Shape::Capsule(c), Shape::Box(o)) | (Shape::Box(o), Shape::Capsule(c)) => {
            capsule_box(c, o, tol)
        }
    }
}

/// Order two same-kind primitives by a total order over their parameters.
fn canonical<'a, T, const N: usize>(
    a: &'a T,
    b: &'a T,
    key: fn(&T) -> [f64; N],
) -> (&'a T, &'a T) {
    let ordering = key(a)
        .iter()
        .zip(key(b).iter())
        .map(|(x, y)| x.total_cmp(y))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal);
    if ordering == Ordering::Greater {
        (b, a)
    } else {
        (a, b)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pair tests
// ────────────────────────────────────────────────────────────────────────────

fn within(distance: f64, reach: f64) -> CollisionResult {
    if distance < reach {
        CollisionResult::collision(reach - distance)
    } else {
        CollisionResult::NoCollision
    }
}

fn sphere_sphere(a: &Sphere, b: &Sphere) -> CollisionResult {
    within(a.centre.distance(b.centre), a.radius + b.radius)
}

fn sphere_capsule(s: &Sphere, c: &Capsule, tol: &Tolerances) -> CollisionResult {
    let closest = closest_point_on_segment(s.centre, c.a, c.b, tol.degeneracy_epsilon);
    within(s.centre.distance(closest), s.radius + c.radius)
}

fn capsule_capsule(c1: &Capsule, c2: &Capsule, tol: &Tolerances) -> CollisionResult {
    let (p1, p2) = closest_points_between_segments(c1.a, c1.b, c2.a, c2.b, tol.degeneracy_epsilon);
    within(p1.distance(p2), c1.radius + c2.radius)
}

fn sphere_box(s: &Sphere, o: &Obb) -> CollisionResult {
    within(distance_to_box(s.centre, o), s.radius)
}

fn capsule_box(c: &Capsule, o: &Obb, tol: &Tolerances) -> CollisionResult {
    let samples = tol.capsule_box_samples.max(2);
    let last = (samples - 1) as f64;
    let min_distance = (0..samples)
        .map(|i| {
            let t = i as f64 / last;
            distance_to_box(c.a + (c.b - c.a) * t, o)
        })
        .fold(f64::INFINITY, f64::min);
    within(min_distance, c.radius)
}

/// Separating Axis Theorem over the 15 candidate axes of two boxes.
///
/// Touching boxes (projected gap exactly equal to the summed radii) are
/// reported as a collision of depth zero.
fn box_box(a: &Obb, b: &Obb, tol: &Tolerances) -> CollisionResult {
    let offset = b.centre - a.centre;
    let mut min_overlap = f64::INFINITY;

    let face_axes = a.axes.iter().chain(b.axes.iter()).copied();
    let edge_axes = a
        .axes
        .iter()
        .flat_map(|&ea| b.axes.iter().map(move |&eb| ea.cross(eb)));

    for axis in face_axes.chain(edge_axes) {
        let len2 = axis.length_squared();
        if len2 < tol.degeneracy_epsilon {
            continue;
        }
        let axis = axis * (1.0 / len2.sqrt());

        let ra = projected_radius(a, axis);
        let rb = projected_radius(b, axis);
        let distance = offset.dot(axis).abs();
        if distance > ra + rb {
            return CollisionResult::NoCollision;
        }
        min_overlap = min_overlap.min(ra + rb - distance);
    }

    if min_overlap.is_finite() {
        CollisionResult::collision(min_overlap)
    } else {
        // Every axis was degenerate: the boxes have no usable frame.  Report
        // contact rather than silently clearing the pair.
        CollisionResult::collision(0.0)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Closest-point helpers
// ────────────────────────────────────────────────────────────────────────────

fn clamp01(t: f64) -> f64 {
    t.max(0.0).min(1.0)
}

fn projected_radius(o: &Obb, axis: Vec3) -> f64 {
    (0..3)
        .map(|i| o.half_extent(i) * o.axes[i].dot(axis).abs())
        .sum()
}

/// Closest point to `p` on the segment `a`–`b`.
pub(crate) fn closest_point_on_segment(p: Vec3, a: Vec3, b: Vec3, eps: f64) -> Vec3 {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 < eps {
        return a;
    }
    let t = clamp01((p - a).dot(ab) / len2);
    a + ab * t
}

/// Closest points between segments `p1`–`q1` and `p2`–`q2`.
pub(crate) fn closest_points_between_segments(
    p1: Vec3,
    q1: Vec3,
    p2: Vec3,
    q2: Vec3,
    eps: f64,
) -> (Vec3, Vec3) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);

    if a < eps && e < eps {
        return (p1, p2);
    }
    if a < eps {
        // First segment is a point.
        return (p1, closest_point_on_segment(p1, p2, q2, eps));
    }
    if e < eps {
        // Second segment is a point.
        return (closest_point_on_segment(p2, p1, q1, eps), p2);
    }

    let c = d1.dot(r);
    let b = d1.dot(d2);
    let denom = a * e - b * b;

    // Parallel segments: any s works, start from p1.  `denom` is
    // |d1|²|d2|²·sin²θ, so compare it relative to the segment lengths.
    let mut s = if denom > eps * a * e {
        clamp01((b * f - c * e) / denom)
    } else {
        0.0
    };
    let mut t = (b * s + f) / e;

    if t < 0.0 {
        t = 0.0;
        s = clamp01(-c / a);
    } else if t > 1.0 {
        t = 1.0;
        s = clamp01((b - c) / a);
    }

    (p1 + d1 * s, p2 + d2 * t)
}

/// Closest point to `p` on (or in) the box.
pub(crate) fn closest_point_on_box(p: Vec3, o: &Obb) -> Vec3 {
    let d = p - o.centre;
    let mut closest = o.centre;
    for i in 0..3 {
        let h = o.half_extent(i);
        let along = d.dot(o.axes[i]).max(-h).min(h);
        closest += o.axes[i] * along;
    }
    closest
}

fn distance_to_box(p: Vec3, o: &Obb) -> f64 {
    p.distance(closest_point_on_box(p, o))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Quaternion;
    use std::f64::consts::FRAC_PI_4;

    fn unit_box(centre: Vec3) -> Shape {
        Shape::Box(Obb::axis_aligned(centre, Vec3::splat(0.5)))
    }

    fn depth(r: CollisionResult) -> f64 {
        r.penetration_depth().expect("expected a collision")
    }

    fn zoo() -> Vec<Shape> {
        let yawed = Quaternion::from_axis_angle(Vec3::new(0.2, 0.4, 1.0), 0.9).basis();
        vec![
            Shape::sphere(Vec3::ZERO, 1.0),
            Shape::sphere(Vec3::new(1.2, 0.3, -0.4), 0.5),
            Shape::capsule(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.5, 0.0), 0.3),
            Shape::capsule(Vec3::new(0.0, -1.0, 0.2), Vec3::new(0.0, 1.0, 0.2), 0.1),
            Shape::capsule(Vec3::new(0.5, 0.5, 0.5), Vec3::new(0.5, 0.5, 0.5), 0.2),
            unit_box(Vec3::new(0.9, 0.0, 0.0)),
            Shape::obb(Vec3::new(0.3, 1.1, 0.0), Vec3::new(0.4, 0.2, 0.6), yawed),
            Shape::sphere(Vec3::new(5.0, 5.0, 5.0), 0.5),
        ]
    }

    // ── Sphere–sphere ───────────────────────────────────────────────────────

    #[test]
    fn spheres_overlapping_report_depth() {
        let a = Shape::sphere(Vec3::ZERO, 1.0);
        let b = Shape::sphere(Vec3::new(1.5, 0.0, 0.0), 1.0);
        assert_eq!(
            test(&a, &b),
            CollisionResult::Collision {
                penetration_depth: 0.5
            }
        );
    }

    #[test]
    fn spheres_apart_do_not_collide() {
        let a = Shape::sphere(Vec3::ZERO, 1.0);
        let b = Shape::sphere(Vec3::new(3.0, 0.0, 0.0), 1.0);
        assert_eq!(test(&a, &b), CollisionResult::NoCollision);
    }

    #[test]
    fn spheres_exactly_touching_do_not_collide() {
        let a = Shape::sphere(Vec3::ZERO, 1.0);
        let b = Shape::sphere(Vec3::new(2.0, 0.0, 0.0), 1.0);
        assert_eq!(test(&a, &b), CollisionResult::NoCollision);
    }

    #[test]
    fn sphere_depth_matches_formula_across_distances() {
        for step in 0..40 {
            let d = step as f64 * 0.1 + 0.05;
            let a = Shape::sphere(Vec3::ZERO, 0.7);
            let b = Shape::sphere(Vec3::new(0.0, d, 0.0), 1.1);
            let result = test(&a, &b);
            if d < 1.8 {
                assert!((depth(result) - (1.8 - d)).abs() < 1e-12, "d = {d}");
            } else {
                assert_eq!(result, CollisionResult::NoCollision, "d = {d}");
            }
        }
    }

    // ── Capsules ────────────────────────────────────────────────────────────

    #[test]
    fn crossing_capsules_collide() {
        let a = Shape::capsule(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), 0.1);
        let b = Shape::capsule(Vec3::new(0.0, -1.0, 0.15), Vec3::new(0.0, 1.0, 0.15), 0.1);
        assert!((depth(test(&a, &b)) - 0.05).abs() < 1e-12);
    }

    #[test]
    fn short_crossing_capsules_collide() {
        // 1 mm segments crossing 0.1 mm apart with 0.2 mm radii.
        let a = Shape::capsule(Vec3::new(-0.0005, 0.0, 0.0), Vec3::new(0.0005, 0.0, 0.0), 0.0002);
        let b = Shape::capsule(
            Vec3::new(0.0, -0.0005, 0.0001),
            Vec3::new(0.0, 0.0005, 0.0001),
            0.0002,
        );
        assert!((depth(test(&a, &b)) - 0.0003).abs() < 1e-12);
    }

    #[test]
    fn capsule_result_scales_with_geometry() {
        for scale in [1e-4, 1e-2, 1.0, 1e3] {
            let a = Shape::capsule(Vec3::new(-scale, 0.0, 0.0), Vec3::new(scale, 0.0, 0.0), scale * 0.2);
            let b = Shape::capsule(
                Vec3::new(0.0, -scale, scale * 0.1),
                Vec3::new(0.0, scale, scale * 0.1),
                scale * 0.2,
            );
            let d = depth(test(&a, &b));
            assert!((d / scale - 0.3).abs() < 1e-9, "scale {scale}: depth {d}");
        }
    }

    #[test]
    fn parallel_capsules_apart() {
        let a = Shape::capsule(Vec3::ZERO, Vec3::X, 0.1);
        let b = Shape::capsule(Vec3::new(0.0, 0.5, 0.0), Vec3::new(1.0, 0.5, 0.0), 0.1);
        assert_eq!(test(&a, &b), CollisionResult::NoCollision);
    }

    #[test]
    fn parallel_capsules_overlapping() {
        let a = Shape::capsule(Vec3::ZERO, Vec3::X, 0.2);
        let b = Shape::capsule(Vec3::new(0.5, 0.3, 0.0), Vec3::new(1.5, 0.3, 0.0), 0.2);
        assert!((depth(test(&a, &b)) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn collinear_capsules_end_to_end() {
        let a = Shape::capsule(Vec3::ZERO, Vec3::X, 0.1);
        let b = Shape::capsule(Vec3::new(1.15, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0), 0.1);
        assert!((depth(test(&a, &b)) - 0.05).abs() < 1e-12);
    }

    #[test]
    fn degenerate_capsule_behaves_as_sphere() {
        let point_capsule = Shape::capsule(Vec3::ZERO, Vec3::ZERO, 1.0);
        let sphere = Shape::sphere(Vec3::ZERO, 1.0);
        let other = Shape::capsule(Vec3::new(0.5, -1.0, 0.0), Vec3::new(0.5, 1.0, 0.0), 0.25);
        let d1 = depth(test(&point_capsule, &other));
        let d2 = depth(test(&sphere, &other));
        assert!((d1 - d2).abs() < 1e-12);
        assert!((d1 - 0.75).abs() < 1e-12);
    }

    #[test]
    fn both_capsules_degenerate() {
        let a = Shape::capsule(Vec3::ZERO, Vec3::ZERO, 0.5);
        let b = Shape::capsule(Vec3::new(0.8, 0.0, 0.0), Vec3::new(0.8, 0.0, 0.0), 0.5);
        assert!((depth(test(&a, &b)) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn sphere_beyond_capsule_end_uses_clamped_point() {
        let c = Shape::capsule(Vec3::ZERO, Vec3::X, 0.1);
        let near_end = Shape::sphere(Vec3::new(1.3, 0.0, 0.0), 0.25);
        let past_end = Shape::sphere(Vec3::new(1.4, 0.0, 0.0), 0.25);
        assert!((depth(test(&c, &near_end)) - 0.05).abs() < 1e-12);
        assert_eq!(test(&c, &past_end), CollisionResult::NoCollision);
    }

    // ── Sphere–box ──────────────────────────────────────────────────────────

    #[test]
    fn sphere_against_box_face() {
        let b = unit_box(Vec3::ZERO);
        let s = Shape::sphere(Vec3::new(0.8, 0.0, 0.0), 0.5);
        assert!((depth(test(&b, &s)) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn sphere_near_rotated_box_corner() {
        // Box yawed 45°: its corner reaches sqrt(0.5) ≈ 0.7071 along X.
        let axes = Quaternion::from_axis_angle(Vec3::Z, FRAC_PI_4).basis();
        let b = Shape::obb(Vec3::ZERO, Vec3::splat(0.5), axes);
        let hit = Shape::sphere(Vec3::new(0.9, 0.0, 0.0), 0.2);
        let miss = Shape::sphere(Vec3::new(0.95, 0.0, 0.0), 0.2);
        assert!(test(&b, &hit).is_collision());
        assert_eq!(test(&b, &miss), CollisionResult::NoCollision);
    }

    #[test]
    fn sphere_centre_inside_box_has_full_radius_depth() {
        let b = unit_box(Vec3::ZERO);
        let s = Shape::sphere(Vec3::new(0.1, 0.1, 0.1), 0.3);
        assert!((depth(test(&s, &b)) - 0.3).abs() < 1e-12);
    }

    // ── Capsule–box ─────────────────────────────────────────────────────────

    #[test]
    fn capsule_through_box_collides() {
        let b = unit_box(Vec3::ZERO);
        let c = Shape::capsule(Vec3::new(-2.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0), 0.05);
        assert!((depth(test(&c, &b)) - 0.05).abs() < 1e-12);
    }

    #[test]
    fn capsule_above_box_misses() {
        let b = unit_box(Vec3::ZERO);
        let c = Shape::capsule(Vec3::new(-2.0, 0.0, 0.7), Vec3::new(2.0, 0.0, 0.7), 0.1);
        assert_eq!(test(&b, &c), CollisionResult::NoCollision);
    }

    #[test]
    fn capsule_box_sampling_can_miss_between_samples() {
        // A small box sits between two samples (t = 0.5 and t = 0.625 with 9
        // samples over [-4, 4] are x = 0 and x = 1).  Its nearest face is
        // 0.05 from the segment, but the samples are farther than the radius.
        let b = Shape::Box(Obb::axis_aligned(
            Vec3::new(0.5, 0.15, 0.0),
            Vec3::new(0.1, 0.1, 0.1),
        ));
        let c = Shape::capsule(Vec3::new(-4.0, 0.0, 0.0), Vec3::new(4.0, 0.0, 0.0), 0.1);
        assert_eq!(test(&c, &b), CollisionResult::NoCollision);

        let dense = Tolerances {
            capsule_box_samples: 81,
            ..Tolerances::default()
        };
        assert!(test_with(&c, &b, &dense).is_collision());
    }

    #[test]
    fn capsule_box_sample_count_below_two_uses_end_points() {
        let b = unit_box(Vec3::new(2.0, 0.0, 0.0));
        let c = Shape::capsule(Vec3::ZERO, Vec3::new(1.4, 0.0, 0.0), 0.2);
        let tol = Tolerances {
            capsule_box_samples: 0,
            ..Tolerances::default()
        };
        assert!((depth(test_with(&c, &b, &tol)) - 0.1).abs() < 1e-12);
    }

    // ── Box–box ─────────────────────────────────────────────────────────────

    #[test]
    fn unit_boxes_overlapping_on_x() {
        let a = unit_box(Vec3::ZERO);
        let b = unit_box(Vec3::new(0.9, 0.0, 0.0));
        assert!((depth(test(&a, &b)) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn unit_boxes_separated_on_x() {
        let a = unit_box(Vec3::ZERO);
        let b = unit_box(Vec3::new(1.1, 0.0, 0.0));
        assert_eq!(test(&a, &b), CollisionResult::NoCollision);
    }

    #[test]
    fn touching_boxes_collide_with_zero_depth() {
        let a = unit_box(Vec3::ZERO);
        let b = unit_box(Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(
            test(&a, &b),
            CollisionResult::Collision {
                penetration_depth: 0.0
            }
        );
    }

    #[test]
    fn depth_is_minimum_overlap_across_axes() {
        // Overlap 0.8 on X but only 0.3 on Y.
        let a = unit_box(Vec3::ZERO);
        let b = unit_box(Vec3::new(0.2, 0.7, 0.0));
        assert!((depth(test(&a, &b)) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn rotated_box_separated_only_by_edge_axis() {
        // Two cubes tipped 45° about different axes: every face axis overlaps,
        // only the edge-edge axis along world Z separates them.
        let a_axes = Quaternion::from_axis_angle(Vec3::Y, FRAC_PI_4).basis();
        let b_axes = Quaternion::from_axis_angle(Vec3::X, FRAC_PI_4).basis();
        let a = Shape::obb(Vec3::ZERO, Vec3::new(0.5, 0.5, 0.5), a_axes);
        let b = Shape::obb(Vec3::new(0.0, 0.0, 1.45), Vec3::new(0.5, 0.5, 0.5), b_axes);
        assert_eq!(test(&a, &b), CollisionResult::NoCollision);

        let closer = Shape::obb(Vec3::new(0.0, 0.0, 1.3), Vec3::new(0.5, 0.5, 0.5), b_axes);
        assert!(test(&a, &closer).is_collision());
    }

    #[test]
    fn identical_boxes_skip_parallel_cross_axes() {
        let a = unit_box(Vec3::ZERO);
        assert!((depth(test(&a, &a)) - 1.0).abs() < 1e-12);
    }

    // ── Properties ──────────────────────────────────────────────────────────

    #[test]
    fn every_pair_is_symmetric() {
        let shapes = zoo();
        for a in &shapes {
            for b in &shapes {
                assert_eq!(test(a, b), test(b, a), "{a:?} vs {b:?}");
                for margin in [0.05, 0.5] {
                    assert_eq!(
                        test_with_margin(a, b, margin),
                        test_with_margin(b, a, margin)
                    );
                }
            }
        }
    }

    #[test]
    fn penetration_depth_is_never_negative() {
        let shapes = zoo();
        for a in &shapes {
            for b in &shapes {
                if let Some(d) = test(a, b).penetration_depth() {
                    assert!(d >= 0.0, "{a:?} vs {b:?} gave {d}");
                }
            }
        }
    }

    #[test]
    fn margin_never_clears_an_existing_collision() {
        let shapes = zoo();
        for a in &shapes {
            for b in &shapes {
                if test(a, b).is_collision() {
                    for margin in [0.001, 0.1, 2.0] {
                        assert!(test_with_margin(a, b, margin).is_collision());
                    }
                }
            }
        }
    }

    #[test]
    fn large_margin_makes_every_pair_collide() {
        let shapes = zoo();
        for a in &shapes {
            for b in &shapes {
                assert!(test_with_margin(a, b, 20.0).is_collision(), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn non_positive_margin_is_noop() {
        let shapes = zoo();
        for a in &shapes {
            for b in &shapes {
                assert_eq!(test_with_margin(a, b, 0.0), test(a, b));
                assert_eq!(test_with_margin(a, b, -1.0), test(a, b));
            }
        }
    }

    #[test]
    fn tolerances_deserialize_with_defaults() {
        let tol: Tolerances = toml::from_str("capsule_box_samples = 17").unwrap();
        assert_eq!(tol.capsule_box_samples, 17);
        assert_eq!(tol.degeneracy_epsilon, DEGENERACY_EPSILON);
    }
}
