//! `ironclad-collision` – Geometry collision engine.
//!
//! Pure, stateless pairwise tests between world-space primitives.  Nothing in
//! this crate knows about robots, components or errors; upstream detectors
//! wrap [`CollisionResult`]s into safety errors.
//!
//! # Modules
//!
//! - [`math`] – [`Vec3`], [`Quaternion`][math::Quaternion] and
//!   [`Pose`][math::Pose].
//! - [`shape`] – world-space [`Shape`]s (sphere, capsule, oriented box) and
//!   body-frame [`LocalShape`]s placed by a pose.
//! - [`engine`] – [`test`] and [`test_with_margin`], dispatching on the
//!   unordered pair of shape kinds.

pub mod engine;
pub mod math;
pub mod shape;

pub use engine::{
    CAPSULE_BOX_SAMPLES, CollisionResult, DEGENERACY_EPSILON, Tolerances, test, test_with,
    test_with_margin, test_with_margin_and,
};
pub use math::{Pose, Quaternion, Vec3};
pub use shape::{Capsule, LocalShape, Obb, Shape, ShapeKind, Sphere};
