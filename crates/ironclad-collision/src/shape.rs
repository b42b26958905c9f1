//! World-space collision primitives and their body-frame counterparts.
//!
//! The engine only ever sees [`Shape`], which is already positioned and
//! oriented in the world frame.  [`LocalShape::to_world`] performs that
//! placement for a body at a given [`Pose`].

use serde::{Deserialize, Serialize};

use crate::math::{Pose, Vec3};

/// A sphere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    pub centre: Vec3,
    pub radius: f64,
}

/// A line segment `a`–`b` swept by `radius`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Capsule {
    pub a: Vec3,
    pub b: Vec3,
    pub radius: f64,
}

/// An oriented bounding box.
///
/// `axes` must be an orthonormal basis.  The engine does not check this.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obb {
    pub centre: Vec3,
    pub half_extents: Vec3,
    #[serde(default = "world_axes")]
    pub axes: [Vec3; 3],
}

fn world_axes() -> [Vec3; 3] {
    [Vec3::X, Vec3::Y, Vec3::Z]
}

impl Sphere {
    pub fn new(centre: Vec3, radius: f64) -> Self {
        Self { centre, radius }
    }

    pub(crate) fn key(&self) -> [f64; 4] {
        let [x, y, z] = self.centre.to_array();
        [x, y, z, self.radius]
    }
}

impl Capsule {
    pub fn new(a: Vec3, b: Vec3, radius: f64) -> Self {
        Self { a, b, radius }
    }

    pub(crate) fn key(&self) -> [f64; 7] {
        let [ax, ay, az] = self.a.to_array();
        let [bx, by, bz] = self.b.to_array();
        [ax, ay, az, bx, by, bz, self.radius]
    }
}

impl Obb {
    pub fn new(centre: Vec3, half_extents: Vec3, axes: [Vec3; 3]) -> Self {
        Self {
            centre,
            half_extents,
            axes,
        }
    }

    /// A box aligned with the world axes.
    pub fn axis_aligned(centre: Vec3, half_extents: Vec3) -> Self {
        Self::new(centre, half_extents, world_axes())
    }

    pub(crate) fn half_extent(&self, i: usize) -> f64 {
        self.half_extents.to_array()[i]
    }

    pub(crate) fn key(&self) -> [f64; 15] {
        let mut key = [0.0; 15];
        let vectors = [
            self.centre,
            self.half_extents,
            self.axes[0],
            self.axes[1],
            self.axes[2],
        ];
        for (chunk, v) in key.chunks_exact_mut(3).zip(vectors) {
            chunk.copy_from_slice(&v.to_array());
        }
        key
    }
}

/// The discriminant of a [`Shape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Sphere,
    Capsule,
    Box,
}

/// A world-space collision primitive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Shape {
    Sphere(Sphere),
    Capsule(Capsule),
    Box(Obb),
}

impl Shape {
    pub fn sphere(centre: Vec3, radius: f64) -> Self {
        Shape::Sphere(Sphere::new(centre, radius))
    }

    pub fn capsule(a: Vec3, b: Vec3, radius: f64) -> Self {
        Shape::Capsule(Capsule::new(a, b, radius))
    }

    pub fn obb(centre: Vec3, half_extents: Vec3, axes: [Vec3; 3]) -> Self {
        Shape::Box(Obb::new(centre, half_extents, axes))
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Sphere(_) => ShapeKind::Sphere,
            Shape::Capsule(_) => ShapeKind::Capsule,
            Shape::Box(_) => ShapeKind::Box,
        }
    }

    /// Grow the shape by `margin` on every side: radius for spheres and
    /// capsules, each half-extent for boxes.
    pub fn inflate(&self, margin: f64) -> Self {
        match *self {
            Shape::Sphere(s) => Shape::Sphere(Sphere {
                radius: s.radius + margin,
                ..s
            }),
            Shape::Capsule(c) => Shape::Capsule(Capsule {
                radius: c.radius + margin,
                ..c
            }),
            Shape::Box(o) => Shape::Box(Obb {
                half_extents: o.half_extents + Vec3::splat(margin),
                ..o
            }),
        }
    }
}

/// A primitive described in its body's own frame, centred on the body origin.
///
/// Capsules and cylinders run along the local Z axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LocalShape {
    Sphere { radius: f64 },
    Capsule { half_length: f64, radius: f64 },
    /// Tested as the capsule with the same axis and radius, which fully
    /// contains the cylinder.
    Cylinder { half_length: f64, radius: f64 },
    Box { half_extents: Vec3 },
}

impl LocalShape {
    /// Place this shape at `pose` in the world frame.  The pose's rotation
    /// is normalised first, so hand-written quaternions need not be unit.
    pub fn to_world(&self, pose: &Pose) -> Shape {
        let pose = Pose::new(pose.translation, pose.rotation.normalized());
        match *self {
            LocalShape::Sphere { radius } => Shape::sphere(pose.translation, radius),
            LocalShape::Capsule {
                half_length,
                radius,
            }
            | LocalShape::Cylinder {
                half_length,
                radius,
            } => {
                let offset = Vec3::Z * half_length;
                Shape::capsule(
                    pose.transform_point(-offset),
                    pose.transform_point(offset),
                    radius,
                )
            }
            LocalShape::Box { half_extents } => {
                Shape::obb(pose.translation, half_extents, pose.rotation.basis())
            }
        }
    }
}
