//! Minimal rigid-body physics: just enough for a raycast vehicle on a flat
//! ground plane and sphere-shaped pickup triggers.

mod body;
mod world;

pub use body::{Aabb, BodyHandle, BodyKind, Pose, RigidBody, Shape};
pub use world::{Broadphase, PhysicsWorld, RayHit, TriggerContact, WorldConfig};
