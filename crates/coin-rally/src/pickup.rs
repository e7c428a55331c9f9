//! Coin pickups.
//!
//! Coins live in an arena addressed by their stable id. Collection happens
//! either by proximity to the vehicle or through a sensor contact reported by
//! the physics world; both paths go through [`PickupField::collect`], which
//! fires at most once per coin for the whole session.

use std::collections::HashMap;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, require_non_negative, require_positive};
use crate::physics::{BodyHandle, PhysicsWorld, Pose, RigidBody, Shape, TriggerContact};

/// Distances within this of the threshold count as on the boundary, which is
/// not a hit. Keeps `0.5 - 0.4` from landing just under `0.1`.
const DISTANCE_EPSILON: f32 = 1e-5;

/// Emitted once when a coin is collected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CoinCollected {
    /// Id of the collected coin.
    pub coin_id: u32,
}

/// Where a coin starts.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoinSpec {
    pub id: u32,
    pub position: Vec3,
    pub radius: f32,
}

/// Pickup tunables and the level's coin layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickupConfig {
    /// A coin closer than this to the vehicle is collected.
    pub collision_threshold: f32,
    /// Coins placed at level start.
    pub coins: Vec<CoinSpec>,
}

impl Default for PickupConfig {
    fn default() -> Self {
        Self {
            collision_threshold: 0.1,
            coins: reference_layout(),
        }
    }
}

impl PickupConfig {
    pub fn validate(&self) -> Result<()> {
        require_non_negative("pickups.collision_threshold", self.collision_threshold)?;
        for coin in &self.coins {
            require_positive("pickups.coins.radius", coin.radius)?;
            if !coin.position.is_finite() {
                return Err(Error::config("pickups.coins.position", "must be finite"));
            }
        }
        Ok(())
    }
}

/// Ten coins in a line along -x, just above the ground.
fn reference_layout() -> Vec<CoinSpec> {
    const IDS: [u32; 10] = [10, 1, 2, 3, 4, 5, 6, 7, 8, 9];
    IDS.iter()
        .zip(1u8..)
        .map(|(&id, step)| CoinSpec {
            id,
            position: Vec3::new(-0.5 * f32::from(step), 0.05, 0.0),
            radius: 0.05,
        })
        .collect()
}

/// One coin record.
#[derive(Clone, Debug, PartialEq)]
pub struct Coin {
    /// Stable id.
    pub id: u32,
    /// Position at level start. The physics body moves away once collected.
    pub position: Vec3,
    /// Sphere radius.
    pub radius: f32,
    /// Still takes part in collision tests and rendering.
    pub active: bool,
    /// One-way latch set by collection.
    pub collected: bool,
    /// Sensor body in the physics world.
    pub body: BodyHandle,
}

/// All coins of a level plus the subscribers to their collection events.
pub struct PickupField {
    coins: Vec<Coin>,
    by_id: HashMap<u32, usize>,
    by_body: HashMap<BodyHandle, u32>,
    collision_threshold: f32,
    subscribers: Vec<async_channel::Sender<CoinCollected>>,
}

impl PickupField {
    /// Insert a sensor body per coin into `world`.
    ///
    /// Fails on duplicate ids before touching the world.
    pub fn new(world: &mut PhysicsWorld, config: &PickupConfig) -> Result<Self> {
        config.validate()?;

        let mut by_id = HashMap::with_capacity(config.coins.len());
        for (index, spec) in config.coins.iter().enumerate() {
            if by_id.insert(spec.id, index).is_some() {
                return Err(Error::DuplicateCoinId { id: spec.id });
            }
        }

        let mut by_body = HashMap::with_capacity(config.coins.len());
        let coins = config
            .coins
            .iter()
            .map(|spec| {
                let body = world.insert(
                    RigidBody::kinematic(
                        Shape::Sphere {
                            radius: spec.radius,
                        },
                        spec.position,
                    )
                    .with_sensor(true),
                );
                by_body.insert(body, spec.id);
                Coin {
                    id: spec.id,
                    position: spec.position,
                    radius: spec.radius,
                    active: true,
                    collected: false,
                    body,
                }
            })
            .collect::<Vec<_>>();

        tracing::info!(
            "Placed {} coins, collision threshold {}",
            coins.len(),
            config.collision_threshold
        );

        Ok(Self {
            coins,
            by_id,
            by_body,
            collision_threshold: config.collision_threshold,
            subscribers: Vec::new(),
        })
    }

    /// Receive a [`CoinCollected`] for every future collection.
    pub fn subscribe(&mut self) -> async_channel::Receiver<CoinCollected> {
        let (sender, receiver) = async_channel::unbounded();
        self.subscribers.push(sender);
        receiver
    }

    /// Collect every active coin within the threshold of `vehicle_position`.
    ///
    /// Returns the number of coins collected by this call.
    pub fn tick(&mut self, world: &mut PhysicsWorld, vehicle_position: Vec3) -> usize {
        if !vehicle_position.is_finite() {
            return 0;
        }
        let threshold = self.collision_threshold - DISTANCE_EPSILON;
        let hits: Vec<u32> = self
            .coins
            .iter()
            .filter(|coin| coin.active && !coin.collected)
            .filter(|coin| coin.position.distance(vehicle_position) < threshold)
            .map(|coin| coin.id)
            .collect();

        hits.into_iter().filter(|&id| self.collect(world, id)).count()
    }

    /// Collect coins whose sensors touched `vehicle_body` during the last step.
    ///
    /// Returns the number of coins collected by this call.
    pub fn handle_contacts(
        &mut self,
        world: &mut PhysicsWorld,
        contacts: &[TriggerContact],
        vehicle_body: BodyHandle,
    ) -> usize {
        contacts
            .iter()
            .filter(|contact| contact.other == vehicle_body)
            .filter_map(|contact| self.by_body.get(&contact.sensor).copied())
            .collect::<Vec<_>>()
            .into_iter()
            .filter(|&id| self.collect(world, id))
            .count()
    }

    /// Collect coin `id`.
    ///
    /// Returns `true` only for the call that actually collected it; unknown ids
    /// and repeat calls are silent no-ops.
    pub fn collect(&mut self, world: &mut PhysicsWorld, id: u32) -> bool {
        let Some(&index) = self.by_id.get(&id) else {
            return false;
        };
        let coin = &mut self.coins[index];
        if coin.collected {
            tracing::debug!("Coin {id} already collected");
            return false;
        }
        coin.collected = true;
        coin.active = false;

        if let Some(body) = world.body_mut(coin.body) {
            body.make_kinematic_at(Vec3::ZERO);
            body.set_enabled(false);
        }

        tracing::info!("Collected coin {id}");
        let event = CoinCollected { coin_id: id };
        self.subscribers
            .retain(|subscriber| subscriber.try_send(event).is_ok());
        true
    }

    pub fn coin(&self, id: u32) -> Option<&Coin> {
        self.by_id.get(&id).map(|&index| &self.coins[index])
    }

    pub fn coins(&self) -> &[Coin] {
        &self.coins
    }

    pub fn is_collected(&self, id: u32) -> bool {
        self.coin(id).is_some_and(|coin| coin.collected)
    }

    /// Coins still in play.
    pub fn active_coins(&self) -> impl Iterator<Item = &Coin> {
        self.coins.iter().filter(|coin| coin.active)
    }

    /// Number of coins collected so far.
    pub fn collected_count(&self) -> usize {
        self.coins.iter().filter(|coin| coin.collected).count()
    }

    /// Render poses of the active coins, paired with their ids.
    pub fn active_poses(&self) -> Vec<(u32, Pose)> {
        self.active_coins()
            .map(|coin| {
                (
                    coin.id,
                    Pose {
                        position: coin.position,
                        orientation: Quat::IDENTITY,
                    },
                )
            })
            .collect()
    }

    pub fn collision_threshold(&self) -> f32 {
        self.collision_threshold
    }
}
