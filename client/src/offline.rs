//! Self-contained fallback simulation used while no server is reachable
//!
//! Owns its own roster, id counter and spawn clock. Nothing here is ever sent
//! to or merged with the server-mirrored roster.

use crate::game::Bullet;
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    circles_overlap, random_edge_point, Enemy, Vec2, BULLET_DAMAGE, BULLET_RADIUS, ENEMY_RADIUS,
    ENEMY_SPAWN_INTERVAL_SECS, ENEMY_SPEED, WORLD_HEIGHT, WORLD_WIDTH,
};
use std::collections::BTreeMap;

pub struct OfflineSimulation {
    enemies: BTreeMap<u32, Enemy>,
    next_enemy_id: u32,
    spawn_timer: f32,
    rng: StdRng,
}

impl OfflineSimulation {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            enemies: BTreeMap::new(),
            next_enemy_id: 1,
            spawn_timer: 0.0,
            rng,
        }
    }

    /// Spawns on the spawn clock, then steers every enemy toward `target`.
    pub fn step(&mut self, dt: f32, target: Vec2) {
        self.spawn_timer += dt;
        while self.spawn_timer >= ENEMY_SPAWN_INTERVAL_SECS {
            self.spawn_timer -= ENEMY_SPAWN_INTERVAL_SECS;
            let position = random_edge_point(&mut self.rng, WORLD_WIDTH, WORLD_HEIGHT);
            self.spawn_at(position);
        }

        for enemy in self.enemies.values_mut() {
            enemy.advance_toward(target, ENEMY_SPEED, dt);
        }
    }

    pub fn spawn_at(&mut self, position: Vec2) -> u32 {
        let id = self.next_enemy_id;
        self.next_enemy_id += 1;
        self.enemies.insert(id, Enemy::new(id, position));
        debug!("Offline enemy {} spawned at ({:.0}, {:.0})", id, position.x, position.y);
        id
    }

    /// Applies bullet damage directly. Each bullet is consumed by the first
    /// enemy it overlaps; enemies at hp <= 0 are removed at once.
    ///
    /// Returns the number of enemies killed.
    pub fn resolve_bullets(&mut self, bullets: &mut Vec<Bullet>) -> usize {
        let mut killed = 0;
        let enemies = &mut self.enemies;

        bullets.retain(|bullet| {
            let struck = enemies
                .values()
                .find(|e| circles_overlap(bullet.position, BULLET_RADIUS, e.position, ENEMY_RADIUS))
                .map(|e| e.id);

            let Some(enemy_id) = struck else {
                return true;
            };

            if let Some(enemy) = enemies.get_mut(&enemy_id) {
                enemy.hp -= BULLET_DAMAGE;
                if enemy.is_dead() {
                    enemies.remove(&enemy_id);
                    killed += 1;
                }
            }
            false
        });

        killed
    }

    pub fn enemies(&self) -> &BTreeMap<u32, Enemy> {
        &self.enemies
    }

    pub fn len(&self) -> usize {
        self.enemies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enemies.is_empty()
    }
}

impl Default for OfflineSimulation {
    fn default() -> Self {
        Self::new()
    }
}
