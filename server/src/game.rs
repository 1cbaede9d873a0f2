//! Authoritative enemy simulation
//!
//! The server owns the only real enemy roster. Two independent timers drive it:
//! a movement tick that steers every enemy toward its nearest player and
//! pushes the full roster state, and a spawn timer that adds a new enemy on a
//! random arena edge. Hit reports from clients are applied here as well.
//!
//! Every notification about an enemy is queued while the roster lock is held.
//! That keeps notifications for one enemy in roster order: nothing about an
//! enemy can be queued after its ENDEAD.

use crate::network::ServerState;
use crate::registry::SessionRegistry;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::protocol::Message;
use shared::{random_edge_point, Enemy, Vec2, ENEMY_SPEED};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Result of applying a hit report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// Unknown or already dead enemy, or a non-positive damage amount
    Ignored,
    Damaged { hp: i32 },
    Killed,
}

pub struct EnemySimulation {
    enemies: RwLock<BTreeMap<u32, Enemy>>,
    next_enemy_id: AtomicU32,
}

impl EnemySimulation {
    pub fn new() -> Self {
        Self {
            enemies: RwLock::new(BTreeMap::new()),
            next_enemy_id: AtomicU32::new(1),
        }
    }

    /// Stores a new enemy at `position` and announces it to every session
    pub async fn spawn_at(&self, registry: &SessionRegistry, position: Vec2) -> Enemy {
        let enemy_id = self.next_enemy_id.fetch_add(1, Ordering::SeqCst);
        let enemy = Enemy::new(enemy_id, position);

        let mut enemies = self.enemies.write().await;
        enemies.insert(enemy_id, enemy.clone());
        registry
            .broadcast(&Message::enemy_spawn(&enemy).encode(), None)
            .await;

        info!(
            "Spawned enemy {} at ({:.0}, {:.0})",
            enemy.id, enemy.position.x, enemy.position.y
        );
        enemy
    }

    pub async fn spawn_random<R: Rng + ?Sized>(
        &self,
        registry: &SessionRegistry,
        rng: &mut R,
        width: f32,
        height: f32,
    ) -> Enemy {
        let position = random_edge_point(rng, width, height);
        self.spawn_at(registry, position).await
    }

    /// Advances every enemy toward its nearest player and pushes full state
    ///
    /// With no known player positions the roster stays frozen, but its state
    /// is still pushed. Returns the number of enemies broadcast.
    pub async fn step(&self, registry: &SessionRegistry, dt: f32) -> usize {
        let movable = registry.has_positions().await;

        let mut enemies = self.enemies.write().await;
        if movable {
            for enemy in enemies.values_mut() {
                if let Some(target) = registry
                    .nearest_to(enemy.position.x, enemy.position.y)
                    .await
                {
                    enemy.advance_toward(target, ENEMY_SPEED, dt);
                }
            }
        }

        for enemy in enemies.values() {
            registry
                .broadcast(&Message::enemy_pos(enemy).encode(), None)
                .await;
        }

        enemies.len()
    }

    /// Applies damage from a hit report
    ///
    /// Decrement and removal happen under one write lock, so concurrent
    /// reports against the same enemy produce exactly one kill.
    pub async fn apply_hit(
        &self,
        registry: &SessionRegistry,
        enemy_id: u32,
        damage: i32,
    ) -> HitOutcome {
        if damage <= 0 {
            return HitOutcome::Ignored;
        }

        let mut enemies = self.enemies.write().await;
        let hp = match enemies.get_mut(&enemy_id) {
            Some(enemy) => {
                enemy.hp = enemy.hp.saturating_sub(damage);
                enemy.hp
            }
            None => return HitOutcome::Ignored,
        };

        if hp <= 0 {
            enemies.remove(&enemy_id);
            registry
                .broadcast(&Message::EnemyDead { enemy_id }.encode(), None)
                .await;
            info!("Enemy {} destroyed", enemy_id);
            HitOutcome::Killed
        } else {
            registry
                .broadcast(&Message::EnemyHp { enemy_id, hp }.encode(), None)
                .await;
            HitOutcome::Damaged { hp }
        }
    }

    /// Sends the whole live roster to one session as ENSPAWN lines
    pub async fn send_roster(&self, registry: &SessionRegistry, session_id: u32) -> usize {
        let enemies = self.enemies.read().await;
        let mut sent = 0;
        for enemy in enemies.values() {
            if registry
                .send_to(session_id, &Message::enemy_spawn(enemy).encode())
                .await
            {
                sent += 1;
            }
        }
        sent
    }

    pub async fn snapshot(&self) -> Vec<Enemy> {
        self.enemies.read().await.values().cloned().collect()
    }

    pub async fn get(&self, enemy_id: u32) -> Option<Enemy> {
        self.enemies.read().await.get(&enemy_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.enemies.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.enemies.read().await.is_empty()
    }
}

impl Default for EnemySimulation {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-rate movement scheduler, independent of any connection
pub async fn run_movement_loop(state: Arc<ServerState>) {
    let mut interval_timer = interval(state.config.tick_duration());
    interval_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Skip the first tick since it fires immediately
    interval_timer.tick().await;

    let mut last_update = Instant::now();
    let mut tick: u64 = 0;

    loop {
        interval_timer.tick().await;

        let now = Instant::now();
        let mut delta_time = (now - last_update).as_secs_f32();
        last_update = now;

        if delta_time > state.config.max_delta {
            warn!(
                "Large delta time detected ({:.3}s), capping to {:.3}s",
                delta_time, state.config.max_delta
            );
            delta_time = state.config.max_delta;
        }

        let stepped = state.enemies.step(&state.registry, delta_time).await;

        tick += 1;
        if tick % 100 == 0 {
            debug!(
                "Tick {}: {} sessions, {} enemies pushed",
                tick,
                state.registry.len().await,
                stepped
            );
        }
    }
}

/// Spawn scheduler, independent of the movement tick
pub async fn run_spawn_loop(state: Arc<ServerState>) {
    let mut rng = StdRng::from_entropy();
    let mut spawn_timer = interval(state.config.spawn_period());
    spawn_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    spawn_timer.tick().await;

    loop {
        spawn_timer.tick().await;
        state
            .enemies
            .spawn_random(
                &state.registry,
                &mut rng,
                state.config.world_width,
                state.config.world_height,
            )
            .await;
    }
}
