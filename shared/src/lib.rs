use rand::Rng;
use serde::{Deserialize, Serialize};

pub mod protocol;

pub const DEFAULT_PORT: u16 = 7777;
pub const CLIENT_TICK_MS: u64 = 16;
pub const POSITION_SEND_HZ: f32 = 15.0;
pub const SERVER_TICK_HZ: u32 = 20;

pub const WORLD_WIDTH: f32 = 800.0;
pub const WORLD_HEIGHT: f32 = 600.0;
pub const SPAWN_POINT: Vec2 = Vec2 { x: 100.0, y: 100.0 };

pub const PLAYER_SPEED: f32 = 160.0;
pub const PLAYER_RADIUS: f32 = 14.0;
pub const PLAYER_MAX_HEALTH: i32 = 100;

pub const ENEMY_SPEED: f32 = 100.0;
pub const ENEMY_HP: i32 = 50;
pub const ENEMY_RADIUS: f32 = 14.0;
pub const ENEMY_SPAWN_INTERVAL_SECS: f32 = 3.0;

pub const BULLET_SPEED: f32 = 420.0;
pub const BULLET_LIFETIME_MS: f32 = 1200.0;
pub const BULLET_RADIUS: f32 = 4.0;
pub const BULLET_DAMAGE: i32 = 10;

pub const CONTACT_DAMAGE: i32 = 10;
pub const INVULNERABILITY_SECS: f32 = 1.0;
pub const HIT_FLASH_SECS: f32 = 0.15;
pub const SPAWN_PROTECTION_SECS: f32 = 2.0;
pub const KNOCKBACK_SPEED: f32 = 260.0;
pub const KNOCKBACK_DECAY: f32 = 8.0;

/// A point or direction in arena space. Positive y points down.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Returns the unit vector, or zero for a zero-length input.
    pub fn normalize(&self) -> Vec2 {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vec2::ZERO
        } else {
            Vec2 {
                x: self.x / mag,
                y: self.y / mag,
            }
        }
    }

    pub fn scale(&self, scalar: f32) -> Vec2 {
        Vec2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    pub fn add(&self, other: &Vec2) -> Vec2 {
        Vec2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    pub fn sub(&self, other: &Vec2) -> Vec2 {
        Vec2 {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    pub fn distance_squared(&self, other: &Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    pub fn clamp_to_arena(&self, width: f32, height: f32) -> Vec2 {
        Vec2 {
            x: self.x.clamp(0.0, width),
            y: self.y.clamp(0.0, height),
        }
    }
}

/// A hostile entity. The server roster, the client mirror and the offline
/// fallback roster all hold this same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enemy {
    pub id: u32,
    pub position: Vec2,
    pub hp: i32,
}

impl Enemy {
    pub fn new(id: u32, position: Vec2) -> Self {
        Self {
            id,
            position,
            hp: ENEMY_HP,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.hp <= 0
    }

    /// Steps towards `target` at `speed` units per second without overshooting.
    pub fn advance_toward(&mut self, target: Vec2, speed: f32, dt: f32) {
        let delta = target.sub(&self.position);
        let distance = delta.magnitude();
        if distance < 0.001 {
            return;
        }

        let step = speed * dt;
        if step >= distance {
            self.position = target;
        } else {
            self.position = self.position.add(&delta.normalize().scale(step));
        }
    }
}

pub fn circles_overlap(a: Vec2, radius_a: f32, b: Vec2, radius_b: f32) -> bool {
    let reach = radius_a + radius_b;
    a.distance_squared(&b) < reach * reach
}

/// Euclidean-nearest candidate to `from`, `None` when there are no candidates.
pub fn nearest_position<I>(candidates: I, from: Vec2) -> Option<Vec2>
where
    I: IntoIterator<Item = Vec2>,
{
    candidates.into_iter().min_by(|a, b| {
        from.distance_squared(a)
            .partial_cmp(&from.distance_squared(b))
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}

/// Picks one of the four arena edges uniformly, then a uniform point along it.
pub fn random_edge_point<R: Rng + ?Sized>(rng: &mut R, width: f32, height: f32) -> Vec2 {
    match rng.gen_range(0..4) {
        0 => Vec2::new(0.0, rng.gen_range(0.0..=height)),
        1 => Vec2::new(width, rng.gen_range(0.0..=height)),
        2 => Vec2::new(rng.gen_range(0.0..=width), 0.0),
        _ => Vec2::new(rng.gen_range(0.0..=width), height),
    }
}
