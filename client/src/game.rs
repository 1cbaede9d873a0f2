use serde::{Deserialize, Serialize};
use shared::{
    Vec2, BULLET_LIFETIME_MS, CONTACT_DAMAGE, HIT_FLASH_SECS, INVULNERABILITY_SECS,
    KNOCKBACK_DECAY, KNOCKBACK_SPEED, PLAYER_MAX_HEALTH, PLAYER_SPEED, SPAWN_POINT,
    SPAWN_PROTECTION_SECS, WORLD_HEIGHT, WORLD_WIDTH,
};

/// What the player wants to do this step
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Intent {
    /// Desired direction; any length, normalized before use
    pub movement: Vec2,
    pub shoot: bool,
}

impl Intent {
    pub fn new(movement: Vec2, shoot: bool) -> Self {
        Self { movement, shoot }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalPlayer {
    pub position: Vec2,
    /// Knockback velocity, decays every step
    pub velocity: Vec2,
    /// Unit direction of the last non-zero movement; bullets fly this way
    pub facing: Vec2,
    pub health: i32,
    pub invulnerable_for: f32,
    pub hit_flash_for: f32,
    pub alive: bool,
}

impl LocalPlayer {
    pub fn new() -> Self {
        Self {
            position: SPAWN_POINT,
            velocity: Vec2::ZERO,
            facing: Vec2::new(1.0, 0.0),
            health: PLAYER_MAX_HEALTH,
            invulnerable_for: 0.0,
            hit_flash_for: 0.0,
            alive: true,
        }
    }

    pub fn is_invulnerable(&self) -> bool {
        self.invulnerable_for > 0.0
    }

    pub fn is_flashing(&self) -> bool {
        self.hit_flash_for > 0.0
    }

    pub fn tick_timers(&mut self, dt: f32) {
        self.invulnerable_for = (self.invulnerable_for - dt).max(0.0);
        self.hit_flash_for = (self.hit_flash_for - dt).max(0.0);
    }

    /// Moves by walking intent plus any remaining knockback, then clamps to the arena.
    pub fn apply_movement(&mut self, direction: Vec2, dt: f32) {
        if !self.alive {
            return;
        }

        let direction = direction.normalize();
        if !direction.is_zero() {
            self.facing = direction;
        }

        let motion = direction.scale(PLAYER_SPEED).add(&self.velocity);
        self.position = self
            .position
            .add(&motion.scale(dt))
            .clamp_to_arena(WORLD_WIDTH, WORLD_HEIGHT);

        self.velocity = self.velocity.scale((1.0 - KNOCKBACK_DECAY * dt).max(0.0));
    }

    /// Applies contact damage from an enemy centred at `source`.
    ///
    /// Returns false when the hit was suppressed by death or invulnerability.
    pub fn take_contact(&mut self, source: Vec2) -> bool {
        if !self.alive || self.is_invulnerable() {
            return false;
        }

        self.health = (self.health - CONTACT_DAMAGE).max(0);

        let mut away = self.position.sub(&source).normalize();
        if away.is_zero() {
            away = Vec2::new(1.0, 0.0);
        }
        self.velocity = away.scale(KNOCKBACK_SPEED);
        self.invulnerable_for = INVULNERABILITY_SECS;
        self.hit_flash_for = HIT_FLASH_SECS;

        if self.health == 0 {
            self.alive = false;
            self.velocity = Vec2::ZERO;
        }
        true
    }

    pub fn respawn(&mut self) {
        self.health = PLAYER_MAX_HEALTH;
        self.position = SPAWN_POINT;
        self.velocity = Vec2::ZERO;
        self.invulnerable_for = SPAWN_PROTECTION_SECS;
        self.hit_flash_for = 0.0;
        self.alive = true;
    }
}

impl Default for LocalPlayer {
    fn default() -> Self {
        Self::new()
    }
}

/// A client-side projectile. Never authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bullet {
    pub position: Vec2,
    pub velocity: Vec2,
    pub remaining_ms: f32,
    /// Fired by this client. Only local bullets report hits.
    pub local: bool,
}

impl Bullet {
    pub fn local(position: Vec2, velocity: Vec2) -> Self {
        Self {
            position,
            velocity,
            remaining_ms: BULLET_LIFETIME_MS,
            local: true,
        }
    }

    pub fn remote(position: Vec2, velocity: Vec2) -> Self {
        Self {
            local: false,
            ..Self::local(position, velocity)
        }
    }

    /// Advances the bullet; returns false once it has expired or left the arena.
    pub fn update(&mut self, dt: f32) -> bool {
        self.position = self.position.add(&self.velocity.scale(dt));
        self.remaining_ms -= dt * 1000.0;

        self.remaining_ms > 0.0
            && (0.0..=WORLD_WIDTH).contains(&self.position.x)
            && (0.0..=WORLD_HEIGHT).contains(&self.position.y)
    }
}
