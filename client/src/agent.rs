use crate::game::{Bullet, Intent, LocalPlayer};
use crate::network::{ClientError, NetworkLink};
use crate::offline::OfflineSimulation;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use shared::protocol::{from_wire, Message};
use shared::{
    circles_overlap, Enemy, Vec2, BULLET_DAMAGE, BULLET_RADIUS, BULLET_SPEED, ENEMY_RADIUS,
    PLAYER_RADIUS, POSITION_SEND_HZ,
};
use std::collections::BTreeMap;

/// Everything a presentation layer needs to draw one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub local_player: LocalPlayer,
    pub ghosts: BTreeMap<u32, Vec2>,
    /// The roster currently in effect: the server mirror online, the fallback offline
    pub enemies: Vec<Enemy>,
    pub bullets: Vec<Bullet>,
    pub connected: bool,
    pub session_id: Option<u32>,
}

/// Client-side synchronization agent
///
/// Runs the local player every step and chooses, per step, between mirroring
/// the server (while a link is up) and the offline fallback simulation. The
/// two enemy rosters are kept in separate fields and never touch.
pub struct SyncAgent {
    display_name: Option<String>,
    link: Option<NetworkLink>,

    player: LocalPlayer,
    bullets: Vec<Bullet>,

    ghosts: BTreeMap<u32, Vec2>,
    enemies: BTreeMap<u32, Enemy>,
    position_send_timer: f32,

    offline: OfflineSimulation,
}

impl SyncAgent {
    pub fn new() -> Self {
        Self::with_display_name(None)
    }

    pub fn with_display_name(display_name: Option<String>) -> Self {
        Self::with_offline(display_name, OfflineSimulation::new())
    }

    pub fn with_offline(display_name: Option<String>, offline: OfflineSimulation) -> Self {
        Self {
            display_name,
            link: None,
            player: LocalPlayer::new(),
            bullets: Vec::new(),
            ghosts: BTreeMap::new(),
            enemies: BTreeMap::new(),
            position_send_timer: 0.0,
            offline,
        }
    }

    /// Connects to a server and switches to online play.
    ///
    /// On failure the agent keeps whatever mode it was in; a fresh agent simply
    /// stays offline.
    pub async fn join_as_client(&mut self, host: &str, port: u16) -> Result<u32, ClientError> {
        let addr = format!("{}:{}", host, port);
        match NetworkLink::connect(&addr, self.display_name.as_deref()).await {
            Ok(link) => {
                let session_id = link.session_id();
                self.attach(link);
                Ok(session_id)
            }
            Err(e) => {
                warn!("Could not join {}: {}", addr, e);
                Err(e)
            }
        }
    }

    fn attach(&mut self, link: NetworkLink) {
        self.ghosts.clear();
        self.enemies.clear();
        // Report our position on the first online step
        self.position_send_timer = 1.0 / POSITION_SEND_HZ;
        self.link = Some(link);
    }

    pub fn is_connected(&self) -> bool {
        self.link.as_ref().map_or(false, NetworkLink::is_connected)
    }

    pub fn session_id(&self) -> Option<u32> {
        self.link.as_ref().map(NetworkLink::session_id)
    }

    pub fn player(&self) -> &LocalPlayer {
        &self.player
    }

    /// Advances the local simulation by `dt` seconds.
    pub fn step(&mut self, dt: f32, intent: Intent) {
        self.apply_inbound();
        self.check_link();

        self.player.tick_timers(dt);
        if self.player.alive {
            self.player.apply_movement(intent.movement, dt);
            if intent.shoot {
                self.fire();
            }
        }

        self.bullets.retain_mut(|bullet| bullet.update(dt));

        if self.link.is_some() {
            self.step_online(dt);
        } else {
            self.offline.step(dt, self.player.position);
            self.offline.resolve_bullets(&mut self.bullets);
        }

        self.apply_contact_damage();
    }

    /// Restores the local player. The enemy roster is left as it is.
    pub fn respawn(&mut self) {
        info!("Respawning");
        self.player.respawn();
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            local_player: self.player.clone(),
            ghosts: self.ghosts.clone(),
            enemies: self.active_enemies().values().cloned().collect(),
            bullets: self.bullets.clone(),
            connected: self.is_connected(),
            session_id: self.session_id(),
        }
    }

    fn active_enemies(&self) -> &BTreeMap<u32, Enemy> {
        if self.link.is_some() {
            &self.enemies
        } else {
            self.offline.enemies()
        }
    }

    fn apply_inbound(&mut self) {
        let messages = match self.link.as_mut() {
            Some(link) => link.drain(),
            None => return,
        };

        for message in messages {
            self.apply_message(message);
        }
    }

    fn apply_message(&mut self, message: Message) {
        let own_id = self.session_id();

        match message {
            Message::Pos { session_id, x, y } => {
                if Some(session_id) != own_id {
                    self.ghosts.insert(session_id, from_wire(x, y));
                }
            }
            Message::Shot {
                session_id,
                x,
                y,
                vx,
                vy,
            } => {
                if Some(session_id) != own_id {
                    self.bullets
                        .push(Bullet::remote(from_wire(x, y), from_wire(vx, vy)));
                }
            }
            Message::EnemySpawn { enemy_id, x, y, hp }
            | Message::EnemyPos { enemy_id, x, y, hp } => {
                self.enemies.insert(
                    enemy_id,
                    Enemy {
                        id: enemy_id,
                        position: from_wire(x, y),
                        hp,
                    },
                );
            }
            Message::EnemyHp { enemy_id, hp } => {
                if let Some(enemy) = self.enemies.get_mut(&enemy_id) {
                    enemy.hp = hp;
                }
            }
            Message::EnemyDead { enemy_id } => {
                self.enemies.remove(&enemy_id);
            }
            Message::Joined { session_id } => {
                info!("Player {} joined", session_id);
            }
            Message::Leave { session_id } => {
                info!("Player {} left", session_id);
                self.ghosts.remove(&session_id);
            }
            other => debug!("Ignoring {} from server", other.tag()),
        }
    }

    fn check_link(&mut self) {
        let dropped = matches!(&self.link, Some(link) if !link.is_connected());
        if dropped {
            warn!("Lost connection to server, continuing offline");
            self.link = None;
            self.ghosts.clear();
            self.enemies.clear();
        }
    }

    fn fire(&mut self) {
        let position = self.player.position;
        let velocity = self.player.facing.scale(BULLET_SPEED);
        self.bullets.push(Bullet::local(position, velocity));

        if let Some(link) = &self.link {
            link.send(&Message::shot(link.session_id(), position, velocity));
        }
    }

    fn step_online(&mut self, dt: f32) {
        let Some(link) = &self.link else {
            return;
        };
        let session_id = link.session_id();

        let period = 1.0 / POSITION_SEND_HZ;
        self.position_send_timer += dt;
        if self.position_send_timer >= period {
            self.position_send_timer -= period;
            if self.position_send_timer >= period {
                self.position_send_timer = 0.0;
            }
            link.send(&Message::pos(session_id, self.player.position));
        }

        // Hits are only reported; the mirrored hp changes when the server says so.
        let enemies = &self.enemies;
        self.bullets.retain(|bullet| {
            let struck = enemies.values().find(|enemy| {
                circles_overlap(bullet.position, BULLET_RADIUS, enemy.position, ENEMY_RADIUS)
            });

            match struck {
                Some(enemy) => {
                    if bullet.local {
                        link.send(&Message::Hit {
                            enemy_id: enemy.id,
                            damage: BULLET_DAMAGE,
                            shooter_id: session_id,
                        });
                    }
                    false
                }
                None => true,
            }
        });
    }

    fn apply_contact_damage(&mut self) {
        if !self.player.alive || self.player.is_invulnerable() {
            return;
        }

        let position = self.player.position;
        let contact = self
            .active_enemies()
            .values()
            .map(|enemy| enemy.position)
            .find(|enemy| circles_overlap(position, PLAYER_RADIUS, *enemy, ENEMY_RADIUS));

        if let Some(source) = contact {
            if self.player.take_contact(source) {
                debug!("Contact damage, health now {}", self.player.health);
                if !self.player.alive {
                    info!("Player died");
                }
            }
        }
    }
}

impl Default for SyncAgent {
    fn default() -> Self {
        Self::new()
    }
}
