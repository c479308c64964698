//! Overlap detection between bullets, enemies and the player
//!
//! Everything is a circle. Detection only reports; the run applies damage
//! and recycles bullets when it consumes the reports.

use super::bullet::Faction;
use super::enemy::Enemy;
use super::entity::{Damageable, EntityId, overlaps};
use super::player::Player;
use super::pool::{BulletHandle, BulletManager};

/// One overlap found during a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlap {
    /// A player shot touched an enemy
    PlayerBulletEnemy { bullet: BulletHandle, enemy: EntityId },
    /// A pattern bullet touched the player
    EnemyBulletPlayer { bullet: BulletHandle },
    /// An enemy body touched the player
    EnemyContactPlayer { enemy: EntityId },
}

/// Collect overlaps in a stable order: player shots (slot order, each
/// against the first enemy it touches), then enemy bullets, then contacts.
pub fn detect_overlaps(bullets: &BulletManager, enemies: &[Enemy], player: &Player) -> Vec<Overlap> {
    let mut out = Vec::new();
    let player_alive = player.is_alive();

    for (handle, bullet) in bullets.iter() {
        match bullet.faction {
            Faction::Player => {
                if let Some(enemy) = enemies.iter().find(|e| e.is_alive() && overlaps(bullet, *e)) {
                    out.push(Overlap::PlayerBulletEnemy {
                        bullet: handle,
                        enemy: enemy.id,
                    });
                }
            }
            Faction::Enemy => {
                if player_alive && overlaps(bullet, player) {
                    out.push(Overlap::EnemyBulletPlayer { bullet: handle });
                }
            }
        }
    }

    if player_alive {
        out.extend(
            enemies
                .iter()
                .filter(|e| e.is_alive() && overlaps(*e, player))
                .map(|e| Overlap::EnemyContactPlayer { enemy: e.id }),
        );
    }
    out
}
