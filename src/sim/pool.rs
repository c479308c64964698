//! Bounded bullet pool with FIFO eviction
//!
//! Slots are reused through a free list. Every spawn is tracked in insertion
//! order; whenever the live count exceeds the cap, the oldest tracked bullets
//! are recycled first. Handles carry a slot generation so a stale handle
//! never reaches a reused slot.

use std::collections::VecDeque;

use glam::Vec2;

use super::bullet::{Bullet, Faction, FireParams};
use super::modifier::{ModifierEngine, SpawnRequest};
use crate::consts::*;

/// Stable reference to one firing of a pooled bullet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BulletHandle {
    index: u32,
    generation: u32,
}

/// Owns every live bullet and drives their modifiers
#[derive(Debug, Clone)]
pub struct BulletManager {
    bullets: Vec<Bullet>,
    generations: Vec<u32>,
    free: Vec<u32>,
    /// Live handles, oldest first
    order: VecDeque<BulletHandle>,
    live: usize,
    cap: usize,
    cap_scale: f32,
    engine: ModifierEngine,
}

impl Default for BulletManager {
    fn default() -> Self {
        Self::new(ModifierEngine::default())
    }
}

impl BulletManager {
    pub fn new(engine: ModifierEngine) -> Self {
        Self {
            bullets: Vec::new(),
            generations: Vec::new(),
            free: Vec::new(),
            order: VecDeque::new(),
            live: 0,
            cap: BULLET_BASE_CAP,
            cap_scale: 1.0,
            engine,
        }
    }

    pub fn engine(&self) -> &ModifierEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ModifierEngine {
        &mut self.engine
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn cap_scale(&self) -> f32 {
        self.cap_scale
    }

    /// Number of active bullets
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Fire a bullet, evicting the oldest one first if the pool is full
    pub fn spawn(&mut self, origin: Vec2, angle_deg: f32, params: &FireParams) -> BulletHandle {
        while self.live >= self.cap {
            if !self.evict_oldest() {
                break;
            }
        }

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.bullets.push(Bullet::new());
                self.generations.push(0);
                (self.bullets.len() - 1) as u32
            }
        };

        let bullet = &mut self.bullets[index as usize];
        bullet.fire(origin, angle_deg, params);
        self.engine.attach(bullet);

        let handle = BulletHandle {
            index,
            generation: self.generations[index as usize],
        };
        self.live += 1;
        self.order.push_back(handle);
        self.enforce_cap();
        handle
    }

    /// Whether `handle` still refers to an active bullet
    pub fn is_live(&self, handle: BulletHandle) -> bool {
        let i = handle.index as usize;
        self.generations.get(i) == Some(&handle.generation) && self.bullets[i].is_active()
    }

    pub fn get(&self, handle: BulletHandle) -> Option<&Bullet> {
        self.is_live(handle).then(|| &self.bullets[handle.index as usize])
    }

    pub fn get_mut(&mut self, handle: BulletHandle) -> Option<&mut Bullet> {
        if self.is_live(handle) {
            Some(&mut self.bullets[handle.index as usize])
        } else {
            None
        }
    }

    /// Recycle one bullet; false if the handle is stale
    pub fn recycle(&mut self, handle: BulletHandle) -> bool {
        if !self.is_live(handle) {
            return false;
        }
        self.bullets[handle.index as usize].recycle();
        self.release(handle.index);
        true
    }

    /// Return a slot whose bullet is already inactive to the free list
    fn release(&mut self, index: u32) {
        let i = index as usize;
        self.generations[i] = self.generations[i].wrapping_add(1);
        self.free.push(index);
        self.live -= 1;
    }

    fn evict_oldest(&mut self) -> bool {
        while let Some(handle) = self.order.pop_front() {
            if self.recycle(handle) {
                return true;
            }
        }
        false
    }

    fn enforce_cap(&mut self) {
        while self.live > self.cap {
            if !self.evict_oldest() {
                break;
            }
        }
    }

    /// Scale the cap (clamped to [0.1, 1]) and evict down to it
    pub fn set_cap_scale(&mut self, scale: f32) {
        self.cap_scale = scale.clamp(BULLET_CAP_SCALE_MIN, BULLET_CAP_SCALE_MAX);
        self.cap = (BULLET_BASE_CAP as f32 * self.cap_scale).round() as usize;
        log::debug!("Bullet cap now {} (scale {:.2})", self.cap, self.cap_scale);
        self.enforce_cap();
    }

    pub fn reset_cap(&mut self) {
        self.cap_scale = 1.0;
        self.cap = BULLET_BASE_CAP;
    }

    /// Tick every live bullet, then its modifiers; split children spawn last
    pub fn update(&mut self, dt_ms: f32, target: Option<Vec2>) {
        let mut spawns: Vec<SpawnRequest> = Vec::new();
        let mut released = Vec::new();

        for (i, bullet) in self.bullets.iter_mut().enumerate() {
            if !bullet.is_active() {
                continue;
            }
            if bullet.tick(dt_ms) {
                self.engine.update(bullet, dt_ms, target, &mut spawns);
            }
            if !bullet.is_active() {
                released.push(i as u32);
            }
        }

        for index in released {
            self.release(index);
        }
        self.prune_order();

        for req in spawns {
            self.spawn(req.origin, req.angle_deg, &req.params);
        }
    }

    fn prune_order(&mut self) {
        let generations = &self.generations;
        let bullets = &self.bullets;
        self.order.retain(|h| {
            let i = h.index as usize;
            generations[i] == h.generation && bullets[i].is_active()
        });
    }

    /// Live bullets in slot order
    pub fn iter(&self) -> impl Iterator<Item = (BulletHandle, &Bullet)> + '_ {
        self.bullets
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_active())
            .map(|(i, b)| {
                (
                    BulletHandle {
                        index: i as u32,
                        generation: self.generations[i],
                    },
                    b,
                )
            })
    }

    /// Live handles, oldest first
    pub fn tracked(&self) -> impl Iterator<Item = BulletHandle> + '_ {
        self.order.iter().copied().filter(|h| self.is_live(*h))
    }

    /// Recycle every bullet of one faction
    pub fn clear_faction(&mut self, faction: Faction) {
        let handles: Vec<BulletHandle> = self
            .iter()
            .filter(|(_, b)| b.faction == faction)
            .map(|(h, _)| h)
            .collect();
        for handle in handles {
            self.recycle(handle);
        }
        self.prune_order();
    }

    /// Recycle everything
    pub fn clear(&mut self) {
        let handles: Vec<BulletHandle> = self.iter().map(|(h, _)| h).collect();
        for handle in handles {
            self.recycle(handle);
        }
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::modifier::ModifierKind;
    use proptest::prelude::*;

    fn center() -> Vec2 {
        Vec2::new(ARENA_WIDTH / 2.0, ARENA_HEIGHT / 2.0)
    }

    fn slow() -> FireParams {
        FireParams {
            speed: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_spawn_and_recycle() {
        let mut pool = BulletManager::default();
        let a = pool.spawn(center(), 0.0, &slow());
        assert_eq!(pool.len(), 1);
        assert!(pool.recycle(a));
        assert!(!pool.recycle(a));
        assert!(pool.is_empty());

        // Slot reuse yields a distinct handle
        let b = pool.spawn(center(), 0.0, &slow());
        assert_ne!(a, b);
        assert!(!pool.is_live(a));
        assert!(pool.is_live(b));
    }

    #[test]
    fn test_cap_scale_clamps_and_rounds() {
        let mut pool = BulletManager::default();
        pool.set_cap_scale(0.0);
        assert_eq!(pool.cap(), 70);
        pool.set_cap_scale(0.55);
        assert_eq!(pool.cap(), 385);
        pool.set_cap_scale(3.0);
        assert_eq!(pool.cap(), BULLET_BASE_CAP);
    }

    #[test]
    fn test_shrinking_cap_evicts_oldest() {
        let mut pool = BulletManager::default();
        let handles: Vec<_> = (0..100).map(|_| pool.spawn(center(), 0.0, &slow())).collect();
        pool.set_cap_scale(0.1);
        assert_eq!(pool.len(), 70);
        assert!(handles[..30].iter().all(|h| !pool.is_live(*h)));
        assert!(handles[30..].iter().all(|h| pool.is_live(*h)));
    }

    #[test]
    fn test_expired_bullets_leave_queue() {
        let mut pool = BulletManager::default();
        let short = FireParams {
            lifespan_ms: 10.0,
            ..slow()
        };
        pool.spawn(center(), 0.0, &short);
        let keep = pool.spawn(center(), 0.0, &slow());
        pool.update(16.0, None);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.tracked().collect::<Vec<_>>(), vec![keep]);
    }

    #[test]
    fn test_split_children_join_pool() {
        let mut pool = BulletManager::default();
        let params = FireParams {
            speed: 50.0,
            modifiers: vec![ModifierKind::Split],
            ..Default::default()
        };
        let parent = pool.spawn(center(), 0.0, &params);
        pool.update(700.0, None);
        assert_eq!(pool.len(), 1);
        pool.update(700.0, None);
        assert!(!pool.is_live(parent));
        assert_eq!(pool.len(), 2);
        assert!(pool.iter().all(|(_, b)| b.modifiers.is_empty()));
    }

    #[test]
    fn test_clear_faction() {
        let mut pool = BulletManager::default();
        pool.spawn(center(), 0.0, &slow());
        let mine = pool.spawn(
            center(),
            0.0,
            &FireParams {
                faction: Faction::Player,
                ..slow()
            },
        );
        pool.clear_faction(Faction::Enemy);
        assert_eq!(pool.len(), 1);
        assert!(pool.is_live(mine));
        pool.clear();
        assert!(pool.is_empty());
    }

    proptest! {
        #[test]
        fn prop_fifo_eviction(scale in 0.1f32..=1.0, extra in 1usize..50) {
            let mut pool = BulletManager::default();
            pool.set_cap_scale(scale);
            let cap = pool.cap();
            let handles: Vec<_> = (0..cap + extra)
                .map(|_| pool.spawn(center(), 0.0, &slow()))
                .collect();

            prop_assert_eq!(pool.len(), cap);
            for h in &handles[..extra] {
                prop_assert!(!pool.is_live(*h));
            }
            let survivors: Vec<_> = pool.tracked().collect();
            prop_assert_eq!(&survivors[..], &handles[extra..]);

            // Next spawn evicts the oldest survivor
            let next = pool.spawn(center(), 0.0, &slow());
            prop_assert!(!pool.is_live(handles[extra]));
            prop_assert!(pool.is_live(next));
        }
    }
}
