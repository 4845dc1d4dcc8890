//! Weapon fire, projectile flight and hit resolution.
//!
//! Deaths are detected here (the hp crossing and the `dead` flag happen in the
//! same step, so a corpse is never a candidate again) and handed back to the
//! game mode, which owns scoring and the death consequence.

use crate::config::{
    PARRY_COOLDOWN, PARRY_RADIUS, PARRY_REFLECT, SENTRY_BULLET_LIFE, SENTRY_BULLET_SPEED,
    SENTRY_COOLDOWN, SENTRY_DAMAGE, SENTRY_FIRE_COOLDOWN, SENTRY_RANGE,
};
use crate::entity::{Bullet, Entities, EntityRef, Npc, NpcKind, Player};
use crate::mode::ModeRules;
use log::debug;
use rand::Rng;
use shared::geometry::distance;
use shared::{point_in_rect, rects_intersect, Faction, Rect};

/// A target whose hp crossed zero this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Death {
    pub victim: EntityRef,
    /// Player credited with the kill, if any.
    pub killer: Option<u32>,
    /// Victim centre at the moment of death.
    pub x: f32,
    pub y: f32,
}

/// Kill reward handed to the persistence layer. Nothing waits on it.
#[derive(Debug, Clone, PartialEq)]
pub struct KillEvent {
    pub killer: Option<u32>,
    pub killer_name: Option<String>,
    pub victim: EntityRef,
    pub victim_name: String,
    pub coins: u32,
    pub xp: u32,
}

enum Impact {
    Miss,
    Hit,
    Kill(Death),
}

/// Friendly-fire predicate. Neutral targets are fair game everywhere; other
/// targets need a different faction unless the mode allows friendly fire.
pub fn can_damage(rules: &ModeRules, attacker: Faction, target: Faction) -> bool {
    target == Faction::Neutral || rules.friendly_fire || attacker != target
}

/// Runs the whole combat pass and returns every death it caused.
pub fn run<R: Rng + ?Sized>(
    entities: &mut Entities,
    walls: &[Rect],
    rules: &ModeRules,
    rng: &mut R,
) -> Vec<Death> {
    place_sentries(entities);
    resolve_parries(entities);
    fire_weapons(entities, rng);
    fire_sentries(entities, rules);
    let mut deaths = advance_bullets(entities, walls, rules);
    deaths.extend(apply_zombie_contact(entities, rules));
    deaths
}

pub fn fire_weapons<R: Rng + ?Sized>(entities: &mut Entities, rng: &mut R) -> usize {
    let mut spawned = 0;
    for player in entities.players.values_mut() {
        if !player.is_alive() {
            continue;
        }
        if player.input.reload {
            player.start_reload();
        }
        if player.input.shoot {
            spawned += try_fire(player, &mut entities.bullets, rng);
        }
    }
    spawned
}

/// Handles one trigger pull. An empty magazine starts a reload instead of
/// firing. Returns the number of projectiles spawned.
pub fn try_fire<R: Rng + ?Sized>(
    player: &mut Player,
    bullets: &mut Vec<Bullet>,
    rng: &mut R,
) -> usize {
    if player.timers.shoot > 0 || player.reloading {
        return 0;
    }
    if player.ammo == Some(0) {
        player.start_reload();
        return 0;
    }

    let weapon = player.weapon();
    let (cx, cy) = player.body.center();
    let half_spread = weapon.spread / 2.0;
    for _ in 0..weapon.count {
        let offset = if half_spread > 0.0 {
            rng.gen_range(-half_spread..=half_spread)
        } else {
            0.0
        };
        bullets.push(Bullet::from_weapon(
            cx,
            cy,
            player.angle + offset,
            weapon,
            player.id,
            player.faction,
        ));
    }

    player.timers.shoot = weapon.cooldown;
    if let Some(ammo) = player.ammo.as_mut() {
        *ammo -= 1;
    }
    weapon.count as usize
}

/// Drops a sentry for every player asking for one, replacing their old one.
pub fn place_sentries(entities: &mut Entities) {
    let requests: Vec<(u32, Faction, f32, f32)> = entities
        .players
        .values_mut()
        .filter(|p| p.is_alive() && p.input.place_sentry && p.timers.sentry == 0)
        .map(|p| {
            p.timers.sentry = SENTRY_COOLDOWN;
            let (cx, cy) = p.body.center();
            (p.id, p.faction, cx, cy)
        })
        .collect();

    for (owner, faction, cx, cy) in requests {
        entities.remove_sentries_of(owner);
        let id = entities.add_npc(|id| Npc::sentry(id, owner, faction, cx, cy));
        debug!("Player {} placed sentry {} at ({:.0}, {:.0})", owner, id, cx, cy);
    }
}

/// Reflects nearby enemy projectiles for players starting a parry. Returns the
/// number of projectiles stolen.
pub fn resolve_parries(entities: &mut Entities) -> usize {
    let mut reflected = 0;
    for player in entities.players.values_mut() {
        if !player.is_alive() || !player.input.parry || player.timers.parry > 0 {
            continue;
        }
        player.timers.parry = PARRY_COOLDOWN;
        let (cx, cy) = player.body.center();
        for bullet in entities.bullets.iter_mut() {
            if bullet.owner != player.id && distance(bullet.x, bullet.y, cx, cy) < PARRY_RADIUS {
                bullet.vx *= PARRY_REFLECT;
                bullet.vy *= PARRY_REFLECT;
                bullet.owner = player.id;
                bullet.faction = player.faction;
                reflected += 1;
            }
        }
    }
    reflected
}

struct SentryTarget {
    entity: EntityRef,
    faction: Faction,
    sentry_owner: Option<u32>,
    x: f32,
    y: f32,
}

pub fn fire_sentries(entities: &mut Entities, rules: &ModeRules) {
    let mut targets: Vec<SentryTarget> = Vec::new();
    for player in entities.players.values().filter(|p| p.is_targetable()) {
        let (x, y) = player.body.center();
        targets.push(SentryTarget {
            entity: EntityRef::Player(player.id),
            faction: player.faction,
            sentry_owner: None,
            x,
            y,
        });
    }
    for npc in entities.npcs.values().filter(|n| n.is_alive()) {
        let (x, y) = npc.body.center();
        targets.push(SentryTarget {
            entity: EntityRef::Npc(npc.id),
            faction: npc.faction,
            sentry_owner: npc.sentry_owner(),
            x,
            y,
        });
    }

    for npc in entities.npcs.values_mut() {
        let NpcKind::Sentry {
            owner, cooldown, ..
        } = &mut npc.kind
        else {
            continue;
        };
        if *cooldown > 0 {
            continue;
        }

        let (sx, sy) = npc.body.center();
        let nearest = targets
            .iter()
            .filter(|t| {
                t.entity != EntityRef::Npc(npc.id)
                    && t.entity != EntityRef::Player(*owner)
                    && t.sentry_owner != Some(*owner)
                    && can_damage(rules, npc.faction, t.faction)
            })
            .map(|t| (distance(sx, sy, t.x, t.y), t))
            .filter(|(d, _)| *d <= SENTRY_RANGE)
            .min_by(|a, b| a.0.total_cmp(&b.0));

        if let Some((_, target)) = nearest {
            let angle = (target.y - sy).atan2(target.x - sx);
            entities.bullets.push(Bullet {
                x: sx,
                y: sy,
                vx: angle.cos() * SENTRY_BULLET_SPEED,
                vy: angle.sin() * SENTRY_BULLET_SPEED,
                damage: SENTRY_DAMAGE,
                life: SENTRY_BULLET_LIFE,
                owner: *owner,
                faction: npc.faction,
                heals: false,
                size: 5.0,
            });
            *cooldown = SENTRY_FIRE_COOLDOWN;
        }
    }
}

/// Moves every projectile one tick. Wall impact is checked before targets,
/// and lifetime exhaustion only after both.
pub fn advance_bullets(entities: &mut Entities, walls: &[Rect], rules: &ModeRules) -> Vec<Death> {
    let mut deaths = Vec::new();
    let mut bullets = std::mem::take(&mut entities.bullets);

    bullets.retain_mut(|bullet| {
        bullet.x += bullet.vx;
        bullet.y += bullet.vy;
        bullet.life = bullet.life.saturating_sub(1);

        if walls
            .iter()
            .any(|wall| point_in_rect(bullet.x, bullet.y, wall))
        {
            return false;
        }

        match strike(entities, bullet, rules) {
            Impact::Miss => bullet.life > 0,
            Impact::Hit => false,
            Impact::Kill(death) => {
                deaths.push(death);
                false
            }
        }
    });

    entities.bullets = bullets;
    deaths
}

/// Applies the projectile to the first valid candidate containing it:
/// players in id order, then NPCs in id order.
fn strike(entities: &mut Entities, bullet: &Bullet, rules: &ModeRules) -> Impact {
    for player in entities.players.values_mut() {
        if player.id == bullet.owner
            || !player.is_targetable()
            || !player.body.contains_point(bullet.x, bullet.y)
        {
            continue;
        }
        if bullet.heals && !rules.friendly_fire && bullet.faction == player.faction {
            player.body.heal(bullet.damage);
            return Impact::Hit;
        }
        if !can_damage(rules, bullet.faction, player.faction) {
            continue;
        }

        let (x, y) = player.body.center();
        if player.body.apply_damage(bullet.damage) {
            player.kill();
            return Impact::Kill(Death {
                victim: EntityRef::Player(player.id),
                killer: Some(bullet.owner),
                x,
                y,
            });
        }
        return Impact::Hit;
    }

    for npc in entities.npcs.values_mut() {
        if !npc.is_alive()
            || npc.sentry_owner() == Some(bullet.owner)
            || !npc.body.contains_point(bullet.x, bullet.y)
        {
            continue;
        }
        if bullet.heals && !rules.friendly_fire && bullet.faction == npc.faction {
            npc.body.heal(bullet.damage);
            return Impact::Hit;
        }
        if !can_damage(rules, bullet.faction, npc.faction) {
            continue;
        }

        let (x, y) = npc.body.center();
        if npc.body.apply_damage(bullet.damage) {
            return Impact::Kill(Death {
                victim: EntityRef::Npc(npc.id),
                killer: Some(bullet.owner),
                x,
                y,
            });
        }
        return Impact::Hit;
    }

    Impact::Miss
}

/// Zombies hurt every overlapping player they are allowed to damage.
pub fn apply_zombie_contact(entities: &mut Entities, rules: &ModeRules) -> Vec<Death> {
    let zombies: Vec<(Rect, f32)> = entities
        .npcs
        .values()
        .filter(|npc| npc.is_alive())
        .filter_map(|npc| match npc.kind {
            NpcKind::Zombie { contact_damage, .. } => Some((npc.body.rect(), contact_damage)),
            _ => None,
        })
        .collect();
    if zombies.is_empty() {
        return Vec::new();
    }

    let mut deaths = Vec::new();
    for player in entities.players.values_mut() {
        if !player.is_targetable() || !can_damage(rules, Faction::Zombie, player.faction) {
            continue;
        }
        let rect = player.body.rect();
        let damage: f32 = zombies
            .iter()
            .filter(|(zombie, _)| rects_intersect(zombie, &rect))
            .map(|(_, damage)| damage)
            .sum();
        if damage > 0.0 && player.body.apply_damage(damage) {
            let (x, y) = player.body.center();
            player.kill();
            deaths.push(Death {
                victim: EntityRef::Player(player.id),
                killer: None,
                x,
                y,
            });
        }
    }
    deaths
}
