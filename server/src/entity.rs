//! Entity records owned by a lobby.
//!
//! Players and NPCs share a [`Body`] (transform, velocity, health). NPCs carry
//! a payload describing who drives them. Cross-entity links (bullet owner,
//! sentry owner, flag carrier) are plain ids resolved through [`Entities`],
//! so removing an entity never leaves a dangling reference behind.

use crate::config::{
    Kit, Role, WeaponProfile, DUMMY_HP, PARRY_ACTIVE_TICKS, PARRY_COOLDOWN, SENTRY_HP,
    SENTRY_LIFETIME, SENTRY_SIZE, ZOMBIE_BASE_HP, ZOMBIE_BASE_SPEED, ZOMBIE_CONTACT_DAMAGE,
    ZOMBIE_HP_PER_WAVE, ZOMBIE_MAX_SPEED, ZOMBIE_SPEED_PER_WAVE,
};
use shared::{
    point_in_rect, BulletView, Faction, InputCommand, NpcKindView, NpcView, PlayerView, Rect,
    ENTITY_SIZE,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityRef {
    Player(u32),
    Npc(u32),
}

/// Positional and health state shared by every simulated entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub vx: f32,
    pub vy: f32,
    pub hp: f32,
    pub max_hp: f32,
}

impl Body {
    pub fn new(x: f32, y: f32, size: f32, max_hp: f32) -> Self {
        Self {
            x,
            y,
            w: size,
            h: size,
            vx: 0.0,
            vy: 0.0,
            hp: max_hp,
            max_hp,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h)
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn speed(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        point_in_rect(x, y, &self.rect())
    }

    /// Subtracts `amount`, clamping at zero. Returns true only on the call
    /// that takes hp from positive to zero.
    pub fn apply_damage(&mut self, amount: f32) -> bool {
        if self.hp <= 0.0 {
            return false;
        }
        self.hp = (self.hp - amount).clamp(0.0, self.max_hp);
        self.hp <= 0.0
    }

    pub fn heal(&mut self, amount: f32) {
        if self.hp > 0.0 {
            self.hp = (self.hp + amount).min(self.max_hp);
        }
    }

    pub fn stop(&mut self) {
        self.vx = 0.0;
        self.vy = 0.0;
    }
}

/// Per-player countdowns, all in ticks and floored at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timers {
    pub shoot: u32,
    pub reload: u32,
    pub dash: u32,
    pub respawn: u32,
    pub invulnerable: u32,
    pub parry: u32,
    pub sentry: u32,
}

impl Timers {
    pub fn tick(&mut self) {
        for timer in [
            &mut self.shoot,
            &mut self.reload,
            &mut self.dash,
            &mut self.respawn,
            &mut self.invulnerable,
            &mut self.parry,
            &mut self.sentry,
        ] {
            *timer = timer.saturating_sub(1);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Grapple {
    pub active: bool,
    pub x: f32,
    pub y: f32,
}

impl Grapple {
    pub fn attach(&mut self, x: f32, y: f32) {
        self.active = true;
        self.x = x;
        self.y = y;
    }

    pub fn release(&mut self) {
        self.active = false;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub kills: u32,
    pub deaths: u32,
    pub score: u32,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub role: Role,
    /// Kit chosen at join time; restored whenever a mode-imposed kit ends.
    pub loadout: &'static Kit,
    pub kit: &'static Kit,
    pub body: Body,
    pub angle: f32,
    pub faction: Faction,
    pub ammo: Option<u32>,
    pub reloading: bool,
    pub dead: bool,
    pub eliminated: bool,
    pub lives: u32,
    pub noclip: bool,
    pub timers: Timers,
    pub grapple: Grapple,
    pub stats: Stats,
    pub input: InputCommand,
}

impl Player {
    pub fn new(id: u32, name: String, kit: &'static Kit, role: Role) -> Self {
        let max_hp = kit.hp + role.bonus_hp();
        Self {
            id,
            name,
            role,
            loadout: kit,
            kit,
            body: Body::new(0.0, 0.0, ENTITY_SIZE, max_hp),
            angle: 0.0,
            faction: Faction::Ffa,
            ammo: kit.weapon.max_ammo,
            reloading: false,
            dead: false,
            eliminated: false,
            lives: 0,
            noclip: false,
            timers: Timers::default(),
            grapple: Grapple::default(),
            stats: Stats::default(),
            input: InputCommand::default(),
        }
    }

    pub fn weapon(&self) -> &'static WeaponProfile {
        &self.kit.weapon
    }

    pub fn max_ammo(&self) -> Option<u32> {
        self.kit.weapon.max_ammo
    }

    pub fn max_hp_for_kit(&self) -> f32 {
        self.kit.hp + self.role.bonus_hp()
    }

    pub fn is_alive(&self) -> bool {
        !self.dead && !self.eliminated
    }

    /// Alive and outside the post-respawn grace window.
    pub fn is_targetable(&self) -> bool {
        self.is_alive() && self.timers.invulnerable == 0
    }

    pub fn parrying(&self) -> bool {
        self.timers.parry > PARRY_COOLDOWN - PARRY_ACTIVE_TICKS
    }

    /// Swaps the active kit and rescales health and ammo to it.
    pub fn equip(&mut self, kit: &'static Kit) {
        self.kit = kit;
        self.body.max_hp = self.max_hp_for_kit();
        self.body.hp = self.body.hp.min(self.body.max_hp);
        self.ammo = kit.weapon.max_ammo;
        self.reloading = false;
        self.timers.reload = 0;
    }

    pub fn tick_timers(&mut self) {
        self.timers.tick();
        if self.reloading && self.timers.reload == 0 {
            self.finish_reload();
        }
    }

    /// Begins a reload unless one is running, the weapon is bottomless, or
    /// the magazine is already full.
    pub fn start_reload(&mut self) -> bool {
        let (Some(ammo), Some(max)) = (self.ammo, self.max_ammo()) else {
            return false;
        };
        if self.reloading || ammo >= max {
            return false;
        }
        self.reloading = true;
        self.timers.reload = self.weapon().reload;
        if self.timers.reload == 0 {
            self.finish_reload();
        }
        true
    }

    pub fn finish_reload(&mut self) {
        self.ammo = self.max_ammo();
        self.reloading = false;
    }

    /// Marks the player dead. Respawn scheduling belongs to the game mode.
    pub fn kill(&mut self) {
        self.dead = true;
        self.body.hp = 0.0;
        self.body.stop();
        self.grapple.release();
        self.stats.deaths += 1;
    }

    pub fn respawn_at(&mut self, x: f32, y: f32, invulnerability: u32) {
        self.body.x = x;
        self.body.y = y;
        self.body.stop();
        self.body.max_hp = self.max_hp_for_kit();
        self.body.hp = self.body.max_hp;
        self.ammo = self.max_ammo();
        self.reloading = false;
        self.dead = false;
        self.grapple.release();
        self.timers = Timers {
            invulnerable: invulnerability,
            sentry: self.timers.sentry,
            ..Timers::default()
        };
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            name: self.name.clone(),
            kit: self.kit.name.to_string(),
            faction: self.faction,
            x: self.body.x,
            y: self.body.y,
            w: self.body.w,
            h: self.body.h,
            angle: self.angle,
            hp: self.body.hp,
            max_hp: self.body.max_hp,
            ammo: self.ammo,
            max_ammo: self.max_ammo(),
            reloading: self.reloading,
            dead: self.dead,
            eliminated: self.eliminated,
            invulnerable: self.timers.invulnerable > 0,
            parrying: self.parrying(),
            grapple: self
                .grapple
                .active
                .then_some((self.grapple.x, self.grapple.y)),
            kills: self.stats.kills,
            deaths: self.stats.deaths,
            score: self.stats.score,
            lives: self.lives,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NpcKind {
    Zombie {
        speed: f32,
        contact_damage: f32,
    },
    Sentry {
        owner: u32,
        cooldown: u32,
        lifetime: u32,
    },
    Dummy,
}

/// Entity driven by mode logic rather than by a client.
#[derive(Debug, Clone)]
pub struct Npc {
    pub id: u32,
    pub kind: NpcKind,
    pub body: Body,
    pub faction: Faction,
}

impl Npc {
    pub fn zombie(id: u32, x: f32, y: f32, wave: u32) -> Self {
        let hp = ZOMBIE_BASE_HP + ZOMBIE_HP_PER_WAVE * wave as f32;
        let speed = (ZOMBIE_BASE_SPEED + ZOMBIE_SPEED_PER_WAVE * wave as f32).min(ZOMBIE_MAX_SPEED);
        Self {
            id,
            kind: NpcKind::Zombie {
                speed,
                contact_damage: ZOMBIE_CONTACT_DAMAGE,
            },
            body: Body::new(x, y, ENTITY_SIZE, hp),
            faction: Faction::Zombie,
        }
    }

    /// Sentry centred on `(cx, cy)`.
    pub fn sentry(id: u32, owner: u32, faction: Faction, cx: f32, cy: f32) -> Self {
        let half = SENTRY_SIZE / 2.0;
        Self {
            id,
            kind: NpcKind::Sentry {
                owner,
                cooldown: 0,
                lifetime: SENTRY_LIFETIME,
            },
            body: Body::new(cx - half, cy - half, SENTRY_SIZE, SENTRY_HP),
            faction,
        }
    }

    pub fn dummy(id: u32, x: f32, y: f32) -> Self {
        Self {
            id,
            kind: NpcKind::Dummy,
            body: Body::new(x, y, ENTITY_SIZE, DUMMY_HP),
            faction: Faction::Neutral,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.body.hp > 0.0
    }

    pub fn is_zombie(&self) -> bool {
        matches!(self.kind, NpcKind::Zombie { .. })
    }

    pub fn sentry_owner(&self) -> Option<u32> {
        match self.kind {
            NpcKind::Sentry { owner, .. } => Some(owner),
            _ => None,
        }
    }

    pub fn expired(&self) -> bool {
        matches!(self.kind, NpcKind::Sentry { lifetime: 0, .. })
    }

    pub fn view(&self) -> NpcView {
        let kind = match self.kind {
            NpcKind::Zombie { .. } => NpcKindView::Zombie,
            NpcKind::Sentry { owner, .. } => NpcKindView::Sentry { owner },
            NpcKind::Dummy => NpcKindView::Dummy,
        };
        NpcView {
            id: self.id,
            kind,
            faction: self.faction,
            x: self.body.x,
            y: self.body.y,
            w: self.body.w,
            h: self.body.h,
            hp: self.body.hp,
            max_hp: self.body.max_hp,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bullet {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub damage: f32,
    pub life: u32,
    /// Player credited for the shot; sentries fire on behalf of their owner.
    pub owner: u32,
    pub faction: Faction,
    pub heals: bool,
    pub size: f32,
}

impl Bullet {
    pub fn from_weapon(
        x: f32,
        y: f32,
        angle: f32,
        weapon: &WeaponProfile,
        owner: u32,
        faction: Faction,
    ) -> Self {
        Self {
            x,
            y,
            vx: angle.cos() * weapon.speed,
            vy: angle.sin() * weapon.speed,
            damage: weapon.damage,
            life: weapon.lifetime,
            owner,
            faction,
            heals: weapon.heals,
            size: weapon.size,
        }
    }

    pub fn view(&self) -> BulletView {
        BulletView {
            x: self.x,
            y: self.y,
            size: self.size,
            faction: self.faction,
            heals: self.heals,
        }
    }
}

/// Every mutable collection a lobby simulates.
#[derive(Debug, Default)]
pub struct Entities {
    pub players: BTreeMap<u32, Player>,
    pub npcs: BTreeMap<u32, Npc>,
    pub bullets: Vec<Bullet>,
    next_npc_id: u32,
}

impl Entities {
    pub fn add_npc(&mut self, build: impl FnOnce(u32) -> Npc) -> u32 {
        self.next_npc_id += 1;
        let id = self.next_npc_id;
        self.npcs.insert(id, build(id));
        id
    }

    pub fn zombie_count(&self) -> usize {
        self.npcs.values().filter(|npc| npc.is_zombie()).count()
    }

    pub fn remove_sentries_of(&mut self, owner: u32) {
        self.npcs.retain(|_, npc| npc.sentry_owner() != Some(owner));
    }

    /// Moves `owner`'s sentries and in-flight projectiles to `faction` after
    /// the owner changes sides.
    pub fn retag_owned_by(&mut self, owner: u32, faction: Faction) {
        for npc in self
            .npcs
            .values_mut()
            .filter(|npc| npc.sentry_owner() == Some(owner))
        {
            npc.faction = faction;
        }
        for bullet in self.bullets.iter_mut().filter(|b| b.owner == owner) {
            bullet.faction = faction;
        }
    }

    pub fn name_of(&self, entity: EntityRef) -> String {
        match entity {
            EntityRef::Player(id) => self
                .players
                .get(&id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| format!("player#{}", id)),
            EntityRef::Npc(id) => match self.npcs.get(&id).map(|n| n.kind) {
                Some(NpcKind::Zombie { .. }) => "Zombie".to_string(),
                Some(NpcKind::Sentry { .. }) => "Sentry".to_string(),
                Some(NpcKind::Dummy) => "Dummy".to_string(),
                None => format!("npc#{}", id),
            },
        }
    }
}
