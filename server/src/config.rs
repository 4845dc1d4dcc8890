//! Static game data (weapons, kits, roles, maps) and runtime knobs.
//!
//! Lookups never fail: an unknown kit name resolves to the base kit and an
//! out-of-range map index resolves to the first map, with a warning logged.

use log::warn;
use shared::{ModeKind, Rect, TICK_RATE};
use std::time::Duration;

pub const BASE_KIT: &str = "soldier";
pub const JUGGERNAUT_KIT: &str = "juggernaut";

pub const MAX_SPAWN_ATTEMPTS: u32 = 100;

pub const PARRY_COOLDOWN: u32 = 60;
pub const PARRY_ACTIVE_TICKS: u32 = 15;
pub const PARRY_RADIUS: f32 = 60.0;
pub const PARRY_REFLECT: f32 = -1.5;

pub const SENTRY_COOLDOWN: u32 = 600;
pub const SENTRY_LIFETIME: u32 = 900;
pub const SENTRY_HP: f32 = 150.0;
pub const SENTRY_SIZE: f32 = 30.0;
pub const SENTRY_RANGE: f32 = 450.0;
pub const SENTRY_FIRE_COOLDOWN: u32 = 30;
pub const SENTRY_DAMAGE: f32 = 10.0;
pub const SENTRY_BULLET_SPEED: f32 = 14.0;
pub const SENTRY_BULLET_LIFE: u32 = 40;

pub const ZOMBIE_BASE_HP: f32 = 40.0;
pub const ZOMBIE_HP_PER_WAVE: f32 = 5.0;
pub const ZOMBIE_BASE_SPEED: f32 = 1.5;
pub const ZOMBIE_SPEED_PER_WAVE: f32 = 0.1;
pub const ZOMBIE_MAX_SPEED: f32 = 3.5;
pub const ZOMBIE_CONTACT_DAMAGE: f32 = 0.5;

pub const DUMMY_HP: f32 = 200.0;

pub const FLAG_PICKUP_RADIUS: f32 = 40.0;
pub const FLAG_CAPTURE_RADIUS: f32 = 40.0;

pub const KILL_REWARD_COINS: u32 = 10;
pub const KILL_REWARD_XP: u32 = 25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponProfile {
    pub name: &'static str,
    pub damage: f32,
    pub speed: f32,
    pub cooldown: u32,
    /// Projectiles per trigger pull.
    pub count: u32,
    /// Total cone width in radians.
    pub spread: f32,
    /// `None` means the weapon never reloads.
    pub max_ammo: Option<u32>,
    pub reload: u32,
    pub lifetime: u32,
    pub size: f32,
    pub heals: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kit {
    pub name: &'static str,
    pub hp: f32,
    pub speed: f32,
    pub weapon: WeaponProfile,
}

pub static KITS: [Kit; 6] = [
    Kit {
        name: BASE_KIT,
        hp: 100.0,
        speed: 1.0,
        weapon: WeaponProfile {
            name: "pistol",
            damage: 15.0,
            speed: 18.0,
            cooldown: 20,
            count: 1,
            spread: 0.04,
            max_ammo: Some(12),
            reload: 90,
            lifetime: 100,
            size: 5.0,
            heals: false,
        },
    },
    Kit {
        name: "sniper",
        hp: 80.0,
        speed: 0.9,
        weapon: WeaponProfile {
            name: "sniper",
            damage: 90.0,
            speed: 45.0,
            cooldown: 100,
            count: 1,
            spread: 0.0,
            max_ammo: Some(5),
            reload: 150,
            lifetime: 100,
            size: 4.0,
            heals: false,
        },
    },
    Kit {
        name: "shotgun",
        hp: 120.0,
        speed: 0.95,
        weapon: WeaponProfile {
            name: "shotgun",
            damage: 12.0,
            speed: 16.0,
            cooldown: 45,
            count: 6,
            spread: 0.3,
            max_ammo: Some(6),
            reload: 120,
            lifetime: 35,
            size: 4.0,
            heals: false,
        },
    },
    Kit {
        name: "rocket",
        hp: 110.0,
        speed: 0.85,
        weapon: WeaponProfile {
            name: "rpg",
            damage: 60.0,
            speed: 10.0,
            cooldown: 80,
            count: 1,
            spread: 0.0,
            max_ammo: Some(3),
            reload: 180,
            lifetime: 100,
            size: 12.0,
            heals: false,
        },
    },
    Kit {
        name: "medic",
        hp: 90.0,
        speed: 1.1,
        weapon: WeaponProfile {
            name: "medigun",
            damage: 8.0,
            speed: 14.0,
            cooldown: 12,
            count: 1,
            spread: 0.1,
            max_ammo: Some(30),
            reload: 100,
            lifetime: 60,
            size: 6.0,
            heals: true,
        },
    },
    Kit {
        name: JUGGERNAUT_KIT,
        hp: 1000.0,
        speed: 0.7,
        weapon: WeaponProfile {
            name: "minigun",
            damage: 20.0,
            speed: 20.0,
            cooldown: 6,
            count: 1,
            spread: 0.15,
            max_ammo: None,
            reload: 0,
            lifetime: 90,
            size: 6.0,
            heals: false,
        },
    },
];

pub fn kit_by_name(name: &str) -> &'static Kit {
    let wanted = name.trim().to_lowercase();
    match KITS.iter().find(|kit| kit.name == wanted) {
        Some(kit) => kit,
        None => {
            warn!("Unknown kit '{}', falling back to {}", name, BASE_KIT);
            &KITS[0]
        }
    }
}

pub fn juggernaut_kit() -> &'static Kit {
    kit_by_name(JUGGERNAUT_KIT)
}

/// Account tier supplied by the persistence layer at join time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    Owner,
    Admin,
    Mod,
    #[default]
    User,
}

impl Role {
    pub fn bonus_hp(&self) -> f32 {
        match self {
            Role::Owner => 200.0,
            Role::Admin => 100.0,
            Role::Mod => 50.0,
            Role::User => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapDef {
    pub name: &'static str,
    pub walls: &'static [Rect],
    pub hill: Rect,
    pub red_base: (f32, f32),
    pub blue_base: (f32, f32),
}

pub static MAPS: [MapDef; 3] = [
    MapDef {
        name: "warehouse",
        walls: &[
            Rect::new(200.0, 200.0, 100.0, 400.0),
            Rect::new(600.0, 500.0, 600.0, 100.0),
            Rect::new(1000.0, 200.0, 200.0, 200.0),
            Rect::new(400.0, 900.0, 800.0, 50.0),
            Rect::new(-50.0, 0.0, 50.0, 1200.0),
            Rect::new(1600.0, 0.0, 50.0, 1200.0),
            Rect::new(0.0, -50.0, 1600.0, 50.0),
            Rect::new(0.0, 1200.0, 1600.0, 50.0),
        ],
        hill: Rect::new(650.0, 680.0, 200.0, 180.0),
        red_base: (100.0, 700.0),
        blue_base: (1500.0, 700.0),
    },
    MapDef {
        name: "crossfire",
        walls: &[
            Rect::new(500.0, 300.0, 80.0, 600.0),
            Rect::new(1020.0, 300.0, 80.0, 600.0),
            Rect::new(700.0, 150.0, 200.0, 60.0),
            Rect::new(700.0, 990.0, 200.0, 60.0),
            Rect::new(-50.0, 0.0, 50.0, 1200.0),
            Rect::new(1600.0, 0.0, 50.0, 1200.0),
            Rect::new(0.0, -50.0, 1600.0, 50.0),
            Rect::new(0.0, 1200.0, 1600.0, 50.0),
        ],
        hill: Rect::new(700.0, 500.0, 200.0, 200.0),
        red_base: (100.0, 600.0),
        blue_base: (1500.0, 600.0),
    },
    MapDef {
        name: "open",
        walls: &[
            Rect::new(380.0, 280.0, 60.0, 60.0),
            Rect::new(1160.0, 280.0, 60.0, 60.0),
            Rect::new(380.0, 860.0, 60.0, 60.0),
            Rect::new(1160.0, 860.0, 60.0, 60.0),
            Rect::new(-50.0, 0.0, 50.0, 1200.0),
            Rect::new(1600.0, 0.0, 50.0, 1200.0),
            Rect::new(0.0, -50.0, 1600.0, 50.0),
            Rect::new(0.0, 1200.0, 1600.0, 50.0),
        ],
        hill: Rect::new(700.0, 500.0, 200.0, 200.0),
        red_base: (100.0, 600.0),
        blue_base: (1500.0, 600.0),
    },
];

/// Returns the resolved index alongside the map so callers can report it.
pub fn map_by_index(index: usize) -> (usize, &'static MapDef) {
    match MAPS.get(index) {
        Some(map) => (index, map),
        None => {
            warn!("Unknown map index {}, falling back to {}", index, MAPS[0].name);
            (0, &MAPS[0])
        }
    }
}

/// Per-lobby timing and capacity knobs, expressed in ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LobbyConfig {
    pub round_ticks: u32,
    pub round_end_ticks: u32,
    pub vote_ticks: u32,
    pub respawn_ticks: u32,
    pub invulnerability_ticks: u32,
    pub zombie_lives: u32,
    pub max_players: usize,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self::for_tick_rate(TICK_RATE, 300)
    }
}

impl LobbyConfig {
    pub fn for_tick_rate(tick_rate: u32, round_secs: u32) -> Self {
        Self {
            round_ticks: round_secs.saturating_mul(tick_rate),
            round_end_ticks: tick_rate.saturating_mul(5),
            vote_ticks: tick_rate.saturating_mul(10),
            respawn_ticks: tick_rate.saturating_mul(2),
            invulnerability_ticks: tick_rate.saturating_mul(3) / 2,
            zombie_lives: 3,
            max_players: 16,
        }
    }
}

/// Everything the network server needs to stand up its lobbies.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub tick_duration: Duration,
    pub max_clients: usize,
    pub lobby_count: u32,
    pub mode: ModeKind,
    pub map: usize,
    pub lobby: LobbyConfig,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_secs_f64(1.0 / TICK_RATE as f64),
            max_clients: 32,
            lobby_count: 1,
            mode: ModeKind::FreeForAll,
            map: 0,
            lobby: LobbyConfig::default(),
        }
    }
}
