use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod geometry;

pub use geometry::{point_in_rect, rects_intersect, Rect};

pub const PROTOCOL_VERSION: u32 = 1;
pub const TICK_RATE: u32 = 60;

pub const ARENA_WIDTH: f32 = 1600.0;
pub const ARENA_HEIGHT: f32 = 1200.0;
pub const ENTITY_SIZE: f32 = 40.0;

pub const FRICTION: f32 = 0.9;
pub const PUSH_BACK: f32 = 1.2;
pub const MOVE_ACCEL: f32 = 0.8;
pub const MAX_WALK_SPEED: f32 = 8.0;
pub const DASH_IMPULSE: f32 = 25.0;
pub const DASH_COOLDOWN: u32 = 90;

pub const GRAPPLE_RELEASE_DISTANCE: f32 = 50.0;
pub const GRAPPLE_PULL: f32 = 0.005;
pub const GRAPPLE_MAX_PULL_DISTANCE: f32 = 400.0;
pub const GRAPPLE_MAX_SPEED: f32 = 18.0;

/// Grouping used by combat rules to decide who may damage whom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    Ffa,
    Red,
    Blue,
    Human,
    Zombie,
    Juggernaut,
    Hunter,
    /// Training targets anyone may shoot.
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModeKind {
    FreeForAll,
    TeamDeathmatch,
    KingOfTheHill,
    CaptureTheFlag,
    Zombies,
    Juggernaut,
}

impl ModeKind {
    pub const ALL: [ModeKind; 6] = [
        ModeKind::FreeForAll,
        ModeKind::TeamDeathmatch,
        ModeKind::KingOfTheHill,
        ModeKind::CaptureTheFlag,
        ModeKind::Zombies,
        ModeKind::Juggernaut,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModeKind::FreeForAll => "ffa",
            ModeKind::TeamDeathmatch => "tdm",
            ModeKind::KingOfTheHill => "koth",
            ModeKind::CaptureTheFlag => "ctf",
            ModeKind::Zombies => "zombies",
            ModeKind::Juggernaut => "juggernaut",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "ffa" | "freeforall" | "free-for-all" => Some(ModeKind::FreeForAll),
            "tdm" | "teamdeathmatch" | "team-deathmatch" => Some(ModeKind::TeamDeathmatch),
            "koth" | "hill" | "king-of-the-hill" => Some(ModeKind::KingOfTheHill),
            "ctf" | "capture-the-flag" => Some(ModeKind::CaptureTheFlag),
            "zombies" | "zombie" | "survival" => Some(ModeKind::Zombies),
            "juggernaut" | "jugg" => Some(ModeKind::Juggernaut),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    Active,
    RoundEnd,
    Vote,
}

/// Latest control state a client holds down. The server keeps only the most
/// recent one per player and consumes it on the next tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InputCommand {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    /// Aim direction in radians.
    pub angle: f32,
    pub shoot: bool,
    pub reload: bool,
    pub dash: bool,
    pub grapple: bool,
    pub parry: bool,
    pub place_sentry: bool,
    /// World-space cursor position, used as the grapple target.
    pub target_x: f32,
    pub target_y: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
        name: String,
        kit: String,
        lobby: Option<u32>,
    },
    Input {
        sequence: u32,
        timestamp: u64,
        command: InputCommand,
    },
    Vote {
        mode: String,
        map: usize,
    },
    Disconnect,

    Connected {
        client_id: u32,
        lobby: u32,
    },
    Snapshot {
        last_processed_input: HashMap<u32, u32>,
        snapshot: Snapshot,
    },
    Disconnected {
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamScores {
    pub red: u32,
    pub blue: u32,
}

impl TeamScores {
    pub fn add(&mut self, faction: Faction, points: u32) {
        match faction {
            Faction::Red => self.red += points,
            Faction::Blue => self.blue += points,
            _ => {}
        }
    }

    pub fn get(&self, faction: Faction) -> u32 {
        match faction {
            Faction::Red => self.red,
            Faction::Blue => self.blue,
            _ => 0,
        }
    }
}

/// Full per-tick view of one lobby, sent to every client in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub lobby: u32,
    pub mode: ModeKind,
    pub phase: RoundPhase,
    pub timer: u32,
    pub map: usize,
    pub team_scores: TeamScores,
    pub walls: Vec<Rect>,
    pub players: Vec<PlayerView>,
    pub npcs: Vec<NpcView>,
    pub bullets: Vec<BulletView>,
    pub objective: ObjectiveView,
    pub kills: Vec<KillFeedEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: u32,
    pub name: String,
    pub kit: String,
    pub faction: Faction,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub angle: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub ammo: Option<u32>,
    pub max_ammo: Option<u32>,
    pub reloading: bool,
    pub dead: bool,
    pub eliminated: bool,
    pub invulnerable: bool,
    pub parrying: bool,
    pub grapple: Option<(f32, f32)>,
    pub kills: u32,
    pub deaths: u32,
    pub score: u32,
    pub lives: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NpcKindView {
    Zombie,
    Sentry { owner: u32 },
    Dummy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcView {
    pub id: u32,
    pub kind: NpcKindView,
    pub faction: Faction,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub hp: f32,
    pub max_hp: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulletView {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub faction: Faction,
    pub heals: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagView {
    pub team: Faction,
    pub x: f32,
    pub y: f32,
    pub base_x: f32,
    pub base_y: f32,
    pub carrier: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ObjectiveView {
    None,
    Hill {
        area: Rect,
        controlling: Option<Faction>,
    },
    Flags(Vec<FlagView>),
    Waves {
        wave: u32,
        remaining: u32,
        lost: bool,
    },
    Juggernaut {
        player: Option<u32>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillFeedEntry {
    pub killer: Option<String>,
    pub victim: String,
}
