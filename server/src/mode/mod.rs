//! Round lifecycle and the per-mode rules layered over shared mechanics.
//!
//! [`GameState`] owns the phase machine (`Active` → `RoundEnd` → `Vote` →
//! reset), the objective state of the running mode and the team scores. It
//! never owns entities; the lobby lends them for each call.

mod flags;
mod hill;
mod juggernaut;
mod waves;

pub use flags::{Flag, Flags};
pub use hill::Hill;
pub use juggernaut::JuggernautRole;
pub use waves::{wave_size, Waves};

use crate::combat::{Death, KillEvent};
use crate::config::{map_by_index, LobbyConfig, MapDef, KILL_REWARD_COINS, KILL_REWARD_XP};
use crate::entity::{Entities, EntityRef, Player, Stats};
use crate::spawn::{find_spawn, SpawnRegion};
use log::{debug, info};
use rand::Rng;
use shared::{Faction, ModeKind, ObjectiveView, Rect, RoundPhase, TeamScores};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathPolicy {
    /// Respawn after the configured delay.
    Respawn,
    /// Lose a life; eliminated at zero.
    LoseLife,
}

/// Static per-mode rule table consulted by combat and the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeRules {
    /// Players are split into red and blue.
    pub team_based: bool,
    /// Same-faction damage is allowed (only free-for-all).
    pub friendly_fire: bool,
    pub death: DeathPolicy,
    /// Player kills add to the killer's team score.
    pub team_kill_score: bool,
}

pub fn rules(kind: ModeKind) -> ModeRules {
    match kind {
        ModeKind::FreeForAll => ModeRules {
            team_based: false,
            friendly_fire: true,
            death: DeathPolicy::Respawn,
            team_kill_score: false,
        },
        ModeKind::TeamDeathmatch => ModeRules {
            team_based: true,
            friendly_fire: false,
            death: DeathPolicy::Respawn,
            team_kill_score: true,
        },
        ModeKind::KingOfTheHill | ModeKind::CaptureTheFlag => ModeRules {
            team_based: true,
            friendly_fire: false,
            death: DeathPolicy::Respawn,
            team_kill_score: false,
        },
        ModeKind::Zombies => ModeRules {
            team_based: false,
            friendly_fire: false,
            death: DeathPolicy::LoseLife,
            team_kill_score: false,
        },
        ModeKind::Juggernaut => ModeRules {
            team_based: false,
            friendly_fire: false,
            death: DeathPolicy::Respawn,
            team_kill_score: false,
        },
    }
}

/// Running mode together with its objective state.
#[derive(Debug, Clone, PartialEq)]
pub enum ModeState {
    FreeForAll,
    TeamDeathmatch,
    KingOfTheHill(Hill),
    CaptureTheFlag(Flags),
    Zombies(Waves),
    Juggernaut(JuggernautRole),
}

impl ModeState {
    pub fn fresh(kind: ModeKind, map: &MapDef) -> Self {
        match kind {
            ModeKind::FreeForAll => ModeState::FreeForAll,
            ModeKind::TeamDeathmatch => ModeState::TeamDeathmatch,
            ModeKind::KingOfTheHill => ModeState::KingOfTheHill(Hill::new(map.hill)),
            ModeKind::CaptureTheFlag => ModeState::CaptureTheFlag(Flags::new(map)),
            ModeKind::Zombies => ModeState::Zombies(Waves::default()),
            ModeKind::Juggernaut => ModeState::Juggernaut(JuggernautRole::default()),
        }
    }

    pub fn kind(&self) -> ModeKind {
        match self {
            ModeState::FreeForAll => ModeKind::FreeForAll,
            ModeState::TeamDeathmatch => ModeKind::TeamDeathmatch,
            ModeState::KingOfTheHill(_) => ModeKind::KingOfTheHill,
            ModeState::CaptureTheFlag(_) => ModeKind::CaptureTheFlag,
            ModeState::Zombies(_) => ModeKind::Zombies,
            ModeState::Juggernaut(_) => ModeKind::Juggernaut,
        }
    }
}

/// Ballot cast during the vote window. An unrecognised mode name is kept as
/// `None` and only counts towards the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vote {
    pub mode: Option<ModeKind>,
    pub map: usize,
}

#[derive(Debug)]
pub struct GameState {
    pub phase: RoundPhase,
    /// Ticks left in the current phase.
    pub timer: u32,
    pub map: usize,
    pub map_def: &'static MapDef,
    pub team_scores: TeamScores,
    pub mode: ModeState,
    pub votes: BTreeMap<u32, Vote>,
}

/// Puts `player` back into play at a spawn point for its faction.
pub fn respawn_player<R: Rng + ?Sized>(
    player: &mut Player,
    walls: &[Rect],
    invulnerability: u32,
    rng: &mut R,
) {
    let (x, y) = find_spawn(SpawnRegion::for_faction(player.faction), walls, rng);
    player.respawn_at(x, y, invulnerability);
}

impl GameState {
    /// Builds an unpopulated state. Call [`GameState::reset`] before ticking.
    pub fn new(kind: ModeKind, map: usize, config: &LobbyConfig) -> Self {
        let (map, map_def) = map_by_index(map);
        Self {
            phase: RoundPhase::Active,
            timer: config.round_ticks,
            map,
            map_def,
            team_scores: TeamScores::default(),
            mode: ModeState::fresh(kind, map_def),
            votes: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> ModeKind {
        self.mode.kind()
    }

    pub fn rules(&self) -> ModeRules {
        rules(self.kind())
    }

    pub fn walls(&self) -> &'static [Rect] {
        self.map_def.walls
    }

    /// Starts a fresh round of `kind` on map `map`.
    pub fn reset<R: Rng + ?Sized>(
        &mut self,
        kind: ModeKind,
        map: usize,
        entities: &mut Entities,
        config: &LobbyConfig,
        rng: &mut R,
    ) {
        let (map, map_def) = map_by_index(map);
        self.map = map;
        self.map_def = map_def;
        self.mode = ModeState::fresh(kind, map_def);
        self.phase = RoundPhase::Active;
        self.timer = config.round_ticks;
        self.team_scores = TeamScores::default();
        self.votes.clear();

        entities.bullets.clear();
        entities.npcs.clear();

        let rules = rules(kind);
        for (index, player) in entities.players.values_mut().enumerate() {
            player.stats = Stats::default();
            player.eliminated = false;
            player.lives = if kind == ModeKind::Zombies {
                config.zombie_lives
            } else {
                0
            };
            player.faction = if rules.team_based {
                if index % 2 == 0 {
                    Faction::Red
                } else {
                    Faction::Blue
                }
            } else {
                match kind {
                    ModeKind::Zombies => Faction::Human,
                    ModeKind::Juggernaut => Faction::Hunter,
                    _ => Faction::Ffa,
                }
            };
            if !std::ptr::eq(player.kit, player.loadout) {
                player.equip(player.loadout);
            }
        }

        if let ModeState::Juggernaut(role) = &mut self.mode {
            role.assign_random(entities, None, rng);
        }

        let walls = self.walls();
        for player in entities.players.values_mut() {
            respawn_player(player, walls, 0, rng);
        }

        info!(
            "Round started: {} on {} with {} players",
            kind.name(),
            map_def.name,
            entities.players.len()
        );
    }

    /// Faction for a player joining mid-round.
    pub fn faction_for_join(&self, entities: &Entities) -> Faction {
        match self.kind() {
            ModeKind::FreeForAll => Faction::Ffa,
            ModeKind::Zombies => Faction::Human,
            ModeKind::Juggernaut => Faction::Hunter,
            _ => {
                let red = entities
                    .players
                    .values()
                    .filter(|p| p.faction == Faction::Red)
                    .count();
                let blue = entities
                    .players
                    .values()
                    .filter(|p| p.faction == Faction::Blue)
                    .count();
                if blue < red {
                    Faction::Blue
                } else {
                    Faction::Red
                }
            }
        }
    }

    /// True when a newcomer must sit out the rest of the round: a zombie
    /// wave is underway and someone is still fighting it. Rejoining never
    /// restores spent lives.
    pub fn sits_out_join(&self, entities: &Entities) -> bool {
        match &self.mode {
            ModeState::Zombies(waves) => {
                self.phase == RoundPhase::Active
                    && waves.wave > 0
                    && entities
                        .players
                        .values()
                        .any(|p| p.faction == Faction::Human && !p.eliminated)
            }
            _ => false,
        }
    }

    /// Respawns, wave spawning and zombie steering, juggernaut upkeep.
    pub fn pre_physics<R: Rng + ?Sized>(
        &mut self,
        entities: &mut Entities,
        config: &LobbyConfig,
        rng: &mut R,
    ) {
        let walls = self.walls();
        for player in entities.players.values_mut() {
            if player.dead && !player.eliminated && player.timers.respawn == 0 {
                respawn_player(player, walls, config.invulnerability_ticks, rng);
                debug!("Player {} respawned", player.id);
            }
        }

        if self.phase != RoundPhase::Active {
            return;
        }
        match &mut self.mode {
            ModeState::Zombies(waves) => {
                waves.update(entities, walls, rng);
                Waves::steer(entities);
            }
            ModeState::Juggernaut(role) => role.ensure(entities, rng),
            _ => {}
        }
    }

    /// Objective scoring that depends on post-movement positions.
    pub fn post_physics(&mut self, entities: &mut Entities) {
        if self.phase != RoundPhase::Active {
            return;
        }
        match &mut self.mode {
            ModeState::KingOfTheHill(hill) => {
                hill.update(entities, &mut self.team_scores);
            }
            ModeState::CaptureTheFlag(flags) => {
                flags.update(entities, &mut self.team_scores);
            }
            _ => {}
        }
    }

    /// Credits kills and applies each death's consequence. Returns one
    /// event per death for the kill feed and the reward sink.
    pub fn handle_deaths<R: Rng + ?Sized>(
        &mut self,
        deaths: Vec<Death>,
        entities: &mut Entities,
        config: &LobbyConfig,
        rng: &mut R,
    ) -> Vec<KillEvent> {
        let rules = self.rules();
        let mut events = Vec::with_capacity(deaths.len());

        for death in deaths {
            let victim_name = entities.name_of(death.victim);
            let killer = death
                .killer
                .filter(|&k| death.victim != EntityRef::Player(k));

            let mut killer_name = None;
            if let Some(killer_id) = killer {
                if let Some(player) = entities.players.get_mut(&killer_id) {
                    player.stats.kills += 1;
                    player.stats.score += 1;
                    killer_name = Some(player.name.clone());
                    if rules.team_kill_score && matches!(death.victim, EntityRef::Player(_)) {
                        self.team_scores.add(player.faction, 1);
                    }
                }
            }

            match death.victim {
                EntityRef::Player(id) => {
                    self.player_died(id, killer, death.x, death.y, entities, config, rng)
                }
                EntityRef::Npc(id) => {
                    entities.npcs.remove(&id);
                }
            }

            debug!(
                "{} killed {}",
                killer_name.as_deref().unwrap_or("<world>"),
                victim_name
            );
            let rewarded = killer_name.is_some();
            events.push(KillEvent {
                killer,
                killer_name,
                victim: death.victim,
                victim_name,
                coins: if rewarded { KILL_REWARD_COINS } else { 0 },
                xp: if rewarded { KILL_REWARD_XP } else { 0 },
            });
        }

        if let ModeState::Zombies(waves) = &mut self.mode {
            if waves.check_loss(entities) {
                self.timer = 0;
            }
        }
        events
    }

    #[allow(clippy::too_many_arguments)]
    fn player_died<R: Rng + ?Sized>(
        &mut self,
        id: u32,
        killer: Option<u32>,
        x: f32,
        y: f32,
        entities: &mut Entities,
        config: &LobbyConfig,
        rng: &mut R,
    ) {
        match &mut self.mode {
            ModeState::CaptureTheFlag(flags) => {
                flags.drop_carried_by(id, x, y);
            }
            ModeState::Juggernaut(role) => role.on_death(id, killer, entities, rng),
            _ => {}
        }

        let policy = self.rules().death;
        let Some(player) = entities.players.get_mut(&id) else {
            return;
        };
        match policy {
            DeathPolicy::Respawn => player.timers.respawn = config.respawn_ticks,
            DeathPolicy::LoseLife => {
                player.lives = player.lives.saturating_sub(1);
                if player.lives == 0 {
                    player.eliminated = true;
                    info!("{} was eliminated", player.name);
                } else {
                    player.timers.respawn = config.respawn_ticks;
                }
            }
        }
    }

    /// Cleans up after a player whose record was just removed.
    pub fn on_leave<R: Rng + ?Sized>(
        &mut self,
        id: u32,
        last_position: (f32, f32),
        entities: &mut Entities,
        rng: &mut R,
    ) {
        self.votes.remove(&id);
        match &mut self.mode {
            ModeState::CaptureTheFlag(flags) => {
                flags.drop_carried_by(id, last_position.0, last_position.1);
            }
            ModeState::Juggernaut(role) => role.on_leave(id, entities, rng),
            ModeState::Zombies(waves) => {
                if waves.check_loss(entities) {
                    self.timer = 0;
                }
            }
            _ => {}
        }
    }

    /// Counts down the phase timer and moves to the next phase on expiry.
    /// Returns the phase that was entered, if any.
    pub fn advance_phase<R: Rng + ?Sized>(
        &mut self,
        entities: &mut Entities,
        config: &LobbyConfig,
        rng: &mut R,
    ) -> Option<RoundPhase> {
        self.timer = self.timer.saturating_sub(1);
        if self.timer > 0 {
            return None;
        }

        match self.phase {
            RoundPhase::Active => {
                self.phase = RoundPhase::RoundEnd;
                self.timer = config.round_end_ticks;
                entities.bullets.clear();
                info!(
                    "Round over: {} red {} blue {}",
                    self.kind().name(),
                    self.team_scores.red,
                    self.team_scores.blue
                );
            }
            RoundPhase::RoundEnd => {
                self.phase = RoundPhase::Vote;
                self.timer = config.vote_ticks;
                self.votes.clear();
                info!("Voting opened");
            }
            RoundPhase::Vote => {
                let (kind, map) = self.tally();
                self.reset(kind, map, entities, config, rng);
            }
        }
        Some(self.phase)
    }

    /// Records a ballot. Only accepted while voting is open.
    pub fn cast_vote(&mut self, player: u32, mode: &str, map: usize) -> bool {
        if self.phase != RoundPhase::Vote {
            return false;
        }
        let vote = Vote {
            mode: ModeKind::from_name(mode),
            map,
        };
        if vote.mode.is_none() {
            debug!("Player {} voted for unknown mode '{}'", player, mode);
        }
        self.votes.insert(player, vote);
        true
    }

    /// Winning mode and map. Mode ties keep the current mode when it is
    /// among the leaders, otherwise the first in [`ModeKind::ALL`]; map ties
    /// go to the lowest index. Without ballots nothing changes.
    pub fn tally(&self) -> (ModeKind, usize) {
        let current = self.kind();

        let mut mode_counts: BTreeMap<usize, u32> = BTreeMap::new();
        for vote in self.votes.values() {
            if let Some(mode) = vote.mode {
                if let Some(index) = ModeKind::ALL.iter().position(|&m| m == mode) {
                    *mode_counts.entry(index).or_default() += 1;
                }
            }
        }
        let mode = match mode_counts.values().max() {
            None => current,
            Some(&best) => {
                let leaders: Vec<ModeKind> = mode_counts
                    .iter()
                    .filter(|(_, &count)| count == best)
                    .map(|(&index, _)| ModeKind::ALL[index])
                    .collect();
                if leaders.contains(&current) {
                    current
                } else {
                    leaders[0]
                }
            }
        };

        let mut map_counts: BTreeMap<usize, u32> = BTreeMap::new();
        for vote in self.votes.values() {
            *map_counts.entry(vote.map).or_default() += 1;
        }
        let map = match map_counts.values().max() {
            None => self.map,
            Some(&best) => map_counts
                .iter()
                .find(|(_, &count)| count == best)
                .map(|(&map, _)| map)
                .unwrap_or(self.map),
        };

        (mode, map)
    }

    pub fn objective_view(&self, entities: &Entities) -> ObjectiveView {
        match &self.mode {
            ModeState::FreeForAll | ModeState::TeamDeathmatch => ObjectiveView::None,
            ModeState::KingOfTheHill(hill) => ObjectiveView::Hill {
                area: hill.area,
                controlling: hill.controlling,
            },
            ModeState::CaptureTheFlag(flags) => ObjectiveView::Flags(flags.view()),
            ModeState::Zombies(waves) => ObjectiveView::Waves {
                wave: waves.wave,
                remaining: entities.zombie_count() as u32,
                lost: waves.lost,
            },
            ModeState::Juggernaut(role) => ObjectiveView::Juggernaut {
                player: role.player,
            },
        }
    }
}
