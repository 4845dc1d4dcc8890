//! One self-contained match: its entities, its game state and its RNG.
//!
//! A lobby tick runs mode pre-physics, physics for every entity, then (only
//! while the round is active) combat, death handling and objective scoring,
//! and finally the phase timer. Nothing here fails; references to unknown
//! players are ignored and reported through `bool` returns.

use crate::combat::{self, KillEvent};
use crate::config::{kit_by_name, LobbyConfig, Role};
use crate::entity::{Entities, Npc, Player};
use crate::mode::{respawn_player, GameState};
use crate::physics;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{InputCommand, KillFeedEntry, ModeKind, RoundPhase, Snapshot};

/// What the account layer hands over when a player enters a lobby.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinRequest {
    pub name: String,
    pub kit: String,
    pub role: Role,
}

impl JoinRequest {
    pub fn new(name: impl Into<String>, kit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kit: kit.into(),
            role: Role::User,
        }
    }
}

pub struct Lobby {
    pub id: u32,
    pub config: LobbyConfig,
    pub entities: Entities,
    pub game: GameState,
    pub tick: u64,
    rng: StdRng,
    kill_events: Vec<KillEvent>,
    recent_kills: Vec<KillFeedEntry>,
}

impl Lobby {
    pub fn new(id: u32, mode: ModeKind, map: usize, config: LobbyConfig) -> Self {
        Self::with_rng(id, mode, map, config, StdRng::from_entropy())
    }

    /// Deterministic lobby for tests and replays.
    pub fn with_seed(id: u32, mode: ModeKind, map: usize, config: LobbyConfig, seed: u64) -> Self {
        Self::with_rng(id, mode, map, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(id: u32, mode: ModeKind, map: usize, config: LobbyConfig, mut rng: StdRng) -> Self {
        let mut entities = Entities::default();
        let mut game = GameState::new(mode, map, &config);
        game.reset(mode, map, &mut entities, &config, &mut rng);
        info!("Lobby {} created: {} on map {}", id, mode.name(), game.map);

        Self {
            id,
            config,
            entities,
            game,
            tick: 0,
            rng,
            kill_events: Vec::new(),
            recent_kills: Vec::new(),
        }
    }

    pub fn player_count(&self) -> usize {
        self.entities.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.player_count() >= self.config.max_players
    }

    pub fn is_empty(&self) -> bool {
        self.entities.players.is_empty()
    }

    /// Adds a player under connection id `id`. Fails if the id is taken or
    /// the lobby is full.
    pub fn add_player(&mut self, id: u32, request: JoinRequest) -> bool {
        if self.entities.players.contains_key(&id) || self.is_full() {
            return false;
        }

        let kit = kit_by_name(&request.kit);
        let mut player = Player::new(id, request.name, kit, request.role);
        player.faction = self.game.faction_for_join(&self.entities);
        if self.game.sits_out_join(&self.entities) {
            player.eliminated = true;
            debug!("Player {} sits out the running zombie round", id);
        } else if self.game.kind() == ModeKind::Zombies {
            player.lives = self.config.zombie_lives;
        }
        respawn_player(
            &mut player,
            self.game.walls(),
            self.config.invulnerability_ticks,
            &mut self.rng,
        );

        info!(
            "Player {} ({}) joined lobby {} as {:?} with {}",
            id, player.name, self.id, player.faction, kit.name
        );
        self.entities.players.insert(id, player);
        true
    }

    pub fn remove_player(&mut self, id: u32) -> bool {
        let Some(player) = self.entities.players.remove(&id) else {
            debug!("Lobby {}: remove for unknown player {}", self.id, id);
            return false;
        };
        self.entities.remove_sentries_of(id);
        self.game
            .on_leave(id, player.body.center(), &mut self.entities, &mut self.rng);
        info!("Player {} ({}) left lobby {}", id, player.name, self.id);
        true
    }

    /// Stores the latest command for `id`; it is read on the next tick.
    pub fn apply_input(&mut self, id: u32, command: InputCommand) -> bool {
        match self.entities.players.get_mut(&id) {
            Some(player) => {
                player.input = command;
                true
            }
            None => {
                debug!("Lobby {}: input for unknown player {}", self.id, id);
                false
            }
        }
    }

    pub fn cast_vote(&mut self, id: u32, mode: &str, map: usize) -> bool {
        self.entities.players.contains_key(&id) && self.game.cast_vote(id, mode, map)
    }

    /// Admin toggle for wall clipping.
    pub fn set_noclip(&mut self, id: u32, enabled: bool) -> bool {
        match self.entities.players.get_mut(&id) {
            Some(player) => {
                player.noclip = enabled;
                true
            }
            None => false,
        }
    }

    /// Drops a training dummy at `(x, y)`. Dummies live until shot down or
    /// the next reset.
    pub fn spawn_dummy(&mut self, x: f32, y: f32) -> u32 {
        let id = self.entities.add_npc(|id| Npc::dummy(id, x, y));
        debug!("Lobby {}: dummy {} at ({:.0}, {:.0})", self.id, id, x, y);
        id
    }

    /// Forces a new round immediately.
    pub fn reset(&mut self, mode: ModeKind, map: usize) {
        self.game
            .reset(mode, map, &mut self.entities, &self.config, &mut self.rng);
        self.recent_kills.clear();
    }

    pub fn tick(&mut self) {
        self.tick += 1;
        self.recent_kills.clear();

        self.game
            .pre_physics(&mut self.entities, &self.config, &mut self.rng);
        let walls = self.game.walls();
        physics::step_all(&mut self.entities, walls);

        if self.game.phase == RoundPhase::Active {
            let rules = self.game.rules();
            let deaths = combat::run(&mut self.entities, walls, &rules, &mut self.rng);
            if !deaths.is_empty() {
                let events =
                    self.game
                        .handle_deaths(deaths, &mut self.entities, &self.config, &mut self.rng);
                self.recent_kills
                    .extend(events.iter().map(|event| KillFeedEntry {
                        killer: event.killer_name.clone(),
                        victim: event.victim_name.clone(),
                    }));
                self.kill_events.extend(events);
            }
            self.game.post_physics(&mut self.entities);
        }

        if let Some(phase) =
            self.game
                .advance_phase(&mut self.entities, &self.config, &mut self.rng)
        {
            debug!("Lobby {} entered {:?} at tick {}", self.id, phase, self.tick);
        }
    }

    /// Reward events accumulated since the last call.
    pub fn take_kill_events(&mut self) -> Vec<KillEvent> {
        std::mem::take(&mut self.kill_events)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.tick,
            lobby: self.id,
            mode: self.game.kind(),
            phase: self.game.phase,
            timer: self.game.timer,
            map: self.game.map,
            team_scores: self.game.team_scores,
            walls: self.game.walls().to_vec(),
            players: self.entities.players.values().map(Player::view).collect(),
            npcs: self.entities.npcs.values().map(Npc::view).collect(),
            bullets: self.entities.bullets.iter().map(|b| b.view()).collect(),
            objective: self.game.objective_view(&self.entities),
            kills: self.recent_kills.clone(),
        }
    }
}
