use crate::config::juggernaut_kit;
use crate::entity::{Entities, Player};
use log::info;
use rand::seq::SliceRandom;
use rand::Rng;
use shared::Faction;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JuggernautRole {
    pub player: Option<u32>,
}

fn promote(player: &mut Player) {
    player.faction = Faction::Juggernaut;
    player.equip(juggernaut_kit());
    if player.is_alive() {
        player.body.hp = player.body.max_hp;
    }
}

fn demote(player: &mut Player) {
    player.faction = Faction::Hunter;
    player.equip(player.loadout);
}

impl JuggernautRole {
    /// Moves the role to `id`, restoring the previous holder's own kit.
    pub fn assign(&mut self, entities: &mut Entities, id: u32) -> bool {
        if !entities.players.contains_key(&id) {
            return false;
        }
        if let Some(previous) = self.player.filter(|&p| p != id) {
            if let Some(player) = entities.players.get_mut(&previous) {
                demote(player);
            }
            entities.retag_owned_by(previous, Faction::Hunter);
        }
        if let Some(player) = entities.players.get_mut(&id) {
            promote(player);
            info!("{} is now the juggernaut", player.name);
        }
        entities.retag_owned_by(id, Faction::Juggernaut);
        self.player = Some(id);
        true
    }

    /// Picks a random holder among everyone except `exclude`. Falls back to
    /// `exclude` itself when nobody else is present.
    pub fn assign_random<R: Rng + ?Sized>(
        &mut self,
        entities: &mut Entities,
        exclude: Option<u32>,
        rng: &mut R,
    ) -> Option<u32> {
        let candidates: Vec<u32> = entities
            .players
            .values()
            .filter(|p| Some(p.id) != exclude && !p.eliminated)
            .map(|p| p.id)
            .collect();

        let chosen = candidates
            .choose(rng)
            .copied()
            .or(exclude.filter(|id| entities.players.contains_key(id)));
        match chosen {
            Some(id) => {
                self.assign(entities, id);
            }
            None => self.player = None,
        }
        self.player
    }

    /// Re-fills the role if its holder is missing.
    pub fn ensure<R: Rng + ?Sized>(&mut self, entities: &mut Entities, rng: &mut R) {
        let held = self
            .player
            .map_or(false, |id| entities.players.contains_key(&id));
        if !held && !entities.players.is_empty() {
            self.player = None;
            self.assign_random(entities, None, rng);
        }
    }

    /// The juggernaut died: whoever killed them inherits the role, otherwise
    /// it goes to a random player.
    pub fn on_death<R: Rng + ?Sized>(
        &mut self,
        victim: u32,
        killer: Option<u32>,
        entities: &mut Entities,
        rng: &mut R,
    ) {
        if self.player != Some(victim) {
            return;
        }
        match killer.filter(|&k| k != victim && entities.players.contains_key(&k)) {
            Some(killer) => {
                self.assign(entities, killer);
            }
            None => {
                self.assign_random(entities, Some(victim), rng);
            }
        }
    }

    /// The holder disconnected; their record is already gone.
    pub fn on_leave<R: Rng + ?Sized>(&mut self, id: u32, entities: &mut Entities, rng: &mut R) {
        if self.player == Some(id) {
            self.player = None;
            self.assign_random(entities, None, rng);
        }
    }
}
