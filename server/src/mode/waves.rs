use crate::entity::{Entities, Npc, NpcKind};
use crate::spawn::{find_spawn, SpawnRegion};
use log::info;
use rand::Rng;
use shared::geometry::distance;
use shared::{Faction, Rect};

pub fn wave_size(wave: u32) -> u32 {
    5 + wave * 2
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Waves {
    /// Last wave started; zero before the first one.
    pub wave: u32,
    pub lost: bool,
}

impl Waves {
    /// Starts the next wave once the previous one is cleared. Nothing spawns
    /// while no human is alive or after the round is lost.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        entities: &mut Entities,
        walls: &[Rect],
        rng: &mut R,
    ) -> Option<u32> {
        if self.lost || entities.zombie_count() > 0 || !any_living_human(entities) {
            return None;
        }

        self.wave += 1;
        let wave = self.wave;
        let count = wave_size(wave);
        for _ in 0..count {
            let (x, y) = find_spawn(SpawnRegion::Perimeter, walls, rng);
            entities.add_npc(|id| Npc::zombie(id, x, y, wave));
        }
        info!("Wave {} started with {} zombies", wave, count);
        Some(wave)
    }

    /// Points every zombie at the nearest living human.
    pub fn steer(entities: &mut Entities) {
        let humans: Vec<(f32, f32)> = entities
            .players
            .values()
            .filter(|p| p.is_alive() && p.faction == Faction::Human)
            .map(|p| p.body.center())
            .collect();

        for npc in entities.npcs.values_mut() {
            let NpcKind::Zombie { speed, .. } = npc.kind else {
                continue;
            };
            let (zx, zy) = npc.body.center();
            let target = humans
                .iter()
                .map(|&(hx, hy)| (distance(zx, zy, hx, hy), hx, hy))
                .min_by(|a, b| a.0.total_cmp(&b.0));

            match target {
                Some((dist, hx, hy)) if dist > 0.0 => {
                    npc.body.vx = (hx - zx) / dist * speed;
                    npc.body.vy = (hy - zy) / dist * speed;
                }
                _ => npc.body.stop(),
            }
        }
    }

    /// Marks the round lost once every human is eliminated. Returns true on
    /// the tick the loss happens.
    pub fn check_loss(&mut self, entities: &Entities) -> bool {
        if self.lost {
            return false;
        }
        let mut humans = entities
            .players
            .values()
            .filter(|p| p.faction == Faction::Human)
            .peekable();
        if humans.peek().is_none() {
            return false;
        }
        if humans.all(|p| p.eliminated) {
            self.lost = true;
            info!("All humans eliminated on wave {}", self.wave);
            return true;
        }
        false
    }
}

fn any_living_human(entities: &Entities) -> bool {
    entities
        .players
        .values()
        .any(|p| p.is_alive() && p.faction == Faction::Human)
}
