use crate::config::{MapDef, FLAG_CAPTURE_RADIUS, FLAG_PICKUP_RADIUS};
use crate::entity::Entities;
use log::{debug, info};
use shared::geometry::distance;
use shared::{Faction, FlagView, TeamScores};

#[derive(Debug, Clone, PartialEq)]
pub struct Flag {
    /// Team that owns the flag and defends its base.
    pub team: Faction,
    pub x: f32,
    pub y: f32,
    pub base: (f32, f32),
    pub carrier: Option<u32>,
}

impl Flag {
    fn at_base(team: Faction, base: (f32, f32)) -> Self {
        Self {
            team,
            x: base.0,
            y: base.1,
            base,
            carrier: None,
        }
    }

    fn return_home(&mut self) {
        self.x = self.base.0;
        self.y = self.base.1;
        self.carrier = None;
    }

    pub fn view(&self) -> FlagView {
        FlagView {
            team: self.team,
            x: self.x,
            y: self.y,
            base_x: self.base.0,
            base_y: self.base.1,
            carrier: self.carrier,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Flags {
    pub flags: [Flag; 2],
}

impl Flags {
    pub fn new(map: &MapDef) -> Self {
        Self {
            flags: [
                Flag::at_base(Faction::Red, map.red_base),
                Flag::at_base(Faction::Blue, map.blue_base),
            ],
        }
    }

    fn base_of(&self, team: Faction) -> Option<(f32, f32)> {
        self.flags.iter().find(|f| f.team == team).map(|f| f.base)
    }

    /// Moves carried flags with their carriers, resolves captures and lets
    /// enemies pick up loose flags. Returns the teams that captured.
    pub fn update(&mut self, entities: &mut Entities, scores: &mut TeamScores) -> Vec<Faction> {
        let bases = [
            (Faction::Red, self.base_of(Faction::Red)),
            (Faction::Blue, self.base_of(Faction::Blue)),
        ];
        let mut captures = Vec::new();

        for flag in self.flags.iter_mut() {
            if let Some(carrier_id) = flag.carrier {
                let Some(carrier) = entities
                    .players
                    .get_mut(&carrier_id)
                    .filter(|p| p.is_alive())
                else {
                    flag.carrier = None;
                    continue;
                };

                let (cx, cy) = carrier.body.center();
                flag.x = cx;
                flag.y = cy;

                let home = bases
                    .iter()
                    .find(|(team, _)| *team == carrier.faction)
                    .and_then(|(_, base)| *base);
                if let Some((bx, by)) = home {
                    if distance(cx, cy, bx, by) <= FLAG_CAPTURE_RADIUS {
                        scores.add(carrier.faction, 1);
                        carrier.stats.score += 1;
                        captures.push(carrier.faction);
                        info!("{} captured the {:?} flag", carrier.name, flag.team);
                        flag.return_home();
                    }
                }
                continue;
            }

            let picker = entities.players.values().find(|p| {
                let (cx, cy) = p.body.center();
                p.is_alive()
                    && matches!(p.faction, Faction::Red | Faction::Blue)
                    && p.faction != flag.team
                    && distance(cx, cy, flag.x, flag.y) <= FLAG_PICKUP_RADIUS
            });
            if let Some(player) = picker {
                debug!("{} picked up the {:?} flag", player.name, flag.team);
                flag.carrier = Some(player.id);
            }
        }
        captures
    }

    /// Drops whatever `player` carries at `(x, y)`. The flag stays there
    /// until somebody picks it up again.
    pub fn drop_carried_by(&mut self, player: u32, x: f32, y: f32) -> bool {
        let mut dropped = false;
        for flag in self.flags.iter_mut().filter(|f| f.carrier == Some(player)) {
            flag.carrier = None;
            flag.x = x;
            flag.y = y;
            dropped = true;
        }
        dropped
    }

    pub fn view(&self) -> Vec<FlagView> {
        self.flags.iter().map(Flag::view).collect()
    }
}
