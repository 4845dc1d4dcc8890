use crate::entity::Entities;
use shared::{point_in_rect, Faction, Rect, TeamScores};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub struct Hill {
    pub area: Rect,
    /// Team that held a strict majority on the last tick.
    pub controlling: Option<Faction>,
}

impl Hill {
    pub fn new(area: Rect) -> Self {
        Self {
            area,
            controlling: None,
        }
    }

    /// Counts living occupants by centre point and awards one point to a
    /// strict majority. Returns the team that scored.
    pub fn update(&mut self, entities: &Entities, scores: &mut TeamScores) -> Option<Faction> {
        let mut red = 0;
        let mut blue = 0;
        for player in entities.players.values().filter(|p| p.is_alive()) {
            let (cx, cy) = player.body.center();
            if !point_in_rect(cx, cy, &self.area) {
                continue;
            }
            match player.faction {
                Faction::Red => red += 1,
                Faction::Blue => blue += 1,
                _ => {}
            }
        }

        self.controlling = match red.cmp(&blue) {
            Ordering::Greater => Some(Faction::Red),
            Ordering::Less => Some(Faction::Blue),
            Ordering::Equal => None,
        };
        if let Some(team) = self.controlling {
            scores.add(team, 1);
        }
        self.controlling
    }
}
