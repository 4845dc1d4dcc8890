//! Movement integration, friction and wall response.
//!
//! Wall response is deliberately soft: an overlapping entity is pushed back
//! along its own last displacement (amplified by [`PUSH_BACK`]) and stopped,
//! once per overlapping wall. It re-converges over a couple of ticks instead
//! of computing an exact minimum translation.

use crate::entity::{Body, Entities, Grapple, Npc, NpcKind, Player};
use shared::{
    point_in_rect, rects_intersect, Rect, DASH_COOLDOWN, DASH_IMPULSE, FRICTION,
    GRAPPLE_MAX_PULL_DISTANCE, GRAPPLE_MAX_SPEED, GRAPPLE_PULL, GRAPPLE_RELEASE_DISTANCE,
    MAX_WALK_SPEED, MOVE_ACCEL, PUSH_BACK,
};

/// Advances every player and NPC by one tick and drops expired sentries.
pub fn step_all(entities: &mut Entities, walls: &[Rect]) {
    for player in entities.players.values_mut() {
        step_player(player, walls);
    }
    for npc in entities.npcs.values_mut() {
        step_npc(npc, walls);
    }
    entities.npcs.retain(|_, npc| !npc.expired());
}

pub fn step_player(player: &mut Player, walls: &[Rect]) {
    if !player.is_alive() {
        player.tick_timers();
        return;
    }

    apply_intent(player, walls);
    let delta = integrate(&mut player.body);
    apply_friction(&mut player.body);
    player.tick_timers();
    if player.grapple.active {
        pull_towards_anchor(&mut player.body, &mut player.grapple);
    }
    if !player.noclip {
        resolve_walls(&mut player.body, delta, walls);
    }
}

pub fn step_npc(npc: &mut Npc, walls: &[Rect]) {
    if let NpcKind::Sentry {
        cooldown, lifetime, ..
    } = &mut npc.kind
    {
        *cooldown = cooldown.saturating_sub(1);
        *lifetime = lifetime.saturating_sub(1);
        return;
    }

    let delta = integrate(&mut npc.body);
    apply_friction(&mut npc.body);
    resolve_walls(&mut npc.body, delta, walls);
}

/// Turns the player's pending input into velocity. Returns true if a dash
/// fired this tick.
pub fn apply_intent(player: &mut Player, walls: &[Rect]) -> bool {
    let input = player.input;
    player.angle = input.angle;

    if input.grapple {
        if !player.grapple.active
            && walls
                .iter()
                .any(|wall| point_in_rect(input.target_x, input.target_y, wall))
        {
            player.grapple.attach(input.target_x, input.target_y);
        }
    } else {
        player.grapple.release();
    }

    let mut dx: f32 = 0.0;
    let mut dy: f32 = 0.0;
    if input.up {
        dy -= 1.0;
    }
    if input.down {
        dy += 1.0;
    }
    if input.left {
        dx -= 1.0;
    }
    if input.right {
        dx += 1.0;
    }
    let len = (dx * dx + dy * dy).sqrt();
    if len > 0.0 {
        dx /= len;
        dy /= len;
    }

    if input.dash && player.timers.dash == 0 {
        let (ix, iy) = if len > 0.0 {
            (dx, dy)
        } else {
            (player.angle.cos(), player.angle.sin())
        };
        player.body.vx = ix * DASH_IMPULSE;
        player.body.vy = iy * DASH_IMPULSE;
        player.timers.dash = DASH_COOLDOWN;
        return true;
    }

    if len == 0.0 {
        return false;
    }

    let multiplier = player.kit.speed;
    let before = player.body.speed();
    player.body.vx += dx * MOVE_ACCEL * multiplier;
    player.body.vy += dy * MOVE_ACCEL * multiplier;

    // Intent may steer existing momentum but never push past walking speed.
    let limit = before.max(MAX_WALK_SPEED * multiplier);
    let after = player.body.speed();
    if after > limit {
        let scale = limit / after;
        player.body.vx *= scale;
        player.body.vy *= scale;
    }
    false
}

/// Moves the body by its velocity and returns the displacement applied.
pub fn integrate(body: &mut Body) -> (f32, f32) {
    body.x += body.vx;
    body.y += body.vy;
    (body.vx, body.vy)
}

pub fn apply_friction(body: &mut Body) {
    body.vx *= FRICTION;
    body.vy *= FRICTION;
}

pub fn pull_towards_anchor(body: &mut Body, grapple: &mut Grapple) {
    let (cx, cy) = body.center();
    let dx = grapple.x - cx;
    let dy = grapple.y - cy;
    let dist = (dx * dx + dy * dy).sqrt();

    if dist <= GRAPPLE_RELEASE_DISTANCE {
        grapple.release();
        return;
    }

    let force = dist.min(GRAPPLE_MAX_PULL_DISTANCE) * GRAPPLE_PULL;
    body.vx += dx / dist * force;
    body.vy += dy / dist * force;

    let speed = body.speed();
    if speed > GRAPPLE_MAX_SPEED {
        let scale = GRAPPLE_MAX_SPEED / speed;
        body.vx *= scale;
        body.vy *= scale;
    }
}

/// Pushes the body back along `delta` once per overlapping wall and stops it.
/// Returns true if any wall was hit.
pub fn resolve_walls(body: &mut Body, delta: (f32, f32), walls: &[Rect]) -> bool {
    let mut hit = false;
    for wall in walls {
        if rects_intersect(&body.rect(), wall) {
            body.x -= delta.0 * PUSH_BACK;
            body.y -= delta.1 * PUSH_BACK;
            hit = true;
        }
    }
    if hit {
        body.stop();
    }
    hit
}
