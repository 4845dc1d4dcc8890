//! Performance benchmarks for critical simulation systems

use rand::rngs::StdRng;
use rand::SeedableRng;
use server::config::{kit_by_name, LobbyConfig, Role, MAPS};
use server::entity::Player;
use server::lobby::{JoinRequest, Lobby};
use server::physics;
use server::spawn::{find_spawn, SpawnRegion};
use shared::{InputCommand, ModeKind};
use std::time::Instant;

fn busy_lobby(mode: ModeKind, players: u32) -> Lobby {
    let mut lobby = Lobby::with_seed(0, mode, 0, LobbyConfig::default(), 42);
    let kits = ["soldier", "shotgun", "sniper", "medic"];
    for id in 1..=players {
        lobby.add_player(
            id,
            JoinRequest::new(format!("bot{}", id), kits[id as usize % kits.len()]),
        );
    }
    lobby
}

fn bot_input(tick: u32, id: u32) -> InputCommand {
    let phase = tick / 30 + id;
    InputCommand {
        up: phase % 4 == 0,
        down: phase % 4 == 2,
        left: phase % 3 == 0,
        right: phase % 3 == 1,
        angle: tick as f32 * 0.03 + id as f32,
        shoot: true,
        dash: tick % 120 == id,
        parry: tick % 200 == id,
        place_sentry: tick == id,
        ..Default::default()
    }
}

/// Benchmarks player movement against map walls
#[test]
fn benchmark_wall_collision() {
    let walls = MAPS[0].walls;
    let mut player = Player::new(1, "runner".to_string(), kit_by_name("soldier"), Role::User);
    player.respawn_at(150.0, 150.0, 0);
    player.input = InputCommand {
        right: true,
        down: true,
        ..Default::default()
    };

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        if i % 500 == 0 {
            player.respawn_at(150.0, 150.0, 0);
        }
        physics::step_player(&mut player, walls);
    }

    let duration = start.elapsed();
    println!(
        "Wall collision: {} steps in {:?} ({:.2} ns/step)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks spawn point search on the most crowded map
#[test]
fn benchmark_spawn_search() {
    let mut rng = StdRng::seed_from_u64(9);
    let walls = MAPS[0].walls;

    let iterations = 10_000;
    let start = Instant::now();

    for i in 0..iterations {
        let region = if i % 3 == 0 {
            SpawnRegion::Anywhere
        } else {
            SpawnRegion::Perimeter
        };
        let _ = find_spawn(region, walls, &mut rng);
    }

    let duration = start.elapsed();
    println!(
        "Spawn search: {} searches in {:?} ({:.2} μs/search)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks a full free-for-all lobby tick with everyone firing
#[test]
fn benchmark_full_lobby_tick() {
    let mut lobby = busy_lobby(ModeKind::FreeForAll, 16);

    let ticks = 600;
    let start = Instant::now();

    for tick in 0..ticks {
        for id in 1..=16 {
            lobby.apply_input(id, bot_input(tick, id));
        }
        lobby.tick();
    }

    let duration = start.elapsed();
    println!(
        "Lobby tick (16 players): {} ticks in {:?} ({:.2} μs/tick)",
        ticks,
        duration,
        duration.as_micros() as f64 / ticks as f64
    );

    // Ten seconds of game time should simulate well under real time
    assert!(duration.as_millis() < 10_000);
    assert_eq!(lobby.tick, ticks as u64);
}

/// Stress tests zombie waves chasing a full lobby
#[test]
fn stress_test_zombie_waves() {
    let mut lobby = busy_lobby(ModeKind::Zombies, 8);

    let ticks = 1200;
    let start = Instant::now();
    let mut peak_npcs = 0;

    for tick in 0..ticks {
        for id in 1..=8 {
            lobby.apply_input(id, bot_input(tick, id));
        }
        lobby.tick();
        peak_npcs = peak_npcs.max(lobby.entities.npcs.len());
    }

    let duration = start.elapsed();
    println!(
        "Zombie waves: {} ticks in {:?}, peak {} NPCs",
        ticks, duration, peak_npcs
    );

    assert!(peak_npcs > 0);
    assert!(duration.as_millis() < 10_000);
}

/// Benchmarks snapshot serialization for a crowded lobby
#[test]
fn benchmark_snapshot_serialization() {
    use bincode::{deserialize, serialize};
    use shared::Packet;
    use std::collections::HashMap;

    let mut lobby = busy_lobby(ModeKind::CaptureTheFlag, 16);
    for tick in 0..30 {
        for id in 1..=16 {
            lobby.apply_input(id, bot_input(tick, id));
        }
        lobby.tick();
    }

    let last_processed_input: HashMap<u32, u32> = (1..=16).map(|id| (id, id * 10)).collect();
    let packet = Packet::Snapshot {
        last_processed_input,
        snapshot: lobby.snapshot(),
    };

    let iterations = 2_000;
    let start = Instant::now();
    let mut size = 0;

    for _ in 0..iterations {
        let serialized = serialize(&packet).unwrap();
        size = serialized.len();
        let _deserialized: Packet = deserialize(&serialized).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Snapshot serialization: {} iterations in {:?} ({:.2} μs/iter, {} bytes)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64,
        size
    );

    // Must fit in a single UDP datagram
    assert!(size < 65_000);
    assert!(duration.as_millis() < 5000);
}
