//! Integration tests for lobby simulation and the UDP front end
//!
//! These tests drive whole lobbies through the public API and exercise the
//! server over real sockets.

use assert_approx_eq::assert_approx_eq;
use bincode::{deserialize, serialize};
use rand::rngs::StdRng;
use rand::SeedableRng;
use server::combat::Death;
use server::config::{LobbyConfig, ServerSettings, JUGGERNAUT_KIT, MAPS};
use server::entity::EntityRef;
use server::lobby::{JoinRequest, Lobby};
use server::mode::ModeState;
use shared::{
    Faction, InputCommand, ModeKind, ObjectiveView, Packet, RoundPhase, PROTOCOL_VERSION,
};

fn lobby_with(mode: ModeKind, config: LobbyConfig, players: u32) -> Lobby {
    let mut lobby = Lobby::with_seed(0, mode, 0, config, 7);
    for id in 1..=players {
        assert!(lobby.add_player(id, JoinRequest::new(format!("p{}", id), "soldier")));
    }
    lobby
}

fn place(lobby: &mut Lobby, id: u32, cx: f32, cy: f32) {
    let player = lobby.entities.players.get_mut(&id).unwrap();
    player.body.x = cx - player.body.w / 2.0;
    player.body.y = cy - player.body.h / 2.0;
}

/// ROUND LIFECYCLE TESTS
mod lifecycle_tests {
    use super::*;

    fn short_rounds() -> LobbyConfig {
        LobbyConfig {
            round_ticks: 3,
            round_end_ticks: 2,
            vote_ticks: 2,
            ..LobbyConfig::default()
        }
    }

    /// A round runs out, voting opens, and the winning ballot starts the next round
    #[test]
    fn round_end_vote_and_reset() {
        let mut lobby = lobby_with(ModeKind::FreeForAll, short_rounds(), 2);
        assert!(!lobby.cast_vote(1, "ctf", 1));

        for _ in 0..3 {
            lobby.tick();
        }
        assert_eq!(lobby.game.phase, RoundPhase::RoundEnd);

        for _ in 0..2 {
            lobby.tick();
        }
        assert_eq!(lobby.game.phase, RoundPhase::Vote);
        assert!(lobby.cast_vote(1, "ctf", 1));
        assert!(lobby.cast_vote(2, "capture-the-flag", 1));

        for _ in 0..2 {
            lobby.tick();
        }
        assert_eq!(lobby.game.phase, RoundPhase::Active);
        assert_eq!(lobby.game.kind(), ModeKind::CaptureTheFlag);
        assert_eq!(lobby.game.map, 1);
        assert_eq!(lobby.game.walls(), MAPS[1].walls);
        assert_ne!(lobby.game.walls(), MAPS[0].walls);
        assert_eq!(lobby.snapshot().walls, MAPS[1].walls.to_vec());
        assert_eq!(lobby.game.timer, 3);

        let factions: Vec<Faction> = lobby.entities.players.values().map(|p| p.faction).collect();
        assert_eq!(factions, vec![Faction::Red, Faction::Blue]);
        assert!(lobby
            .entities
            .players
            .values()
            .all(|p| p.is_alive() && p.stats.kills == 0));
    }

    /// Forcing a reset clears projectiles and NPCs and keeps everyone in play
    #[test]
    fn forced_reset_clears_world() {
        let mut lobby = lobby_with(ModeKind::FreeForAll, LobbyConfig::default(), 3);
        lobby.spawn_dummy(800.0, 800.0);
        place(&mut lobby, 1, 300.0, 1100.0);
        place(&mut lobby, 2, 300.0, 100.0);
        place(&mut lobby, 3, 1400.0, 100.0);
        lobby.apply_input(
            1,
            InputCommand {
                shoot: true,
                ..Default::default()
            },
        );
        lobby.tick();
        assert!(!lobby.entities.bullets.is_empty());

        lobby.reset(ModeKind::TeamDeathmatch, 2);

        assert!(lobby.entities.bullets.is_empty());
        assert!(lobby.entities.npcs.is_empty());
        assert_eq!(lobby.player_count(), 3);
        assert_eq!(lobby.game.kind(), ModeKind::TeamDeathmatch);
        assert_eq!(lobby.game.map, 2);
        assert_eq!(lobby.game.walls(), MAPS[2].walls);
        assert_eq!(lobby.snapshot().team_scores.red, 0);
    }
}

/// GAME MODE TESTS
mod mode_tests {
    use super::*;

    /// Three red players against one blue player on the hill scores red
    #[test]
    fn hill_majority_scores_for_red() {
        let mut lobby = lobby_with(ModeKind::KingOfTheHill, LobbyConfig::default(), 4);
        for (id, faction) in [
            (1, Faction::Red),
            (2, Faction::Red),
            (3, Faction::Red),
            (4, Faction::Blue),
        ] {
            lobby.entities.players.get_mut(&id).unwrap().faction = faction;
        }
        for (id, cx) in [(1, 680.0), (2, 720.0), (3, 760.0), (4, 800.0)] {
            place(&mut lobby, id, cx, 760.0);
        }

        lobby.tick();

        assert_eq!(lobby.game.team_scores.red, 1);
        assert_eq!(lobby.game.team_scores.blue, 0);
        match lobby.snapshot().objective {
            ObjectiveView::Hill { controlling, .. } => {
                assert_eq!(controlling, Some(Faction::Red))
            }
            other => panic!("Unexpected objective: {:?}", other),
        }
    }

    /// A carrier killed outside capture range drops the flag where they fell
    #[test]
    fn flag_drops_at_carrier_death_point() {
        let mut lobby = lobby_with(ModeKind::CaptureTheFlag, LobbyConfig::default(), 2);
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(lobby.entities.players[&1].faction, Faction::Red);

        place(&mut lobby, 1, 150.0, 700.0);
        if let ModeState::CaptureTheFlag(flags) = &mut lobby.game.mode {
            let blue = &mut flags.flags[1];
            assert_eq!(blue.team, Faction::Blue);
            blue.carrier = Some(1);
            blue.x = 150.0;
            blue.y = 700.0;
        }

        lobby.entities.players.get_mut(&1).unwrap().kill();
        lobby.game.handle_deaths(
            vec![Death {
                victim: EntityRef::Player(1),
                killer: Some(2),
                x: 150.0,
                y: 700.0,
            }],
            &mut lobby.entities,
            &lobby.config,
            &mut rng,
        );
        lobby.tick();

        let ModeState::CaptureTheFlag(flags) = &lobby.game.mode else {
            panic!("mode changed");
        };
        let blue = &flags.flags[1];
        assert_eq!(blue.carrier, None);
        assert_approx_eq!(blue.x, 150.0);
        assert_approx_eq!(blue.y, 700.0);
        assert_eq!(lobby.game.team_scores.red, 0);
    }

    /// Killing the juggernaut hands the role to the killer
    #[test]
    fn juggernaut_role_passes_to_killer() {
        let mut lobby = lobby_with(ModeKind::Juggernaut, LobbyConfig::default(), 3);
        let mut rng = StdRng::seed_from_u64(11);
        lobby.tick();

        let holder = match &lobby.game.mode {
            ModeState::Juggernaut(role) => role.player.unwrap(),
            _ => panic!("not a juggernaut round"),
        };
        let killer = if holder == 1 { 2 } else { 1 };

        lobby.entities.players.get_mut(&holder).unwrap().kill();
        let events = lobby.game.handle_deaths(
            vec![Death {
                victim: EntityRef::Player(holder),
                killer: Some(killer),
                x: 0.0,
                y: 0.0,
            }],
            &mut lobby.entities,
            &lobby.config,
            &mut rng,
        );

        assert_eq!(events.len(), 1);
        assert!(events[0].coins > 0);
        assert_eq!(lobby.entities.players[&killer].faction, Faction::Juggernaut);
        assert_eq!(lobby.entities.players[&killer].kit.name, JUGGERNAUT_KIT);
        assert_eq!(lobby.entities.players[&holder].faction, Faction::Hunter);
        assert!(matches!(
            lobby.snapshot().objective,
            ObjectiveView::Juggernaut { player: Some(p) } if p == killer
        ));
    }

    /// Losing the last human life ends the round on the next tick
    #[test]
    fn zombies_round_ends_when_humans_are_eliminated() {
        let config = LobbyConfig {
            zombie_lives: 1,
            ..LobbyConfig::default()
        };
        let mut lobby = lobby_with(ModeKind::Zombies, config, 1);
        let mut rng = StdRng::seed_from_u64(5);
        lobby.tick();
        assert!(lobby.entities.zombie_count() > 0);

        lobby.entities.players.get_mut(&1).unwrap().kill();
        lobby.game.handle_deaths(
            vec![Death {
                victim: EntityRef::Player(1),
                killer: None,
                x: 0.0,
                y: 0.0,
            }],
            &mut lobby.entities,
            &lobby.config,
            &mut rng,
        );
        assert!(lobby.entities.players[&1].eliminated);
        assert_eq!(lobby.game.timer, 0);

        lobby.tick();
        assert_eq!(lobby.game.phase, RoundPhase::RoundEnd);
        assert!(!lobby.entities.players[&1].is_alive());
    }
}

/// SIMULATION STRESS TESTS
mod stress_tests {
    use super::*;

    /// Health stays within bounds through a sustained firefight
    #[test]
    fn health_stays_bounded_under_fire() {
        let mut lobby = lobby_with(ModeKind::FreeForAll, LobbyConfig::default(), 4);
        let positions = [(700.0, 1050.0), (900.0, 1050.0), (700.0, 1150.0), (900.0, 1150.0)];
        for (index, &(cx, cy)) in positions.iter().enumerate() {
            place(&mut lobby, index as u32 + 1, cx, cy);
        }
        lobby.spawn_dummy(780.0, 1080.0);

        for tick in 0..300u32 {
            for id in 1..=4u32 {
                lobby.apply_input(
                    id,
                    InputCommand {
                        shoot: true,
                        angle: (tick as f32 * 0.05) + id as f32 * 1.5,
                        reload: tick % 97 == 0,
                        ..Default::default()
                    },
                );
            }
            lobby.tick();

            for player in lobby.entities.players.values() {
                assert!(player.body.hp >= 0.0);
                assert!(player.body.hp <= player.body.max_hp);
            }
            for npc in lobby.entities.npcs.values() {
                assert!(npc.body.hp >= 0.0);
                assert!(npc.body.hp <= npc.body.max_hp);
            }
        }

        let total_kills: u32 = lobby
            .entities
            .players
            .values()
            .map(|p| p.stats.kills)
            .sum();
        let total_deaths: u32 = lobby
            .entities
            .players
            .values()
            .map(|p| p.stats.deaths)
            .sum();
        assert!(total_kills <= total_deaths + 1);
    }
}

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;
    use server::network::Server;
    use std::time::Duration;
    use tokio::net::UdpSocket;

    /// A full lobby snapshot survives the wire format
    #[test]
    fn snapshot_serialization_roundtrip() {
        let mut lobby = lobby_with(ModeKind::CaptureTheFlag, LobbyConfig::default(), 3);
        lobby.spawn_dummy(400.0, 400.0);
        lobby.tick();

        let packet = Packet::Snapshot {
            last_processed_input: [(1, 4), (2, 9)].into_iter().collect(),
            snapshot: lobby.snapshot(),
        };
        let bytes = serialize(&packet).unwrap();

        match deserialize::<Packet>(&bytes).unwrap() {
            Packet::Snapshot {
                last_processed_input,
                snapshot,
            } => {
                assert_eq!(last_processed_input.get(&2), Some(&9));
                assert_eq!(snapshot.tick, 1);
                assert_eq!(snapshot.mode, ModeKind::CaptureTheFlag);
                assert_eq!(snapshot.players.len(), 3);
                assert_eq!(snapshot.npcs.len(), 1);
            }
            other => panic!("Unexpected packet: {:?}", other),
        }
    }

    /// A client connects over UDP, sends input, and sees it acknowledged
    #[tokio::test]
    async fn client_joins_and_receives_snapshots() {
        let settings = ServerSettings {
            lobby_count: 2,
            ..Default::default()
        };
        let mut server = tokio_test::assert_ok!(Server::new("127.0.0.1:0", settings).await);
        let server_addr = server.local_addr().unwrap();

        let client = async move {
            let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

            // Garbage must be ignored without disturbing the server
            socket.send_to(&[0xff, 0x13, 0x37], server_addr).await.unwrap();

            let connect = Packet::Connect {
                client_version: PROTOCOL_VERSION,
                name: "tester".to_string(),
                kit: "sniper".to_string(),
                lobby: Some(1),
            };
            socket
                .send_to(&serialize(&connect).unwrap(), server_addr)
                .await
                .unwrap();

            let mut buf = vec![0u8; 65536];
            let (client_id, lobby) = loop {
                let (len, _) = socket.recv_from(&mut buf).await.unwrap();
                if let Ok(Packet::Connected { client_id, lobby }) = deserialize(&buf[..len]) {
                    break (client_id, lobby);
                }
            };
            assert_eq!(lobby, 1);

            let input = Packet::Input {
                sequence: 1,
                timestamp: 0,
                command: InputCommand {
                    right: true,
                    ..Default::default()
                },
            };
            socket
                .send_to(&serialize(&input).unwrap(), server_addr)
                .await
                .unwrap();

            loop {
                let (len, _) = socket.recv_from(&mut buf).await.unwrap();
                if let Ok(Packet::Snapshot {
                    last_processed_input,
                    snapshot,
                }) = deserialize(&buf[..len])
                {
                    if last_processed_input.get(&client_id) == Some(&1) {
                        return (client_id, snapshot);
                    }
                }
            }
        };

        let (client_id, snapshot) = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::select! {
                result = server.run() => panic!("server stopped: {:?}", result.err()),
                outcome = client => outcome,
            }
        })
        .await
        .expect("no acknowledged snapshot within timeout");

        assert_eq!(snapshot.lobby, 1);
        assert_eq!(snapshot.players.len(), 1);
        assert_eq!(snapshot.players[0].id, client_id);
        assert_eq!(snapshot.players[0].name, "tester");
    }
}
