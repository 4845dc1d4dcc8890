//! Server network layer handling UDP communications and the lobby tick loop

use crate::client_manager::ClientManager;
use crate::combat::KillEvent;
use crate::config::{Role, ServerSettings};
use crate::lobby::{JoinRequest, Lobby};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{InputCommand, Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

const MAX_NAME_LEN: usize = 16;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: u32, lobby: u32 },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    BroadcastPacket { packet: Packet, lobby: u32 },
}

/// Picks the requested lobby when it has room, otherwise the emptiest one.
pub fn choose_lobby(lobbies: &[Lobby], requested: Option<u32>) -> Option<usize> {
    if let Some(index) = requested.map(|id| id as usize) {
        if lobbies.get(index).map_or(false, |lobby| !lobby.is_full()) {
            return Some(index);
        }
    }
    lobbies
        .iter()
        .enumerate()
        .filter(|(_, lobby)| !lobby.is_full())
        .min_by_key(|(_, lobby)| lobby.player_count())
        .map(|(index, _)| index)
}

/// Trims and bounds a display name, inventing one when it is blank.
pub fn sanitize_name(name: &str, client_id: u32) -> String {
    let trimmed: String = name.trim().chars().take(MAX_NAME_LEN).collect();
    if trimmed.is_empty() {
        format!("Player{}", client_id)
    } else {
        trimmed
    }
}

/// Coarse clamping of client-supplied floats.
pub fn sanitize_command(mut command: InputCommand) -> InputCommand {
    if !command.angle.is_finite() {
        command.angle = 0.0;
    }
    if !command.target_x.is_finite() || !command.target_y.is_finite() {
        command.target_x = 0.0;
        command.target_y = 0.0;
        command.grapple = false;
    }
    command
}

/// Main server coordinating networking and every lobby's simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    lobbies: Vec<Lobby>,
    tick_duration: Duration,
    tick: u64,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        settings: ServerSettings,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let lobbies = (0..settings.lobby_count.max(1))
            .map(|id| Lobby::new(id, settings.mode, settings.map, settings.lobby))
            .collect();

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(settings.max_clients))),
            lobbies,
            tick_duration: settings.tick_duration,
            tick: 0,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn lobbies(&self) -> &[Lobby] {
        &self.lobbies
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, lobby } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_lobby_addrs(lobby)
                        };

                        for (client_id, addr) in client_addrs {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for (client_id, lobby) in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id, lobby })
                    {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, lobby: u32) {
        if let Err(e) = self.game_tx.send(GameMessage::BroadcastPacket { packet, lobby }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    async fn client_for(&self, addr: SocketAddr) -> Option<u32> {
        let clients = self.clients.read().await;
        clients.find_client_by_addr(addr)
    }

    /// Removes a client from the manager and its player from the lobby.
    async fn drop_client(&mut self, client_id: u32) {
        let removed = {
            let mut clients = self.clients.write().await;
            clients.remove_client(&client_id)
        };
        if let Some(client) = removed {
            self.remove_from_lobby(client_id, client.lobby);
        }
    }

    fn remove_from_lobby(&mut self, client_id: u32, lobby: u32) {
        match self.lobbies.get_mut(lobby as usize) {
            Some(lobby) => {
                lobby.remove_player(client_id);
            }
            None => debug!("Client {} referenced missing lobby {}", client_id, lobby),
        }
    }

    /// Processes incoming packets and routes them to lobbies
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                name,
                kit,
                lobby,
            } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    self.send_packet(
                        Packet::Disconnected {
                            reason: "Protocol version mismatch".to_string(),
                        },
                        addr,
                    );
                    return;
                }

                // Remove existing connection if present
                if let Some(existing_id) = self.client_for(addr).await {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    self.drop_client(existing_id).await;
                }

                let Some(index) = choose_lobby(&self.lobbies, lobby) else {
                    self.send_packet(
                        Packet::Disconnected {
                            reason: "Server full".to_string(),
                        },
                        addr,
                    );
                    return;
                };
                let lobby_id = self.lobbies[index].id;

                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr, lobby_id)
                };
                let Some(client_id) = client_id else {
                    self.send_packet(
                        Packet::Disconnected {
                            reason: "Server full".to_string(),
                        },
                        addr,
                    );
                    return;
                };

                let request = JoinRequest {
                    name: sanitize_name(&name, client_id),
                    kit,
                    role: Role::User,
                };
                if self.lobbies[index].add_player(client_id, request) {
                    self.send_packet(
                        Packet::Connected {
                            client_id,
                            lobby: lobby_id,
                        },
                        addr,
                    );
                } else {
                    let mut clients = self.clients.write().await;
                    clients.remove_client(&client_id);
                    drop(clients);
                    self.send_packet(
                        Packet::Disconnected {
                            reason: "Lobby full".to_string(),
                        },
                        addr,
                    );
                }
            }

            Packet::Input {
                sequence, command, ..
            } => {
                let Some(client_id) = self.client_for(addr).await else {
                    return;
                };
                let lobby = {
                    let mut clients = self.clients.write().await;
                    clients.accept_input(client_id, sequence)
                };
                if let Some(lobby) = lobby.and_then(|id| self.lobbies.get_mut(id as usize)) {
                    lobby.apply_input(client_id, sanitize_command(command));
                }
            }

            Packet::Vote { mode, map } => {
                let Some(client_id) = self.client_for(addr).await else {
                    return;
                };
                let lobby = {
                    let mut clients = self.clients.write().await;
                    clients.touch(client_id);
                    clients.lobby_of(client_id)
                };
                if let Some(lobby) = lobby.and_then(|id| self.lobbies.get_mut(id as usize)) {
                    if !lobby.cast_vote(client_id, &mode, map) {
                        debug!("Vote from client {} ignored outside voting", client_id);
                    }
                }
            }

            Packet::Disconnect => {
                if let Some(client_id) = self.client_for(addr).await {
                    self.drop_client(client_id).await;
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    fn report_rewards(lobby: u32, events: Vec<KillEvent>) {
        for event in events {
            if let (Some(killer), Some(name)) = (event.killer, event.killer_name.as_ref()) {
                info!(
                    "Lobby {}: {} (#{}) killed {} (+{} coins, +{} xp)",
                    lobby, name, killer, event.victim_name, event.coins, event.xp
                );
            }
        }
    }

    /// Advances every lobby by one tick and broadcasts their snapshots
    async fn tick_lobbies(&mut self) {
        self.tick += 1;
        for lobby in self.lobbies.iter_mut() {
            lobby.tick();
            Self::report_rewards(lobby.id, lobby.take_kill_events());
        }

        for lobby in &self.lobbies {
            if lobby.is_empty() {
                continue;
            }
            let last_processed_input = {
                let clients = self.clients.read().await;
                clients.get_last_processed_inputs(lobby.id)
            };
            self.broadcast_packet(
                Packet::Snapshot {
                    last_processed_input,
                    snapshot: lobby.snapshot(),
                },
                lobby.id,
            );
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        let mut tick_interval = interval(self.tick_duration);

        info!(
            "Server started with {} lobbies at {:.1}Hz",
            self.lobbies.len(),
            1.0 / self.tick_duration.as_secs_f64()
        );

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id, lobby }) => {
                            self.remove_from_lobby(client_id, lobby);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    self.tick_lobbies().await;

                    // Periodic population report
                    if self.tick % 600 == 0 {
                        let client_count = {
                            let clients = self.clients.read().await;
                            clients.len()
                        };
                        if client_count > 0 {
                            debug!("Tick {}: {} clients across {} lobbies",
                                   self.tick, client_count, self.lobbies.len());
                        }
                    }
                },
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LobbyConfig;
    use shared::ModeKind;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
    }

    fn connect(name: &str, lobby: Option<u32>) -> Packet {
        Packet::Connect {
            client_version: PROTOCOL_VERSION,
            name: name.to_string(),
            kit: "soldier".to_string(),
            lobby,
        }
    }

    async fn test_server(lobby_count: u32) -> Server {
        let settings = ServerSettings {
            lobby_count,
            ..Default::default()
        };
        tokio_test::assert_ok!(Server::new("127.0.0.1:0", settings).await)
    }

    #[tokio::test]
    async fn test_server_creates_requested_lobbies() {
        let server = test_server(3).await;

        assert_eq!(server.lobbies().len(), 3);
        assert!(server.local_addr().unwrap().port() > 0);
        assert!(server
            .lobbies()
            .iter()
            .enumerate()
            .all(|(index, lobby)| lobby.id as usize == index && lobby.is_empty()));
    }

    #[test]
    fn test_client_timeout_message() {
        let msg = ServerMessage::ClientTimeout {
            client_id: 42,
            lobby: 1,
        };

        match msg {
            ServerMessage::ClientTimeout { client_id, lobby } => {
                assert_eq!(client_id, 42);
                assert_eq!(lobby, 1);
            }
            _ => panic!("Unexpected message type"),
        }
    }

    #[test]
    fn test_choose_lobby_prefers_request_then_emptiest() {
        let mut config = LobbyConfig::default();
        config.max_players = 1;
        let mut lobbies: Vec<Lobby> = (0..3)
            .map(|id| Lobby::with_seed(id, ModeKind::FreeForAll, 0, config, id as u64))
            .collect();

        assert_eq!(choose_lobby(&lobbies, Some(2)), Some(2));
        assert_eq!(choose_lobby(&lobbies, Some(9)), Some(0));

        lobbies[0].add_player(1, JoinRequest::new("a", "soldier"));
        assert_eq!(choose_lobby(&lobbies, Some(0)), Some(1));

        lobbies[1].add_player(2, JoinRequest::new("b", "soldier"));
        lobbies[2].add_player(3, JoinRequest::new("c", "soldier"));
        assert_eq!(choose_lobby(&lobbies, None), None);
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("  bob ", 1), "bob");
        assert_eq!(sanitize_name("", 7), "Player7");
        assert_eq!(sanitize_name(&"x".repeat(40), 1).len(), MAX_NAME_LEN);
    }

    #[test]
    fn test_sanitize_command_drops_non_finite() {
        let command = sanitize_command(InputCommand {
            angle: f32::NAN,
            grapple: true,
            target_x: f32::INFINITY,
            ..Default::default()
        });
        assert_eq!(command.angle, 0.0);
        assert!(!command.grapple);
    }

    #[tokio::test]
    async fn test_connect_joins_a_lobby() {
        let mut server = test_server(2).await;

        server.handle_packet(connect("alice", Some(1)), addr(9000)).await;

        assert_eq!(server.lobbies()[1].player_count(), 1);
        assert_eq!(server.clients.read().await.len(), 1);
        match server.game_rx.try_recv() {
            Ok(GameMessage::SendPacket {
                packet: Packet::Connected { client_id, lobby },
                ..
            }) => {
                assert_eq!(client_id, 1);
                assert_eq!(lobby, 1);
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_version_mismatch_is_rejected() {
        let mut server = test_server(1).await;
        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION + 1,
            name: "old".to_string(),
            kit: "soldier".to_string(),
            lobby: None,
        };

        server.handle_packet(packet, addr(9001)).await;

        assert!(server.lobbies()[0].is_empty());
        assert!(matches!(
            server.game_rx.try_recv(),
            Ok(GameMessage::SendPacket {
                packet: Packet::Disconnected { .. },
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_input_and_disconnect_route_to_lobby() {
        let mut server = test_server(1).await;
        server.handle_packet(connect("bob", None), addr(9002)).await;

        server
            .handle_packet(
                Packet::Input {
                    sequence: 3,
                    timestamp: 0,
                    command: InputCommand {
                        shoot: true,
                        ..Default::default()
                    },
                },
                addr(9002),
            )
            .await;
        assert!(server.lobbies()[0].entities.players[&1].input.shoot);

        server.handle_packet(Packet::Disconnect, addr(9002)).await;
        assert!(server.lobbies()[0].is_empty());
        assert!(server.clients.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_reconnect_from_same_address_replaces_player() {
        let mut server = test_server(1).await;
        server.handle_packet(connect("carol", None), addr(9003)).await;
        server.handle_packet(connect("carol", None), addr(9003)).await;

        let lobby = &server.lobbies()[0];
        assert_eq!(lobby.player_count(), 1);
        assert!(lobby.entities.players.contains_key(&2));
    }

    #[tokio::test]
    async fn test_tick_broadcasts_snapshot() {
        let mut server = test_server(1).await;
        server.handle_packet(connect("dave", None), addr(9004)).await;
        let _ = server.game_rx.try_recv();

        server.tick_lobbies().await;

        match server.game_rx.try_recv() {
            Ok(GameMessage::BroadcastPacket {
                packet: Packet::Snapshot { snapshot, .. },
                lobby,
            }) => {
                assert_eq!(lobby, 0);
                assert_eq!(snapshot.tick, 1);
                assert_eq!(snapshot.players.len(), 1);
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_packet_serialization_roundtrip() {
        let test_packets = vec![
            connect("eve", Some(0)),
            Packet::Connected {
                client_id: 42,
                lobby: 0,
            },
            Packet::Disconnect,
            Packet::Vote {
                mode: "ctf".to_string(),
                map: 1,
            },
            Packet::Disconnected {
                reason: "Test".to_string(),
            },
        ];

        for packet in test_packets {
            let serialized = serialize(&packet).unwrap();
            let deserialized: Packet = deserialize(&serialized).unwrap();

            match (&packet, &deserialized) {
                (Packet::Connect { .. }, Packet::Connect { .. }) => {}
                (Packet::Connected { .. }, Packet::Connected { .. }) => {}
                (Packet::Disconnect, Packet::Disconnect) => {}
                (Packet::Vote { .. }, Packet::Vote { .. }) => {}
                (Packet::Disconnected { .. }, Packet::Disconnected { .. }) => {}
                _ => panic!("Packet type mismatch after roundtrip"),
            }
        }
    }
}
