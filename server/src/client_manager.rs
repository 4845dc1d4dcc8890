//! Connection tracking for the UDP front end.
//!
//! Handles the server-side bookkeeping for connected clients:
//! - Connection lifecycle (connect, disconnect, timeout)
//! - Which lobby each client plays in
//! - Input acknowledgement so clients can see what the server has applied
//!
//! Simulation state lives in the lobbies; this module only knows addresses,
//! ids and sequence numbers.

use log::{debug, info};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Silence after which a client is dropped.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected client and its acknowledgement state.
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier, also used as the player id in its lobby
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Lobby the client's player lives in
    pub lobby: u32,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Highest input sequence number applied so far
    pub last_processed_input: u32,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr, lobby: u32) -> Self {
        Self {
            id,
            addr,
            lobby,
            last_seen: Instant::now(),
            last_processed_input: 0,
        }
    }

    /// Records an input sequence number. Returns false for a packet older
    /// than one already applied, which arrived out of order.
    pub fn accept_sequence(&mut self, sequence: u32) -> bool {
        self.last_seen = Instant::now();
        if sequence < self.last_processed_input {
            return false;
        }
        self.last_processed_input = sequence;
        true
    }

    /// Returns true if nothing arrived from this client within `timeout`.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// All connected clients, with a global capacity limit.
pub struct ClientManager {
    clients: HashMap<u32, Client>,
    next_client_id: u32,
    max_clients: usize,
}

impl ClientManager {
    /// Client ids start at 1 and are never reused.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a client in `lobby`. Returns `None` when the server is at
    /// capacity.
    pub fn add_client(&mut self, addr: SocketAddr, lobby: u32) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!(
            "Client {} connected from {} into lobby {}",
            client_id, addr, lobby
        );
        self.clients
            .insert(client_id, Client::new(client_id, addr, lobby));
        Some(client_id)
    }

    /// Removes a client and hands back its record so the caller can clean
    /// up the lobby side.
    pub fn remove_client(&mut self, client_id: &u32) -> Option<Client> {
        let client = self.clients.remove(client_id)?;
        info!("Client {} disconnected", client.id);
        Some(client)
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn lobby_of(&self, client_id: u32) -> Option<u32> {
        self.clients.get(&client_id).map(|client| client.lobby)
    }

    /// Marks activity from a client without an input.
    pub fn touch(&mut self, client_id: u32) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Acknowledges an input and returns the lobby it should be applied to.
    /// Unknown clients and stale sequence numbers yield `None`.
    pub fn accept_input(&mut self, client_id: u32, sequence: u32) -> Option<u32> {
        let client = self.clients.get_mut(&client_id)?;
        if !client.accept_sequence(sequence) {
            debug!(
                "Dropping stale input {} from client {} (at {})",
                sequence, client_id, client.last_processed_input
            );
            return None;
        }
        Some(client.lobby)
    }

    /// Last applied input sequence for every client in `lobby`.
    pub fn get_last_processed_inputs(&self, lobby: u32) -> HashMap<u32, u32> {
        self.clients
            .values()
            .filter(|client| client.lobby == lobby)
            .map(|client| (client.id, client.last_processed_input))
            .collect()
    }

    /// Drops every client silent for longer than [`CLIENT_TIMEOUT`] and
    /// returns `(client_id, lobby)` pairs for the lobby-side cleanup.
    pub fn check_timeouts(&mut self) -> Vec<(u32, u32)> {
        let timed_out: Vec<(u32, u32)> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(CLIENT_TIMEOUT))
            .map(|client| (client.id, client.lobby))
            .collect();

        for (client_id, _) in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    /// Addresses of every client in `lobby`, for snapshot broadcast.
    pub fn get_lobby_addrs(&self, lobby: u32) -> Vec<(u32, SocketAddr)> {
        self.clients
            .values()
            .filter(|client| client.lobby == lobby)
            .map(|client| (client.id, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
