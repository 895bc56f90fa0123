use std::collections::HashMap;
use std::time::Instant;

use super::transport::PeerHandle;

#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub peer: PeerHandle,
    pub identity: u32,
    pub name: String,
    pub nickname: Option<String>,
    pub announced: bool,
    pub connected_at: Instant,
}

impl PeerRecord {
    pub fn new(peer: PeerHandle, identity: u32, name: String) -> Self {
        Self {
            peer,
            identity,
            name,
            nickname: None,
            announced: false,
            connected_at: Instant::now(),
        }
    }

    /// Nickname when known, otherwise the derived peer name.
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.name)
    }

    /// Records the nickname from an init update. Returns true exactly once,
    /// the first time a non-empty nickname is known.
    pub fn observe_nickname(&mut self, nickname: &str) -> bool {
        if !nickname.is_empty() {
            self.nickname = Some(nickname.to_string());
        }
        if !self.announced && self.nickname.is_some() {
            self.announced = true;
            return true;
        }
        false
    }
}

#[derive(Debug)]
pub struct PeerRegistry {
    peers: HashMap<PeerHandle, PeerRecord>,
    peers_by_name: HashMap<String, PeerHandle>,
    max_peers: usize,
}

impl PeerRegistry {
    pub fn new(max_peers: usize) -> Self {
        Self {
            peers: HashMap::new(),
            peers_by_name: HashMap::new(),
            max_peers,
        }
    }

    pub fn register(&mut self, record: PeerRecord) -> Result<&mut PeerRecord, &'static str> {
        if self.peers.contains_key(&record.peer) {
            return Err("Peer already registered");
        }
        if self.peers.len() >= self.max_peers {
            return Err("Session full");
        }

        let peer = record.peer;
        self.peers_by_name.insert(record.name.clone(), peer);
        Ok(self.peers.entry(peer).or_insert(record))
    }

    pub fn get(&self, peer: PeerHandle) -> Option<&PeerRecord> {
        self.peers.get(&peer)
    }

    pub fn get_mut(&mut self, peer: PeerHandle) -> Option<&mut PeerRecord> {
        self.peers.get_mut(&peer)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&PeerRecord> {
        self.peers_by_name
            .get(name)
            .and_then(|peer| self.peers.get(peer))
    }

    pub fn remove(&mut self, peer: PeerHandle) -> Option<PeerRecord> {
        let record = self.peers.remove(&peer)?;
        self.peers_by_name.remove(&record.name);
        Some(record)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerRecord> {
        self.peers.values()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut peers = PeerRegistry::new(4);
        peers
            .register(PeerRecord::new(10, 1, "FRIEND_1".into()))
            .unwrap();

        assert_eq!(peers.get(10).map(|p| p.identity), Some(1));
        assert_eq!(peers.get_by_name("FRIEND_1").map(|p| p.peer), Some(10));
        assert!(peers.get_by_name("FRIEND_2").is_none());
    }

    #[test]
    fn test_register_rejects_duplicates_and_overflow() {
        let mut peers = PeerRegistry::new(1);
        peers.register(PeerRecord::new(1, 1, "FRIEND_1".into())).unwrap();
        assert!(peers.register(PeerRecord::new(1, 2, "FRIEND_2".into())).is_err());
        assert!(peers.register(PeerRecord::new(2, 2, "FRIEND_2".into())).is_err());
        assert_eq!(peers.len(), 1);
    }

    #[test]
    fn test_remove_clears_name_index() {
        let mut peers = PeerRegistry::new(4);
        peers.register(PeerRecord::new(7, 3, "FRIEND_3".into())).unwrap();

        let removed = peers.remove(7).unwrap();
        assert_eq!(removed.name, "FRIEND_3");
        assert!(peers.get_by_name("FRIEND_3").is_none());
        assert!(peers.is_empty());
    }

    #[test]
    fn test_nickname_announced_once() {
        let mut record = PeerRecord::new(1, 1, "FRIEND_1".into());
        assert_eq!(record.display_name(), "FRIEND_1");

        assert!(!record.observe_nickname(""));
        assert!(record.observe_nickname("Lester"));
        assert!(!record.observe_nickname("Lester"));
        assert!(!record.observe_nickname("Gorn"));
        assert_eq!(record.display_name(), "Gorn");
    }
}
