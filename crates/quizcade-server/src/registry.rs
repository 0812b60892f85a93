use std::collections::HashMap;

use rand::Rng;
use uuid::Uuid;

use quizcade_common::room::Room;

pub const CODE_LENGTH: usize = 6;
const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Owns every live room, keyed by join code. Codes are unique among live
/// rooms; collisions are regenerated, not assumed away.
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    pub fn create_room(&mut self, leader_id: Uuid, leader_name: String) -> String {
        let code = self.fresh_code();
        self.rooms
            .insert(code.clone(), Room::new(code.clone(), leader_id, leader_name));
        code
    }

    fn fresh_code(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let code: String = (0..CODE_LENGTH)
                .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
                .collect();
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }

    pub fn get_room(&self, code: &str) -> Option<&Room> {
        self.rooms.get(code)
    }

    pub fn get_room_mut(&mut self, code: &str) -> Option<&mut Room> {
        self.rooms.get_mut(code)
    }

    /// Called only once a room's player set is empty.
    pub fn remove_room(&mut self, code: &str) -> Option<Room> {
        self.rooms.remove(code)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_codes_are_unique_and_well_formed() {
        let mut registry = RoomRegistry::new();
        let mut codes = HashSet::new();
        for i in 0..200 {
            let code = registry.create_room(Uuid::new_v4(), format!("P{i}"));
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
            assert!(codes.insert(code));
        }
        assert_eq!(registry.room_count(), 200);
    }

    #[test]
    fn test_created_room_is_retrievable() {
        let mut registry = RoomRegistry::new();
        let leader = Uuid::new_v4();
        let code = registry.create_room(leader, "Ann".into());
        let room = registry.get_room(&code).unwrap();
        assert_eq!(room.leader_id, leader);
        assert_eq!(room.code, code);
    }

    #[test]
    fn test_removed_room_is_gone() {
        let mut registry = RoomRegistry::new();
        let code = registry.create_room(Uuid::new_v4(), "Ann".into());
        assert!(registry.remove_room(&code).is_some());
        assert!(registry.get_room(&code).is_none());
        assert_eq!(registry.room_count(), 0);
    }
}
