//! Player profile: skills, inventory, coins and unlocks.
//!
//! This is the server's own implementation of the quest collaborator
//! traits. Skills follow the RuneScape experience curve.

use std::collections::HashMap;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::quest::api::{ExperienceGain, InventoryQuery, PlayerStats, RewardSink};

/// Maximum skill level
pub const MAX_LEVEL: i32 = 99;

/// Default number of inventory slots
pub const DEFAULT_INVENTORY_SIZE: usize = 28;

/// Calculate total XP required to reach a level using RuneScape formula.
/// Level 1 = 0 XP, Level 2 = 83 XP, Level 99 = 13,034,431 XP
pub fn total_xp_for_level(level: i32) -> i64 {
    if level <= 1 {
        return 0;
    }
    let mut total = 0.0;
    for l in 1..level {
        total += (l as f64 + 300.0 * 2.0_f64.powf(l as f64 / 7.0)) / 4.0;
    }
    total.floor() as i64
}

/// Calculate level from total XP (inverse of total_xp_for_level)
pub fn level_for_xp(xp: i64) -> i32 {
    let mut low = 1;
    let mut high = MAX_LEVEL;

    while low < high {
        let mid = (low + high + 1) / 2;
        if total_xp_for_level(mid) <= xp {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    low
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub level: i32,
    pub xp: i64,
}

impl Skill {
    /// Create a skill at the given level with the matching XP
    pub fn new(level: i32) -> Self {
        Self {
            level: level.min(MAX_LEVEL),
            xp: total_xp_for_level(level),
        }
    }

    /// Add XP, returning the new level if it went up
    pub fn add_xp(&mut self, amount: i64) -> Option<i32> {
        self.xp = (self.xp + amount).max(0);
        let new_level = level_for_xp(self.xp).min(MAX_LEVEL);

        if new_level > self.level {
            self.level = new_level;
            Some(new_level)
        } else {
            None
        }
    }

    /// XP needed to reach next level
    pub fn xp_to_next_level(&self) -> i64 {
        if self.level >= MAX_LEVEL {
            return 0;
        }
        total_xp_for_level(self.level + 1) - self.xp
    }
}

impl Default for Skill {
    fn default() -> Self {
        Self::new(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySlot {
    pub item_id: String,
    pub quantity: u32,
}

/// Fixed-size inventory; each item id stacks in a single slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    pub slots: Vec<Option<InventorySlot>>,
}

impl Inventory {
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![None; size],
        }
    }

    pub fn count(&self, item_id: &str) -> u32 {
        self.slots
            .iter()
            .flatten()
            .filter(|slot| slot.item_id == item_id)
            .map(|slot| slot.quantity)
            .sum()
    }

    pub fn has(&self, item_id: &str, quantity: u32) -> bool {
        self.count(item_id) >= quantity
    }

    /// Add items, stacking onto an existing slot or taking an empty one.
    /// Returns false and changes nothing if there is no room.
    pub fn add_item(&mut self, item_id: &str, quantity: u32) -> bool {
        if quantity == 0 {
            return true;
        }

        if let Some(slot) = self
            .slots
            .iter_mut()
            .flatten()
            .find(|slot| slot.item_id == item_id)
        {
            slot.quantity = slot.quantity.saturating_add(quantity);
            return true;
        }

        match self.slots.iter_mut().find(|slot| slot.is_none()) {
            Some(empty) => {
                *empty = Some(InventorySlot {
                    item_id: item_id.to_string(),
                    quantity,
                });
                true
            }
            None => false,
        }
    }

    /// Remove items; returns false and changes nothing if there aren't enough
    pub fn remove_item(&mut self, item_id: &str, quantity: u32) -> bool {
        if !self.has(item_id, quantity) {
            return false;
        }

        let mut remaining = quantity;
        for slot in &mut self.slots {
            if remaining == 0 {
                break;
            }
            if let Some(inv_slot) = slot {
                if inv_slot.item_id == item_id {
                    let take = remaining.min(inv_slot.quantity);
                    inv_slot.quantity -= take;
                    remaining -= take;
                    if inv_slot.quantity == 0 {
                        *slot = None;
                    }
                }
            }
        }
        true
    }

    pub fn free_slots(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_none()).count()
    }
}

/// Everything the server tracks about a player besides quest progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub skills: HashMap<String, Skill>,
    pub inventory: Inventory,
    pub coins: i64,
    pub unlocks: IndexSet<String>,
}

impl PlayerProfile {
    pub fn new(inventory_size: usize) -> Self {
        Self {
            skills: HashMap::new(),
            inventory: Inventory::new(inventory_size),
            coins: 0,
            unlocks: IndexSet::new(),
        }
    }

    /// Skills the player has never trained are level 1
    pub fn level(&self, skill: &str) -> i32 {
        self.skills.get(skill).map(|s| s.level).unwrap_or(1)
    }

    pub fn set_skill_level(&mut self, skill: &str, level: i32) {
        let mut entry = Skill::new(level.max(1));
        entry.level = level.min(MAX_LEVEL);
        self.skills.insert(skill.to_string(), entry);
    }
}

impl Default for PlayerProfile {
    fn default() -> Self {
        Self::new(DEFAULT_INVENTORY_SIZE)
    }
}

impl PlayerStats for PlayerProfile {
    fn skill_level(&self, skill: &str) -> Option<i32> {
        Some(self.level(skill))
    }
}

impl InventoryQuery for PlayerProfile {
    fn has_item(&self, item_id: &str, quantity: u32) -> bool {
        self.inventory.has(item_id, quantity)
    }
}

impl RewardSink for PlayerProfile {
    fn grant_item(&mut self, item_id: &str, quantity: u32) -> bool {
        self.inventory.add_item(item_id, quantity)
    }

    fn add_experience(&mut self, skill: &str, amount: i64) -> ExperienceGain {
        let new_level = self
            .skills
            .entry(skill.to_string())
            .or_default()
            .add_xp(amount);
        ExperienceGain { new_level }
    }

    fn add_money(&mut self, amount: i64) {
        self.coins = self.coins.saturating_add(amount);
    }

    fn unlock_access(&mut self, unlock_id: &str) {
        self.unlocks.insert(unlock_id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xp_table() {
        assert_eq!(total_xp_for_level(1), 0);
        assert_eq!(total_xp_for_level(2), 83);
        assert!(total_xp_for_level(10) > 1000);
        assert!(total_xp_for_level(99) > 13_000_000);
    }

    #[test]
    fn test_level_for_xp() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(82), 1);
        assert_eq!(level_for_xp(83), 2);
        assert_eq!(level_for_xp(300), 4);

        for level in 1..=99 {
            assert_eq!(level_for_xp(total_xp_for_level(level)), level);
        }
    }

    #[test]
    fn test_skill_add_xp() {
        let mut skill = Skill::new(1);
        assert_eq!(skill.add_xp(50), None);
        assert_eq!(skill.add_xp(50), Some(2));
        assert_eq!(skill.level, 2);
        assert_eq!(skill.xp_to_next_level(), total_xp_for_level(3) - 100);
    }

    #[test]
    fn test_inventory_stacks_by_item() {
        let mut inventory = Inventory::new(2);
        assert!(inventory.add_item("egg", 1));
        assert!(inventory.add_item("egg", 2));
        assert_eq!(inventory.count("egg"), 3);
        assert_eq!(inventory.free_slots(), 1);

        assert!(inventory.add_item("pot_of_flour", 1));
        assert!(!inventory.add_item("bucket_of_milk", 1));
        assert!(!inventory.has("bucket_of_milk", 1));
    }

    #[test]
    fn test_inventory_remove() {
        let mut inventory = Inventory::new(4);
        inventory.add_item("egg", 2);
        assert!(!inventory.remove_item("egg", 3));
        assert!(inventory.remove_item("egg", 2));
        assert_eq!(inventory.count("egg"), 0);
        assert_eq!(inventory.free_slots(), 4);
    }

    #[test]
    fn test_untrained_skill_is_level_one() {
        let mut profile = PlayerProfile::default();
        assert_eq!(profile.skill_level("cooking"), Some(1));

        let gain = profile.add_experience("cooking", 300);
        assert_eq!(gain.new_level, Some(4));
        assert_eq!(profile.skill_level("cooking"), Some(4));
    }

    #[test]
    fn test_set_skill_level_allows_zero() {
        let mut profile = PlayerProfile::default();
        profile.set_skill_level("crafting", 0);
        assert_eq!(profile.level("crafting"), 0);
    }
}
