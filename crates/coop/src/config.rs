use glam::Vec3;
use serde::Deserialize;

pub const DEFAULT_BROADCAST_RADIUS: f32 = 4500.0;

/// An actor whose hp is pinned to a sentinel by scripted content. Matching
/// actors skip hp replication while the sentinel holds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HpSyncException {
    pub object_name: String,
    pub hp: i32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SafeZone {
    pub center: Vec3,
    #[serde(default = "default_safe_zone_radius")]
    pub radius: f32,
}

fn default_safe_zone_radius() -> f32 {
    500.0
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub broadcast_radius: f32,
    /// Generic actor mirrors are destroyed beyond this multiple of the radius.
    pub destroy_radius_factor: f32,
    pub position_threshold: f32,
    pub heading_threshold: f32,
    pub teleport_threshold: f32,
    pub hand_debounce_ms: u64,
    pub time_sync_interval_ms: u64,
    pub visible_refresh_ms: u64,
    pub unique_name_refresh_ms: u64,
    pub max_pending_animations: usize,
    pub safe_zone: Option<SafeZone>,
    pub hp_sync_exceptions: Vec<HpSyncException>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            broadcast_radius: DEFAULT_BROADCAST_RADIUS,
            destroy_radius_factor: 1.5,
            position_threshold: 5.0,
            heading_threshold: 3.0,
            teleport_threshold: 200.0,
            hand_debounce_ms: 250,
            time_sync_interval_ms: 60_000,
            visible_refresh_ms: 500,
            unique_name_refresh_ms: 1000,
            max_pending_animations: 8,
            safe_zone: None,
            hp_sync_exceptions: vec![HpSyncException {
                object_name: "BDT_50011_Addon_Raven".into(),
                hp: 100_000,
            }],
        }
    }
}

impl SyncConfig {
    pub fn destroy_radius(&self) -> f32 {
        self.broadcast_radius * self.destroy_radius_factor
    }

    pub fn in_safe_zone(&self, position: Vec3) -> bool {
        self.safe_zone
            .as_ref()
            .is_some_and(|zone| zone.center.distance(position) < zone.radius)
    }

    pub fn skips_hp_sync(&self, object_name: &str, hp: i32) -> bool {
        self.hp_sync_exceptions
            .iter()
            .any(|e| e.hp == hp && e.object_name == object_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.broadcast_radius, 4500.0);
        assert_eq!(config.destroy_radius(), 6750.0);
        assert!(config.safe_zone.is_none());
        assert!(!config.in_safe_zone(Vec3::ZERO));
    }

    #[test]
    fn test_safe_zone_radius() {
        let config = SyncConfig {
            safe_zone: Some(SafeZone {
                center: Vec3::new(1000.0, 0.0, 1000.0),
                radius: 500.0,
            }),
            ..Default::default()
        };
        assert!(config.in_safe_zone(Vec3::new(1200.0, 0.0, 1200.0)));
        assert!(!config.in_safe_zone(Vec3::new(1600.0, 0.0, 1000.0)));
    }

    #[test]
    fn test_hp_exception_table() {
        let config = SyncConfig::default();
        assert!(config.skips_hp_sync("BDT_50011_Addon_Raven", 100_000));
        assert!(!config.skips_hp_sync("BDT_50011_Addon_Raven", 99_999));
        assert!(!config.skips_hp_sync("PC_HERO", 100_000));
    }
}
