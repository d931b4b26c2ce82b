//! cluster config schema, loader, and startup validation (§6, §10). Malformed or
//! inconsistent config is fatal before any worker spawns.

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{CoordinatorError, Result};
use crate::task::SatId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SatelliteConfig {
    pub id: SatId,
    pub ip_address: IpAddr,
    /// `[left_id, right_id]`
    pub connections: [SatId; 2],
    pub initial_angle: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// which row of `satellites` this process is; the CLI's `--satellite-id`
    /// overrides this for running several nodes off one shared config file
    /// during local testing (§10).
    pub self_id: SatId,
    pub altitude: f64,
    pub ground_station_ip: IpAddr,
    pub ground_station_port: u16,
    pub satellites: Vec<SatelliteConfig>,
    /// enables the legacy UDP datagram companion on the LEFT port (§6); absent
    /// or `false` in production configs, kept around only for bootstrap/test
    /// traffic that predates the TCP framing.
    #[serde(default)]
    pub enable_legacy_udp: bool,
}

impl ClusterConfig {
    /// every id referenced by a `connections` pair must name a known satellite;
    /// `altitude` must be positive; `self_id` must appear in `satellites`.
    pub fn validate(&self, self_id: SatId) -> Result<()> {
        if self.altitude <= 0.0 {
            return Err(CoordinatorError::ConfigValidationError(format!(
                "altitude must be > 0, got {}",
                self.altitude
            )));
        }
        let known: HashSet<SatId> = self.satellites.iter().map(|s| s.id).collect();
        if !known.contains(&self_id) {
            return Err(CoordinatorError::ConfigValidationError(format!(
                "self id {} not present in satellites list",
                self_id
            )));
        }
        for sat in &self.satellites {
            for &conn in &sat.connections {
                if !known.contains(&conn) {
                    return Err(CoordinatorError::ConfigValidationError(format!(
                        "satellite {} references unknown connection {}",
                        sat.id, conn
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn satellite(&self, id: SatId) -> Option<&SatelliteConfig> {
        self.satellites.iter().find(|s| s.id == id)
    }

    /// the ring of known satellite ids in the order they appear in the config file
    /// - the insertion order the orbital priority-list arithmetic walks over.
    pub fn ring(&self) -> Vec<SatId> {
        self.satellites.iter().map(|s| s.id).collect()
    }

    pub fn initial_angles(&self) -> std::collections::HashMap<SatId, f64> {
        self.satellites.iter().map(|s| (s.id, s.initial_angle)).collect()
    }
}

/// reads `path`, dispatching on extension: `.json` deserialises as JSON, anything
/// else is assumed to be RON.
pub fn load(path: &Path) -> Result<ClusterConfig> {
    let contents = std::fs::read_to_string(path)?;
    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    let cfg: ClusterConfig = if is_json {
        serde_json::from_str(&contents)
            .map_err(|e| CoordinatorError::ConfigParseError(e.to_string()))?
    } else {
        ron::from_str(&contents).map_err(|e| CoordinatorError::ConfigParseError(e.to_string()))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ClusterConfig {
        ClusterConfig {
            self_id: 1,
            altitude: 500_000.0,
            ground_station_ip: "127.0.0.1".parse().unwrap(),
            ground_station_port: 9000,
            enable_legacy_udp: false,
            satellites: vec![
                SatelliteConfig { id: 1, ip_address: "127.0.0.1".parse().unwrap(), connections: [3, 2], initial_angle: 0.0 },
                SatelliteConfig { id: 2, ip_address: "127.0.0.1".parse().unwrap(), connections: [1, 3], initial_angle: 1.0 },
                SatelliteConfig { id: 3, ip_address: "127.0.0.1".parse().unwrap(), connections: [2, 1], initial_angle: 2.0 },
            ],
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(sample().validate(1).is_ok());
    }

    #[test]
    fn unknown_self_id_fails() {
        assert!(sample().validate(99).is_err());
    }

    #[test]
    fn negative_altitude_fails() {
        let mut cfg = sample();
        cfg.altitude = -1.0;
        assert!(cfg.validate(1).is_err());
    }

    #[test]
    fn dangling_connection_fails() {
        let mut cfg = sample();
        cfg.satellites[0].connections = [3, 42];
        assert!(cfg.validate(1).is_err());
    }
}
