//! OrbitalOracle (§4.1): the single writer/many-reader angular model that
//! determines ground-closest satellite and routing priority.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use sat_common::geo_constants::{EARTH_MASS, GRAVITATIONAL_CONSTANT, MEAN_EARTH_RADIUS, TWO_PI};
use sat_common::{normalize_2pi, Cartesian2, PolarPos};

use crate::task::SatId;

/// one slot in [`OrbitalOracle::priority_list`]: either a known satellite or the
/// terminating ground sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityEntry {
    Sat(SatId),
    Ground,
}

struct Angular {
    angle: f64,
    /// completed full turns, tracked so `can_execute_mission` can compare against
    /// an unbounded target angle even though `angle` itself stays in `[0, 2*pi)`.
    revolutions: u64,
}

struct State {
    angles: HashMap<SatId, Angular>,
}

/// `orbitalPeriod = 2*pi*sqrt((R_earth+altitude)^3 / (M_earth*G))`, in seconds.
pub fn orbital_period(altitude: f64) -> f64 {
    let r = MEAN_EARTH_RADIUS + altitude;
    TWO_PI * (r.powi(3) / (EARTH_MASS * GRAVITATIONAL_CONSTANT)).sqrt()
}

pub struct OrbitalOracle {
    self_id: SatId,
    /// the ring of known satellites in insertion order; index in this vector is
    /// the "position" the priority-list arithmetic of §4.1 walks over.
    ring: Vec<SatId>,
    radius: f64,
    period: f64,
    ground: Cartesian2,
    state: RwLock<State>,
}

impl OrbitalOracle {
    pub fn new(self_id: SatId, ring: Vec<SatId>, altitude: f64, initial_angles: &HashMap<SatId, f64>) -> Self {
        let radius = MEAN_EARTH_RADIUS + altitude;
        let mut angles = HashMap::new();
        for &id in &ring {
            let a = initial_angles.get(&id).copied().unwrap_or(0.0);
            angles.insert(id, Angular { angle: normalize_2pi(a), revolutions: 0 });
        }
        OrbitalOracle {
            self_id,
            ring,
            radius,
            period: orbital_period(altitude),
            ground: Cartesian2::new(MEAN_EARTH_RADIUS, 0.0),
            state: RwLock::new(State { angles }),
        }
    }

    /// advances every known satellite's angle by `2*pi*dt/period`.
    pub fn tick(&self, dt: f64) {
        let delta = TWO_PI * dt / self.period;
        let mut st = self.state.write().expect("orbital state lock poisoned");
        for a in st.angles.values_mut() {
            let raw = a.angle + delta;
            a.revolutions += (raw / TWO_PI).floor() as u64;
            a.angle = normalize_2pi(raw);
        }
    }

    fn position_of(&self, id: SatId) -> Option<Cartesian2> {
        let st = self.state.read().expect("orbital state lock poisoned");
        st.angles.get(&id).map(|a| PolarPos::new(self.radius, a.angle).to_cartesian())
    }

    pub fn current_position(&self) -> Cartesian2 {
        self.position_of(self.self_id).expect("self id must be present in the ring")
    }

    /// the identifier minimising distance to the fixed ground-station position;
    /// ties favour the satellite earlier in ring-insertion order.
    pub fn sat_closest_to_ground(&self) -> SatId {
        let st = self.state.read().expect("orbital state lock poisoned");
        let mut best_id = self.ring[0];
        let mut best_dist = f64::INFINITY;
        for &id in &self.ring {
            let a = &st.angles[&id];
            let pos = PolarPos::new(self.radius, a.angle).to_cartesian();
            let dist = pos.distance(&self.ground);
            if dist < best_dist {
                best_dist = dist;
                best_id = id;
            }
        }
        best_id
    }

    fn ring_pos(&self, id: SatId) -> usize {
        self.ring.iter().position(|&x| x == id).expect("id must be a ring member")
    }

    /// `min(|dst-src| mod N, N - |dst-src| mod N)` over ring positions.
    pub fn path_hops(&self, src: SatId, dst: SatId) -> u32 {
        let n = self.ring.len() as i64;
        let a = self.ring_pos(src) as i64;
        let b = self.ring_pos(dst) as i64;
        let d = (b - a).rem_euclid(n);
        d.min(n - d) as u32
    }

    /// see §4.1: walk outward from self in both ring directions, appending the
    /// nearer-to-`closest` neighbour first at each step, until the ground-closest
    /// satellite itself is reached, then terminate with the GROUND sentinel.
    pub fn priority_list(&self) -> Vec<PriorityEntry> {
        let n = self.ring.len() as i64;
        let self_pos = self.ring_pos(self.self_id) as i64;
        let closest = self.sat_closest_to_ground();

        let mut out = vec![PriorityEntry::Sat(self.self_id)];
        if closest == self.self_id {
            out.push(PriorityEntry::Ground);
            return out;
        }
        let closest_pos = self.ring_pos(closest) as i64;

        let mut seen: HashSet<SatId> = HashSet::new();
        seen.insert(self.self_id);

        let max_i = ((n as f64) / 2.0).ceil() as i64;
        for i in 1..=max_i {
            let plus_id = self.ring[(self_pos + i).rem_euclid(n) as usize];
            let minus_id = self.ring[(self_pos - i).rem_euclid(n) as usize];

            let cw = n - ((self_pos + i) - closest_pos).abs();
            let ccw = (closest_pos - (self_pos - i)).abs();
            let order = if cw <= ccw { [plus_id, minus_id] } else { [minus_id, plus_id] };

            for id in order {
                if seen.contains(&id) {
                    continue;
                }
                seen.insert(id);
                out.push(PriorityEntry::Sat(id));
                if id == closest {
                    out.push(PriorityEntry::Ground);
                    return out;
                }
            }
        }
        // every ring member visited without encountering `closest` again should be
        // unreachable for a well-formed ring, but terminate defensively rather than
        // return a list with no GROUND sentinel.
        out.push(PriorityEntry::Ground);
        out
    }

    pub fn can_execute_mission(&self, radian: f64, orbit_number: u64) -> bool {
        let st = self.state.read().expect("orbital state lock poisoned");
        let a = &st.angles[&self.self_id];
        let cumulative = (a.revolutions as f64) * TWO_PI + a.angle;
        let target = radian + TWO_PI * ((orbit_number.saturating_sub(1)) as f64);
        cumulative >= target
    }

    pub fn self_id(&self) -> SatId {
        self.self_id
    }

    pub fn ring(&self) -> &[SatId] {
        &self.ring
    }
}

/// the periodic tick worker (§5): sleeps for `period` between updates, racing
/// the sleep against the shared stop flag so shutdown is observed promptly
/// rather than only after the next tick completes. Sleeping a fixed `period`
/// each round (rather than measuring elapsed time) is sufficient here since the
/// advance itself is computed from `dt`, not wall-clock drift against a target.
pub async fn run_tick(oracle: std::sync::Arc<OrbitalOracle>, stop: sat_actor::StopFlag, period: std::time::Duration) {
    loop {
        tokio::select! {
            _ = stop.wait_for_stop() => {
                tracing::info!("orbital_oracle tick stopping");
                return;
            }
            _ = sat_actor::sleep(period) => {
                oracle.tick(period.as_secs_f64());
            }
        }
    }
}
