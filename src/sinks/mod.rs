use serde::Deserialize;
use serde::Serialize;

use crate::dimension::MVec;
use crate::particle::ParticleId;
use crate::particle::ParticleStore;
use crate::particle::SphParticle;
use crate::particle::StarParticle;
use crate::timestep::TimestepParameters;
use crate::timestep::TimestepState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccretionMode {
    #[default]
    Sudden,
    Smooth,
}

/// The `sinks:` parameter section.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SinkParameters {
    #[serde(default)]
    pub enabled: bool,
    /// Density threshold for sink candidacy.
    #[serde(default = "default_rho_sink")]
    pub rho_sink: f64,
    /// Accretion radius in units of the smoothing length at formation.
    #[serde(default = "default_radius_in_h")]
    pub radius_in_h: f64,
    #[serde(default)]
    pub accretion: AccretionMode,
    /// Smooth accretion rate factor: the accreted fraction per step is
    /// f = min(1, factor · Δt / t_dyn).
    #[serde(default = "default_smooth_factor")]
    pub smooth_accretion_factor: f64,
    /// Softening length given to newly formed sinks.
    #[serde(default)]
    pub softening: f64,
}

fn default_rho_sink() -> f64 {
    1e10
}

fn default_radius_in_h() -> f64 {
    2.0
}

fn default_smooth_factor() -> f64 {
    1.0
}

impl Default for SinkParameters {
    fn default() -> Self {
        Self {
            enabled: false,
            rho_sink: default_rho_sink(),
            radius_in_h: default_radius_in_h(),
            accretion: AccretionMode::default(),
            smooth_accretion_factor: default_smooth_factor(),
            softening: 0.0,
        }
    }
}

/// A fluid particle may turn into a sink when it sits at a potential
/// minimum, is denser than the threshold, and both the velocity and
/// acceleration fields converge onto it.
pub fn is_candidate(particle: &SphParticle, parameters: &SinkParameters) -> bool {
    particle.potential_minimum
        && particle.density > parameters.rho_sink
        && particle.div_v < 0.0
        && particle.div_a <= 0.0
}

pub fn find_candidates(store: &ParticleStore, parameters: &SinkParameters) -> Vec<usize> {
    store
        .real()
        .iter()
        .enumerate()
        .filter(|(_, particle)| is_candidate(particle, parameters))
        .map(|(index, _)| index)
        .collect()
}

/// Atomically convert candidate snapshots into sink stars. Candidates
/// falling inside an existing or freshly created sink radius are left
/// to accretion instead. Returns the created stars.
pub fn create_sinks(
    candidates: &[SphParticle],
    stars: &mut Vec<StarParticle>,
    parameters: &SinkParameters,
    next_star_id: &mut u64,
) -> usize {
    let mut created = 0;
    for candidate in candidates {
        let radius = parameters.radius_in_h * candidate.h;
        let swallowed = stars.iter().any(|star| {
            star.is_sink() && star.pos.distance(candidate.pos) < star.sink_radius.max(radius)
        });
        if swallowed {
            continue;
        }
        let mut star = StarParticle::new(
            ParticleId(*next_star_id),
            candidate.pos,
            candidate.vel,
            candidate.mass,
        );
        *next_star_id += 1;
        star.h = parameters.softening;
        star.sink_radius = radius;
        star.level = candidate.level;
        star.accel = candidate.total_accel();
        star.accel0 = star.accel;
        stars.push(star);
        created += 1;
    }
    created
}

/// Mass and momentum a worker's gas surrendered to one sink during an
/// accretion pass; applied to the replicated star list once summed over
/// all workers.
#[derive(Clone, Copy, Debug, Default)]
pub struct SinkDelta {
    pub sink: u32,
    pub mass: f64,
    pub momentum: MVec,
    pub mass_weighted_pos: MVec,
}

/// Accrete local gas onto the sinks: suddenly (full absorption inside
/// the radius) or smoothly (a fraction tied to the sink's dynamical
/// timescale). Local particles are drained or removed here; the
/// returned deltas still have to be applied to the stars.
pub fn accrete_local(
    store: &mut ParticleStore,
    stars: &[StarParticle],
    parameters: &SinkParameters,
    state: &TimestepState,
    timestep_parameters: &TimestepParameters,
) -> Vec<SinkDelta> {
    assert_eq!(store.num_ghosts(), 0);
    let tick_duration = state.tick_duration(timestep_parameters);
    let mut deltas: Vec<SinkDelta> = vec![];
    let mut removals: Vec<usize> = vec![];

    for index in 0..store.num_real() {
        let particle = *store.get(index);
        let mut nearest: Option<(usize, f64)> = None;
        for (sink_index, star) in stars.iter().enumerate() {
            if !star.is_sink() {
                continue;
            }
            let distance = star.pos.distance(particle.pos);
            if distance < star.sink_radius
                && nearest.map(|(_, d)| distance < d).unwrap_or(true)
            {
                nearest = Some((sink_index, distance));
            }
        }
        let Some((sink_index, _)) = nearest else {
            store.get_mut(index).sink_id = -1;
            continue;
        };
        store.get_mut(index).sink_id = sink_index as i32;
        let star = &stars[sink_index];

        let fraction = match parameters.accretion {
            AccretionMode::Sudden => 1.0,
            AccretionMode::Smooth => {
                let t_dyn =
                    (star.sink_radius.powi(3) / star.mass.max(f64::MIN_POSITIVE)).sqrt();
                let dt = state.step_ticks(particle.level) as f64 * tick_duration;
                (parameters.smooth_accretion_factor * dt / t_dyn).min(1.0)
            }
        };
        let accreted_mass = fraction * particle.mass;
        let delta = match deltas.iter_mut().find(|d| d.sink == sink_index as u32) {
            Some(delta) => delta,
            None => {
                deltas.push(SinkDelta {
                    sink: sink_index as u32,
                    ..Default::default()
                });
                deltas.last_mut().unwrap()
            }
        };
        delta.mass += accreted_mass;
        delta.momentum += particle.vel * accreted_mass;
        delta.mass_weighted_pos += particle.pos * accreted_mass;

        if fraction >= 1.0 - 1e-12 {
            removals.push(index);
        } else {
            store.get_mut(index).mass -= accreted_mass;
        }
    }
    store.remove_reals(&mut removals);
    deltas
}

/// Fold the (globally summed) accretion deltas into the sinks,
/// conserving mass and momentum and moving each sink to the combined
/// centre of mass.
pub fn apply_deltas(stars: &mut [StarParticle], deltas: &[SinkDelta]) {
    for delta in deltas {
        let star = &mut stars[delta.sink as usize];
        let new_mass = star.mass + delta.mass;
        if delta.mass <= 0.0 {
            continue;
        }
        star.pos = (star.pos * star.mass + delta.mass_weighted_pos) / new_mass;
        star.vel = (star.vel * star.mass + delta.momentum) / new_mass;
        star.pos0 = star.pos;
        star.vel0 = star.vel;
        star.mass = new_mass;
    }
}

/// Merge sinks whose accretion spheres overlap. The heavier partner
/// survives with the combined mass, momentum and centre of mass.
pub fn merge_sinks(stars: &mut Vec<StarParticle>) -> usize {
    let mut merged = 0;
    'outer: loop {
        for i in 0..stars.len() {
            for j in (i + 1)..stars.len() {
                if !stars[i].is_sink() || !stars[j].is_sink() {
                    continue;
                }
                let distance = stars[i].pos.distance(stars[j].pos);
                if distance >= stars[i].sink_radius + stars[j].sink_radius {
                    continue;
                }
                let (keep, gone) = if stars[i].mass >= stars[j].mass {
                    (i, j)
                } else {
                    (j, i)
                };
                let other = stars[gone];
                let star = &mut stars[keep];
                let new_mass = star.mass + other.mass;
                star.pos = (star.pos * star.mass + other.pos * other.mass) / new_mass;
                star.vel = (star.vel * star.mass + other.vel * other.mass) / new_mass;
                star.sink_radius = star.sink_radius.max(other.sink_radius);
                star.pos0 = star.pos;
                star.vel0 = star.vel;
                star.mass = new_mass;
                stars.remove(gone);
                merged += 1;
                continue 'outer;
            }
        }
        return merged;
    }
}

#[cfg(test)]
mod tests {
    use super::accrete_local;
    use super::apply_deltas;
    use super::create_sinks;
    use super::find_candidates;
    use super::merge_sinks;
    use super::AccretionMode;
    use super::SinkParameters;
    use crate::dimension::MVec;
    use crate::particle::ParticleId;
    use crate::particle::ParticleStore;
    use crate::particle::SphParticle;
    use crate::particle::StarParticle;
    use crate::timestep::TimestepParameters;
    use crate::timestep::TimestepState;

    fn dense_candidate() -> SphParticle {
        let mut particle = SphParticle::new(
            ParticleId(0),
            MVec::ONE * 0.5,
            MVec::ONE * -0.1,
            2.0,
            1.0,
        );
        particle.h = 0.1;
        particle.density = 100.0;
        particle.potential_minimum = true;
        particle.div_v = -1.0;
        particle.accel = MVec::ONE * 0.05;
        particle
    }

    fn parameters() -> SinkParameters {
        SinkParameters {
            enabled: true,
            rho_sink: 10.0,
            ..Default::default()
        }
    }

    #[test]
    fn candidate_requires_all_criteria() {
        let parameters = parameters();
        let store = ParticleStore::new(vec![dense_candidate()], 0);
        assert_eq!(find_candidates(&store, &parameters), vec![0]);

        let mut shallow = dense_candidate();
        shallow.potential_minimum = false;
        let store = ParticleStore::new(vec![shallow], 0);
        assert!(find_candidates(&store, &parameters).is_empty());

        let mut thin = dense_candidate();
        thin.density = 1.0;
        let store = ParticleStore::new(vec![thin], 0);
        assert!(find_candidates(&store, &parameters).is_empty());

        let mut diverging = dense_candidate();
        diverging.div_v = 1.0;
        let store = ParticleStore::new(vec![diverging], 0);
        assert!(find_candidates(&store, &parameters).is_empty());
    }

    #[test]
    fn sink_creation_preserves_mass_and_kinematics() {
        let parameters = parameters();
        let candidate = dense_candidate();
        let mut stars = vec![];
        let mut next_id = 1000;
        let created = create_sinks(&[candidate], &mut stars, &parameters, &mut next_id);
        assert_eq!(created, 1);
        assert_eq!(stars.len(), 1);
        assert!(stars[0].is_sink());
        assert_eq!(stars[0].mass, candidate.mass);
        assert_eq!(stars[0].pos, candidate.pos);
        assert_eq!(stars[0].vel, candidate.vel);
        assert_eq!(next_id, 1001);

        // A second candidate inside the fresh sink is not doubled up.
        let created = create_sinks(&[candidate], &mut stars, &parameters, &mut next_id);
        assert_eq!(created, 0);
    }

    #[test]
    fn sudden_accretion_conserves_mass_and_momentum() {
        let parameters = parameters();
        let mut sink = StarParticle::new(ParticleId(50), MVec::ONE * 0.5, MVec::ZERO, 1.0);
        sink.sink_radius = 0.2;
        let mut stars = vec![sink];
        let mut gas = SphParticle::new(
            ParticleId(1),
            MVec::ONE * 0.55,
            MVec::ONE * 2.0,
            0.5,
            1.0,
        );
        gas.level = 0;
        let mut store = ParticleStore::new(vec![gas], 0);
        let state = TimestepState::new(1);
        let timestep_parameters = TimestepParameters::default();
        let deltas = accrete_local(&mut store, &stars, &parameters, &state, &timestep_parameters);
        assert_eq!(store.num_real(), 0);
        apply_deltas(&mut stars, &deltas);
        assert!((stars[0].mass - 1.5).abs() < 1e-12);
        // Momentum of the pair is carried by the sink now.
        let momentum = stars[0].vel * stars[0].mass;
        assert!((momentum - MVec::ONE * 1.0).length() < 1e-12);
    }

    #[test]
    fn smooth_accretion_drains_gradually() {
        let mut parameters = parameters();
        parameters.accretion = AccretionMode::Smooth;
        parameters.smooth_accretion_factor = 1e-3;
        let mut sink = StarParticle::new(ParticleId(50), MVec::ONE * 0.5, MVec::ZERO, 1.0);
        sink.sink_radius = 0.2;
        let stars = vec![sink];
        let gas = SphParticle::new(
            ParticleId(1),
            MVec::ONE * 0.55,
            MVec::ZERO,
            0.5,
            1.0,
        );
        let mut store = ParticleStore::new(vec![gas], 0);
        let state = TimestepState::new(1);
        let timestep_parameters = TimestepParameters::default();
        let deltas = accrete_local(&mut store, &stars, &parameters, &state, &timestep_parameters);
        assert_eq!(store.num_real(), 1);
        assert!(store.get(0).mass < 0.5);
        assert!(store.get(0).mass > 0.4);
        assert_eq!(store.get(0).sink_id, 0);
        assert_eq!(deltas.len(), 1);
        assert!((deltas[0].mass - (0.5 - store.get(0).mass)).abs() < 1e-15);
    }

    #[test]
    fn overlapping_sinks_merge_into_the_heavier_one() {
        let mut heavy = StarParticle::new(ParticleId(0), MVec::ZERO, MVec::ZERO, 2.0);
        heavy.sink_radius = 0.3;
        let mut light = StarParticle::new(ParticleId(1), MVec::ONE * 0.1, MVec::ONE, 1.0);
        light.sink_radius = 0.3;
        let mut stars = vec![heavy, light];
        let merged = merge_sinks(&mut stars);
        assert_eq!(merged, 1);
        assert_eq!(stars.len(), 1);
        assert!((stars[0].mass - 3.0).abs() < 1e-12);
        // Momentum conserved.
        assert!((stars[0].vel * 3.0 - MVec::ONE * 1.0).length() < 1e-12);
    }
}
