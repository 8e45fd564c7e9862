use std::thread;

use super::Simulation;
use super::WorkerComms;
use crate::communication::Rank;
use crate::parameters::SimulationParameters;
use crate::particle::SphParticle;
use crate::particle::StarParticle;

/// Run one simulation per worker on its own thread, connected through
/// local communicators. `ics` supplies each rank's initial particles
/// (usually everything on rank 0, which the initial decomposition then
/// scatters); `body` drives the simulation and its return values are
/// collected in rank order.
pub fn run_distributed<T, I, F>(
    parameters: SimulationParameters,
    num_workers: usize,
    ics: I,
    body: F,
) -> Vec<T>
where
    T: Send + 'static,
    I: Fn(Rank) -> (Vec<SphParticle>, Vec<StarParticle>) + Clone + Send + 'static,
    F: Fn(&mut Simulation) -> T + Clone + Send + 'static,
{
    let comms = WorkerComms::build(num_workers);
    let handles: Vec<_> = comms
        .into_iter()
        .enumerate()
        .map(|(rank, comms)| {
            let parameters = parameters.clone();
            let ics = ics.clone();
            let body = body.clone();
            thread::spawn(move || {
                let (particles, stars) = ics(rank as Rank);
                let mut simulation = Simulation::new(parameters, particles, stars, comms)
                    .expect("failed to build simulation");
                body(&mut simulation)
            })
        })
        .collect();
    handles
        .into_iter()
        .map(|handle| handle.join().expect("worker thread panicked"))
        .collect()
}
