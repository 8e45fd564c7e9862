pub use crate::communication::Rank;
pub use crate::communication::WorldRank;
pub use crate::config::NUM_DIMENSIONS;
pub use crate::dimension::MVec;
pub use crate::error::Error;
pub use crate::error::Result;
pub use crate::extent::Extent;
pub use crate::parameters::SimulationParameters;
pub use crate::particle::ParticleId;
pub use crate::particle::SphParticle;
pub use crate::particle::StarParticle;
pub use crate::simulation::Simulation;
pub use crate::simulation_box::SimulationBox;

pub type Float = f64;
