mod forces;
mod neighbours;
mod parameters;
mod smoothing_length;
mod viscosity;


pub use forces::ActiveNeighbours;
pub use forces::ForceEvaluation;
pub use neighbours::build_neighbour_tree;
pub use neighbours::force_neighbours;
pub use neighbours::NeighbourTree;
pub use neighbours::SphLeaf;
pub use parameters::ConductivityChoice;
pub use parameters::SphParameters;
pub use parameters::TimeDependentViscosity;
pub use parameters::ViscosityParameters;
pub use smoothing_length::DensityUpdate;
pub use viscosity::alpha_evolution_rate;
