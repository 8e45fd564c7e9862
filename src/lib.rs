// Some of our hot loops pass many scalar arguments around.
#![allow(clippy::too_many_arguments)]

//! # Protostar
//! Protostar is a smoothed particle hydrodynamics (SPH) engine coupled
//! to a direct N-body integrator for self-gravitating gas dynamics and
//! star formation problems.
//!
//! The engine advances a population of fluid and star particles under
//! pressure, artificial viscosity, artificial conductivity and Newtonian
//! self-gravity. Gas thermodynamics are closed by a pluggable equation
//! of state and smoothed with a pluggable interpolation kernel. Periodic
//! and mirror boundaries are realised through ghost particles, sink
//! particles absorb collapsing gas, and the particle population can be
//! split across message-passing workers by a work-balanced binary
//! domain decomposition.
//!
//! Simulations are driven through [`simulation::Simulation`], configured
//! from a sectioned YAML parameter file. The number of spatial
//! dimensions is a compile-time choice through the `1d`/`2d`/`3d` cargo
//! features (default `3d`); hot loops never branch on the dimension at
//! runtime.

pub mod boundary;
pub mod communication;
pub mod config;
pub mod diagnostics;
pub mod dimension;
pub mod domain;
pub mod eos;
pub mod error;
pub mod extent;
pub mod ics;
pub mod io;
pub mod kernel;
pub mod nbody;
pub mod parameters;
pub mod particle;
pub mod performance_parameters;
pub mod prelude;
pub mod quadtree;
pub mod simulation;
pub mod simulation_box;
pub mod sinks;
pub mod sph;
pub mod test_utils;
pub mod timestep;
#[cfg(feature = "1d")]
mod vec1;

pub use error::Error;
pub use error::Result;
