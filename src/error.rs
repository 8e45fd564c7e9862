use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// All fatal failure modes of the engine. Transient conditions (such as
/// a smoothing length outgrowing its candidate neighbour list) are
/// handled internally and never surface here.
///
/// Library callers receive these through `Result`; the driver binary
/// logs them and terminates with a non-zero exit code.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or inconsistent configuration, raised at initialisation.
    #[error("configuration error: {0}")]
    Config(String),

    /// A preallocated array ran out of slots. There is no automatic
    /// regrowth; the corresponding limit has to be increased.
    #[error("{what} capacity exhausted ({capacity} slots)")]
    CapacityExhausted { what: &'static str, capacity: usize },

    /// The smoothing length iteration exhausted both the fixed point
    /// sweep and the bisection fallback.
    #[error(
        "smoothing length iteration did not converge for particle {id}: \
         h = {h:.6e}, density = {density:.6e}, mass = {mass:.6e}, \
         {num_candidates} candidates"
    )]
    SmoothingLengthDiverged {
        id: u64,
        h: f64,
        density: f64,
        mass: f64,
        num_candidates: usize,
    },

    /// Particle positions went non-finite; raised before the bad
    /// values can poison a collective stage.
    #[error("non-finite particle position in {stage}")]
    NonFinitePosition { stage: &'static str },

    /// A collective exchange saw inconsistent counts between workers.
    #[error("communication mismatch: {0}")]
    CommunicationMismatch(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
