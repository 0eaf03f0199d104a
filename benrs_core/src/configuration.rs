//! Process wide defaults for solver options and the Benson engine
use std::sync::{LazyLock, PoisonError, RwLock, RwLockReadGuard};

pub static CONFIGURATION: LazyLock<RwLock<Configuration>> =
    LazyLock::new(|| RwLock::new(Configuration::default()));

/// Read the current configuration, recovering the value if a writer panicked
pub(crate) fn configuration() -> RwLockReadGuard<'static, Configuration> {
    CONFIGURATION.read().unwrap_or_else(PoisonError::into_inner)
}

pub struct Configuration {
    /// Tolerance of the phase 0 LPs (interior point of the dual parameter set)
    pub eps_phase0: f64,
    /// Tolerance of the phase 1 LPs (recession cone of the upper image)
    pub eps_phase1: f64,
    /// Tolerance deciding when a phase 1 outer approximation vertex is accepted
    pub eps_benson_phase1: f64,
    /// Tolerance deciding when a phase 2 outer approximation vertex is accepted
    pub eps_benson_phase2: f64,
    /// Default verbosity of the Benson engine
    pub message_level: u8,
    /// Default verbosity of the LP backend
    pub lp_message_level: u8,
    /// Magnitude at or below which a matrix entry is not stored
    pub zero_tolerance: f64,
    /// Upper limit on cutting rounds in a single Benson loop
    pub max_benson_iterations: usize,
    /// Half width of the box bounding recession direction LPs
    pub direction_box: f64,
    /// Half width of the box put around free variables when a scalarisation with an unbounded
    /// optimal face is solved again
    pub variable_box: f64,
    /// Fraction by which such a scalarisation's weight is moved toward an interior weight
    pub weight_shift: f64,
    /// Tolerance used by the vertex enumeration
    pub vertex_tolerance: f64,
    /// Feasibility and gap tolerance handed to the LP backend
    pub lp_tolerance: f64,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            eps_phase0: 1e-8,
            eps_phase1: 1e-8,
            eps_benson_phase1: 1e-7,
            eps_benson_phase2: 1e-7,
            message_level: 1,
            lp_message_level: 0,
            zero_tolerance: 0.,
            max_benson_iterations: 10_000,
            direction_box: 1.,
            variable_box: 1e6,
            weight_shift: 1e-6,
            vertex_tolerance: 1e-9,
            lp_tolerance: 1e-9,
        }
    }
}
