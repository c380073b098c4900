//! Physical constants for diesel-engine CO2 estimation.
//!
//! The literals are fixed at these exact values; computed reference outputs
//! depend on them bit-for-bit.

/// Air-fuel ratio for a diesel engine (mass of air per unit mass of fuel)
pub const AFR: f64 = 14.6;

/// Carbon mass fraction of diesel fuel
pub const CARBON_RATIO: f64 = 0.84118;

/// Molar mass of CO2 (g/mol)
pub const M_CO2: f64 = 44.01;

/// Molar mass of carbon (g/mol)
pub const M_C: f64 = 12.01;

/// Molar gas volume at standard conditions (L/mol)
pub const V_MOLAR: f64 = 22.4;

/// Derived conversion factors, computed once at startup
#[derive(Debug, Clone, Copy)]
pub struct EmissionConstants {
    /// Converts a MAF reading (g/s) and elapsed seconds into grams of CO2:
    /// the carbon mass in the consumed air-flow, scaled up to CO2 by the
    /// molar-mass ratio.
    pub k: f64,
}

impl EmissionConstants {
    pub fn new() -> Self {
        Self {
            k: (1.0 / AFR) * CARBON_RATIO * (M_CO2 / M_C),
        }
    }
}

impl Default for EmissionConstants {
    fn default() -> Self {
        Self::new()
    }
}
