//! Unit conversion utilities
//!
//! Observations arrive in the provider's metric units (°C, m/s, hPa, mm).
//! The aggregator also accepts US customary units.

/// Unit group for observation quantities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitGroup {
    Temperature,
    Pressure,
    Rain,
    Speed,
}

const HPA_PER_INHG: f64 = 33.8638866667;
const MM_PER_IN: f64 = 25.4;
const MPS_PER_MPH: f64 = 0.44704;

/// Convert a metric value to US units (°F, inHg, in, mph)
pub fn to_us(value: f64, group: UnitGroup) -> f64 {
    match group {
        UnitGroup::Temperature => value * 9.0 / 5.0 + 32.0,
        UnitGroup::Pressure => value / HPA_PER_INHG,
        UnitGroup::Rain => value / MM_PER_IN,
        UnitGroup::Speed => value / MPS_PER_MPH,
    }
}
