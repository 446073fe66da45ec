//! Derived meteorological quantities

const MAGNUS_B: f64 = 17.625;
const MAGNUS_C: f64 = 243.04;

/// Dew point in °C from relative humidity (%) and air temperature (°C),
/// using the Magnus approximation.
///
/// Returns NaN when `relative_humidity` is zero.
pub fn dewpoint(relative_humidity: f64, temperature: f64) -> f64 {
    let alpha = (MAGNUS_B * temperature) / (MAGNUS_C + temperature);
    let l = (relative_humidity / 100.0).ln();
    MAGNUS_C * (l + alpha) / (MAGNUS_B - l - alpha)
}
