//! Resource quantity parsing.
//!
//! Converts Kubernetes CPU and memory quantities to integers so bounds can be
//! compared (`minAllowed <= maxAllowed`).

use regex::Regex;
use std::sync::LazyLock;

/// Quantities such as "100m", "1.5", "128Mi", "1e3", "500m" or ".5Gi".
static QUANTITY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d*)?|\.\d+)(?:[eE]([+-]?\d+))?(m|Ki|Mi|Gi|Ti|Pi|Ei|k|M|G|T|P|E)?$")
        .expect("quantity regex")
});

/// Parse a quantity into its base unit (cores or bytes).
fn parse_quantity(quantity: &str) -> Option<f64> {
    let caps = QUANTITY_REGEX.captures(quantity.trim())?;
    let mut value: f64 = caps.get(1)?.as_str().parse().ok()?;
    if let Some(exponent) = caps.get(2) {
        let exponent: i32 = exponent.as_str().parse().ok()?;
        value *= 10f64.powi(exponent);
    }

    let multiplier: f64 = match caps.get(3).map(|m| m.as_str()).unwrap_or("") {
        "" => 1.0,
        "m" => 1e-3,
        "Ki" => 1024.0,
        "Mi" => 1024.0_f64.powi(2),
        "Gi" => 1024.0_f64.powi(3),
        "Ti" => 1024.0_f64.powi(4),
        "Pi" => 1024.0_f64.powi(5),
        "Ei" => 1024.0_f64.powi(6),
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        _ => return None,
    };

    let value = value * multiplier;
    value.is_finite().then_some(value)
}

/// Round up to a whole unit, ignoring float noise from the decimal scaling.
fn ceil_units(value: f64) -> Option<u64> {
    let rounded = value.round();
    let whole = if (value - rounded).abs() <= 1e-9 * rounded.abs().max(1.0) {
        rounded
    } else {
        value.ceil()
    };
    (whole >= 0.0 && whole <= u64::MAX as f64).then_some(whole as u64)
}

/// Parse a CPU value string to millicores. Fractions of a millicore round up.
///
/// # Examples
/// - "100m" -> 100
/// - "1" -> 1000
/// - "1.5" -> 1500
/// - "0.5m" -> 1
pub fn parse_cpu_to_millicores(cpu: &str) -> Option<u64> {
    ceil_units(parse_quantity(cpu)? * 1000.0)
}

/// Parse a memory value string to bytes. Fractions of a byte round up.
///
/// # Examples
/// - "128Mi" -> 134217728
/// - "1Gi" -> 1073741824
/// - "1e3" -> 1000
pub fn parse_memory_to_bytes(memory: &str) -> Option<u64> {
    ceil_units(parse_quantity(memory)?)
}

/// Render a YAML scalar as a quantity string.
///
/// Templates often emit `cpu: 1` as an integer; quantities are strings in the
/// API, so numbers are stringified rather than rejected.
pub fn quantity_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
