const UNIT_VALUE_OFFSET: i32 = 4;
const UNIT_VALUE_MAX: i32 = 7;
const UNIT_VALUE_SUFFIXES: [&str; UNIT_VALUE_MAX as usize + 1] =
    ["p", "n", "u", "m", "", "k", "M", "G"];

// Use as many decimals as needed (up to 4), or none if not needed
fn scaled(v: f64, suff: i32) -> f64 {
    let vr = v / f64::powi(10.0, 3 * (suff - UNIT_VALUE_OFFSET));
    (vr * 1e4).round() / 1e4
}

/// Format a value with an SI prefix, e.g. `0.05, "A"` gives `"50mA"`.
pub fn format_unit_value(v: f64, unit: &str) -> String {
    if !v.is_finite() {
        return format!("{}{}", v, unit);
    }
    if v == 0.0 {
        return format!("0{}", unit);
    }
    let exponent = (v.abs().log10() / 3.0).floor() as i32;
    let mut suff = (UNIT_VALUE_OFFSET + exponent).clamp(0, UNIT_VALUE_MAX);
    let mut vr = scaled(v, suff);
    // rounding can carry into the next prefix (999.99999 -> 1k)
    if vr.abs() >= 1000.0 && suff < UNIT_VALUE_MAX {
        suff += 1;
        vr = scaled(v, suff);
    }
    if vr == 0.0 {
        vr = 0.0;
    }
    format!("{}{}{}", vr, UNIT_VALUE_SUFFIXES[suff as usize], unit)
}
