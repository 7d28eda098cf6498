//! Display formatting for band sliders

/// Short frequency label: "32", "500", "1K", "16K"
pub fn band_label(frequency: f32) -> String {
    if frequency >= 1000.0 {
        format!("{:.0}K", frequency / 1000.0)
    } else {
        format!("{:.0}", frequency)
    }
}

/// Signed gain readout with one decimal: "+6.0", "-2.5", "+0.0"
pub fn format_gain(gain_db: f32) -> String {
    format!("{:+.1}", gain_db)
}
