/// Output gain for a track: its own volume scaled by the master volume,
/// forced to zero while muted. Volumes are percentages.
pub fn effective_gain(volume: u8, master_volume: u8, muted: bool) -> f32 {
    if muted {
        return 0.0;
    }
    let gain = (f32::from(volume) / 100.0) * (f32::from(master_volume) / 100.0);
    gain.clamp(0.0, 1.0)
}

/// Clamp an arbitrary integer to a 0..=100 volume.
pub fn clamp_volume(volume: i32) -> u8 {
    volume.clamp(0, 100) as u8
}
