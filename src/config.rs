/// In-process configuration knobs for the gap-buffer engine.
///
/// Not a file or environment-variable configuration surface — it's the plain
/// constructor-argument struct idiomatic Rust libraries use to make a couple
/// of tuning constants overridable without reaching for a config-file crate
/// the core has no other use for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferConfig {
    /// Minimum gap length kept free after an edit before a reallocating grow is
    /// triggered. Defaults to 8.
    pub minimum_gap_length: usize,
    /// Capacity multiplier used when a grow is triggered. Defaults to 2
    /// (capacity doubles).
    pub growth_factor: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        BufferConfig {
            minimum_gap_length: 8,
            growth_factor: 2,
        }
    }
}
