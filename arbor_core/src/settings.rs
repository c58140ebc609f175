/// Analysis settings consumed by model initialization.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    /// The system mission time in hours, applied to the model's
    /// mission-time parameter. Must be positive.
    pub mission_time: f64,
    /// Whether probability analysis is requested;
    /// if so, every basic event must carry an expression.
    pub probability_analysis: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mission_time: 8760.0,
            probability_analysis: false,
        }
    }
}
