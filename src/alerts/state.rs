/// Edge-trigger flags for the two fault conditions
///
/// A set flag means "an alert of this kind is currently active and has
/// already been fired". The flags exist purely to deduplicate notifications:
/// fire once on the transition into a fault condition, clear silently on
/// recovery. They live in process memory only; a restart forgets active
/// alerts and may re-fire on the next bad reading if the fault persists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertState {
    /// A stale-data alert is currently active
    pub stale: bool,
    /// A reboot alert is currently active
    pub reboot: bool,
}

impl AlertState {
    /// Both flags clear, the state every process starts in
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any fault condition is currently active
    pub fn is_alerting(&self) -> bool {
        self.stale || self.reboot
    }
}
