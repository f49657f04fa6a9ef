/// Single-slot debounce: schedule-if-not-already-scheduled.
///
/// The flag carries no data. Whoever runs the scheduled work reads the latest
/// state at execution time, so any number of `schedule` calls between two
/// `take`s collapse into one execution that still sees every change.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Debounce {
    scheduled: bool,
}

impl Debounce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks work as due. Returns true only for the call that actually
    /// scheduled it.
    pub fn schedule(&mut self) -> bool {
        !std::mem::replace(&mut self.scheduled, true)
    }

    /// Clears the flag. Returns whether work was due.
    pub fn take(&mut self) -> bool {
        std::mem::replace(&mut self.scheduled, false)
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_collapses_until_taken() {
        let mut debounce = Debounce::new();
        assert!(debounce.schedule());
        assert!(!debounce.schedule());
        assert!(!debounce.schedule());
        assert!(debounce.take());
        assert!(!debounce.take());
        assert!(debounce.schedule());
    }
}
