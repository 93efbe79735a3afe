/// Edge in a zone's reachability
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Recovered,
    Lost,
}

/// Reachability of one zone, derived from command and poll outcomes.
///
/// Starts out available. Only changes are reported, so observers are not
/// notified on every poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Availability {
    available: bool,
}

impl Default for Availability {
    fn default() -> Self {
        Self { available: true }
    }
}

impl Availability {
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.available
    }

    /// Record the outcome of a send or poll, returning the transition, if any.
    pub const fn record(&mut self, success: bool) -> Option<Transition> {
        if self.available == success {
            return None;
        }
        self.available = success;
        if success {
            Some(Transition::Recovered)
        } else {
            Some(Transition::Lost)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::availability::{Availability, Transition};

    #[test]
    fn starts_available() {
        assert!(Availability::default().is_available());
    }

    #[test]
    fn edge_triggered() {
        let mut av = Availability::default();

        assert_eq!(av.record(true), None);
        assert_eq!(av.record(false), Some(Transition::Lost));
        assert_eq!(av.record(false), None);
        assert!(!av.is_available());
        assert_eq!(av.record(true), Some(Transition::Recovered));
        assert_eq!(av.record(true), None);
        assert!(av.is_available());
    }
}
