//! Single-flight guard for baseline mutations.
//!
//! Reconciliation and saving both replace the baseline. The guard admits
//! one of them at a time and tracks whether the user is editing the plain
//! text view, which holds off reconciliation entirely.

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    EditingPlainText,
    Reconciling,
    Saving,
}

/// What an in-flight operation is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightKind {
    Reconcile,
    Save,
}

/// Proof that the holder owns the guard. Hand it back with
/// [`SessionGuard::finish`].
#[must_use = "an unfinished flight blocks every later reconcile and save"]
#[derive(Debug)]
pub struct Flight {
    kind: FlightKind,
}

impl Flight {
    pub fn kind(&self) -> FlightKind {
        self.kind
    }
}

#[derive(Debug, Default)]
pub struct SessionGuard {
    in_flight: Option<FlightKind>,
    plain_text_focus: bool,
}

impl SessionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        match self.in_flight {
            Some(FlightKind::Reconcile) => Phase::Reconciling,
            Some(FlightKind::Save) => Phase::Saving,
            None if self.plain_text_focus => Phase::EditingPlainText,
            None => Phase::Idle,
        }
    }

    pub fn is_plain_text_focused(&self) -> bool {
        self.plain_text_focus
    }

    pub fn focus_plain_text(&mut self) {
        self.plain_text_focus = true;
    }

    pub fn blur_plain_text(&mut self) {
        self.plain_text_focus = false;
    }

    /// Claim the guard, or `None` if another operation holds it.
    pub fn try_begin(&mut self, kind: FlightKind) -> Option<Flight> {
        if let Some(current) = self.in_flight {
            debug!(?kind, ?current, "Guard busy, refusing");
            return None;
        }
        self.in_flight = Some(kind);
        Some(Flight { kind })
    }

    pub fn finish(&mut self, flight: Flight) {
        debug_assert_eq!(self.in_flight, Some(flight.kind));
        self.in_flight = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_flight() {
        let mut guard = SessionGuard::new();
        let flight = guard.try_begin(FlightKind::Reconcile).unwrap();
        assert_eq!(guard.phase(), Phase::Reconciling);
        assert!(guard.try_begin(FlightKind::Save).is_none());
        assert!(guard.try_begin(FlightKind::Reconcile).is_none());

        guard.finish(flight);
        assert_eq!(guard.phase(), Phase::Idle);

        let flight = guard.try_begin(FlightKind::Save).unwrap();
        assert_eq!(flight.kind(), FlightKind::Save);
        assert_eq!(guard.phase(), Phase::Saving);
        guard.finish(flight);
    }

    #[test]
    fn test_plain_text_focus_phase() {
        let mut guard = SessionGuard::new();
        guard.focus_plain_text();
        assert_eq!(guard.phase(), Phase::EditingPlainText);

        // An in-flight operation takes precedence in the reported phase,
        // but focus survives it.
        let flight = guard.try_begin(FlightKind::Save).unwrap();
        assert_eq!(guard.phase(), Phase::Saving);
        guard.finish(flight);
        assert_eq!(guard.phase(), Phase::EditingPlainText);

        guard.blur_plain_text();
        assert_eq!(guard.phase(), Phase::Idle);
    }
}
