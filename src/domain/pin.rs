use std::collections::HashSet;

use crate::domain::entities::PinRecord;
use crate::domain::errors::AccessError;
use crate::domain::ports::PinSource;

// Redraws allowed when a fresh PIN collides with the one it replaces or the history.
const PIN_REDRAW_LIMIT: usize = 8;

/// Formats a value below one million as `NNN-NNN`.
pub fn format_pin(value: u32) -> String {
    let value = value % 1_000_000;
    format!("{:03}-{:03}", value / 1000, value % 1000)
}

/// True when `pin` has the `NNN-NNN` shape.
pub fn is_well_formed(pin: &str) -> bool {
    let bytes = pin.as_bytes();
    bytes.len() == 7
        && bytes
            .iter()
            .enumerate()
            .all(|(index, byte)| if index == 3 { *byte == b'-' } else { byte.is_ascii_digit() })
}

/// Owns the rules for the single redeemable PIN and its redemption history.
///
/// All operations are synchronous and return new records instead of mutating
/// shared state; persistence is left to the caller.
pub struct PinAuthority<G> {
    source: G,
}

impl<G> PinAuthority<G>
where
    G: PinSource,
{
    pub fn new(source: G) -> Self {
        Self { source }
    }

    /// Draws a pseudo-random `NNN-NNN` PIN. No uniqueness guarantee.
    pub fn generate(&self) -> String {
        self.source.draw()
    }

    /// Record used on first start or when persisted state cannot be read.
    pub fn initial_record(&self) -> PinRecord {
        PinRecord::new(self.generate())
    }

    /// True iff `candidate` is non-empty, equals the active PIN exactly, and was never redeemed.
    pub fn validate(&self, record: &PinRecord, candidate: &str) -> bool {
        !candidate.is_empty()
            && candidate == record.active_pin
            && !record.used_pins.contains(candidate)
    }

    /// Same decision as [`PinAuthority::validate`], with the failure cause kept for logs.
    /// Callers must not surface the difference between the two rejections.
    pub fn classify(&self, record: &PinRecord, candidate: &str) -> Result<(), AccessError> {
        if candidate.is_empty() {
            return Err(AccessError::InvalidPin);
        }
        if record.used_pins.contains(candidate) {
            return Err(AccessError::ReusedPin);
        }
        if candidate != record.active_pin {
            return Err(AccessError::InvalidPin);
        }
        Ok(())
    }

    /// Moves `used_pin` into the history and activates a fresh PIN.
    /// Does not re-validate; callers consume only after a successful validate.
    pub fn consume(&self, record: &PinRecord, used_pin: &str) -> PinRecord {
        let mut used_pins = record.used_pins.clone();
        used_pins.insert(used_pin.to_string());
        let active_pin = self.fresh_pin(&used_pins, &record.active_pin);

        PinRecord {
            active_pin,
            used_pins,
        }
    }

    /// Replaces the active PIN and leaves the history untouched.
    pub fn rotate(&self, record: &PinRecord) -> PinRecord {
        PinRecord {
            active_pin: self.fresh_pin(&record.used_pins, &record.active_pin),
            used_pins: record.used_pins.clone(),
        }
    }

    fn fresh_pin(&self, used_pins: &HashSet<String>, replacing: &str) -> String {
        let mut candidate = self.generate();
        for _ in 0..PIN_REDRAW_LIMIT {
            if candidate != replacing && !used_pins.contains(&candidate) {
                return candidate;
            }
            candidate = self.generate();
        }

        // A colliding PIN stays unredeemable because validate checks the history.
        tracing::warn!("pin source kept colliding with history; keeping last draw");
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::test_support::ScriptedPins;

    fn authority() -> PinAuthority<ScriptedPins> {
        PinAuthority::new(ScriptedPins::empty())
    }

    fn record(active: &str, used: &[&str]) -> PinRecord {
        PinRecord {
            active_pin: active.to_string(),
            used_pins: used.iter().map(|pin| pin.to_string()).collect(),
        }
    }

    #[test]
    fn when_candidate_matches_active_pin_then_validate_returns_true() {
        let state = record("111-222", &[]);

        assert!(authority().validate(&state, "111-222"));
    }

    #[test]
    fn when_candidate_differs_then_validate_returns_false() {
        let state = record("111-222", &[]);

        assert!(!authority().validate(&state, "999-999"));
        assert!(!authority().validate(&state, "111222"));
        assert!(!authority().validate(&state, " 111-222"));
    }

    #[test]
    fn when_candidate_is_empty_then_validate_returns_false() {
        let state = record("", &[]);

        assert!(!authority().validate(&state, ""));
    }

    #[test]
    fn when_active_pin_is_also_in_history_then_validate_returns_false() {
        let state = record("111-222", &["111-222"]);

        assert!(!authority().validate(&state, "111-222"));
    }

    #[test]
    fn when_pin_is_consumed_then_it_moves_to_history_and_a_new_pin_is_active() {
        let authority = PinAuthority::new(ScriptedPins::new(["333-444"]));
        let state = record("111-222", &[]);

        let next = authority.consume(&state, "111-222");

        assert!(next.used_pins.contains("111-222"));
        assert_eq!(next.active_pin, "333-444");
        assert!(is_well_formed(&next.active_pin));
        assert!(!authority.validate(&next, "111-222"));
        assert!(authority.validate(&next, "333-444"));
    }

    #[test]
    fn when_fresh_pin_repeats_the_consumed_one_then_it_is_redrawn() {
        let authority = PinAuthority::new(ScriptedPins::new(["111-222", "555-666"]));
        let state = record("111-222", &[]);

        let next = authority.consume(&state, "111-222");

        assert_eq!(next.active_pin, "555-666");
    }

    #[test]
    fn when_fresh_pin_is_in_history_then_it_is_redrawn() {
        let authority = PinAuthority::new(ScriptedPins::new(["000-001", "777-888"]));
        let state = record("111-222", &["000-001"]);

        let next = authority.rotate(&state);

        assert_eq!(next.active_pin, "777-888");
    }

    #[test]
    fn when_every_redraw_collides_then_last_draw_is_kept_and_stays_unredeemable() {
        let mut script = vec!["111-222"; PIN_REDRAW_LIMIT + 1];
        script.push("555-666");
        let authority = PinAuthority::new(ScriptedPins::new(script));
        let state = record("111-222", &[]);

        let next = authority.consume(&state, "111-222");

        assert_eq!(next.active_pin, "111-222");
        assert!(next.used_pins.contains("111-222"));
        assert!(!authority.validate(&next, "111-222"));
        assert_eq!(
            authority.classify(&next, "111-222"),
            Err(AccessError::ReusedPin)
        );
        // The redraw budget is spent; the next draw is the one left in the script.
        assert_eq!(authority.generate(), "555-666");
    }

    #[test]
    fn when_pin_is_rotated_then_history_is_untouched() {
        let authority = PinAuthority::new(ScriptedPins::new(["444-555"]));
        let state = record("111-222", &["000-001"]);

        let next = authority.rotate(&state);

        assert_eq!(next.active_pin, "444-555");
        assert_eq!(next.used_pins, state.used_pins);
        assert!(!next.used_pins.contains("111-222"));
        assert!(!authority.validate(&next, "111-222"));
    }

    #[test]
    fn when_classifying_then_reused_and_invalid_are_told_apart() {
        let state = record("333-444", &["111-222"]);

        assert_eq!(
            authority().classify(&state, "111-222"),
            Err(AccessError::ReusedPin)
        );
        assert_eq!(
            authority().classify(&state, "999-999"),
            Err(AccessError::InvalidPin)
        );
        assert_eq!(
            authority().classify(&state, ""),
            Err(AccessError::InvalidPin)
        );
        assert_eq!(authority().classify(&state, "333-444"), Ok(()));
    }

    #[test]
    fn when_formatting_values_then_pins_are_zero_padded() {
        assert_eq!(format_pin(0), "000-000");
        assert_eq!(format_pin(7), "000-007");
        assert_eq!(format_pin(123_456), "123-456");
        assert_eq!(format_pin(999_999), "999-999");
    }

    #[test]
    fn when_checking_shape_then_only_digit_groups_with_dash_pass() {
        assert!(is_well_formed("012-345"));
        assert!(!is_well_formed("012345"));
        assert!(!is_well_formed("012-34a"));
        assert!(!is_well_formed("0123-45"));
        assert!(!is_well_formed("012-3456"));
    }
}
