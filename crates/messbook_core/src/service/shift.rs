//! Shift authorization.
//!
//! # Responsibility
//! - Derive which member is on duty for a day.
//! - Apply the configured proxy/shift policy to new or edited entries.
//!
//! # Invariants
//! - Proxy attribution never changes who is credited; only `payer_id` is.
//! - `Permissive` never rejects; `Warn` only logs; `Strict` rejects when the
//!   attributed member is off shift on the entry date.

use crate::error::PermissionDenied;
use crate::model::member::{Member, MemberId, Roster};
use chrono::{Datelike, NaiveDate};
use log::warn;
use serde::{Deserialize, Serialize};

/// How shift coverage is enforced on expense attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftPolicy {
    /// Record only.
    #[default]
    Permissive,
    /// Log a warning when attribution falls outside the member's shift.
    Warn,
    /// Reject attribution outside the member's shift.
    Strict,
}

/// First member (roster order) whose shift contains `day`.
///
/// Returns `None` when the roster leaves `day` uncovered.
pub fn active_manager(day: u32, roster: &Roster) -> Option<&Member> {
    roster.members().iter().find(|member| member.covers(day))
}

/// Whether `day` is inside `member_id`'s shift; `false` when unrostered.
pub fn is_on_shift(member_id: MemberId, day: u32, roster: &Roster) -> bool {
    roster
        .get(member_id)
        .map(|member| member.covers(day))
        .unwrap_or(false)
}

/// Whether `actor_id` may name `target_id` as the attributed member.
///
/// Any rostered member may be named; the entry is a proxy purchase exactly
/// when the two ids differ.
pub fn can_attribute_proxy(actor_id: MemberId, target_id: MemberId, roster: &Roster) -> bool {
    roster.contains(actor_id) && roster.contains(target_id)
}

/// Applies `policy` to an entry attributed to `attributed_id` on `date`.
pub fn check_attribution(
    policy: ShiftPolicy,
    roster: &Roster,
    payer_id: MemberId,
    attributed_id: MemberId,
    date: NaiveDate,
) -> Result<(), PermissionDenied> {
    if policy == ShiftPolicy::Permissive || is_on_shift(attributed_id, date.day(), roster) {
        return Ok(());
    }

    match policy {
        ShiftPolicy::Strict => Err(PermissionDenied::OffShift {
            member_id: attributed_id,
            date,
        }),
        _ => {
            warn!(
                "event=shift_policy module=service status=warn payer={payer_id} attributed={attributed_id} date={date} reason=off_shift"
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::member::Member;

    fn roster() -> Roster {
        Roster::new(vec![
            Member::new(1, "Rahim", 1, 15),
            Member::new(2, "Karim", 16, 28),
        ])
        .expect("valid roster")
    }

    #[test]
    fn active_manager_follows_shift_ranges() {
        let roster = roster();
        assert_eq!(active_manager(1, &roster).map(|m| m.id), Some(1));
        assert_eq!(active_manager(15, &roster).map(|m| m.id), Some(1));
        assert_eq!(active_manager(16, &roster).map(|m| m.id), Some(2));
        assert!(active_manager(30, &roster).is_none());
    }

    #[test]
    fn is_on_shift_is_false_for_unknown_members() {
        let roster = roster();
        assert!(is_on_shift(2, 20, &roster));
        assert!(!is_on_shift(2, 3, &roster));
        assert!(!is_on_shift(9, 3, &roster));
    }

    #[test]
    fn proxy_attribution_only_requires_rostered_members() {
        let roster = roster();
        assert!(can_attribute_proxy(2, 1, &roster));
        assert!(can_attribute_proxy(1, 1, &roster));
        assert!(!can_attribute_proxy(2, 7, &roster));
    }

    #[test]
    fn strict_policy_rejects_off_shift_attribution() {
        let roster = roster();
        let date = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();

        assert!(check_attribution(ShiftPolicy::Permissive, &roster, 1, 1, date).is_ok());
        assert!(check_attribution(ShiftPolicy::Warn, &roster, 1, 1, date).is_ok());
        assert_eq!(
            check_attribution(ShiftPolicy::Strict, &roster, 1, 1, date).unwrap_err(),
            PermissionDenied::OffShift { member_id: 1, date }
        );
        assert!(check_attribution(ShiftPolicy::Strict, &roster, 1, 2, date).is_ok());
    }
}
