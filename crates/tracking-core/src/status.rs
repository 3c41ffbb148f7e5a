//! Ordered substring matching for carrier status descriptions
//!
//! Each carrier maps its status text onto the canonical enum through an
//! ordered rule list: the first rule with any matching term wins.
//! Precedence is encoded purely by rule order: "delivered" outranks
//! "exception" in every carrier's table because its rule comes first.
//! Callers fall back to `InTransit` when no rule matches.

use crate::model::TrackingStatus;

/// One status-mapping rule: any of `terms` (lowercase) found as a
/// substring of the description selects `status`.
pub struct StatusRule {
    pub terms: &'static [&'static str],
    pub status: TrackingStatus,
}

/// Match a status description against an ordered rule list.
///
/// Matching is case-insensitive; rule terms must be stored lowercase.
pub fn match_status(description: &str, rules: &[StatusRule]) -> Option<TrackingStatus> {
    let lower = description.to_lowercase();
    rules
        .iter()
        .find(|rule| rule.terms.iter().any(|term| lower.contains(term)))
        .map(|rule| rule.status)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &[StatusRule] = &[
        StatusRule {
            terms: &["delivered"],
            status: TrackingStatus::Delivered,
        },
        StatusRule {
            terms: &["out for delivery"],
            status: TrackingStatus::OutForDelivery,
        },
        StatusRule {
            terms: &["in transit", "departed", "arrived"],
            status: TrackingStatus::InTransit,
        },
        StatusRule {
            terms: &["exception", "delayed"],
            status: TrackingStatus::Exception,
        },
    ];

    #[test]
    fn first_matching_rule_wins() {
        // Both "delivered" and "exception" appear; the delivered rule
        // comes first in the list, so it takes precedence.
        assert_eq!(
            match_status("Delivered after exception", RULES),
            Some(TrackingStatus::Delivered)
        );
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(
            match_status("OUT FOR DELIVERY", RULES),
            Some(TrackingStatus::OutForDelivery)
        );
        assert_eq!(
            match_status("Departed FedEx location", RULES),
            Some(TrackingStatus::InTransit)
        );
    }

    #[test]
    fn no_match_returns_none() {
        assert_eq!(match_status("On vehicle somewhere", RULES), None);
        assert_eq!(match_status("", RULES), None);
    }

    #[test]
    fn any_term_in_a_rule_matches() {
        assert_eq!(
            match_status("Shipment delayed by weather", RULES),
            Some(TrackingStatus::Exception)
        );
    }
}
