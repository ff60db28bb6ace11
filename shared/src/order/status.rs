//! Canonical order status taxonomy
//!
//! The dispatch provider reports order state in its own loose vocabulary
//! (`NOT_ACCEPTED`, `READY_TO_DELIVER`, `Already Delivered`, ...). Every raw
//! string is resolved through a closed alias table; anything outside the
//! table resolves to `None` and the caller must skip the update.
//!
//! ```text
//! NOT_ASSIGNED → STARTED → PICKED_UP → IN_TRANSIT → ALREADY_DELIVERED*
//!        └──────────┴──────────┴──────────┴──→ CANCELLED* | FAILED_DELIVERY*
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical order lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    NotAssigned,
    Started,
    PickedUp,
    InTransit,
    AlreadyDelivered,
    Cancelled,
    FailedDelivery,
}

impl OrderStatus {
    /// Every canonical state, in lifecycle order
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::NotAssigned,
        OrderStatus::Started,
        OrderStatus::PickedUp,
        OrderStatus::InTransit,
        OrderStatus::AlreadyDelivered,
        OrderStatus::Cancelled,
        OrderStatus::FailedDelivery,
    ];

    /// Provider spellings accepted for this state (already normalized:
    /// uppercase, separators removed)
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            OrderStatus::NotAssigned => &[
                "NOTASSIGNED",
                "UNASSIGNED",
                "NOTACCEPTED",
                "NOTSTARTEDYET",
                "PENDING",
                "CREATED",
            ],
            OrderStatus::Started => &["STARTED", "ACCEPTED", "ASSIGNED"],
            OrderStatus::PickedUp => &["PICKEDUP"],
            OrderStatus::InTransit => &["READYTODELIVER", "INTRANSIT", "ONTHEWAY"],
            OrderStatus::AlreadyDelivered => &["ALREADYDELIVERED", "DELIVERED", "COMPLETED"],
            OrderStatus::Cancelled => &["CANCELLED", "CANCELED"],
            OrderStatus::FailedDelivery => &["FAILEDDELIVERY", "INCOMPLETE", "FAILED"],
        }
    }

    /// Resolve a raw provider status string
    ///
    /// Matching ignores case, surrounding whitespace and any `_`, `-` or
    /// space separators. Returns `None` for anything not in the alias table.
    pub fn from_provider(raw: &str) -> Option<Self> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|status| status.aliases().contains(&normalized.as_str()))
    }

    /// Native provider spelling for this state
    pub fn to_provider(&self) -> &'static str {
        match self {
            OrderStatus::NotAssigned => "NOT_ASSIGNED",
            OrderStatus::Started => "STARTED",
            OrderStatus::PickedUp => "PICKED_UP",
            OrderStatus::InTransit => "READY_TO_DELIVER",
            OrderStatus::AlreadyDelivered => "ALREADY_DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::FailedDelivery => "FAILED_DELIVERY",
        }
    }

    /// Local-facing label shown in the business and driver portals
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::NotAssigned => "Searching for driver",
            OrderStatus::Started => "Driver assigned",
            OrderStatus::PickedUp => "Picked up",
            OrderStatus::InTransit => "On the way",
            OrderStatus::AlreadyDelivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::FailedDelivery => "Delivery failed",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(
            self,
            OrderStatus::AlreadyDelivered | OrderStatus::Cancelled | OrderStatus::FailedDelivery
        )
    }

    /// Final and successful: the only state that triggers settlement
    pub fn is_delivered(&self) -> bool {
        matches!(self, OrderStatus::AlreadyDelivered)
    }

    /// Position in the forward chain. Terminal failure states share the
    /// highest rank so nothing can follow them.
    pub fn rank(&self) -> u8 {
        match self {
            OrderStatus::NotAssigned => 0,
            OrderStatus::Started => 1,
            OrderStatus::PickedUp => 2,
            OrderStatus::InTransit => 3,
            OrderStatus::AlreadyDelivered
            | OrderStatus::Cancelled
            | OrderStatus::FailedDelivery => 4,
        }
    }

    /// Whether moving from `self` to `next` respects the partial order
    ///
    /// Staying in place is allowed. Final states never move. Forward jumps
    /// (e.g. NOT_ASSIGNED straight to PICKED_UP when a poll missed steps)
    /// are allowed.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if *self == next {
            return true;
        }
        if self.is_final() {
            return false;
        }
        match next {
            OrderStatus::Cancelled | OrderStatus::FailedDelivery => true,
            _ => next.rank() > self.rank(),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::NotAssigned => "NOT_ASSIGNED",
            OrderStatus::Started => "STARTED",
            OrderStatus::PickedUp => "PICKED_UP",
            OrderStatus::InTransit => "IN_TRANSIT",
            OrderStatus::AlreadyDelivered => "ALREADY_DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::FailedDelivery => "FAILED_DELIVERY",
        };
        f.write_str(s)
    }
}

fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_uppercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_provider_native_names() {
        assert_eq!(
            OrderStatus::from_provider("NOT_ASSIGNED"),
            Some(OrderStatus::NotAssigned)
        );
        assert_eq!(
            OrderStatus::from_provider("READY_TO_DELIVER"),
            Some(OrderStatus::InTransit)
        );
        assert_eq!(
            OrderStatus::from_provider("ALREADY_DELIVERED"),
            Some(OrderStatus::AlreadyDelivered)
        );
        assert_eq!(
            OrderStatus::from_provider("INCOMPLETE"),
            Some(OrderStatus::FailedDelivery)
        );
    }

    #[test]
    fn test_from_provider_is_case_and_separator_insensitive() {
        assert_eq!(
            OrderStatus::from_provider("  picked up "),
            Some(OrderStatus::PickedUp)
        );
        assert_eq!(
            OrderStatus::from_provider("Picked-Up"),
            Some(OrderStatus::PickedUp)
        );
        assert_eq!(
            OrderStatus::from_provider("already_delivered"),
            Some(OrderStatus::AlreadyDelivered)
        );
        assert_eq!(
            OrderStatus::from_provider("canceled"),
            Some(OrderStatus::Cancelled)
        );
    }

    #[test]
    fn test_from_provider_unknown_is_none() {
        assert_eq!(OrderStatus::from_provider("TELEPORTED"), None);
        assert_eq!(OrderStatus::from_provider(""), None);
        assert_eq!(OrderStatus::from_provider("   "), None);
    }

    #[test]
    fn test_provider_round_trip_for_every_state() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::from_provider(status.to_provider()), Some(status));
        }
    }

    #[test]
    fn test_final_flags() {
        let finals: Vec<_> = OrderStatus::ALL.into_iter().filter(|s| s.is_final()).collect();
        assert_eq!(
            finals,
            vec![
                OrderStatus::AlreadyDelivered,
                OrderStatus::Cancelled,
                OrderStatus::FailedDelivery
            ]
        );
        assert!(OrderStatus::AlreadyDelivered.is_delivered());
        assert!(!OrderStatus::Cancelled.is_delivered());
    }

    #[test]
    fn test_transitions_forward_only() {
        assert!(OrderStatus::NotAssigned.can_transition_to(OrderStatus::Started));
        assert!(OrderStatus::Started.can_transition_to(OrderStatus::InTransit));
        assert!(!OrderStatus::PickedUp.can_transition_to(OrderStatus::Started));
        assert!(!OrderStatus::InTransit.can_transition_to(OrderStatus::NotAssigned));
        assert!(OrderStatus::InTransit.can_transition_to(OrderStatus::InTransit));
    }

    #[test]
    fn test_terminal_states_reachable_from_non_terminal() {
        for status in OrderStatus::ALL.into_iter().filter(|s| !s.is_final()) {
            assert!(status.can_transition_to(OrderStatus::Cancelled));
            assert!(status.can_transition_to(OrderStatus::FailedDelivery));
        }
    }

    #[test]
    fn test_final_states_are_sticky() {
        assert!(!OrderStatus::AlreadyDelivered.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::AlreadyDelivered));
        assert!(!OrderStatus::FailedDelivery.can_transition_to(OrderStatus::InTransit));
    }

    #[test]
    fn test_serde_uses_canonical_names() {
        let json = serde_json::to_string(&OrderStatus::AlreadyDelivered).unwrap();
        assert_eq!(json, "\"ALREADY_DELIVERED\"");
        let parsed: OrderStatus = serde_json::from_str("\"IN_TRANSIT\"").unwrap();
        assert_eq!(parsed, OrderStatus::InTransit);
        assert_eq!(OrderStatus::InTransit.to_string(), "IN_TRANSIT");
    }
}
