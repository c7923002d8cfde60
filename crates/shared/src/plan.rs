//! Subscription plan tiers
//!
//! A plan determines the monthly call quota. Quotas are soft caps: the usage
//! meter keeps counting past the limit and enforcement is advisory.

use serde::{Deserialize, Serialize};

/// Subscription plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Starter,
    Pro,
}

impl Plan {
    /// Monthly completed-call quota for this tier.
    pub fn calls_limit(&self) -> i32 {
        match self {
            Plan::Free => 10,
            Plan::Starter => 100,
            Plan::Pro => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Starter => "starter",
            Plan::Pro => "pro",
        }
    }

    /// Parse a plan name as carried in checkout metadata or stored in the DB.
    pub fn from_str(s: &str) -> Option<Plan> {
        match s {
            "free" => Some(Plan::Free),
            "starter" => Some(Plan::Starter),
            "pro" => Some(Plan::Pro),
            _ => None,
        }
    }

    /// Plans that can be purchased through checkout.
    pub fn purchasable(&self) -> bool {
        !matches!(self, Plan::Free)
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_per_tier() {
        assert_eq!(Plan::Free.calls_limit(), 10);
        assert_eq!(Plan::Starter.calls_limit(), 100);
        assert_eq!(Plan::Pro.calls_limit(), 500);
    }

    #[test]
    fn round_trips_names() {
        for plan in [Plan::Free, Plan::Starter, Plan::Pro] {
            assert_eq!(Plan::from_str(plan.as_str()), Some(plan));
        }
        assert_eq!(Plan::from_str("enterprise"), None);
    }

    #[test]
    fn free_is_not_purchasable() {
        assert!(!Plan::Free.purchasable());
        assert!(Plan::Starter.purchasable());
        assert!(Plan::Pro.purchasable());
    }
}
