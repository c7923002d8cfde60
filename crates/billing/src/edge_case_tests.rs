// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Edge case tests for the billing event pipeline
//!
//! Boundary conditions in:
//! - Webhook payload parsing
//! - Usage percentage arithmetic
//! - Plan metadata handling

mod event_parsing {
    use crate::events::{BillingEvent, EventPayload};

    #[test]
    fn checkout_without_metadata_fails_to_parse() {
        // The checkout session metadata carries the account id; without it the
        // event cannot be tied to an account and must be rejected at parse
        // time, not deep inside a handler.
        let raw = serde_json::json!({
            "id": "evt_1",
            "type": "checkout.completed",
            "created": 1_724_800_000,
            "data": { "customer": "cus_1", "subscription": "sub_1" }
        });

        assert!(serde_json::from_value::<BillingEvent>(raw).is_err());
    }

    #[test]
    fn malformed_account_id_fails_to_parse() {
        let raw = serde_json::json!({
            "id": "evt_2",
            "type": "checkout.completed",
            "created": 1_724_800_000,
            "data": {
                "customer": "cus_1",
                "subscription": "sub_1",
                "metadata": { "account_id": "not-a-uuid", "plan": "pro" }
            }
        });

        assert!(serde_json::from_value::<BillingEvent>(raw).is_err());
    }

    #[test]
    fn extra_provider_fields_are_tolerated() {
        // Providers add fields over time; unknown keys must not break parsing.
        let raw = serde_json::json!({
            "id": "evt_3",
            "type": "subscription.updated",
            "created": 1_724_800_000,
            "api_version": "2026-08-01",
            "data": {
                "id": "sub_1",
                "status": "active",
                "current_period_end": 1_727_400_000,
                "cancel_at_period_end": false,
                "items": []
            }
        });

        let event: BillingEvent = serde_json::from_value(raw).unwrap();
        assert!(matches!(event.payload, EventPayload::SubscriptionUpdated(_)));
    }

    #[test]
    fn status_is_copied_verbatim_even_when_unfamiliar() {
        // The state machine copies the provider's status string as-is; a
        // status we have no enum for is still applied, not dropped.
        let raw = serde_json::json!({
            "id": "evt_4",
            "type": "subscription.updated",
            "created": 1_724_800_000,
            "data": {
                "id": "sub_1",
                "status": "incomplete_expired",
                "current_period_end": 1_727_400_000
            }
        });

        let event: BillingEvent = serde_json::from_value(raw).unwrap();
        match event.payload {
            EventPayload::SubscriptionUpdated(update) => {
                assert_eq!(update.status, "incomplete_expired");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }
}

mod usage_boundaries {
    use crate::usage::usage_percent;

    #[test]
    fn one_call_on_free_tier_is_ten_percent() {
        assert_eq!(usage_percent(1, 10), 10);
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(usage_percent(5, 1000), 1); // 0.5% rounds to 1
        assert_eq!(usage_percent(4, 1000), 0); // 0.4% rounds to 0
    }

    #[test]
    fn exactly_at_limit_reads_one_hundred() {
        assert_eq!(usage_percent(10, 10), 100);
    }

    #[test]
    fn overage_is_clamped_not_overflowed() {
        assert_eq!(usage_percent(i32::MAX, 1), 100);
    }
}

mod plan_metadata {
    use switchboard_shared::Plan;

    #[test]
    fn unknown_plan_names_are_rejected() {
        // A checkout event carrying an unconfigured plan name must fail the
        // event (500, provider retries) rather than default to some quota.
        assert_eq!(Plan::from_str("enterprise"), None);
        assert_eq!(Plan::from_str("STARTER"), None);
        assert_eq!(Plan::from_str(""), None);
    }
}
