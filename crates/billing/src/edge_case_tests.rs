// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Edge case tests for the billing engine
//!
//! Boundary conditions across the pure decision cores:
//! - Posting allowance policy (membership, free allowance, wallet charge)
//! - GST computation (identity, splits, rounding)
//! - Renewal decisions
//! - Invoice numbering and document titles
//! - Ledger formatting conventions

#[cfg(test)]
mod posting_policy_tests {
    use crate::posting::*;
    use crate::pricing::ResolvedPricing;
    use time::{Duration, OffsetDateTime};

    fn user(balance: i64, free_used: i32) -> UserSnapshot {
        UserSnapshot {
            wallet_balance_paise: balance,
            free_ads_used: free_used,
            membership_expires_at: None,
        }
    }

    fn fee(fee_paise: i64) -> ResolvedPricing {
        ResolvedPricing {
            fee_paise,
            validity_days: 30,
            pricing_type: "standard".to_string(),
        }
    }

    // =========================================================================
    // Free allowance exhausts exactly at the limit
    // =========================================================================
    #[test]
    fn test_sixth_ad_charges_after_five_free() {
        let now = OffsetDateTime::now_utc();

        // Ads 1..=5 are free regardless of wallet state.
        for used in 0..FREE_AD_LIMIT {
            assert_eq!(
                decide_posting(&user(0, used), &fee(1000), now),
                PostingDecision::FreeAllowance
            );
        }

        // Ad 6 charges the resolved category fee.
        assert_eq!(
            decide_posting(&user(2500, FREE_AD_LIMIT), &fee(1000), now),
            PostingDecision::Charge { fee_paise: 1000 }
        );
    }

    // =========================================================================
    // Membership one second from expiry still bypasses; at expiry it doesn't
    // =========================================================================
    #[test]
    fn test_membership_boundary() {
        let now = OffsetDateTime::now_utc();

        let mut member = user(0, FREE_AD_LIMIT);
        member.membership_expires_at = Some(now + Duration::seconds(1));
        assert_eq!(
            decide_posting(&member, &fee(1000), now),
            PostingDecision::MembershipFree
        );

        member.membership_expires_at = Some(now);
        assert!(matches!(
            decide_posting(&member, &fee(1000), now),
            PostingDecision::Blocked { .. }
        ));
    }

    // =========================================================================
    // One paisa short is blocked; the shortfall is exact
    // =========================================================================
    #[test]
    fn test_one_paisa_short() {
        let now = OffsetDateTime::now_utc();
        let decision = decide_posting(&user(999, FREE_AD_LIMIT), &fee(1000), now);
        assert_eq!(
            decision,
            PostingDecision::Blocked {
                required_paise: 1000,
                available_paise: 999
            }
        );
        assert_eq!(PostingQuote::from(&decision).shortfall_paise, Some(1));
    }

    // =========================================================================
    // Zero-fee category allows an empty wallet even past the allowance
    // =========================================================================
    #[test]
    fn test_zero_fee_category_with_empty_wallet() {
        let now = OffsetDateTime::now_utc();
        assert_eq!(
            decide_posting(&user(0, FREE_AD_LIMIT + 10), &fee(0), now),
            PostingDecision::FreeCategory
        );
    }

    // =========================================================================
    // Free allowance applies even when the category is priced free
    // =========================================================================
    #[test]
    fn test_allowance_consumed_before_fee_check() {
        let now = OffsetDateTime::now_utc();
        assert_eq!(
            decide_posting(&user(0, 0), &fee(0), now),
            PostingDecision::FreeAllowance
        );
    }
}

#[cfg(test)]
mod gst_tests {
    use crate::invoice::*;

    // =========================================================================
    // Identity base + gst == gross holds across a wide sweep
    // =========================================================================
    #[test]
    fn test_identity_sweep() {
        for gross in 1..=5000 {
            let b = compute_gst(gross, GstMode::IntraState);
            assert_eq!(b.base_paise + b.gst_paise, gross, "gross {}", gross);
            assert_eq!(b.cgst_paise + b.sgst_paise, b.gst_paise, "gross {}", gross);
            assert_eq!(b.igst_paise, 0);
        }
    }

    // =========================================================================
    // Odd-paisa GST splits without losing the odd paisa
    // =========================================================================
    #[test]
    fn test_odd_paisa_split() {
        // ₹100 gross: GST 1525 paise, an odd number.
        let b = compute_gst(10_000, GstMode::IntraState);
        assert_eq!(b.gst_paise % 2, 1);
        assert_eq!(b.cgst_paise, 762);
        assert_eq!(b.sgst_paise, 763);
        assert_eq!(b.cgst_paise + b.sgst_paise, b.gst_paise);
    }

    // =========================================================================
    // Tiny amounts: GST can round to zero but never goes negative
    // =========================================================================
    #[test]
    fn test_tiny_amounts() {
        for gross in 1..=10 {
            let b = compute_gst(gross, GstMode::IntraState);
            assert!(b.base_paise >= 0);
            assert!(b.gst_paise >= 0, "gross {} gst {}", gross, b.gst_paise);
        }

        // 1 paisa: base rounds to 1, GST is 0.
        let b = compute_gst(1, GstMode::IntraState);
        assert_eq!((b.base_paise, b.gst_paise), (1, 0));
    }

    // =========================================================================
    // A clean multiple of 1.18 has an exact base
    // =========================================================================
    #[test]
    fn test_exact_multiple() {
        // ₹118 gross = ₹100 base + ₹18 GST.
        let b = compute_gst(11_800, GstMode::IntraState);
        assert_eq!(b.base_paise, 10_000);
        assert_eq!(b.gst_paise, 1_800);
        assert_eq!(b.cgst_paise, 900);
        assert_eq!(b.sgst_paise, 900);
    }

    // =========================================================================
    // Exactly one split side is ever populated
    // =========================================================================
    #[test]
    fn test_exactly_one_split_side() {
        for gross in [118, 9_999, 123_456] {
            let intra = compute_gst(gross, GstMode::IntraState);
            assert!(intra.igst_paise == 0 && intra.cgst_paise + intra.sgst_paise == intra.gst_paise);

            let inter = compute_gst(gross, GstMode::InterState);
            assert!(inter.cgst_paise == 0 && inter.sgst_paise == 0);
            assert_eq!(inter.igst_paise, inter.gst_paise);
        }
    }

    // =========================================================================
    // Mode decision covers same-state, other-state, absent, malformed
    // =========================================================================
    #[test]
    fn test_mode_decision_table() {
        assert_eq!(gst_mode(None, "27"), GstMode::IntraState);
        assert_eq!(gst_mode(Some(""), "27"), GstMode::IntraState);
        assert_eq!(gst_mode(Some("2"), "27"), GstMode::IntraState);
        assert_eq!(gst_mode(Some("27ABCDE1234F1Z5"), "27"), GstMode::IntraState);
        assert_eq!(gst_mode(Some("07ABCDE1234F1Z5"), "27"), GstMode::InterState);
        assert_eq!(gst_mode(Some("33ABCDE1234F1Z5"), "27"), GstMode::InterState);
    }
}

#[cfg(test)]
mod renewal_tests {
    use crate::renewal::{decide_renewal, RenewalDecision};

    // =========================================================================
    // Balance exactly at the fee renews; one paisa under expires
    // =========================================================================
    #[test]
    fn test_renewal_boundary() {
        assert_eq!(
            decide_renewal(1000, 1000),
            RenewalDecision::Renew { charge_paise: 1000 }
        );
        assert_eq!(decide_renewal(999, 1000), RenewalDecision::Expire);
    }

    // =========================================================================
    // Zero-fee renewal succeeds with any balance
    // =========================================================================
    #[test]
    fn test_zero_fee_renewal() {
        assert_eq!(
            decide_renewal(0, 0),
            RenewalDecision::Renew { charge_paise: 0 }
        );
        assert_eq!(
            decide_renewal(5000, 0),
            RenewalDecision::Renew { charge_paise: 0 }
        );
    }
}

#[cfg(test)]
mod invoice_numbering_tests {
    use crate::invoice::*;

    // =========================================================================
    // Numbering restarts per year and pads to four digits
    // =========================================================================
    #[test]
    fn test_year_scoped_format() {
        assert_eq!(invoice_number(2025, 873), "INV-2025-0873");
        assert_eq!(invoice_number(2026, 1), "INV-2026-0001");
    }

    // =========================================================================
    // Sequence 10_000 and beyond widens instead of wrapping
    // =========================================================================
    #[test]
    fn test_wide_sequence() {
        assert_eq!(invoice_number(2026, 10_000), "INV-2026-10000");
    }

    // =========================================================================
    // Document title follows GSTIN presence only
    // =========================================================================
    #[test]
    fn test_title_ignores_amounts() {
        assert_eq!(document_title(Some("29AAPFU0939F1ZV")), "TAX INVOICE");
        assert_eq!(document_title(None), "INVOICE");
    }
}

#[cfg(test)]
mod ledger_convention_tests {
    use crate::wallet::*;

    // =========================================================================
    // Signed-amount convention: credits positive, debits negative
    // =========================================================================
    #[test]
    fn test_rupee_formatting_for_ledger_rows() {
        assert_eq!(format_rupees(10_000), "₹100.00");
        assert_eq!(format_rupees(-1_000), "-₹10.00");
        assert_eq!(format_rupees(1), "₹0.01");
    }

    #[test]
    fn test_tx_types_round_trip_as_tags() {
        for tx_type in [
            TxType::Topup,
            TxType::PostingFee,
            TxType::Renewal,
            TxType::ReferralBonus,
            TxType::Membership,
        ] {
            assert!(!tx_type.as_str().is_empty());
            // Tags are kebab-case for API payload parity.
            assert_eq!(tx_type.as_str(), tx_type.as_str().to_lowercase());
        }
    }
}
