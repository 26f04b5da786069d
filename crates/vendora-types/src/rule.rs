//! Commission rule types
//!
//! A `CommissionRule` is a pricing policy owned by platform operators.
//! Rules are never deleted, only deactivated, so a historical transaction
//! can always name the rule that priced it.
//!
//! # Invariants
//!
//! 1. At most one default rule per (tenant, store)
//! 2. Tier schedules are ordered, non-overlapping `[lower, upper)` bands
//! 3. Percentage rates stay within `[0, 1]`

use crate::{
    CategoryId, CurrencyCode, Money, ProductId, Result, RuleId, StoreId, TenantId, VendoraError,
    VendorId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleStatus {
    /// Eligible for resolution
    Active,
    /// Retained for audit, never resolved
    Inactive,
}

/// The amount a tier walk applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TierBasis {
    /// This sale's gross alone
    TransactionGross,
    /// The vendor's lifetime sale gross with this sale appended
    CumulativeVendorVolume,
}

/// One band of a tiered schedule, `[lower, upper)` in minor units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTier {
    /// Inclusive lower bound
    pub lower: i64,
    /// Exclusive upper bound; `None` means open-ended
    pub upper: Option<i64>,
    /// Rate applied to the portion inside the band
    pub rate: Decimal,
}

/// How the commission amount is derived from gross
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RateKind {
    /// `gross * rate`, rounded half-up
    Percentage { rate: Decimal },
    /// A flat amount, capped at gross
    Fixed { amount: Money },
    /// Progressive accumulation across ordered bands
    Tiered { tiers: Vec<RateTier>, basis: TierBasis },
}

/// Which sales a rule applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppliesTo {
    /// Every sale in scope
    AllProducts,
    /// Sales of any listed product
    Products(Vec<ProductId>),
    /// Sales whose order categories intersect the listed set
    Categories(Vec<CategoryId>),
    /// Sales by any listed vendor
    Vendors(Vec<VendorId>),
}

/// A commission pricing policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionRule {
    /// Unique rule ID
    pub id: RuleId,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Store scope; `None` is tenant-wide
    pub store_id: Option<StoreId>,
    /// Vendor scope; `None` is any vendor
    pub vendor_id: Option<VendorId>,
    /// Lower wins within equal specificity
    pub priority: i32,
    /// How commission is derived
    pub rate_kind: RateKind,
    /// Which sales the rule applies to
    pub applies_to: AppliesTo,
    /// Start of validity window (inclusive)
    pub valid_from: DateTime<Utc>,
    /// End of validity window (exclusive); `None` is open-ended
    pub valid_to: Option<DateTime<Utc>>,
    /// Lifecycle status
    pub status: RuleStatus,
    /// Fallback rule when nothing else matches the (tenant, store)
    pub is_default: bool,
    /// When the rule was created; later creation wins priority ties
    pub created_at: DateTime<Utc>,
}

impl CommissionRule {
    /// Check if the rule is active and inside its validity window
    pub fn is_live_at(&self, as_of: DateTime<Utc>) -> bool {
        if self.status != RuleStatus::Active {
            return false;
        }
        if as_of < self.valid_from {
            return false;
        }
        match self.valid_to {
            Some(until) => as_of < until,
            None => true,
        }
    }

    /// Validate the rule's rate definition
    pub fn validate(&self) -> Result<()> {
        match &self.rate_kind {
            RateKind::Percentage { rate } => {
                if *rate < Decimal::ZERO || *rate > Decimal::ONE {
                    return Err(VendoraError::invalid_input(
                        "rate",
                        "percentage rate must be within [0, 1]",
                    ));
                }
            }
            RateKind::Fixed { amount } => {
                if amount.is_negative() {
                    return Err(VendoraError::invalid_input(
                        "amount",
                        "fixed commission must not be negative",
                    ));
                }
            }
            RateKind::Tiered { tiers, .. } => validate_tiers(tiers)?,
        }
        Ok(())
    }

    /// The currency a fixed-amount rule settles in, if any
    pub fn fixed_currency(&self) -> Option<CurrencyCode> {
        match &self.rate_kind {
            RateKind::Fixed { amount } => Some(amount.currency),
            _ => None,
        }
    }
}

/// Reject overlapping, unordered, or ill-formed tier schedules
pub fn validate_tiers(tiers: &[RateTier]) -> Result<()> {
    if tiers.is_empty() {
        return Err(VendoraError::InvalidTierSchedule {
            reason: "schedule has no tiers".to_string(),
        });
    }
    let mut previous_upper: Option<i64> = None;
    for (i, tier) in tiers.iter().enumerate() {
        if tier.rate < Decimal::ZERO || tier.rate > Decimal::ONE {
            return Err(VendoraError::InvalidTierSchedule {
                reason: format!("tier {} rate must be within [0, 1]", i),
            });
        }
        if let Some(upper) = tier.upper {
            if upper <= tier.lower {
                return Err(VendoraError::InvalidTierSchedule {
                    reason: format!("tier {} has upper <= lower", i),
                });
            }
        } else if i != tiers.len() - 1 {
            return Err(VendoraError::InvalidTierSchedule {
                reason: format!("open-ended tier {} must be last", i),
            });
        }
        if let Some(prev) = previous_upper {
            if tier.lower < prev {
                return Err(VendoraError::InvalidTierSchedule {
                    reason: format!("tier {} overlaps the previous band", i),
                });
            }
        }
        previous_upper = tier.upper;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tier(lower: i64, upper: Option<i64>, rate: Decimal) -> RateTier {
        RateTier { lower, upper, rate }
    }

    #[test]
    fn test_valid_tier_schedule() {
        let tiers = vec![
            tier(0, Some(5_000), dec!(0.05)),
            tier(5_000, None, dec!(0.08)),
        ];
        assert!(validate_tiers(&tiers).is_ok());
    }

    #[test]
    fn test_overlapping_tiers_rejected() {
        let tiers = vec![
            tier(0, Some(5_000), dec!(0.05)),
            tier(4_000, None, dec!(0.08)),
        ];
        assert!(matches!(
            validate_tiers(&tiers),
            Err(VendoraError::InvalidTierSchedule { .. })
        ));
    }

    #[test]
    fn test_open_ended_tier_must_be_last() {
        let tiers = vec![tier(0, None, dec!(0.05)), tier(5_000, None, dec!(0.08))];
        assert!(validate_tiers(&tiers).is_err());
    }

    #[test]
    fn test_empty_schedule_rejected() {
        assert!(validate_tiers(&[]).is_err());
    }

    #[test]
    fn test_validity_window() {
        let rule = CommissionRule {
            id: RuleId::new(),
            tenant_id: TenantId::new(),
            store_id: None,
            vendor_id: None,
            priority: 100,
            rate_kind: RateKind::Percentage { rate: dec!(0.10) },
            applies_to: AppliesTo::AllProducts,
            valid_from: Utc::now() - chrono::Duration::days(1),
            valid_to: Some(Utc::now() + chrono::Duration::days(1)),
            status: RuleStatus::Active,
            is_default: false,
            created_at: Utc::now(),
        };
        assert!(rule.is_live_at(Utc::now()));
        assert!(!rule.is_live_at(Utc::now() + chrono::Duration::days(2)));
        assert!(!rule.is_live_at(Utc::now() - chrono::Duration::days(2)));
    }

    #[test]
    fn test_percentage_rate_bounds() {
        let mut rule = CommissionRule {
            id: RuleId::new(),
            tenant_id: TenantId::new(),
            store_id: None,
            vendor_id: None,
            priority: 100,
            rate_kind: RateKind::Percentage { rate: dec!(1.5) },
            applies_to: AppliesTo::AllProducts,
            valid_from: Utc::now(),
            valid_to: None,
            status: RuleStatus::Active,
            is_default: false,
            created_at: Utc::now(),
        };
        assert!(rule.validate().is_err());
        rule.rate_kind = RateKind::Percentage { rate: dec!(0.10) };
        assert!(rule.validate().is_ok());
    }
}
