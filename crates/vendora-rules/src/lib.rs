//! Vendora Rules - Commission rule resolution
//!
//! Given a sale context, selects the single applicable `CommissionRule` and
//! materializes its rate schedule for the ledger.
//!
//! Ranking is specificity first, then priority, then recency:
//! vendor-specific beats product/category-specific beats store-specific
//! beats all-products; within equal specificity lower `priority` wins; ties
//! go to the most recently created rule. If nothing matches, the (tenant,
//! store) default rule applies; if there is no default either, resolution
//! fails loudly with `NoApplicableRule` rather than pricing at zero.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vendora_store::RuleRepository;
use vendora_types::{
    AppliesTo, CommissionRule, Money, RateKind, RateTier, Result, SaleContext, TierBasis,
    VendoraError,
};

/// A rate schedule ready for commission arithmetic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RateSchedule {
    Percentage { rate: Decimal },
    Fixed { amount: Money },
    Tiered { tiers: Vec<RateTier>, basis: TierBasis },
}

/// The winning rule plus its materialized schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRule {
    pub rule: CommissionRule,
    pub schedule: RateSchedule,
}

/// Resolves the one rule that prices a sale
pub struct RuleResolver {
    rules: Arc<dyn RuleRepository>,
}

impl RuleResolver {
    pub fn new(rules: Arc<dyn RuleRepository>) -> Self {
        Self { rules }
    }

    /// Select the applicable rule for a sale context
    pub async fn resolve(&self, ctx: &SaleContext) -> Result<ResolvedRule> {
        let candidates = self
            .rules
            .list_active(&ctx.tenant_id, &ctx.store_id)
            .await?;

        let mut matching: Vec<(u8, &CommissionRule)> = candidates
            .iter()
            .filter(|r| r.is_live_at(ctx.occurred_at) && rule_matches(r, ctx))
            .map(|r| (specificity(r, ctx), r))
            .collect();

        // Specificity desc, priority asc, created_at desc, id as a stable
        // final tie-break
        matching.sort_by(|(sa, a), (sb, b)| {
            sb.cmp(sa)
                .then_with(|| a.priority.cmp(&b.priority))
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| b.id.cmp(&a.id))
        });

        if let Some((spec, rule)) = matching.first() {
            debug!(rule = %rule.id, specificity = *spec, "rule resolved");
            return Ok(materialize((*rule).clone()));
        }

        // No match: fall back to the scope's default rule
        if let Some(default) = self
            .rules
            .find_default(&ctx.tenant_id, &ctx.store_id)
            .await?
        {
            if default.is_live_at(ctx.occurred_at) {
                debug!(rule = %default.id, "default rule resolved");
                return Ok(materialize(default));
            }
        }

        Err(VendoraError::NoApplicableRule {
            vendor_id: ctx.vendor_id.to_string(),
            order_id: ctx.order_id.to_string(),
        })
    }
}

/// Scope check: a rule prices a sale only if every scoped field agrees
fn rule_matches(rule: &CommissionRule, ctx: &SaleContext) -> bool {
    if let Some(vendor) = &rule.vendor_id {
        if vendor != &ctx.vendor_id {
            return false;
        }
    }
    if let Some(store) = &rule.store_id {
        if store != &ctx.store_id {
            return false;
        }
    }
    match &rule.applies_to {
        AppliesTo::AllProducts => true,
        AppliesTo::Products(products) => products.contains(&ctx.product_id),
        AppliesTo::Categories(categories) => categories
            .iter()
            .any(|c| ctx.category_ids.contains(c)),
        AppliesTo::Vendors(vendors) => vendors.contains(&ctx.vendor_id),
    }
}

/// Vendor-specific (3) > product/category-specific (2) > store-specific (1)
/// > all-products (0)
fn specificity(rule: &CommissionRule, ctx: &SaleContext) -> u8 {
    let vendor_scoped = rule.vendor_id.as_ref() == Some(&ctx.vendor_id)
        || matches!(&rule.applies_to, AppliesTo::Vendors(v) if v.contains(&ctx.vendor_id));
    if vendor_scoped {
        return 3;
    }
    if matches!(
        &rule.applies_to,
        AppliesTo::Products(_) | AppliesTo::Categories(_)
    ) {
        return 2;
    }
    if rule.store_id.is_some() {
        return 1;
    }
    0
}

fn materialize(rule: CommissionRule) -> ResolvedRule {
    let schedule = match &rule.rate_kind {
        RateKind::Percentage { rate } => RateSchedule::Percentage { rate: *rate },
        RateKind::Fixed { amount } => RateSchedule::Fixed { amount: *amount },
        RateKind::Tiered { tiers, basis } => RateSchedule::Tiered {
            tiers: tiers.clone(),
            basis: *basis,
        },
    };
    ResolvedRule { rule, schedule }
}
