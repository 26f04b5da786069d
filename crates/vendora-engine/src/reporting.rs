//! Per-period vendor statements

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vendora_types::{
    CommissionTransaction, CurrencyCode, Money, Result, VendorId,
};

/// Aggregated view of a vendor's activity in one period and currency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorStatement {
    pub vendor_id: VendorId,
    pub currency: CurrencyCode,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    /// Number of sale rows
    pub sale_count: u32,
    /// Number of refund/chargeback rows
    pub reversal_count: u32,
    /// Gross inflow from sales
    pub gross_sales: Money,
    /// Gross outflow to reversals (positive magnitude)
    pub gross_reversed: Money,
    /// Commission retained, net of reversals
    pub commission: Money,
    /// Amount owed to the vendor, net of reversals
    pub net: Money,
}

/// Fold transaction rows into a statement
///
/// Rows in other currencies are ignored; callers query per currency.
pub fn build_statement(
    vendor_id: VendorId,
    currency: CurrencyCode,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    rows: &[CommissionTransaction],
) -> Result<VendorStatement> {
    let mut statement = VendorStatement {
        vendor_id,
        currency,
        period_start,
        period_end,
        sale_count: 0,
        reversal_count: 0,
        gross_sales: Money::zero(currency),
        gross_reversed: Money::zero(currency),
        commission: Money::zero(currency),
        net: Money::zero(currency),
    };
    for tx in rows.iter().filter(|tx| tx.gross.currency == currency) {
        if tx.is_reversal() {
            statement.reversal_count += 1;
            statement.gross_reversed = statement.gross_reversed.checked_add(tx.gross.abs())?;
        } else {
            statement.sale_count += 1;
            statement.gross_sales = statement.gross_sales.checked_add(tx.gross)?;
        }
        statement.commission = statement.commission.checked_add(tx.commission)?;
        statement.net = statement.net.checked_add(tx.net)?;
    }
    Ok(statement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use vendora_types::{
        LineItemId, OrderId, PayoutStatus, RuleId, StoreId, TenantId, TransactionId,
        TransactionKind, TransactionStatus,
    };

    fn row(kind: TransactionKind, gross: i64, commission: i64) -> CommissionTransaction {
        CommissionTransaction {
            id: TransactionId::new(),
            tenant_id: TenantId::new(),
            store_id: StoreId::new(),
            vendor_id: VendorId::new(),
            order_id: OrderId::new(),
            line_item_id: LineItemId::new(),
            rule_id: RuleId::new(),
            kind,
            gross: Money::new(gross, CurrencyCode::USD),
            commission_rate: rust_decimal::Decimal::ZERO,
            commission: Money::new(commission, CurrencyCode::USD),
            net: Money::new(gross - commission, CurrencyCode::USD),
            status: TransactionStatus::Approved,
            payout_status: PayoutStatus::Unpaid,
            transaction_date: Utc::now(),
            approved_at: Some(Utc::now()),
            paid_at: None,
            payout_id: None,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_statement_nets_reversals() {
        let rows = vec![
            row(TransactionKind::Sale, 10_000, 1_000),
            row(TransactionKind::Sale, 8_000, 490),
            row(TransactionKind::Refund, -10_000, -1_000),
        ];
        let statement = build_statement(
            VendorId::new(),
            CurrencyCode::USD,
            Utc::now() - Duration::days(7),
            Utc::now(),
            &rows,
        )
        .unwrap();

        assert_eq!(statement.sale_count, 2);
        assert_eq!(statement.reversal_count, 1);
        assert_eq!(statement.gross_sales.minor, 18_000);
        assert_eq!(statement.gross_reversed.minor, 10_000);
        assert_eq!(statement.commission.minor, 490);
        assert_eq!(statement.net.minor, 7_510);
    }

    #[test]
    fn test_other_currencies_ignored() {
        let mut eur = row(TransactionKind::Sale, 5_000, 500);
        eur.gross = Money::new(5_000, CurrencyCode::EUR);
        eur.commission = Money::new(500, CurrencyCode::EUR);
        eur.net = Money::new(4_500, CurrencyCode::EUR);
        let rows = vec![row(TransactionKind::Sale, 10_000, 1_000), eur];

        let statement = build_statement(
            VendorId::new(),
            CurrencyCode::USD,
            Utc::now() - Duration::days(7),
            Utc::now(),
            &rows,
        )
        .unwrap();
        assert_eq!(statement.sale_count, 1);
        assert_eq!(statement.gross_sales.minor, 10_000);
    }
}
