//! Vendor directory
//!
//! Per-vendor settlement profile: where their money goes, what currency
//! their balance reads in, and whether their payouts need a human.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use vendora_batching::RiskPolicy;
use vendora_types::{CurrencyCode, Result, VendoraError, VendorId};

/// A vendor's settlement profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorProfile {
    pub vendor_id: VendorId,
    /// Provider-side destination (account token, IBAN, etc.)
    pub payout_destination: String,
    /// Currency the vendor's balance and statements read in
    pub currency: CurrencyCode,
    /// High-risk vendors need approval on every payout
    pub high_risk: bool,
    pub created_at: DateTime<Utc>,
}

impl VendorProfile {
    pub fn new(vendor_id: VendorId, payout_destination: impl Into<String>, currency: CurrencyCode) -> Self {
        Self {
            vendor_id,
            payout_destination: payout_destination.into(),
            currency,
            high_risk: false,
            created_at: Utc::now(),
        }
    }
}

/// Registry of vendor profiles
#[derive(Default)]
pub struct VendorDirectory {
    profiles: DashMap<VendorId, VendorProfile>,
}

impl VendorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a vendor's profile
    pub fn register(&self, profile: VendorProfile) {
        self.profiles.insert(profile.vendor_id.clone(), profile);
    }

    /// Get a vendor's profile
    pub fn get(&self, vendor: &VendorId) -> Result<VendorProfile> {
        self.profiles
            .get(vendor)
            .map(|p| p.clone())
            .ok_or_else(|| VendoraError::VendorNotFound {
                vendor_id: vendor.to_string(),
            })
    }

    /// Flag or clear a vendor's high-risk status
    pub fn set_high_risk(&self, vendor: &VendorId, high_risk: bool) -> Result<()> {
        let mut profile = self
            .profiles
            .get_mut(vendor)
            .ok_or_else(|| VendoraError::VendorNotFound {
                vendor_id: vendor.to_string(),
            })?;
        profile.high_risk = high_risk;
        Ok(())
    }

    /// Update where a vendor's payouts transfer to
    pub fn set_destination(&self, vendor: &VendorId, destination: impl Into<String>) -> Result<()> {
        let mut profile = self
            .profiles
            .get_mut(vendor)
            .ok_or_else(|| VendoraError::VendorNotFound {
                vendor_id: vendor.to_string(),
            })?;
        profile.payout_destination = destination.into();
        Ok(())
    }
}

#[async_trait::async_trait]
impl RiskPolicy for VendorDirectory {
    async fn is_high_risk(&self, vendor: &VendorId) -> bool {
        self.profiles
            .get(vendor)
            .map(|p| p.high_risk)
            .unwrap_or(false)
    }
}
