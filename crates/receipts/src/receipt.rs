use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use amo_core::{DomainError, DomainResult, Entity, ReceiptId, ScanId, UserId};

/// Receipt fields supplied by the issuing company admin.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReceipt {
    #[serde(default)]
    pub code: String,
    pub amount: i64,
    #[serde(default)]
    pub vat_amount: i64,
    #[serde(default)]
    pub items: JsonValue,
}

/// Amounts are integer minor units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub id: ReceiptId,
    pub code: String,
    pub user_id: UserId,
    pub amount: i64,
    pub vat_amount: i64,
    pub items: JsonValue,
    pub created_at: DateTime<Utc>,
}

pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

impl Receipt {
    pub fn record(owner: UserId, input: NewReceipt, now: DateTime<Utc>) -> DomainResult<Self> {
        let code = normalize_code(&input.code);
        if code.is_empty() {
            return Err(DomainError::validation("Receipt code is required"));
        }
        if input.amount < 0 || input.vat_amount < 0 {
            return Err(DomainError::validation("amounts cannot be negative"));
        }
        if input.vat_amount > input.amount {
            return Err(DomainError::validation("vatAmount cannot exceed amount"));
        }
        let items = match input.items {
            JsonValue::Null => JsonValue::Array(vec![]),
            other => other,
        };
        Ok(Self {
            id: ReceiptId::new(),
            code,
            user_id: owner,
            amount: input.amount,
            vat_amount: input.vat_amount,
            items,
            created_at: now,
        })
    }
}

impl Entity for Receipt {
    type Id = ReceiptId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// A signed-in user looked a receipt up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scan {
    pub id: ScanId,
    pub user_id: UserId,
    pub receipt_id: ReceiptId,
    pub created_at: DateTime<Utc>,
}

impl Scan {
    pub fn of(receipt: &Receipt, scanned_by: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: ScanId::new(),
            user_id: scanned_by,
            receipt_id: receipt.id,
            created_at: now,
        }
    }
}
