use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::impl_entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayType {
    Stripe,
    Paypal,
    Pse,
    Payu,
    Wompi,
    MercadoPago,
}

impl GatewayType {
    pub const fn label(self) -> &'static str {
        match self {
            GatewayType::Stripe => "STRIPE",
            GatewayType::Paypal => "PAYPAL",
            GatewayType::Pse => "PSE",
            GatewayType::Payu => "PAYU",
            GatewayType::Wompi => "WOMPI",
            GatewayType::MercadoPago => "MERCADO_PAGO",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayEnvironment {
    #[default]
    Sandbox,
    Production,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub id: u64,
    pub gateway_type: GatewayType,
    pub name: String,
    pub api_key: String,
    pub secret_key: String,
    pub webhook_secret: Option<String>,
    pub merchant_id: Option<String>,
    pub environment: GatewayEnvironment,
    pub supported_currencies: Vec<String>,
    pub supported_methods: Vec<String>,
    pub is_active: bool,
    pub test_mode: bool,
    pub webhook_url: Option<String>,
    pub min_amount: Option<u64>,
    pub max_amount: Option<u64>,
    pub commission_rate: f64,
    pub fixed_commission: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GatewayConfig {
    pub fn supports_currency(&self, currency: &str) -> bool {
        self.supported_currencies
            .iter()
            .any(|supported| supported.eq_ignore_ascii_case(currency))
    }

    pub fn supports_method(&self, method: &str) -> bool {
        self.supported_methods
            .iter()
            .any(|supported| supported.eq_ignore_ascii_case(method))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Cancelled => "CANCELLED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: u64,
    pub user_id: u64,
    pub gateway_id: u64,
    pub amount: u64,
    pub currency: String,
    pub method: String,
    pub description: Option<String>,
    pub status: PaymentStatus,
    pub refunded_amount: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn refundable(&self) -> u64 {
        self.amount.saturating_sub(self.refunded_amount)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Payment,
    Refund,
    Chargeback,
    Adjustment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub payment_id: u64,
    pub gateway_id: u64,
    pub amount: u64,
    pub currency: String,
    pub transaction_type: TransactionType,
    pub status: PaymentStatus,
    pub gateway_reference: Option<String>,
    pub processing_fee: u64,
    pub net_amount: u64,
    pub created_at: DateTime<Utc>,
}

impl_entity!(GatewayConfig, "payment gateway");
impl_entity!(Payment, "payment");
impl_entity!(Transaction, "transaction");

/// Shows only the last four characters of a credential.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

/// Gateway as returned over HTTP, with credentials masked.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayView {
    pub id: u64,
    pub gateway_type: GatewayType,
    pub name: String,
    pub api_key: String,
    pub secret_key: String,
    pub webhook_secret: Option<String>,
    pub merchant_id: Option<String>,
    pub environment: GatewayEnvironment,
    pub supported_currencies: Vec<String>,
    pub supported_methods: Vec<String>,
    pub is_active: bool,
    pub test_mode: bool,
    pub webhook_url: Option<String>,
    pub min_amount: Option<u64>,
    pub max_amount: Option<u64>,
    pub commission_rate: f64,
    pub fixed_commission: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<GatewayConfig> for GatewayView {
    fn from(gateway: GatewayConfig) -> Self {
        Self {
            id: gateway.id,
            gateway_type: gateway.gateway_type,
            name: gateway.name,
            api_key: mask_secret(&gateway.api_key),
            secret_key: mask_secret(&gateway.secret_key),
            webhook_secret: gateway.webhook_secret.as_deref().map(mask_secret),
            merchant_id: gateway.merchant_id,
            environment: gateway.environment,
            supported_currencies: gateway.supported_currencies,
            supported_methods: gateway.supported_methods,
            is_active: gateway.is_active,
            test_mode: gateway.test_mode,
            webhook_url: gateway.webhook_url,
            min_amount: gateway.min_amount,
            max_amount: gateway.max_amount,
            commission_rate: gateway.commission_rate,
            fixed_commission: gateway.fixed_commission,
            created_at: gateway.created_at,
            updated_at: gateway.updated_at,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGateway {
    pub gateway_type: GatewayType,
    pub name: String,
    pub api_key: String,
    pub secret_key: String,
    pub webhook_secret: Option<String>,
    pub merchant_id: Option<String>,
    #[serde(default)]
    pub environment: GatewayEnvironment,
    pub supported_currencies: Vec<String>,
    pub supported_methods: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub test_mode: bool,
    pub webhook_url: Option<String>,
    pub min_amount: Option<u64>,
    pub max_amount: Option<u64>,
    #[serde(default)]
    pub commission_rate: f64,
    #[serde(default)]
    pub fixed_commission: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayUpdate {
    pub name: Option<String>,
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub merchant_id: Option<String>,
    pub environment: Option<GatewayEnvironment>,
    pub supported_currencies: Option<Vec<String>>,
    pub supported_methods: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub test_mode: Option<bool>,
    pub webhook_url: Option<String>,
    pub min_amount: Option<u64>,
    pub max_amount: Option<u64>,
    pub commission_rate: Option<f64>,
    pub fixed_commission: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    pub gateway_id: u64,
    pub amount: u64,
    pub currency: String,
    pub method: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefundRequest {
    pub payment_id: u64,
    pub amount: Option<u64>,
    pub reason: Option<String>,
}

/// Outcome of a charge or refund: the payment as stored and the ledger row it produced.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentOutcome {
    pub payment: Payment,
    pub transaction: Transaction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masking_keeps_only_last_four_characters() {
        assert_eq!(mask_secret("sk_live_abcdef1234"), "****1234");
        assert_eq!(mask_secret("abc"), "****");
        assert_eq!(mask_secret("ñandú-clave"), "****lave");
    }
}
