use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use thiserror::Error;

use super::domain::{
    GatewayConfig, GatewayUpdate, GatewayView, NewGateway, Payment, PaymentOutcome,
    PaymentRequest, PaymentStatus, RefundRequest, Transaction, TransactionType,
};
use crate::error::{require_text, ServiceError};
use crate::notifications::{
    ActivityLogger, NotificationCenter, NotificationDraft, NotificationKind, NotificationSource,
};
use crate::store::{require, Database, Repository, RepositoryError};
use crate::tenancy::{Actor, SchemaName};

/// Reference returned by a gateway for an accepted charge or refund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReceipt {
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayClientError {
    #[error("charge declined: {0}")]
    Declined(String),
    #[error("gateway unreachable: {0}")]
    Unreachable(String),
}

/// Provider-side charge and refund calls.
pub trait GatewayClient: Send + Sync {
    fn charge(
        &self,
        gateway: &GatewayConfig,
        payment: &Payment,
    ) -> Result<GatewayReceipt, GatewayClientError>;

    fn refund(
        &self,
        gateway: &GatewayConfig,
        payment: &Payment,
        amount: u64,
    ) -> Result<GatewayReceipt, GatewayClientError>;
}

/// In-process client that approves every call.
#[derive(Debug, Default)]
pub struct SimulatedGateway;

impl GatewayClient for SimulatedGateway {
    fn charge(
        &self,
        gateway: &GatewayConfig,
        payment: &Payment,
    ) -> Result<GatewayReceipt, GatewayClientError> {
        Ok(GatewayReceipt {
            reference: format!("SIM-{}-{}", gateway.gateway_type.label(), payment.id),
        })
    }

    fn refund(
        &self,
        gateway: &GatewayConfig,
        payment: &Payment,
        amount: u64,
    ) -> Result<GatewayReceipt, GatewayClientError> {
        Ok(GatewayReceipt {
            reference: format!(
                "SIM-{}-{}-R{}",
                gateway.gateway_type.label(),
                payment.id,
                payment.refunded_amount + amount
            ),
        })
    }
}

/// Commission charged by the gateway: a percentage rounded to the unit plus a fixed part.
pub fn processing_fee(amount: u64, commission_rate: f64, fixed_commission: u64) -> u64 {
    let variable = (amount as f64 * commission_rate / 100.0).round();
    (variable.max(0.0) as u64).saturating_add(fixed_commission)
}

fn normalize_codes(field: &'static str, codes: Vec<String>) -> Result<Vec<String>, ServiceError> {
    let mut normalized: Vec<String> = Vec::with_capacity(codes.len());
    for code in codes {
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return Err(ServiceError::validation(field, "entries must not be empty"));
        }
        if !normalized.contains(&code) {
            normalized.push(code);
        }
    }
    if normalized.is_empty() {
        return Err(ServiceError::validation(field, "at least one entry is required"));
    }
    Ok(normalized)
}

fn validate_limits(gateway: &GatewayConfig) -> Result<(), ServiceError> {
    if !(0.0..=100.0).contains(&gateway.commission_rate) {
        return Err(ServiceError::validation(
            "commission_rate",
            "must be between 0 and 100",
        ));
    }
    if let (Some(min), Some(max)) = (gateway.min_amount, gateway.max_amount) {
        if min > max {
            return Err(ServiceError::validation(
                "min_amount",
                "must not exceed max_amount",
            ));
        }
    }
    Ok(())
}

fn admin_only(actor: &Actor) -> Result<(), ServiceError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::forbidden(
            "only administrators can manage payment gateways",
        ))
    }
}

pub struct PaymentService {
    gateways: Arc<dyn Repository<GatewayConfig>>,
    payments: Arc<dyn Repository<Payment>>,
    transactions: Arc<dyn Repository<Transaction>>,
    client: Arc<dyn GatewayClient>,
    notifications: Arc<NotificationCenter>,
    activity: Arc<ActivityLogger>,
}

impl PaymentService {
    pub fn new(
        database: &Database,
        client: Arc<dyn GatewayClient>,
        notifications: Arc<NotificationCenter>,
        activity: Arc<ActivityLogger>,
    ) -> Self {
        Self {
            gateways: database.gateways.clone(),
            payments: database.payments.clone(),
            transactions: database.transactions.clone(),
            client,
            notifications,
            activity,
        }
    }

    pub fn create_gateway(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        input: NewGateway,
    ) -> Result<GatewayView, ServiceError> {
        admin_only(actor)?;
        let now = Utc::now();
        let gateway = GatewayConfig {
            id: 0,
            gateway_type: input.gateway_type,
            name: require_text("name", &input.name)?,
            api_key: require_text("api_key", &input.api_key)?,
            secret_key: require_text("secret_key", &input.secret_key)?,
            webhook_secret: input.webhook_secret,
            merchant_id: input.merchant_id,
            environment: input.environment,
            supported_currencies: normalize_codes(
                "supported_currencies",
                input.supported_currencies,
            )?,
            supported_methods: normalize_codes("supported_methods", input.supported_methods)?,
            is_active: input.is_active,
            test_mode: input.test_mode,
            webhook_url: input.webhook_url,
            min_amount: input.min_amount,
            max_amount: input.max_amount,
            commission_rate: input.commission_rate,
            fixed_commission: input.fixed_commission,
            created_at: now,
            updated_at: now,
        };
        validate_limits(&gateway)?;

        let stored = self.gateways.insert_unique(schema, gateway, &|existing| {
            existing.name.eq_ignore_ascii_case(input.name.trim())
        });
        let stored = stored.map_err(|err| match err {
            RepositoryError::Conflict => {
                ServiceError::conflict(format!("gateway {} already exists", input.name.trim()))
            }
            other => other.into(),
        })?;

        tracing::info!(%schema, gateway_id = stored.id, gateway_type = stored.gateway_type.label(), "payment gateway configured");
        self.activity.record(
            schema,
            Some(actor.user_id),
            "CREATE_GATEWAY",
            "payment_gateway",
            stored.id,
            json!({ "type": stored.gateway_type, "name": stored.name }),
        );
        Ok(stored.into())
    }

    pub fn list_gateways(
        &self,
        schema: &SchemaName,
        actor: &Actor,
    ) -> Result<Vec<GatewayView>, ServiceError> {
        admin_only(actor)?;
        Ok(self
            .gateways
            .list(schema)?
            .into_iter()
            .map(GatewayView::from)
            .collect())
    }

    pub fn active_gateways(&self, schema: &SchemaName) -> Result<Vec<GatewayView>, ServiceError> {
        Ok(self
            .gateways
            .find(schema, &|gateway| gateway.is_active)?
            .into_iter()
            .map(GatewayView::from)
            .collect())
    }

    pub fn get_gateway(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<GatewayView, ServiceError> {
        admin_only(actor)?;
        Ok(require(self.gateways.as_ref(), schema, id)?.into())
    }

    pub fn update_gateway(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
        update: GatewayUpdate,
    ) -> Result<GatewayView, ServiceError> {
        admin_only(actor)?;
        let mut gateway = require(self.gateways.as_ref(), schema, id)?;

        if let Some(name) = update.name {
            gateway.name = require_text("name", &name)?;
        }
        if let Some(api_key) = update.api_key {
            gateway.api_key = require_text("api_key", &api_key)?;
        }
        if let Some(secret_key) = update.secret_key {
            gateway.secret_key = require_text("secret_key", &secret_key)?;
        }
        if update.webhook_secret.is_some() {
            gateway.webhook_secret = update.webhook_secret;
        }
        if update.merchant_id.is_some() {
            gateway.merchant_id = update.merchant_id;
        }
        if let Some(environment) = update.environment {
            gateway.environment = environment;
        }
        if let Some(currencies) = update.supported_currencies {
            gateway.supported_currencies = normalize_codes("supported_currencies", currencies)?;
        }
        if let Some(methods) = update.supported_methods {
            gateway.supported_methods = normalize_codes("supported_methods", methods)?;
        }
        if let Some(is_active) = update.is_active {
            gateway.is_active = is_active;
        }
        if let Some(test_mode) = update.test_mode {
            gateway.test_mode = test_mode;
        }
        if update.webhook_url.is_some() {
            gateway.webhook_url = update.webhook_url;
        }
        if update.min_amount.is_some() {
            gateway.min_amount = update.min_amount;
        }
        if update.max_amount.is_some() {
            gateway.max_amount = update.max_amount;
        }
        if let Some(rate) = update.commission_rate {
            gateway.commission_rate = rate;
        }
        if let Some(fixed) = update.fixed_commission {
            gateway.fixed_commission = fixed;
        }
        validate_limits(&gateway)?;
        gateway.updated_at = Utc::now();

        let stored = self.gateways.update(schema, gateway)?;
        self.activity.record(
            schema,
            Some(actor.user_id),
            "UPDATE_GATEWAY",
            "payment_gateway",
            id,
            json!({ "is_active": stored.is_active }),
        );
        Ok(stored.into())
    }

    pub fn delete_gateway(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<GatewayView, ServiceError> {
        admin_only(actor)?;
        require(self.gateways.as_ref(), schema, id)?;
        if !self
            .payments
            .find(schema, &|payment| payment.gateway_id == id)?
            .is_empty()
        {
            return Err(ServiceError::conflict(
                "gateway has recorded payments; deactivate it instead",
            ));
        }
        let removed = self.gateways.delete(schema, id)?;
        self.activity.record(
            schema,
            Some(actor.user_id),
            "DELETE_GATEWAY",
            "payment_gateway",
            id,
            json!({}),
        );
        Ok(removed.into())
    }

    pub fn process_payment(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        request: PaymentRequest,
    ) -> Result<PaymentOutcome, ServiceError> {
        let gateway = self
            .gateways
            .fetch(schema, request.gateway_id)?
            .filter(|gateway| gateway.is_active)
            .ok_or_else(|| ServiceError::not_found("payment gateway", request.gateway_id))?;

        let currency = request.currency.trim().to_uppercase();
        if !gateway.supports_currency(&currency) {
            return Err(ServiceError::validation(
                "currency",
                format!("{currency} is not supported by {}", gateway.name),
            ));
        }
        let method = request.method.trim().to_uppercase();
        if !gateway.supports_method(&method) {
            return Err(ServiceError::validation(
                "method",
                format!("{method} is not supported by {}", gateway.name),
            ));
        }
        if request.amount == 0 {
            return Err(ServiceError::validation("amount", "must be greater than zero"));
        }
        if let Some(min) = gateway.min_amount {
            if request.amount < min {
                return Err(ServiceError::validation(
                    "amount",
                    format!("minimum amount is {min} {currency}"),
                ));
            }
        }
        if let Some(max) = gateway.max_amount {
            if request.amount > max {
                return Err(ServiceError::validation(
                    "amount",
                    format!("maximum amount is {max} {currency}"),
                ));
            }
        }

        let now = Utc::now();
        let mut payment = self.payments.insert(
            schema,
            Payment {
                id: 0,
                user_id: actor.user_id,
                gateway_id: gateway.id,
                amount: request.amount,
                currency: currency.clone(),
                method,
                description: request.description,
                status: PaymentStatus::Processing,
                refunded_amount: 0,
                created_at: now,
                updated_at: now,
            },
        )?;

        let (transaction, failure) = match self.client.charge(&gateway, &payment) {
            Ok(receipt) => {
                let fee = processing_fee(
                    payment.amount,
                    gateway.commission_rate,
                    gateway.fixed_commission,
                );
                payment.status = PaymentStatus::Completed;
                let transaction = Transaction {
                    id: 0,
                    payment_id: payment.id,
                    gateway_id: gateway.id,
                    amount: payment.amount,
                    currency,
                    transaction_type: TransactionType::Payment,
                    status: PaymentStatus::Completed,
                    gateway_reference: Some(receipt.reference),
                    processing_fee: fee,
                    net_amount: payment.amount.saturating_sub(fee),
                    created_at: Utc::now(),
                };
                (transaction, None)
            }
            Err(err) => {
                tracing::warn!(%schema, payment_id = payment.id, error = %err, "gateway charge failed");
                payment.status = PaymentStatus::Failed;
                let transaction = Transaction {
                    id: 0,
                    payment_id: payment.id,
                    gateway_id: gateway.id,
                    amount: payment.amount,
                    currency,
                    transaction_type: TransactionType::Payment,
                    status: PaymentStatus::Failed,
                    gateway_reference: None,
                    processing_fee: 0,
                    net_amount: 0,
                    created_at: Utc::now(),
                };
                (transaction, Some(err))
            }
        };
        payment.updated_at = Utc::now();
        let payment = self.payments.update(schema, payment)?;
        let transaction = self.transactions.insert(schema, transaction)?;

        tracing::info!(%schema, payment_id = payment.id, status = payment.status.label(), "payment processed");
        self.activity.record(
            schema,
            Some(actor.user_id),
            "PROCESS_PAYMENT",
            "payment",
            payment.id,
            json!({ "status": payment.status, "amount": payment.amount, "gateway_id": gateway.id }),
        );

        let draft = match &failure {
            None => NotificationDraft::new(
                NotificationSource::Financial,
                "Payment received",
                format!("Your payment of {} {} was approved", payment.amount, payment.currency),
            ),
            Some(err) => NotificationDraft::new(
                NotificationSource::Financial,
                "Payment failed",
                format!("Your payment of {} {} failed: {err}", payment.amount, payment.currency),
            )
            .kind(NotificationKind::Error),
        };
        self.notifications
            .deliver(schema, payment.user_id, draft.source_id(payment.id));

        Ok(PaymentOutcome {
            payment,
            transaction,
        })
    }

    fn visible_payment(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<Payment, ServiceError> {
        let payment = require(self.payments.as_ref(), schema, id)?;
        if !actor.is_admin() && payment.user_id != actor.user_id {
            return Err(ServiceError::not_found("payment", id));
        }
        Ok(payment)
    }

    pub fn payments_for(
        &self,
        schema: &SchemaName,
        actor: &Actor,
    ) -> Result<Vec<Payment>, ServiceError> {
        let mut payments = if actor.is_admin() {
            self.payments.list(schema)?
        } else {
            self.payments
                .find(schema, &|payment| payment.user_id == actor.user_id)?
        };
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(payments)
    }

    pub fn get_payment(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<Payment, ServiceError> {
        self.visible_payment(schema, actor, id)
    }

    pub fn transactions_for(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        payment_id: u64,
    ) -> Result<Vec<Transaction>, ServiceError> {
        self.visible_payment(schema, actor, payment_id)?;
        Ok(self
            .transactions
            .find(schema, &|transaction| transaction.payment_id == payment_id)?)
    }

    pub fn refund(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        request: RefundRequest,
    ) -> Result<PaymentOutcome, ServiceError> {
        if !actor.is_admin() {
            return Err(ServiceError::forbidden("only administrators can issue refunds"));
        }
        let current = require(self.payments.as_ref(), schema, request.payment_id)?;
        let gateway = require(self.gateways.as_ref(), schema, current.gateway_id)?;

        let mut amount = 0;
        let reserved = self.payments.modify(schema, current.id, &mut |payment| {
            if payment.status != PaymentStatus::Completed {
                return Err(ServiceError::invalid_state(format!(
                    "cannot refund a payment with status {}",
                    payment.status.label()
                )));
            }
            let remaining = payment.refundable();
            amount = request.amount.unwrap_or(remaining);
            if amount == 0 || amount > remaining {
                return Err(ServiceError::validation(
                    "amount",
                    format!("must be between 1 and {remaining}"),
                ));
            }
            payment.refunded_amount += amount;
            if payment.refundable() == 0 {
                payment.status = PaymentStatus::Refunded;
            }
            payment.updated_at = Utc::now();
            Ok(())
        })?;

        let receipt = match self.client.refund(&gateway, &reserved, amount) {
            Ok(receipt) => receipt,
            Err(err) => {
                let released = self.payments.modify(schema, reserved.id, &mut |payment| {
                    payment.refunded_amount = payment.refunded_amount.saturating_sub(amount);
                    payment.status = PaymentStatus::Completed;
                    payment.updated_at = Utc::now();
                    Ok(())
                });
                if let Err(release_err) = released {
                    tracing::error!(%schema, payment_id = reserved.id, error = %release_err, "refund reservation could not be released");
                }
                return Err(ServiceError::invalid_state(err.to_string()));
            }
        };
        let payment = reserved;

        let transaction = self.transactions.insert(
            schema,
            Transaction {
                id: 0,
                payment_id: payment.id,
                gateway_id: gateway.id,
                amount,
                currency: payment.currency.clone(),
                transaction_type: TransactionType::Refund,
                status: PaymentStatus::Completed,
                gateway_reference: Some(receipt.reference),
                processing_fee: 0,
                net_amount: amount,
                created_at: Utc::now(),
            },
        )?;

        self.activity.record(
            schema,
            Some(actor.user_id),
            "REFUND_PAYMENT",
            "payment",
            payment.id,
            json!({ "amount": amount, "reason": request.reason }),
        );
        self.notifications.deliver(
            schema,
            payment.user_id,
            NotificationDraft::new(
                NotificationSource::Financial,
                "Refund issued",
                format!("{amount} {} were refunded to you", payment.currency),
            )
            .source_id(payment.id),
        );

        Ok(PaymentOutcome {
            payment,
            transaction,
        })
    }
}
