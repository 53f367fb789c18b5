//! Payment gateway configuration, charges, refunds and the transaction ledger.

mod domain;
mod router;
mod service;

pub use domain::{
    mask_secret, GatewayConfig, GatewayEnvironment, GatewayType, GatewayUpdate, GatewayView,
    NewGateway, Payment, PaymentOutcome, PaymentRequest, PaymentStatus, RefundRequest,
    Transaction, TransactionType,
};
pub use router::payments_router;
pub use service::{
    processing_fee, GatewayClient, GatewayClientError, GatewayReceipt, PaymentService,
    SimulatedGateway,
};
