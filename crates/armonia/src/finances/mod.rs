//! Billing rules: admin-maintained formulas evaluated per category.

mod domain;
mod formula;
mod router;
mod service;

pub use domain::{
    InvoiceRule, InvoiceRuleFilter, InvoiceRuleUpdate, NewInvoiceRule, RuleApplication,
    RuleEvaluation,
};
pub use formula::{Formula, FormulaError};
pub use router::invoice_rules_router;
pub use service::InvoiceRuleService;
