//! Custom Resource Definitions (CRDs) for nr-alerts-operator.
//!
//! - `AlertsNrqlCondition`: NRQL condition with a string policy id, checked
//!   against the account-scoped alerts API
//! - `NrqlAlertCondition`: NRQL condition with a numeric policy id, checked
//!   against the id-scoped alerts API

mod alerts_nrql_condition;
mod condition;
mod nrql_alert_condition;

pub use alerts_nrql_condition::*;
pub use condition::*;
pub use nrql_alert_condition::*;
