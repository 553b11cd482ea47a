//! Account discovery
//!
//! Two streams feed the fan-out: `ga_accessible_customers` enumerates the
//! accounts the refresh token can reach, and `ga_customer_hierarchy` expands
//! each of those into its child accounts. Their records are emitted like any
//! other stream's; their side product is the set of contexts the report
//! streams run over.

use super::{Context, ReportStream};
use crate::client::AccessibleCustomers;
use crate::config::Config;
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::HashSet;

/// Output name of the accessible-customers discovery stream.
pub const ACCESSIBLE_CUSTOMERS_STREAM: &str = "ga_accessible_customers";

/// Derive one context per accessible customer resource name.
///
/// Resource names arrive as `customers/<id>`; anything without an id segment
/// is skipped.
pub fn accessible_customer_contexts(record: &AccessibleCustomers) -> Vec<Context> {
    record
        .resource_names
        .iter()
        .filter_map(|name| name.split('/').nth(1))
        .filter(|id| !id.is_empty())
        .map(Context::new)
        .collect()
}

/// Customer hierarchy stream.
///
/// Strictly a parent stream: it tells the report streams which child
/// accounts to query. An account the token cannot read hierarchy for
/// answers 403, which is resumable here so one inaccessible account does
/// not abort the whole run.
pub struct CustomerHierarchy;

impl CustomerHierarchy {
    /// Contexts for the children of one hierarchy record.
    ///
    /// Manager accounts and accounts that are not `ENABLED` are skipped with
    /// a warning; `seen` deduplicates ids across invocations so a child
    /// reachable from two parents syncs once.
    pub fn child_contexts(record: &Value, seen: &mut HashSet<String>) -> Vec<Context> {
        let customer = &record["customerClient"];

        if customer["manager"].as_bool() == Some(true) {
            log::warn!(
                "{} is a manager, skipping",
                customer["clientCustomer"].as_str().unwrap_or("<unknown>")
            );
            return Vec::new();
        }
        if customer["status"].as_str() != Some("ENABLED") {
            log::warn!(
                "{} is not enabled, skipping",
                customer["clientCustomer"].as_str().unwrap_or("<unknown>")
            );
            return Vec::new();
        }

        match customer["id"].as_str() {
            Some(id) if seen.insert(id.to_string()) => vec![Context::new(id)],
            _ => Vec::new(),
        }
    }
}

impl ReportStream for CustomerHierarchy {
    fn name(&self) -> &'static str {
        "ga_customer_hierarchy"
    }

    fn primary_keys(&self) -> &'static [&'static str] {
        &["customerClient__id"]
    }

    fn gaql(&self, _config: &Config) -> String {
        "SELECT \
         customer_client.client_customer, \
         customer_client.level, \
         customer_client.status, \
         customer_client.manager, \
         customer_client.descriptive_name, \
         customer_client.currency_code, \
         customer_client.time_zone, \
         customer_client.id \
         FROM customer_client \
         WHERE customer_client.level <= 1"
            .to_string()
    }

    fn is_resumable(&self, status: StatusCode) -> bool {
        status == StatusCode::FORBIDDEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hierarchy_record(id: &str, manager: bool, status: &str) -> Value {
        json!({
            "customerClient": {
                "clientCustomer": format!("customers/{id}"),
                "id": id,
                "manager": manager,
                "status": status,
            }
        })
    }

    #[test]
    fn test_accessible_customer_contexts() {
        let record = AccessibleCustomers {
            resource_names: vec!["customers/111".into(), "customers/222".into()],
        };
        let contexts = accessible_customer_contexts(&record);
        assert_eq!(
            contexts,
            vec![Context::new("111"), Context::new("222")]
        );
    }

    #[test]
    fn test_child_contexts_skip_managers() {
        let mut seen = HashSet::new();
        let record = hierarchy_record("123", true, "ENABLED");
        assert!(CustomerHierarchy::child_contexts(&record, &mut seen).is_empty());
    }

    #[test]
    fn test_child_contexts_skip_disabled() {
        let mut seen = HashSet::new();
        let record = hierarchy_record("123", false, "SUSPENDED");
        assert!(CustomerHierarchy::child_contexts(&record, &mut seen).is_empty());
    }

    #[test]
    fn test_child_contexts_deduplicate() {
        let mut seen = HashSet::new();
        let record = hierarchy_record("123", false, "ENABLED");
        assert_eq!(
            CustomerHierarchy::child_contexts(&record, &mut seen),
            vec![Context::new("123")]
        );
        // Same child reachable from a second parent
        assert!(CustomerHierarchy::child_contexts(&record, &mut seen).is_empty());
    }

    #[test]
    fn test_hierarchy_resumable_on_forbidden_only() {
        let stream = CustomerHierarchy;
        assert!(stream.is_resumable(StatusCode::FORBIDDEN));
        assert!(!stream.is_resumable(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!stream.is_resumable(StatusCode::UNAUTHORIZED));
    }
}
