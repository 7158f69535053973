//! Rule model, rule engine, and policy store port.
//!
//! Rules are typed documents owned by the [`PolicyStore`]: a closed set of
//! condition kinds and operators, validated against their operands at save
//! time rather than coerced at evaluation time. Evaluation is synchronous
//! and side-effect-free; any signal a condition needs (request rate, IP
//! reputation) is sampled beforehand and handed in through the
//! [`engine::EvalContext`].

pub mod defaults;
pub mod engine;
pub mod model;
pub mod store;

use botshield_common::{ShieldError, ShieldResult};
use tracing::warn;

pub use engine::{evaluate, EvalContext};
pub use model::{Action, Condition, ConditionKind, Decision, Operand, Operator, Rule};
pub use store::{MemoryPolicyStore, PolicyStore};

/// Load a domain's rule set, falling back to the baseline defaults when the
/// domain has no stored set or the store is unreachable. Never fails: a
/// missing policy store degrades to defaults, not to an error.
pub async fn load_rules(store: &dyn PolicyStore, domain: &str) -> Vec<Rule> {
    match store.get(domain).await {
        Ok(Some(rules)) => rules,
        Ok(None) => defaults::baseline_rules(),
        Err(e) => {
            warn!(domain = %domain, error = %e, "policy store unavailable, using baseline rules");
            defaults::baseline_rules()
        }
    }
}

/// Validate and persist a domain's rule set, replacing the stored set as one
/// unit. Rejects the whole save if any rule is malformed or the set exceeds
/// `max_rules`.
pub async fn save_rules(
    store: &dyn PolicyStore,
    domain: &str,
    rules: &[Rule],
    max_rules: usize,
) -> ShieldResult<()> {
    if rules.len() > max_rules {
        return Err(ShieldError::MalformedRule {
            id: "<set>".to_string(),
            reason: format!("rule set has {} rules, limit is {}", rules.len(), max_rules),
        });
    }

    for rule in rules {
        rule.validate()?;
    }

    store.put(domain, rules).await
}
