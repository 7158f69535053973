use std::cmp::Reverse;

use tracing::warn;

use crate::model::{Condition, ConditionKind, Decision, Operand, Operator, Rule};

/// Request facts the engine evaluates conditions against. Signal readings
/// that were never sampled stay `None` and make their conditions non-matches.
#[derive(Debug, Clone)]
pub struct EvalContext<'a> {
    pub bot_score: u8,
    pub country: &'a str,
    pub user_agent: &'a str,
    pub path: &'a str,
    pub rate_limit: Option<u64>,
    pub ip_reputation: Option<u8>,
}

/// Evaluate a domain's rules against the request context.
///
/// Enabled rules are visited in priority-descending order, ties keeping the
/// configured order. A rule matches when all of its conditions hold; a rule
/// with no conditions matches unconditionally. The first match decides.
/// Malformed rules are skipped with a log entry and the remaining rules
/// still evaluated.
pub fn evaluate(ctx: &EvalContext<'_>, rules: &[Rule]) -> Decision {
    let mut ordered: Vec<&Rule> = rules.iter().filter(|r| r.enabled).collect();
    // Stable sort: equal priorities keep their configured order.
    ordered.sort_by_key(|r| Reverse(r.priority));

    for rule in ordered {
        if let Err(e) = rule.validate() {
            warn!(rule_id = %rule.id, error = %e, "skipping malformed rule");
            continue;
        }

        if rule.conditions.iter().all(|c| condition_matches(c, ctx)) {
            return Decision {
                action: rule.action,
                rule_id: Some(rule.id.clone()),
                rule_name: Some(rule.name.clone()),
                reason: rule.description.clone(),
            };
        }
    }

    Decision::unmatched()
}

fn condition_matches(condition: &Condition, ctx: &EvalContext<'_>) -> bool {
    match condition.kind {
        ConditionKind::BotScore => numeric_matches(ctx.bot_score as f64, condition),
        ConditionKind::RateLimit => ctx
            .rate_limit
            .map(|v| numeric_matches(v as f64, condition))
            .unwrap_or(false),
        ConditionKind::IpReputation => ctx
            .ip_reputation
            .map(|v| numeric_matches(v as f64, condition))
            .unwrap_or(false),
        ConditionKind::Country => string_matches(ctx.country, condition, false),
        ConditionKind::Path => string_matches(ctx.path, condition, false),
        // User-agent comparisons are lowercase-normalized on both sides.
        ConditionKind::UserAgent => string_matches(ctx.user_agent, condition, true),
        ConditionKind::Unknown => false,
    }
}

fn numeric_matches(actual: f64, condition: &Condition) -> bool {
    let expected = match condition.value {
        Operand::Number(n) => n,
        _ => return false,
    };

    match condition.operator {
        Operator::Equals => actual == expected,
        Operator::GreaterThan => actual > expected,
        Operator::LessThan => actual < expected,
        _ => false,
    }
}

fn string_matches(actual: &str, condition: &Condition, normalize: bool) -> bool {
    let actual = if normalize {
        actual.to_lowercase()
    } else {
        actual.to_string()
    };

    match (&condition.operator, &condition.value) {
        (Operator::Equals, Operand::Text(expected)) => actual == normalized(expected, normalize),
        (Operator::Contains, Operand::Text(expected)) => {
            actual.contains(&normalized(expected, normalize))
        }
        (Operator::StartsWith, Operand::Text(expected)) => {
            actual.starts_with(&normalized(expected, normalize))
        }
        (Operator::EndsWith, Operand::Text(expected)) => {
            actual.ends_with(&normalized(expected, normalize))
        }
        (Operator::In, Operand::Set(set)) => {
            set.iter().any(|v| normalized(v, normalize) == actual)
        }
        (Operator::NotIn, Operand::Set(set)) => {
            !set.iter().any(|v| normalized(v, normalize) == actual)
        }
        _ => false,
    }
}

fn normalized(value: &str, normalize: bool) -> String {
    if normalize {
        value.to_lowercase()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Action;
    use chrono::Utc;

    fn rule(id: &str, priority: i32, action: Action, conditions: Vec<Condition>) -> Rule {
        let now = Utc::now();
        Rule {
            id: id.to_string(),
            name: id.to_string(),
            description: format!("{} description", id),
            enabled: true,
            platform: "all".to_string(),
            action,
            priority,
            conditions,
            created_at: now,
            updated_at: now,
        }
    }

    fn bot_score_over(threshold: f64) -> Condition {
        Condition {
            kind: ConditionKind::BotScore,
            operator: Operator::GreaterThan,
            value: Operand::Number(threshold),
        }
    }

    fn ua_contains(token: &str) -> Condition {
        Condition {
            kind: ConditionKind::UserAgent,
            operator: Operator::Contains,
            value: Operand::Text(token.to_string()),
        }
    }

    fn ctx<'a>(bot_score: u8, user_agent: &'a str) -> EvalContext<'a> {
        EvalContext {
            bot_score,
            country: "US",
            user_agent,
            path: "/",
            rate_limit: None,
            ip_reputation: None,
        }
    }

    #[test]
    fn empty_rule_list_allows_with_unmatched_reason() {
        let decision = evaluate(&ctx(99, "anything"), &[]);
        assert_eq!(decision.action, Action::Allow);
        assert_eq!(decision.reason, "no rule matched");
        assert!(decision.rule_id.is_none());
    }

    #[test]
    fn first_matching_rule_by_priority_wins() {
        let rules = vec![
            rule("low", 10, Action::Challenge, vec![bot_score_over(50.0)]),
            rule("high", 100, Action::Block, vec![bot_score_over(50.0)]),
        ];
        let decision = evaluate(&ctx(70, "ua"), &rules);
        assert_eq!(decision.rule_id.as_deref(), Some("high"));
        assert_eq!(decision.action, Action::Block);
    }

    #[test]
    fn equal_priority_ties_keep_configured_order() {
        let rules = vec![
            rule("first", 50, Action::Challenge, vec![]),
            rule("second", 50, Action::Block, vec![]),
        ];
        let decision = evaluate(&ctx(0, "ua"), &rules);
        assert_eq!(decision.rule_id.as_deref(), Some("first"));
    }

    #[test]
    fn disabled_rules_are_skipped() {
        let mut blocked = rule("blocked", 100, Action::Block, vec![]);
        blocked.enabled = false;
        let rules = vec![blocked, rule("fallback", 10, Action::Challenge, vec![])];
        let decision = evaluate(&ctx(0, "ua"), &rules);
        assert_eq!(decision.rule_id.as_deref(), Some("fallback"));
    }

    #[test]
    fn rule_with_no_conditions_matches_unconditionally() {
        let rules = vec![rule("catch-all", 1, Action::Block, vec![])];
        let decision = evaluate(&ctx(0, "Mozilla/5.0"), &rules);
        assert_eq!(decision.rule_id.as_deref(), Some("catch-all"));
    }

    #[test]
    fn all_conditions_must_hold() {
        let rules = vec![rule(
            "both",
            50,
            Action::Block,
            vec![bot_score_over(50.0), ua_contains("curl")],
        )];

        // Score matches, UA does not.
        let decision = evaluate(&ctx(80, "Mozilla/5.0"), &rules);
        assert!(decision.rule_id.is_none());

        // Both match.
        let decision = evaluate(&ctx(80, "curl/8.0"), &rules);
        assert_eq!(decision.rule_id.as_deref(), Some("both"));
    }

    #[test]
    fn scraper_rule_outranks_challenge_rule_when_both_match() {
        // priority 95 block beats priority 90 challenge for the same request.
        let rules = vec![
            rule("challenge-medium", 90, Action::Challenge, vec![bot_score_over(60.0)]),
            rule("block-scrapers", 95, Action::Block, vec![ua_contains("scrapy")]),
        ];
        let decision = evaluate(&ctx(70, "Scrapy/2.9.0"), &rules);
        assert_eq!(decision.action, Action::Block);
        assert_eq!(decision.rule_id.as_deref(), Some("block-scrapers"));
    }

    #[test]
    fn user_agent_comparison_is_case_insensitive() {
        let rules = vec![rule("ua", 50, Action::Block, vec![ua_contains("SCRAPY")])];
        let decision = evaluate(&ctx(0, "scrapy/2.9.0"), &rules);
        assert_eq!(decision.rule_id.as_deref(), Some("ua"));
    }

    #[test]
    fn country_comparison_is_case_sensitive() {
        let condition = Condition {
            kind: ConditionKind::Country,
            operator: Operator::In,
            value: Operand::Set(vec!["cn".to_string()]),
        };
        let rules = vec![rule("geo", 50, Action::Block, vec![condition])];
        let mut context = ctx(0, "ua");
        context.country = "CN";
        let decision = evaluate(&context, &rules);
        assert!(decision.rule_id.is_none());
    }

    #[test]
    fn country_not_in_matches_outside_set() {
        let condition = Condition {
            kind: ConditionKind::Country,
            operator: Operator::NotIn,
            value: Operand::Set(vec!["US".to_string(), "CA".to_string()]),
        };
        let rules = vec![rule("geo", 50, Action::Block, vec![condition])];

        let mut context = ctx(0, "ua");
        context.country = "FR";
        assert!(evaluate(&context, &rules).blocked());

        context.country = "US";
        assert!(!evaluate(&context, &rules).blocked());
    }

    #[test]
    fn path_prefix_condition() {
        let condition = Condition {
            kind: ConditionKind::Path,
            operator: Operator::StartsWith,
            value: Operand::Text("/api/".to_string()),
        };
        let rules = vec![rule("api", 50, Action::Challenge, vec![condition])];

        let mut context = ctx(0, "ua");
        context.path = "/api/users";
        assert_eq!(evaluate(&context, &rules).action, Action::Challenge);

        context.path = "/index.html";
        assert_eq!(evaluate(&context, &rules).action, Action::Allow);
    }

    #[test]
    fn absent_signal_reading_never_matches() {
        let condition = Condition {
            kind: ConditionKind::RateLimit,
            operator: Operator::GreaterThan,
            value: Operand::Number(0.0),
        };
        let rules = vec![rule("rate", 50, Action::Block, vec![condition])];

        // No reading sampled: the condition cannot hold.
        let decision = evaluate(&ctx(0, "ua"), &rules);
        assert!(decision.rule_id.is_none());

        // With a reading, it can.
        let mut context = ctx(0, "ua");
        context.rate_limit = Some(10);
        assert!(evaluate(&context, &rules).blocked());
    }

    #[test]
    fn ip_reputation_condition_uses_reading() {
        let condition = Condition {
            kind: ConditionKind::IpReputation,
            operator: Operator::GreaterThan,
            value: Operand::Number(90.0),
        };
        let rules = vec![rule("rep", 50, Action::Block, vec![condition])];

        let mut context = ctx(0, "ua");
        context.ip_reputation = Some(100);
        assert!(evaluate(&context, &rules).blocked());

        context.ip_reputation = Some(50);
        assert!(!evaluate(&context, &rules).blocked());
    }

    #[test]
    fn malformed_rule_is_skipped_and_rest_evaluated() {
        let malformed = rule(
            "bad",
            100,
            Action::Block,
            vec![Condition {
                kind: ConditionKind::BotScore,
                operator: Operator::Contains,
                value: Operand::Number(1.0),
            }],
        );
        let rules = vec![malformed, rule("good", 10, Action::Challenge, vec![])];
        let decision = evaluate(&ctx(99, "ua"), &rules);
        assert_eq!(decision.rule_id.as_deref(), Some("good"));
    }

    #[test]
    fn unknown_condition_kind_never_matches() {
        // An unknown-kind condition makes its rule unmatchable; it is also
        // malformed, so the validation path skips it first. Either way the
        // rule never fires.
        let json = r#"{
            "id": "future",
            "name": "Future",
            "enabled": true,
            "action": "block",
            "priority": 100,
            "conditions": [
                {"type": "ja4_hash", "operator": "equals", "value": "x"}
            ],
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        }"#;
        let future: Rule = serde_json::from_str(json).unwrap();
        let rules = vec![future, rule("fallback", 1, Action::Challenge, vec![])];
        let decision = evaluate(&ctx(99, "ua"), &rules);
        assert_eq!(decision.rule_id.as_deref(), Some("fallback"));
    }

    #[test]
    fn matched_decision_carries_rule_description() {
        let rules = vec![rule("r1", 50, Action::Block, vec![])];
        let decision = evaluate(&ctx(0, "ua"), &rules);
        assert_eq!(decision.reason, "r1 description");
        assert_eq!(decision.rule_name.as_deref(), Some("r1"));
    }
}
