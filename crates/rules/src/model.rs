use botshield_common::ShieldError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a matched rule does with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allow,
    Challenge,
    Block,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Challenge => "challenge",
            Action::Block => "block",
        }
    }
}

/// The request feature a condition tests.
///
/// Closed set; rule documents written by a newer dashboard may carry kinds
/// this build does not know, which deserialize to `Unknown` and never match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    BotScore,
    Country,
    UserAgent,
    Path,
    RateLimit,
    IpReputation,
    #[serde(other)]
    Unknown,
}

impl ConditionKind {
    /// Kinds compared as numbers.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ConditionKind::BotScore | ConditionKind::RateLimit | ConditionKind::IpReputation
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    In,
    NotIn,
}

/// A condition operand: scalar number, scalar string, or string set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Number(f64),
    Text(String),
    Set(Vec<String>),
}

/// A single typed predicate. Immutable once attached to a rule version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: ConditionKind,
    pub operator: Operator,
    pub value: Operand,
}

fn default_platform_scope() -> String {
    "all".to_string()
}

/// A named, prioritized policy entry. Owned by the policy store; mutated
/// only through whole-set saves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub enabled: bool,
    /// Platform the rule is scoped to; "all" applies everywhere. Carried for
    /// the dashboard, not consulted during evaluation.
    #[serde(default = "default_platform_scope")]
    pub platform: String,
    pub action: Action,
    /// Higher priorities evaluate first; ties keep configured order.
    pub priority: i32,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// Validate operand types against condition kinds. Runs at save time and
    /// before evaluation; a rule failing here is malformed, not a non-match.
    pub fn validate(&self) -> Result<(), ShieldError> {
        if self.id.is_empty() {
            return Err(ShieldError::MalformedRule {
                id: "<empty>".to_string(),
                reason: "rule id must not be empty".to_string(),
            });
        }

        for (i, condition) in self.conditions.iter().enumerate() {
            self.validate_condition(condition).map_err(|reason| {
                ShieldError::MalformedRule {
                    id: self.id.clone(),
                    reason: format!("condition {}: {}", i, reason),
                }
            })?;
        }

        Ok(())
    }

    fn validate_condition(&self, condition: &Condition) -> Result<(), String> {
        use Operator::*;

        if condition.kind == ConditionKind::Unknown {
            return Err("unknown condition type".to_string());
        }

        if condition.kind.is_numeric() {
            return match (condition.operator, &condition.value) {
                (Equals | GreaterThan | LessThan, Operand::Number(_)) => Ok(()),
                (Equals | GreaterThan | LessThan, _) => {
                    Err("numeric condition requires a number operand".to_string())
                }
                (op, _) => Err(format!("operator {:?} not valid for numeric condition", op)),
            };
        }

        match (condition.operator, &condition.value) {
            (Equals | Contains | StartsWith | EndsWith, Operand::Text(_)) => Ok(()),
            (In | NotIn, Operand::Set(_)) => Ok(()),
            (Equals | Contains | StartsWith | EndsWith, _) => {
                Err("string condition requires a string operand".to_string())
            }
            (In | NotIn, _) => Err("in/not_in requires a set operand".to_string()),
            (op, _) => Err(format!("operator {:?} not valid for string condition", op)),
        }
    }
}

/// Outcome of rule evaluation for one request.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub action: Action,
    pub rule_id: Option<String>,
    pub rule_name: Option<String>,
    pub reason: String,
}

impl Decision {
    /// The decision when no rule matched.
    pub fn unmatched() -> Self {
        Self {
            action: Action::Allow,
            rule_id: None,
            rule_name: None,
            reason: "no rule matched".to_string(),
        }
    }

    pub fn blocked(&self) -> bool {
        self.action == Action::Block
    }
}
