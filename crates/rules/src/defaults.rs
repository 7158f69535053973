use chrono::Utc;

use crate::model::{Action, Condition, ConditionKind, Operand, Operator, Rule};

/// The baseline rule set applied to domains with no stored configuration.
///
/// Also the fallback when the policy store is unreachable.
pub fn baseline_rules() -> Vec<Rule> {
    let now = Utc::now();

    vec![
        Rule {
            id: "high-bot-score".to_string(),
            name: "Block High Bot Score".to_string(),
            description: "Block requests with high bot confidence score".to_string(),
            enabled: true,
            platform: "all".to_string(),
            action: Action::Block,
            priority: 100,
            conditions: vec![Condition {
                kind: ConditionKind::BotScore,
                operator: Operator::GreaterThan,
                value: Operand::Number(80.0),
            }],
            created_at: now,
            updated_at: now,
        },
        Rule {
            id: "challenge-medium-bot-score".to_string(),
            name: "Challenge Medium Bot Score".to_string(),
            description: "Challenge requests with medium bot confidence score".to_string(),
            enabled: true,
            platform: "all".to_string(),
            action: Action::Challenge,
            priority: 90,
            conditions: vec![Condition {
                kind: ConditionKind::BotScore,
                operator: Operator::GreaterThan,
                value: Operand::Number(60.0),
            }],
            created_at: now,
            updated_at: now,
        },
        Rule {
            id: "block-suspicious-countries".to_string(),
            name: "Block Suspicious Countries".to_string(),
            description: "Block traffic from high-risk countries".to_string(),
            enabled: false,
            platform: "all".to_string(),
            action: Action::Block,
            priority: 80,
            conditions: vec![Condition {
                kind: ConditionKind::Country,
                operator: Operator::In,
                value: Operand::Set(
                    ["CN", "RU", "KP", "IR"].iter().map(|s| s.to_string()).collect(),
                ),
            }],
            created_at: now,
            updated_at: now,
        },
        Rule {
            id: "block-common-scrapers".to_string(),
            name: "Block Common Scrapers".to_string(),
            description: "Block known scraping tools and libraries".to_string(),
            enabled: true,
            platform: "all".to_string(),
            action: Action::Block,
            priority: 95,
            conditions: vec![Condition {
                kind: ConditionKind::UserAgent,
                operator: Operator::Contains,
                value: Operand::Text("scrapy".to_string()),
            }],
            created_at: now,
            updated_at: now,
        },
    ]
}
