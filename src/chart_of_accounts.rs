use crate::schema::GlAccountRecord;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum CogsCategory {
    Food,
    Packaging,
    Beverage,
    Other,
}

impl fmt::Display for CogsCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CogsCategory::Food => "Food",
            CogsCategory::Packaging => "Packaging",
            CogsCategory::Beverage => "Beverage",
            CogsCategory::Other => "Other",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GlCategoryRule {
    /// Account-number prefix, e.g. `"5110"`.
    pub prefix: String,
    pub category: CogsCategory,
}

pub fn default_gl_categories() -> Vec<GlCategoryRule> {
    vec![
        GlCategoryRule {
            prefix: "5110".to_string(),
            category: CogsCategory::Food,
        },
        GlCategoryRule {
            prefix: "5210".to_string(),
            category: CogsCategory::Packaging,
        },
        GlCategoryRule {
            prefix: "5310".to_string(),
            category: CogsCategory::Beverage,
        },
    ]
}

#[derive(Debug, Clone)]
pub struct GlAccountEntry {
    pub number: String,
    pub name: String,
    pub category: CogsCategory,
}

/// GL account lookup keyed by upstream account id.
#[derive(Debug, Clone, Default)]
pub struct GlChart {
    accounts: HashMap<String, GlAccountEntry>,
    cogs_prefix: String,
}

impl GlChart {
    pub fn new(
        records: &[GlAccountRecord],
        rules: &[GlCategoryRule],
        cogs_prefix: impl Into<String>,
    ) -> Self {
        let mut accounts = HashMap::with_capacity(records.len());

        for record in records {
            let number = record.gl_account_number.clone().unwrap_or_default();
            let category = category_for_number(&number, rules);
            accounts.insert(
                record.gl_account_id.clone(),
                GlAccountEntry {
                    number,
                    name: record.name.clone().unwrap_or_default(),
                    category,
                },
            );
        }

        debug!("GL chart built with {} accounts", accounts.len());

        Self {
            accounts,
            cogs_prefix: cogs_prefix.into(),
        }
    }

    pub fn get(&self, gl_account_id: &str) -> Option<&GlAccountEntry> {
        self.accounts.get(gl_account_id)
    }

    pub fn is_cogs_account(&self, entry: &GlAccountEntry) -> bool {
        !self.cogs_prefix.is_empty() && entry.number.starts_with(&self.cogs_prefix)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// Longest matching prefix wins; no match is `Other`.
pub fn category_for_number(number: &str, rules: &[GlCategoryRule]) -> CogsCategory {
    rules
        .iter()
        .filter(|rule| !rule.prefix.is_empty() && number.starts_with(&rule.prefix))
        .max_by_key(|rule| rule.prefix.len())
        .map(|rule| rule.category)
        .unwrap_or(CogsCategory::Other)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, number: &str) -> GlAccountRecord {
        GlAccountRecord {
            gl_account_id: id.to_string(),
            gl_account_number: Some(number.to_string()),
            name: Some(format!("Account {}", number)),
        }
    }

    #[test]
    fn test_category_lookup() {
        let rules = default_gl_categories();
        assert_eq!(category_for_number("5110", &rules), CogsCategory::Food);
        assert_eq!(category_for_number("5310", &rules), CogsCategory::Beverage);
        assert_eq!(category_for_number("5400", &rules), CogsCategory::Other);
        assert_eq!(category_for_number("6100", &rules), CogsCategory::Other);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let rules = vec![
            GlCategoryRule {
                prefix: "51".to_string(),
                category: CogsCategory::Food,
            },
            GlCategoryRule {
                prefix: "5150".to_string(),
                category: CogsCategory::Packaging,
            },
        ];
        assert_eq!(category_for_number("51505", &rules), CogsCategory::Packaging);
        assert_eq!(category_for_number("5155", &rules), CogsCategory::Food);
        assert_eq!(category_for_number("5120", &rules), CogsCategory::Food);
    }

    #[test]
    fn test_chart_cogs_prefix() {
        let chart = GlChart::new(
            &[record("a", "5110"), record("b", "6200"), record("c", "5999")],
            &default_gl_categories(),
            "5",
        );
        assert_eq!(chart.len(), 3);

        let food = chart.get("a").unwrap();
        assert!(chart.is_cogs_account(food));
        assert_eq!(food.category, CogsCategory::Food);

        assert!(!chart.is_cogs_account(chart.get("b").unwrap()));

        let other = chart.get("c").unwrap();
        assert!(chart.is_cogs_account(other));
        assert_eq!(other.category, CogsCategory::Other);

        assert!(chart.get("missing").is_none());
    }
}
