// SQL safety classification: ordered keyword rules, no parsing.

/// Which rule table a keyword belongs to. Write rules are declared
/// before maintenance rules and win on (theoretical) ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSet {
    Write,
    Maintenance,
}

impl RuleSet {
    pub const fn as_str(self) -> &'static str {
        match self {
            RuleSet::Write => "write",
            RuleSet::Maintenance => "maintenance",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub keyword: &'static str,
    pub set: RuleSet,
}

/// Ordered rule table. Classification is advisory safety routing, not
/// injection defense: only the leading keyword of the exact statement
/// to be executed is inspected.
pub const CLASSIFICATION_RULES: &[Rule] = &[
    Rule { keyword: "INSERT", set: RuleSet::Write },
    Rule { keyword: "UPDATE", set: RuleSet::Write },
    Rule { keyword: "DELETE", set: RuleSet::Write },
    Rule { keyword: "REPLACE", set: RuleSet::Write },
    Rule { keyword: "DROP", set: RuleSet::Maintenance },
    Rule { keyword: "ALTER", set: RuleSet::Maintenance },
    Rule { keyword: "CREATE", set: RuleSet::Maintenance },
    Rule { keyword: "TRUNCATE", set: RuleSet::Maintenance },
    Rule { keyword: "GRANT", set: RuleSet::Maintenance },
    Rule { keyword: "REVOKE", set: RuleSet::Maintenance },
    Rule { keyword: "MERGE", set: RuleSet::Maintenance },
    Rule { keyword: "ATTACH", set: RuleSet::Maintenance },
    Rule { keyword: "DETACH", set: RuleSet::Maintenance },
    Rule { keyword: "PRAGMA", set: RuleSet::Maintenance },
    Rule { keyword: "VACUUM", set: RuleSet::Maintenance },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub is_write_or_ddl: bool,
    pub operation_type: String,
    pub matched_rule: Option<String>,
}

/// Classify a SQL statement by its leading keyword. Deterministic,
/// case-insensitive, never fails: an unrecognized leading keyword is
/// treated as not-write (auto-executable), same as `SELECT`.
pub fn classify(sql: &str) -> ClassificationResult {
    let keyword = leading_keyword(sql);
    for rule in CLASSIFICATION_RULES {
        if rule.keyword == keyword {
            return ClassificationResult {
                is_write_or_ddl: true,
                operation_type: keyword,
                matched_rule: Some(format!("{}:{}", rule.set.as_str(), rule.keyword)),
            };
        }
    }
    let operation_type = if keyword.is_empty() {
        "UNKNOWN".to_string()
    } else {
        keyword
    };
    ClassificationResult {
        is_write_or_ddl: false,
        operation_type,
        matched_rule: None,
    }
}

/// Extract the first keyword of a statement, skipping leading
/// whitespace, `--` line comments and `/* */` block comments.
fn leading_keyword(sql: &str) -> String {
    let mut rest = sql;
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map(|(_, tail)| tail).unwrap_or("");
            continue;
        }
        if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map(|(_, tail)| tail).unwrap_or("");
            continue;
        }
        break;
    }
    rest.chars()
        .take_while(|ch| ch.is_ascii_alphabetic() || *ch == '_')
        .collect::<String>()
        .to_ascii_uppercase()
}
