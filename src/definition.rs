use std::{collections::HashMap, sync::Arc};

use secl_eval::{MacroId, RuleId};
use serde::{Deserialize, Serialize};

/// Named and versioned source of rule and macro definitions loaded together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Policy {
    pub name: String,
    pub source: String,
    pub version: String,
}

/// Definition of a macro, as written in a policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MacroDefinition {
    pub id: MacroId,
    pub expression: String,
}

/// Definition of a rule, as written in a policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleDefinition {
    pub id: RuleId,
    #[serde(default)]
    pub version: String,
    pub expression: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(skip)]
    pub policy: Option<Arc<Policy>>,
}

impl MacroDefinition {
    pub fn new(id: &str, expression: &str) -> Self {
        Self {
            id: id.to_string(),
            expression: expression.to_string(),
        }
    }
}

impl RuleDefinition {
    pub fn new(id: &str, expression: &str) -> Self {
        Self {
            id: id.to_string(),
            expression: expression.to_string(),
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_policy(mut self, policy: Arc<Policy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Tags formatted as `key:value`, in no particular order.
    pub fn get_tags(&self) -> Vec<String> {
        self.tags.iter().map(|(k, v)| format!("{k}:{v}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags() {
        let def = RuleDefinition::new("r1", "open.flags > 0")
            .with_tag("severity", "high")
            .with_tag("team", "sec");

        let mut tags = def.get_tags();
        tags.sort();
        assert_eq!(tags, ["severity:high", "team:sec"]);
    }

    #[test]
    fn policy_yaml() {
        let raw = r#"
- id: passwd_access
  version: 1.0.0
  expression: open.filename == "/etc/passwd"
  description: Access to the password file
  tags:
    severity: high
- id: shell_exec
  expression: exec.file.path =~ "/bin/*sh"
"#;
        let rules: Vec<RuleDefinition> = serde_yaml::from_str(raw).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].id, "passwd_access");
        assert_eq!(rules[0].version, "1.0.0");
        assert_eq!(rules[0].expression, r#"open.filename == "/etc/passwd""#);
        assert_eq!(rules[0].tags["severity"], "high");
        assert!(rules[1].description.is_empty());
        assert!(rules[1].policy.is_none());

        let serialized = serde_yaml::to_string(&rules[0]).unwrap();
        for key in ["id:", "version:", "expression:", "description:", "tags:"] {
            assert!(serialized.contains(key), "missing {key}");
        }
        let back: RuleDefinition = serde_yaml::from_str(&serialized).unwrap();
        assert_eq!(back, rules[0]);

        let macros: Vec<MacroDefinition> =
            serde_yaml::from_str("- id: shells\n  expression: '[\"/bin/sh\", \"/bin/bash\"]'\n").unwrap();
        assert_eq!(macros[0], MacroDefinition::new("shells", r#"["/bin/sh", "/bin/bash"]"#));
    }
}
