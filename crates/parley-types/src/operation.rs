use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of a GraphQL operation, which decides the channel that carries it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    /// Detect the kind from the document's main (first) operation definition.
    ///
    /// Fragment definitions are skipped, comments and string literals are
    /// ignored, and a shorthand `{ ... }` document is a query.
    pub fn detect(document: &str) -> Self {
        let mut depth = 0usize;
        let mut word = String::new();
        let mut in_comment = false;
        let mut in_string = false;
        let mut escaped = false;
        let mut in_fragment = false;

        for ch in document.chars() {
            if in_comment {
                if ch == '\n' {
                    in_comment = false;
                }
                continue;
            }
            if in_string {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == '"' {
                    in_string = false;
                }
                continue;
            }

            if ch.is_ascii_alphanumeric() || ch == '_' {
                word.push(ch);
                continue;
            }

            if depth == 0 && !word.is_empty() {
                if let Some(kind) = Self::from_keyword(&word) {
                    return kind;
                }
                if word == "fragment" {
                    in_fragment = true;
                }
            }
            word.clear();

            match ch {
                '#' => in_comment = true,
                '"' => in_string = true,
                '{' => {
                    if depth == 0 && !in_fragment {
                        return OperationKind::Query;
                    }
                    depth += 1;
                }
                '}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        in_fragment = false;
                    }
                }
                _ => {}
            }
        }

        if depth == 0 {
            if let Some(kind) = Self::from_keyword(&word) {
                return kind;
            }
        }

        OperationKind::Query
    }

    fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "query" => Some(OperationKind::Query),
            "mutation" => Some(OperationKind::Mutation),
            "subscription" => Some(OperationKind::Subscription),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a response carrying both `data` and `errors` resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Any error fails the operation
    #[default]
    None,
    /// Keep partial data; errors are only logged
    All,
}

/// Outgoing operation descriptor: document, variables and detected kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    pub document: String,
    pub variables: Value,
    pub kind: OperationKind,
    #[serde(default)]
    pub error_policy: ErrorPolicy,
}

impl Operation {
    pub fn new(name: impl Into<String>, document: impl Into<String>) -> Self {
        let document = document.into();
        Self {
            name: name.into(),
            kind: OperationKind::detect(&document),
            document,
            variables: Value::Object(Default::default()),
            error_policy: ErrorPolicy::None,
        }
    }

    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn is_subscription(&self) -> bool {
        self.kind == OperationKind::Subscription
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_plain_kinds() {
        assert_eq!(
            OperationKind::detect("query GetUserChats { chats { id } }"),
            OperationKind::Query
        );
        assert_eq!(
            OperationKind::detect("mutation CreateChat($title: String!) { insert_chats_one { id } }"),
            OperationKind::Mutation
        );
        assert_eq!(
            OperationKind::detect("\n  subscription SubscribeToChats {\n chats { id }\n}"),
            OperationKind::Subscription
        );
    }

    #[test]
    fn test_detect_shorthand_query() {
        assert_eq!(OperationKind::detect("{ chats { id } }"), OperationKind::Query);
    }

    #[test]
    fn test_detect_skips_comments_and_fragments() {
        let doc = r#"
            # subscription in a comment does not count
            fragment ChatFields on chats { id title }
            subscription Watch { chats { ...ChatFields } }
        "#;
        assert_eq!(OperationKind::detect(doc), OperationKind::Subscription);
    }

    #[test]
    fn test_detect_ignores_keywords_inside_selection() {
        let doc = r#"query Q { mutation: chats(where: {title: {_eq: "subscription"}}) { id } }"#;
        assert_eq!(OperationKind::detect(doc), OperationKind::Query);
    }

    #[test]
    fn test_detect_unknown_defaults_to_query() {
        assert_eq!(OperationKind::detect(""), OperationKind::Query);
    }

    #[test]
    fn test_operation_builder() {
        let op = Operation::new("SubscribeToMessages", "subscription S($chatId: uuid!) { messages { id } }")
            .with_variables(json!({ "chatId": "c1" }));

        assert!(op.is_subscription());
        assert_eq!(op.variables["chatId"], "c1");
        assert_eq!(op.error_policy, ErrorPolicy::None);
    }

    #[test]
    fn test_error_policy_defaults_when_absent() {
        let op: Operation = serde_json::from_value(json!({
            "name": "GetUserChats",
            "document": "query GetUserChats { chats { id } }",
            "variables": {},
            "kind": "query"
        }))
        .unwrap();

        assert_eq!(op.error_policy, ErrorPolicy::None);
        assert_eq!(
            op.with_error_policy(ErrorPolicy::All).error_policy,
            ErrorPolicy::All
        );
    }
}
