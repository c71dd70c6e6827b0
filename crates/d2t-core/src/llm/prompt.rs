//! Prompt templates for the three request modes.

use std::fmt;
use std::str::FromStr;

use super::types::ChatMessage;
use super::LlmError;

const BASIC_PREFIX: &str = "Convert the following question into a SQL statement: ";

const NL2SQL_SYSTEM: &str = "You are an SQL expert. Convert natural language questions to SQL queries. \
Use the provided database schema to create accurate queries. \
Only respond with valid SQL queries, no explanations.";

const ANALYZE_SYSTEM: &str = "You are an SQL expert. Analyze the provided SQL query and explain its purpose, \
potential optimizations, and any issues it might have.";

/// How the input text should be framed for the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode<'a> {
    /// Bare question, user message only.
    Basic,
    /// Question grounded on the given schema text.
    WithSchema(&'a str),
    /// Input is SQL to be explained.
    Analyze,
}

impl PromptMode<'_> {
    pub fn kind(&self) -> ModeKind {
        match self {
            PromptMode::Basic => ModeKind::Basic,
            PromptMode::WithSchema(_) => ModeKind::WithSchema,
            PromptMode::Analyze => ModeKind::Analyze,
        }
    }
}

/// Mode names as they appear on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    Basic,
    WithSchema,
    Analyze,
}

impl ModeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModeKind::Basic => "nl2sql",
            ModeKind::WithSchema => "nl2sql_with_schema",
            ModeKind::Analyze => "analyze",
        }
    }

    /// Attach the schema text; ignored for modes that do not use one.
    pub fn with_schema(self, schema: &str) -> PromptMode<'_> {
        match self {
            ModeKind::Basic => PromptMode::Basic,
            ModeKind::WithSchema => PromptMode::WithSchema(schema),
            ModeKind::Analyze => PromptMode::Analyze,
        }
    }
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModeKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nl2sql" => Ok(ModeKind::Basic),
            "nl2sql_with_schema" => Ok(ModeKind::WithSchema),
            "analyze" => Ok(ModeKind::Analyze),
            other => Err(LlmError::UnknownMode(other.to_owned())),
        }
    }
}

/// Build the ordered message list for `input` in `mode`.
///
/// Fails with [`LlmError::MissingSchema`] when the schema-augmented mode is
/// given blank schema text.
pub fn build_messages(input: &str, mode: PromptMode<'_>) -> Result<Vec<ChatMessage>, LlmError> {
    match mode {
        PromptMode::Basic => Ok(vec![ChatMessage::user(format!("{BASIC_PREFIX}{input}"))]),
        PromptMode::WithSchema(schema) => {
            if schema.trim().is_empty() {
                return Err(LlmError::MissingSchema);
            }
            Ok(vec![
                ChatMessage::system(NL2SQL_SYSTEM),
                ChatMessage::user(format!(
                    "Database Schema:\n{schema}\n\nConvert this question to SQL: {input}"
                )),
            ])
        }
        PromptMode::Analyze => Ok(vec![
            ChatMessage::system(ANALYZE_SYSTEM),
            ChatMessage::user(input),
        ]),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn basic_mode_is_single_user_message() {
        let msgs = build_messages("how many customers?", PromptMode::Basic).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, Role::User);
        assert!(msgs[0].content.ends_with("how many customers?"));
    }

    #[test]
    fn schema_mode_concatenates_schema_and_question() {
        let msgs = build_messages("list vendors", PromptMode::WithSchema("Vendors(vend_id)")).unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::System);
        assert!(msgs[0].content.contains("Only respond with valid SQL"));
        assert_eq!(
            msgs[1].content,
            "Database Schema:\nVendors(vend_id)\n\nConvert this question to SQL: list vendors"
        );
    }

    #[test]
    fn schema_mode_requires_schema() {
        assert!(matches!(
            build_messages("q", PromptMode::WithSchema("  ")),
            Err(LlmError::MissingSchema)
        ));
    }

    #[test]
    fn analyze_mode_sends_sql_verbatim() {
        let msgs = build_messages("SELECT 1", PromptMode::Analyze).unwrap();
        assert!(msgs[0].content.contains("explain its purpose"));
        assert_eq!(msgs[1], ChatMessage::user("SELECT 1"));
    }

    #[test]
    fn mode_names_round_trip_and_reject_unknown() {
        for kind in [ModeKind::Basic, ModeKind::WithSchema, ModeKind::Analyze] {
            assert_eq!(kind.as_str().parse::<ModeKind>().unwrap(), kind);
        }
        match "translate".parse::<ModeKind>() {
            Err(LlmError::UnknownMode(m)) => assert_eq!(m, "translate"),
            other => panic!("expected UnknownMode, got {other:?}"),
        }
    }
}
