//! Agent Prompts - fixed instructions and the tool advertised to the model

use crate::llm::ToolDefinition;

/// Name of the only tool the model may call.
pub const QUERY_DATABASE_TOOL: &str = "query_database";

/// System prompt describing the orders schema and query-writing rules.
pub const SYSTEM_PROMPT: &str = r#"You are a Data Insights Agent for Bellissimo Pizza.
You analyze a SQLite database with a single table: `orders`.

The table has these exact columns:
- id (INTEGER)
- customer_name (TEXT)
- item (TEXT)
- quantity (INTEGER)
- price (REAL)
- date (TEXT)

Rules:
1. Always use the correct column names.
2. To calculate total revenue, use (quantity * price).
3. Never use columns that don't exist.
4. Prefer aggregation queries like SUM, COUNT, AVG, GROUP BY, ORDER BY.
5. Return SQL that will work safely with SQLite.
"#;

pub fn query_database_tool() -> ToolDefinition {
    ToolDefinition {
        name: QUERY_DATABASE_TOOL.to_string(),
        description: "Safely query the database to retrieve data".to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "sql_query": {"type": "string"}
            },
            "required": ["sql_query"]
        }),
    }
}
