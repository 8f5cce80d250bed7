pub const SQLITE_SCHEMA_SQL: &str = include_str!("../../sql/sqlite_schema.sql");
pub const SCHEMA_VERSION: &str = "2";

/// Brings a version 1 database up to the current `users` layout. The bundled
/// script only creates missing tables, so added columns are applied here.
pub const UPGRADE_FROM_V1: &[&str] = &[
    r#"ALTER TABLE "users" ADD COLUMN "currentStreak" INTEGER NOT NULL DEFAULT 0"#,
    r#"ALTER TABLE "users" ADD COLUMN "lastStudyDate" TEXT"#,
];

/// Splits a script on top-level `;`, leaving quoted semicolons alone.
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;

    for ch in sql.chars() {
        match ch {
            '\'' if !in_double_quote => in_single_quote = !in_single_quote,
            '"' if !in_single_quote => in_double_quote = !in_double_quote,
            ';' if !in_single_quote && !in_double_quote => {
                push_statement(&mut statements, &current);
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    push_statement(&mut statements, &current);

    statements
}

fn push_statement(statements: &mut Vec<String>, raw: &str) {
    let sql = raw
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");
    let trimmed = sql.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
}
