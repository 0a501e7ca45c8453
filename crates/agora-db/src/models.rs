/// Database row types. These map directly to SQLite rows.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub username: String,
    pub password: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub author: String,
    pub text: String,
    pub created_at: String,
}
