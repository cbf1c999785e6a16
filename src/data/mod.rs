pub mod migrations;
pub mod repository;
pub mod store;

use std::cmp::Ordering;

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

/// Collation used for case-insensitive title ordering.
pub const TITLE_COLLATION: &str = "UNICASE";

fn fold(value: &str) -> String {
    value.to_lowercase()
}

/// Registers the Unicode-aware `casefold()` function and `UNICASE` collation.
///
/// Must run on every connection before the schema is touched; the title index
/// is declared with this collation.
pub fn register_text_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "casefold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|v| fold(&v)))
        },
    )?;
    conn.create_collation(TITLE_COLLATION, |a: &str, b: &str| -> Ordering {
        fold(a).cmp(&fold(b))
    })?;
    Ok(())
}
