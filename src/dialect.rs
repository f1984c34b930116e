//! Dialect-specific SQL rendering shared by the predicate builder (B) and
//! the statement assembler (E): placeholder syntax, identifier quoting, and
//! the `LIKE` wildcard fragment differ between PostgreSQL and MySQL even
//! though both are driven from the same request shape.

use crate::error::{AppError, AppResult};
use crate::model::DbType;

/// Validates a bare SQL identifier (table, column, or alias name) coming
/// from request JSON. Identifiers are never bound as query parameters, so
/// this is the injection boundary for anything that ends up inline in the
/// generated statement.
pub fn validate_identifier(ident: &str) -> AppResult<&str> {
    if ident.is_empty() {
        return Err(AppError::invalid("identifier must not be empty"));
    }
    let mut chars = ident.chars();
    let first = chars.next().unwrap();
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(AppError::invalid(format!("invalid identifier: {ident}")));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(AppError::invalid(format!("invalid identifier: {ident}")));
    }
    Ok(ident)
}

/// Quotes a validated identifier for the given backend dialect.
pub fn quote_ident(db_type: DbType, ident: &str) -> AppResult<String> {
    validate_identifier(ident)?;
    Ok(match db_type {
        DbType::Postgres => format!("\"{ident}\""),
        DbType::Mysql => format!("`{ident}`"),
    })
}

/// Renders the `N`th (1-based) bind placeholder for the dialect.
/// PostgreSQL uses positional `$N`; MySQL uses a plain `?` regardless of
/// position.
pub fn placeholder(db_type: DbType, position: usize) -> String {
    match db_type {
        DbType::Postgres => format!("${position}"),
        DbType::Mysql => "?".to_string(),
    }
}

/// Renders `field LIKE '%' || ? || '%'` in PostgreSQL or the MySQL
/// equivalent using `CONCAT`.
pub fn like_fragment(db_type: DbType, field: &str, placeholder: &str) -> String {
    match db_type {
        DbType::Postgres => format!("{field} LIKE '%' || {placeholder} || '%'"),
        DbType::Mysql => format!("{field} LIKE CONCAT('%', {placeholder}, '%')"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_identifiers_with_illegal_characters() {
        assert!(validate_identifier("users; DROP TABLE x").is_err());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1table").is_err());
        assert!(validate_identifier("valid_name1").is_ok());
    }

    #[test]
    fn quotes_per_dialect() {
        assert_eq!(
            quote_ident(DbType::Postgres, "users").unwrap(),
            "\"users\""
        );
        assert_eq!(quote_ident(DbType::Mysql, "users").unwrap(), "`users`");
    }

    #[test]
    fn placeholders_differ_by_dialect() {
        assert_eq!(placeholder(DbType::Postgres, 3), "$3");
        assert_eq!(placeholder(DbType::Mysql, 3), "?");
    }

    #[test]
    fn like_fragment_differs_by_dialect() {
        assert_eq!(
            like_fragment(DbType::Postgres, "f", "$1"),
            "f LIKE '%' || $1 || '%'"
        );
        assert_eq!(
            like_fragment(DbType::Mysql, "f", "?"),
            "f LIKE CONCAT('%', ?, '%')"
        );
    }
}
