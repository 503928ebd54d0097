use sqlx::postgres::PgDatabaseError;

use crate::application::repos::RepoError;

/// Translate driver errors into the repository taxonomy.
pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::Duplicate {
            constraint: db.constraint().unwrap_or("unknown").to_string(),
        },
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            let detail = db
                .try_downcast_ref::<PgDatabaseError>()
                .and_then(PgDatabaseError::detail);
            foreign_key_error(db.message(), detail)
        }
        sqlx::Error::Database(db) if db.is_check_violation() => RepoError::InvalidInput {
            message: db.message().to_string(),
        },
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to statement timeout") =>
        {
            RepoError::Timeout
        }
        other => RepoError::from_persistence(other),
    }
}

/// Deleting a referenced category trips the RESTRICT key ("update or delete
/// on table ..." with a "still referenced" detail); inserting with an unknown
/// category trips the same constraint from the other side.
fn foreign_key_error(message: &str, detail: Option<&str>) -> RepoError {
    let referenced = message.starts_with("update or delete on table")
        || detail.is_some_and(|detail| detail.contains("is still referenced"));
    if referenced {
        RepoError::Integrity {
            message: detail.unwrap_or(message).to_string(),
        }
    } else {
        RepoError::InvalidInput {
            message: message.to_string(),
        }
    }
}

/// Counts come back as `BIGINT`.
pub(super) fn convert_count(value: i64) -> Result<u64, RepoError> {
    u64::try_from(value).map_err(|_| RepoError::from_persistence("negative row count"))
}
