//! Queries over accounts, the follow graph and tweet content. Handlers go
//! through these functions rather than building queries themselves; every
//! function takes the requester explicitly when it needs one.

pub mod account;
pub mod content;
pub mod feed;
pub mod graph;

use sea_orm::sea_query::{Expr, LikeExpr, SimpleExpr};
use sea_orm::{ColumnTrait, TransactionError};

use crate::error::AppError;

const LIKE_ESCAPE: char = '!';

pub(crate) fn map_tx_error(err: TransactionError<AppError>) -> AppError {
    match err {
        TransactionError::Connection(e) => crate::error::db_error(e),
        TransactionError::Transaction(app) => app,
    }
}

/// `column LIKE '%query%'` with the wildcard characters of `query` taken literally.
pub(crate) fn contains_literal<C: ColumnTrait>(column: C, query: &str) -> SimpleExpr {
    let pattern = format!("%{}%", escape_like(query));
    Expr::col(column).like(LikeExpr::new(pattern).escape(LIKE_ESCAPE))
}

fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_') || c == LIKE_ESCAPE {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}
