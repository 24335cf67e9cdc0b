use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};

use crate::entity::{account, tweet};
use crate::error::{db_error, AppError};
use crate::store::graph::followed_ids;

pub const SUGGESTION_LIMIT: u64 = 3;

/// Tweets by the accounts `viewer` follows, or every tweet for an anonymous
/// viewer; newest first either way.
pub async fn home_timeline<C: ConnectionTrait>(db: &C, viewer: Option<i32>) -> Result<Vec<tweet::Model>, AppError> {
    let mut select = tweet::Entity::find();
    if let Some(viewer_id) = viewer {
        let followed = followed_ids(db, viewer_id).await?;
        if followed.is_empty() {
            return Ok(Vec::new());
        }
        select = select.filter(tweet::Column::UserId.is_in(followed));
    }
    select
        .order_by_desc(tweet::Column::DateCreated)
        .order_by_desc(tweet::Column::Id)
        .all(db)
        .await
        .map_err(db_error)
}

/// The `limit` most recent tweets across all accounts.
pub async fn explore<C: ConnectionTrait>(db: &C, limit: u64) -> Result<Vec<tweet::Model>, AppError> {
    tweet::Entity::find()
        .order_by_desc(tweet::Column::DateCreated)
        .order_by_desc(tweet::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(db_error)
}

/// Up to three active accounts the viewer does not follow yet, excluding
/// the viewer, in id order.
pub async fn suggested_users<C: ConnectionTrait>(db: &C, viewer: Option<i32>) -> Result<Vec<account::Model>, AppError> {
    let mut select = account::Entity::find().filter(account::Column::IsActive.eq(true));
    if let Some(viewer_id) = viewer {
        let mut excluded = followed_ids(db, viewer_id).await?;
        excluded.push(viewer_id);
        select = select.filter(account::Column::Id.is_not_in(excluded));
    }
    select
        .order_by_asc(account::Column::Id)
        .limit(SUGGESTION_LIMIT)
        .all(db)
        .await
        .map_err(db_error)
}
