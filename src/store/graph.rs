use std::collections::HashMap;

use log::debug;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::entity::{account, follow};
use crate::error::{db_error, integrity_error, AppError};
use crate::store::account::list_by_ids;

/// Records that `follower_id` follows `target_id`.
pub async fn follow_account<C: ConnectionTrait>(db: &C, target_id: i32, follower_id: i32) -> Result<follow::Model, AppError> {
    if target_id == follower_id {
        return Err(AppError::param_error("username", "you can not follow yourself"));
    }
    let edge = follow::ActiveModel {
        user_id: Set(target_id),
        follower_id: Set(follower_id),
        ..Default::default()
    };
    let inserted = edge
        .insert(db)
        .await
        .map_err(|e| integrity_error(e, &[("user", "you already follow this account")]))?;
    debug!("follow edge {} -> {}", follower_id, target_id);
    Ok(inserted)
}

/// Removes edge `follow_id`, provided `follower_id` is its follower.
pub async fn unfollow_by_id<C: ConnectionTrait>(db: &C, follow_id: i32, follower_id: i32) -> Result<(), AppError> {
    let result = follow::Entity::delete_many()
        .filter(follow::Column::Id.eq(follow_id))
        .filter(follow::Column::FollowerId.eq(follower_id))
        .exec(db)
        .await
        .map_err(db_error)?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("follow"));
    }
    Ok(())
}

pub async fn unfollow_account<C: ConnectionTrait>(db: &C, target_id: i32, follower_id: i32) -> Result<(), AppError> {
    let result = follow::Entity::delete_many()
        .filter(follow::Column::UserId.eq(target_id))
        .filter(follow::Column::FollowerId.eq(follower_id))
        .exec(db)
        .await
        .map_err(db_error)?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("follow"));
    }
    Ok(())
}

/// Which of `account_ids` are followed by `follower_id`.
pub async fn followed_among<C: ConnectionTrait>(
    db: &C,
    follower_id: i32,
    account_ids: &[i32],
) -> Result<Vec<i32>, AppError> {
    if account_ids.is_empty() {
        return Ok(Vec::new());
    }
    let edges = follow::Entity::find()
        .filter(follow::Column::FollowerId.eq(follower_id))
        .filter(follow::Column::UserId.is_in(account_ids.iter().copied()))
        .all(db)
        .await
        .map_err(db_error)?;
    Ok(edges.into_iter().map(|e| e.user_id).collect())
}

/// Ids of the accounts `follower_id` follows, oldest edge first.
pub async fn followed_ids<C: ConnectionTrait>(db: &C, follower_id: i32) -> Result<Vec<i32>, AppError> {
    let edges = follow::Entity::find()
        .filter(follow::Column::FollowerId.eq(follower_id))
        .order_by_asc(follow::Column::Id)
        .all(db)
        .await
        .map_err(db_error)?;
    Ok(edges.into_iter().map(|e| e.user_id).collect())
}

pub async fn follower_ids<C: ConnectionTrait>(db: &C, account_id: i32) -> Result<Vec<i32>, AppError> {
    let edges = follow::Entity::find()
        .filter(follow::Column::UserId.eq(account_id))
        .order_by_asc(follow::Column::Id)
        .all(db)
        .await
        .map_err(db_error)?;
    Ok(edges.into_iter().map(|e| e.follower_id).collect())
}

pub async fn followers<C: ConnectionTrait>(db: &C, account_id: i32) -> Result<Vec<account::Model>, AppError> {
    let ids = follower_ids(db, account_id).await?;
    list_by_ids(db, &ids).await
}

pub async fn followings<C: ConnectionTrait>(db: &C, account_id: i32) -> Result<Vec<account::Model>, AppError> {
    let ids = followed_ids(db, account_id).await?;
    list_by_ids(db, &ids).await
}

/// Follower count per account; accounts without followers are absent.
pub async fn follower_counts<C: ConnectionTrait>(db: &C, account_ids: &[i32]) -> Result<HashMap<i32, i64>, AppError> {
    count_edges(db, follow::Column::UserId, account_ids).await
}

/// Followed-account count per account; accounts following nobody are absent.
pub async fn following_counts<C: ConnectionTrait>(db: &C, account_ids: &[i32]) -> Result<HashMap<i32, i64>, AppError> {
    count_edges(db, follow::Column::FollowerId, account_ids).await
}

async fn count_edges<C: ConnectionTrait>(
    db: &C,
    side: follow::Column,
    account_ids: &[i32],
) -> Result<HashMap<i32, i64>, AppError> {
    if account_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i32, i64)> = follow::Entity::find()
        .select_only()
        .column(side)
        .column_as(Expr::col(follow::Column::Id).count(), "cnt")
        .filter(side.is_in(account_ids.iter().copied()))
        .group_by(side)
        .into_tuple()
        .all(db)
        .await
        .map_err(db_error)?;
    Ok(rows.into_iter().collect())
}
