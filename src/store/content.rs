use std::collections::HashMap;

use chrono::Utc;
use log::debug;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::entity::{account, bookmark, like, reply, tweet};
use crate::error::{db_error, integrity_error, AppError};
use crate::store::account::list_by_ids;
use crate::store::{contains_literal, map_tx_error};

pub const TWEET_MAX_LEN: usize = 300;
pub const REPLY_MAX_LEN: usize = 200;

/// Per-tweet counters shown next to a tweet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TweetStats {
    pub likes: i64,
    pub replies: i64,
    pub bookmarks: i64,
}

fn check_text(field: &str, text: &str, max: usize) -> Result<(), AppError> {
    if text.trim().is_empty() {
        return Err(AppError::param_error(field, format!("{} cannot be empty", field)));
    }
    if text.chars().count() > max {
        return Err(AppError::param_error(
            field,
            format!("{} must be at most {} characters", field, max),
        ));
    }
    Ok(())
}

pub async fn create_tweet<C: ConnectionTrait>(db: &C, user_id: i32, content: &str) -> Result<tweet::Model, AppError> {
    check_text("content", content, TWEET_MAX_LEN)?;
    let model = tweet::ActiveModel {
        content: Set(content.to_string()),
        date_created: Set(Utc::now()),
        user_id: Set(user_id),
        ..Default::default()
    };
    let inserted = model.insert(db).await.map_err(db_error)?;
    debug!("tweet saved id={} user={}", inserted.id, user_id);
    Ok(inserted)
}

pub async fn find_tweet<C: ConnectionTrait>(db: &C, tweet_id: i32) -> Result<Option<tweet::Model>, AppError> {
    tweet::Entity::find_by_id(tweet_id).one(db).await.map_err(db_error)
}

pub async fn get_tweet<C: ConnectionTrait>(db: &C, tweet_id: i32) -> Result<tweet::Model, AppError> {
    find_tweet(db, tweet_id)
        .await?
        .ok_or_else(|| AppError::not_found("tweet"))
}

pub async fn tweets_by_account<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<Vec<tweet::Model>, AppError> {
    tweet::Entity::find()
        .filter(tweet::Column::UserId.eq(user_id))
        .order_by_desc(tweet::Column::DateCreated)
        .order_by_desc(tweet::Column::Id)
        .all(db)
        .await
        .map_err(db_error)
}

pub async fn search_tweets<C: ConnectionTrait>(db: &C, query: &str) -> Result<Vec<tweet::Model>, AppError> {
    let mut select = tweet::Entity::find();
    let query = query.trim();
    if !query.is_empty() {
        select = select.filter(contains_literal(tweet::Column::Content, query));
    }
    select
        .order_by_desc(tweet::Column::DateCreated)
        .order_by_desc(tweet::Column::Id)
        .all(db)
        .await
        .map_err(db_error)
}

/// Deletes a tweet together with its likes, replies and bookmarks.
pub async fn remove_tweet(db: &DatabaseConnection, tweet_id: i32) -> Result<(), AppError> {
    db.transaction::<_, (), AppError>(|txn| {
        Box::pin(async move {
            like::Entity::delete_many()
                .filter(like::Column::TweetId.eq(tweet_id))
                .exec(txn)
                .await
                .map_err(db_error)?;
            bookmark::Entity::delete_many()
                .filter(bookmark::Column::TweetId.eq(tweet_id))
                .exec(txn)
                .await
                .map_err(db_error)?;
            reply::Entity::delete_many()
                .filter(reply::Column::TweetId.eq(tweet_id))
                .exec(txn)
                .await
                .map_err(db_error)?;
            let result = tweet::Entity::delete_by_id(tweet_id)
                .exec(txn)
                .await
                .map_err(db_error)?;
            if result.rows_affected == 0 {
                return Err(AppError::not_found("tweet"));
            }
            Ok(())
        })
    })
    .await
    .map_err(map_tx_error)?;
    debug!("tweet removed id={}", tweet_id);
    Ok(())
}

pub async fn like_tweet<C: ConnectionTrait>(db: &C, user_id: i32, tweet_id: i32) -> Result<like::Model, AppError> {
    get_tweet(db, tweet_id).await?;
    let model = like::ActiveModel {
        user_id: Set(user_id),
        tweet_id: Set(tweet_id),
        ..Default::default()
    };
    model
        .insert(db)
        .await
        .map_err(|e| integrity_error(e, &[("tweet", "you already liked this tweet")]))
}

pub async fn remove_like<C: ConnectionTrait>(db: &C, user_id: i32, tweet_id: i32) -> Result<(), AppError> {
    let result = like::Entity::delete_many()
        .filter(like::Column::UserId.eq(user_id))
        .filter(like::Column::TweetId.eq(tweet_id))
        .exec(db)
        .await
        .map_err(db_error)?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("like"));
    }
    Ok(())
}

pub async fn has_liked<C: ConnectionTrait>(db: &C, user_id: i32, tweet_id: i32) -> Result<bool, AppError> {
    let count = like::Entity::find()
        .filter(like::Column::UserId.eq(user_id))
        .filter(like::Column::TweetId.eq(tweet_id))
        .count(db)
        .await
        .map_err(db_error)?;
    Ok(count > 0)
}

/// Accounts that liked `tweet_id`, in like order.
pub async fn likers<C: ConnectionTrait>(db: &C, tweet_id: i32) -> Result<Vec<account::Model>, AppError> {
    let ids: Vec<i32> = like::Entity::find()
        .filter(like::Column::TweetId.eq(tweet_id))
        .order_by_asc(like::Column::Id)
        .all(db)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(|l| l.user_id)
        .collect();
    list_by_ids(db, &ids).await
}

pub async fn bookmark_tweet<C: ConnectionTrait>(db: &C, user_id: i32, tweet_id: i32) -> Result<bookmark::Model, AppError> {
    get_tweet(db, tweet_id).await?;
    let model = bookmark::ActiveModel {
        user_id: Set(user_id),
        tweet_id: Set(tweet_id),
        date_created: Set(Utc::now()),
        ..Default::default()
    };
    model
        .insert(db)
        .await
        .map_err(|e| integrity_error(e, &[("tweet", "you already bookmarked this tweet")]))
}

pub async fn remove_bookmark<C: ConnectionTrait>(db: &C, user_id: i32, tweet_id: i32) -> Result<(), AppError> {
    let result = bookmark::Entity::delete_many()
        .filter(bookmark::Column::UserId.eq(user_id))
        .filter(bookmark::Column::TweetId.eq(tweet_id))
        .exec(db)
        .await
        .map_err(db_error)?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("bookmark"));
    }
    Ok(())
}

pub async fn has_bookmarked<C: ConnectionTrait>(db: &C, user_id: i32, tweet_id: i32) -> Result<bool, AppError> {
    let count = bookmark::Entity::find()
        .filter(bookmark::Column::UserId.eq(user_id))
        .filter(bookmark::Column::TweetId.eq(tweet_id))
        .count(db)
        .await
        .map_err(db_error)?;
    Ok(count > 0)
}

/// The account's bookmarks, newest first, each paired with its tweet.
pub async fn bookmarks_of<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
) -> Result<Vec<(bookmark::Model, tweet::Model)>, AppError> {
    let marks = bookmark::Entity::find()
        .filter(bookmark::Column::UserId.eq(user_id))
        .order_by_desc(bookmark::Column::DateCreated)
        .order_by_desc(bookmark::Column::Id)
        .all(db)
        .await
        .map_err(db_error)?;
    let tweets = tweet::Entity::find()
        .filter(tweet::Column::Id.is_in(marks.iter().map(|m| m.tweet_id)))
        .all(db)
        .await
        .map_err(db_error)?;
    Ok(marks
        .into_iter()
        .filter_map(|mark| {
            let found = tweets.iter().find(|t| t.id == mark.tweet_id).cloned();
            found.map(|t| (mark, t))
        })
        .collect())
}

pub async fn create_reply<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    tweet_id: i32,
    text: &str,
) -> Result<reply::Model, AppError> {
    get_tweet(db, tweet_id).await?;
    check_text("text", text, REPLY_MAX_LEN)?;
    let model = reply::ActiveModel {
        text: Set(text.to_string()),
        user_id: Set(user_id),
        tweet_id: Set(tweet_id),
        date_created: Set(Utc::now()),
        ..Default::default()
    };
    model.insert(db).await.map_err(db_error)
}

pub async fn replies_for<C: ConnectionTrait>(db: &C, tweet_id: i32) -> Result<Vec<reply::Model>, AppError> {
    reply::Entity::find()
        .filter(reply::Column::TweetId.eq(tweet_id))
        .order_by_desc(reply::Column::DateCreated)
        .order_by_desc(reply::Column::Id)
        .all(db)
        .await
        .map_err(db_error)
}

/// Like, reply and bookmark counts for each of `tweet_ids`.
pub async fn tweet_stats<C: ConnectionTrait>(db: &C, tweet_ids: &[i32]) -> Result<HashMap<i32, TweetStats>, AppError> {
    let mut stats: HashMap<i32, TweetStats> = tweet_ids.iter().map(|id| (*id, TweetStats::default())).collect();
    if tweet_ids.is_empty() {
        return Ok(stats);
    }

    let likes: Vec<(i32, i64)> = like::Entity::find()
        .select_only()
        .column(like::Column::TweetId)
        .column_as(Expr::col(like::Column::Id).count(), "cnt")
        .filter(like::Column::TweetId.is_in(tweet_ids.iter().copied()))
        .group_by(like::Column::TweetId)
        .into_tuple()
        .all(db)
        .await
        .map_err(db_error)?;
    for (id, cnt) in likes {
        stats.entry(id).or_default().likes = cnt;
    }

    let replies: Vec<(i32, i64)> = reply::Entity::find()
        .select_only()
        .column(reply::Column::TweetId)
        .column_as(Expr::col(reply::Column::Id).count(), "cnt")
        .filter(reply::Column::TweetId.is_in(tweet_ids.iter().copied()))
        .group_by(reply::Column::TweetId)
        .into_tuple()
        .all(db)
        .await
        .map_err(db_error)?;
    for (id, cnt) in replies {
        stats.entry(id).or_default().replies = cnt;
    }

    let bookmarks: Vec<(i32, i64)> = bookmark::Entity::find()
        .select_only()
        .column(bookmark::Column::TweetId)
        .column_as(Expr::col(bookmark::Column::Id).count(), "cnt")
        .filter(bookmark::Column::TweetId.is_in(tweet_ids.iter().copied()))
        .group_by(bookmark::Column::TweetId)
        .into_tuple()
        .all(db)
        .await
        .map_err(db_error)?;
    for (id, cnt) in bookmarks {
        stats.entry(id).or_default().bookmarks = cnt;
    }

    Ok(stats)
}

/// Which of `tweet_ids` the viewer liked and bookmarked.
pub async fn viewer_marks<C: ConnectionTrait>(
    db: &C,
    viewer_id: i32,
    tweet_ids: &[i32],
) -> Result<(Vec<i32>, Vec<i32>), AppError> {
    if tweet_ids.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }
    let liked = like::Entity::find()
        .filter(like::Column::UserId.eq(viewer_id))
        .filter(like::Column::TweetId.is_in(tweet_ids.iter().copied()))
        .all(db)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(|l| l.tweet_id)
        .collect();
    let bookmarked = bookmark::Entity::find()
        .filter(bookmark::Column::UserId.eq(viewer_id))
        .filter(bookmark::Column::TweetId.is_in(tweet_ids.iter().copied()))
        .all(db)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(|b| b.tweet_id)
        .collect();
    Ok((liked, bookmarked))
}
