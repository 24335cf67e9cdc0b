//! Wire shapes for accounts, tweets, replies, bookmarks and follow edges.
//! Builders work on batches so counters and viewer flags cost a fixed number
//! of queries per response, not per row.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use sea_orm::ConnectionTrait;
use serde::Serialize;

use crate::entity::{account, bookmark, follow, reply, tweet};
use crate::error::AppError;
use crate::store;
use crate::timesince::{elapsed_since, Elapsed};

#[derive(Clone, Debug, Serialize)]
pub struct MiniAccountDto {
    pub id: i32,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub picture: String,
}

impl From<&account::Model> for MiniAccountDto {
    fn from(a: &account::Model) -> Self {
        Self {
            id: a.id,
            username: a.username.clone(),
            firstname: a.firstname.clone(),
            lastname: a.lastname.clone(),
            picture: a.picture.clone(),
        }
    }
}

/// Public profile. The email is only filled in for the account's owner and
/// the password hash never leaves the store.
#[derive(Debug, Serialize)]
pub struct ProfileDto {
    pub id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub bio: String,
    pub picture: String,
    pub background_picture: String,
    pub join_date: String,
    pub followers_count: i64,
    pub followings_count: i64,
    pub tweets_count: i64,
    pub is_followed: bool,
}

#[derive(Debug, Serialize)]
pub struct TweetDto {
    pub id: i32,
    pub content: String,
    pub date_created: String,
    pub user: String,
    pub user_detail: Option<MiniAccountDto>,
    pub likes_count: i64,
    pub replies_count: i64,
    pub bookmarks_count: i64,
    pub time_since: Elapsed,
    pub liked: bool,
    pub bookmarked: bool,
}

#[derive(Debug, Serialize)]
pub struct ReplyDto {
    pub id: i32,
    pub text: String,
    pub tweet: i32,
    pub user: String,
    pub user_detail: Option<MiniAccountDto>,
    pub date_created: String,
    pub time_since: Elapsed,
}

#[derive(Debug, Serialize)]
pub struct BookmarkDto {
    pub id: i32,
    pub date_created: String,
    pub tweet: TweetDto,
}

#[derive(Debug, Serialize)]
pub struct FollowDto {
    pub id: i32,
    pub user: String,
    pub follower: String,
}

pub fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

async fn accounts_by_id<C: ConnectionTrait>(db: &C, ids: &[i32]) -> Result<HashMap<i32, account::Model>, AppError> {
    let mut unique = ids.to_vec();
    unique.sort_unstable();
    unique.dedup();
    let accounts = store::account::list_by_ids(db, &unique).await?;
    Ok(accounts.into_iter().map(|a| (a.id, a)).collect())
}

pub async fn profile<C: ConnectionTrait>(
    db: &C,
    account: account::Model,
    viewer: Option<i32>,
) -> Result<ProfileDto, AppError> {
    profiles(db, vec![account], viewer)
        .await?
        .pop()
        .ok_or_else(AppError::system_exception)
}

pub async fn profiles<C: ConnectionTrait>(
    db: &C,
    accounts: Vec<account::Model>,
    viewer: Option<i32>,
) -> Result<Vec<ProfileDto>, AppError> {
    let ids: Vec<i32> = accounts.iter().map(|a| a.id).collect();
    let followers = store::graph::follower_counts(db, &ids).await?;
    let followings = store::graph::following_counts(db, &ids).await?;
    let tweet_counts = store::account::tweet_counts(db, &ids).await?;
    let followed = match viewer {
        Some(viewer_id) => store::graph::followed_among(db, viewer_id, &ids).await?,
        None => Vec::new(),
    };

    Ok(accounts
        .into_iter()
        .map(|account| ProfileDto {
            id: account.id,
            email: (viewer == Some(account.id)).then(|| account.email.clone()),
            followers_count: followers.get(&account.id).copied().unwrap_or_default(),
            followings_count: followings.get(&account.id).copied().unwrap_or_default(),
            tweets_count: tweet_counts.get(&account.id).copied().unwrap_or_default(),
            is_followed: followed.contains(&account.id),
            username: account.username,
            firstname: account.firstname,
            lastname: account.lastname,
            bio: account.bio,
            picture: account.picture,
            background_picture: account.background_picture,
            join_date: format_time(account.join_date),
        })
        .collect())
}

pub fn mini_accounts(accounts: &[account::Model]) -> Vec<MiniAccountDto> {
    accounts.iter().map(MiniAccountDto::from).collect()
}

pub async fn tweets<C: ConnectionTrait>(
    db: &C,
    tweets: Vec<tweet::Model>,
    viewer: Option<i32>,
) -> Result<Vec<TweetDto>, AppError> {
    let ids: Vec<i32> = tweets.iter().map(|t| t.id).collect();
    let author_ids: Vec<i32> = tweets.iter().map(|t| t.user_id).collect();
    let authors = accounts_by_id(db, &author_ids).await?;
    let stats = store::content::tweet_stats(db, &ids).await?;
    let (liked, bookmarked) = match viewer {
        Some(viewer_id) => store::content::viewer_marks(db, viewer_id, &ids).await?,
        None => (Vec::new(), Vec::new()),
    };

    Ok(tweets
        .into_iter()
        .map(|t| {
            let author = authors.get(&t.user_id);
            let counts = stats.get(&t.id).copied().unwrap_or_default();
            TweetDto {
                id: t.id,
                content: t.content,
                date_created: format_time(t.date_created),
                user: author.map(|a| a.username.clone()).unwrap_or_default(),
                user_detail: author.map(MiniAccountDto::from),
                likes_count: counts.likes,
                replies_count: counts.replies,
                bookmarks_count: counts.bookmarks,
                time_since: elapsed_since(t.date_created),
                liked: liked.contains(&t.id),
                bookmarked: bookmarked.contains(&t.id),
            }
        })
        .collect())
}

pub async fn tweet<C: ConnectionTrait>(db: &C, tweet: tweet::Model, viewer: Option<i32>) -> Result<TweetDto, AppError> {
    tweets(db, vec![tweet], viewer)
        .await?
        .pop()
        .ok_or_else(AppError::system_exception)
}

pub async fn replies<C: ConnectionTrait>(db: &C, replies: Vec<reply::Model>) -> Result<Vec<ReplyDto>, AppError> {
    let author_ids: Vec<i32> = replies.iter().map(|r| r.user_id).collect();
    let authors = accounts_by_id(db, &author_ids).await?;
    Ok(replies
        .into_iter()
        .map(|r| {
            let author = authors.get(&r.user_id);
            ReplyDto {
                id: r.id,
                text: r.text,
                tweet: r.tweet_id,
                user: author.map(|a| a.username.clone()).unwrap_or_default(),
                user_detail: author.map(MiniAccountDto::from),
                date_created: format_time(r.date_created),
                time_since: elapsed_since(r.date_created),
            }
        })
        .collect())
}

pub async fn bookmarks<C: ConnectionTrait>(
    db: &C,
    marks: Vec<(bookmark::Model, tweet::Model)>,
    viewer: Option<i32>,
) -> Result<Vec<BookmarkDto>, AppError> {
    let (marks, marked_tweets): (Vec<bookmark::Model>, Vec<tweet::Model>) = marks.into_iter().unzip();
    let rendered = tweets(db, marked_tweets, viewer).await?;
    Ok(marks
        .into_iter()
        .zip(rendered)
        .map(|(mark, tweet)| BookmarkDto {
            id: mark.id,
            date_created: format_time(mark.date_created),
            tweet,
        })
        .collect())
}

pub async fn follow_edge<C: ConnectionTrait>(db: &C, edge: &follow::Model) -> Result<FollowDto, AppError> {
    let accounts = accounts_by_id(db, &[edge.user_id, edge.follower_id]).await?;
    let handle = |id: i32| accounts.get(&id).map(|a| a.username.clone()).unwrap_or_default();
    Ok(FollowDto {
        id: edge.id,
        user: handle(edge.user_id),
        follower: handle(edge.follower_id),
    })
}
