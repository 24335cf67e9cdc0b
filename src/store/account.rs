use std::collections::HashMap;

use bcrypt::hash;
use chrono::Utc;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::entity::account::{self, DEFAULT_BACKGROUND_PICTURE, DEFAULT_PICTURE};
use crate::entity::{bookmark, follow, like, reply, tweet};
use crate::error::{db_error, integrity_error, AppError};
use crate::store::{contains_literal, map_tx_error};

pub const PASSWORD_MIN_LEN: usize = 8;
pub const NAME_MAX_LEN: usize = 150;
pub const BIO_MAX_LEN: usize = 255;
const BCRYPT_COST: u32 = 10;

const UNIQUE_FIELDS: &[(&str, &str)] = &[
    ("email", "account with this email address already exists"),
    ("username", "account with this username already exists"),
];

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles"));

pub struct NewAccount {
    pub email: String,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub password: String,
    pub bio: String,
}

#[derive(Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub bio: Option<String>,
    pub picture: Option<String>,
    pub background_picture: Option<String>,
    pub password: Option<String>,
}

/// Lower-cases the domain part, leaving the local part untouched.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

fn required(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::param_error(field, format!("{} cannot be empty", field)));
    }
    Ok(())
}

fn max_len(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    if value.chars().count() > max {
        return Err(AppError::param_error(
            field,
            format!("{} must be at most {} characters", field, max),
        ));
    }
    Ok(())
}

fn check_email(email: &str) -> Result<(), AppError> {
    required("email", email)?;
    if !EMAIL_RE.is_match(email) {
        return Err(AppError::param_error("email", "enter a valid email address"));
    }
    Ok(())
}

fn check_username(username: &str) -> Result<(), AppError> {
    required("username", username)?;
    max_len("username", username, NAME_MAX_LEN)?;
    if username.chars().any(char::is_whitespace) {
        return Err(AppError::param_error("username", "username cannot contain whitespace"));
    }
    Ok(())
}

fn check_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(AppError::param_error(
            "password",
            format!("password must be at least {} characters", PASSWORD_MIN_LEN),
        ));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, BCRYPT_COST).map_err(|_| AppError::system_exception())
}

pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i32) -> Result<Option<account::Model>, AppError> {
    account::Entity::find_by_id(id).one(db).await.map_err(db_error)
}

pub async fn find_by_email<C: ConnectionTrait>(db: &C, email: &str) -> Result<Option<account::Model>, AppError> {
    account::Entity::find()
        .filter(account::Column::Email.eq(normalize_email(email)))
        .one(db)
        .await
        .map_err(db_error)
}

pub async fn find_by_username<C: ConnectionTrait>(db: &C, username: &str) -> Result<Option<account::Model>, AppError> {
    account::Entity::find()
        .filter(account::Column::Username.eq(username.trim()))
        .one(db)
        .await
        .map_err(db_error)
}

pub async fn get_by_username<C: ConnectionTrait>(db: &C, username: &str) -> Result<account::Model, AppError> {
    find_by_username(db, username)
        .await?
        .ok_or_else(|| AppError::not_found("account"))
}

pub async fn email_exists<C: ConnectionTrait>(db: &C, email: &str) -> Result<bool, AppError> {
    Ok(find_by_email(db, email).await?.is_some())
}

pub async fn username_exists<C: ConnectionTrait>(db: &C, username: &str) -> Result<bool, AppError> {
    Ok(find_by_username(db, username).await?.is_some())
}

/// Accounts with the given ids, in the order of `ids`; unknown ids are skipped.
pub async fn list_by_ids<C: ConnectionTrait>(db: &C, ids: &[i32]) -> Result<Vec<account::Model>, AppError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let found = account::Entity::find()
        .filter(account::Column::Id.is_in(ids.iter().copied()))
        .all(db)
        .await
        .map_err(db_error)?;
    Ok(ids
        .iter()
        .filter_map(|id| found.iter().find(|a| a.id == *id).cloned())
        .collect())
}

/// Substring match on handle, names and bio; an empty query matches everyone.
pub async fn search_users<C: ConnectionTrait>(db: &C, query: &str) -> Result<Vec<account::Model>, AppError> {
    let mut select = account::Entity::find();
    let query = query.trim();
    if !query.is_empty() {
        select = select.filter(
            Condition::any()
                .add(contains_literal(account::Column::Username, query))
                .add(contains_literal(account::Column::Firstname, query))
                .add(contains_literal(account::Column::Lastname, query))
                .add(contains_literal(account::Column::Bio, query)),
        );
    }
    select
        .order_by_asc(account::Column::Id)
        .all(db)
        .await
        .map_err(db_error)
}

/// Tweet count per author; accounts that never posted are absent.
pub async fn tweet_counts<C: ConnectionTrait>(db: &C, account_ids: &[i32]) -> Result<HashMap<i32, i64>, AppError> {
    if account_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i32, i64)> = tweet::Entity::find()
        .select_only()
        .column(tweet::Column::UserId)
        .column_as(Expr::col(tweet::Column::Id).count(), "cnt")
        .filter(tweet::Column::UserId.is_in(account_ids.iter().copied()))
        .group_by(tweet::Column::UserId)
        .into_tuple()
        .all(db)
        .await
        .map_err(db_error)?;
    Ok(rows.into_iter().collect())
}

/// Creates an inactive, non-staff account. Every field of `new` except
/// `bio` is required.
pub async fn create_account(db: &DatabaseConnection, new: NewAccount) -> Result<account::Model, AppError> {
    let email = normalize_email(&new.email);
    check_email(&email)?;
    check_username(&new.username)?;
    required("firstname", &new.firstname)?;
    max_len("firstname", &new.firstname, NAME_MAX_LEN)?;
    required("lastname", &new.lastname)?;
    max_len("lastname", &new.lastname, NAME_MAX_LEN)?;
    required("password", &new.password)?;
    max_len("bio", &new.bio, BIO_MAX_LEN)?;

    let password_hash = hash_password(&new.password)?;
    let model = account::ActiveModel {
        email: Set(email),
        username: Set(new.username.trim().to_string()),
        firstname: Set(new.firstname.trim().to_string()),
        lastname: Set(new.lastname.trim().to_string()),
        bio: Set(new.bio),
        picture: Set(DEFAULT_PICTURE.to_string()),
        background_picture: Set(DEFAULT_BACKGROUND_PICTURE.to_string()),
        join_date: Set(Utc::now()),
        is_active: Set(false),
        is_staff: Set(false),
        password_hash: Set(password_hash),
        ..Default::default()
    };

    let inserted = model
        .insert(db)
        .await
        .map_err(|e| integrity_error(e, UNIQUE_FIELDS))?;
    debug!("account created id={}", inserted.id);
    Ok(inserted)
}

pub async fn update_profile(
    db: &DatabaseConnection,
    current: account::Model,
    update: ProfileUpdate,
) -> Result<account::Model, AppError> {
    let mut active: account::ActiveModel = current.into();

    if let Some(v) = update.username {
        check_username(&v)?;
        active.username = Set(v.trim().to_string());
    }
    if let Some(v) = update.firstname {
        required("firstname", &v)?;
        max_len("firstname", &v, NAME_MAX_LEN)?;
        active.firstname = Set(v.trim().to_string());
    }
    if let Some(v) = update.lastname {
        required("lastname", &v)?;
        max_len("lastname", &v, NAME_MAX_LEN)?;
        active.lastname = Set(v.trim().to_string());
    }
    if let Some(v) = update.bio {
        max_len("bio", &v, BIO_MAX_LEN)?;
        active.bio = Set(v);
    }
    if let Some(v) = update.picture {
        active.picture = Set(if v.trim().is_empty() { DEFAULT_PICTURE.to_string() } else { v });
    }
    if let Some(v) = update.background_picture {
        active.background_picture = Set(if v.trim().is_empty() {
            DEFAULT_BACKGROUND_PICTURE.to_string()
        } else {
            v
        });
    }
    if let Some(password) = update.password {
        check_password(&password)?;
        active.password_hash = Set(hash_password(&password)?);
    }

    active
        .update(db)
        .await
        .map_err(|e| integrity_error(e, UNIQUE_FIELDS))
}

/// Deletes an account with everything it owns: its tweets (and their likes,
/// replies and bookmarks), its own likes, replies and bookmarks, and follow
/// edges in both directions.
pub async fn remove_account(db: &DatabaseConnection, account_id: i32) -> Result<(), AppError> {
    db.transaction::<_, (), AppError>(|txn| {
        Box::pin(async move {
            let tweet_ids: Vec<i32> = tweet::Entity::find()
                .filter(tweet::Column::UserId.eq(account_id))
                .all(txn)
                .await
                .map_err(db_error)?
                .into_iter()
                .map(|t| t.id)
                .collect();

            like::Entity::delete_many()
                .filter(
                    Condition::any()
                        .add(like::Column::UserId.eq(account_id))
                        .add(like::Column::TweetId.is_in(tweet_ids.clone())),
                )
                .exec(txn)
                .await
                .map_err(db_error)?;
            bookmark::Entity::delete_many()
                .filter(
                    Condition::any()
                        .add(bookmark::Column::UserId.eq(account_id))
                        .add(bookmark::Column::TweetId.is_in(tweet_ids.clone())),
                )
                .exec(txn)
                .await
                .map_err(db_error)?;
            reply::Entity::delete_many()
                .filter(
                    Condition::any()
                        .add(reply::Column::UserId.eq(account_id))
                        .add(reply::Column::TweetId.is_in(tweet_ids)),
                )
                .exec(txn)
                .await
                .map_err(db_error)?;
            tweet::Entity::delete_many()
                .filter(tweet::Column::UserId.eq(account_id))
                .exec(txn)
                .await
                .map_err(db_error)?;
            follow::Entity::delete_many()
                .filter(
                    Condition::any()
                        .add(follow::Column::UserId.eq(account_id))
                        .add(follow::Column::FollowerId.eq(account_id)),
                )
                .exec(txn)
                .await
                .map_err(db_error)?;
            let result = account::Entity::delete_by_id(account_id)
                .exec(txn)
                .await
                .map_err(db_error)?;
            if result.rows_affected == 0 {
                return Err(AppError::not_found("account"));
            }
            Ok(())
        })
    })
    .await
    .map_err(map_tx_error)?;
    debug!("account removed id={}", account_id);
    Ok(())
}
