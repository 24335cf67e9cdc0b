use sea_orm::entity::prelude::*;

pub const DEFAULT_PICTURE: &str = "profile_pictures/default_profile.png";
pub const DEFAULT_BACKGROUND_PICTURE: &str = "profile_pictures/default_background_picture.png";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "t_account")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub email: String,
    #[sea_orm(unique)]
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub bio: String,
    pub picture: String,
    pub background_picture: String,
    pub join_date: DateTimeUtc,
    pub is_active: bool,
    pub is_staff: bool,
    pub password_hash: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
