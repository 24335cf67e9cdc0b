pub mod account;
pub mod bookmark;
pub mod follow;
pub mod like;
pub mod reply;
pub mod tweet;
