mod common;

use actix_web::{http::StatusCode, test};
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::json;

use chirp_backend::auth::{encode_token, TokenKind};
use chirp_backend::build_app;
use chirp_backend::entity::account;
use chirp_backend::store::account::find_by_username;

use common::{bearer, context, login, register, send, signup_body, wait_for_mail, PASSWORD};

macro_rules! app {
    ($ctx:expr) => {
        test::init_service(build_app($ctx.config.clone(), $ctx.db.clone(), $ctx.mail.clone())).await
    };
}

// ============================================================================
// SIGN-UP AND ACTIVATION
// ============================================================================

#[actix_web::test]
async fn signup_creates_an_inactive_account_and_mails_a_working_link() {
    let ctx = context().await;
    let app = app!(ctx);

    let req = test::TestRequest::post().uri("/signup").set_json(signup_body("alice")).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["username"], "alice");
    assert!(body["data"].get("password").is_none());
    assert!(body["data"].get("password_hash").is_none());

    let stored = find_by_username(ctx.db.get_ref(), "alice").await.unwrap().unwrap();
    assert!(!stored.is_active);
    assert!(!stored.is_staff);
    assert_ne!(stored.password_hash, PASSWORD);

    wait_for_mail(&ctx, 1).await;
    let sent = ctx.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "alice@example.com");

    let link = sent[0]
        .body
        .lines()
        .find(|l| l.contains("/verify-email?token="))
        .unwrap()
        .trim()
        .to_string();
    let path = link.trim_start_matches("http://testserver");
    let (status, body) = send(&app, test::TestRequest::get().uri(path).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_active"], true);

    // redeeming twice is harmless
    let (status, _) = send(&app, test::TestRequest::get().uri(path).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(find_by_username(ctx.db.get_ref(), "alice").await.unwrap().unwrap().is_active);
}

#[actix_web::test]
async fn signup_without_a_required_field_is_rejected() {
    let ctx = context().await;
    let app = app!(ctx);

    for field in ["email", "username", "firstname", "lastname", "password"] {
        let mut payload = signup_body("carol");
        payload.as_object_mut().unwrap().remove(field);
        let req = test::TestRequest::post().uri("/signup").set_json(payload).to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "missing {}", field);
        assert_eq!(body["field"], field);
    }

    let count = account::Entity::find().count(ctx.db.get_ref()).await.unwrap();
    assert_eq!(count, 0);
}

#[actix_web::test]
async fn duplicate_email_or_username_is_a_field_error() {
    let ctx = context().await;
    let app = app!(ctx);

    let req = test::TestRequest::post().uri("/signup").set_json(signup_body("dave")).to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::CREATED);

    let mut same_email = signup_body("dave2");
    same_email["email"] = json!("dave@EXAMPLE.com");
    let req = test::TestRequest::post().uri("/signup").set_json(same_email).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "email");

    let mut same_name = signup_body("dave");
    same_name["email"] = json!("other@example.com");
    let req = test::TestRequest::post().uri("/signup").set_json(same_name).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "username");
}

#[actix_web::test]
async fn bad_activation_token_is_a_validation_error() {
    let ctx = context().await;
    let app = app!(ctx);
    let req = test::TestRequest::get().uri("/verify-email?token=garbage").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "token");
}

#[actix_web::test]
async fn existence_checks_answer_with_booleans() {
    let ctx = context().await;
    let app = app!(ctx);
    register(&app, &ctx, "erin").await;

    let req = test::TestRequest::post()
        .uri("/check-email")
        .set_json(json!({ "email": "erin@example.com" }))
        .to_request();
    assert_eq!(send(&app, req).await.1["data"], true);

    let req = test::TestRequest::post()
        .uri("/check-username")
        .set_json(json!({ "username": "nobody" }))
        .to_request();
    assert_eq!(send(&app, req).await.1["data"], false);
}

// ============================================================================
// TOKENS
// ============================================================================

#[actix_web::test]
async fn inactive_accounts_and_wrong_passwords_get_401() {
    let ctx = context().await;
    let app = app!(ctx);

    let req = test::TestRequest::post().uri("/signup").set_json(signup_body("frank")).to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri("/token")
        .set_json(json!({ "email": "frank@example.com", "password": PASSWORD }))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::UNAUTHORIZED);

    register(&app, &ctx, "grace").await;
    let req = test::TestRequest::post()
        .uri("/token")
        .set_json(json!({ "email": "grace@example.com", "password": "wrong-password" }))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn refresh_and_verify_tokens() {
    let ctx = context().await;
    let app = app!(ctx);
    register(&app, &ctx, "heidi").await;

    let req = test::TestRequest::post()
        .uri("/token")
        .set_json(json!({ "email": "heidi@example.com", "password": PASSWORD }))
        .to_request();
    let (_, body) = send(&app, req).await;
    let refresh = body["data"]["refresh"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/token/refresh")
        .set_json(json!({ "refresh": refresh }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let access = body["data"]["access"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/token/verify")
        .set_json(json!({ "token": access }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "heidi");

    // an access token is not a refresh token
    let req = test::TestRequest::post()
        .uri("/token/refresh")
        .set_json(json!({ "refresh": access }))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/token/verify")
        .set_json(json!({ "token": "nope" }))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// ACCESS RULES
// ============================================================================

#[actix_web::test]
async fn anonymous_writes_are_401_and_wrong_verbs_405() {
    let ctx = context().await;
    let app = app!(ctx);
    let token = register(&app, &ctx, "ivan").await;

    let req = test::TestRequest::post().uri("/home").set_json(json!({ "content": "hi" })).to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get().uri("/home").to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::OK);

    let req = test::TestRequest::post().uri("/explore").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["code"], 6);

    let req = test::TestRequest::get().uri("/compose/tweet").to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/compose/tweet")
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::METHOD_NOT_ALLOWED);

    let req = test::TestRequest::post()
        .uri("/compose/tweet")
        .insert_header(bearer(&token))
        .set_json(json!({ "content": "composed" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["user"], "ivan");

    let req = test::TestRequest::get().uri("/bookmarks").to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn every_resource_wraps_wrong_verbs() {
    let ctx = context().await;
    let app = app!(ctx);

    for uri in ["/like-tweet/1", "/follow-request", "/token", "/search-users", "/bookmarks/1/check"] {
        let req = test::TestRequest::put().uri(uri).to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{}", uri);
        assert_eq!(body["code"], 6, "{}", uri);
    }
}

#[actix_web::test]
async fn unusable_tokens_read_public_pages_anonymously() {
    let ctx = context().await;
    let app = app!(ctx);
    register(&app, &ctx, "lena").await;
    let lena = find_by_username(ctx.db.get_ref(), "lena").await.unwrap().unwrap();
    let expired = encode_token(&ctx.config, &lena, TokenKind::Access, chrono::Duration::hours(-2)).unwrap();

    for token in ["garbage", expired.as_str()] {
        let req = test::TestRequest::get().uri("/explore").insert_header(bearer(token)).to_request();
        assert_eq!(send(&app, req).await.0, StatusCode::OK);

        let req = test::TestRequest::get().uri("/profiles/lena").insert_header(bearer(token)).to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].get("email").is_none());

        let req = test::TestRequest::post()
            .uri("/home")
            .insert_header(bearer(token))
            .set_json(json!({ "content": "hi" }))
            .to_request();
        assert_eq!(send(&app, req).await.0, StatusCode::UNAUTHORIZED);
    }
}

#[actix_web::test]
async fn empty_tweet_is_rejected() {
    let ctx = context().await;
    let app = app!(ctx);
    let token = register(&app, &ctx, "judy").await;

    let req = test::TestRequest::post()
        .uri("/home")
        .insert_header(bearer(&token))
        .set_json(json!({ "content": "   " }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "content");
}

#[actix_web::test]
async fn only_the_owner_may_edit_a_profile() {
    let ctx = context().await;
    let app = app!(ctx);
    let alice = register(&app, &ctx, "alice").await;
    let bob = register(&app, &ctx, "bob").await;

    let req = test::TestRequest::patch()
        .uri("/profiles/alice")
        .set_json(json!({ "bio": "hacked" }))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::patch()
        .uri("/profiles/alice")
        .insert_header(bearer(&bob))
        .set_json(json!({ "bio": "hacked" }))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::FORBIDDEN);

    let req = test::TestRequest::patch()
        .uri("/profiles/alice")
        .insert_header(bearer(&alice))
        .set_json(json!({ "password": "short" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "password");

    let req = test::TestRequest::patch()
        .uri("/profiles/alice")
        .insert_header(bearer(&alice))
        .set_json(json!({ "password": "a-much-longer-secret", "bio": "hello there" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["bio"], "hello there");

    let req = test::TestRequest::post()
        .uri("/token")
        .set_json(json!({ "email": "alice@example.com", "password": "a-much-longer-secret" }))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::OK);

    let req = test::TestRequest::get().uri("/profiles/alice").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].get("email").is_none());

    let req = test::TestRequest::get().uri("/profiles/nobody").to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::NOT_FOUND);
}

// ============================================================================
// TWEETS, LIKES, BOOKMARKS, REPLIES
// ============================================================================

#[actix_web::test]
async fn like_and_bookmark_round() {
    let ctx = context().await;
    let app = app!(ctx);
    let alice = register(&app, &ctx, "alice").await;
    let bob = register(&app, &ctx, "bob").await;

    let req = test::TestRequest::post()
        .uri("/compose/tweet")
        .insert_header(bearer(&alice))
        .set_json(json!({ "content": "hello from alice" }))
        .to_request();
    let (_, body) = send(&app, req).await;
    let id = body["data"]["id"].as_i64().unwrap();

    let req = test::TestRequest::get()
        .uri(&format!("/tweets/{}", id))
        .insert_header(bearer(&bob))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["content"], "hello from alice");
    assert_eq!(body["data"]["user_detail"]["username"], "alice");

    let like = || {
        test::TestRequest::post()
            .uri(&format!("/like-tweet/{}", id))
            .insert_header(bearer(&bob))
            .to_request()
    };
    assert_eq!(send(&app, like()).await.0, StatusCode::CREATED);
    let (status, body) = send(&app, like()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "tweet");

    let req = test::TestRequest::get()
        .uri(&format!("/like/{}/check", id))
        .insert_header(bearer(&bob))
        .to_request();
    assert_eq!(send(&app, req).await.1["data"]["liked"], true);

    let req = test::TestRequest::get().uri(&format!("/list-tweet-likes/{}", id)).to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["data"][0]["username"], "bob");

    let bookmark = |req: test::TestRequest| {
        req.uri(&format!("/bookmarks/{}", id))
            .insert_header(bearer(&bob))
            .to_request()
    };
    assert_eq!(send(&app, bookmark(test::TestRequest::post())).await.0, StatusCode::CREATED);

    let req = test::TestRequest::get().uri("/bookmarks").insert_header(bearer(&bob)).to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["data"][0]["tweet"]["id"], id);
    assert_eq!(body["data"][0]["tweet"]["bookmarked"], true);

    assert_eq!(send(&app, bookmark(test::TestRequest::delete())).await.0, StatusCode::NO_CONTENT);
    assert_eq!(send(&app, bookmark(test::TestRequest::delete())).await.0, StatusCode::NOT_FOUND);

    let req = test::TestRequest::delete()
        .uri(&format!("/remove-like/{}", id))
        .insert_header(bearer(&bob))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::NO_CONTENT);
}

#[actix_web::test]
async fn only_the_author_deletes_a_tweet() {
    let ctx = context().await;
    let app = app!(ctx);
    let alice = register(&app, &ctx, "alice").await;
    let bob = register(&app, &ctx, "bob").await;

    let req = test::TestRequest::post()
        .uri("/home")
        .insert_header(bearer(&alice))
        .set_json(json!({ "content": "short-lived" }))
        .to_request();
    let (_, body) = send(&app, req).await;
    let uri = format!("/tweets/{}", body["data"]["id"]);

    let req = test::TestRequest::delete().uri(&uri).insert_header(bearer(&bob)).to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete().uri(&uri).insert_header(bearer(&alice)).to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::NO_CONTENT);

    let req = test::TestRequest::get().uri(&uri).to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri("/tweets/not-a-number").to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn missing_tweets_are_404_before_anything_else() {
    let ctx = context().await;
    let app = app!(ctx);
    let token = register(&app, &ctx, "mona").await;

    for uri in ["/like/999/check", "/bookmarks/999/check"] {
        let req = test::TestRequest::get().uri(uri).insert_header(bearer(&token)).to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["code"], 5, "{}", uri);
    }

    let req = test::TestRequest::post()
        .uri("/tweets/999/reply")
        .insert_header(bearer(&token))
        .set_json(json!({ "text": "" }))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn replies_are_listed_newest_first() {
    let ctx = context().await;
    let app = app!(ctx);
    let alice = register(&app, &ctx, "alice").await;

    let req = test::TestRequest::post()
        .uri("/home")
        .insert_header(bearer(&alice))
        .set_json(json!({ "content": "thread" }))
        .to_request();
    let (_, body) = send(&app, req).await;
    let uri = format!("/tweets/{}/reply", body["data"]["id"]);

    for text in ["first", "second"] {
        let req = test::TestRequest::post()
            .uri(&uri)
            .insert_header(bearer(&alice))
            .set_json(json!({ "text": text }))
            .to_request();
        assert_eq!(send(&app, req).await.0, StatusCode::CREATED);
    }

    let req = test::TestRequest::post().uri(&uri).set_json(json!({ "text": "anon" })).to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, test::TestRequest::get().uri(&uri).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["text"], "second");
    assert_eq!(body["data"][1]["text"], "first");
    assert_eq!(body["data"][0]["time_since"]["days"], 0);
}

// ============================================================================
// FOLLOWING AND FEEDS
// ============================================================================

#[actix_web::test]
async fn following_shapes_the_home_timeline() {
    let ctx = context().await;
    let app = app!(ctx);
    let alice = register(&app, &ctx, "alice").await;
    let bob = register(&app, &ctx, "bob").await;
    register(&app, &ctx, "carol").await;

    let req = test::TestRequest::post()
        .uri("/home")
        .insert_header(bearer(&alice))
        .set_json(json!({ "content": "alice speaks" }))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::CREATED);

    let req = test::TestRequest::get().uri("/home").insert_header(bearer(&bob)).to_request();
    assert_eq!(send(&app, req).await.1["data"], json!([]));

    let follow = || {
        test::TestRequest::post()
            .uri("/follow-request")
            .insert_header(bearer(&bob))
            .set_json(json!({ "username": "alice" }))
            .to_request()
    };
    let (status, body) = send(&app, follow()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["follower"], "bob");
    assert_eq!(send(&app, follow()).await.0, StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/follow-request")
        .insert_header(bearer(&bob))
        .set_json(json!({ "username": "bob" }))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get().uri("/home").insert_header(bearer(&bob)).to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["data"][0]["content"], "alice speaks");

    let req = test::TestRequest::get().uri("/suggested-users").insert_header(bearer(&bob)).to_request();
    let (_, body) = send(&app, req).await;
    let names: Vec<&str> = body["data"].as_array().unwrap().iter().map(|p| p["username"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["carol"]);

    let req = test::TestRequest::get().uri("/profiles/alice/followers").to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["data"][0]["username"], "bob");

    let unfollow = || {
        test::TestRequest::delete()
            .uri("/profiles/alice/unfollow")
            .insert_header(bearer(&bob))
            .to_request()
    };
    assert_eq!(send(&app, unfollow()).await.0, StatusCode::NO_CONTENT);
    assert_eq!(send(&app, unfollow()).await.0, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn unfollow_by_edge_id_is_limited_to_the_follower() {
    let ctx = context().await;
    let app = app!(ctx);
    register(&app, &ctx, "alice").await;
    let bob = register(&app, &ctx, "bob").await;
    let carol = register(&app, &ctx, "carol").await;

    let req = test::TestRequest::post()
        .uri("/follow-request")
        .insert_header(bearer(&bob))
        .set_json(json!({ "username": "alice" }))
        .to_request();
    let (_, body) = send(&app, req).await;
    let uri = format!("/unfollow/{}", body["data"]["id"]);

    let unfollow = |token: &str| test::TestRequest::delete().uri(&uri).insert_header(bearer(token)).to_request();
    assert_eq!(send(&app, unfollow(&carol)).await.0, StatusCode::NOT_FOUND);
    assert_eq!(send(&app, unfollow(&bob)).await.0, StatusCode::NO_CONTENT);
    assert_eq!(send(&app, unfollow(&bob)).await.0, StatusCode::NOT_FOUND);

    let req = test::TestRequest::delete().uri(&uri).to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get().uri("/profiles/alice/followers").to_request();
    assert_eq!(send(&app, req).await.1["data"], json!([]));
}

#[actix_web::test]
async fn searches_match_substrings() {
    let ctx = context().await;
    let app = app!(ctx);
    let alice = register(&app, &ctx, "alice").await;
    register(&app, &ctx, "bob").await;

    for content in ["rust is fun", "lunch time"] {
        let req = test::TestRequest::post()
            .uri("/home")
            .insert_header(bearer(&alice))
            .set_json(json!({ "content": content }))
            .to_request();
        send(&app, req).await;
    }

    let req = test::TestRequest::get().uri("/search-tweets?search=rust").to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::get().uri("/search-tweets?search=%25").to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["data"], json!([]));

    let req = test::TestRequest::get().uri("/search-users?search=bo").to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["data"][0]["username"], "bob");

    let req = test::TestRequest::get().uri("/explore").to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn a_second_login_yields_a_usable_token() {
    let ctx = context().await;
    let app = app!(ctx);
    register(&app, &ctx, "kim").await;
    let again = login(&app, "kim").await;
    let req = test::TestRequest::get().uri("/bookmarks").insert_header(bearer(&again)).to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::OK);
}
