use serde_json::{
    json,
    Value,
};
use wiremock::matchers::{
    any,
    body_string_contains,
    method,
    path,
};
use wiremock::{
    Mock,
    ResponseTemplate,
};

use bulletin::uploads::MAX_UPLOAD_BYTES;

use crate::helpers::*;

fn post_body() -> Value {
    json!({
        "title": "Hello",
        "excerpt": "EXC",
        "content": "FULL-CONTENT",
        "post_url": "https://blog.example.com/posts/hello",
    })
}

#[actix_rt::test]
async fn publish_without_a_secret_is_rejected_with_no_side_effects() {
    let test_app = spawn_app().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&test_app.email_server)
        .await;

    let response = publish_post(&test_app, &post_body(), None).await;

    assert_eq!(401, response.status().as_u16());
    assert_eq!(0, count_rows(&test_app.pool, "posts").await);
}

#[actix_rt::test]
async fn publish_with_a_wrong_secret_is_rejected_with_no_side_effects() {
    let test_app = spawn_app().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&test_app.email_server)
        .await;

    let response = publish_post(&test_app, &post_body(), Some("not-the-secret")).await;

    assert_eq!(401, response.status().as_u16());
    assert_eq!(0, count_rows(&test_app.pool, "posts").await);
}

#[actix_rt::test]
async fn the_secret_is_also_accepted_in_the_body() {
    let test_app = spawn_app().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;

    let mut body = post_body();
    body["secret"] = json!(test_app.publish_secret);
    let response = publish_post(&test_app, &body, None).await;

    assert_eq!(200, response.status().as_u16());
    assert_eq!(1, count_rows(&test_app.pool, "posts").await);
}

#[actix_rt::test]
async fn publish_with_missing_required_fields_is_rejected_with_no_side_effects() {
    let test_app = spawn_app().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&test_app.email_server)
        .await;

    let invalid_bodies = vec![
        (
            json!({"post_url": "https://blog.example.com/posts/1"}),
            "missing title",
        ),
        (json!({"title": "Hello"}), "missing post_url"),
        (
            json!({"title": "  ", "post_url": "https://blog.example.com/posts/1"}),
            "blank title",
        ),
        (
            json!({"title": "Hello", "post_url": "not a url"}),
            "unparsable post_url",
        ),
    ];
    for (body, error_message) in invalid_bodies {
        let response = publish_post(&test_app, &body, Some(&test_app.publish_secret)).await;
        assert_eq!(
            400,
            response.status().as_u16(),
            "Publishing with {} did not fail",
            error_message
        );
    }
    assert_eq!(0, count_rows(&test_app.pool, "posts").await);
}

#[actix_rt::test]
async fn publish_notifies_every_subscriber_and_the_administrator() {
    let test_app = spawn_app().await;
    let subscriber_emails = ["one@example.com", "two@example.com", "three@example.com"];
    for email in subscriber_emails.iter() {
        create_subscriber(&test_app, "subscriber", email).await;
    }
    test_app.email_server.reset().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200))
        .expect(4)
        .mount(&test_app.email_server)
        .await;

    let response = publish_post(&test_app, &post_body(), Some(&test_app.publish_secret)).await;

    assert_eq!(200, response.status().as_u16());
    let report = response.json::<Value>().await.unwrap();
    assert_eq!(Some(true), report["success"].as_bool());
    assert_eq!(Some(3), report["sent"].as_u64());
    assert_eq!(Some(0), report["failed"].as_u64());
    assert_eq!(Some(3), report["total_recipients"].as_u64());
    assert!(report["post_id"].as_str().is_some());
    assert_eq!(1, count_rows(&test_app.pool, "posts").await);

    let mut recipients: Vec<String> = email_bodies(&test_app.email_server)
        .await
        .iter()
        .map(message_recipient)
        .collect();
    recipients.sort();
    let mut expected: Vec<String> = subscriber_emails
        .iter()
        .map(|email| email.to_string())
        .chain(std::iter::once(test_app.admin_email.clone()))
        .collect();
    expected.sort();
    assert_eq!(expected, recipients);
}

#[actix_rt::test]
async fn a_failed_send_is_recorded_without_failing_the_publish_call() {
    let test_app = spawn_app().await;
    for email in ["one@example.com", "failing@example.com", "three@example.com"].iter() {
        create_subscriber(&test_app, "subscriber", email).await;
    }
    test_app.email_server.reset().await;
    // first match wins: the failing recipient gets a provider error
    Mock::given(method("POST"))
        .and(path("/send"))
        .and(body_string_contains(r#""Email":"failing@example.com""#))
        .respond_with(ResponseTemplate::new(500))
        .mount(&test_app.email_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;

    let response = publish_post(&test_app, &post_body(), Some(&test_app.publish_secret)).await;

    assert_eq!(200, response.status().as_u16());
    let report = response.json::<Value>().await.unwrap();
    assert_eq!(Some(true), report["success"].as_bool());
    assert_eq!(Some(2), report["sent"].as_u64());
    assert_eq!(Some(1), report["failed"].as_u64());
    assert_eq!(Some(3), report["total_recipients"].as_u64());
    assert_eq!(json!(["failing@example.com"]), report["failed_recipients"]);
    assert_eq!(1, count_rows(&test_app.pool, "posts").await);

    // the administrator summary names the failed recipient
    let bodies = email_bodies(&test_app.email_server).await;
    let summary = bodies
        .iter()
        .find(|body| message_recipient(body) == test_app.admin_email)
        .expect("no admin summary was sent");
    assert!(message_html(summary).contains("failing@example.com"));
}

#[actix_rt::test]
async fn send_full_selects_the_content_and_accepts_stringy_flags() {
    let test_app = spawn_app().await;
    create_subscriber(&test_app, "subscriber", "one@example.com").await;
    test_app.email_server.reset().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;

    let mut body = post_body();
    body["send_full"] = json!("1");
    publish_post(&test_app, &body, Some(&test_app.publish_secret))
        .await
        .error_for_status()
        .unwrap();

    let bodies = email_bodies(&test_app.email_server).await;
    let notification = bodies
        .iter()
        .find(|body| message_recipient(body) == "one@example.com")
        .expect("no notification was sent");
    assert!(message_html(notification).contains("FULL-CONTENT"));
}

#[actix_rt::test]
async fn without_send_full_only_the_excerpt_goes_out() {
    let test_app = spawn_app().await;
    create_subscriber(&test_app, "subscriber", "one@example.com").await;
    test_app.email_server.reset().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;

    let mut body = post_body();
    body["send_full"] = json!(false);
    publish_post(&test_app, &body, Some(&test_app.publish_secret))
        .await
        .error_for_status()
        .unwrap();

    let bodies = email_bodies(&test_app.email_server).await;
    let notification = bodies
        .iter()
        .find(|body| message_recipient(body) == "one@example.com")
        .expect("no notification was sent");
    let html = message_html(notification);
    assert!(html.contains("EXC"));
    assert!(!html.contains("FULL-CONTENT"));
}

#[actix_rt::test]
async fn every_notification_carries_its_recipient_unsubscribe_link() {
    let test_app = spawn_app().await;
    let subscriber_emails = ["one@example.com", "two@example.com"];
    for email in subscriber_emails.iter() {
        create_subscriber(&test_app, "subscriber", email).await;
    }
    test_app.email_server.reset().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;

    publish_post(&test_app, &post_body(), Some(&test_app.publish_secret))
        .await
        .error_for_status()
        .unwrap();

    let bodies = email_bodies(&test_app.email_server).await;
    for email in subscriber_emails.iter() {
        let notification = bodies
            .iter()
            .find(|body| &message_recipient(body) == email)
            .expect("a subscriber got no notification");
        let encoded_email = email.replace('@', "%40");
        assert!(message_html(notification)
            .contains(&format!("/subscriptions/unsubscribe?email={}", encoded_email)));
    }
}

#[actix_rt::test]
async fn a_published_post_round_trips_through_the_listing() {
    let test_app = spawn_app().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;

    let mut body = post_body();
    body["send_full"] = json!(true);
    publish_post(&test_app, &body, Some(&test_app.publish_secret))
        .await
        .error_for_status()
        .unwrap();

    let listing_endpoint = format!("{}/newsletters", test_app.address);
    let posts = send_get_request(&listing_endpoint)
        .await
        .json::<Value>()
        .await
        .unwrap();

    let posts = posts.as_array().expect("the listing is not an array");
    assert_eq!(1, posts.len());
    assert_eq!("Hello", posts[0]["title"]);
    assert_eq!("https://blog.example.com/posts/hello", posts[0]["post_url"]);
    assert_eq!(Some(true), posts[0]["send_full"].as_bool());
    assert!(posts[0]["published_at"].as_str().is_some());
}

#[actix_rt::test]
async fn the_listing_starts_empty() {
    let test_app = spawn_app().await;

    let listing_endpoint = format!("{}/newsletters", test_app.address);
    let posts = send_get_request(&listing_endpoint)
        .await
        .json::<Value>()
        .await
        .unwrap();

    assert_eq!(json!([]), posts);
}

#[actix_rt::test]
async fn an_attachment_is_stored_and_linked_in_every_notification() {
    let test_app = spawn_app().await;
    create_subscriber(&test_app, "subscriber", "one@example.com").await;
    test_app.email_server.reset().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;

    let mut body = post_body();
    body["attachment"] = json!({
        "file_name": "notes.pdf",
        "content": base64::encode(b"%PDF-1.4 fake"),
    });
    let response = publish_post(&test_app, &body, Some(&test_app.publish_secret)).await;

    assert_eq!(200, response.status().as_u16());
    let report = response.json::<Value>().await.unwrap();
    let attachment_url = report["attachment_url"]
        .as_str()
        .expect("no attachment url in the report");
    assert!(attachment_url.ends_with("-notes.pdf"));

    let bodies = email_bodies(&test_app.email_server).await;
    let notification = bodies
        .iter()
        .find(|body| message_recipient(body) == "one@example.com")
        .expect("no notification was sent");
    assert!(message_html(notification).contains(attachment_url));
}

#[actix_rt::test]
async fn an_oversized_attachment_is_rejected_with_no_side_effects() {
    let test_app = spawn_app().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&test_app.email_server)
        .await;

    let mut body = post_body();
    body["attachment"] = json!({
        "file_name": "big.bin",
        "content": base64::encode(vec![0_u8; MAX_UPLOAD_BYTES + 1]),
    });
    let response = publish_post(&test_app, &body, Some(&test_app.publish_secret)).await;

    assert_eq!(400, response.status().as_u16());
    assert_eq!(0, count_rows(&test_app.pool, "posts").await);
}

#[actix_rt::test]
async fn an_attachment_with_a_forbidden_file_name_is_rejected() {
    let test_app = spawn_app().await;

    let mut body = post_body();
    body["attachment"] = json!({
        "file_name": "../evil.sh",
        "content": base64::encode(b"#!/bin/sh"),
    });
    let response = publish_post(&test_app, &body, Some(&test_app.publish_secret)).await;

    assert_eq!(400, response.status().as_u16());
    assert_eq!(0, count_rows(&test_app.pool, "posts").await);
}
