use super::*;

#[test]
fn static_cookies_split_inbound_header() {
    let cookies = StaticCookies::from_header("XSRF-TOKEN=abc%3D; laravel_session=xyz ;  theme=dark");
    assert_eq!(cookies.cookie("XSRF-TOKEN").as_deref(), Some("abc%3D"));
    assert_eq!(cookies.cookie("laravel_session").as_deref(), Some("xyz"));
    assert_eq!(cookies.cookie("theme").as_deref(), Some("dark"));
}

#[test]
fn static_cookies_keep_equals_in_value_and_skip_garbage() {
    let cookies = StaticCookies::from_header("a=b=c; novalue; =orphan");
    assert_eq!(cookies.cookie("a").as_deref(), Some("b=c"));
    assert!(cookies.cookie("novalue").is_none());
    assert!(cookies.cookie("").is_none());
}

#[test]
fn static_cookies_lookup() {
    let cookies = StaticCookies::from_header("x=1").with("y", "2");
    assert_eq!(cookies.cookie("x").as_deref(), Some("1"));
    assert_eq!(cookies.cookie("y").as_deref(), Some("2"));
    assert!(cookies.cookie("z").is_none());
    assert!(NoCookies.cookie("x").is_none());
}

#[test]
fn jar_cookies_reads_origin_cookies() {
    let jar = Arc::new(Jar::default());
    let origin = Url::parse("http://localhost:8001/").unwrap();
    jar.add_cookie_str("XSRF-TOKEN=tok%2B1; Path=/", &origin);
    let source = JarCookies::new(jar, origin);
    assert_eq!(source.cookie("XSRF-TOKEN").as_deref(), Some("tok%2B1"));
    assert!(source.cookie("missing").is_none());
}

#[test]
fn http_response_success_range() {
    assert!(HttpResponse { status: 204, body: String::new() }.is_success());
    assert!(!HttpResponse { status: 302, body: String::new() }.is_success());
    assert!(!HttpResponse { status: 401, body: String::new() }.is_success());
}

fn request_with(headers: HeaderMap, credentials: Credentials) -> HttpRequest {
    HttpRequest {
        method: Method::GET,
        url: "http://localhost:8001/api/user".to_owned(),
        headers,
        body: None,
        credentials,
    }
}

#[tokio::test]
async fn forwarding_fetch_adds_inbound_cookie() {
    let inner = test_helpers::MockFetch::new(vec![test_helpers::Reply::Raw(200, "{}")]);
    let fetch = ForwardingFetch::new(inner.clone(), HeaderValue::from_static("laravel_session=abc"));

    let response = fetch.fetch(request_with(HeaderMap::new(), Credentials::Include)).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(inner.requests()[0].headers.get(COOKIE).unwrap(), "laravel_session=abc");
}

#[tokio::test]
async fn forwarding_fetch_keeps_explicit_cookie_and_respects_omit() {
    let inner = test_helpers::MockFetch::new(vec![
        test_helpers::Reply::Raw(200, "{}"),
        test_helpers::Reply::Raw(200, "{}"),
    ]);
    let fetch = ForwardingFetch::new(inner.clone(), HeaderValue::from_static("a=1"));

    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, HeaderValue::from_static("b=2"));
    fetch.fetch(request_with(headers, Credentials::Include)).await.unwrap();
    fetch.fetch(request_with(HeaderMap::new(), Credentials::Omit)).await.unwrap();

    let sent = inner.requests();
    assert_eq!(sent[0].headers.get(COOKIE).unwrap(), "b=2");
    assert!(sent[1].headers.get(COOKIE).is_none());
}
