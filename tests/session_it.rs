// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
// self
use firebase_rtdb::{
	error::Error,
	http::{
		Connector, HttpSession, Method, ReqwestConnector, RequestOptions, SessionBuilder,
		SessionStatus,
	},
};

// httpmock serves HTTPS with a self-signed certificate.
fn connector() -> Arc<dyn Connector> {
	Arc::new(ReqwestConnector::default().danger_accept_invalid_certs(true))
}

fn session(base: &str) -> HttpSession {
	HttpSession::builder(base)
		.header(
			::http::HeaderName::from_static("x-client"),
			::http::HeaderValue::from_static("rtdb"),
		)
		.connector(connector())
		.build()
		.expect("Session should build for the mock server.")
}

#[test]
fn same_origin_redirect_reuses_session() -> color_eyre::Result<()> {
	let server = MockServer::start();
	let old = server.mock(|when, then| {
		when.method(GET).path("/old");
		then.status(301).header("location", "/newpath");
	});
	let new = server.mock(|when, then| {
		when.method(GET).path("/newpath").header("x-client", "rtdb");
		then.status(200).body("moved");
	});
	let mut session = session(&server.url("/"));
	let response = session.get(RequestOptions::new().path("/old"))?;

	old.assert_calls(1);
	new.assert_calls(1);

	assert_eq!(response.status, 200);
	assert_eq!(response.text(), "moved");
	assert_eq!(session.connections_opened(), 1);
	assert_eq!(session.status(), SessionStatus::Started);

	Ok(())
}

#[test]
fn cross_origin_redirect_hands_back_successor() {
	let origin = MockServer::start();
	let other = MockServer::start();
	let target = other.url("/landing");

	origin.mock(|when, then| {
		when.method(GET).path("/start");
		then.status(302).header("location", target.as_str());
	});

	let landing = other.mock(|when, then| {
		when.method(GET).path("/landing").header("x-client", "rtdb");
		then.status(200).body("elsewhere");
	});
	let mut session = session(&origin.url("/"));
	let dispatched = session
		.dispatch(Method::Get, RequestOptions::new().path("/start"))
		.expect("Cross-origin redirect should be followed.");

	landing.assert_calls(1);

	assert_eq!(dispatched.response.text(), "elsewhere");

	let successor = dispatched.successor.expect("A successor session should be spawned.");

	assert_eq!(successor.base_url().port(), Some(other.port()));
	assert_eq!(successor.headers()["x-client"], "rtdb");
	assert_eq!(successor.connections_opened(), 1);
	assert_eq!(session.connections_opened(), 1);
}

#[test]
fn redirect_loop_is_bounded() {
	let server = MockServer::start();
	let looping = server.mock(|when, then| {
		when.method(GET).path("/loop");
		then.status(302).header("location", "/loop");
	});
	let mut session = HttpSession::builder(server.url("/"))
		.max_redirects(3)
		.connector(connector())
		.build()
		.expect("Session should build for the mock server.");
	let err = session
		.get(RequestOptions::new().path("/loop"))
		.expect_err("An endless redirect chain must fail.");

	assert!(matches!(err, Error::TooManyRedirects { max: 3 }));

	looping.assert_calls(4);
}

#[test]
fn peer_close_reopens_on_next_call() {
	let server = MockServer::start();
	let ping = server.mock(|when, then| {
		when.method(GET).path("/ping");
		then.status(200).header("connection", "close").body("pong");
	});
	let mut session = session(&server.url("/"));

	session.get(RequestOptions::new().path("/ping")).expect("First call should succeed.");

	assert_eq!(session.status(), SessionStatus::Closed);

	session.get(RequestOptions::new().path("/ping")).expect("Second call should re-open.");

	ping.assert_calls(2);

	assert_eq!(session.connections_opened(), 2);
}

#[test]
fn error_statuses_are_returned_not_raised() {
	let server = MockServer::start();

	server.mock(|when, then| {
		when.method(DELETE).path("/busy");
		then.status(503).body("try later");
	});

	let mut session = session(&server.url("/"));
	let response =
		session.delete(RequestOptions::new().path("/busy")).expect("503 is still a response.");

	assert_eq!(response.status, 503);
	assert_eq!(response.message, "Service Unavailable");
	assert_eq!(response.text(), "try later");
}

#[test]
fn url_user_info_becomes_basic_auth() {
	let server = MockServer::start();
	let secured = server.mock(|when, then| {
		when.method(GET).path("/secured").header("authorization", "Basic dXNlcjpwYSBzcw==");
		then.status(200);
	});
	let base = format!("https://user:pa%20ss@{}/", server.address());
	let mut session =
		HttpSession::builder(base).connector(connector()).build().expect("Session should build.");
	let response =
		session.get(RequestOptions::new().path("/secured")).expect("Request should succeed.");

	secured.assert_calls(1);

	assert_eq!(response.status, 200);
}

#[test]
fn one_shot_get_sends_query_pairs() {
	let server = MockServer::start();
	let search = server.mock(|when, then| {
		when.method(GET).path("/search").query_param("q", "rust lang").query_param("page", "2");
		then.status(200).body("[]");
	});
	let response = SessionBuilder::new(server.url("/search"))
		.connector(connector())
		.get([("q", "rust lang"), ("page", "2")])
		.expect("One-shot GET should succeed.");

	search.assert_calls(1);

	assert_eq!(response.text(), "[]");
}

#[test]
fn unreachable_origin_is_a_transport_error() {
	let mut session = HttpSession::builder("http://127.0.0.1:9/")
		.build()
		.expect("Session should build without connecting.");
	let err = session
		.get(RequestOptions::new().path("/"))
		.expect_err("Nothing listens on the discard port.");

	assert!(matches!(err, Error::Transport(_)));
	assert_eq!(session.status(), SessionStatus::Closed);
}
