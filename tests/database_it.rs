// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
// self
use firebase_rtdb::{
	auth::{Credential, TokenManager},
	database::Database,
	error::Error,
	http::{Connector, ReqwestConnector},
};

// httpmock serves HTTPS with a self-signed certificate.
fn connector() -> Arc<dyn Connector> {
	Arc::new(ReqwestConnector::default().danger_accept_invalid_certs(true))
}

const PRIVATE_KEY: &str = include_str!("fixtures/rsa_pkcs8.pem");

fn database(server: &MockServer) -> Database {
	let json = serde_json::json!({
		"project_id": "demo-project",
		"private_key": PRIVATE_KEY,
		"client_email": "robot@demo-project.iam.gserviceaccount.com",
		"token_uri": server.url("/token"),
	});
	let credential = Credential::from_json(&json.to_string()).expect("Credential should parse.");
	let tokens = TokenManager::builder(credential)
		.connector(connector())
		.build()
		.expect("Token manager should build.");

	Database::builder(tokens)
		.base_url(server.url("/"))
		.connector(connector())
		.build()
		.expect("Database should build against the mock server.")
}

fn grant(server: &MockServer) -> httpmock::Mock<'_> {
	server.mock(|when, then| {
		when.method(POST).path("/token");
		then.status(200)
			.header("content-type", "application/json")
			.body("{\"access_token\":\"abc\",\"expires_in\":3600}");
	})
}

#[test]
fn reads_and_writes_with_bearer_token() -> color_eyre::Result<()> {
	let server = MockServer::start();
	let token = grant(&server);
	let read = server.mock(|when, then| {
		when.method(GET)
			.path("/users/ada.json")
			.header("authorization", "Bearer abc")
			.header("content-type", "application/json");
		then.status(200).body("{\"name\":\"Ada\",\"born\":1815}");
	});
	let write = server.mock(|when, then| {
		when.method(PUT).path("/users/ada/born.json").header("authorization", "Bearer abc");
		then.status(200).body("1816");
	});
	let mut db = database(&server);

	assert_eq!(db.get("users/ada")?, serde_json::json!({ "name": "Ada", "born": 1815 }));
	assert_eq!(db.put("/users/ada/born", &serde_json::json!(1816))?, serde_json::json!(1816));

	token.assert_calls(1);
	read.assert_calls(1);
	write.assert_calls(1);

	Ok(())
}

#[test]
fn error_status_surfaces_as_unexpected_status() {
	let server = MockServer::start();

	grant(&server);
	server.mock(|when, then| {
		when.method(GET).path("/secret.json");
		then.status(401).body("{\"error\":\"Permission denied\"}");
	});

	let mut db = database(&server);
	let err = db.get("secret").expect_err("401 must surface as an error.");

	assert!(matches!(err, Error::UnexpectedStatus { status: 401, .. }));
}
