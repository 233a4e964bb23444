#![allow(dead_code)]

use flashgate::config::load_config_from_str;
use flashgate::state::ClientState;
use flashgate::store::CredentialPair;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

const SIGNING_SECRET: &str = "flashcards-test-secret";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
}

/// A signed access token for `sub` expiring `offset_secs` from now.
pub fn mint_token(sub: &str, offset_secs: i64) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        exp: chrono::Utc::now().timestamp() + offset_secs,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SIGNING_SECRET.as_bytes()),
    )
    .expect("failed to sign token")
}

pub fn memory_config(base_url: &str) -> String {
    format!(
        r#"
version: "1.0.0"
api:
  base_url: "{}"
  timeout_in_ms: 3000
store:
  type: memory
logging:
  level: debug
  format: json
"#,
        base_url
    )
}

pub fn file_config(base_url: &str, path: &std::path::Path) -> String {
    format!(
        r#"
version: "1.0.0"
api:
  base_url: "{}"
store:
  type: file
  path: "{}"
"#,
        base_url,
        path.display()
    )
}

pub fn build_state(yaml: &str) -> ClientState {
    let config = load_config_from_str(yaml).expect("test config should parse");
    ClientState::new(config).expect("client state should build")
}

/// Client state against `base_url` with `pair` already stored.
pub fn signed_in_state(base_url: &str, pair: &CredentialPair) -> ClientState {
    let state = build_state(&memory_config(base_url));
    state.session().begin(pair).expect("memory store accepts tokens");
    state
}
