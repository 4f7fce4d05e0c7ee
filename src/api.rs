// API client module: a blocking HTTP session against the backend that
// owns user registration and per-user crawler-config browsing. The
// backend speaks form-encoded requests and wraps every successful
// payload in a `{"data": ...}` envelope.

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Message shown when the login endpoint cannot be reached at all.
const LOGIN_UNREACHABLE: &str = "unable to log in right now, check the network service";

/// Blocking API session. Holds the base URL and, after a successful
/// login, the bearer token attached to every admin call. The token is
/// plain session state on this value; handlers receive the client by
/// reference instead of reading any global.
pub struct ApiClient {
    client: Client,
    base_api: String,
    token: Option<String>,
}

/// Body of the login endpoint.
#[derive(Deserialize, Debug)]
struct LoginResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    token: Option<String>,
}

/// Body of the endpoints that only report a server message.
#[derive(Deserialize, Debug)]
struct MsgResponse {
    #[serde(default)]
    msg: String,
}

/// The `{"data": ...}` wrapper around every successful admin payload.
/// An absent `data` key decodes to the empty payload, not an error.
#[derive(Deserialize, Debug)]
#[serde(bound(deserialize = "T: serde::Deserialize<'de> + Default"))]
struct Envelope<T> {
    #[serde(default)]
    data: T,
}

impl ApiClient {
    /// Create a client for the backend rooted at `base_api` (including
    /// the `/api` prefix). Unauthenticated until `login` succeeds.
    pub fn new(base_api: &str) -> Result<ApiClient> {
        let client = Client::builder()
            .build()
            .context("failed to build the HTTP client")?;
        Ok(ApiClient {
            client,
            base_api: base_api.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Store a bearer token for subsequent authenticated requests.
    pub fn set_token(&mut self, token: &str) {
        self.token = Some(token.to_string());
    }

    /// Whether a login has succeeded in this session.
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Authorization headers for bearer-gated endpoints. Refuses before
    /// any request is built when no token is held.
    fn auth_headers(&self) -> Result<HeaderMap> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| anyhow!("not authenticated: log in before using admin endpoints"))?;
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .context("the session token is not a valid header value")?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    /// Log in with admin credentials. Returns `(success, message)`;
    /// on success the returned token is kept for the rest of the
    /// process. A transport or decode fault never escapes; it is
    /// reported as a failed login with a generic message.
    pub fn login(&mut self, uname: &str, upwd: &str) -> (bool, String) {
        match self.try_login(uname, upwd) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "login request failed");
                (false, LOGIN_UNREACHABLE.to_string())
            }
        }
    }

    fn try_login(&mut self, uname: &str, upwd: &str) -> Result<(bool, String)> {
        let url = format!("{}/admin/login", self.base_api);
        debug!(%url, "login");
        let res = self
            .client
            .post(&url)
            .form(&[("uname", uname), ("upwd", upwd)])
            .send()?;
        let status_ok = res.status().is_success();
        let body: LoginResponse = res.json()?;
        let success = status_ok && body.success;
        if success {
            self.token = body.token.filter(|token| !token.is_empty());
        }
        Ok((success && self.token.is_some(), body.msg))
    }

    /// Register a new user. Registration lives behind the backend, not
    /// the database; the console only triggers it.
    pub fn register(&self, uname: &str, upwd: &str, max_limit: i64) -> Result<String> {
        let url = format!("{}/user/register", self.base_api);
        debug!(%url, "register");
        let res = self
            .client
            .post(&url)
            .form(&[
                ("uname", uname),
                ("upwd", upwd),
                ("max_limit", max_limit.to_string().as_str()),
            ])
            .send()
            .context("failed to send the registration request")?;
        let body: MsgResponse = res.json().context("parsing the registration response")?;
        Ok(body.msg)
    }

    /// Set a new password for a user. Bearer-gated.
    pub fn change_password(&self, uname: &str, upwd: &str) -> Result<String> {
        let headers = self.auth_headers()?;
        let url = format!("{}/admin/password", self.base_api);
        debug!(%url, "change password");
        let res = self
            .client
            .post(&url)
            .headers(headers)
            .form(&[("uname", uname), ("upwd", upwd)])
            .send()
            .context("failed to send the password change request")?;
        let body: MsgResponse = res.json().context("parsing the password change response")?;
        Ok(body.msg)
    }

    /// All registered account names. Bearer-gated.
    pub fn list_users(&self) -> Result<Vec<String>> {
        let headers = self.auth_headers()?;
        let url = format!("{}/admin/json", self.base_api);
        debug!(%url, "list users");
        let res = self
            .client
            .get(&url)
            .headers(headers)
            .send()
            .context("failed to request the user listing")?;
        let body: Envelope<Vec<String>> = res.json().context("parsing the user listing")?;
        Ok(body.data)
    }

    /// The crawler-config names stored for one user. Bearer-gated.
    pub fn list_configs(&self, uname: &str) -> Result<Vec<String>> {
        let headers = self.auth_headers()?;
        let url = format!("{}/admin/json", self.base_api);
        debug!(%url, uname, "list configs");
        let res = self
            .client
            .post(&url)
            .headers(headers)
            .form(&[("uname", uname)])
            .send()
            .context("failed to request the config listing")?;
        let body: Envelope<Vec<String>> = res.json().context("parsing the config listing")?;
        Ok(body.data)
    }

    /// One named crawler config for one user, as key/value pairs.
    /// Bearer-gated; read-only browsing.
    pub fn get_config(&self, uname: &str, spider_name: &str) -> Result<Map<String, Value>> {
        let headers = self.auth_headers()?;
        let url = format!("{}/admin/v/json", self.base_api);
        debug!(%url, uname, spider_name, "get config");
        let res = self
            .client
            .post(&url)
            .headers(headers)
            .form(&[("uname", uname), ("spider_name", spider_name)])
            .send()
            .context("failed to request the config")?;
        let body: Envelope<Map<String, Value>> = res.json().context("parsing the config")?;
        Ok(body.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    /// Serve exactly one canned JSON response on a fresh local port and
    /// hand the raw request back through a channel. The tests run a
    /// real listener so the client's wire behavior is what is asserted.
    fn one_shot_server(body: &'static str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut buf = [0u8; 8192];
            let mut request = Vec::new();
            let header_end = loop {
                let n = stream.read(&mut buf).expect("read request");
                request.extend_from_slice(&buf[..n]);
                if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
                if n == 0 {
                    break request.len();
                }
            };
            let head = String::from_utf8_lossy(&request[..header_end]).to_string();
            let content_length = head
                .lines()
                .find_map(|line| {
                    let lower = line.to_ascii_lowercase();
                    let value = lower.strip_prefix("content-length:")?;
                    value.trim().parse::<usize>().ok()
                })
                .unwrap_or(0);
            while request.len() < header_end + content_length {
                let n = stream.read(&mut buf).expect("read body");
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).expect("write response");
            let _ = tx.send(String::from_utf8_lossy(&request).to_string());
        });
        (format!("http://{addr}"), rx)
    }

    #[test]
    fn login_success_stores_the_token() {
        let (base, rx) = one_shot_server(r#"{"success":true,"msg":"ok","token":"abc"}"#);
        let mut api = ApiClient::new(&base).unwrap();

        let (success, msg) = api.login("root", "secret");
        assert!(success);
        assert_eq!(msg, "ok");
        assert!(api.has_token());

        let request = rx.recv().unwrap();
        assert!(request.starts_with("POST /admin/login"));
        assert!(request.contains("uname=root"));
        assert!(request.contains("upwd=secret"));
    }

    #[test]
    fn rejected_login_leaves_no_token() {
        let (base, _rx) = one_shot_server(r#"{"success":false,"msg":"bad credentials"}"#);
        let mut api = ApiClient::new(&base).unwrap();

        let (success, msg) = api.login("root", "wrong");
        assert!(!success);
        assert_eq!(msg, "bad credentials");
        assert!(!api.has_token());
    }

    #[test]
    fn unreachable_login_reports_a_generic_message() {
        // Port 9 (discard) is not listening.
        let mut api = ApiClient::new("http://127.0.0.1:9").unwrap();
        let (success, msg) = api.login("root", "secret");
        assert!(!success);
        assert_eq!(msg, LOGIN_UNREACHABLE);
        assert!(!api.has_token());
    }

    #[test]
    fn bearer_header_is_attached_to_gated_calls() {
        let (base, rx) = one_shot_server(r#"{"data":["alice","bob"]}"#);
        let mut api = ApiClient::new(&base).unwrap();
        api.set_token("abc");

        let users = api.list_users().unwrap();
        assert_eq!(users, vec!["alice".to_string(), "bob".to_string()]);

        let request = rx.recv().unwrap();
        assert!(request.starts_with("GET /admin/json"));
        assert!(
            request.contains("Authorization: Bearer abc")
                || request.contains("authorization: Bearer abc")
        );
    }

    #[test]
    fn gated_calls_refuse_without_a_token() {
        // The base URL points nowhere; a transport attempt would fail
        // with a connect error, so the auth wording proves the call
        // was refused before any request went out.
        let api = ApiClient::new("http://127.0.0.1:9").unwrap();
        let err = api.list_users().unwrap_err();
        assert!(err.to_string().contains("not authenticated"));
    }

    #[test]
    fn missing_data_key_yields_the_empty_payload() {
        let (base, _rx) = one_shot_server("{}");
        let mut api = ApiClient::new(&base).unwrap();
        api.set_token("abc");
        assert!(api.list_users().unwrap().is_empty());
    }

    #[test]
    fn config_artifact_round_trip() {
        let (base, rx) = one_shot_server(r#"{"data":{"keywords":"rust","pages":3}}"#);
        let mut api = ApiClient::new(&base).unwrap();
        api.set_token("abc");

        let config = api.get_config("alice", "news_spider").unwrap();
        assert_eq!(config.get("keywords"), Some(&Value::String("rust".into())));
        assert_eq!(config.get("pages"), Some(&Value::from(3)));

        let request = rx.recv().unwrap();
        assert!(request.starts_with("POST /admin/v/json"));
        assert!(request.contains("uname=alice"));
        assert!(request.contains("spider_name=news_spider"));
    }
}
