//! Web channel: settings GitHub only exposes through its web UI.
//!
//! A handful of organization settings have no REST or GraphQL surface. This
//! channel authenticates like a browser (username, password, TOTP one-time
//! code), keeps one logged-in session per organization, and reads or writes
//! individual form controls located by CSS selector.
//!
//! The channel is inherently fragile: GitHub can change its markup at any
//! time. A selector that no longer matches is therefore a *soft* error
//! ([`Error::SelectorNotFound`]) that callers downgrade to a per-field
//! warning instead of aborting the run.

use scraper::{ElementRef, Html, Selector};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use totp_rs::{Algorithm, Secret, TOTP};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::errors::Error;

#[cfg(test)]
#[path = "web_tests.rs"]
mod tests;

/// Credentials for the web channel.
#[derive(Clone)]
pub struct WebCredentials {
    pub username: String,
    pub password: SecretString,
    /// Base32-encoded TOTP seed, as shown during 2FA enrollment.
    pub totp_secret: SecretString,
}

impl std::fmt::Debug for WebCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebCredentials")
            .field("username", &self.username)
            .finish()
    }
}

/// How a web setting is represented in the page markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// `<input type="checkbox">`; read as bool.
    Checkbox,
    /// Text input; read as string from the `value` attribute.
    Input,
    /// `<select>`; read as the text of the selected option.
    Select,
}

/// Descriptor locating one web-only setting.
#[derive(Debug, Clone)]
pub struct WebSetting {
    /// Model field name this setting maps to.
    pub field: &'static str,
    /// Page path under `organizations/{org}/`.
    pub page: &'static str,
    /// CSS selector for the form control.
    pub selector: &'static str,
    pub kind: ControlKind,
}

/// Factory for logged-in web sessions.
#[derive(Debug)]
pub struct WebChannel {
    http: reqwest::Client,
    credentials: WebCredentials,
    base_url: Url,
}

impl WebChannel {
    /// Builds the channel with a cookie-holding HTTP client.
    pub fn new(credentials: WebCredentials) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent("org-steward")
            .build()
            .map_err(|e| Error::AuthError(format!("failed to build web client: {e}")))?;
        let base_url = Url::parse("https://github.com/")
            .map_err(|e| Error::AuthError(format!("invalid base url: {e}")))?;
        Ok(Self {
            http,
            credentials,
            base_url,
        })
    }

    /// Points the channel at a different host.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Logs in and returns the session scoped to one organization.
    ///
    /// Performs the password step, then the TOTP step when GitHub asks for
    /// two-factor verification. Invalid credentials are fatal for the run.
    #[instrument(skip(self), fields(org = %org, username = %self.credentials.username))]
    pub async fn login(&self, org: &str) -> Result<WebSession, Error> {
        info!(org = org, "Logging in to the GitHub web UI");

        let login_url = self.join("login")?;
        let login_page = self.fetch_page(&login_url).await?;
        // A missing login form is an authentication failure, not a soft
        // per-field error: nothing web-sourced can proceed without it.
        let (action, mut fields) = form_payload(&login_page, "form[action=\"/session\"]")
            .map_err(|e| Error::AuthError(format!("login form not recognized: {e}")))?;
        set_field(&mut fields, "login", self.credentials.username.clone());
        set_field(
            &mut fields,
            "password",
            self.credentials.password.expose_secret().to_string(),
        );

        let session_url = self.resolve(&login_url, &action)?;
        let response = self
            .http
            .post(session_url)
            .form(&fields)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("login POST failed: {e}")))?;
        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("login response unreadable: {e}")))?;

        let body = if final_url.path().contains("/sessions/two-factor") {
            self.complete_two_factor(&final_url, &body).await?
        } else {
            body
        };

        if !is_logged_in(&body, &self.credentials.username) {
            return Err(Error::AuthError(
                "web UI login failed: invalid username, password, or one-time code".to_string(),
            ));
        }

        info!(org = org, "Web UI session established");
        Ok(WebSession {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            org: org.to_string(),
            open: true,
        })
    }

    async fn complete_two_factor(&self, page_url: &Url, page: &str) -> Result<String, Error> {
        debug!("Two-factor verification requested");
        let code = totp_code(self.credentials.totp_secret.expose_secret())?;
        let (action, mut fields) = form_payload(page, "form[action*=\"two-factor\"]")
            .map_err(|e| Error::AuthError(format!("two-factor form not recognized: {e}")))?;
        set_field(&mut fields, "app_otp", code);

        let target = self.resolve(page_url, &action)?;
        let response = self
            .http
            .post(target)
            .form(&fields)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("two-factor POST failed: {e}")))?;
        response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("two-factor response unreadable: {e}")))
    }

    async fn fetch_page(&self, url: &Url) -> Result<String, Error> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::Transport(format!("GET {url} failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::ApiError(format!(
                "GET {url} returned {}",
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("GET {url} body unreadable: {e}")))
    }

    fn join(&self, path: &str) -> Result<Url, Error> {
        self.base_url
            .join(path)
            .map_err(|e| Error::WebFormError(format!("invalid path {path}: {e}")))
    }

    fn resolve(&self, page_url: &Url, action: &str) -> Result<Url, Error> {
        page_url
            .join(action)
            .map_err(|e| Error::WebFormError(format!("invalid form action {action}: {e}")))
    }
}

/// One logged-in web session, scoped to a single organization.
///
/// The session holds the only authenticated cookie jar for the run, so all
/// access through it must be serialized by the caller. Dropping the session
/// discards the cookie jar; [`WebSession::close`] additionally signs out.
pub struct WebSession {
    http: reqwest::Client,
    base_url: Url,
    org: String,
    open: bool,
}

impl WebSession {
    /// Reads one setting from its settings page.
    #[instrument(skip(self, setting), fields(org = %self.org, field = %setting.field))]
    pub async fn read_setting(&self, setting: &WebSetting) -> Result<Value, Error> {
        let url = self.page_url(setting)?;
        let page = self.fetch_page(&url).await?;
        extract_value(&page, setting.selector, setting.kind)
    }

    /// Writes one setting by re-submitting its owning form.
    ///
    /// All other fields of the form (hidden CSRF token included) are carried
    /// over unchanged; only the target control's value is replaced.
    #[instrument(skip(self, setting, value), fields(org = %self.org, field = %setting.field))]
    pub async fn write_setting(&self, setting: &WebSetting, value: &Value) -> Result<(), Error> {
        let url = self.page_url(setting)?;
        let page = self.fetch_page(&url).await?;
        let (action, fields) = owning_form_payload(&page, setting.selector, setting.kind, value)?;
        let target = url
            .join(&action)
            .map_err(|e| Error::WebFormError(format!("invalid form action {action}: {e}")))?;

        let response = self
            .http
            .post(target)
            .form(&fields)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("form submit failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::WebFormError(format!(
                "form submit for '{}' returned {}",
                setting.field,
                response.status()
            )));
        }
        debug!(field = setting.field, "Web setting updated");
        Ok(())
    }

    /// Signs out and releases the session.
    pub async fn close(mut self) -> Result<(), Error> {
        self.open = false;
        let url = self
            .base_url
            .join("logout")
            .map_err(|e| Error::WebFormError(format!("invalid logout url: {e}")))?;
        // Sign-out failing only leaves a server-side session behind; the
        // cookie jar is discarded with the session either way.
        if let Err(e) = self.http.post(url).send().await {
            warn!(error = %e, "Web UI sign-out failed");
        }
        Ok(())
    }

    async fn fetch_page(&self, url: &Url) -> Result<String, Error> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::Transport(format!("GET {url} failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::ApiError(format!(
                "GET {url} returned {}",
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("GET {url} body unreadable: {e}")))
    }

    fn page_url(&self, setting: &WebSetting) -> Result<Url, Error> {
        self.base_url
            .join(&format!("organizations/{}/{}", self.org, setting.page))
            .map_err(|e| Error::WebFormError(format!("invalid page {}: {e}", setting.page)))
    }
}

impl Drop for WebSession {
    fn drop(&mut self) {
        if self.open {
            debug!(org = %self.org, "Web session dropped; cookie jar discarded");
        }
    }
}

/// Generates the current TOTP code from a base32-encoded seed.
fn totp_code(seed: &str) -> Result<String, Error> {
    let bytes = Secret::Encoded(seed.trim().to_string())
        .to_bytes()
        .map_err(|e| Error::AuthError(format!("invalid TOTP secret: {e:?}")))?;
    // GitHub seeds are 80 bits, below the RFC 4226 recommended minimum that
    // TOTP::new enforces.
    let totp = TOTP::new_unchecked(Algorithm::SHA1, 6, 1, 30, bytes);
    totp.generate_current()
        .map_err(|e| Error::AuthError(format!("system clock error generating TOTP: {e}")))
}

/// Extracts a control's value from page markup.
fn extract_value(html: &str, selector: &str, kind: ControlKind) -> Result<Value, Error> {
    let document = Html::parse_document(html);
    let parsed = Selector::parse(selector)
        .map_err(|e| Error::WebFormError(format!("invalid selector {selector}: {e:?}")))?;
    let element = document
        .select(&parsed)
        .next()
        .ok_or_else(|| Error::SelectorNotFound {
            selector: selector.to_string(),
        })?;

    match kind {
        ControlKind::Checkbox => Ok(Value::Bool(element.value().attr("checked").is_some())),
        ControlKind::Input => Ok(Value::String(
            element.value().attr("value").unwrap_or_default().to_string(),
        )),
        ControlKind::Select => {
            let option = Selector::parse("option[selected]")
                .map_err(|e| Error::WebFormError(format!("selector error: {e:?}")))?;
            let selected = element
                .select(&option)
                .next()
                .ok_or_else(|| Error::SelectorNotFound {
                    selector: format!("{selector} option[selected]"),
                })?;
            Ok(Value::String(
                selected.text().collect::<String>().trim().to_string(),
            ))
        }
    }
}

/// Collects a form's action and submittable fields by form selector.
fn form_payload(html: &str, form_selector: &str) -> Result<(String, Vec<(String, String)>), Error> {
    let document = Html::parse_document(html);
    let parsed = Selector::parse(form_selector)
        .map_err(|e| Error::WebFormError(format!("invalid selector {form_selector}: {e:?}")))?;
    let form = document
        .select(&parsed)
        .next()
        .ok_or_else(|| Error::SelectorNotFound {
            selector: form_selector.to_string(),
        })?;
    Ok(collect_form(form)?)
}

/// Finds the form owning the control matched by `selector`, and returns its
/// action plus fields with the control's value replaced by `value`.
fn owning_form_payload(
    html: &str,
    selector: &str,
    kind: ControlKind,
    value: &Value,
) -> Result<(String, Vec<(String, String)>), Error> {
    let document = Html::parse_document(html);
    let parsed = Selector::parse(selector)
        .map_err(|e| Error::WebFormError(format!("invalid selector {selector}: {e:?}")))?;
    let control = document
        .select(&parsed)
        .next()
        .ok_or_else(|| Error::SelectorNotFound {
            selector: selector.to_string(),
        })?;
    let control_name = control
        .value()
        .attr("name")
        .ok_or_else(|| Error::WebFormError(format!("control {selector} has no name")))?
        .to_string();

    let form = control
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "form")
        .ok_or_else(|| Error::WebFormError(format!("control {selector} has no owning form")))?;

    let (action, mut fields) = collect_form(form)?;
    let encoded = match (kind, value) {
        (ControlKind::Checkbox, Value::Bool(true)) => "1".to_string(),
        (ControlKind::Checkbox, Value::Bool(false)) => "0".to_string(),
        (_, Value::String(s)) => s.clone(),
        (_, other) => other.to_string(),
    };
    set_field(&mut fields, &control_name, encoded);
    Ok((action, fields))
}

/// Gathers a form's action attribute and its named input/select fields.
fn collect_form(form: ElementRef<'_>) -> Result<(String, Vec<(String, String)>), Error> {
    let action = form
        .value()
        .attr("action")
        .ok_or_else(|| Error::WebFormError("form has no action attribute".to_string()))?
        .to_string();

    let inputs = Selector::parse("input[name], select[name]")
        .map_err(|e| Error::WebFormError(format!("selector error: {e:?}")))?;
    let mut fields = Vec::new();
    for input in form.select(&inputs) {
        let name = match input.value().attr("name") {
            Some(name) => name.to_string(),
            None => continue,
        };
        let value = if input.value().name() == "select" {
            let option = Selector::parse("option[selected]")
                .map_err(|e| Error::WebFormError(format!("selector error: {e:?}")))?;
            input
                .select(&option)
                .next()
                .and_then(|o| o.value().attr("value").map(str::to_string))
                .unwrap_or_default()
        } else if input.value().attr("type") == Some("checkbox") {
            if input.value().attr("checked").is_some() {
                input.value().attr("value").unwrap_or("1").to_string()
            } else {
                "0".to_string()
            }
        } else {
            input.value().attr("value").unwrap_or_default().to_string()
        };
        fields.push((name, value));
    }
    Ok((action, fields))
}

/// Sets or replaces one form field.
fn set_field(fields: &mut Vec<(String, String)>, name: &str, value: String) {
    if let Some(existing) = fields.iter_mut().find(|(n, _)| n == name) {
        existing.1 = value;
    } else {
        fields.push((name.to_string(), value));
    }
}

/// Whether the page belongs to a logged-in session for `username`.
fn is_logged_in(html: &str, username: &str) -> bool {
    let document = Html::parse_document(html);
    let Ok(meta) = Selector::parse("meta[name=\"user-login\"]") else {
        return false;
    };
    document
        .select(&meta)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|login| login.eq_ignore_ascii_case(username))
        .unwrap_or(false)
}
