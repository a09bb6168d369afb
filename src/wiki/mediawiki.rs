//! MediaWiki Action API client (api.php)
//!
//! Login uses a bot password. Edits carry the revision timestamp seen by
//! the last read so the server can report edit conflicts.

use super::{bot_exclusion, category_title, log_entry, AuditLog, Criterion, PageStore, RevisionId, Worklist, LOG_HEADER};
use crate::error::{Error, SaveError};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

/// API error codes that mean "you may not edit this page"
const NOT_PERMITTED_CODES: &[&str] = &[
    "protectedpage",
    "cascadeprotected",
    "protectednamespace",
    "protectednamespace-interface",
    "protectedtitle",
    "permissiondenied",
    "blocked",
    "autoblocked",
    "noedit",
    "writeapidenied",
    "abusefilter-disallowed",
    "spamblacklist",
];

pub struct MediaWikiClient {
    client: reqwest::Client,
    api_url: String,
    username: Option<String>,
    log_page: Option<String>,
    namespace: Option<i64>,
    csrf_token: Mutex<Option<String>>,
    /// Revision timestamp per page from the last `get_text`
    base_timestamps: Mutex<HashMap<String, String>>,
}

impl MediaWikiClient {
    pub fn new(api_url: &str, user_agent: &str) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .cookie_store(true)
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            username: None,
            log_page: None,
            namespace: Some(0),
            csrf_token: Mutex::new(None),
            base_timestamps: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_log_page(mut self, log_page: Option<String>) -> Self {
        self.log_page = log_page;
        self
    }

    /// Restrict category members to one namespace; `None` lists all
    pub fn with_namespace(mut self, namespace: Option<i64>) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Log in with a bot password (`Name@app` / generated password)
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), Error> {
        let tokens = self
            .get(&[("action", "query"), ("meta", "tokens"), ("type", "login")])
            .await?;
        let login_token = tokens
            .pointer("/query/tokens/logintoken")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::UnexpectedResponse("no login token".to_string()))?
            .to_string();

        let response = self
            .post(&[
                ("action", "login"),
                ("lgname", username),
                ("lgpassword", password),
                ("lgtoken", login_token.as_str()),
            ])
            .await?;

        let result = response
            .pointer("/login/result")
            .and_then(Value::as_str)
            .unwrap_or("missing");
        if result != "Success" {
            let reason = response
                .pointer("/login/reason")
                .and_then(Value::as_str)
                .unwrap_or(result);
            return Err(Error::Login {
                reason: reason.to_string(),
            });
        }

        info!(username, "logged in");
        self.username = Some(username.to_string());
        Ok(())
    }

    async fn csrf_token(&self) -> Result<String, Error> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let tokens = self
            .get(&[("action", "query"), ("meta", "tokens")])
            .await?;
        let token = tokens
            .pointer("/query/tokens/csrftoken")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::UnexpectedResponse("no csrf token".to_string()))?
            .to_string();

        if let Ok(mut cached) = self.csrf_token.lock() {
            *cached = Some(token.clone());
        }
        Ok(token)
    }

    fn cached_token(&self) -> Option<String> {
        self.csrf_token.lock().ok().and_then(|t| t.clone())
    }

    fn base_timestamp(&self, page: &str) -> Option<String> {
        self.base_timestamps
            .lock()
            .ok()
            .and_then(|m| m.get(page).cloned())
    }

    async fn get(&self, params: &[(&str, &str)]) -> Result<Value, Error> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&[("format", "json"), ("formatversion", "2")])
            .query(params)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post(&self, params: &[(&str, &str)]) -> Result<Value, Error> {
        let mut form: Vec<(&str, &str)> = vec![("format", "json"), ("formatversion", "2")];
        form.extend_from_slice(params);

        let response = self.client.post(&self.api_url).form(&form).send().await?;
        Self::decode(response).await
    }

    async fn decode(response: reqwest::Response) -> Result<Value, Error> {
        let status = response.status();
        if !status.is_success() {
            return Err(Error::UnexpectedResponse(format!("HTTP {}", status)));
        }

        let body: Value = response.json().await?;
        if let Some(error) = body.get("error") {
            return Err(Error::Api {
                code: error
                    .get("code")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                info: error
                    .get("info")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }
        Ok(body)
    }

    async fn edit(&self, params: &[(&str, &str)]) -> Result<Value, Error> {
        let token = self.csrf_token().await?;
        let mut form: Vec<(&str, &str)> = vec![("action", "edit"), ("bot", "1")];
        form.extend_from_slice(params);
        form.push(("token", token.as_str()));
        self.post(&form).await
    }

    async fn category_members(&self, name: &str) -> Result<Vec<String>, Error> {
        let title = category_title(name);
        let namespace = self.namespace.map(|n| n.to_string());
        let mut members = Vec::new();
        let mut continuation: Vec<(String, String)> = Vec::new();

        loop {
            let mut params: Vec<(&str, &str)> = vec![
                ("action", "query"),
                ("list", "categorymembers"),
                ("cmtitle", title.as_str()),
                ("cmlimit", "max"),
            ];
            if let Some(ns) = &namespace {
                params.push(("cmnamespace", ns.as_str()));
            }
            params.extend(continuation.iter().map(|(k, v)| (k.as_str(), v.as_str())));

            let body = self.get(&params).await?;
            if let Some(list) = body
                .pointer("/query/categorymembers")
                .and_then(Value::as_array)
            {
                members.extend(
                    list.iter()
                        .filter_map(|m| m.get("title").and_then(Value::as_str))
                        .map(String::from),
                );
            }

            match body.get("continue").and_then(Value::as_object) {
                Some(next) => {
                    continuation = next
                        .iter()
                        .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                        .collect();
                    debug!(count = members.len(), "continuing category listing");
                }
                None => break,
            }
        }

        Ok(members)
    }
}

impl PageStore for MediaWikiClient {
    async fn get_text(&self, page: &str) -> Result<Option<String>, Error> {
        let body = self
            .get(&[
                ("action", "query"),
                ("prop", "revisions"),
                ("rvprop", "content|timestamp"),
                ("rvslots", "main"),
                ("titles", page),
            ])
            .await?;

        let record = body
            .pointer("/query/pages/0")
            .ok_or_else(|| Error::UnexpectedResponse(format!("no page record for {}", page)))?;

        if record.get("missing").is_some() || record.get("invalid").is_some() {
            return Ok(None);
        }

        let revision = record
            .pointer("/revisions/0")
            .ok_or_else(|| Error::UnexpectedResponse(format!("no revision for {}", page)))?;

        if let Some(ts) = revision.get("timestamp").and_then(Value::as_str) {
            if let Ok(mut stamps) = self.base_timestamps.lock() {
                stamps.insert(page.to_string(), ts.to_string());
            }
        }

        let text = revision
            .pointer("/slots/main/content")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::UnexpectedResponse(format!("no content for {}", page)))?;

        Ok(Some(text.to_string()))
    }

    async fn put_text(&self, page: &str, text: &str, comment: &str) -> Result<RevisionId, SaveError> {
        if let Some(reason) = bot_exclusion(text, self.username.as_deref()) {
            return Err(SaveError::NotPermitted {
                page: page.to_string(),
                reason,
            });
        }

        let base = self.base_timestamp(page);
        let mut params: Vec<(&str, &str)> = vec![
            ("title", page),
            ("text", text),
            ("summary", comment),
            ("nocreate", "1"),
        ];
        if let Some(ts) = &base {
            params.push(("basetimestamp", ts.as_str()));
        }

        let body = match self.edit(&params).await {
            Ok(body) => body,
            Err(Error::Api { code, info }) => return Err(classify_edit_error(page, code, info)),
            Err(e) => return Err(SaveError::Failed(e)),
        };

        let edit = body
            .get("edit")
            .ok_or_else(|| Error::UnexpectedResponse("no edit object".to_string()))?;
        let result = edit.get("result").and_then(Value::as_str).unwrap_or_default();
        if result != "Success" {
            return Err(SaveError::Failed(Error::UnexpectedResponse(format!(
                "edit result {}",
                if result.is_empty() { "missing" } else { result }
            ))));
        }
        if edit.get("nochange").is_some() {
            return Err(SaveError::NoChange {
                page: page.to_string(),
            });
        }

        edit.get("newrevid")
            .and_then(Value::as_u64)
            .ok_or_else(|| SaveError::Failed(Error::UnexpectedResponse("no newrevid".to_string())))
    }
}

impl Worklist for MediaWikiClient {
    async fn list_candidate_pages(&self, criterion: &Criterion) -> Result<Vec<String>, Error> {
        match criterion {
            Criterion::Pages(pages) => Ok(pages.clone()),
            Criterion::Category(name) => self.category_members(name).await,
        }
    }
}

impl AuditLog for MediaWikiClient {
    async fn append_log(&self, page: &str, comment: &str, revision: RevisionId) -> Result<(), Error> {
        let Some(log_page) = &self.log_page else {
            debug!(page, "no log page configured");
            return Ok(());
        };

        let entry = log_entry(page, comment, revision, Utc::now());
        let summary = format!("Logging edit to {}", page);

        match self.get_text(log_page).await? {
            Some(_) => {
                self.edit(&[
                    ("title", log_page.as_str()),
                    ("appendtext", entry.as_str()),
                    ("summary", summary.as_str()),
                ])
                .await?;
            }
            None => {
                let text = format!("{}{}", LOG_HEADER, entry);
                self.edit(&[
                    ("title", log_page.as_str()),
                    ("text", text.as_str()),
                    ("summary", summary.as_str()),
                    ("createonly", "1"),
                ])
                .await?;
            }
        }

        Ok(())
    }
}

fn classify_edit_error(page: &str, code: String, info: String) -> SaveError {
    if code == "editconflict" {
        SaveError::EditConflict {
            page: page.to_string(),
        }
    } else if NOT_PERMITTED_CODES.contains(&code.as_str()) {
        SaveError::NotPermitted {
            page: page.to_string(),
            reason: format!("{}: {}", code, info),
        }
    } else {
        SaveError::Failed(Error::Api { code, info })
    }
}
