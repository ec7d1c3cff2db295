//! Supabase backend: PostgREST for rows, Realtime for change streams.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::{realtime, Filter, RemoteBackend, SelectQuery, Subscription, TableFilter};
use crate::config::RemoteConfig;
use crate::{Error, Result};

const MAX_ERROR_BODY_CHARS: usize = 180;

#[derive(Clone)]
pub struct SupabaseBackend {
    rest_url: String,
    realtime_url: String,
    anon_key: String,
    client: Client,
}

impl std::fmt::Debug for SupabaseBackend {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SupabaseBackend")
            .field("rest_url", &self.rest_url)
            .field("realtime_url", &self.realtime_url)
            .field("anon_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl SupabaseBackend {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        Ok(Self {
            rest_url: format!("{}/rest/v1", config.supabase_url),
            realtime_url: realtime_websocket_url(&config.supabase_url)?,
            anon_key: config.supabase_anon_key.clone(),
            client: Client::builder().build()?,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{table}", self.rest_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .header("Accept", "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = self.authorized(request).send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Backend(parse_api_error(status, &body)))
    }
}

#[async_trait]
impl RemoteBackend for SupabaseBackend {
    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>> {
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&rows);
        let response = self.send(request).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()> {
        if filters.is_empty() {
            return Err(Error::Backend(format!(
                "refusing unfiltered delete on {table}"
            )));
        }
        let request = self
            .client
            .delete(self.table_url(table))
            .query(&filter_params(filters));
        self.send(request).await?;
        Ok(())
    }

    async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<Value>> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(filter_params(&query.filters));
        if let Some(order) = &query.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(("order".to_string(), format!("{}.{direction}", order.column)));
        }
        if let Some(limit) = query.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        let request = self.client.get(self.table_url(table)).query(&params);
        let response = self.send(request).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }

    async fn subscribe(&self, channel: &str, tables: Vec<TableFilter>) -> Result<Subscription> {
        realtime::subscribe(&self.realtime_url, &self.anon_key, channel, tables).await
    }
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|filter| (filter.column.clone(), filter.operator()))
        .collect()
}

fn realtime_websocket_url(supabase_url: &str) -> Result<String> {
    let base = if let Some(rest) = supabase_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = supabase_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(Error::InvalidConfig(
            "Supabase URL must include http:// or https://".to_string(),
        ));
    };
    Ok(format!("{base}/realtime/v1/websocket"))
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorResponse {
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
    error: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorResponse>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            let detail = payload.details.or(payload.hint).unwrap_or_default();
            let detail = detail.trim();
            return if detail.is_empty() {
                format!("{} ({})", message.trim(), status.as_u16())
            } else {
                format!("{}: {} ({})", message.trim(), detail, status.as_u16())
            };
        }
    }

    let trimmed: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realtime_url_switches_scheme() {
        assert_eq!(
            realtime_websocket_url("https://demo.supabase.co").unwrap(),
            "wss://demo.supabase.co/realtime/v1/websocket"
        );
        assert_eq!(
            realtime_websocket_url("http://localhost:54321").unwrap(),
            "ws://localhost:54321/realtime/v1/websocket"
        );
    }

    #[test]
    fn parse_api_error_prefers_postgrest_message() {
        let message = parse_api_error(
            StatusCode::CONFLICT,
            r#"{"code":"23505","message":"duplicate key","details":"Key (id)=(1) exists."}"#,
        );
        assert_eq!(message, "duplicate key: Key (id)=(1) exists. (409)");
    }

    #[test]
    fn parse_api_error_falls_back_to_body() {
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, ""), "HTTP 502");
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, " upstream down "),
            "upstream down (502)"
        );
    }

    #[test]
    fn backend_debug_redacts_key() {
        let config = RemoteConfig::new("https://demo.supabase.co", "secret-anon").unwrap();
        let backend = SupabaseBackend::new(&config).unwrap();
        let rendered = format!("{backend:?}");
        assert!(!rendered.contains("secret-anon"));
        assert!(rendered.contains("https://demo.supabase.co/rest/v1"));
    }

    #[test]
    fn filter_params_use_eq_operator() {
        let params = filter_params(&[Filter::eq("tournament_id", "t-1")]);
        assert_eq!(
            params,
            vec![("tournament_id".to_string(), "eq.t-1".to_string())]
        );
    }
}
