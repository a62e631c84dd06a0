//! Google Sheets export via an Apps Script web-app endpoint.
//!
//! The script's deployments have disagreed over the years about response
//! field names, so parsing accepts every variant that has been observed
//! (`updatedRows`, `updated_rows`, plain `rows`).

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::SheetsConfig;
use crate::error::{AppError, FieldError, Result};
use crate::store::RunsViewRow;

#[derive(Clone)]
pub struct SheetsClient {
    client: Client,
    config: SheetsConfig,
}

#[derive(Debug, Serialize)]
struct ExportRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
    sheet: &'a str,
    rows: Vec<ExportRow>,
}

#[derive(Debug, Serialize)]
struct ExportRow {
    run_id: String,
    run_name: String,
    plan_name: String,
    status: String,
    total: i64,
    passed: i64,
    failed: i64,
    blocked: i64,
    skipped: i64,
    untested: i64,
    pass_rate: f64,
}

#[derive(Debug, Deserialize)]
struct ScriptResponse {
    #[serde(alias = "result")]
    status: Option<String>,
    #[serde(alias = "updatedRows", alias = "rows")]
    updated_rows: Option<u64>,
    #[serde(alias = "error")]
    message: Option<String>,
}

/// Outcome of a sheet export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportOutcome {
    pub exported_rows: usize,
    pub updated_rows: u64,
}

impl SheetsClient {
    pub fn new(config: SheetsConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();

        Self { client, config }
    }

    fn script_url(&self) -> Result<&str> {
        self.config.script_url.as_deref().ok_or_else(|| AppError::Validation {
            message: "Google Sheets integration is not configured".to_string(),
            details: vec![FieldError::new(
                "integrations.sheets.script_url",
                "not configured",
            )],
        })
    }

    /// Push runs-view rows to the configured sheet.
    pub async fn export_runs(&self, sheet: &str, rows: &[RunsViewRow]) -> Result<ExportOutcome> {
        let url = self.script_url()?;

        let request = ExportRequest {
            api_key: self.config.api_key.as_deref(),
            sheet,
            rows: rows
                .iter()
                .map(|row| ExportRow {
                    run_id: row.run_id.to_string(),
                    run_name: row.run_name.clone(),
                    plan_name: row.plan_name.clone(),
                    status: row.status.clone(),
                    total: row.total,
                    passed: row.passed,
                    failed: row.failed,
                    blocked: row.blocked,
                    skipped: row.skipped,
                    untested: row.untested,
                    pass_rate: row.pass_rate,
                })
                .collect(),
        };

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Apps Script request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Upstream(format!(
                "Apps Script returned {}",
                status
            )));
        }

        let body: ScriptResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Apps Script response was not valid JSON: {}", e)))?;

        if let Some(script_status) = body.status.as_deref() {
            if script_status != "ok" && script_status != "success" {
                return Err(AppError::Upstream(format!(
                    "Apps Script reported '{}': {}",
                    script_status,
                    body.message.unwrap_or_default()
                )));
            }
        }

        Ok(ExportOutcome {
            exported_rows: rows.len(),
            updated_rows: body.updated_rows.unwrap_or(rows.len() as u64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_export_rejected() {
        let client = SheetsClient::new(SheetsConfig::default());
        assert!(client.script_url().is_err());
    }

    #[test]
    fn test_response_field_fallbacks() {
        let camel: ScriptResponse =
            serde_json::from_str(r#"{"status": "ok", "updatedRows": 12}"#).unwrap();
        assert_eq!(camel.updated_rows, Some(12));

        let snake: ScriptResponse =
            serde_json::from_str(r#"{"result": "success", "updated_rows": 3}"#).unwrap();
        assert_eq!(snake.updated_rows, Some(3));
        assert_eq!(snake.status.as_deref(), Some("success"));

        let bare: ScriptResponse = serde_json::from_str(r#"{"rows": 5}"#).unwrap();
        assert_eq!(bare.updated_rows, Some(5));
        assert!(bare.status.is_none());
    }
}
