//! Event Console status socket client
//!
//! Speaks the engine's line protocol:
//! - `COMMAND <NAME>[;arg...]`
//! - `GET <table>` with `Columns:` and `OutputFormat: json` headers; the
//!   first row of the answer is the column header
//! - `REPLICATE <last_update>`, answered with a JSON object holding `rules`

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use common::EngineSettings;
use ec_rules::{EngineControl, Event, ReplicationMode, RuleHits, RulePackRef, SwitchMode};

use crate::connection::EngineConnection;
use crate::endpoint::Endpoint;
use crate::error::{ClientError, Result};

/// Time to wait for a complete answer once connected
pub const DEFAULT_IO_TIMEOUT_SECS: u64 = 30;

/// Status column holding the replication role
const REPLICATION_MODE_COLUMN: &str = "status_replication_slavemode";

/// Structured data id used for the extra fields of created events
const SYSLOG_SD_ID: &str = "Checkmk@18662";

/// Client for one engine endpoint
#[derive(Debug, Clone)]
pub struct EventConsoleClient {
    endpoint: Endpoint,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl EventConsoleClient {
    pub fn new(endpoint: Endpoint, connect_timeout: Duration) -> Self {
        Self {
            endpoint,
            connect_timeout,
            io_timeout: Duration::from_secs(DEFAULT_IO_TIMEOUT_SECS),
        }
    }

    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    /// Client for configured engine settings; relative socket paths are
    /// resolved against `site_root`
    pub fn from_settings(settings: &EngineSettings, site_root: &Path) -> Result<Self> {
        let endpoint = Endpoint::parse(&settings.endpoint)?.relative_to(site_root);
        Ok(Self::new(
            endpoint,
            Duration::from_secs(settings.connect_timeout_secs),
        ))
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Send a raw query and return the raw answer
    pub async fn query(&self, query: &str) -> Result<String> {
        let connection = EngineConnection::connect(&self.endpoint, self.connect_timeout).await?;
        let mut request = query.trim_end_matches('\n').to_string();
        request.push('\n');
        connection.exchange(&request, self.io_timeout).await
    }

    /// Execute `COMMAND <name>;<args>`
    pub async fn command(&self, name: &str, args: &[&str]) -> Result<()> {
        let mut line = format!("COMMAND {name}");
        for arg in args {
            line.push(';');
            line.push_str(arg);
        }
        info!("Executing event daemon command: {}", line);
        self.query(&line).await?;
        Ok(())
    }

    /// Rows of `table` as column -> value maps
    pub async fn get_table(
        &self,
        table: &str,
        columns: &[&str],
    ) -> Result<Vec<HashMap<String, Value>>> {
        let mut query = format!("GET {table}\n");
        if !columns.is_empty() {
            query.push_str(&format!("Columns: {}\n", columns.join(" ")));
        }
        query.push_str("OutputFormat: json\n");

        let answer = self.query(&query).await?;
        parse_table(&answer)
    }

    /// Status row of the engine; `None` when the engine reports no status
    pub async fn status(&self) -> Result<Option<HashMap<String, Value>>> {
        Ok(self.get_table("status", &[]).await?.into_iter().next())
    }

    pub async fn get_replication_mode(&self) -> Result<ReplicationMode> {
        let rows = self.get_table("status", &[REPLICATION_MODE_COLUMN]).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get(REPLICATION_MODE_COLUMN))
            .and_then(Value::as_str)
            .map_or(ReplicationMode::Stopped, ReplicationMode::parse))
    }

    /// Hit counters of all rules
    pub async fn get_rule_hits(&self) -> Result<RuleHits> {
        let rows = self.get_table("rules", &["rule_id", "rule_hits"]).await?;
        let mut hits = RuleHits::default();
        for row in rows {
            let Some(rule_id) = row.get("rule_id").and_then(Value::as_str) else {
                continue;
            };
            let count = row.get("rule_hits").and_then(Value::as_u64).unwrap_or(0);
            hits.add(rule_id, count);
        }
        Ok(hits)
    }

    /// Rule configuration of the engine (`REPLICATE <last_update>`)
    pub async fn replicate_rules(&self, last_update: i64) -> Result<Vec<RulePackRef>> {
        let answer = self.query(&format!("REPLICATE {last_update}")).await?;
        let mut reply: serde_json::Map<String, Value> = serde_json::from_str(answer.trim())?;
        let rules = reply.remove("rules").ok_or_else(|| {
            ClientError::Protocol("The replication answer contains no rules".to_string())
        })?;
        let packs: Vec<RulePackRef> = serde_json::from_value(rules)?;
        debug!("Replicated {} rule packs from {}", packs.len(), self.endpoint);
        Ok(packs)
    }

    /// Inject `event` into the engine as if it was received via syslog
    pub async fn create_event(&self, event: &Event) -> Result<String> {
        let message = syslog_message(event);
        self.command("CREATE", &[&message]).await?;
        Ok(message)
    }
}

#[async_trait]
impl EngineControl for EventConsoleClient {
    async fn reset_counters(&self, rule_id: Option<&str>) -> ec_rules::Result<()> {
        match rule_id {
            Some(id) => self.command("RESETCOUNTERS", &[id]).await?,
            None => self.command("RESETCOUNTERS", &[]).await?,
        }
        Ok(())
    }

    async fn switch_mode(&self, mode: SwitchMode) -> ec_rules::Result<()> {
        self.command("SWITCHMODE", &[mode.as_str()]).await?;
        Ok(())
    }

    async fn replicate(&self) -> ec_rules::Result<Vec<RulePackRef>> {
        Ok(self.replicate_rules(0).await?)
    }

    async fn replication_mode(&self) -> ReplicationMode {
        match self.get_replication_mode().await {
            Ok(mode) => mode,
            Err(e) => {
                warn!("Cannot query replication mode of {}: {}", self.endpoint, e);
                ReplicationMode::Stopped
            },
        }
    }

    async fn rule_hits(&self) -> ec_rules::Result<RuleHits> {
        Ok(self.get_rule_hits().await?)
    }
}

/// Parse a JSON table answer; the first row names the columns
fn parse_table(answer: &str) -> Result<Vec<HashMap<String, Value>>> {
    let rows: Vec<Vec<Value>> = serde_json::from_str(answer.trim())?;
    let mut rows = rows.into_iter();
    let Some(header) = rows.next() else {
        return Err(ClientError::Protocol("Empty table answer".to_string()));
    };

    let columns = header
        .into_iter()
        .map(|c| match c {
            Value::String(name) => Ok(name),
            other => Err(ClientError::Protocol(format!("Invalid column name {other}"))),
        })
        .collect::<Result<Vec<String>>>()?;

    Ok(rows
        .map(|row| columns.iter().cloned().zip(row).collect())
        .collect())
}

/// RFC 5424 line for `event` with address and service level as structured data
pub fn syslog_message(event: &Event) -> String {
    let pri = u32::from(event.facility) * 8 + u32::from(event.priority);
    let field = |value: &str| {
        if value.trim().is_empty() {
            "-".to_string()
        } else {
            value.trim().replace(char::is_whitespace, "_")
        }
    };

    let mut data = Vec::new();
    if !event.ipaddress.is_empty() {
        data.push(format!("ipaddress=\"{}\"", escape_sd(&event.ipaddress)));
    }
    if let Some(sl) = event.sl {
        data.push(format!("sl=\"{sl}\""));
    }
    let structured = if data.is_empty() {
        "-".to_string()
    } else {
        format!("[{} {}]", SYSLOG_SD_ID, data.join(" "))
    };

    format!(
        "<{}>1 {} {} {} - - {} {}",
        pri,
        event.time.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        field(&event.host),
        field(&event.application),
        structured,
        single_line(&event.text)
    )
}

/// The engine reads one request per line
fn single_line(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

fn escape_sd(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(']', "\\]")
}
