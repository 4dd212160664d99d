// src/types.rs
//! Records served by the scraping API.
//!
//! The wire uses the scraper backend's Portuguese field names; the Rust side
//! renames them. Everything here is read-only input for the aggregator and the
//! change detector.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One scraped auction listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: u64,
    #[serde(rename = "nome_artista", default)]
    pub artist: Option<String>,
    #[serde(rename = "titulo", default)]
    pub title: Option<String>,
    /// Free-form, locale-ambiguous price string (e.g. "R$ 1.234,56").
    #[serde(rename = "valor", default)]
    pub price: Option<String>,
    /// Price refreshed after the auction closed.
    #[serde(rename = "valor_atualizado", default)]
    pub updated_price: Option<String>,
    #[serde(rename = "categoria", default)]
    pub category: Option<String>,
    #[serde(rename = "numero_lances", default)]
    pub bid_count: Option<i64>,
    #[serde(
        rename = "data_coleta",
        default,
        deserialize_with = "deserialize_timestamp"
    )]
    pub collected_at: Option<DateTime<Utc>>,
    #[serde(rename = "scraper_name", default)]
    pub source: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl ItemRecord {
    /// Price string fed to the normalizer: primary price, else the updated one.
    pub fn price_text(&self) -> Option<&str> {
        self.price
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .or(self.updated_price.as_deref())
    }

    /// Bid count clamped to zero.
    pub fn bids(&self) -> u64 {
        self.bid_count.unwrap_or(0).max(0) as u64
    }
}

/// Lifecycle of a scraping session as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[serde(alias = "executando", alias = "iniciando")]
    Running,
    #[serde(alias = "concluido")]
    Succeeded,
    #[serde(alias = "erro")]
    Failed,
    #[serde(alias = "interrompido")]
    Interrupted,
    #[serde(other)]
    Unknown,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Interrupted)
    }
}

/// One execution run of a scraping job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: u64,
    #[serde(rename = "scraper_name", default)]
    pub source: String,
    pub status: SessionStatus,
    #[serde(rename = "total_obras", default)]
    pub item_count: u64,
    #[serde(rename = "paginas_processadas", default)]
    pub page_count: u64,
    #[serde(rename = "inicio", default, deserialize_with = "deserialize_timestamp")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "fim", default, deserialize_with = "deserialize_timestamp")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(rename = "erro", default)]
    pub error: Option<String>,
}

/// Aggregate counters from the stats endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    #[serde(rename = "total_obras", default)]
    pub total_items: u64,
    #[serde(rename = "total_sessoes", default)]
    pub total_sessions: u64,
    #[serde(rename = "obras_por_categoria", default)]
    pub items_by_category: HashMap<String, u64>,
    #[serde(rename = "obras_por_scraper", default)]
    pub items_by_source: HashMap<String, u64>,
}

/// Parse an ISO-8601 timestamp with or without an offset. Naive values are UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

// Bad timestamps degrade to `None` rather than failing the whole page.
fn deserialize_timestamp<'de, D>(d: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn naive_and_offset_timestamps_parse() {
        let a = parse_timestamp("2025-03-04T10:20:30.123456").unwrap();
        assert_eq!((a.month(), a.day(), a.hour()), (3, 4, 10));
        let b = parse_timestamp("2025-03-04T10:20:30-03:00").unwrap();
        assert_eq!(b.hour(), 13);
        assert!(parse_timestamp("ontem").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn session_status_accepts_backend_spellings() {
        let s: SessionRecord = serde_json::from_str(
            r#"{"id":7,"scraper_name":"iarremate","status":"concluido","total_obras":12,
                "paginas_processadas":3,"inicio":"2025-01-01T10:00:00","fim":null,"erro":null}"#,
        )
        .unwrap();
        assert_eq!(s.status, SessionStatus::Succeeded);
        assert_eq!(s.item_count, 12);
        assert!(s.finished_at.is_none());

        let odd: SessionStatus = serde_json::from_str(r#""desconhecido""#).unwrap();
        assert_eq!(odd, SessionStatus::Unknown);
        let failed: SessionStatus = serde_json::from_str(r#""erro""#).unwrap();
        assert_eq!(failed, SessionStatus::Failed);
    }

    #[test]
    fn item_price_falls_back_to_updated_price() {
        let it: ItemRecord = serde_json::from_str(
            r#"{"id":1,"valor":"  ","valor_atualizado":"R$ 500,00","scraper_name":"leiloes_br",
                "data_coleta":"garbage","numero_lances":-2}"#,
        )
        .unwrap();
        assert_eq!(it.price_text(), Some("R$ 500,00"));
        assert_eq!(it.bids(), 0);
        assert!(it.collected_at.is_none());
    }
}
