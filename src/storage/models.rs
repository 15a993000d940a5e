use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire format for every timestamp stored in the backend
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One shortened URL as stored under `entry:<id>`.
///
/// `visit_count` and `last_visit` are derived by the backend on every read
/// from the visitor log; the stored blob is never rewritten on a visit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Address of the client that created the entry
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub remote_addr: String,
    /// Argon2 PHC string; `None` means no password is required
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub public: EntryPublicData,
}

/// The part of an entry that is safe to show to anyone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryPublicData {
    #[serde(default, with = "datetime_format")]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "datetime_format",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_visit: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "datetime_format",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiration: Option<DateTime<Utc>>,
    #[serde(default)]
    pub visit_count: u64,
    pub url: String,
}

impl Entry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            public: EntryPublicData {
                url: url.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.public.expiration = Some(expiration);
        self
    }

    pub fn with_remote_addr(mut self, remote_addr: impl Into<String>) -> Self {
        self.remote_addr = remote_addr.into();
        self
    }

    /// 是否需要密码
    pub fn requires_password(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Expired once the current time has passed `expiration`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.public
            .expiration
            .is_some_and(|exp| now.timestamp() > exp.timestamp())
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// One redirect event, appended to `entry:visits:<id>` newest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Visitor {
    pub ip: String,
    #[serde(default)]
    pub referer: String,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default, with = "datetime_format")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub utm_source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub utm_medium: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub utm_campaign: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub utm_content: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub utm_term: String,
}

impl Visitor {
    /// A visitor stamped with the current time
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            timestamp: Some(Utc::now()),
            ..Default::default()
        }
    }
}

/// Backend description, reported at startup
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StorageConfig {
    pub storage_type: String,
    pub derives_visit_count: bool,
}

/// `Option<DateTime<Utc>>` <-> `"YYYY-MM-DD HH:MM:SS"` / `null`.
///
/// Empty strings read as `None`; RFC 3339 input is accepted as well.
pub mod datetime_format {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    use super::DEFAULT_TIME_FORMAT;

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&dt.format(DEFAULT_TIME_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") | Some("null") => Ok(None),
            Some(s) => parse(s).map(Some).map_err(serde::de::Error::custom),
        }
    }

    pub fn parse(s: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, DEFAULT_TIME_FORMAT) {
            return Ok(naive.and_utc());
        }
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| {
                format!(
                    "invalid timestamp '{}', expected '{}' or RFC3339",
                    s, DEFAULT_TIME_FORMAT
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_entry_wire_shape() {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let mut entry = Entry::new("https://example.com").with_remote_addr("10.0.0.1");
        entry.public.created_on = Some(created);

        let json: serde_json::Value = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["remote_addr"], "10.0.0.1");
        assert!(json.get("password").is_none());
        assert_eq!(json["public"]["created_on"], "2024-05-01 12:30:00");
        assert_eq!(json["public"]["url"], "https://example.com");
        assert_eq!(json["public"]["visit_count"], 0);
        assert!(json["public"].get("expiration").is_none());
    }

    #[test]
    fn test_reads_null_and_rfc3339_timestamps() {
        let raw = r#"{"public":{"created_on":null,"expiration":"2030-01-02T03:04:05Z","visit_count":3,"url":"https://a.b"}}"#;
        let entry: Entry = serde_json::from_str(raw).unwrap();
        assert!(entry.public.created_on.is_none());
        assert_eq!(
            entry.public.expiration,
            Some(Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap())
        );
    }

    #[test]
    fn test_expiration_check() {
        let now = Utc::now();
        let entry = Entry::new("https://a.b").with_expiration(now - Duration::seconds(5));
        assert!(entry.is_expired_at(now));

        let entry = Entry::new("https://a.b").with_expiration(now + Duration::hours(1));
        assert!(!entry.is_expired_at(now));

        assert!(!Entry::new("https://a.b").is_expired());
    }

    #[test]
    fn test_visitor_omits_empty_utm_fields() {
        let mut visitor = Visitor::new("1.2.3.4");
        visitor.utm_source = "newsletter".into();
        let json: serde_json::Value = serde_json::to_value(&visitor).unwrap();
        assert_eq!(json["ip"], "1.2.3.4");
        assert_eq!(json["utm_source"], "newsletter");
        assert!(json.get("utm_medium").is_none());
        assert!(json["timestamp"].is_string());
    }
}
