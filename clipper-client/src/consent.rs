use std::collections::HashMap;

use anyhow::{anyhow, Context};
use chrono::Months;
use parking_lot::Mutex;

use crate::{api::Time, ClientConfig};

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentPreferences {
    /// Always true, essential storage cannot be refused
    pub essential: bool,
    pub functional: bool,
    pub analytics: bool,
    pub advertising: bool,
    pub updated_at: Time,
    pub expires_at: Time,
}

/// Consent as persisted in the browser
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ConsentRecord {
    pub version: String,
    pub preferences: ConsentPreferences,
}

/// The optional categories a user can accept
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ConsentChoice {
    pub functional: bool,
    pub analytics: bool,
    pub advertising: bool,
}

impl ConsentChoice {
    pub fn accept_all() -> ConsentChoice {
        ConsentChoice {
            functional: true,
            analytics: true,
            advertising: true,
        }
    }

    pub fn essential_only() -> ConsentChoice {
        ConsentChoice::default()
    }
}

/// Key-value store the consent record is persisted in
pub trait ConsentStorage {
    fn load(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>>;
    fn store(&self, key: &str, value: &serde_json::Value) -> anyhow::Result<()>;
    fn delete(&self, key: &str);
}

#[derive(Debug, Default)]
pub struct MemoryStorage(Mutex<HashMap<String, serde_json::Value>>);

impl MemoryStorage {
    pub fn new() -> MemoryStorage {
        MemoryStorage::default()
    }
}

impl ConsentStorage for MemoryStorage {
    fn load(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        Ok(self.0.lock().get(key).cloned())
    }

    fn store(&self, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
        self.0.lock().insert(String::from(key), value.clone());
        Ok(())
    }

    fn delete(&self, key: &str) {
        self.0.lock().remove(key);
    }
}

/// The browser's `localStorage`
#[cfg(feature = "web")]
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserStorage;

#[cfg(feature = "web")]
impl ConsentStorage for BrowserStorage {
    fn load(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        use gloo_storage::{errors::StorageError, LocalStorage, Storage};
        match LocalStorage::get(key) {
            Ok(v) => Ok(Some(v)),
            Err(StorageError::KeyNotFound(_)) => Ok(None),
            Err(e) => Err(anyhow!("reading {key} from local storage: {e}")),
        }
    }

    fn store(&self, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
        use gloo_storage::{LocalStorage, Storage};
        LocalStorage::set(key, value).map_err(|e| anyhow!("saving {key} to local storage: {e}"))
    }

    fn delete(&self, key: &str) {
        use gloo_storage::{LocalStorage, Storage};
        LocalStorage::delete(key)
    }
}

/// Parses the browser's or the request's Do-Not-Track value
pub fn parse_do_not_track(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("1") | Some("yes"))
}

/// Decides what the stored consent, and the Do-Not-Track signal, allow
#[derive(Debug)]
pub struct ConsentGate<S> {
    storage: S,
    key: String,
    version: String,
    validity_months: u32,
    do_not_track: bool,
}

impl<S: ConsentStorage> ConsentGate<S> {
    pub fn new(storage: S, config: &ClientConfig, do_not_track: bool) -> ConsentGate<S> {
        ConsentGate {
            storage,
            key: config.consent_storage_key.clone(),
            version: config.consent_version.clone(),
            validity_months: config.consent_validity_months,
            do_not_track,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn do_not_track(&self) -> bool {
        self.do_not_track
    }

    pub fn set_do_not_track(&mut self, do_not_track: bool) {
        self.do_not_track = do_not_track;
    }

    fn load(&self) -> anyhow::Result<Option<ConsentRecord>> {
        let value = match self.storage.load(&self.key)? {
            None => return Ok(None),
            Some(v) => v,
        };
        serde_json::from_value(value)
            .map(Some)
            .with_context(|| format!("parsing consent record {}", self.key))
    }

    /// Preferences currently in force, if the user gave valid consent
    ///
    /// A record saved with another version, expired, or unreadable, counts as no consent.
    pub fn current(&self, now: Time) -> Option<ConsentPreferences> {
        let record = match self.load() {
            Ok(record) => record?,
            Err(err) => {
                tracing::warn!(?err, "ignoring unreadable consent record");
                return None;
            }
        };
        if record.version != self.version {
            tracing::debug!(
                stored = %record.version,
                current = %self.version,
                "ignoring consent given for another version"
            );
            return None;
        }
        if now >= record.preferences.expires_at {
            tracing::debug!(expires_at = %record.preferences.expires_at, "ignoring expired consent");
            return None;
        }
        Some(record.preferences)
    }

    pub fn should_show_banner(&self, now: Time) -> bool {
        self.current(now).is_none()
    }

    /// Persists `choice`, valid for the configured number of months from `now`
    pub fn save(&self, choice: ConsentChoice, now: Time) -> anyhow::Result<ConsentRecord> {
        let expires_at = now
            .checked_add_months(Months::new(self.validity_months))
            .ok_or_else(|| anyhow!("consent expiry date is out of range"))?;
        let record = ConsentRecord {
            version: self.version.clone(),
            preferences: ConsentPreferences {
                essential: true,
                functional: choice.functional,
                analytics: choice.analytics,
                advertising: choice.advertising,
                updated_at: now,
                expires_at,
            },
        };
        let value = serde_json::to_value(&record).context("serializing consent record")?;
        self.storage
            .store(&self.key, &value)
            .context("storing consent record")?;
        tracing::debug!(?choice, "saved consent");
        Ok(record)
    }

    /// Forgets the stored consent, so that the banner is shown again
    pub fn revoke(&self) {
        self.storage.delete(&self.key);
    }

    pub fn analytics_enabled(&self, now: Time) -> bool {
        !self.do_not_track && self.current(now).map(|p| p.analytics).unwrap_or(false)
    }

    pub fn can_show_personalized_ads(&self, now: Time) -> bool {
        !self.do_not_track && self.current(now).map(|p| p.advertising).unwrap_or(false)
    }

    pub fn functional_enabled(&self, now: Time) -> bool {
        self.current(now).map(|p| p.functional).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;

    fn now() -> Time {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn gate(do_not_track: bool) -> ConsentGate<MemoryStorage> {
        ConsentGate::new(MemoryStorage::new(), &ClientConfig::default(), do_not_track)
    }

    #[test]
    fn no_record_shows_banner() {
        let gate = gate(false);
        assert!(gate.should_show_banner(now()));
        assert!(!gate.analytics_enabled(now()));
        assert!(!gate.functional_enabled(now()));
    }

    #[test]
    fn saved_consent_is_used_until_expiry() {
        let gate = gate(false);
        let record = gate.save(ConsentChoice::accept_all(), now()).unwrap();
        assert!(record.preferences.essential);
        assert_eq!(
            record.preferences.expires_at,
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
        );
        assert!(!gate.should_show_banner(now()));
        assert!(gate.analytics_enabled(now()));
        assert!(gate.can_show_personalized_ads(now()));
        assert!(!gate.analytics_enabled(record.preferences.expires_at));
        assert!(gate.should_show_banner(record.preferences.expires_at));
    }

    #[test]
    fn record_is_stored_in_camel_case() {
        let gate = gate(false);
        gate.save(ConsentChoice::essential_only(), now()).unwrap();
        let stored = gate.storage().load("clipper_cookie_consent").unwrap().unwrap();
        assert_eq!(stored["version"], json!("1.0"));
        assert_eq!(stored["preferences"]["essential"], json!(true));
        assert_eq!(stored["preferences"]["analytics"], json!(false));
        assert!(stored["preferences"]["expiresAt"].is_string());
        assert!(stored["preferences"]["updatedAt"].is_string());
    }

    #[test]
    fn other_version_counts_as_no_consent() {
        let gate = gate(false);
        gate.storage()
            .store(
                "clipper_cookie_consent",
                &json!({
                    "version": "0.9",
                    "preferences": {
                        "essential": true,
                        "functional": true,
                        "analytics": true,
                        "advertising": true,
                        "updatedAt": "2024-02-01T00:00:00Z",
                        "expiresAt": "2025-02-01T00:00:00Z",
                    },
                }),
            )
            .unwrap();
        assert!(gate.should_show_banner(now()));
        assert!(!gate.analytics_enabled(now()));
    }

    #[test]
    fn unreadable_record_counts_as_no_consent() {
        let gate = gate(false);
        gate.storage()
            .store("clipper_cookie_consent", &json!({"version": "1.0"}))
            .unwrap();
        assert!(gate.should_show_banner(now()));
    }

    #[test]
    fn do_not_track_overrides_consent() {
        let mut gate = gate(true);
        gate.save(ConsentChoice::accept_all(), now()).unwrap();
        assert!(!gate.can_show_personalized_ads(now()));
        assert!(!gate.analytics_enabled(now()));
        assert!(gate.functional_enabled(now()));
        gate.set_do_not_track(false);
        assert!(gate.can_show_personalized_ads(now()));
    }

    #[test]
    fn revoking_shows_banner_again() {
        let gate = gate(false);
        gate.save(ConsentChoice::accept_all(), now()).unwrap();
        gate.revoke();
        assert!(gate.should_show_banner(now()));
    }

    #[test]
    fn do_not_track_values() {
        assert!(parse_do_not_track(Some("1")));
        assert!(parse_do_not_track(Some("yes")));
        assert!(!parse_do_not_track(Some("0")));
        assert!(!parse_do_not_track(Some("unspecified")));
        assert!(!parse_do_not_track(None));
    }
}
