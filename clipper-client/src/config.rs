use crate::api::DELETED_PLACEHOLDER;

fn default_page_size() -> u32 {
    50
}

fn default_deleted_placeholder() -> String {
    String::from(DELETED_PLACEHOLDER)
}

fn default_consent_version() -> String {
    String::from("1.0")
}

fn default_consent_storage_key() -> String {
    String::from("clipper_cookie_consent")
}

fn default_consent_validity_months() -> u32 {
    12
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClientConfig {
    /// Number of items requested per page, when the caller does not say otherwise
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_deleted_placeholder")]
    pub deleted_placeholder: String,

    /// Stored consent with any other version is ignored
    #[serde(default = "default_consent_version")]
    pub consent_version: String,
    #[serde(default = "default_consent_storage_key")]
    pub consent_storage_key: String,
    #[serde(default = "default_consent_validity_months")]
    pub consent_validity_months: u32,
}

impl Default for ClientConfig {
    fn default() -> ClientConfig {
        ClientConfig {
            page_size: default_page_size(),
            deleted_placeholder: default_deleted_placeholder(),
            consent_version: default_consent_version(),
            consent_storage_key: default_consent_storage_key(),
            consent_validity_months: default_consent_validity_months(),
        }
    }
}
