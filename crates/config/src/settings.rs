use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub google: GoogleSettings,
    pub identity: IdentitySettings,
    pub drive: DriveSettings,
    pub sdk: SdkSettings,
    pub storage: StorageSettings,
    pub deep_link: DeepLinkSettings,
    pub picker: PickerSettings,
}

/// OAuth client registration shared by every SDK.
#[derive(Debug, Deserialize, Clone)]
pub struct GoogleSettings {
    pub client_id: String,
    pub api_key: String,
    pub scope: String,
    pub fetch_profile: bool,
    pub userinfo_url: String,
}

impl GoogleSettings {
    /// Both secrets must be present before any authorization is attempted.
    pub fn has_credentials(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.api_key.trim().is_empty()
    }
}

/// Native identity client used outside the browser. The access token is
/// issued out of band (e.g. `gcloud auth print-access-token`).
#[derive(Debug, Deserialize, Clone)]
pub struct IdentitySettings {
    pub access_token: Option<String>,
    pub expires_in_secs: u64,
    pub revoke_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DriveSettings {
    pub api_base_url: String,
    pub discovery_doc: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SdkSettings {
    pub api_script_url: String,
    pub identity_script_url: String,
    pub client_modules: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    pub dir: Option<String>,
    pub token_key: String,
    pub expiry_buffer_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeepLinkSettings {
    pub provider_origin: String,
    pub message_type: String,
    pub token_poll_interval_ms: u64,
    pub token_poll_attempts: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PickerSettings {
    pub mime_types: Vec<String>,
}

pub const CAD_MIME_TYPES: [&str; 6] = [
    "application/acad",
    "application/dxf",
    "image/vnd.dwg",
    "image/vnd.dxf",
    "application/autocad_dwg",
    "application/autocad_dxf",
];

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("DRIVE_OPEN"),
            )
            .set_default("google.client_id", "")?
            .set_default("google.api_key", "")?
            .set_default("google.scope", "https://www.googleapis.com/auth/drive.file")?
            .set_default("google.fetch_profile", false)?
            .set_default(
                "google.userinfo_url",
                "https://www.googleapis.com/oauth2/v2/userinfo",
            )?
            .set_default("identity.access_token", None::<String>)?
            .set_default("identity.expires_in_secs", 3599)?
            .set_default("identity.revoke_url", "https://oauth2.googleapis.com/revoke")?
            .set_default("drive.api_base_url", "https://www.googleapis.com/drive/v3")?
            .set_default(
                "drive.discovery_doc",
                "https://www.googleapis.com/discovery/v1/apis/drive/v3/rest",
            )?
            .set_default("sdk.api_script_url", "https://apis.google.com/js/api.js")?
            .set_default(
                "sdk.identity_script_url",
                "https://accounts.google.com/gsi/client",
            )?
            .set_default("sdk.client_modules", "client:picker")?
            .set_default("storage.dir", None::<String>)?
            .set_default("storage.token_key", "gdrive_token")?
            .set_default("storage.expiry_buffer_secs", 300)?
            .set_default("deep_link.provider_origin", "https://drive.google.com")?
            .set_default("deep_link.message_type", "drive-app-action")?
            .set_default("deep_link.token_poll_interval_ms", 200)?
            .set_default("deep_link.token_poll_attempts", 10)?
            .set_default(
                "picker.mime_types",
                CAD_MIME_TYPES
                    .iter()
                    .map(|m| m.to_string())
                    .collect::<Vec<_>>(),
            )?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::load().expect("Failed to load default settings")
    }
}
