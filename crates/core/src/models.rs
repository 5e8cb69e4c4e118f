use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Identity and presence fields shared by online and recently-seen users.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub social_status: String,
    pub username: String,
    pub discriminator: String,
    /// `username#discriminator`, derived locally after every fetch.
    #[serde(rename = "discordTag")]
    pub tag: String,
    pub user_id: String,
    pub avatar: Option<String>,
    /// Playback position in seconds.
    #[serde(deserialize_with = "lenient_f64")]
    pub progress: f64,
}

impl Profile {
    pub fn derive_tag(&mut self) { self.tag = format!("{}#{}", self.username, self.discriminator); }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListeningInfo {
    /// Track length in seconds.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub duration: f64,
    pub artist: String,
    pub title: String,
    pub icon: String,
    #[serde(default)]
    pub uri: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(default, deserialize_with = "listening_payload")]
    pub listening_to: Option<ListeningInfo>,
}

impl User {
    /// The track the user is playing right now, if the payload was well-formed.
    pub fn listening(&self) -> Option<&ListeningInfo> { self.listening_to.as_ref() }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialUser {
    #[serde(flatten)]
    pub profile: Profile,
    /// UNIX timestamp (seconds) the user was last seen.
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub last_seen: u64,
    #[serde(default, deserialize_with = "listening_payload")]
    pub last_listening_to: Option<ListeningInfo>,
}

/// Body of `/social/available` and `/social/recent`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SocialResponse {
    #[serde(deserialize_with = "lenient_list")]
    pub online_users: Vec<User>,
    #[serde(deserialize_with = "lenient_list")]
    pub recent_users: Vec<PartialUser>,
    #[serde(deserialize_with = "lenient_seconds")]
    pub timestamp: u64,
    #[serde(deserialize_with = "lenient")]
    pub code: u16,
    pub message: String,
}

/// Accepts any JSON value; only objects that fit [`ListeningInfo`] count as a payload.
fn listening_payload<'de, D>(deserializer: D) -> Result<Option<ListeningInfo>, D::Error>
where D: Deserializer<'de> {
    let value = Value::deserialize(deserializer)?;
    if !value.is_object() {
        return Ok(None);
    }
    Ok(serde_json::from_value(value).ok())
}

/// Decodes each element on its own, dropping records that don't fit `T`.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Skipping malformed user record: {e}");
                None
            }
        })
        .collect())
}

/// Any value of the wrong type (including `null`) becomes the default.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(serde_json::from_value(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where D: Deserializer<'de> {
    Ok(Value::deserialize(deserializer)?.as_f64().unwrap_or_default())
}

/// Whole seconds (or milliseconds) from any JSON number; fractions are dropped.
fn lenient_seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where D: Deserializer<'de> {
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_u64().unwrap_or_else(|| value.as_f64().map_or(0, |v| v.max(0.0) as u64)))
}
