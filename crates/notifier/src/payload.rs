//! Notification payload builder.
//!
//! Turns a generic title/body/data message into the structure the push
//! provider expects: a generic notification block, an Android section and an
//! APNs section. The platform sections are fixed; only the badge depends on
//! the [`NotificationKind`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Title used when the caller supplies none.
pub const DEFAULT_TITLE: &str = "New Service Request";
/// Body used when the caller supplies none.
pub const DEFAULT_BODY: &str = "A new request is available in your area";

/// Android notification channel the mobile client registers at startup.
pub const ANDROID_CHANNEL_ID: &str = "service_requests";
/// Reserved data key the mobile client routes taps on.
pub const CLICK_ACTION_KEY: &str = "click_action";
pub const CLICK_ACTION: &str = "FLUTTER_NOTIFICATION_CLICK";

const DEFAULT_SOUND: &str = "default";
/// APNs priority 10 = deliver immediately
const APNS_PRIORITY: &str = "10";
const APNS_PUSH_TYPE: &str = "alert";

/// Whether a payload targets one recipient or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Personalised to a single device; bumps the app badge.
    Individual,
    /// Shared by many devices; leaves the badge alone.
    Broadcast,
}

/// Generic, platform-neutral notification block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AndroidPriority {
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Visibility {
    Private,
    Public,
    Secret,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AndroidNotification {
    pub channel_id: String,
    pub sound: String,
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AndroidConfig {
    pub priority: AndroidPriority,
    pub notification: AndroidNotification,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aps {
    pub sound: String,
    /// 1 wakes the app in the background to handle the push
    #[serde(rename = "content-available")]
    pub content_available: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApnsPayload {
    pub aps: Aps,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApnsConfig {
    pub headers: BTreeMap<String, String>,
    pub payload: ApnsPayload,
}

/// A complete provider payload, minus the recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushPayload {
    pub notification: Notification,
    pub data: BTreeMap<String, String>,
    pub android: AndroidConfig,
    pub apns: ApnsConfig,
}

/// A payload addressed to one device token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    pub token: String,
    #[serde(flatten)]
    pub payload: PushPayload,
}

impl PushMessage {
    pub fn new(token: impl Into<String>, payload: PushPayload) -> Self {
        Self {
            token: token.into(),
            payload,
        }
    }
}

/// Stateless payload builder.
pub struct PayloadBuilder;

impl PayloadBuilder {
    /// Build a payload for `kind`.
    ///
    /// Blank or missing `title`/`body` fall back to [`DEFAULT_TITLE`] and
    /// [`DEFAULT_BODY`]. Every caller data key is kept except the reserved
    /// [`CLICK_ACTION_KEY`], which always carries [`CLICK_ACTION`].
    pub fn build(
        kind: NotificationKind,
        title: Option<&str>,
        body: Option<&str>,
        data: BTreeMap<String, String>,
    ) -> PushPayload {
        let mut data = data;
        data.insert(CLICK_ACTION_KEY.to_string(), CLICK_ACTION.to_string());

        let badge = match kind {
            NotificationKind::Individual => Some(1),
            NotificationKind::Broadcast => None,
        };

        PushPayload {
            notification: Notification {
                title: non_blank(title).unwrap_or(DEFAULT_TITLE).to_string(),
                body: non_blank(body).unwrap_or(DEFAULT_BODY).to_string(),
            },
            data,
            android: AndroidConfig {
                priority: AndroidPriority::High,
                notification: AndroidNotification {
                    channel_id: ANDROID_CHANNEL_ID.to_string(),
                    sound: DEFAULT_SOUND.to_string(),
                    visibility: Visibility::Public,
                },
            },
            apns: ApnsConfig {
                headers: BTreeMap::from([
                    ("apns-priority".to_string(), APNS_PRIORITY.to_string()),
                    ("apns-push-type".to_string(), APNS_PUSH_TYPE.to_string()),
                ]),
                payload: ApnsPayload {
                    aps: Aps {
                        sound: DEFAULT_SOUND.to_string(),
                        content_available: 1,
                        badge,
                    },
                },
            },
        }
    }

    /// Convert arbitrary JSON data into the string map the provider accepts.
    ///
    /// Strings pass through unchanged, nulls are dropped and every other value
    /// is encoded as its JSON text.
    pub fn string_data(
        data: &serde_json::Map<String, serde_json::Value>,
    ) -> BTreeMap<String, String> {
        data.iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    serde_json::Value::Null => return None,
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((key.clone(), text))
            })
            .collect()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_for_missing_title_and_body() {
        let payload = PayloadBuilder::build(
            NotificationKind::Broadcast,
            None,
            Some(""),
            BTreeMap::new(),
        );
        assert_eq!(payload.notification.title, DEFAULT_TITLE);
        assert_eq!(payload.notification.body, DEFAULT_BODY);
    }

    #[test]
    fn test_click_action_merged_without_dropping_caller_keys() {
        let data = BTreeMap::from([
            ("request_id".to_string(), "r-1".to_string()),
            (CLICK_ACTION_KEY.to_string(), "SOMETHING_ELSE".to_string()),
        ]);
        let payload = PayloadBuilder::build(
            NotificationKind::Individual,
            Some("t"),
            Some("b"),
            data,
        );
        assert_eq!(payload.data.get("request_id").map(String::as_str), Some("r-1"));
        assert_eq!(
            payload.data.get(CLICK_ACTION_KEY).map(String::as_str),
            Some(CLICK_ACTION)
        );
        assert_eq!(payload.data.len(), 2);
    }

    #[test]
    fn test_platform_sections_serialize_to_provider_shape() {
        let payload = PayloadBuilder::build(
            NotificationKind::Individual,
            Some("Hi"),
            Some("There"),
            BTreeMap::new(),
        );
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["android"]["priority"], "high");
        assert_eq!(value["android"]["notification"]["channel_id"], "service_requests");
        assert_eq!(value["android"]["notification"]["sound"], "default");
        assert_eq!(value["android"]["notification"]["visibility"], "PUBLIC");

        assert_eq!(value["apns"]["headers"]["apns-priority"], "10");
        assert_eq!(value["apns"]["headers"]["apns-push-type"], "alert");
        assert_eq!(value["apns"]["payload"]["aps"]["sound"], "default");
        assert_eq!(value["apns"]["payload"]["aps"]["content-available"], 1);
        assert_eq!(value["apns"]["payload"]["aps"]["badge"], 1);
    }

    #[test]
    fn test_broadcast_has_no_badge() {
        let payload = PayloadBuilder::build(
            NotificationKind::Broadcast,
            None,
            None,
            BTreeMap::new(),
        );
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value["apns"]["payload"]["aps"].get("badge").is_none());
    }

    #[test]
    fn test_string_data_encodes_non_strings() {
        let data = json!({
            "name": "leak",
            "count": 3,
            "urgent": true,
            "nested": {"a": 1},
            "gone": null
        });
        let map = PayloadBuilder::string_data(data.as_object().unwrap());
        assert_eq!(map["name"], "leak");
        assert_eq!(map["count"], "3");
        assert_eq!(map["urgent"], "true");
        assert_eq!(map["nested"], r#"{"a":1}"#);
        assert!(!map.contains_key("gone"));
    }

    #[test]
    fn test_message_flattens_payload() {
        let payload = PayloadBuilder::build(
            NotificationKind::Broadcast,
            None,
            None,
            BTreeMap::new(),
        );
        let value = serde_json::to_value(PushMessage::new("tok", payload)).unwrap();
        assert_eq!(value["token"], "tok");
        assert_eq!(value["notification"]["title"], DEFAULT_TITLE);
    }
}
