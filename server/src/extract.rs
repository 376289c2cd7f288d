//! Normalization of provider authenticate payloads into profile candidates.
//!
//! The provider returns one of two shapes depending on how the session was
//! established. Both carry `user.user_id`; only the rich shape carries a real
//! handle.

use serde_json::Value;

use prism_core::profile::ProfileCandidate;

/// Low-res avatar size marker and its high-res replacement.
const AVATAR_SIZE_MARKER: &str = "_normal";
const AVATAR_SIZE_UPGRADE: &str = "_400x400";

/// A normalized profile observation, not yet reconciled with the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedProfile {
    pub subject_id: String,
    pub candidate: ProfileCandidate,
}

/// The two provider payload shapes, resolved by ordered match. The rich shape
/// wins when both are present.
enum ProviderPayload<'a> {
    /// `provider_values.twitter` with the full social profile.
    Rich {
        subject: &'a str,
        twitter: &'a Value,
    },
    /// `user.providers[]` entry: native id and a low-res avatar, no handle.
    SessionDerived {
        subject: &'a str,
        user: &'a Value,
        entry: &'a Value,
    },
}

/// Extract a normalized profile from a provider authenticate payload.
///
/// Returns `None` when neither shape yields a usable profile, which is a
/// legitimate outcome (the user has not linked the social account), not an
/// error. Missing optional fields never fail extraction.
pub fn extract_profile(payload: &Value) -> Option<ExtractedProfile> {
    match classify(payload)? {
        ProviderPayload::Rich { subject, twitter } => Some(ExtractedProfile {
            subject_id: subject.to_string(),
            candidate: ProfileCandidate {
                external_id: string_or_number(twitter.get("id")),
                handle: string_field(twitter, "screen_name"),
                display_name: string_field(twitter, "name"),
                avatar_url: string_field(twitter, "profile_image_url").map(upgrade_avatar),
            },
        }),
        ProviderPayload::SessionDerived {
            subject,
            user,
            entry,
        } => {
            let first_name = user
                .get("name")
                .and_then(|name| name.get("first_name"))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty());
            let last_name = user
                .get("name")
                .and_then(|name| name.get("last_name"))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty());
            let display_name = match (first_name, last_name) {
                (Some(first), Some(last)) => Some(format!("{first} {last}")),
                (Some(first), None) => Some(first.to_string()),
                (None, Some(last)) => Some(last.to_string()),
                (None, None) => None,
            };

            Some(ExtractedProfile {
                subject_id: subject.to_string(),
                candidate: ProfileCandidate {
                    external_id: string_or_number(entry.get("provider_subject")),
                    // The session shape carries no handle; the user's first
                    // name stands in (known limitation of that shape).
                    handle: first_name.map(str::to_string),
                    display_name,
                    avatar_url: string_field(entry, "profile_picture_url").map(upgrade_avatar),
                },
            })
        }
    }
}

/// Pull the provider's durable user id out of a payload, independent of
/// whether a full profile can be extracted.
pub fn subject_of(payload: &Value) -> Option<&str> {
    payload
        .get("user")
        .and_then(|user| user.get("user_id"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn classify(payload: &Value) -> Option<ProviderPayload<'_>> {
    let subject = subject_of(payload)?;

    if let Some(twitter) = payload
        .get("provider_values")
        .and_then(|values| values.get("twitter"))
        .filter(|value| value.is_object())
    {
        return Some(ProviderPayload::Rich { subject, twitter });
    }

    let user = payload.get("user")?;
    let entry = user
        .get("providers")
        .and_then(Value::as_array)?
        .iter()
        .find(|entry| {
            entry
                .get("provider_type")
                .and_then(Value::as_str)
                .is_some_and(|provider| provider.eq_ignore_ascii_case("twitter"))
        })?;

    Some(ProviderPayload::SessionDerived {
        subject,
        user,
        entry,
    })
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Provider ids arrive as strings or bare numbers depending on API version.
fn string_or_number(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Rewrite the low-res thumbnail marker to the high-res variant. Pure string
/// substitution; nothing is re-fetched.
fn upgrade_avatar(url: String) -> String {
    url.replace(AVATAR_SIZE_MARKER, AVATAR_SIZE_UPGRADE)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn rich_payload() -> Value {
        json!({
            "user": { "user_id": "user-test-0001" },
            "provider_values": {
                "twitter": {
                    "id": "12345",
                    "screen_name": "gradientfan",
                    "name": "Gradient Fan",
                    "profile_image_url": "https://pbs.twimg.com/profile_images/1/x_normal.jpg"
                }
            }
        })
    }

    fn session_payload() -> Value {
        json!({
            "user": {
                "user_id": "user-test-0002",
                "name": { "first_name": "Ada", "last_name": "Lovelace" },
                "providers": [
                    { "provider_type": "Google", "provider_subject": "g-1" },
                    {
                        "provider_type": "Twitter",
                        "provider_subject": "98765",
                        "profile_picture_url": "https://pbs.twimg.com/profile_images/2/y_normal.png"
                    }
                ]
            }
        })
    }

    #[test]
    fn rich_shape_extracts_full_profile() {
        let extracted = extract_profile(&rich_payload()).unwrap();
        assert_eq!(extracted.subject_id, "user-test-0001");
        assert_eq!(extracted.candidate.external_id.as_deref(), Some("12345"));
        assert_eq!(extracted.candidate.handle.as_deref(), Some("gradientfan"));
        assert_eq!(
            extracted.candidate.display_name.as_deref(),
            Some("Gradient Fan")
        );
        assert_eq!(
            extracted.candidate.avatar_url.as_deref(),
            Some("https://pbs.twimg.com/profile_images/1/x_400x400.jpg")
        );
    }

    #[test]
    fn session_shape_substitutes_first_name_for_handle() {
        let extracted = extract_profile(&session_payload()).unwrap();
        assert_eq!(extracted.subject_id, "user-test-0002");
        assert_eq!(extracted.candidate.external_id.as_deref(), Some("98765"));
        assert_eq!(extracted.candidate.handle.as_deref(), Some("Ada"));
        assert_eq!(
            extracted.candidate.display_name.as_deref(),
            Some("Ada Lovelace")
        );
        assert_eq!(
            extracted.candidate.avatar_url.as_deref(),
            Some("https://pbs.twimg.com/profile_images/2/y_400x400.png")
        );
    }

    #[test]
    fn rich_shape_wins_when_both_are_present() {
        let mut payload = rich_payload();
        payload["user"]["providers"] = session_payload()["user"]["providers"].clone();

        let extracted = extract_profile(&payload).unwrap();
        assert_eq!(extracted.candidate.handle.as_deref(), Some("gradientfan"));
    }

    #[test]
    fn numeric_provider_id_is_stringified() {
        let mut payload = rich_payload();
        payload["provider_values"]["twitter"]["id"] = json!(12345);

        let extracted = extract_profile(&payload).unwrap();
        assert_eq!(extracted.candidate.external_id.as_deref(), Some("12345"));
    }

    #[test]
    fn payload_without_twitter_data_yields_none() {
        let payload = json!({
            "user": {
                "user_id": "user-test-0003",
                "providers": [{ "provider_type": "Google", "provider_subject": "g-1" }]
            }
        });
        assert!(extract_profile(&payload).is_none());
        assert_eq!(subject_of(&payload), Some("user-test-0003"));
    }

    #[test]
    fn missing_optional_fields_do_not_fail_extraction() {
        let payload = json!({
            "user": { "user_id": "user-test-0004" },
            "provider_values": { "twitter": {} }
        });
        let extracted = extract_profile(&payload).unwrap();
        assert!(extracted.candidate.handle.is_none());
        assert!(extracted.candidate.avatar_url.is_none());
    }

    #[test]
    fn missing_user_id_yields_none() {
        let payload = json!({ "provider_values": { "twitter": { "id": "1" } } });
        assert!(extract_profile(&payload).is_none());
        assert!(subject_of(&payload).is_none());
    }
}
