use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Collection block nested inside every asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetCollection {
    pub name: Option<String>,
    pub icon_url: Option<String>,
}

/// Asset from `/v1/assets`, as delivered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAssetRecord {
    pub token_address: Option<String>,
    #[serde(deserialize_with = "de_opt_string_any", default)]
    pub token_id: Option<String>,
    pub id: Option<String>,
    /// The API calls the holder `user`.
    #[serde(rename = "user", alias = "owner")]
    pub owner: Option<String>,
    pub status: Option<String>,
    pub uri: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// Game attributes ("Tier", "Stage", "Finish", "Captured By", ...).
    /// Anything that is not a JSON object decodes as absent.
    #[serde(deserialize_with = "de_opt_lenient", default)]
    pub metadata: Option<Map<String, Value>>,
    #[serde(deserialize_with = "de_opt_lenient", default)]
    pub collection: Option<AssetCollection>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// One page of the asset listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetPage {
    pub result: Vec<RawAssetRecord>,
    #[serde(default)]
    pub cursor: Option<String>,
}

impl AssetPage {
    /// Continuation cursor, if the API says more pages remain.
    pub fn next_cursor(&self) -> Option<&str> {
        self.cursor.as_deref().filter(|c| !c.is_empty())
    }
}

/// Deserialize a field that can be either a string or a number into Option<String>.
fn de_opt_string_any<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;

    struct StringOrNumber;

    impl de::Visitor<'_> for StringOrNumber {
        type Value = Option<String>;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "a string or number")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
    }

    deserializer.deserialize_any(StringOrNumber)
}

/// Deserialize `T` if the value has the right shape, otherwise `None`.
/// A single odd record must not reject the whole page.
fn de_opt_lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(serde_json::from_value(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_PAGE: &str = r#"{
        "result": [{
            "token_address": "0x9e0d99b864e1ac12565125c5a82b59adea5a09cd",
            "token_id": "4021",
            "id": "0x01ab",
            "user": "0xwallet",
            "status": "imx",
            "uri": null,
            "name": "Rhamphyre",
            "description": null,
            "image_url": "https://example.test/4021.png",
            "metadata": {"Tier": 1, "Stage": 2, "Finish": "Holo", "Captured By": "0xhunter"},
            "collection": {"name": "Illuvium Illuvials", "icon_url": "https://example.test/icon.png"},
            "created_at": "2022-06-01T10:00:00.000Z",
            "updated_at": "2022-06-02T10:00:00.000Z"
        }],
        "cursor": "eyJpZCI6IjB4MDFhYiJ9",
        "remaining": 1
    }"#;

    #[test]
    fn test_parse_asset_page() {
        let page: AssetPage = serde_json::from_str(SAMPLE_PAGE).unwrap();
        assert_eq!(page.result.len(), 1);
        let asset = &page.result[0];
        assert_eq!(asset.owner.as_deref(), Some("0xwallet"));
        assert_eq!(asset.token_id.as_deref(), Some("4021"));
        assert!(asset.uri.is_none());
        assert_eq!(
            asset.collection.as_ref().and_then(|c| c.name.as_deref()),
            Some("Illuvium Illuvials")
        );
        assert_eq!(page.next_cursor(), Some("eyJpZCI6IjB4MDFhYiJ9"));
    }

    #[test]
    fn test_numeric_token_id_and_owner_alias() {
        let json = r#"{"token_id": 77, "owner": "0xabc"}"#;
        let asset: RawAssetRecord = serde_json::from_str(json).unwrap();
        assert_eq!(asset.token_id.as_deref(), Some("77"));
        assert_eq!(asset.owner.as_deref(), Some("0xabc"));
        assert!(asset.metadata.is_none());
    }

    #[test]
    fn test_empty_or_missing_cursor_ends_pagination() {
        let page: AssetPage = serde_json::from_str(r#"{"result": [], "cursor": ""}"#).unwrap();
        assert_eq!(page.next_cursor(), None);
        let page: AssetPage = serde_json::from_str(r#"{"result": []}"#).unwrap();
        assert_eq!(page.next_cursor(), None);
        let page: AssetPage = serde_json::from_str(r#"{"result": [], "cursor": null}"#).unwrap();
        assert_eq!(page.next_cursor(), None);
    }

    #[test]
    fn test_page_without_result_is_rejected() {
        assert!(serde_json::from_str::<AssetPage>(r#"{"cursor": "abc"}"#).is_err());
    }

    #[test]
    fn test_malformed_metadata_and_collection_decode_as_absent() {
        let json = r#"{
            "result": [
                {"token_id": "1", "metadata": {"Finish": "Holo"}, "collection": {"name": "Illuvials"}},
                {"token_id": "2", "metadata": "not-an-object", "collection": "nope"},
                {"token_id": "3", "metadata": [], "collection": []},
                {"token_id": "4", "metadata": 7, "collection": {"name": 5}}
            ],
            "cursor": null
        }"#;
        let page: AssetPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.result.len(), 4);
        assert!(page.result[0].metadata.is_some());
        assert!(page.result[0].collection.is_some());
        for asset in &page.result[1..] {
            assert!(asset.metadata.is_none(), "{:?}", asset.token_id);
            assert!(asset.collection.is_none(), "{:?}", asset.token_id);
        }
    }
}
