//! Wire types for the contents and git blob APIs, plus the base64 codec.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use filestore_core::{Identity, StorageError};
use serde::{Deserialize, Serialize};

/// One item of a contents response (file, directory, symlink or submodule).
#[derive(Debug, Clone, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub path: String,
    pub sha: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

impl ContentItem {
    pub fn is_dir(&self) -> bool {
        self.kind == "dir"
    }
}

/// `GET /contents/{path}` returns an array for directories, an object otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ContentsResponse {
    Listing(Vec<ContentItem>),
    Single(ContentItem),
}

/// Body of `PUT /contents/{path}`.
#[derive(Debug, Serialize)]
pub struct WriteRequest<'a> {
    pub message: &'a str,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<&'a Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committer: Option<&'a Identity>,
}

#[derive(Debug, Deserialize)]
pub struct WriteResponse {
    pub content: ContentItem,
}

/// Body of `DELETE /contents/{path}`.
#[derive(Debug, Serialize)]
pub struct DeleteRequest<'a> {
    pub message: &'a str,
    pub sha: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<&'a str>,
}

/// `GET /git/blobs/{sha}`, used for files too large for the contents API.
#[derive(Debug, Deserialize)]
pub struct BlobResponse {
    pub content: String,
    #[serde(default)]
    pub encoding: String,
}

pub fn encode_content(content: &str) -> String {
    STANDARD.encode(content.as_bytes())
}

/// Decode base64 content as returned by GitHub (wrapped at 60 columns).
pub fn decode_content(path: &str, encoded: &str) -> Result<String, StorageError> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(compact.as_bytes()).map_err(|e| {
        StorageError::Serialization(format!("Invalid base64 content for \"{}\": {}", path, e))
    })?;
    String::from_utf8(bytes)
        .map_err(|_| StorageError::Serialization(format!("File \"{}\" is not valid UTF-8", path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use filestore_core::ErrorCode;

    #[test]
    fn decodes_wrapped_base64() {
        // "hello world\n" wrapped the way the API does
        let decoded = decode_content("a.txt", "aGVsbG8g\nd29ybGQK\n").unwrap();
        assert_eq!(decoded, "hello world\n");
        assert_eq!(encode_content("hello world\n"), "aGVsbG8gd29ybGQK");
    }

    #[test]
    fn utf8_survives_transport() {
        let text = "héllo · wörld";
        assert_eq!(decode_content("u.txt", &encode_content(text)).unwrap(), text);
    }

    #[test]
    fn rejects_binary() {
        let encoded = STANDARD.encode([0xff, 0xfe, 0x00]);
        let err = decode_content("bin", &encoded).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Serialization);
    }

    #[test]
    fn listing_and_single_shapes() {
        let listing: ContentsResponse = serde_json::from_str(
            r#"[{"type":"dir","name":"src","path":"src","sha":"abc","size":0}]"#,
        )
        .unwrap();
        assert!(matches!(listing, ContentsResponse::Listing(ref items) if items[0].is_dir()));

        let single: ContentsResponse = serde_json::from_str(
            r#"{"type":"file","name":"a.md","path":"a.md","sha":"def","size":3,"content":"YWJj","encoding":"base64"}"#,
        )
        .unwrap();
        assert!(matches!(single, ContentsResponse::Single(ref item) if item.size == 3));
    }
}
