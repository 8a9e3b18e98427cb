//! Git-blob-style content hashing.

use sha1::{Digest, Sha1};

/// Compute the content hash of `content`.
///
/// SHA-1 over `"blob " + byte_len + "\0" + content`, lowercase hex. This is
/// the same object id git (and therefore the GitHub API) assigns to a blob, so
/// both backends agree on the hash of identical content.
pub fn blob_hash(content: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("blob {}\0", content.len()).as_bytes());
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_git_object_ids() {
        assert_eq!(blob_hash(b""), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
        assert_eq!(blob_hash(b"hello"), "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0");
        assert_eq!(blob_hash(b"hello\n"), "ce013625030ba8dba906f756967f9e9ca394464a");
    }

    #[test]
    fn length_is_counted_in_bytes() {
        // "é" is two bytes in UTF-8; a char-count header would hash differently.
        let multi = "é";
        assert_eq!(multi.len(), 2);
        assert_ne!(blob_hash(multi.as_bytes()), blob_hash(b"e"));
        assert_eq!(blob_hash(multi.as_bytes()), blob_hash("é".as_bytes()));
    }
}
