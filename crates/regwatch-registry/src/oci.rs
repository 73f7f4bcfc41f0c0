//! OCI Distribution Specification types.
//!
//! Only the parts of manifests, indexes, and image configs needed to find an
//! image's config blob and creation time are modeled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Manifest media types the client accepts.
pub struct MediaType;

impl MediaType {
    /// OCI image manifest media type.
    pub const OCI_MANIFEST: &'static str = "application/vnd.oci.image.manifest.v1+json";

    /// OCI image index media type.
    pub const OCI_INDEX: &'static str = "application/vnd.oci.image.index.v1+json";

    /// Docker schema 2 manifest media type.
    pub const DOCKER_MANIFEST: &'static str =
        "application/vnd.docker.distribution.manifest.v2+json";

    /// Docker schema 2 manifest list media type.
    pub const DOCKER_MANIFEST_LIST: &'static str =
        "application/vnd.docker.distribution.manifest.list.v2+json";

    /// Every accepted manifest type, for the `Accept` header.
    pub const ACCEPTED: [&'static str; 4] = [
        Self::OCI_INDEX,
        Self::DOCKER_MANIFEST_LIST,
        Self::OCI_MANIFEST,
        Self::DOCKER_MANIFEST,
    ];

    /// Returns the `Accept` header value for manifest requests.
    #[must_use]
    pub fn accept_header() -> String {
        Self::ACCEPTED.join(", ")
    }
}

/// Computes the `sha256:<hex>` digest of raw content.
///
/// # Examples
///
/// ```
/// use regwatch_registry::oci::sha256_digest;
///
/// let digest = sha256_digest(b"{}");
/// assert_eq!(
///     digest,
///     "sha256:44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
/// );
/// ```
#[must_use]
pub fn sha256_digest(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// OCI content descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// Media type of the referenced content.
    #[serde(default)]
    pub media_type: String,

    /// Digest of the targeted content.
    pub digest: String,

    /// Size in bytes of the content.
    #[serde(default)]
    pub size: u64,

    /// Platform of an index entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

impl Descriptor {
    /// Creates a descriptor without a platform.
    #[must_use]
    pub fn new(media_type: impl Into<String>, digest: impl Into<String>, size: u64) -> Self {
        Self {
            media_type: media_type.into(),
            digest: digest.into(),
            size,
            platform: None,
        }
    }

    /// Sets the platform.
    #[must_use]
    pub fn with_platform(mut self, os: impl Into<String>, architecture: impl Into<String>) -> Self {
        self.platform = Some(Platform {
            os: os.into(),
            architecture: architecture.into(),
        });
        self
    }
}

/// Platform an index entry was built for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    /// Operating system, e.g. `linux`.
    pub os: String,
    /// CPU architecture, e.g. `amd64`.
    pub architecture: String,
}

/// An image manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Schema version (always 2).
    pub schema_version: u32,

    /// Media type of this manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    /// Image config descriptor.
    pub config: Descriptor,

    /// Layers that make up the image.
    #[serde(default)]
    pub layers: Vec<Descriptor>,
}

/// An image index (multi-platform manifest list).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    /// Schema version (always 2).
    pub schema_version: u32,

    /// Media type of this index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    /// Per-platform manifests.
    pub manifests: Vec<Descriptor>,
}

impl Index {
    /// Picks the manifest to inspect: `linux/amd64` if present, else the first.
    #[must_use]
    pub fn preferred(&self) -> Option<&Descriptor> {
        self.manifests
            .iter()
            .find(|d| {
                d.platform
                    .as_ref()
                    .is_some_and(|p| p.os == "linux" && p.architecture == "amd64")
            })
            .or_else(|| self.manifests.first())
    }
}

/// Either kind of document a manifest endpoint can return.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ManifestDocument {
    /// A multi-platform index.
    Index(Index),
    /// A single-platform manifest.
    Image(Manifest),
}

impl ManifestDocument {
    /// Decodes a manifest or index.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are neither.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// The fields of an image config blob regwatch reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageConfig {
    /// When the image was built.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

/// Response from the `/v2/<name>/tags/list` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagList {
    /// Repository name.
    #[serde(default)]
    pub name: String,

    /// List of tags; some registries send `null` for an empty repository.
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Error response from registry API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// List of errors.
    #[serde(default)]
    pub errors: Vec<RegistryApiError>,
}

/// Individual error from registry API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryApiError {
    /// Error code, e.g. `MANIFEST_UNKNOWN`.
    pub code: String,

    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docker_manifest_decodes_as_image() {
        let json = r#"{
            "schemaVersion": 2,
            "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
            "config": {
                "mediaType": "application/vnd.docker.container.image.v1+json",
                "size": 1469,
                "digest": "sha256:aaaa"
            },
            "layers": []
        }"#;

        match ManifestDocument::from_slice(json.as_bytes()).unwrap() {
            ManifestDocument::Image(manifest) => assert_eq!(manifest.config.digest, "sha256:aaaa"),
            ManifestDocument::Index(_) => panic!("expected an image manifest"),
        }
    }

    #[test]
    fn test_index_prefers_linux_amd64() {
        let json = r#"{
            "schemaVersion": 2,
            "manifests": [
                {"digest": "sha256:arm", "size": 1, "platform": {"os": "linux", "architecture": "arm64"}},
                {"digest": "sha256:amd", "size": 1, "platform": {"os": "linux", "architecture": "amd64"}}
            ]
        }"#;

        match ManifestDocument::from_slice(json.as_bytes()).unwrap() {
            ManifestDocument::Index(index) => {
                assert_eq!(index.preferred().unwrap().digest, "sha256:amd");
            }
            ManifestDocument::Image(_) => panic!("expected an index"),
        }
    }

    #[test]
    fn test_index_falls_back_to_first_entry() {
        let index = Index {
            schema_version: 2,
            media_type: None,
            manifests: vec![
                Descriptor::new(MediaType::OCI_MANIFEST, "sha256:win", 1)
                    .with_platform("windows", "amd64"),
                Descriptor::new(MediaType::OCI_MANIFEST, "sha256:arm", 1)
                    .with_platform("linux", "arm64"),
            ],
        };
        assert_eq!(index.preferred().unwrap().digest, "sha256:win");
    }

    #[test]
    fn test_image_config_created() {
        let config: ImageConfig =
            serde_json::from_str(r#"{"created": "2024-01-02T03:04:05Z", "os": "linux"}"#).unwrap();
        assert_eq!(
            config.created.unwrap().to_rfc3339(),
            "2024-01-02T03:04:05+00:00"
        );

        let config: ImageConfig = serde_json::from_str("{}").unwrap();
        assert!(config.created.is_none());
    }

    #[test]
    fn test_tag_list_null_tags() {
        let tags: TagList = serde_json::from_str(r#"{"name": "app", "tags": null}"#).unwrap();
        assert!(tags.tags.is_none());

        let tags: TagList =
            serde_json::from_str(r#"{"name": "app", "tags": ["1.0.0", "latest"]}"#).unwrap();
        assert_eq!(tags.tags.unwrap(), vec!["1.0.0", "latest"]);
    }

    #[test]
    fn test_accept_header_lists_all_types() {
        let accept = MediaType::accept_header();
        for media_type in MediaType::ACCEPTED {
            assert!(accept.contains(media_type));
        }
    }
}
