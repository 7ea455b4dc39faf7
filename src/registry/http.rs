use std::collections::BTreeMap;
use std::time::Duration;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use semver::Version;
use serde::Deserialize;
use serde_json::json;
use sha1::Sha1;
use sha2::{Digest, Sha512};

use crate::error::{Error, Result};
use crate::registry::{tarball, PackageFile, Registry};

/// the public npm registry
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";

/// registry client speaking the npm wire protocol
///
/// a package is addressed by a GET/PUT on `<base>/<escaped name>`;
/// tarball payloads are fetched through the URL the packument carries.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    client: reqwest::blocking::Client,
    base_url: String,
}

/// the slice of a packument this crate reads
#[derive(Debug, Deserialize)]
struct Packument {
    #[serde(default)]
    versions: BTreeMap<String, VersionMeta>,
    #[serde(rename = "dist-tags", default)]
    dist_tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct VersionMeta {
    dist: Dist,
}

#[derive(Debug, Deserialize)]
struct Dist {
    tarball: String,
}

impl HttpRegistry {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn package_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, escape_name(name))
    }

    /// fetch and parse the packument, None on 404
    fn packument(&self, name: &str) -> Result<Option<Packument>> {
        let resp = self.client.get(self.package_url(name)).send()?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::Registry(format!("GET {}: HTTP {}", name, status)));
        }
        Ok(Some(resp.json()?))
    }
}

impl Registry for HttpRegistry {
    fn versions(&self, name: &str) -> Result<Option<Vec<Version>>> {
        match self.packument(name)? {
            None => Ok(None),
            Some(packument) => {
                let mut versions: Vec<Version> = packument
                    .versions
                    .keys()
                    .filter_map(|v| Version::parse(v).ok())
                    .collect();
                versions.sort();
                Ok(Some(versions))
            }
        }
    }

    fn publish(
        &self,
        name: &str,
        version: &Version,
        files: &[PackageFile],
        token: &str,
    ) -> Result<()> {
        // payload travels alongside a minimal generated manifest
        let version_str = version.to_string();
        let manifest = json!({ "name": name, "version": version_str });
        let mut entries = vec![PackageFile::new("package.json", serde_json::to_vec(&manifest)?)];
        entries.extend(files.iter().cloned());
        let tarball = tarball::pack(&entries)?;

        let shasum = hex::encode(Sha1::digest(&tarball));
        let integrity = format!("sha512-{}", BASE64_STANDARD.encode(Sha512::digest(&tarball)));
        let tarball_name = format!("{}-{}.tgz", bare_name(name), version);
        let tarball_url = format!("{}/{}/-/{}", self.base_url, name, tarball_name);

        let mut versions = serde_json::Map::new();
        versions.insert(
            version_str.clone(),
            json!({
                "name": name,
                "version": version_str,
                "dist": {
                    "shasum": shasum,
                    "integrity": integrity,
                    "tarball": tarball_url,
                },
            }),
        );
        let mut attachments = serde_json::Map::new();
        attachments.insert(
            tarball_name,
            json!({
                "content_type": "application/octet-stream",
                "data": BASE64_STANDARD.encode(&tarball),
                "length": tarball.len(),
            }),
        );
        let body = json!({
            "_id": name,
            "name": name,
            "dist-tags": { "latest": version_str },
            "versions": versions,
            "_attachments": attachments,
        });

        let resp = self
            .client
            .put(self.package_url(name))
            .bearer_auth(token)
            .json(&body)
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Registry(format!(
                "PUT {}: HTTP {}{}",
                name,
                status,
                response_excerpt(resp)
            )));
        }
        Ok(())
    }

    fn download_latest(&self, name: &str, path: &str) -> Result<Option<Vec<u8>>> {
        let packument = match self.packument(name)? {
            Some(p) => p,
            None => return Ok(None),
        };
        let version = latest_version(&packument)
            .ok_or_else(|| Error::Registry(format!("{} has no published versions", name)))?;
        let meta = packument
            .versions
            .get(&version.to_string())
            .ok_or_else(|| Error::Registry(format!("{} has no metadata for {}", name, version)))?;

        let resp = self.client.get(&meta.dist.tarball).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Registry(format!(
                "GET {}: HTTP {}",
                meta.dist.tarball, status
            )));
        }
        let bytes = resp.bytes()?;
        tarball::unpack(&bytes, path).map(Some)
    }
}

/// escape a scoped name for use inside a registry url path
fn escape_name(name: &str) -> String {
    name.replace('/', "%2f")
}

/// name without its scope prefix, used for tarball file names
fn bare_name(name: &str) -> &str {
    match name.split_once('/') {
        Some((_, rest)) => rest,
        None => name,
    }
}

/// pick the version the `latest` tag points at, falling back to the
/// highest published version
fn latest_version(packument: &Packument) -> Option<Version> {
    if let Some(tag) = packument.dist_tags.get("latest") {
        if let Ok(v) = Version::parse(tag) {
            return Some(v);
        }
    }
    packument
        .versions
        .keys()
        .filter_map(|v| Version::parse(v).ok())
        .max()
}

/// start of an error response body, for diagnostics
fn response_excerpt(resp: reqwest::blocking::Response) -> String {
    match resp.text() {
        Ok(body) if !body.is_empty() => {
            let excerpt: String = body.chars().take(200).collect();
            format!(": {}", excerpt)
        }
        _ => String::new(),
    }
}
