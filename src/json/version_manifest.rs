/*
 * Alex - A Minecraft Launcher SDK
 * Copyright (C) 2024 Alex SDK contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone)]
pub struct VersionManifest {
    pub latest: LatestVersions,
    pub versions: Vec<VersionManifestEntry>
}

#[derive(Deserialize, Serialize, Clone)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String
}

#[derive(Deserialize, Serialize, Clone)]
pub struct VersionManifestEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub release_type: ReleaseType,
    pub url: String,
    pub time: String,
    #[serde(rename = "releaseTime")]
    pub release_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>
}

#[derive(Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseType {
    Release,
    Snapshot,
    OldBeta,
    OldAlpha
}

/// On-disk wrapper for the cached version manifest.
///
/// The manifest is trusted for 24 hours from `cache_time`.
#[derive(Deserialize, Serialize)]
pub struct CachedManifest {
    #[serde(rename = "cacheTime")]
    pub cache_time: DateTime<Utc>,
    pub manifest: VersionManifest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_type_wire_names() {
        let json = r#"{
            "latest": {"release": "1.20.1", "snapshot": "23w31a"},
            "versions": [
                {"id": "b1.7.3", "type": "old_beta",
                 "url": "https://launchermeta.mojang.com/v1/packages/x/b1.7.3.json",
                 "time": "2011-07-08T22:00:00+00:00",
                 "releaseTime": "2011-07-08T22:00:00+00:00"}
            ]
        }"#;

        let manifest: VersionManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.versions[0].release_type, ReleaseType::OldBeta);
        assert_eq!(manifest.latest.release, "1.20.1");
    }
}
