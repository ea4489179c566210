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
use std::collections::HashMap;

use crate::Error;

/// Per-version descriptor, the single document mod loader overlays rewrite.
///
/// Either `arguments` (new schema) or `minecraft_arguments` (legacy schema)
/// is present; overlay fragments (Forge emitted json, Fabric profiles) carry
/// only a subset of these fields, so nearly everything is optional and the
/// model round-trips without inventing fields.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct GameManifest {
    pub id: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub release_type: Option<String>,
    #[serde(rename = "mainClass", skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<GameArgsIndex>,
    #[serde(rename = "minecraftArguments", skip_serializing_if = "Option::is_none")]
    pub minecraft_arguments: Option<String>,
    #[serde(rename = "assetIndex", skip_serializing_if = "Option::is_none")]
    pub asset_index: Option<GameAssetIndex>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub downloads: HashMap<String, AssetDownload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<GameLibrary>,
    #[serde(rename = "inheritsFrom", skip_serializing_if = "Option::is_none")]
    pub inherits_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jar: Option<String>,
    #[serde(rename = "releaseTime", skip_serializing_if = "Option::is_none")]
    pub release_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(rename = "forgeVersion", skip_serializing_if = "Option::is_none")]
    pub forge_version: Option<String>,
    #[serde(rename = "fabricVersion", skip_serializing_if = "Option::is_none")]
    pub fabric_version: Option<String>,
    /// Fields this SDK doesn't interpret (javaVersion, logging, ...) ride
    /// along so a rewritten descriptor loses nothing.
    #[serde(flatten, default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>
}

/// On-disk wrapper for a cached per-version descriptor, trusted for the
/// same 24 hours as the version manifest cache.
#[derive(Deserialize, Serialize)]
pub struct CachedGameManifest {
    #[serde(rename = "cacheTime")]
    pub cache_time: DateTime<Utc>,
    pub manifest: GameManifest
}

#[derive(Deserialize, Serialize, Clone, Default, Debug)]
pub struct GameArgsIndex {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<GameArgs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jvm: Option<GameArgs>
}

#[derive(Deserialize, Serialize, Clone, Default, Debug)]
pub struct GameArgs(pub Vec<GameArg>);

/// An entry of the raw `arguments.jvm`/`arguments.game` arrays: either a
/// bare string or a rule-gated value.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(untagged)]
pub enum GameArg {
    Plain(String),
    Gated {
        rules: Vec<Rule>,
        value: GameArgValue
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(untagged)]
pub enum GameArgValue {
    Single(String),
    Many(Vec<String>)
}

impl GameArgValue {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            GameArgValue::Single(v) => vec![v.clone()],
            GameArgValue::Many(v) => v.clone()
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Rule {
    pub action: RuleAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<OsProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<HashMap<String, bool>>
}

#[derive(Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct OsProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct GameAssetIndex {
    pub id: String,
    #[serde(flatten)]
    pub download: AssetDownload,
    #[serde(rename = "totalSize", skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct AssetDownload {
    pub sha1: String,
    pub size: u64,
    pub url: String
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct GameLibrary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloads: Option<GameLibraryDownloads>,
    /// Maven repository root, the form used by mod loader fragments where
    /// the artifact path must be derived from `name`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natives: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract: Option<GameLibraryExtract>
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct GameLibraryDownloads {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<GameLibraryArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifiers: Option<HashMap<String, GameLibraryArtifact>>
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct GameLibraryArtifact {
    pub path: String,
    #[serde(flatten)]
    pub download: AssetDownload
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct GameLibraryExtract {
    pub exclude: Vec<String>
}

/// Split a Maven coordinate `<group>:<artifact>:<version>[:classifier]`.
pub fn split_coordinate(name: &str) -> Result<(&str, &str, &str, Option<&str>), Error> {
    let mut parts = name.split(':');

    let (group, artifact, version) = (
        parts.next().ok_or(Error::InvalidLibraryName(name.to_string()))?,
        parts.next().ok_or(Error::InvalidLibraryName(name.to_string()))?,
        parts.next().ok_or(Error::InvalidLibraryName(name.to_string()))?
    );

    if group.is_empty() || artifact.is_empty() || version.is_empty() {
        return Err(Error::InvalidLibraryName(name.to_string()));
    }

    Ok((group, artifact, version, parts.next()))
}

/// Derive the repository-relative artifact path from a Maven coordinate.
pub fn name_to_path(name: &str) -> Result<String, Error> {
    let (group, artifact, version, classifier) = split_coordinate(name)?;

    let file_name = match classifier {
        Some(classifier) => format!("{artifact}-{version}-{classifier}.jar"),
        None => format!("{artifact}-{version}.jar")
    };

    Ok(format!(
        "{group}/{artifact}/{version}/{file_name}",
        group = group.replace('.', "/")
    ))
}
