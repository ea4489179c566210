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

use anyhow::{bail, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::asset_manager::AssetManager;
use crate::json::{GameLibrary, GameManifest};
use crate::libraries::LibraryReport;
use crate::merge::{merge_manifests, write_manifest, LoaderKind};
use crate::{Error, Progress};

const FABRIC_META_URL: &str = "https://meta.fabricmc.net/v2";

#[derive(Deserialize)]
struct FabricLoaderEntry {
    loader: FabricLoaderVersion
}

#[derive(Deserialize, Serialize, Clone)]
pub struct FabricLoaderVersion {
    pub version: String,
    #[serde(default)]
    pub stable: bool
}

#[derive(Debug)]
pub struct FabricInstallReport {
    pub target_name: String,
    pub descriptor_path: PathBuf,
    pub libraries: LibraryReport
}

impl AssetManager {
    /// Fabric loader versions published for a Minecraft version, newest
    /// first as the meta service orders them.
    pub async fn fabric_loader_versions(&self, mc_version: &str) -> Result<Vec<FabricLoaderVersion>> {
        let url = format!("{FABRIC_META_URL}/versions/loader/{mc_version}");
        let entries: Vec<FabricLoaderEntry> = self.client.fetch_json(&url).await?;

        Ok(entries.into_iter().map(|e| e.loader).collect())
    }

    /// Layer the Fabric loader over an installed version.
    ///
    /// The loader profile is plain JSON from the Fabric meta service; no
    /// installer runs. The target's descriptor is rewritten in place and
    /// the loader's own libraries are materialized. Re-installing the same
    /// loader version leaves the descriptor untouched.
    pub async fn install_fabric(
        &self,
        target_name: &str,
        mc_version: &str,
        loader_version: &str,
        progress: &dyn Progress
    ) -> Result<FabricInstallReport> {
        let descriptor_path = self.version_json_path(target_name);

        if !descriptor_path.is_file() {
            bail!(Error::TargetMissing(target_name.to_string()));
        }

        let base = self.get_installed_manifest(target_name)?;

        let merged = if base.fabric_version.as_deref() == Some(loader_version) {
            info!("Fabric loader {loader_version} already merged into '{target_name}'");
            base
        } else {
            let url = format!(
                "{FABRIC_META_URL}/versions/loader/{mc_version}/{loader_version}/profile/json"
            );
            let profile: GameManifest = self.client.fetch_json(&url).await?;

            let merged = merge_manifests(&base, &profile, LoaderKind::Fabric, loader_version);
            write_manifest(&descriptor_path, &merged)?;

            merged
        };

        let loader_libraries: Vec<GameLibrary> = merged.libraries.iter()
            .filter(|library| is_fabric_library(&library.name))
            .cloned()
            .collect();

        let libraries = self.download_plain_libraries(&loader_libraries, progress).await?;

        Ok(FabricInstallReport {
            target_name: target_name.to_string(),
            descriptor_path,
            libraries
        })
    }
}

fn is_fabric_library(name: &str) -> bool {
    name.contains("fabric") || name.starts_with("net.fabricmc:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NoProgress, Source};

    #[test]
    fn fabric_library_filter() {
        assert!(is_fabric_library("net.fabricmc:fabric-loader:0.15.6"));
        assert!(is_fabric_library("net.fabricmc:intermediary:1.20.1"));
        assert!(!is_fabric_library("org.ow2.asm:asm:9.5"));
    }

    #[tokio::test]
    async fn reinstalling_same_loader_leaves_descriptor_untouched() {
        let root = tempfile::tempdir().unwrap();
        let manager = AssetManager::with_root(root.path(), Source::Primary).unwrap();

        let version_dir = root.path().join("versions").join("1.20.1");
        std::fs::create_dir_all(&version_dir).unwrap();

        let descriptor = r#"{
            "id": "1.20.1",
            "mainClass": "net.fabricmc.loader.impl.launch.knot.KnotClient",
            "fabricVersion": "0.15.6"
        }"#;

        let descriptor_path = version_dir.join("1.20.1.json");
        std::fs::write(&descriptor_path, descriptor).unwrap();

        // already merged: no meta fetch, no rewrite
        let report = manager
            .install_fabric("1.20.1", "1.20.1", "0.15.6", &NoProgress)
            .await
            .unwrap();

        assert_eq!(report.target_name, "1.20.1");
        assert_eq!(std::fs::read_to_string(&descriptor_path).unwrap(), descriptor);
    }

    #[tokio::test]
    async fn install_requires_existing_target() {
        let root = tempfile::tempdir().unwrap();
        let manager = AssetManager::with_root(root.path(), Source::Primary).unwrap();

        let error = manager
            .install_fabric("not-installed", "1.20.1", "0.15.6", &NoProgress)
            .await
            .unwrap_err();

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::TargetMissing(name)) if name == "not-installed"
        ));
    }
}
