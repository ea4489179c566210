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

use anyhow::{bail, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::{
    fs, path::{Path, PathBuf}, process::Stdio
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::asset_manager::AssetManager;
use crate::downloader::DownloadRequest;
use crate::json::GameManifest;
use crate::libraries::LibraryReport;
use crate::merge::{merge_manifests, write_manifest, LoaderKind};
use crate::{Error, Progress};

const FORGE_VERSION_LIST_URL: &str = "https://bmclapi2.bangbang93.com/forge/minecraft";

#[derive(Debug)]
pub struct ForgeInstallReport {
    pub target_name: String,
    pub descriptor_path: PathBuf,
    pub jar_path: PathBuf,
    pub libraries: LibraryReport
}

#[derive(Deserialize, Serialize, Clone)]
pub struct ForgeVersionEntry {
    pub version: String,
    #[serde(rename = "mcversion")]
    pub mc_version: String,
    #[serde(default)]
    pub build: Option<u64>
}

impl AssetManager {
    /// Forge builds published for a Minecraft version.
    pub async fn forge_versions(&self, mc_version: &str) -> Result<Vec<ForgeVersionEntry>> {
        let url = format!("{FORGE_VERSION_LIST_URL}/{mc_version}");

        self.client.fetch_json(&url).await
    }

    /// Layer Forge over an installed version by running the upstream
    /// installer as a child process.
    ///
    /// The installer is the only canonical producer of the Forge overlay
    /// metadata, so a working Java binary is a hard requirement. Its
    /// emitted version json is merged into the target descriptor, the
    /// emitted JAR (when any) replaces the target's, and the merged
    /// library set is materialized. Re-installing the same Forge version
    /// skips straight to library materialization.
    pub async fn install_forge(
        &self,
        target_name: &str,
        mc_version: &str,
        forge_version: &str,
        java_path: &Path,
        progress: &dyn Progress
    ) -> Result<ForgeInstallReport> {
        let descriptor_path = self.version_json_path(target_name);

        if !descriptor_path.is_file() {
            bail!(Error::TargetMissing(target_name.to_string()));
        }

        let base = self.get_installed_manifest(target_name)?;

        let merged = if base.forge_version.as_deref() == Some(forge_version) {
            info!("Forge {forge_version} already merged into '{target_name}'");
            base
        } else {
            let installer_path = self.download_installer(mc_version, forge_version).await?;

            let scratch = tempfile::tempdir()?;

            // the installer refuses to run against a directory that does
            // not look like a launcher installation
            fs::write(scratch.path().join("launcher_profiles.json"), "{}")?;

            run_installer(java_path, &installer_path, scratch.path(), progress).await?;

            let (overlay, emitted_jar) = locate_emitted_version(scratch.path(), mc_version)?;

            let merged = merge_manifests(&base, &overlay, LoaderKind::Forge, forge_version);
            write_manifest(&descriptor_path, &merged)?;

            if let Some(emitted_jar) = emitted_jar {
                fs::copy(emitted_jar, self.version_jar_path(target_name))?;
            }

            merged
        };

        let libraries = self.download_libraries(&merged, target_name, progress).await?;

        Ok(ForgeInstallReport {
            target_name: target_name.to_string(),
            descriptor_path,
            jar_path: self.version_jar_path(target_name),
            libraries
        })
    }

    async fn download_installer(&self, mc_version: &str, forge_version: &str) -> Result<PathBuf> {
        let full_version = format!("{mc_version}-{forge_version}");
        let file_name = format!("forge-{full_version}-installer.jar");

        let installer_path = self.downloads_dir("forge").join(&file_name);

        let url = format!(
            "{base}/net/minecraftforge/forge/{full_version}/{file_name}",
            base = self.source.forge_maven_base()
        );

        self.client.fetch(&DownloadRequest::new(url, &installer_path), None).await?;

        Ok(installer_path)
    }
}

async fn run_installer(
    java_path: &Path,
    installer_path: &Path,
    scratch_dir: &Path,
    progress: &dyn Progress
) -> Result<()> {
    progress.begin("Running Forge installer", 0);

    let mut child = Command::new(java_path)
        .arg("-jar")
        .arg(installer_path)
        .arg("--installClient")
        .arg(scratch_dir)
        .current_dir(scratch_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to run '{java}'", java = java_path.display()))?;

    let stdout = child.stdout.take()
        .context("installer stdout not captured")?;

    let mut captured = String::new();
    let mut lines = BufReader::new(stdout).lines();
    let mut steps = 0;

    while let Some(line) = lines.next_line().await? {
        // the installer's output is unstructured, a few well-known verbs
        // make do as coarse progress hints
        if ["Installing", "Extracting", "Downloading"].iter().any(|verb| line.contains(verb)) {
            steps += 1;
            progress.advance(steps);
        }

        debug!("[forge-installer] {line}");
        captured.push_str(&line);
        captured.push('\n');
    }

    let output = child.wait_with_output().await?;

    progress.end();

    if !output.status.success() {
        captured.push_str(&String::from_utf8_lossy(&output.stderr));

        bail!(Error::InstallerFailed {
            code: output.status.code(),
            output: captured
        });
    }

    Ok(())
}

/// Find the version descriptor the installer wrote into its scratch
/// directory, preferring the Forge entry over a re-emitted vanilla one.
fn locate_emitted_version(
    scratch_dir: &Path,
    mc_version: &str
) -> Result<(GameManifest, Option<PathBuf>)> {
    let versions_dir = scratch_dir.join("versions");

    let mut fallback = None;

    for entry in fs::read_dir(&versions_dir)? {
        let entry = entry?;

        if !entry.file_type()?.is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        let json_path = entry.path().join(format!("{name}.json"));

        if !json_path.is_file() {
            continue;
        }

        if name.contains("forge") {
            return Ok(read_emitted(&entry.path(), &name)?);
        }

        if name != mc_version && fallback.is_none() {
            fallback = Some((entry.path(), name));
        }
    }

    match fallback {
        Some((path, name)) => Ok(read_emitted(&path, &name)?),
        None => bail!("Forge installer did not emit a version descriptor")
    }
}

fn read_emitted(version_dir: &Path, name: &str) -> Result<(GameManifest, Option<PathBuf>)> {
    let manifest = serde_json::from_str(
        &fs::read_to_string(version_dir.join(format!("{name}.json")))?
    )?;

    let jar_path = version_dir.join(format!("{name}.jar"));

    Ok((manifest, jar_path.is_file().then_some(jar_path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NoProgress, Source};

    #[tokio::test]
    async fn install_requires_existing_target() {
        let root = tempfile::tempdir().unwrap();
        let manager = AssetManager::with_root(root.path(), Source::Primary).unwrap();

        let error = manager
            .install_forge("not-installed", "1.20.1", "47.2.0", Path::new("java"), &NoProgress)
            .await
            .unwrap_err();

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::TargetMissing(name)) if name == "not-installed"
        ));
    }

    #[test]
    fn emitted_forge_version_is_preferred() {
        let scratch = tempfile::tempdir().unwrap();

        let forge_dir = scratch.path().join("versions").join("1.20.1-forge-47.2.0");
        fs::create_dir_all(&forge_dir).unwrap();
        fs::write(
            forge_dir.join("1.20.1-forge-47.2.0.json"),
            r#"{"id": "1.20.1-forge-47.2.0", "mainClass": "cpw.mods.bootstraplauncher.BootstrapLauncher"}"#
        ).unwrap();

        let vanilla_dir = scratch.path().join("versions").join("1.20.1");
        fs::create_dir_all(&vanilla_dir).unwrap();
        fs::write(vanilla_dir.join("1.20.1.json"), r#"{"id": "1.20.1"}"#).unwrap();

        let (manifest, jar) = locate_emitted_version(scratch.path(), "1.20.1").unwrap();

        assert_eq!(manifest.id, "1.20.1-forge-47.2.0");
        assert_eq!(
            manifest.main_class.as_deref(),
            Some("cpw.mods.bootstraplauncher.BootstrapLauncher")
        );
        assert!(jar.is_none());
    }

    #[test]
    fn emitted_jar_is_picked_up() {
        let scratch = tempfile::tempdir().unwrap();

        let forge_dir = scratch.path().join("versions").join("1.12.2-forge-14.23.5.2860");
        fs::create_dir_all(&forge_dir).unwrap();
        fs::write(
            forge_dir.join("1.12.2-forge-14.23.5.2860.json"),
            r#"{"id": "1.12.2-forge-14.23.5.2860"}"#
        ).unwrap();
        fs::write(forge_dir.join("1.12.2-forge-14.23.5.2860.jar"), b"jar").unwrap();

        let (_, jar) = locate_emitted_version(scratch.path(), "1.12.2").unwrap();
        assert!(jar.unwrap().ends_with("1.12.2-forge-14.23.5.2860.jar"));
    }

    #[test]
    fn missing_emitted_version_fails() {
        let scratch = tempfile::tempdir().unwrap();
        fs::create_dir_all(scratch.path().join("versions")).unwrap();

        assert!(locate_emitted_version(scratch.path(), "1.20.1").is_err());
    }
}
