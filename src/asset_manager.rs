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
use chrono::{Duration, Utc};
use log::warn;
use std::{
    collections::HashMap, fs, path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering}, sync::Mutex
};

use crate::downloader::{ByteProgress, DownloadRequest, Downloader, DEFAULT_CONCURRENCY};
use crate::json::{
    AssetManifest, CachedGameManifest, CachedManifest, GameManifest, VersionManifest,
    VersionManifestEntry
};
use crate::merge::write_manifest;
use crate::{env, Error, Progress, Source};

const MANIFEST_CACHE_HOURS: i64 = 24;

/// Root handle of the SDK: owns the data directory layout, the HTTP
/// download engine and the two-level (memory, disk) metadata caches.
///
/// One `AssetManager` owns its data directory exclusively for the duration
/// of any operation; concurrent managers over the same directory are
/// undefined.
pub struct AssetManager {
    pub(crate) client: Downloader,
    pub(crate) source: Source,
    root: PathBuf,
    max_concurrent: usize,
    manifest: Mutex<Option<VersionManifest>>,
    game_manifests: Mutex<HashMap<String, GameManifest>>
}

pub struct DownloadUrls {
    pub client: String,
    pub server: Option<String>
}

pub struct AssetBatchReport {
    pub total: usize,
    pub success: usize,
    pub failed: usize
}

impl AssetManager {
    pub fn new(source: Source) -> Result<Self> {
        Self::with_root(&env::get_data_dir(), source)
    }

    pub fn with_root(root: &Path, source: Source) -> Result<Self> {
        let manager = AssetManager {
            client: Downloader::new(),
            source,
            root: root.to_path_buf(),
            max_concurrent: DEFAULT_CONCURRENCY,
            manifest: Mutex::new(None),
            game_manifests: Mutex::new(HashMap::new())
        };

        fs::create_dir_all(manager.objects_dir())?;
        fs::create_dir_all(manager.indexes_dir())?;
        fs::create_dir_all(manager.versions_dir())?;
        fs::create_dir_all(manager.descriptor_cache_dir())?;
        fs::create_dir_all(manager.libraries_dir())?;

        Ok(manager)
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub(crate) fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.assets_dir().join("objects")
    }

    pub fn indexes_dir(&self) -> PathBuf {
        self.assets_dir().join("indexes")
    }

    pub fn virtual_assets_dir(&self, asset_index_id: &str) -> PathBuf {
        self.assets_dir().join("virtual").join(asset_index_id)
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.root.join("libraries")
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    pub fn version_dir(&self, version_name: &str) -> PathBuf {
        self.versions_dir().join(version_name)
    }

    pub fn version_json_path(&self, version_name: &str) -> PathBuf {
        self.version_dir(version_name).join(format!("{version_name}.json"))
    }

    pub fn version_jar_path(&self, version_name: &str) -> PathBuf {
        self.version_dir(version_name).join(format!("{version_name}.jar"))
    }

    pub fn natives_dir(&self, version_name: &str) -> PathBuf {
        self.version_dir(version_name).join(format!("{version_name}-natives"))
    }

    pub fn downloads_dir(&self, kind: &str) -> PathBuf {
        self.root.join("downloads").join(kind)
    }

    fn manifest_cache_path(&self) -> PathBuf {
        self.root.join("version_manifest.json")
    }

    fn descriptor_cache_dir(&self) -> PathBuf {
        self.root.join("versions_info_cache")
    }

    fn descriptor_cache_path(&self, version_id: &str) -> PathBuf {
        self.descriptor_cache_dir().join(format!("{version_id}.json"))
    }

    /// Get the version manifest, trusting the memory copy first and the
    /// on-disk cache for 24 hours, before falling back to the network.
    pub async fn get_manifest(&self, force_refresh: bool) -> Result<VersionManifest> {
        if !force_refresh {
            if let Some(manifest) = self.manifest.lock().expect("manifest cache lock").as_ref() {
                return Ok(manifest.clone());
            }

            if let Some(cached) = self.read_manifest_cache() {
                if Utc::now() - cached.cache_time < Duration::hours(MANIFEST_CACHE_HOURS) {
                    return Ok(self.remember_manifest(cached.manifest));
                }
            }
        }

        match self.client.fetch_json::<VersionManifest>(self.source.manifest_url()).await {
            Ok(manifest) => {
                let cached = CachedManifest {
                    cache_time: Utc::now(),
                    manifest
                };

                fs::write(self.manifest_cache_path(), serde_json::to_string(&cached)?)?;

                Ok(self.remember_manifest(cached.manifest))
            }
            Err(error) => {
                // a stale cache still beats no manifest at all
                match self.read_manifest_cache() {
                    Some(cached) => {
                        warn!("Version manifest fetch failed, using stale cache: {error:#}");
                        Ok(self.remember_manifest(cached.manifest))
                    }
                    None => bail!(Error::Manifest(format!("{error:#}")))
                }
            }
        }
    }

    fn read_manifest_cache(&self) -> Option<CachedManifest> {
        let json = fs::read_to_string(self.manifest_cache_path()).ok()?;

        match serde_json::from_str(&json) {
            Ok(cached) => Some(cached),
            Err(error) => {
                warn!("Discarding unreadable version manifest cache: {error}");
                None
            }
        }
    }

    fn remember_manifest(&self, manifest: VersionManifest) -> VersionManifest {
        *self.manifest.lock().expect("manifest cache lock") = Some(manifest.clone());
        manifest
    }

    /// Get the descriptor of a version with the same two-level cache
    /// discipline as the manifest: memory first, then the timestamped
    /// copy under `versions_info_cache/` while younger than 24 hours.
    pub async fn get_game_manifest(&self, version_id: &str, force_refresh: bool) -> Result<GameManifest> {
        if !force_refresh {
            if let Some(manifest) = self.game_manifests
                .lock()
                .expect("descriptor cache lock")
                .get(version_id)
            {
                return Ok(manifest.clone());
            }

            if let Some(cached) = self.read_descriptor_cache(version_id) {
                if Utc::now() - cached.cache_time < Duration::hours(MANIFEST_CACHE_HOURS) {
                    return Ok(self.remember_game_manifest(version_id, cached.manifest));
                }
            }
        }

        let manifest = self.get_manifest(false).await?;

        let stub = manifest.versions.iter()
            .find(|v| v.id == version_id)
            .ok_or(Error::UnknownVersion(version_id.to_string()))?;

        match self.client.fetch_json::<GameManifest>(&self.source.reroute(&stub.url)).await {
            Ok(game_manifest) => {
                let cached = CachedGameManifest {
                    cache_time: Utc::now(),
                    manifest: game_manifest
                };

                fs::write(
                    self.descriptor_cache_path(version_id),
                    serde_json::to_string(&cached)?
                )?;

                Ok(self.remember_game_manifest(version_id, cached.manifest))
            }
            Err(error) => match self.read_descriptor_cache(version_id) {
                Some(cached) => {
                    warn!("Descriptor fetch for '{version_id}' failed, using stale cache: {error:#}");
                    Ok(self.remember_game_manifest(version_id, cached.manifest))
                }
                None => Err(error)
            }
        }
    }

    fn read_descriptor_cache(&self, version_id: &str) -> Option<CachedGameManifest> {
        let json = fs::read_to_string(self.descriptor_cache_path(version_id)).ok()?;

        match serde_json::from_str(&json) {
            Ok(cached) => Some(cached),
            Err(error) => {
                warn!("Discarding unreadable descriptor cache for '{version_id}': {error}");
                None
            }
        }
    }

    fn remember_game_manifest(&self, version_id: &str, manifest: GameManifest) -> GameManifest {
        self.game_manifests
            .lock()
            .expect("descriptor cache lock")
            .insert(version_id.to_string(), manifest.clone());

        manifest
    }

    /// Read the effective (possibly loader-merged) descriptor of an
    /// installed version from `versions/<name>/<name>.json`.
    pub fn get_installed_manifest(&self, version_name: &str) -> Result<GameManifest> {
        let path = self.version_json_path(version_name);

        if !path.is_file() {
            bail!(Error::TargetMissing(version_name.to_string()));
        }

        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    /// The manifest stubs behind `latest.release` and `latest.snapshot`.
    pub async fn latest_versions(&self) -> Result<(VersionManifestEntry, VersionManifestEntry)> {
        let manifest = self.get_manifest(false).await?;

        let find = |id: &str| {
            manifest.versions.iter()
                .find(|v| v.id == id)
                .cloned()
                .ok_or(Error::UnknownVersion(id.to_string()))
        };

        Ok((find(&manifest.latest.release)?, find(&manifest.latest.snapshot)?))
    }

    /// Client and server JAR URLs of a version, routed through the source.
    pub async fn download_urls_for(&self, version_id: &str) -> Result<DownloadUrls> {
        let manifest = self.get_game_manifest(version_id, false).await?;

        let client = manifest.downloads.get("client")
            .with_context(|| format!("version '{version_id}' has no client download"))?;

        Ok(DownloadUrls {
            client: self.source.reroute(&client.url),
            server: manifest.downloads.get("server").map(|d| self.source.reroute(&d.url))
        })
    }

    /// Download the client JAR into `versions/<id>/<id>.jar` and install
    /// the effective descriptor next to it.
    pub async fn download_client(&self, version_id: &str, progress: Option<&ByteProgress>) -> Result<()> {
        let manifest = self.get_game_manifest(version_id, false).await?;

        let download = manifest.downloads.get("client")
            .with_context(|| format!("version '{version_id}' has no client download"))?;

        fs::create_dir_all(self.version_dir(version_id))?;

        let json_path = self.version_json_path(version_id);
        if !json_path.is_file() {
            write_manifest(&json_path, &manifest)?;
        }

        let request = DownloadRequest::new(
            self.source.reroute(&download.url),
            self.version_jar_path(version_id)
        ).with_sha1(download.sha1.as_str());

        self.client.fetch(&request, progress).await
    }

    /// Download the server JAR into `versions/<id>/<id>-server.jar`.
    pub async fn download_server(&self, version_id: &str, progress: Option<&ByteProgress>) -> Result<()> {
        let manifest = self.get_game_manifest(version_id, false).await?;

        let download = match manifest.downloads.get("server") {
            Some(download) => download,
            None => bail!(Error::ServerNotFound(version_id.to_string()))
        };

        fs::create_dir_all(self.version_dir(version_id))?;

        let request = DownloadRequest::new(
            self.source.reroute(&download.url),
            self.version_dir(version_id).join(format!("{version_id}-server.jar"))
        ).with_sha1(download.sha1.as_str());

        self.client.fetch(&request, progress).await
    }

    /// Get the asset index of a version, verified by its own SHA-1. An
    /// already-matching local copy skips the network round trip.
    pub async fn get_asset_manifest(&self, game_manifest: &GameManifest) -> Result<AssetManifest> {
        let asset_index = game_manifest.asset_index.as_ref()
            .with_context(|| format!("version '{id}' has no asset index", id = game_manifest.id))?;

        let index_path = self.indexes_dir().join(format!("{id}.json", id = asset_index.id));

        let request = DownloadRequest::new(
            self.source.reroute(&asset_index.download.url),
            &index_path
        ).with_sha1(asset_index.download.sha1.as_str());

        self.client.fetch(&request, None).await?;

        let index_file = fs::File::open(index_path)?;
        Ok(serde_json::from_reader(index_file)?)
    }

    /// Fan out every object of the version's asset index to
    /// `assets/objects/<aa>/<hash>`.
    ///
    /// Objects are content-addressed, so an existing file needs no
    /// re-verification and failed objects never abort their peers.
    /// `progress` is fed whole percentage points: the index fetch counts
    /// for the first 2%, object completions fill the rest.
    pub async fn download_all_assets(
        &self,
        game_manifest: &GameManifest,
        progress: &dyn Progress
    ) -> Result<AssetBatchReport> {
        progress.begin("Downloading assets", 100);

        let asset_manifest = self.get_asset_manifest(game_manifest).await?;
        progress.advance(2);

        let objects_dir = self.objects_dir();
        let resource_base = self.source.resource_base();
        let total = asset_manifest.objects.len();

        let mut present = 0;
        let mut requests = Vec::new();

        for object in asset_manifest.objects.values() {
            let object_path = object.object_path();
            let dest = objects_dir.join(&object_path);

            if dest.is_file() {
                present += 1;
                continue;
            }

            requests.push(DownloadRequest::new(format!("{resource_base}/{object_path}"), dest));
        }

        let last_percent = AtomicUsize::new(2);

        let report = self.client.fetch_all(requests, self.max_concurrent, |done, _| {
            let percent = 2 + (present + done) * 98 / total.max(1);
            if percent > last_percent.swap(percent, Ordering::SeqCst) {
                progress.advance(percent);
            }
        }).await;

        progress.end();

        Ok(AssetBatchReport {
            total,
            success: present + report.success,
            failed: report.failed
        })
    }

    /// Copy content-addressed objects back out under their logical paths,
    /// for pre-1.7 versions that read `resources/` or a virtual assets
    /// tree instead of the object store.
    pub fn copy_resources(
        &self,
        asset_manifest: &AssetManifest,
        target_dir: &Path,
        progress: &dyn Progress
    ) -> Result<()> {
        progress.begin("Copying resources", asset_manifest.objects.len());

        for (i, (logical_path, object)) in asset_manifest.objects.iter().enumerate() {
            let object_path = self.objects_dir().join(object.object_path());
            let resource_path = target_dir.join(logical_path);

            if !resource_path.exists() {
                if let Some(parent) = resource_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(object_path, resource_path)?;
            }

            progress.advance(i + 1);
        }

        progress.end();

        Ok(())
    }

    fn read_local_asset_manifest(&self, manifest: &GameManifest) -> Option<(String, AssetManifest)> {
        let index_id = manifest.asset_index.as_ref()
            .map(|index| index.id.clone())
            .or_else(|| manifest.assets.clone())?;

        let file = fs::File::open(self.indexes_dir().join(format!("{index_id}.json"))).ok()?;

        match serde_json::from_reader(file) {
            Ok(asset_manifest) => Some((index_id, asset_manifest)),
            Err(error) => {
                warn!("Discarding unreadable asset index '{index_id}': {error}");
                None
            }
        }
    }

    fn select_legacy_assets_dir(
        &self,
        index_id: &str,
        asset_manifest: &AssetManifest,
        game_directory: &Path
    ) -> Option<PathBuf> {
        if asset_manifest.is_virtual.unwrap_or(false) {
            Some(self.virtual_assets_dir(index_id))
        } else if asset_manifest.map_to_resources.unwrap_or(false) {
            Some(game_directory.join("resources"))
        } else {
            None
        }
    }

    /// Directory a legacy version reads its assets from: the virtual tree
    /// for `virtual` indices, `<game dir>/resources` for mapped ones,
    /// `None` for versions that use the object store directly.
    pub(crate) fn legacy_assets_dir(
        &self,
        manifest: &GameManifest,
        game_directory: &Path
    ) -> Option<PathBuf> {
        let (index_id, asset_manifest) = self.read_local_asset_manifest(manifest)?;

        self.select_legacy_assets_dir(&index_id, &asset_manifest, game_directory)
    }

    /// Materialize the legacy asset tree of an installed version when its
    /// index asks for one, returning the populated directory.
    pub fn prepare_legacy_assets(
        &self,
        version_name: &str,
        game_directory: &Path,
        progress: &dyn Progress
    ) -> Result<Option<PathBuf>> {
        let manifest = self.get_installed_manifest(version_name)?;

        let Some((index_id, asset_manifest)) = self.read_local_asset_manifest(&manifest) else {
            return Ok(None);
        };

        let Some(target_dir) = self.select_legacy_assets_dir(&index_id, &asset_manifest, game_directory) else {
            return Ok(None);
        };

        self.copy_resources(&asset_manifest, &target_dir, progress)?;

        Ok(Some(target_dir))
    }
}
