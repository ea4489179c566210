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

mod asset_manager;
mod downloader;
pub mod env;
mod fabric;
mod forge;
mod json;
mod launch_cmd;
mod libraries;
mod merge;
mod rules;
mod source;
#[cfg(test)]
mod test_server;
mod zip;

use std::path::PathBuf;

pub use {
    asset_manager::AssetBatchReport,
    asset_manager::AssetManager,
    asset_manager::DownloadUrls,
    downloader::BatchReport,
    downloader::ByteProgress,
    downloader::DownloadRequest,
    downloader::DownloadStatus,
    downloader::Downloader,
    downloader::DEFAULT_CONCURRENCY,
    fabric::FabricInstallReport,
    fabric::FabricLoaderVersion,
    forge::ForgeInstallReport,
    forge::ForgeVersionEntry,
    json::AssetDownload,
    json::AssetManifest,
    json::AssetObject,
    json::GameArg,
    json::GameArgValue,
    json::GameArgs,
    json::GameArgsIndex,
    json::GameAssetIndex,
    json::GameLibrary,
    json::GameLibraryArtifact,
    json::GameLibraryDownloads,
    json::GameLibraryExtract,
    json::GameManifest,
    json::LatestVersions,
    json::OsProperties,
    json::ReleaseType,
    json::Rule,
    json::RuleAction,
    json::VersionManifest,
    json::VersionManifestEntry,
    launch_cmd::Identity,
    launch_cmd::LaunchCommand,
    launch_cmd::LaunchParameters,
    launch_cmd::Memory,
    launch_cmd::QuickPlay,
    launch_cmd::Window,
    libraries::LibraryReport,
    merge::LoaderKind,
    source::Source
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Server returned status {status} for '{url}'")]
    Transport { status: u16, url: String },
    #[error("Request for '{0}' timed out")]
    Timeout(String),
    #[error("SHA-1 mismatch for {path:?}: expected {expected}, got {actual}")]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String
    },
    #[error("Minecraft version '{0}' not found")]
    UnknownVersion(String),
    #[error("Version manifest unavailable: {0}")]
    Manifest(String),
    #[error("Version '{0}' is not installed")]
    TargetMissing(String),
    #[error("Installer exited with code {code:?}")]
    InstallerFailed { code: Option<i32>, output: String },
    #[error("Unable to extract archive {0:?}")]
    Extraction(PathBuf),
    #[error("Unable to launch: {0}")]
    Launch(String),
    #[error("Expected library name '{0}' in format '<group_id>:<artifact_id>:<version>:[classifier]'")]
    InvalidLibraryName(String),
    #[error("Minecraft version '{0}' does not include server download")]
    ServerNotFound(String)
}

pub trait Progress: Sync {
    fn begin(&self, message: &'static str, total: usize);
    fn end(&self);
    fn advance(&self, current: usize);
}

/// No-op sink for callers that don't track progress.
pub struct NoProgress;

impl Progress for NoProgress {
    fn begin(&self, _message: &'static str, _total: usize) {}
    fn end(&self) {}
    fn advance(&self, _current: usize) {}
}
