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

use anyhow::Result;
use log::warn;
use std::fs;

use crate::asset_manager::AssetManager;
use crate::downloader::DownloadRequest;
use crate::json::{name_to_path, split_coordinate, GameLibrary, GameManifest};
use crate::rules::{rules_allow, RulesContext};
use crate::zip::extract_zip;
use crate::{env, Error, Progress, Source};

#[derive(Debug)]
pub struct LibraryReport {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    /// Applicable libraries with no reachable URL on this platform.
    pub skipped: usize
}

/// A library flattened to something the download engine can fetch.
pub(crate) struct ResolvedLibrary {
    /// Path relative to the shared `libraries/` directory.
    pub path: String,
    pub url: String,
    pub sha1: Option<String>,
    pub native: bool,
    pub extract_exclude: Vec<String>
}

impl GameLibrary {
    pub(crate) fn applies(&self, ctx: &RulesContext) -> bool {
        match &self.rules {
            Some(rules) => rules_allow(rules, ctx),

            // lib applies if rules don't exist
            None => true
        }
    }

    /// A library is native when its coordinate carries a `natives-*`
    /// classifier, it declares a natives/classifiers table, or its version
    /// field names the platform as `<os>[-<arch>]`.
    pub(crate) fn is_native(&self, ctx: &RulesContext) -> bool {
        if self.natives.is_some() {
            return true;
        }

        if let Some(classifiers) = self.downloads.as_ref().and_then(|d| d.classifiers.as_ref()) {
            if classifiers.contains_key(&format!("natives-{os}", os = ctx.os_name)) {
                return true;
            }
        }

        if let Ok((_, _, version, classifier)) = split_coordinate(&self.name) {
            if classifier.is_some_and(|c| c.starts_with("natives-")) {
                return true;
            }

            if version == ctx.os_name || version == format!("{os}-{arch}", os = ctx.os_name, arch = ctx.arch) {
                return true;
            }
        }

        false
    }

    /// Flatten to a downloadable artifact, or `None` when the library has
    /// nothing reachable on this platform.
    pub(crate) fn resolve(&self, ctx: &RulesContext, source: Source) -> Option<ResolvedLibrary> {
        let extract_exclude = self.extract.as_ref()
            .map(|e| e.exclude.clone())
            .unwrap_or_default();

        if self.is_native(ctx) {
            // a natives table points at a classifier entry, possibly
            // through an `${arch}` pointer-width template
            if let Some(natives) = &self.natives {
                let classifiers = self.downloads.as_ref()?.classifiers.as_ref()?;

                let classifier_key = natives.get(ctx.os_name)?
                    .replace("${arch}", env::get_arch_bits());

                let artifact = classifiers.get(&classifier_key)?;

                return Some(ResolvedLibrary {
                    path: artifact.path.clone(),
                    url: source.reroute(&artifact.download.url),
                    sha1: Some(artifact.download.sha1.clone()),
                    native: true,
                    extract_exclude
                });
            }

            // natives addressed directly through the coordinate classifier
            return self.artifact_or_derived(source, true, extract_exclude);
        }

        self.artifact_or_derived(source, false, extract_exclude)
    }

    fn artifact_or_derived(
        &self,
        source: Source,
        native: bool,
        extract_exclude: Vec<String>
    ) -> Option<ResolvedLibrary> {
        if let Some(artifact) = self.downloads.as_ref().and_then(|d| d.artifact.as_ref()) {
            return Some(ResolvedLibrary {
                path: artifact.path.clone(),
                url: source.reroute(&artifact.download.url),
                sha1: Some(artifact.download.sha1.clone()),
                native,
                extract_exclude
            });
        }

        let path = match name_to_path(&self.name) {
            Ok(path) => path,
            Err(error) => {
                warn!("Skipping library: {error}");
                return None;
            }
        };

        let base = match &self.url {
            Some(url) => url.trim_end_matches('/'),
            None => Source::Primary.library_base()
        };

        Some(ResolvedLibrary {
            path: path.clone(),
            url: source.reroute(&format!("{base}/{path}")),
            sha1: None,
            native,
            extract_exclude
        })
    }
}

impl AssetManager {
    /// Materialize every applicable library of a descriptor: plain JARs
    /// into the shared `libraries/` tree, native JARs downloaded and then
    /// flattened into `versions/<name>/<name>-natives`.
    ///
    /// The natives directory is destroyed and rebuilt on every pass so no
    /// stale binaries survive a version or loader change. Per-library
    /// failures are counted, logged and never abort the batch.
    pub async fn download_libraries(
        &self,
        game_manifest: &GameManifest,
        version_name: &str,
        progress: &dyn Progress
    ) -> Result<LibraryReport> {
        let ctx = RulesContext::host();

        let mut total = 0;
        let mut skipped = 0;
        let mut natives = Vec::new();
        let mut requests = Vec::new();

        for library in &game_manifest.libraries {
            if !library.applies(&ctx) {
                continue;
            }

            total += 1;

            match library.resolve(&ctx, self.source) {
                Some(resolved) => {
                    let mut request = DownloadRequest::new(
                        resolved.url.clone(),
                        self.libraries_dir().join(&resolved.path)
                    );

                    if let Some(sha1) = &resolved.sha1 {
                        request = request.with_sha1(sha1.as_str());
                    }

                    if resolved.native {
                        natives.push(resolved);
                    }

                    requests.push(request);
                }
                None => skipped += 1
            }
        }

        progress.begin("Downloading libraries", requests.len());

        let report = self.client
            .fetch_all(requests, self.max_concurrent(), |done, _| progress.advance(done))
            .await;

        progress.end();

        let mut failed = report.failed;

        let natives_dir = self.natives_dir(version_name);
        if natives_dir.is_dir() {
            fs::remove_dir_all(&natives_dir)?;
        }
        fs::create_dir_all(&natives_dir)?;

        progress.begin("Extracting native jars", natives.len());

        for (i, library) in natives.iter().enumerate() {
            let jar_path = self.libraries_dir().join(&library.path);

            // a jar that never arrived is already counted as failed
            if jar_path.is_file() {
                let result = fs::File::open(&jar_path)
                    .map_err(anyhow::Error::from)
                    .and_then(|jar| {
                        Ok(extract_zip(jar, &natives_dir, &library.extract_exclude)?)
                    });

                if let Err(error) = result {
                    warn!("{extraction}: {error:#}", extraction = Error::Extraction(jar_path.clone()));
                    failed += 1;
                }
            }

            progress.advance(i + 1);
        }

        progress.end();

        let meta_inf = natives_dir.join("META-INF");
        if meta_inf.is_dir() {
            fs::remove_dir_all(meta_inf)?;
        }

        Ok(LibraryReport {
            total,
            success: total - skipped - failed,
            failed,
            skipped
        })
    }
}

impl AssetManager {
    /// Materialize a slice of non-native libraries without touching the
    /// natives directory. Used by overlay installs that only add plain
    /// JARs on top of an already materialized base version.
    pub(crate) async fn download_plain_libraries(
        &self,
        libraries: &[GameLibrary],
        progress: &dyn Progress
    ) -> Result<LibraryReport> {
        let ctx = RulesContext::host();

        let mut total = 0;
        let mut skipped = 0;
        let mut requests = Vec::new();

        for library in libraries {
            if !library.applies(&ctx) {
                continue;
            }

            total += 1;

            match library.resolve(&ctx, self.source) {
                Some(resolved) if !resolved.native => {
                    let mut request = DownloadRequest::new(
                        resolved.url,
                        self.libraries_dir().join(&resolved.path)
                    );

                    if let Some(sha1) = &resolved.sha1 {
                        request = request.with_sha1(sha1.as_str());
                    }

                    requests.push(request);
                }
                Some(_) => skipped += 1,
                None => skipped += 1
            }
        }

        progress.begin("Downloading mod loader libraries", requests.len());

        let report = self.client
            .fetch_all(requests, self.max_concurrent(), |done, _| progress.advance(done))
            .await;

        progress.end();

        Ok(LibraryReport {
            total,
            success: total - skipped - report.failed,
            failed: report.failed,
            skipped
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn ctx(os_name: &'static str, arch: &'static str) -> RulesContext {
        RulesContext {
            os_name,
            arch,
            features: HashMap::new()
        }
    }

    fn library(json: serde_json::Value) -> GameLibrary {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn linux_only_library_skipped_on_windows() {
        let lib = library(serde_json::json!({
            "name": "org.lwjgl:lwjgl:3.3.1",
            "rules": [{"action": "allow", "os": {"name": "linux"}}]
        }));

        assert!(lib.applies(&ctx("linux", "x64")));
        assert!(!lib.applies(&ctx("windows", "x64")));
    }

    #[test]
    fn classifier_marks_native() {
        let lib = library(serde_json::json!({
            "name": "org.lwjgl:lwjgl:3.3.1:natives-linux"
        }));

        assert!(lib.is_native(&ctx("linux", "x64")));
    }

    #[test]
    fn platform_version_field_marks_native() {
        let lib = library(serde_json::json!({
            "name": "tv.twitch:twitch-platform:windows-x64"
        }));

        assert!(lib.is_native(&ctx("windows", "x64")));
        assert!(!lib.is_native(&ctx("linux", "x64")));
    }

    #[test]
    fn plain_library_is_not_native() {
        let lib = library(serde_json::json!({
            "name": "com.google.guava:guava:31.1-jre",
            "downloads": {
                "artifact": {
                    "path": "com/google/guava/guava/31.1-jre/guava-31.1-jre.jar",
                    "sha1": "60458f877d055d0c9114d9e1a2efb737b4bc282c",
                    "size": 2959479,
                    "url": "https://libraries.minecraft.net/com/google/guava/guava/31.1-jre/guava-31.1-jre.jar"
                }
            }
        }));

        assert!(!lib.is_native(&ctx("linux", "x64")));

        let resolved = lib.resolve(&ctx("linux", "x64"), Source::Alternate).unwrap();
        assert_eq!(
            resolved.url,
            "https://bmclapi2.bangbang93.com/maven/com/google/guava/guava/31.1-jre/guava-31.1-jre.jar"
        );
        assert_eq!(resolved.sha1.as_deref(), Some("60458f877d055d0c9114d9e1a2efb737b4bc282c"));
    }

    #[test]
    fn natives_table_selects_host_classifier() {
        let lib = library(serde_json::json!({
            "name": "org.lwjgl.lwjgl:lwjgl-platform:2.9.4",
            "natives": {"linux": "natives-linux", "windows": "natives-windows"},
            "downloads": {
                "classifiers": {
                    "natives-linux": {
                        "path": "org/lwjgl/lwjgl/lwjgl-platform/2.9.4/lwjgl-platform-2.9.4-natives-linux.jar",
                        "sha1": "931074f46c795d2f7b30ed6395df5715cfd7675b",
                        "size": 578680,
                        "url": "https://libraries.minecraft.net/org/lwjgl/lwjgl/lwjgl-platform/2.9.4/lwjgl-platform-2.9.4-natives-linux.jar"
                    }
                }
            },
            "extract": {"exclude": ["META-INF/"]}
        }));

        let resolved = lib.resolve(&ctx("linux", "x64"), Source::Primary).unwrap();
        assert!(resolved.native);
        assert!(resolved.path.ends_with("natives-linux.jar"));
        assert_eq!(resolved.extract_exclude, vec!["META-INF/"]);

        // no classifier published for osx: nothing reachable
        assert!(lib.resolve(&ctx("osx", "arm64"), Source::Primary).is_none());
    }

    #[test]
    fn bare_url_library_derives_maven_path() {
        let lib = library(serde_json::json!({
            "name": "net.fabricmc:fabric-loader:0.15.6",
            "url": "https://maven.fabricmc.net/"
        }));

        let resolved = lib.resolve(&ctx("linux", "x64"), Source::Primary).unwrap();
        assert_eq!(
            resolved.url,
            "https://maven.fabricmc.net/net/fabricmc/fabric-loader/0.15.6/fabric-loader-0.15.6.jar"
        );
        assert_eq!(resolved.path, "net/fabricmc/fabric-loader/0.15.6/fabric-loader-0.15.6.jar");
        assert!(resolved.sha1.is_none());
        assert!(!resolved.native);
    }

    #[tokio::test]
    async fn natives_extract_into_fresh_dir_without_meta_inf() {
        use crate::downloader::file_sha1;
        use crate::{AssetManager, NoProgress};
        use std::io::Write as _;

        let root = tempfile::tempdir().unwrap();
        let manager = AssetManager::with_root(root.path(), Source::Primary).unwrap();

        let jar_rel = "org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-test.jar";
        let jar_path = manager.libraries_dir().join(jar_rel);
        fs::create_dir_all(jar_path.parent().unwrap()).unwrap();

        {
            let file = fs::File::create(&jar_path).unwrap();
            let mut jar = ::zip::ZipWriter::new(file);
            let options = ::zip::write::FileOptions::default();

            jar.start_file("liblwjgl.so", options).unwrap();
            jar.write_all(b"native bits").unwrap();
            jar.start_file("META-INF/MANIFEST.MF", options).unwrap();
            jar.write_all(b"Manifest-Version: 1.0\n").unwrap();
            jar.finish().unwrap();
        }

        let sha1 = file_sha1(&jar_path).unwrap();
        let natives_key = "natives-test";

        // same classifier for every platform so the test runs anywhere;
        // the jar is pre-placed and hash-verified, so nothing is fetched
        let manifest: GameManifest = serde_json::from_str(&format!(r#"{{
            "id": "nat-test",
            "libraries": [
                {{"name": "org.lwjgl:lwjgl:3.3.1",
                  "natives": {{"linux": "{natives_key}", "osx": "{natives_key}", "windows": "{natives_key}"}},
                  "downloads": {{"classifiers": {{"{natives_key}": {{
                      "path": "{jar_rel}", "sha1": "{sha1}", "size": 1,
                      "url": "http://127.0.0.1:1/native.jar"}}}}}}}}
            ]
        }}"#)).unwrap();

        // stale content must not survive the pass
        let natives_dir = manager.natives_dir("nat-test");
        fs::create_dir_all(&natives_dir).unwrap();
        fs::write(natives_dir.join("stale.so"), b"old").unwrap();

        let report = manager.download_libraries(&manifest, "nat-test", &NoProgress).await.unwrap();

        assert_eq!(report.total, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.success, 1);

        assert!(natives_dir.join("liblwjgl.so").is_file());
        assert!(!natives_dir.join("stale.so").exists());
        assert!(!natives_dir.join("META-INF").exists());
    }

    #[test]
    fn derived_url_roots_at_alternate_library_base() {
        let lib = library(serde_json::json!({
            "name": "org.ow2.asm:asm:9.5"
        }));

        let resolved = lib.resolve(&ctx("linux", "x64"), Source::Alternate).unwrap();
        assert_eq!(
            resolved.url,
            "https://bmclapi2.bangbang93.com/maven/org/ow2/asm/asm/9.5/asm-9.5.jar"
        );
    }
}
