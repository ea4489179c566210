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
use std::{fs, path::Path};

use crate::json::{GameArgs, GameArgsIndex, GameManifest};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoaderKind {
    Forge,
    Fabric
}

/// Merge a mod loader overlay fragment into a base descriptor.
///
/// The field policy is the one both known loaders need: the overlay's main
/// class replaces, overlay libraries are appended after the base's,
/// argument arrays concatenate, and the legacy `minecraft_arguments` string
/// is copied only when neither side uses the new schema. The loader's
/// version is recorded in a side-channel field so later passes can tell a
/// merged descriptor from a vanilla one.
pub fn merge_manifests(
    base: &GameManifest,
    overlay: &GameManifest,
    loader: LoaderKind,
    loader_version: &str
) -> GameManifest {
    let mut merged = base.clone();

    if overlay.main_class.is_some() {
        merged.main_class = overlay.main_class.clone();
    }

    merged.libraries.extend(overlay.libraries.iter().cloned());

    if base.arguments.is_some() || overlay.arguments.is_some() {
        merged.arguments = Some(concat_arguments(
            base.arguments.as_ref(),
            overlay.arguments.as_ref()
        ));
    } else if let Some(minecraft_arguments) = &overlay.minecraft_arguments {
        merged.minecraft_arguments = Some(minecraft_arguments.clone());
    }

    if overlay.inherits_from.is_some() {
        merged.inherits_from = overlay.inherits_from.clone();
    }

    if overlay.jar.is_some() {
        merged.jar = overlay.jar.clone();
    }

    match loader {
        LoaderKind::Forge => merged.forge_version = Some(loader_version.to_string()),
        LoaderKind::Fabric => merged.fabric_version = Some(loader_version.to_string())
    }

    merged
}

fn concat_arguments(base: Option<&GameArgsIndex>, overlay: Option<&GameArgsIndex>) -> GameArgsIndex {
    let concat = |base: Option<&GameArgs>, overlay: Option<&GameArgs>| {
        let mut args = base.map(|a| a.0.clone()).unwrap_or_default();
        args.extend(overlay.map(|a| a.0.clone()).unwrap_or_default());
        GameArgs(args)
    };

    GameArgsIndex {
        jvm: Some(concat(
            base.and_then(|a| a.jvm.as_ref()),
            overlay.and_then(|a| a.jvm.as_ref())
        )),
        game: Some(concat(
            base.and_then(|a| a.game.as_ref()),
            overlay.and_then(|a| a.game.as_ref())
        ))
    }
}

/// Write a descriptor atomically: temp file in the same directory, then
/// rename over the target.
pub(crate) fn write_manifest(path: &Path, manifest: &GameManifest) -> Result<()> {
    let temp_path = path.with_extension("json.tmp");

    fs::write(&temp_path, serde_json::to_string_pretty(manifest)?)?;
    fs::rename(&temp_path, path)?;

    Ok(())
}
