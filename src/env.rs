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

use std::env;
use std::path::PathBuf;

pub fn set_data_dir(path: &str) {
    env::set_var("ALEX_DATA_HOME", path)
}

pub fn get_data_dir() -> PathBuf {
    // get data directory resolve order:
    // $ALEX_DATA_HOME, $XDG_DATA_HOME/alex, $HOME/.local/share/alex
    match env::var("ALEX_DATA_HOME") {
        Ok(var) => PathBuf::from(var),
        Err(_) => {
            let base_data_dir = match env::var("XDG_DATA_HOME") {
                Ok(var) => PathBuf::from(var),
                Err(_) => {
                    let home_dir = env::var("HOME")
                        .expect("HOME env var not found");

                    PathBuf::from(home_dir).join(".local").join("share")
                }
            };

            base_data_dir.join(get_package_name())
        }
    }
}

pub fn get_host_os() -> &'static str {
    match env::consts::OS {
        // mojang json files uses "osx" instead of "macos" for os name
        "macos" => "osx",
        os => os
    }
}

pub fn get_host_arch() -> &'static str {
    match env::consts::ARCH {
        // mojang json files use "x64"/"x86"/"arm64" arch names
        "x86_64" => "x64",
        "aarch64" => "arm64",
        arch => arch
    }
}

/// Natives classifier templates use `${arch}` for the pointer width.
pub fn get_arch_bits() -> &'static str {
    if cfg!(target_pointer_width = "64") { "64" } else { "32" }
}

pub fn get_package_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}

pub fn get_package_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
