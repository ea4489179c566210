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

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Deserialize, Serialize)]
pub struct AssetManifest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_to_resources: Option<bool>,
    pub objects: HashMap<String, AssetObject>,
    #[serde(rename = "virtual", skip_serializing_if = "Option::is_none")]
    pub is_virtual: Option<bool>
}

#[derive(Deserialize, Serialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64
}

impl AssetObject {
    /// Content-addressed path of the object relative to `assets/objects`.
    pub fn object_path(&self) -> String {
        format!("{prefix}/{hash}", prefix = &self.hash[0..2], hash = self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_path_uses_hash_prefix() {
        let object = AssetObject {
            hash: "a1b2c3d4e5f60718293a4b5c6d7e8f9012345678".to_string(),
            size: 4096
        };

        assert_eq!(
            object.object_path(),
            "a1/a1b2c3d4e5f60718293a4b5c6d7e8f9012345678"
        );
    }
}
