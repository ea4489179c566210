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

/// Upstream selection for every download category.
///
/// `Primary` is the canonical Mojang infrastructure, `Alternate` is the
/// BMCLAPI mirror which republishes the same URL space under a single host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Source {
    #[default]
    Primary,
    Alternate
}

const MOJANG_MANIFEST_URL: &str = "https://launchermeta.mojang.com/mc/game/version_manifest.json";
const BMCLAPI_MANIFEST_URL: &str = "https://bmclapi2.bangbang93.com/mc/game/version_manifest.json";

const MOJANG_RESOURCES: &str = "https://resources.download.minecraft.net";
const BMCLAPI_RESOURCES: &str = "https://bmclapi2.bangbang93.com/assets";

const MOJANG_LIBRARIES: &str = "https://libraries.minecraft.net";
const BMCLAPI_LIBRARIES: &str = "https://bmclapi2.bangbang93.com/maven";

const FORGE_MAVEN: &str = "https://files.minecraftforge.net/maven";

impl Source {
    pub fn manifest_url(&self) -> &'static str {
        match self {
            Source::Primary => MOJANG_MANIFEST_URL,
            Source::Alternate => BMCLAPI_MANIFEST_URL
        }
    }

    pub fn resource_base(&self) -> &'static str {
        match self {
            Source::Primary => MOJANG_RESOURCES,
            Source::Alternate => BMCLAPI_RESOURCES
        }
    }

    pub fn library_base(&self) -> &'static str {
        match self {
            Source::Primary => MOJANG_LIBRARIES,
            Source::Alternate => BMCLAPI_LIBRARIES
        }
    }

    pub fn forge_maven_base(&self) -> &'static str {
        match self {
            Source::Primary => FORGE_MAVEN,
            Source::Alternate => BMCLAPI_LIBRARIES
        }
    }

    /// Rewrite a canonical upstream URL for this source.
    ///
    /// The substitution is stateless and total: hosts outside the known
    /// Mojang URL space pass through unchanged.
    pub fn reroute(&self, url: &str) -> String {
        match self {
            Source::Primary => url.to_string(),
            Source::Alternate => url
                .replace("https://launchermeta.mojang.com", "https://bmclapi2.bangbang93.com")
                .replace("https://piston-meta.mojang.com", "https://bmclapi2.bangbang93.com")
                .replace("https://piston-data.mojang.com", "https://bmclapi2.bangbang93.com")
                .replace("https://launcher.mojang.com", "https://bmclapi2.bangbang93.com")
                .replace(MOJANG_RESOURCES, BMCLAPI_RESOURCES)
                .replace(MOJANG_LIBRARIES, BMCLAPI_LIBRARIES)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Source;

    #[test]
    fn primary_passes_through() {
        let url = "https://launchermeta.mojang.com/mc/game/version_manifest.json";
        assert_eq!(Source::Primary.reroute(url), url);
    }

    #[test]
    fn alternate_rewrites_resources() {
        let url = "https://resources.download.minecraft.net/a1/a1b2c3";
        assert_eq!(
            Source::Alternate.reroute(url),
            "https://bmclapi2.bangbang93.com/assets/a1/a1b2c3"
        );
    }

    #[test]
    fn alternate_rewrites_libraries() {
        let url = "https://libraries.minecraft.net/org/ow2/asm/asm/9.5/asm-9.5.jar";
        assert_eq!(
            Source::Alternate.reroute(url),
            "https://bmclapi2.bangbang93.com/maven/org/ow2/asm/asm/9.5/asm-9.5.jar"
        );
    }

    #[test]
    fn alternate_rewrites_version_metadata() {
        let url = "https://piston-meta.mojang.com/v1/packages/abc/1.20.1.json";
        assert_eq!(
            Source::Alternate.reroute(url),
            "https://bmclapi2.bangbang93.com/v1/packages/abc/1.20.1.json"
        );
    }

    #[test]
    fn alternate_leaves_unknown_hosts() {
        let url = "https://maven.fabricmc.net/net/fabricmc/fabric-loader/0.15.6/fabric-loader-0.15.6.jar";
        assert_eq!(Source::Alternate.reroute(url), url);
    }
}
