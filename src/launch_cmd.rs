use anyhow::{bail, Result};
use log::info;
use std::{
    collections::{HashMap, HashSet}, fs, path::PathBuf,
    process::{Child, Command}
};

use crate::asset_manager::AssetManager;
use crate::json::{name_to_path, GameArg, GameArgs, GameManifest};
use crate::rules::{rules_allow, RulesContext};
use crate::{env, Error, NoProgress};

const CLASSPATH_DELIMITER: &str = if cfg!(windows) { ";" } else { ":" };

/// Per-invocation launch inputs. Optional identity and window fields that
/// are left unset simply drop the matching game arguments.
#[derive(Default)]
pub struct LaunchParameters {
    pub version_name: String,
    /// Working directory of the game process; the process inherits the
    /// current directory when unset.
    pub game_directory: Option<PathBuf>,
    /// Java binary, or "java" from the search path.
    pub java_path: Option<PathBuf>,
    pub identity: Identity,
    pub window: Window,
    pub memory: Memory,
    /// Emitted ahead of the descriptor's JVM arguments so they can
    /// override defaults.
    pub custom_jvm_args: Vec<String>,
    /// Appended after the descriptor's game arguments.
    pub custom_game_args: Vec<String>,
    pub quick_play: QuickPlay,
    pub demo: bool,
    /// Free-form placeholder overrides, consulted after the built-in
    /// table and the parameter aliases.
    pub extra: HashMap<String, String>
}

impl LaunchParameters {
    pub fn new(version_name: &str) -> Self {
        LaunchParameters {
            version_name: version_name.to_string(),
            ..Default::default()
        }
    }
}

pub struct Identity {
    pub username: String,
    pub uuid: String,
    pub access_token: String,
    pub user_type: String,
    pub client_id: Option<String>,
    pub xuid: Option<String>
}

impl Default for Identity {
    fn default() -> Self {
        Identity {
            username: String::new(),
            uuid: String::new(),
            access_token: String::new(),
            user_type: "msa".to_string(),
            client_id: None,
            xuid: None
        }
    }
}

#[derive(Default)]
pub struct Window {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fullscreen: bool
}

#[derive(Default)]
pub struct Memory {
    pub min_mb: Option<u32>,
    pub max_mb: Option<u32>
}

#[derive(Default)]
pub struct QuickPlay {
    pub path: Option<String>,
    pub singleplayer: Option<String>,
    pub multiplayer: Option<String>,
    pub realms: Option<String>
}

#[derive(Debug)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    game_directory: PathBuf
}

impl LaunchCommand {
    pub fn spawn(&self) -> Result<Child> {
        fs::create_dir_all(&self.game_directory)?;

        let child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.game_directory)
            .spawn()
            .map_err(|error| Error::Launch(
                format!("failed to spawn '{program}': {error}", program = self.program.display())
            ))?;

        info!("Spawned game process {pid}", pid = child.id());

        Ok(child)
    }
}

impl AssetManager {
    /// Compose the launch command of an installed version without
    /// spawning it.
    pub fn generate_command(&self, params: &LaunchParameters) -> Result<LaunchCommand> {
        let version_name = &params.version_name;
        let descriptor_path = self.version_json_path(version_name);

        if !descriptor_path.is_file() {
            bail!(Error::Launch(format!("version '{version_name}' is not installed")));
        }

        let manifest: GameManifest = serde_json::from_str(&fs::read_to_string(descriptor_path)?)?;

        let ctx = rules_context(params);

        let game_directory = match &params.game_directory {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?
        };

        let values = self.placeholder_values(params, &manifest, &game_directory);

        // the classpath placeholder only ever resolves inside JVM args
        let mut jvm_values = values.clone();
        jvm_values.insert(
            "classpath".to_string(),
            self.build_classpath(&manifest, version_name, &ctx)
        );

        let mut jvm_tokens: Vec<String> = params.custom_jvm_args.clone();

        match manifest.arguments.as_ref().and_then(|a| a.jvm.as_ref()) {
            Some(args) => jvm_tokens.extend(evaluate_args(args, &ctx)),
            // legacy descriptors leave the JVM side entirely to the launcher
            None => jvm_tokens.extend([
                "-Djava.library.path=${natives_directory}".to_string(),
                "-cp".to_string(),
                "${classpath}".to_string()
            ])
        }

        if let Some(min_mb) = params.memory.min_mb {
            jvm_tokens.push(format!("-Xmn{min_mb}m"));
        }
        if let Some(max_mb) = params.memory.max_mb {
            jvm_tokens.push(format!("-Xmx{max_mb}m"));
        }

        let main_class = manifest.main_class.clone()
            .ok_or(Error::Launch(format!("version '{version_name}' has no main class")))?;

        let mut game_tokens: Vec<String> = Vec::new();

        if let Some(args) = manifest.arguments.as_ref().and_then(|a| a.game.as_ref()) {
            game_tokens.extend(evaluate_args(args, &ctx));
        } else if let Some(legacy) = &manifest.minecraft_arguments {
            game_tokens.extend(legacy.split(' ').map(String::from));
        }

        game_tokens.extend(params.custom_game_args.iter().cloned());

        if params.window.fullscreen {
            game_tokens.push("--fullscreen".to_string());
        }

        let mut args = substitute_tokens(&jvm_tokens, &jvm_values);
        args.push(main_class);
        args.extend(substitute_tokens(&game_tokens, &values));

        Ok(LaunchCommand {
            program: params.java_path.clone().unwrap_or_else(|| PathBuf::from("java")),
            args,
            game_directory
        })
    }

    /// Compose the launch command and spawn the game process with its
    /// working directory set to the game directory.
    pub fn launch(&self, params: &LaunchParameters) -> Result<Child> {
        let jar_path = self.version_jar_path(&params.version_name);

        if !jar_path.is_file() {
            bail!(Error::Launch(
                format!("main jar '{jar}' is missing", jar = jar_path.display())
            ));
        }

        let command = self.generate_command(params)?;

        // pre-1.7 versions read assets from logical paths, not the
        // object store
        let game_directory = match &params.game_directory {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?
        };
        self.prepare_legacy_assets(&params.version_name, &game_directory, &NoProgress)?;

        command.spawn()
    }

    fn placeholder_values(
        &self,
        params: &LaunchParameters,
        manifest: &GameManifest,
        game_directory: &std::path::Path
    ) -> HashMap<String, String> {
        let mut values = HashMap::new();

        // empty strings count as unresolved, so they never enter the table
        let mut put = |key: &str, value: String| {
            if !value.is_empty() {
                values.insert(key.to_string(), value);
            }
        };

        put("natives_directory", self.natives_dir(&params.version_name).to_string_lossy().to_string());
        put("launcher_name", env::get_package_name().to_string());
        put("launcher_version", env::get_package_version().to_string());

        put("version_name", params.version_name.clone());
        put("version_type", manifest.release_type.clone().unwrap_or("release".to_string()));
        put("game_directory", game_directory.to_string_lossy().to_string());
        put("assets_root", self.assets_dir().to_string_lossy().to_string());

        let asset_index_id = manifest.asset_index.as_ref()
            .map(|index| index.id.clone())
            .or_else(|| manifest.assets.clone());
        put("assets_index_name", asset_index_id.unwrap_or_default());

        if let Some(game_assets) = self.legacy_assets_dir(manifest, game_directory) {
            put("game_assets", game_assets.to_string_lossy().to_string());
        }

        put("auth_player_name", params.identity.username.clone());
        put("auth_uuid", params.identity.uuid.clone());
        put("auth_access_token", params.identity.access_token.clone());
        put("user_type", params.identity.user_type.clone());
        put("clientid", params.identity.client_id.clone().unwrap_or_default());
        put("auth_xuid", params.identity.xuid.clone().unwrap_or_default());

        // legacy versions refuse to start without a user_properties object
        put("user_properties", "{}".to_string());

        if let Some(width) = params.window.width {
            put("resolution_width", width.to_string());
        }
        if let Some(height) = params.window.height {
            put("resolution_height", height.to_string());
        }

        put("quickPlayPath", params.quick_play.path.clone().unwrap_or_default());
        put("quickPlaySingleplayer", params.quick_play.singleplayer.clone().unwrap_or_default());
        put("quickPlayMultiplayer", params.quick_play.multiplayer.clone().unwrap_or_default());
        put("quickPlayRealms", params.quick_play.realms.clone().unwrap_or_default());

        for (key, value) in &params.extra {
            if !value.is_empty() {
                values.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        values
    }

    /// Classpath in library declaration order with the main JAR last,
    /// stable across runs for a given descriptor.
    fn build_classpath(
        &self,
        manifest: &GameManifest,
        version_name: &str,
        ctx: &RulesContext
    ) -> String {
        let libraries_dir = self.libraries_dir();

        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for library in &manifest.libraries {
            if !library.applies(ctx) || library.is_native(ctx) {
                continue;
            }

            let path = match library.downloads.as_ref().and_then(|d| d.artifact.as_ref()) {
                Some(artifact) => artifact.path.clone(),
                None => match name_to_path(&library.name) {
                    Ok(path) => path,
                    Err(_) => continue
                }
            };

            // merged descriptors may list a library twice, first wins
            if seen.insert(path.clone()) {
                entries.push(libraries_dir.join(path).to_string_lossy().to_string());
            }
        }

        entries.push(self.version_jar_path(version_name).to_string_lossy().to_string());

        entries.join(CLASSPATH_DELIMITER)
    }
}

fn rules_context(params: &LaunchParameters) -> RulesContext {
    let mut ctx = RulesContext::host();

    ctx.features.insert(
        "has_custom_resolution",
        params.window.width.is_some() && params.window.height.is_some()
    );
    ctx.features.insert("is_demo_user", params.demo);
    ctx.features.insert("has_quick_plays_support", params.quick_play.path.is_some());
    ctx.features.insert("is_quick_play_singleplayer", params.quick_play.singleplayer.is_some());
    ctx.features.insert("is_quick_play_multiplayer", params.quick_play.multiplayer.is_some());
    ctx.features.insert("is_quick_play_realms", params.quick_play.realms.is_some());

    ctx
}

/// Flatten an argument array to raw tokens, keeping gated entries whose
/// rules allow on this platform and feature set.
fn evaluate_args(args: &GameArgs, ctx: &RulesContext) -> Vec<String> {
    args.0.iter()
        .flat_map(|arg| match arg {
            GameArg::Plain(value) => vec![value.clone()],
            GameArg::Gated { rules, value } => {
                if rules_allow(rules, ctx) {
                    value.to_vec()
                } else {
                    vec![]
                }
            }
        })
        .collect()
}

/// Substitute `${name}` placeholders and drop every token that still
/// contains one afterwards. A flag immediately preceding a dropped value
/// is dropped with it, so `--flag value` pairs are all-or-nothing.
fn substitute_tokens(tokens: &[String], values: &HashMap<String, String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut flag_emitted_at: Option<usize> = None;

    for token in tokens {
        let expanded = shellexpand::env_with_context_no_errors(
            token,
            |var: &str| values.get(var)
        ).to_string();

        if expanded.contains("${") {
            if let Some(index) = flag_emitted_at.take() {
                out.truncate(index);
            }
            continue;
        }

        flag_emitted_at = expanded.starts_with('-').then_some(out.len());
        out.push(expanded);
    }

    out
}
