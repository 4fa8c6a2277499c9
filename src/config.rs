use anyhow::{Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub(crate) const MIN_LINES: usize = 20;
pub(crate) const MAX_LINES: usize = 200;
pub(crate) const MIN_FPS: u32 = 10;
pub(crate) const MAX_FPS: u32 = 120;

#[derive(Parser, Debug, Clone)]
#[command(name = "flowlines")]
#[command(about = "Noise-steered flow lines on a braille canvas")]
pub(crate) struct Cli {
    /// Field seed. 0 (the default) draws a fresh one per run.
    #[arg(long)]
    pub(crate) seed: Option<u64>,

    /// Number of flow lines (20-200)
    #[arg(long)]
    pub(crate) lines: Option<usize>,

    /// Frame rate cap (10-120)
    #[arg(long)]
    pub(crate) fps: Option<u32>,

    /// Force monochrome (no colors)
    #[arg(long, default_value_t = false)]
    pub(crate) mono: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct Settings {
    pub(crate) fps_cap: u32,
    pub(crate) enable_color: bool,
    pub(crate) show_title: bool,
    pub(crate) line_count: usize,
    pub(crate) seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fps_cap: 60,
            enable_color: true,
            show_title: true,
            line_count: 60,
            seed: 0,
        }
    }
}

impl Settings {
    /// Command-line flags win over whatever was persisted.
    pub(crate) fn apply_cli(&mut self, cli: &Cli) {
        if let Some(seed) = cli.seed {
            self.seed = seed;
        }
        if let Some(lines) = cli.lines {
            self.line_count = lines.clamp(MIN_LINES, MAX_LINES);
        }
        if let Some(fps) = cli.fps {
            self.fps_cap = fps.clamp(MIN_FPS, MAX_FPS);
        }
        if cli.mono {
            self.enable_color = false;
        }
    }
}

pub(crate) struct Paths {
    pub(crate) settings_path: PathBuf,
}

pub(crate) fn project_paths() -> Result<Paths> {
    let proj = ProjectDirs::from("com", "flowlines", "Flowlines")
        .context("could not resolve project directories")?;
    let dir = proj.data_local_dir().to_path_buf();
    fs::create_dir_all(&dir).ok();
    Ok(Paths {
        settings_path: dir.join("settings.json"),
    })
}

pub(crate) fn load_settings(path: &Path) -> Settings {
    if let Ok(s) = fs::read_to_string(path) {
        if let Ok(v) = serde_json::from_str::<Settings>(&s) {
            return v;
        }
    }
    Settings::default()
}

pub(crate) fn save_settings_atomic(path: &Path, s: &Settings) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(s)?;
    fs::write(&tmp, data)?;
    atomic_rename(&tmp, path)?;
    Ok(())
}

pub(crate) fn atomic_rename(from: &Path, to: &Path) -> Result<()> {
    // Best-effort atomic replace on same filesystem.
    if to.exists() {
        let _ = fs::remove_file(to);
    }
    fs::rename(from, to)?;
    Ok(())
}
