mod app;
mod config;
mod driver;
mod field;
mod input;
mod noise;
mod render;

use anyhow::Result;

fn main() -> Result<()> {
    app::run()
}
