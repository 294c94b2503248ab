use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

use render_datagen::Generator;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;

    let mut generator = Generator::new(&options.scene, options.width, options.height)?;
    generator.load_cameras(&options.cameras)?;
    generator.load_lights(&options.lights)?;
    generator.load_checkpoints(&options.checkpoints)?;
    if let Some(materials) = &options.materials {
        generator.load_material_overrides(materials)?;
    }

    fs::create_dir_all(&options.out_dir)?;
    let saved = generator.generate(&options.out_dir)?;
    println!(
        "Saved {saved} image(s) for {} camera(s) to {}",
        generator.cameras().len(),
        options.out_dir.display()
    );
    Ok(())
}

struct CliOptions {
    scene: PathBuf,
    cameras: PathBuf,
    lights: PathBuf,
    checkpoints: PathBuf,
    materials: Option<PathBuf>,
    out_dir: PathBuf,
    width: u32,
    height: u32,
}

const USAGE: &str = "Usage: render-datagen <scene> --cameras <xml> --lights <xml> --spp <xml> \
                     [--materials <xml>] [--out <dir>] [--width <px>] [--height <px>]";

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut args = env::args().skip(1);
        let Some(scene) = args.next() else {
            return Err(anyhow!(USAGE));
        };

        let mut cameras = None;
        let mut lights = None;
        let mut checkpoints = None;
        let mut materials = None;
        let mut out_dir = PathBuf::from(".");
        let mut width = 512u32;
        let mut height = 512u32;

        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| anyhow!("{flag} expects a value. {USAGE}"))
            };
            match arg.as_str() {
                "--cameras" => cameras = Some(PathBuf::from(value("--cameras")?)),
                "--lights" => lights = Some(PathBuf::from(value("--lights")?)),
                "--spp" => checkpoints = Some(PathBuf::from(value("--spp")?)),
                "--materials" => materials = Some(PathBuf::from(value("--materials")?)),
                "--out" => out_dir = PathBuf::from(value("--out")?),
                "--width" => width = value("--width")?.parse()?,
                "--height" => height = value("--height")?.parse()?,
                other => return Err(anyhow!("Unknown argument: {other}. {USAGE}")),
            }
        }

        Ok(Self {
            scene: PathBuf::from(scene),
            cameras: cameras.ok_or_else(|| anyhow!("--cameras is required. {USAGE}"))?,
            lights: lights.ok_or_else(|| anyhow!("--lights is required. {USAGE}"))?,
            checkpoints: checkpoints.ok_or_else(|| anyhow!("--spp is required. {USAGE}"))?,
            materials,
            out_dir,
            width,
            height,
        })
    }
}
