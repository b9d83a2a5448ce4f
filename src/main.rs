use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use wallpaper_pass_compiler::asset_store::{self, AssetStore};
use wallpaper_pass_compiler::compiler::assembler::textures::ImageTextureImporter;
use wallpaper_pass_compiler::compiler::shader::validation::validate_glsl_with_context;
use wallpaper_pass_compiler::compiler::shader::{
    GlslcPreprocessor, PassThroughPreprocessor, ShaderStage, ShaderTranspiler, TextPreprocessor,
};
use wallpaper_pass_compiler::compiler::{CompiledScene, SceneCompiler};
use wallpaper_pass_compiler::scene;

const DEFAULT_INCLUDE_DIR: &str = "assets/shaders";
const DEFAULT_OUTPUT_DIR: &str = "out";
const SCENE_FILE: &str = "scene.json";
const OUTPUT_FILE: &str = "compiled_scene.json";

#[derive(Debug, Default, Clone)]
struct Cli {
    scene_dir: Option<PathBuf>,
    package: Option<PathBuf>,
    output: Option<PathBuf>,
    include_dir: Option<PathBuf>,
    passthrough_preprocessor: bool,
    keep_sources: bool,
    validate: bool,
}

fn parse_cli(args: &[String]) -> Result<Cli> {
    let mut cli = Cli::default();
    let mut i = 0;
    while i < args.len() {
        let value = |flag: &str| {
            args.get(i + 1)
                .map(PathBuf::from)
                .ok_or_else(|| anyhow!("missing value for {flag}"))
        };
        match args[i].as_str() {
            "--scene-dir" => {
                cli.scene_dir = Some(value("--scene-dir")?);
                i += 2;
            }
            "--package" => {
                cli.package = Some(value("--package")?);
                i += 2;
            }
            "--output" | "-o" => {
                cli.output = Some(value("--output")?);
                i += 2;
            }
            "--include-dir" => {
                cli.include_dir = Some(value("--include-dir")?);
                i += 2;
            }
            "--passthrough-preprocessor" => {
                cli.passthrough_preprocessor = true;
                i += 1;
            }
            "--keep-sources" => {
                cli.keep_sources = true;
                i += 1;
            }
            "--validate" => {
                cli.validate = true;
                i += 1;
            }
            other => {
                return Err(anyhow!(
                    "unknown argument: {other} (supported: --scene-dir <dir>, --package <zip>, --output <dir>, --include-dir <dir>, --passthrough-preprocessor, --keep-sources, --validate)"
                ));
            }
        }
    }
    if cli.scene_dir.is_none() && cli.package.is_none() {
        return Err(anyhow!("one of --scene-dir or --package is required"));
    }
    Ok(cli)
}

fn open_assets(cli: &Cli) -> Result<AssetStore> {
    match (&cli.package, &cli.scene_dir) {
        (Some(package), fallback) => asset_store::load_from_zip(package, fallback.as_deref()),
        (None, Some(dir)) => Ok(AssetStore::with_root(dir)),
        (None, None) => Err(anyhow!("no scene source given")),
    }
}

fn write_shader_sources(compiled: &CompiledScene, output_dir: &Path) -> Result<()> {
    for shader in &compiled.shaders {
        for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
            let path = output_dir.join(format!("shader{}_{stage}.glsl", shader.id));
            std::fs::write(&path, shader.shader.text(stage))
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
    }
    Ok(())
}

/// Returns the number of stages naga rejected.
fn validate_shaders(compiled: &CompiledScene) -> usize {
    let mut failures = 0;
    for shader in &compiled.shaders {
        for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
            let context = format!("shader {} '{}' {stage}", shader.id, shader.name);
            if let Err(e) = validate_glsl_with_context(shader.shader.text(stage), stage, &context) {
                eprintln!("[validate] {e:#}");
                failures += 1;
            }
        }
    }
    failures
}

fn run(cli: Cli) -> Result<()> {
    let store = open_assets(&cli)?;
    let scene = scene::load_scene(&store, SCENE_FILE)?;
    println!(
        "[scene] {} objects, {} images",
        scene.objects.len(),
        scene.image_objects().count()
    );

    let preprocessor: Box<dyn TextPreprocessor> = if cli.passthrough_preprocessor {
        Box::new(PassThroughPreprocessor)
    } else {
        let include_dir = cli
            .include_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INCLUDE_DIR));
        Box::new(GlslcPreprocessor::new(include_dir))
    };
    let compiler = SceneCompiler::new(
        Box::new(store.clone()),
        Box::new(ImageTextureImporter::new(store)),
        ShaderTranspiler::new(preprocessor),
    );
    let compiled = compiler.compile(&scene);
    for warning in compiled.diagnostics.warnings() {
        eprintln!("[warning] {warning}");
    }

    let output_dir = cli
        .output
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let json = serde_json::to_string_pretty(&compiled).context("failed to serialize compiled scene")?;
    let out_path = output_dir.join(OUTPUT_FILE);
    std::fs::write(&out_path, json).with_context(|| format!("failed to write {}", out_path.display()))?;
    if cli.keep_sources {
        write_shader_sources(&compiled, &output_dir)?;
    }
    println!(
        "[compile] saved: {} ({} passes, {} shaders, {} textures, {} warnings)",
        out_path.display(),
        compiled.passes.len(),
        compiled.shaders.len(),
        compiled.textures.len(),
        compiled.diagnostics.len()
    );

    if cli.validate {
        let failures = validate_shaders(&compiled);
        if failures > 0 {
            return Err(anyhow!("{failures} shader stages failed validation"));
        }
        println!("[validate] {} shaders ok", compiled.shaders.len());
    }
    Ok(())
}

fn main() -> Result<()> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli(&argv)?;
    run(cli)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_cli_scene_dir_and_flags() {
        let cli = parse_cli(&args(&[
            "--scene-dir",
            "wallpaper",
            "--output",
            "out",
            "--passthrough-preprocessor",
            "--keep-sources",
        ]))
        .unwrap();
        assert_eq!(cli.scene_dir.as_ref().unwrap(), &PathBuf::from("wallpaper"));
        assert_eq!(cli.output.as_ref().unwrap(), &PathBuf::from("out"));
        assert!(cli.passthrough_preprocessor);
        assert!(cli.keep_sources);
        assert!(!cli.validate);
    }

    #[test]
    fn parse_cli_requires_a_source() {
        assert!(parse_cli(&args(&["--validate"])).is_err());
        assert!(parse_cli(&args(&["--package"])).is_err());
        assert!(parse_cli(&args(&["--package", "w.zip", "--bogus"])).is_err());
    }
}
