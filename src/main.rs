mod cli;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use shiftfile_av::{Converter, ToolRegistry, Upload};
use shiftfile_core::config::Config;
use shiftfile_core::params::{
    FIELD_BITRATE, FIELD_FADE_IN, FIELD_FADE_OUT, FIELD_FORMAT, FIELD_MONO, FIELD_NORMALIZE, FIELD_SPEED,
    FIELD_VOLUME,
};
use shiftfile_core::supported_formats;

/// Effect and target options for `convert`, gathered as upload form fields.
struct ConvertArgs {
    file: PathBuf,
    output: Option<PathBuf>,
    content_type: Option<String>,
    fields: HashMap<String, String>,
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "shiftfile=debug,shiftfile_av=debug,shiftfile_core=debug".to_string()
        } else {
            "shiftfile=info,shiftfile_av=warn,shiftfile_core=warn".to_string()
        }
    });

    // Logs go to stderr so stdout stays clean for `--json` and paths.
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Convert {
            file,
            format,
            output,
            content_type,
            volume,
            speed,
            fade_in,
            fade_out,
            normalize,
            mono,
            bitrate,
            json,
        } => {
            let mut fields = HashMap::from([(FIELD_FORMAT.to_string(), format)]);
            for (name, value) in [
                (FIELD_VOLUME, volume),
                (FIELD_SPEED, speed),
                (FIELD_FADE_IN, fade_in),
                (FIELD_FADE_OUT, fade_out),
                (FIELD_BITRATE, bitrate),
            ] {
                if let Some(value) = value {
                    fields.insert(name.to_string(), value);
                }
            }
            for (name, on) in [(FIELD_NORMALIZE, normalize), (FIELD_MONO, mono)] {
                if on {
                    fields.insert(name.to_string(), "true".to_string());
                }
            }

            let args = ConvertArgs {
                file,
                output,
                content_type,
                fields,
                json,
            };
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert_file(args, cli.config.as_deref()))
        }
        Commands::Formats { json } => list_formats(json),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
    }
}

async fn convert_file(args: ConvertArgs, config_path: Option<&Path>) -> Result<()> {
    if !args.file.exists() {
        anyhow::bail!("Input file does not exist: {}", args.file.display());
    }

    let config = Config::load_or_default(config_path);
    let tools = ToolRegistry::discover(&config.tools);
    let converter = Converter::new(config, tools);

    let file_name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut upload = Upload::new(&args.file, file_name);
    upload.content_type = args.content_type;
    upload.fields = args.fields;

    let result = match converter.convert_upload(&upload).await {
        Ok(result) => result,
        Err(e) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&e.to_body())?);
            }
            anyhow::bail!("{e} [{}]", e.kind());
        }
    };
    let download_name = result.download_name().to_string();
    let target = result.target();

    let dest = match args.output {
        Some(path) => path,
        None => args
            .file
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&download_name),
    };

    let saved = result
        .persist(&dest)
        .with_context(|| format!("failed to save {}", dest.display()))?;

    if args.json {
        let summary = serde_json::json!({
            "path": saved,
            "download_name": download_name,
            "target": target,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", saved.display());
    }
    Ok(())
}

fn list_formats(json: bool) -> Result<()> {
    let formats = supported_formats();
    if json {
        println!("{}", serde_json::to_string_pretty(&formats)?);
    } else {
        println!("Image: {}", formats.image.join(", "));
        println!("Audio: {}", formats.audio.join(", "));
    }
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = Config::load_or_default(config_path);
    let registry = ToolRegistry::discover(&config.tools);

    for tool in registry.check_all() {
        let status = if tool.available { "✓" } else { "✗" };
        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }
        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }
        println!();
    }

    println!();
    if registry.is_complete() {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Image conversion still works; audio conversion needs ffmpeg and ffprobe.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let contents =
                std::fs::read_to_string(p).with_context(|| format!("failed to read {}", p.display()))?;
            let config = Config::from_json(&contents).with_context(|| format!("invalid config {}", p.display()))?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Scratch dir: {}", config.scratch.dir.display());
    println!("  Tool timeout: {}s", config.tools.timeout_secs);
    println!("  Max image dimension: {}", config.image.max_dimension);
    println!("  Default bitrate: {}k", config.audio.default_bitrate_kbps);

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for w in &warnings {
            println!("  - {w}");
        }
    }

    Ok(())
}
