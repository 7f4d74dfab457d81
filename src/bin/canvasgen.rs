//! CLI for canvasgen - image generation, editing and variation via the OpenAI Images API.

use canvasgen::canvas::{self, CanvasSize};
use canvasgen::image::read_image_file;
use canvasgen::persist::DEFAULT_DESTINATION;
use canvasgen::{
    CanvasGenError, ImageBatch, ImageProvider, ImageProviderExt, ImageRequest, ImageSize,
    OpenAiImageModel, OpenAiImageProvider, Operation, ProviderConfig, ResultPersister,
};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "canvasgen")]
#[command(about = "Generate, edit and vary images with DALL-E, and fit local images onto a fixed canvas")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an image from a text prompt
    Generate(GenerateArgs),

    /// Repaint the transparent area of a mask over an image
    Edit(EditArgs),

    /// Create variations of an image
    Variation(VariationArgs),

    /// Shrink an image to fit a canvas and center it on a white background
    Normalize(NormalizeArgs),

    /// Check that the configured API key is accepted
    Check,
}

#[derive(Args)]
struct RequestArgs {
    /// Folder results are written to
    #[arg(short, long, env = "CANVASGEN_OUT", default_value = DEFAULT_DESTINATION)]
    out: PathBuf,

    /// Output size (256x256, 512x512, 1024x1024, 1792x1024, 1024x1792)
    #[arg(short, long, default_value = "1024x1024")]
    size: ImageSize,

    /// Number of images to request
    #[arg(short = 'n', long, default_value_t = 1)]
    count: u8,

    /// Model (dall-e-2 or dall-e-3), overrides CANVASGEN_MODEL
    #[arg(short, long)]
    model: Option<OpenAiImageModel>,

    /// Retries on rate limits and server errors, overrides CANVASGEN_MAX_RETRIES
    #[arg(long)]
    retries: Option<u32>,

    /// Save every returned image instead of only the first
    #[arg(long)]
    all: bool,
}

#[derive(Args)]
struct GenerateArgs {
    /// The text prompt describing the image
    prompt: String,

    #[command(flatten)]
    request: RequestArgs,
}

#[derive(Args)]
struct EditArgs {
    /// The text prompt describing the full edited image
    prompt: String,

    /// Image to edit
    #[arg(short, long)]
    image: PathBuf,

    /// Mask whose transparent pixels mark the area to repaint
    #[arg(long)]
    mask: PathBuf,

    /// Fit image and mask onto a canvas of the output size before sending
    #[arg(long)]
    normalize: bool,

    #[command(flatten)]
    request: RequestArgs,
}

#[derive(Args)]
struct VariationArgs {
    /// Image to create variations of
    #[arg(short, long)]
    image: PathBuf,

    /// Fit the image onto a canvas of the output size before sending
    #[arg(long)]
    normalize: bool,

    #[command(flatten)]
    request: RequestArgs,
}

#[derive(Args)]
struct NormalizeArgs {
    /// Image to normalize
    input: PathBuf,

    /// Where to write the result (defaults to overwriting the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Canvas size as WIDTHxHEIGHT
    #[arg(short, long, default_value = "256x256")]
    canvas: CanvasSize,
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional; real environment variables win
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let json_output = cli.json;

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report_error(&err, json_output),
    }
}

fn init_tracing(verbose: u8) {
    let default_directive = match verbose {
        0 => "canvasgen=warn",
        1 => "canvasgen=debug",
        _ => "canvasgen=trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate(args) => {
            let request = ImageRequest::generate(&args.prompt);
            run_operation(Operation::Generate, request, &args.request, cli.json).await
        }
        Commands::Edit(args) => {
            let mut source = read_image_file(&args.image)?;
            let mut mask = read_image_file(&args.mask)?;
            if args.normalize {
                let target = CanvasSize::from(args.request.size);
                source = canvas::normalize_bytes(&source, target)?;
                mask = canvas::normalize_bytes(&mask, target)?;
            }
            let request = ImageRequest::edit(source, mask, &args.prompt);
            run_operation(Operation::Edit, request, &args.request, cli.json).await
        }
        Commands::Variation(args) => {
            let mut source = read_image_file(&args.image)?;
            if args.normalize {
                source = canvas::normalize_bytes(&source, CanvasSize::from(args.request.size))?;
            }
            let request = ImageRequest::variation(source);
            run_operation(Operation::Variation, request, &args.request, cli.json).await
        }
        Commands::Normalize(args) => normalize(args, cli.json),
        Commands::Check => check(cli.json).await,
    }
}

fn provider_config(args: Option<&RequestArgs>) -> anyhow::Result<ProviderConfig> {
    let mut config = ProviderConfig::from_env()?;
    if let Some(args) = args {
        if let Some(model) = args.model {
            config.model = model;
        }
        if let Some(retries) = args.retries {
            config.max_retries = retries;
        }
    }
    Ok(config)
}

async fn run_operation(
    operation: Operation,
    request: ImageRequest,
    args: &RequestArgs,
    json_output: bool,
) -> anyhow::Result<()> {
    let request = request.with_size(args.size).with_count(args.count);
    let config = provider_config(Some(args))?;
    let max_retries = config.max_retries;
    let timeout = config.timeout;
    let model = config.model;

    let provider = OpenAiImageProvider::new(config)?;
    let batch = provider
        .run_with_retries(operation, &request, max_retries)
        .await?;

    let persister = ResultPersister::with_timeout(timeout)?;
    let saved = if args.all {
        persister.persist_batch(&batch, &args.out).await?
    } else {
        let first = batch
            .first()
            .ok_or_else(|| CanvasGenError::UnexpectedResponse("no images returned".into()))?;
        vec![persister.persist(first, &args.out).await?]
    };

    print_result(operation, model, &batch, &saved, json_output)
}

fn print_result(
    operation: Operation,
    model: OpenAiImageModel,
    batch: &ImageBatch,
    saved: &[PathBuf],
    json_output: bool,
) -> anyhow::Result<()> {
    if json_output {
        let result = serde_json::json!({
            "operation": operation.to_string(),
            "success": true,
            "model": model.as_str(),
            "created": batch.created_at,
            "returned": batch.len(),
            "saved": saved.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for path in saved {
            println!("Image saved at: {}", path.display());
        }
        if saved.len() < batch.len() {
            println!(
                "({} more image(s) returned; pass --all to save them)",
                batch.len() - saved.len()
            );
        }
    }
    Ok(())
}

fn normalize(args: NormalizeArgs, json_output: bool) -> anyhow::Result<()> {
    let output = args.output.unwrap_or_else(|| args.input.clone());
    let written = canvas::normalize_file(&args.input, &output, args.canvas)?;

    if json_output {
        let result = serde_json::json!({
            "operation": "normalize",
            "success": true,
            "input": args.input.display().to_string(),
            "output": written.display().to_string(),
            "canvas": args.canvas.to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Image resized and saved at: {}", written.display());
    }
    Ok(())
}

async fn check(json_output: bool) -> anyhow::Result<()> {
    let provider = OpenAiImageProvider::new(provider_config(None)?)?;
    provider.health_check().await?;

    if json_output {
        let result = serde_json::json!({
            "provider": provider.name(),
            "success": true,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}: API key accepted", provider.name());
    }
    Ok(())
}

fn report_error(err: &anyhow::Error, json_output: bool) -> ExitCode {
    let kind = err.downcast_ref::<CanvasGenError>().map(|e| e.kind());

    if json_output {
        let result = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
            "kind": kind.map(|k| k.as_str()),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string())
        );
    } else {
        eprintln!("error: {err:#}");
    }

    ExitCode::from(kind.map_or(1, |k| k.exit_code()))
}
