//! CLI for GenStudio - Gemini image generation with a session history.

use clap::{Args, Parser, Subcommand, ValueEnum};
use genstudio::download::save_image;
use genstudio::image::{AspectRatio, ImageSize};
use genstudio::ui::{InputLines, Studio, TerminalKeyPrompt};
use genstudio::{GenerationStatus, KeyGate, KeySelectionPolicy, Session, StudioConfig, SubmitOutcome};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "genstudio")]
#[command(about = "Generate images with Gemini from the terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Gemini API key
    #[arg(long, global = true, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Image model id
    #[arg(long, global = true, env = "GENSTUDIO_MODEL")]
    model: Option<String>,

    /// API base URL
    #[arg(long, global = true, env = "GENSTUDIO_BASE_URL")]
    base_url: Option<String>,

    /// What to assume after selecting a key
    #[arg(long, global = true, value_enum, default_value = "optimistic")]
    key_policy: KeyPolicyArg,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive studio (default)
    Studio(StudioArgs),

    /// Generate one image and exit
    Generate(GenerateArgs),
}

#[derive(Args)]
struct StudioArgs {
    /// Directory downloads are saved to
    #[arg(long, default_value = ".")]
    download_dir: PathBuf,
}

#[derive(Args)]
struct GenerateArgs {
    /// The text prompt describing the image
    prompt: String,

    /// Output file path (defaults to gemini-gen-<millis>.png in the current directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Resolution
    #[arg(short, long, value_enum, default_value = "1K")]
    size: SizeArg,

    /// Aspect ratio
    #[arg(short, long, value_enum, default_value = "1:1")]
    aspect_ratio: AspectRatioArg,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SizeArg {
    #[value(name = "1K")]
    Size1K,
    #[value(name = "2K")]
    Size2K,
    #[value(name = "4K")]
    Size4K,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AspectRatioArg {
    #[value(name = "1:1")]
    Square,
    #[value(name = "16:9")]
    Landscape,
    #[value(name = "9:16")]
    Portrait,
    #[value(name = "4:3")]
    Standard,
    #[value(name = "3:4")]
    StandardPortrait,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KeyPolicyArg {
    Optimistic,
    Verify,
}

impl From<SizeArg> for ImageSize {
    fn from(arg: SizeArg) -> Self {
        match arg {
            SizeArg::Size1K => ImageSize::Size1K,
            SizeArg::Size2K => ImageSize::Size2K,
            SizeArg::Size4K => ImageSize::Size4K,
        }
    }
}

impl From<AspectRatioArg> for AspectRatio {
    fn from(arg: AspectRatioArg) -> Self {
        match arg {
            AspectRatioArg::Square => AspectRatio::Square,
            AspectRatioArg::Landscape => AspectRatio::Landscape,
            AspectRatioArg::Portrait => AspectRatio::Portrait,
            AspectRatioArg::Standard => AspectRatio::Standard,
            AspectRatioArg::StandardPortrait => AspectRatio::StandardPortrait,
        }
    }
}

impl From<KeyPolicyArg> for KeySelectionPolicy {
    fn from(arg: KeyPolicyArg) -> Self {
        match arg {
            KeyPolicyArg::Optimistic => KeySelectionPolicy::Optimistic,
            KeyPolicyArg::Verify => KeySelectionPolicy::Verify,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Generate(ref args)) => {
            let config = build_config(&cli, None);
            generate_image(config, args).await?;
        }
        Some(Commands::Studio(ref args)) => {
            let config = build_config(&cli, Some(args.download_dir.clone()));
            run_studio(config).await?;
        }
        None => {
            let config = build_config(&cli, None);
            run_studio(config).await?;
        }
    }

    Ok(())
}

/// Logs go to stderr so they never interleave with the rendered studio.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(cli: &Cli, download_dir: Option<PathBuf>) -> StudioConfig {
    let mut builder = StudioConfig::builder().key_policy(cli.key_policy.into());
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url);
    }
    if let Some(dir) = download_dir {
        builder = builder.download_dir(dir);
    }
    builder.build()
}

async fn run_studio(config: StudioConfig) -> anyhow::Result<()> {
    tracing::debug!(?config, "starting studio");
    let input = InputLines::stdin();
    let store = config.credential_store();
    let gate = KeyGate::new(Arc::new(TerminalKeyPrompt::new(input.clone(), store.clone())));
    let provider = Arc::new(config.provider(store));
    let session = Session::new(provider, gate, config.key_policy);

    let mut studio = Studio::new(session, input, std::io::stdout(), config.download_dir);
    studio.run().await?;
    Ok(())
}

async fn generate_image(config: StudioConfig, args: &GenerateArgs) -> anyhow::Result<()> {
    let store = config.credential_store();
    let provider = Arc::new(config.provider(store.clone()));
    let mut session = Session::new(provider, KeyGate::from_store(store), config.key_policy);
    session.initialize().await;

    session.set_prompt(&args.prompt)?;
    session.set_size(args.size.into())?;
    session.set_aspect_ratio(args.aspect_ratio.into())?;

    match session.submit().await {
        SubmitOutcome::Generated => {}
        SubmitOutcome::Ignored => anyhow::bail!("prompt must not be empty"),
        SubmitOutcome::CredentialRequested => {
            anyhow::bail!("no API key configured (set GOOGLE_API_KEY or pass --api-key)")
        }
        SubmitOutcome::Busy | SubmitOutcome::Failed => {
            let message = match session.status() {
                GenerationStatus::Failed(message) => message.clone(),
                other => format!("unexpected status {other:?}"),
            };
            anyhow::bail!(message);
        }
    }

    let Some(image) = session.current_image() else {
        anyhow::bail!("generation reported success without an image");
    };

    let path = match args.output {
        Some(ref path) => {
            tokio::fs::write(path, image.payload()?.decode()?).await?;
            path.clone()
        }
        None => save_image(image, &config.download_dir).await?,
    };

    if args.json {
        let result = serde_json::json!({
            "type": "image",
            "success": true,
            "output": path.display().to_string(),
            "id": image.id,
            "prompt": image.prompt,
            "size": image.size,
            "aspect_ratio": image.aspect_ratio,
            "mime_type": image.mime_type(),
            "timestamp": image.timestamp,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Generated image: {} ({} • {})",
            path.display(),
            image.size,
            image.aspect_ratio
        );
    }

    Ok(())
}
