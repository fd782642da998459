use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use skystack_core::io::image_io::ImageFileStore;
use skystack_core::io::offsets::FileOffsetStore;
use skystack_core::io::params::{load_sigma_clip_params, save_sigma_clip_params};
use skystack_core::pipeline::config::{OffsetConfig, OutputConfig, StackJobConfig};
use skystack_core::pipeline::{run_stack_job_reported, StopFlag};
use skystack_core::stack::{SigmaClipParams, SkyAdjustment};
use tracing::debug;

use crate::progress::BarReporter;
use crate::summary::{print_job_header, print_job_report};

#[derive(Args)]
pub struct StackArgs {
    /// Frames to stack, in order
    pub files: Vec<PathBuf>,

    /// Job config file (TOML); command-line options override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Index of the reference frame among FILES
    #[arg(long)]
    pub reference: Option<usize>,

    /// Number of rejection passes
    #[arg(long)]
    pub iterations: Option<usize>,

    /// Per-channel threshold in tenths of sigma; 0 disables a channel.
    /// When repeated, the last R G B triple wins
    #[arg(long, num_args = 3, value_names = ["R", "G", "B"], allow_negative_numbers = true)]
    pub sigma: Option<Vec<i32>>,

    /// Six-integer sigma-clip line: iterations R G B sky-level comet
    #[arg(long)]
    pub sigma_config: Option<PathBuf>,

    /// Write the effective sigma-clip settings back to --sigma-config
    #[arg(long, requires = "sigma_config")]
    pub save_sigma_config: bool,

    /// Compare samples after matching each frame's median to the stack's
    #[arg(long)]
    pub sky_level: bool,

    /// Never reject the reference frame on the final pass
    #[arg(long)]
    pub comet: bool,

    /// Accumulate the sky-adjusted value instead of the raw one
    #[arg(long)]
    pub accumulate_adjusted: bool,

    /// Stack frames that have no offset record, at (0, 0)
    #[arg(long)]
    pub include_unaligned: bool,

    /// Suffix that names each frame's offset record
    #[arg(long)]
    pub offset_suffix: Option<String>,

    /// 32-bit float TIFF output path
    #[arg(long)]
    pub float_output: Option<PathBuf>,

    /// 16-bit integer output path (.tiff or .png)
    #[arg(long)]
    pub int_output: Option<PathBuf>,

    /// Skip the float output
    #[arg(long, conflicts_with = "float_output")]
    pub no_float_output: bool,

    /// Skip the 16-bit integer output
    #[arg(long, conflicts_with = "int_output")]
    pub no_int_output: bool,

    /// Round integer output to nearest instead of dithering
    #[arg(long)]
    pub no_dither: bool,

    /// Dither seed for reproducible integer output
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run(args: &StackArgs) -> Result<()> {
    let config = build_config(args)?;
    if args.save_sigma_config {
        if let Some(path) = &args.sigma_config {
            save_sigma_clip_params(path, &config.sigma_clip)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Sigma-clip settings saved to {}", path.display());
        }
    }

    print_job_header(&config);

    let offsets = FileOffsetStore::new(config.offsets.suffix.clone());
    let reporter = BarReporter::new();
    let report = run_stack_job_reported(
        &config,
        &ImageFileStore,
        &offsets,
        &reporter,
        &StopFlag::new(),
    )?;

    print_job_report(&report);

    if !report.all_outputs_written() {
        bail!(
            "{} of {} outputs could not be written",
            report.failed_outputs.len(),
            report.failed_outputs.len() + report.written.len()
        );
    }
    Ok(())
}

/// Job config from, in increasing precedence: the TOML file, the
/// sigma-clip line file, then command-line options.
fn build_config(args: &StackArgs) -> Result<StackJobConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str(&contents).context("Invalid job config")?
        }
        None => StackJobConfig {
            frames: Vec::new(),
            reference: 0,
            include_unaligned: false,
            sigma_clip: SigmaClipParams::default(),
            offsets: OffsetConfig::default(),
            output: OutputConfig::default(),
        },
    };

    if !args.files.is_empty() {
        config.frames = args.files.clone();
    }
    if config.frames.is_empty() {
        bail!("No frames given");
    }
    if let Some(reference) = args.reference {
        config.reference = reference;
    }

    if let Some(path) = &args.sigma_config {
        if path.exists() {
            let line = load_sigma_clip_params(path)
                .with_context(|| format!("Failed to read sigma-clip settings {}", path.display()))?;
            config.sigma_clip = SigmaClipParams {
                sky_adjustment: config.sigma_clip.sky_adjustment,
                ..line
            };
        } else if !args.save_sigma_config {
            bail!("Sigma-clip settings file {} does not exist", path.display());
        }
    }

    let clip = &mut config.sigma_clip;
    if let Some(iterations) = args.iterations {
        clip.iterations = iterations;
    }
    if let Some(sigma) = &args.sigma {
        let last = sigma.rchunks(3).next().unwrap_or_default();
        clip.sigma_tenths = <[i32; 3]>::try_from(last)
            .context("--sigma takes three values: R G B")?;
    }
    clip.sky_level |= args.sky_level;
    clip.comet_mode |= args.comet;
    if args.accumulate_adjusted {
        clip.sky_adjustment = SkyAdjustment::RejectionAndAccumulation;
    }

    config.include_unaligned |= args.include_unaligned;
    if let Some(suffix) = &args.offset_suffix {
        config.offsets.suffix = suffix.clone();
    }
    // Naming only one output on the command line selects just that one.
    match (&args.float_output, &args.int_output) {
        (Some(float), Some(integer)) => {
            config.output.float = Some(float.clone());
            config.output.integer = Some(integer.clone());
        }
        (Some(float), None) => {
            config.output.float = Some(float.clone());
            config.output.integer = None;
        }
        (None, Some(integer)) => {
            config.output.float = None;
            config.output.integer = Some(integer.clone());
        }
        (None, None) => {}
    }
    if args.no_float_output {
        config.output.float = None;
    }
    if args.no_int_output {
        config.output.integer = None;
    }
    if args.no_dither {
        config.output.dither = false;
    }
    if let Some(seed) = args.seed {
        config.output.dither_seed = Some(seed);
    }

    config.validate()?;
    debug!(
        frames = config.frames.len(),
        reference = config.reference,
        sigma = %config.sigma_clip.to_line(),
        "Job config resolved"
    );
    Ok(config)
}
