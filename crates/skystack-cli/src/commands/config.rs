use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use skystack_core::io::params::save_sigma_clip_params;
use skystack_core::pipeline::config::{OffsetConfig, OutputConfig, StackJobConfig};
use skystack_core::stack::SigmaClipParams;

#[derive(Args)]
pub struct ConfigArgs {
    /// Write config to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also write the default six-integer sigma-clip line to this file
    #[arg(long)]
    pub sigma_line: Option<PathBuf>,
}

/// Print or save a full default StackJobConfig as TOML.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let config = StackJobConfig {
        frames: vec![
            PathBuf::from("light_0001.tiff"),
            PathBuf::from("light_0002.tiff"),
            PathBuf::from("light_0003.tiff"),
        ],
        reference: 0,
        include_unaligned: false,
        sigma_clip: SigmaClipParams::default(),
        offsets: OffsetConfig::default(),
        output: OutputConfig::default(),
    };
    let toml_str = toml::to_string_pretty(&config)?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Default config saved to {}", path.display());
    } else {
        print!("{}", toml_str);
    }

    if let Some(ref path) = args.sigma_line {
        save_sigma_clip_params(path, &config.sigma_clip)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Sigma-clip line saved to {}", path.display());
    }

    Ok(())
}
