use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use console::Style;
use skystack_core::consts::DEFAULT_OFFSET_SUFFIX;
use skystack_core::error::StackError;
use skystack_core::frame::Offset;
use skystack_core::io::offsets::{FileOffsetStore, OffsetStore};

#[derive(Args)]
pub struct OffsetArgs {
    /// Suffix that names each frame's offset record
    #[arg(long, global = true, default_value = DEFAULT_OFFSET_SUFFIX)]
    pub suffix: String,

    #[command(subcommand)]
    pub action: OffsetAction,
}

#[derive(Subcommand)]
pub enum OffsetAction {
    /// Record the offset of a frame relative to the reference
    Set {
        file: PathBuf,
        #[arg(allow_negative_numbers = true)]
        dx: i32,
        #[arg(allow_negative_numbers = true)]
        dy: i32,
    },
    /// Show the recorded offset of each frame
    Show {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Remove offset records, taking the frames out of later stacks
    Delete {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

pub fn run(args: &OffsetArgs) -> Result<()> {
    let store = FileOffsetStore::new(args.suffix.clone());

    match &args.action {
        OffsetAction::Set { file, dx, dy } => {
            let offset = Offset::new(*dx, *dy);
            store
                .save(file, offset)
                .with_context(|| format!("Failed to save offset for {}", file.display()))?;
            println!(
                "{} {} -> {}",
                file.display(),
                offset,
                store.record_path(file).display()
            );
        }
        OffsetAction::Show { files } => {
            let missing = Style::new().dim().yellow();
            for file in files {
                match store.load(file) {
                    Ok(offset) => println!("{:<40} {}", file.display(), offset),
                    Err(StackError::OffsetNotFound(_)) => {
                        println!("{:<40} {}", file.display(), missing.apply_to("not aligned"))
                    }
                    Err(e) => return Err(e).with_context(|| format!("{}", file.display())),
                }
            }
        }
        OffsetAction::Delete { files } => {
            for file in files {
                store
                    .delete(file)
                    .with_context(|| format!("Failed to delete offset for {}", file.display()))?;
            }
            println!("Removed {} offset record(s)", files.len());
        }
    }

    Ok(())
}
