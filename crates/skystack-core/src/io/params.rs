use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::stack::sigma_clip::SigmaClipParams;

/// Read sigma-clip parameters from a six-integer line file.
pub fn load_sigma_clip_params(path: &Path) -> Result<SigmaClipParams> {
    let contents = std::fs::read_to_string(path)?;
    let params = contents.parse::<SigmaClipParams>()?;
    debug!(file = %path.display(), line = %params.to_line(), "Loaded sigma-clip parameters");
    Ok(params)
}

/// Write sigma-clip parameters as a six-integer line, replacing the file.
pub fn save_sigma_clip_params(path: &Path, params: &SigmaClipParams) -> Result<()> {
    std::fs::write(path, format!("{}\n", params.to_line()))?;
    Ok(())
}
