use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Result;

/// A CIFAR-100 binary directory must hold both `train.bin` and `test.bin`.
pub fn validate_data_dir<P: AsRef<Path>>(dir: P) -> Result<()> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        anyhow::bail!("Data directory does not exist: {}", dir.display());
    }
    for name in ["train.bin", "test.bin"] {
        if !dir.join(name).is_file() {
            anyhow::bail!("Missing {} in data directory: {}", name, dir.display());
        }
    }
    Ok(())
}

pub fn write_bytes_to_file<P: AsRef<Path>>(path: P, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    Ok(())
}
