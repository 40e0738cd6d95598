use std::path::Path;

use partition_common::Layout;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::util::Error;

/// Replaces `path` with `text` so the build never sees a half written file.
pub async fn write_atomic(path: &Path, text: &str) -> Result<(), Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp).await?;
    file.write_all(text.as_bytes()).await?;
    file.sync_all().await?;
    fs::rename(tmp, path).await?;
    Ok(())
}

pub async fn save(path: &Path, layout: &Layout) -> Result<(), Error> {
    write_atomic(path, &layout.to_string()).await?;
    log::debug!("partition table written to {}", path.display());
    Ok(())
}

pub async fn load(path: &Path, capacity: u32) -> Result<Layout, Error> {
    let text = fs::read_to_string(path).await?;
    Ok(Layout::parse(&text, capacity)?)
}
