// src/snapshot.rs

use anyhow::{Context, Result};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::{
    fs::{self, File},
    io::BufWriter,
    path::Path,
};
use tracing::info;

use crate::table::ObservationTable;

/// Write `table` to a single Parquet file at `path`.
///
/// Goes through `<path>.tmp` and a rename, so readers never see a partial
/// file. Returns the number of rows written.
pub fn write_parquet(table: &ObservationTable, path: impl AsRef<Path>) -> Result<usize> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }

    let batch = table.to_record_batch()?;
    let tmp_path = path.with_extension("parquet.tmp");

    let file = File::create(&tmp_path)
        .with_context(|| format!("could not create `{}`", tmp_path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(BufWriter::new(file), batch.schema(), Some(props))
        .context("creating ArrowWriter for snapshot")?;
    writer.write(&batch).context("writing snapshot batch")?;
    writer.close().context("closing snapshot writer")?;

    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "renaming `{}` → `{}`",
            tmp_path.display(),
            path.display()
        )
    })?;

    info!(rows = batch.num_rows(), path = %path.display(), "wrote snapshot");
    Ok(batch.num_rows())
}
