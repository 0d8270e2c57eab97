//! Delimited flat-file cache backend.
//!
//! A headered CSV file with one `url,body` record per cached response.
//! Lookups scan forward and stop at the first match, so duplicate keys
//! resolve to the earliest write. File I/O runs under `spawn_blocking`.

use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use async_trait::async_trait;

use super::backend::{CacheBackend, FIELD_BODY, FIELD_URL};
use crate::Error;

#[derive(Debug)]
pub(crate) struct FlatFileBackend {
    path: PathBuf,
}

impl FlatFileBackend {
    /// Open a flat-file cache at the given path.
    ///
    /// With `create` false the file must already exist; with `create` true
    /// the file is created empty so that writability surfaces here rather
    /// than on the first insert.
    pub(crate) async fn open(path: PathBuf, create: bool) -> Result<Self, Error> {
        let probe = path.clone();
        run_blocking(move || {
            if create {
                OpenOptions::new().create(true).append(true).open(&probe)?;
            } else if !probe.is_file() {
                return Err(Error::Backend(format!("{} does not exist", probe.display())));
            }
            Ok(())
        })
        .await?;
        Ok(Self { path })
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, Error>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, Error> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Backend(e.to_string()))?
}

#[async_trait]
impl CacheBackend for FlatFileBackend {
    async fn ensure_table(&self, create: bool) -> Result<bool, Error> {
        let path = self.path.clone();
        run_blocking(move || {
            let len = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            if len > 0 {
                return Ok(true);
            }
            if !create {
                return Ok(false);
            }
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
            writer.write_record([FIELD_URL, FIELD_BODY])?;
            writer.flush()?;
            Ok(true)
        })
        .await
    }

    async fn get(&self, url: &str) -> Result<Option<String>, Error> {
        let path = self.path.clone();
        let url = url.to_string();
        run_blocking(move || {
            let file = match File::open(&path) {
                Ok(file) => file,
                Err(_) => return Ok(None),
            };
            let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
            for record in reader.records() {
                let record = record?;
                if record.get(0) == Some(url.as_str()) {
                    return Ok(record.get(1).map(str::to_string));
                }
            }
            Ok(None)
        })
        .await
    }

    async fn put(&self, url: &str, body: &str) -> Result<(), Error> {
        let path = self.path.clone();
        let url = url.to_string();
        let body = body.to_string();
        run_blocking(move || {
            let file = OpenOptions::new().append(true).open(&path)?;
            let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
            writer.write_record([url.as_str(), body.as_str()])?;
            writer.flush()?;
            Ok(())
        })
        .await
    }
}
