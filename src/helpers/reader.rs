use crate::error::SheetLoaderError;
use std::fs::File;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Error, Debug)]
pub enum UnifiedReaderError {
    #[error("No data from remote file: '{0}'")]
    RemoteFileNoDataError(String),
}

/// Workbook bytes from either a local file or a remote URL.
pub(crate) enum UnifiedReader {
    Local(BufReader<File>),
    /// Remote content is buffered in memory
    Remote(Cursor<Vec<u8>>),
}

impl UnifiedReader {
    pub(crate) fn new(file_name: &str) -> Result<UnifiedReader, SheetLoaderError> {
        if Self::is_remote_url(file_name) {
            Self::read_blob_with_duckdb(file_name)
        } else {
            let path = Url::parse(file_name)
                .ok()
                .and_then(|url| url.to_file_path().ok());
            let file = match path {
                Some(path) => File::open(path)?,
                None => File::open(file_name)?,
            };
            Ok(UnifiedReader::Local(BufReader::new(file)))
        }
    }

    /// Any parseable URL is remote except `file://`. Bare paths (and Windows
    /// drive letters, which parse as one-letter schemes) are local.
    pub(crate) fn is_remote_url(file_name: &str) -> bool {
        match Url::parse(file_name) {
            Ok(url) => url.scheme() != "file" && url.scheme().len() > 1,
            Err(_) => false,
        }
    }

    /// DuckDB resolves the protocol (http, s3, gs, hf...) and any configured credentials.
    fn read_blob_with_duckdb(file_name: &str) -> Result<UnifiedReader, SheetLoaderError> {
        debug!("Fetching remote workbook {file_name} through read_blob");
        let connection = duckdb::Connection::open_in_memory()?;
        let result: Result<Vec<u8>, _> = connection.query_row(
            "SELECT content FROM read_blob(?)",
            [file_name],
            |row| row.get(0),
        );
        connection.close().map_err(|(_, e)| e)?;

        let bytes = result?;
        if bytes.is_empty() {
            Err(UnifiedReaderError::RemoteFileNoDataError(file_name.to_owned()))?;
        }
        Ok(UnifiedReader::Remote(Cursor::new(bytes)))
    }
}

impl Read for UnifiedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            UnifiedReader::Local(reader) => reader.read(buf),
            UnifiedReader::Remote(reader) => reader.read(buf),
        }
    }
}

impl Seek for UnifiedReader {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        match self {
            UnifiedReader::Local(reader) => reader.seek(pos),
            UnifiedReader::Remote(reader) => reader.seek(pos),
        }
    }
}
