use crate::{
    errors::{AppError, AppResult},
    mime,
    security::{Denial, SafeFileResolver},
};
use async_stream::try_stream;
use axum::body::Body;
use bytes::{Bytes, BytesMut};
use futures::Stream;
use std::{io, path::Path};
use tokio::{fs::File, io::AsyncReadExt};

const CHUNK_SIZE: usize = 64 * 1024;

pub struct ServedFile {
    pub len: u64,
    pub content_type: &'static str,
    pub body: Body,
}

/// Opens a path the resolver already allowed.
///
/// With `confine_symlinks` the real path is checked against the root as well,
/// so a link inside the tree cannot hand out a file from elsewhere, and the
/// checked real path is the one opened. The file is opened directly rather than
/// probed first; a missing file surfaces as the open error.
pub async fn open_within_root(
    resolver: &SafeFileResolver,
    path: &Path,
    confine_symlinks: bool,
) -> AppResult<ServedFile> {
    let real = if confine_symlinks {
        let real = dunce::canonicalize(path).map_err(io_error)?;
        if !resolver.contains(&real) {
            return Err(AppError::Denied(Denial::OutsideRoot));
        }
        Some(real)
    } else {
        None
    };

    let file = File::open(real.as_deref().unwrap_or(path)).await.map_err(io_error)?;
    let meta = file.metadata().await.map_err(io_error)?;
    if meta.is_dir() {
        return Err(AppError::NotFound);
    }

    Ok(ServedFile {
        len: meta.len(),
        content_type: mime::content_type(path),
        body: Body::from_stream(chunks(file)),
    })
}

// A name that cannot exist (a regular file used as a directory, an over-long
// component) is just as missing as an absent one.
fn io_error(e: io::Error) -> AppError {
    match e.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory | io::ErrorKind::InvalidFilename => {
            AppError::NotFound
        }
        _ => AppError::Internal(e.to_string()),
    }
}

fn chunks(mut file: File) -> impl Stream<Item = io::Result<Bytes>> {
    try_stream! {
        loop {
            let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
            let n = file.read_buf(&mut buf).await.map_err(|e| {
                tracing::error!(error = %e, "file read failed mid-stream");
                e
            })?;
            if n == 0 {
                break;
            }
            yield buf.freeze();
        }
    }
}
