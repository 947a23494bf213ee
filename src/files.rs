//! Request resolution: maps GET and HEAD requests onto the files below the
//! server root.

use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::http::codec;
use crate::http::content::Content;
use crate::http::error::ServerError;
use crate::http::request::Request;
use crate::http::response::Response;

/// File names probed when a directory is requested.
const DIR_INDEX: &[&str] = &["index.html", "index.htm"];

/// Serves files and directory listings from a root directory.
#[derive(Debug)]
pub struct FileServer {
    root: PathBuf,
}

impl FileServer {
    /// Creates a file server rooted at `root`, which must be an existing
    /// directory.
    pub fn new(root: &Path) -> anyhow::Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("server root {} is not accessible", root.display()))?;
        anyhow::ensure!(
            root.is_dir(),
            "server root {} is not a directory",
            root.display()
        );
        Ok(FileServer { root })
    }

    /// Resolves a parsed request, filling in the response headers and
    /// content. On failure the response keeps any headers already added
    /// (such as `Allow`); the caller turns the error into an error
    /// response.
    pub fn resolve(
        &self,
        request: &Request,
        response: &mut Response,
    ) -> Result<(), ServerError> {
        check_method(request, response)?;
        let path = self.local_path(request);
        let path = self.check_file(path)?;
        fill_response(&path, request.allows_body(), response)
    }

    /// Maps the decoded request URI to a path below the root.
    fn local_path(&self, request: &Request) -> PathBuf {
        let uri = request.uri().unwrap_or("");
        self.root.join(uri.trim_start_matches('/'))
    }

    /// Picks the file to send: directories are probed for an index file,
    /// and the result must exist and stay below the server root.
    fn check_file(&self, mut path: PathBuf) -> Result<PathBuf, ServerError> {
        if path.is_dir() {
            for index in DIR_INDEX {
                let candidate = path.join(index);
                if candidate.exists() {
                    path = candidate;
                    break;
                }
            }
        }

        if !path.exists() {
            return Err(ServerError::not_found());
        }

        // Percent-decoded "../" segments must not reach outside the root;
        // a path that escapes is reported as absent, not forbidden.
        let canonical = path.canonicalize().map_err(map_fs_error)?;
        if !canonical.starts_with(&self.root) {
            return Err(ServerError::not_found());
        }

        Ok(canonical)
    }
}

/// Only GET and HEAD are implemented.
fn check_method(request: &Request, response: &mut Response) -> Result<(), ServerError> {
    match request.method() {
        Some("GET") | Some("HEAD") => Ok(()),
        _ => {
            response.add_header("Allow", "GET, HEAD");
            Err(ServerError::not_implemented())
        }
    }
}

/// Fills in the response for the chosen path: metadata headers always,
/// content only when the request allows a body.
fn fill_response(
    path: &Path,
    send_body: bool,
    response: &mut Response,
) -> Result<(), ServerError> {
    let metadata = fs::metadata(path).map_err(map_fs_error)?;
    if let Ok(modified) = metadata.modified() {
        response.add_header("Last-modified", codec::format_date(modified));
    }

    let content = if metadata.is_dir() {
        list_directory(path)?
    } else {
        let file = File::open(path).map_err(map_fs_error)?;
        Content::file(file)?
    };

    if send_body {
        response.set_content(content);
    } else {
        response.describe_content(&content);
    }
    Ok(())
}

/// A directory with no index file lists its entry names, one per line.
fn list_directory(path: &Path) -> Result<Content, ServerError> {
    let mut listing = String::new();
    for entry in fs::read_dir(path).map_err(map_fs_error)? {
        let entry = entry?;
        listing.push_str(&entry.file_name().to_string_lossy());
        listing.push('\n');
    }
    Ok(Content::buffer(codec::encode(&listing), Some("text/plain")))
}

fn map_fs_error(e: io::Error) -> ServerError {
    match e.kind() {
        ErrorKind::NotFound => ServerError::not_found(),
        ErrorKind::PermissionDenied => ServerError::forbidden(),
        _ => ServerError::Io(e),
    }
}
