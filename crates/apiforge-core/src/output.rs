//! Rendering of generated results into static HTML documents and a
//! session-level zip archive.

use std::io::Write;
use std::path::PathBuf;

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::tools::generator::GeneratedCode;

/// Lowercase alphanumeric runs joined by `-`. Empty input slugs to `query`.
#[must_use]
pub fn slugify(query: &str) -> String {
    let mut slug = String::with_capacity(query.len());
    let mut last_dash = true;
    for c in query.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-').to_owned();
    if slug.is_empty() { "query".to_owned() } else { slug }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Static HTML document for one result. Synthetic fallbacks carry a visible
/// marker so degraded output is identifiable.
#[must_use]
pub fn render_html(result: &GeneratedCode) -> String {
    let notice = if result.synthetic {
        "<p class=\"notice\">Placeholder result: live generation was unavailable.</p>\n"
    } else {
        ""
    };
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n\
         <h1>{title}</h1>\n{notice}\
         <h2>Frontend</h2>\n<pre><code>{frontend}</code></pre>\n\
         <h2>Backend</h2>\n<pre><code>{backend}</code></pre>\n\
         </body>\n</html>\n",
        title = escape_html(&result.query),
        frontend = escape_html(&result.frontend),
        backend = escape_html(&result.backend),
    )
}

/// Writes one HTML document per result into `dir` and bundles the session's
/// documents into a zip archive. A failed write never blocks later queries.
pub struct OutputWriter {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl OutputWriter {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    /// Write the document for `result`, returning its path. Failures are
    /// logged and yield `None`; processing continues. Queries slugifying to
    /// the same stem get a numeric suffix instead of overwriting.
    pub fn write_document(&mut self, result: &GeneratedCode) -> Option<PathBuf> {
        let path = self.document_path(&result.query);
        let html = render_html(result);

        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            tracing::error!("failed to create output dir {}: {e}", self.dir.display());
            return None;
        }
        if let Err(e) = std::fs::write(&path, html) {
            tracing::error!("failed to write document {}: {e}", path.display());
            return None;
        }

        tracing::info!("wrote {}", path.display());
        self.written.push(path.clone());
        Some(path)
    }

    fn document_path(&self, query: &str) -> PathBuf {
        let stem = slugify(query);
        let mut path = self.dir.join(format!("{stem}.html"));
        let mut n = 2;
        while self.written.contains(&path) {
            path = self.dir.join(format!("{stem}-{n}.html"));
            n += 1;
        }
        path
    }

    /// Documents written so far, in write order.
    #[must_use]
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Bundle every written document into a deflate-compressed archive at
    /// `dir/archive_name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be created or a document cannot
    /// be read back.
    pub fn bundle_archive(&self, archive_name: &str) -> anyhow::Result<PathBuf> {
        let archive_path = self.dir.join(archive_name);
        let file = std::fs::File::create(&archive_path)?;
        let mut zip = ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for doc in &self.written {
            let name = doc
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document.html".to_owned());
            zip.start_file(name, options)?;
            let bytes = std::fs::read(doc)?;
            zip.write_all(&bytes)?;
        }

        zip.finish()?;
        Ok(archive_path)
    }
}
