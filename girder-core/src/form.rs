//! Multipart form parsing.
//!
//! Text fields are collected into a JSON object, file parts are streamed to
//! the upload directory and described by [`UploadedFile`].

use crate::logging::{debug, trace};
use crate::{ConfigSource, Error, HttpRequest};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256, Sha512};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Uniform description of a stored upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub size: u64,
    pub path: PathBuf,
    pub name: String,
    pub mime_type: String,
    pub last_modified: DateTime<Utc>,
    pub hash: Option<String>,
}

/// Content hash computed while an upload is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
}

enum ContentHasher {
    Sha256(Sha256),
    Sha512(Sha512),
}

impl ContentHasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => ContentHasher::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => ContentHasher::Sha512(Sha512::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            ContentHasher::Sha256(h) => h.update(data),
            ContentHasher::Sha512(h) => h.update(data),
        }
    }

    fn finish(self) -> String {
        match self {
            ContentHasher::Sha256(h) => hex::encode(h.finalize()),
            ContentHasher::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

/// Where uploads are written
#[derive(Clone)]
pub enum UploadDir {
    Static(PathBuf),
    /// Derived from configuration at parse time
    Computed(Arc<dyn Fn(&dyn ConfigSource) -> PathBuf + Send + Sync>),
}

impl UploadDir {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&dyn ConfigSource) -> PathBuf + Send + Sync + 'static,
    {
        UploadDir::Computed(Arc::new(f))
    }
}

impl std::fmt::Debug for UploadDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadDir::Static(path) => f.debug_tuple("Static").field(path).finish(),
            UploadDir::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Limits and storage options for a multipart parse
#[derive(Debug, Clone)]
pub struct FormOptions {
    pub max_fields: usize,
    /// Total bytes allowed across all text fields
    pub max_fields_size: usize,
    /// Per-file limit; the server's configured file limit when unset
    pub max_file_size: Option<u64>,
    pub keep_extensions: bool,
    pub encoding: String,
    pub hash: Option<HashAlgorithm>,
    /// Upload directory; the server's configured one when unset
    pub upload_dir: Option<UploadDir>,
    pub multiples: bool,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            max_fields: 1000,
            max_fields_size: 20 * 1024 * 1024,
            max_file_size: None,
            keep_extensions: false,
            encoding: "utf-8".to_string(),
            hash: None,
            upload_dir: None,
            multiples: false,
        }
    }
}

impl FormOptions {
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    pub fn keep_extensions(mut self, keep: bool) -> Self {
        self.keep_extensions = keep;
        self
    }

    pub fn hash(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash = Some(algorithm);
        self
    }

    pub fn upload_dir(mut self, dir: UploadDir) -> Self {
        self.upload_dir = Some(dir);
        self
    }

    pub fn multiples(mut self, multiples: bool) -> Self {
        self.multiples = multiples;
        self
    }
}

/// Parsed multipart payload
#[derive(Debug, Clone, Default)]
pub struct FormData {
    pub fields: Map<String, Value>,
    pub files: HashMap<String, Vec<UploadedFile>>,
}

impl FormData {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn files(&self, name: &str) -> &[UploadedFile] {
        self.files.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Remove every stored upload
    async fn discard(&mut self) {
        for file in self.files.drain().flat_map(|(_, files)| files) {
            if let Err(err) = tokio::fs::remove_file(&file.path).await {
                debug!(path = %file.path.display(), error = %err, "Could not remove upload");
            }
        }
    }
}

/// Streams one request body through `multer`, enforcing [`FormOptions`]
pub struct MultipartParser<'a> {
    options: &'a FormOptions,
    upload_dir: PathBuf,
    max_file_size: u64,
}

impl<'a> MultipartParser<'a> {
    pub fn new(options: &'a FormOptions, upload_dir: PathBuf, default_max_file_size: u64) -> Self {
        Self {
            options,
            upload_dir,
            max_file_size: options.max_file_size.unwrap_or(default_max_file_size),
        }
    }

    /// Parse the whole body.
    ///
    /// Either every part is accepted or none is: on failure, uploads already
    /// written for this request are removed again.
    pub async fn parse(&self, request: &HttpRequest) -> Result<FormData, Error> {
        let mut data = FormData::default();
        if let Err(err) = self.read_parts(request, &mut data).await {
            data.discard().await;
            return Err(err);
        }

        debug!(
            fields = data.fields.len(),
            files = data.files.len(),
            "Parsed multipart form"
        );
        Ok(data)
    }

    async fn read_parts(&self, request: &HttpRequest, data: &mut FormData) -> Result<(), Error> {
        let content_type = request
            .content_type()
            .ok_or_else(|| Error::BadRequest("Missing multipart content type".to_string()))?;
        let boundary = multer::parse_boundary(content_type)
            .map_err(|e| Error::BadRequest(format!("Invalid multipart request: {}", e)))?;

        let body = Bytes::from(request.body.clone());
        let stream = futures_util::stream::once(async move { Ok::<Bytes, std::io::Error>(body) });
        let mut multipart = multer::Multipart::new(stream, boundary);

        let mut field_count = 0usize;
        let mut fields_size = 0usize;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| Error::BadRequest(format!("Malformed multipart body: {}", e)))?
        {
            field_count += 1;
            if field_count > self.options.max_fields {
                return Err(Error::BadRequest(format!(
                    "Too many form fields (limit {})",
                    self.options.max_fields
                )));
            }

            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let file = self.store_file(field, file_name).await?;
                    trace!(field = %name, size = file.size, "Stored uploaded file");
                    let entry = data.files.entry(name).or_default();
                    if !self.options.multiples {
                        // Only the last upload for a name is kept
                        for replaced in entry.drain(..) {
                            let _ = tokio::fs::remove_file(&replaced.path).await;
                        }
                    }
                    entry.push(file);
                }
                None => {
                    let text = field
                        .text_with_charset(&self.options.encoding)
                        .await
                        .map_err(|e| Error::BadRequest(format!("Unreadable form field: {}", e)))?;
                    fields_size += text.len();
                    if fields_size > self.options.max_fields_size {
                        return Err(Error::BadRequest(format!(
                            "Form fields exceed {} bytes",
                            self.options.max_fields_size
                        )));
                    }
                    self.insert_field(&mut data.fields, name, text);
                }
            }
        }
        Ok(())
    }

    fn insert_field(&self, fields: &mut Map<String, Value>, name: String, text: String) {
        let value = Value::String(text);
        if !self.options.multiples {
            fields.insert(name, value);
            return;
        }

        let key = name.trim_end_matches("[]").to_string();
        match fields.get_mut(&key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None if name.ends_with("[]") => {
                fields.insert(key, Value::Array(vec![value]));
            }
            None => {
                fields.insert(key, value);
            }
        }
    }

    async fn store_file(&self, mut field: multer::Field<'_>, file_name: String) -> Result<UploadedFile, Error> {
        let mime_type = field
            .content_type()
            .map(|m| m.to_string())
            .unwrap_or_else(|| mime_guess::from_path(&file_name).first_or_octet_stream().to_string());

        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let path = self.target_path(&file_name);
        let mut out = tokio::fs::File::create(&path).await?;
        let mut hasher = self.options.hash.map(ContentHasher::new);
        let mut size = 0u64;

        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| Error::BadRequest(format!("Interrupted upload: {}", e)))?
        {
            size += chunk.len() as u64;
            if size > self.max_file_size {
                drop(out);
                let _ = tokio::fs::remove_file(&path).await;
                return Err(Error::BadRequest(format!(
                    "File `{}` exceeds {} bytes",
                    file_name, self.max_file_size
                )));
            }
            if let Some(hasher) = hasher.as_mut() {
                hasher.update(&chunk);
            }
            out.write_all(&chunk).await?;
        }
        out.flush().await?;

        Ok(UploadedFile {
            size,
            path,
            name: file_name,
            mime_type,
            last_modified: Utc::now(),
            hash: hasher.map(ContentHasher::finish),
        })
    }

    fn target_path(&self, file_name: &str) -> PathBuf {
        let mut stored = uuid::Uuid::new_v4().simple().to_string();
        if self.options.keep_extensions {
            if let Some(ext) = Path::new(file_name).extension().and_then(|e| e.to_str()) {
                stored.push('.');
                stored.push_str(ext);
            }
        }
        self.upload_dir.join(stored)
    }
}
