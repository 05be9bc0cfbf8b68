//! Telephony message sources and attachment sinks.
//!
//! The ingester and the capture handlers never talk to a platform provider
//! directly. They read through [`MessageSource`] and write attachment bytes
//! through [`AttachmentSink`], so a device bridge, a provider export on disk,
//! or an in-memory fixture can all feed the same code.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use vault_core::constants::{self, placeholders, MMS_ADDRESS_TYPE_FROM};
use vault_core::error::{VaultError, VaultResult};

/// One row of the provider's SMS inbox.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderSms {
    #[serde(rename = "_id", alias = "id")]
    pub id: i64,
    #[serde(default)]
    pub address: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub date: i64,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(rename = "type", default)]
    pub box_type: i32,
}

/// One row of the provider's MMS inbox.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderMms {
    #[serde(rename = "_id", alias = "id")]
    pub id: i64,
    /// Seconds since the Unix epoch; zero or negative when unknown.
    #[serde(rename = "date", default)]
    pub date_seconds: i64,
    #[serde(rename = "msg_box", default)]
    pub box_type: i32,
    #[serde(rename = "sub", default)]
    pub subject: Option<String>,
}

impl ProviderMms {
    /// Message time in milliseconds, falling back to now when the provider has none.
    pub fn timestamp_ms(&self) -> i64 {
        if self.date_seconds > 0 {
            self.date_seconds * 1000
        } else {
            chrono::Utc::now().timestamp_millis()
        }
    }
}

/// An address attached to an MMS, tagged with its PDU role.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MmsAddress {
    pub address: Option<String>,
    #[serde(rename = "type")]
    pub address_type: i32,
}

/// One part of an MMS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MmsPart {
    #[serde(rename = "_id", alias = "id")]
    pub id: i64,
    #[serde(rename = "ct", default)]
    pub content_type: Option<String>,
    /// Inline text, when the provider stores it in the row.
    #[serde(default)]
    pub text: Option<String>,
    /// Out-of-line storage location; when set the bytes come from [`MessageSource::open_part`].
    #[serde(rename = "_data", default)]
    pub data_location: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "cl", default)]
    pub content_location: Option<String>,
}

impl MmsPart {
    pub fn is_text(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("text/"))
    }

    /// Non-text part with a known content type.
    pub fn is_attachment(&self) -> bool {
        self.content_type.is_some() && !self.is_text()
    }

    pub fn has_data(&self) -> bool {
        self.data_location.as_deref().is_some_and(|d| !d.is_empty())
    }

    /// Display name: part name, else content location, else a fixed placeholder.
    pub fn display_name(&self) -> String {
        [self.name.as_deref(), self.content_location.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .unwrap_or(placeholders::MMS_ATTACHMENT_NAME)
            .to_string()
    }
}

/// Read access to the platform's telephony provider.
///
/// Implementations are synchronous; async callers run them on a blocking
/// worker.
pub trait MessageSource: Send + Sync {
    /// Whether the process may read SMS/MMS. A source without permission is
    /// skipped silently.
    fn has_read_permission(&self) -> bool;

    fn sms_inbox(&self) -> VaultResult<Vec<ProviderSms>>;

    fn mms_inbox(&self) -> VaultResult<Vec<ProviderMms>>;

    /// Newest MMS in the inbox by date.
    fn latest_mms(&self) -> VaultResult<Option<ProviderMms>> {
        Ok(self
            .mms_inbox()?
            .into_iter()
            .max_by_key(|m| (m.date_seconds, m.id)))
    }

    /// First non-empty address with the sender role, if any.
    fn mms_from_address(&self, mms_id: i64) -> VaultResult<Option<String>>;

    /// Parts of one MMS in provider order.
    fn mms_parts(&self, mms_id: i64) -> VaultResult<Vec<MmsPart>>;

    /// Stream the bytes of one part.
    fn open_part(&self, part_id: i64) -> VaultResult<Box<dyn Read + Send>>;
}

/// Destination for attachment bytes copied out of the provider.
pub trait AttachmentSink: Send + Sync {
    /// Copy `reader` to `file_name`, returning where it landed and how many bytes were written.
    fn store(&self, file_name: &str, reader: &mut dyn Read) -> VaultResult<(PathBuf, u64)>;

    fn exists(&self, file_name: &str) -> bool;

    /// Delete a file returned by [`AttachmentSink::store`]. A missing file is not an error.
    fn remove(&self, path: &Path) -> VaultResult<()>;
}

// ─── Shared MMS helpers ─────────────────────────────────────────────────────

/// Sender of an MMS, or the unknown-sender placeholder.
pub fn mms_sender(source: &dyn MessageSource, mms_id: i64) -> String {
    match source.mms_from_address(mms_id) {
        Ok(Some(address)) if !address.trim().is_empty() => address,
        Ok(_) => placeholders::UNKNOWN_SENDER.to_string(),
        Err(e) => {
            warn!("mms {mms_id}: failed to read sender: {e}");
            placeholders::UNKNOWN_SENDER.to_string()
        }
    }
}

/// Subject followed by every text part in order, joined by newlines.
/// Falls back to the empty-body placeholder.
pub fn mms_body(source: &dyn MessageSource, subject: Option<&str>, parts: &[MmsPart]) -> String {
    let mut lines: Vec<String> = Vec::new();
    if let Some(subject) = subject.filter(|s| !s.is_empty()) {
        lines.push(subject.to_string());
    }

    for part in parts.iter().filter(|p| p.is_text()) {
        let text = if part.has_data() {
            read_text_part(source, part.id)
        } else {
            part.text.clone()
        };
        if let Some(text) = text.filter(|t| !t.is_empty()) {
            lines.push(text);
        }
    }

    if lines.is_empty() {
        placeholders::EMPTY_BODY.to_string()
    } else {
        lines.join("\n")
    }
}

fn read_text_part(source: &dyn MessageSource, part_id: i64) -> Option<String> {
    let mut reader = match source.open_part(part_id) {
        Ok(r) => r,
        Err(e) => {
            warn!("part {part_id}: unable to open text part: {e}");
            return None;
        }
    };
    let mut bytes = Vec::new();
    if let Err(e) = reader.read_to_end(&mut bytes) {
        warn!("part {part_id}: unable to read text part: {e}");
        return None;
    }
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Deterministic file name for a copied MMS part.
///
/// `{mms_id}_{part_id}.{ext}`, or `{mms_id}_{part_id}_{location}` when the
/// part carries a content location.
pub fn build_attachment_name(
    mms_id: i64,
    part_id: i64,
    content_type: &str,
    content_location: Option<&str>,
) -> String {
    match content_location.map(str::trim).filter(|cl| !cl.is_empty()) {
        Some(location) => {
            let safe: String = location
                .chars()
                .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
                .collect();
            format!("{mms_id}_{part_id}_{safe}")
        }
        None => format!("{mms_id}_{part_id}.{}", extension_for(content_type)),
    }
}

/// Extension for a content type: a registered extension, else the subtype, else `bin`.
pub fn extension_for(content_type: &str) -> String {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let subtype = essence.split_once('/').map(|(_, sub)| sub.trim()).unwrap_or("");

    if let Some(known) = mime_guess::get_mime_extensions_str(&essence) {
        // Prefer the subtype itself when it is a registered extension (image/png -> png).
        if let Some(ext) = known.iter().find(|e| **e == subtype) {
            return (*ext).to_string();
        }
        if let Some(ext) = known.first() {
            return (*ext).to_string();
        }
    }

    if subtype.is_empty() {
        constants::FALLBACK_ATTACHMENT_EXTENSION.to_string()
    } else {
        subtype.to_string()
    }
}

// ─── Filesystem sink ────────────────────────────────────────────────────────

/// Writes attachments into one directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectoryAttachmentSink {
    dir: PathBuf,
}

impl DirectoryAttachmentSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl AttachmentSink for DirectoryAttachmentSink {
    fn store(&self, file_name: &str, reader: &mut dyn Read) -> VaultResult<(PathBuf, u64)> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        let mut file = File::create(&path)?;
        let written = io::copy(reader, &mut file)?;
        if written == 0 {
            // Nothing to keep; the caller records no attachment row either.
            drop(file);
            let _ = fs::remove_file(&path);
        }
        debug!("stored {written} bytes at {}", path.display());
        Ok((path, written))
    }

    fn exists(&self, file_name: &str) -> bool {
        self.dir.join(file_name).is_file()
    }

    fn remove(&self, path: &Path) -> VaultResult<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ─── Provider export on disk ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ExportedMms {
    #[serde(flatten)]
    mms: ProviderMms,
    #[serde(default)]
    addresses: Vec<MmsAddress>,
    #[serde(default)]
    parts: Vec<MmsPart>,
}

/// Message source reading a provider export directory.
///
/// Layout: `sms.json` (array of SMS rows), `mms.json` (array of MMS rows,
/// each with `addresses` and `parts`), and `parts/<part_id>` holding the
/// bytes of out-of-line parts. Either JSON file may be absent.
pub struct JsonExportSource {
    root: PathBuf,
    sms: Vec<ProviderSms>,
    mms: Vec<ExportedMms>,
}

impl JsonExportSource {
    /// Load an export directory.
    pub fn open(root: impl Into<PathBuf>) -> VaultResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(VaultError::Provider(format!(
                "export directory not found: {}",
                root.display()
            )));
        }
        let sms = read_json_array(&root.join("sms.json"))?;
        let mms = read_json_array(&root.join("mms.json"))?;
        debug!(
            "loaded export from {}: {} sms, {} mms",
            root.display(),
            sms.len(),
            mms.len()
        );
        Ok(Self { root, sms, mms })
    }

    fn find_mms(&self, mms_id: i64) -> Option<&ExportedMms> {
        self.mms.iter().find(|m| m.mms.id == mms_id)
    }
}

fn read_json_array<T: serde::de::DeserializeOwned>(path: &Path) -> VaultResult<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| VaultError::Provider(format!("invalid {}: {e}", path.display())))
}

impl MessageSource for JsonExportSource {
    fn has_read_permission(&self) -> bool {
        self.root.is_dir()
    }

    fn sms_inbox(&self) -> VaultResult<Vec<ProviderSms>> {
        Ok(self.sms.clone())
    }

    fn mms_inbox(&self) -> VaultResult<Vec<ProviderMms>> {
        Ok(self.mms.iter().map(|m| m.mms.clone()).collect())
    }

    fn mms_from_address(&self, mms_id: i64) -> VaultResult<Option<String>> {
        Ok(self.find_mms(mms_id).and_then(|m| {
            m.addresses
                .iter()
                .filter(|a| a.address_type == MMS_ADDRESS_TYPE_FROM)
                .filter_map(|a| a.address.clone())
                .find(|a| !a.is_empty())
        }))
    }

    fn mms_parts(&self, mms_id: i64) -> VaultResult<Vec<MmsPart>> {
        Ok(self.find_mms(mms_id).map(|m| m.parts.clone()).unwrap_or_default())
    }

    fn open_part(&self, part_id: i64) -> VaultResult<Box<dyn Read + Send>> {
        let path = self.root.join("parts").join(part_id.to_string());
        let file = File::open(&path)
            .map_err(|e| VaultError::Provider(format!("part {part_id}: {e}")))?;
        Ok(Box::new(file))
    }
}
