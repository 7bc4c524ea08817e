use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ids::{IdSequence, PreviewId};

/// Attachment cap used by the gated question flow.
pub const DEFAULT_MAX_ATTACHMENTS: usize = 3;

/// Image encodings accepted at the intake boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
    Tiff,
    Svg,
}

impl ImageKind {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.trim().to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            "bmp" => Some(Self::Bmp),
            "tif" | "tiff" => Some(Self::Tiff),
            "svg" => Some(Self::Svg),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|extension| extension.to_str())
            .and_then(Self::from_extension)
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
            Self::Svg => "image/svg+xml",
        }
    }
}

/// An image that passed intake filtering but is not yet attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingImage {
    pub file_name: String,
    pub kind: ImageKind,
    pub bytes: Arc<[u8]>,
}

impl IncomingImage {
    pub fn new(file_name: impl Into<String>, kind: ImageKind, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            file_name: file_name.into(),
            kind,
            bytes: bytes.into(),
        }
    }
}

#[derive(Default)]
struct PreviewTable {
    ids: IdSequence,
    live: BTreeMap<PreviewId, Arc<[u8]>>,
}

/// Issues and tracks local preview handles for attached images.
///
/// A handle stays resolvable until the [`PreviewHandle`] guard is dropped.
/// Clones share one table.
#[derive(Clone, Default)]
pub struct PreviewRegistry {
    table: Arc<Mutex<PreviewTable>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, bytes: Arc<[u8]>) -> PreviewHandle {
        let mut table = self.table();
        let id: PreviewId = table.ids.next();
        table.live.insert(id, bytes);

        PreviewHandle {
            id,
            registry: self.clone(),
        }
    }

    pub fn resolve(&self, id: PreviewId) -> Option<Arc<[u8]>> {
        self.table().live.get(&id).cloned()
    }

    pub fn is_live(&self, id: PreviewId) -> bool {
        self.table().live.contains_key(&id)
    }

    /// Number of handles issued and not yet revoked.
    pub fn live_count(&self) -> usize {
        self.table().live.len()
    }

    fn revoke(&self, id: PreviewId) {
        if self.table().live.remove(&id).is_none() {
            tracing::warn!(preview = %id, "preview handle revoked twice");
        }
    }

    fn table(&self) -> MutexGuard<'_, PreviewTable> {
        // Table holds plain data only, so a poisoned lock is still consistent.
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for PreviewRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PreviewRegistry")
            .field("live", &self.live_count())
            .finish()
    }
}

/// Scoped preview reference. Dropping it revokes the preview.
pub struct PreviewHandle {
    id: PreviewId,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    pub fn id(&self) -> PreviewId {
        self.id
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.revoke(self.id);
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_tuple("PreviewHandle")
            .field(&self.id)
            .finish()
    }
}

/// One image owned by the current question draft.
#[derive(Debug)]
pub struct Attachment {
    file_name: String,
    kind: ImageKind,
    bytes: Arc<[u8]>,
    preview: PreviewHandle,
}

impl Attachment {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    pub fn preview_id(&self) -> PreviewId {
        self.preview.id()
    }
}

/// Maximum number of attachments a draft may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentLimit {
    Capped(usize),
    Unbounded,
}

impl Default for AttachmentLimit {
    fn default() -> Self {
        Self::Capped(DEFAULT_MAX_ATTACHMENTS)
    }
}

impl AttachmentLimit {
    /// Returns how many more attachments fit, or `None` when unbounded.
    pub fn remaining(self, count: usize) -> Option<usize> {
        match self {
            Self::Capped(max) => Some(max.saturating_sub(count)),
            Self::Unbounded => None,
        }
    }

    pub fn is_reached(self, count: usize) -> bool {
        self.remaining(count) == Some(0)
    }
}

/// Serialized as a count or the word `unbounded`.
impl Serialize for AttachmentLimit {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Capped(max) => serializer.serialize_u64(*max as u64),
            Self::Unbounded => serializer.serialize_str("unbounded"),
        }
    }
}

impl<'de> Deserialize<'de> for AttachmentLimit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Count(usize),
            Word(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Count(max) => Ok(Self::Capped(max)),
            Repr::Word(word) if word.trim().eq_ignore_ascii_case("unbounded") => Ok(Self::Unbounded),
            Repr::Word(word) => Err(serde::de::Error::custom(format!(
                "expected an attachment count or \"unbounded\", found \"{word}\""
            ))),
        }
    }
}

impl fmt::Display for AttachmentLimit {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capped(max) => write!(formatter, "{max}"),
            Self::Unbounded => formatter.write_str("unbounded"),
        }
    }
}

/// Ordered attachments of the current draft with cap enforcement.
#[derive(Debug)]
pub struct AttachmentSet {
    items: Vec<Attachment>,
    limit: AttachmentLimit,
    previews: PreviewRegistry,
}

impl AttachmentSet {
    pub fn new(limit: AttachmentLimit, previews: PreviewRegistry) -> Self {
        Self {
            items: Vec::new(),
            limit,
            previews,
        }
    }

    /// Appends images in arrival order and returns how many were kept.
    ///
    /// Images beyond the cap are dropped silently.
    pub fn add(&mut self, images: impl IntoIterator<Item = IncomingImage>) -> usize {
        let mut accepted = 0;

        for image in images {
            if !self.intake_enabled() {
                tracing::debug!(
                    file_name = %image.file_name,
                    limit = %self.limit,
                    "attachment intake disabled, image ignored"
                );
                continue;
            }

            let preview = self.previews.issue(image.bytes.clone());
            self.items.push(Attachment {
                file_name: image.file_name,
                kind: image.kind,
                bytes: image.bytes,
                preview,
            });
            accepted += 1;
        }

        if accepted > 0 {
            tracing::info!(
                accepted,
                count = self.items.len(),
                intake_enabled = self.intake_enabled(),
                "attachments added"
            );
        }

        accepted
    }

    /// Removes the attachment at `index`, shifting later ones down.
    pub fn remove(&mut self, index: usize) -> bool {
        if index >= self.items.len() {
            tracing::debug!(index, count = self.items.len(), "attachment index out of range");
            return false;
        }

        let removed = self.items.remove(index);
        tracing::info!(
            index,
            file_name = %removed.file_name,
            count = self.items.len(),
            "attachment removed"
        );
        true
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Attachment> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attachment> {
        self.items.iter()
    }

    pub fn limit(&self) -> AttachmentLimit {
        self.limit
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    /// False exactly when the cap has been reached.
    pub fn intake_enabled(&self) -> bool {
        !self.limit.is_reached(self.items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(name: &str) -> IncomingImage {
        IncomingImage::new(name, ImageKind::Png, name.as_bytes().to_vec())
    }

    fn names(set: &AttachmentSet) -> Vec<&str> {
        set.iter().map(Attachment::file_name).collect()
    }

    #[test]
    fn cap_is_never_exceeded_and_intake_tracks_it() {
        let mut set = AttachmentSet::new(AttachmentLimit::Capped(3), PreviewRegistry::new());
        // Deterministic pseudo-random walk over add/remove calls.
        let mut seed: u64 = 0x5eed;

        for step in 0..500 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let roll = (seed >> 33) % 10;

            if roll < 6 {
                let batch = (roll % 3 + 1) as usize;
                set.add((0..batch).map(|offset| png(&format!("img-{step}-{offset}"))));
            } else {
                set.remove((seed >> 40) as usize % 4);
            }

            assert!(set.len() <= 3);
            assert_eq!(!set.intake_enabled(), set.len() == 3);
            assert_eq!(set.previews().live_count(), set.len());
        }
    }

    #[test]
    fn overflowing_batch_keeps_arrival_order_prefix() {
        let mut set = AttachmentSet::new(AttachmentLimit::Capped(3), PreviewRegistry::new());
        assert_eq!(set.add([png("a"), png("b")]), 2);
        assert_eq!(set.add([png("c"), png("d"), png("e")]), 1);

        assert_eq!(names(&set), ["a", "b", "c"]);
        assert!(!set.intake_enabled());
        assert_eq!(set.add([png("f")]), 0);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn removing_middle_item_preserves_order_and_reenables_intake() {
        let mut set = AttachmentSet::new(AttachmentLimit::Capped(3), PreviewRegistry::new());
        set.add([png("a"), png("b"), png("c")]);
        assert!(!set.intake_enabled());

        assert!(set.remove(1));

        assert_eq!(names(&set), ["a", "c"]);
        assert!(set.intake_enabled());
    }

    #[test]
    fn out_of_range_remove_is_a_no_op() {
        let mut set = AttachmentSet::new(AttachmentLimit::Capped(3), PreviewRegistry::new());
        set.add([png("a")]);

        assert!(!set.remove(5));
        assert_eq!(names(&set), ["a"]);
    }

    #[test]
    fn unbounded_limit_never_disables_intake() {
        let mut set = AttachmentSet::new(AttachmentLimit::Unbounded, PreviewRegistry::new());
        set.add((0..20).map(|index| png(&format!("img-{index}"))));

        assert_eq!(set.len(), 20);
        assert!(set.intake_enabled());
    }

    #[test]
    fn previews_are_revoked_on_remove_and_clear() {
        let previews = PreviewRegistry::new();
        let mut set = AttachmentSet::new(AttachmentLimit::Capped(3), previews.clone());
        set.add([png("a"), png("b"), png("c")]);

        let removed_preview = set.get(0).map(Attachment::preview_id).expect("first attachment");
        let kept_preview = set.get(1).map(Attachment::preview_id).expect("second attachment");
        assert_eq!(previews.live_count(), 3);

        set.remove(0);
        assert!(!previews.is_live(removed_preview));
        assert_eq!(previews.resolve(kept_preview).as_deref(), Some(&b"b"[..]));

        set.clear();
        assert_eq!(previews.live_count(), 0);
    }

    #[test]
    fn image_kind_matches_extensions_case_insensitively() {
        assert_eq!(ImageKind::from_path(Path::new("photo.JPG")), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_path(Path::new("scan.tiff")), Some(ImageKind::Tiff));
        assert_eq!(ImageKind::from_path(Path::new("notes.txt")), None);
        assert_eq!(ImageKind::from_path(Path::new("no_extension")), None);
        assert_eq!(ImageKind::Webp.mime_type(), "image/webp");
    }
}
