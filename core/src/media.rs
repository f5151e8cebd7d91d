use crate::{
    retarget_link, safe_url, wrap_link, Block, Editor, Fragment, Inline, MediaAlign, MediaError, MediaKind,
    MediaLayout, MediaRef, PendingUpload, Position, ResizeGesture, Selection, Size, SyncReason, TableEditor,
    TableRequest, Uploader,
};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub const DEFAULT_VIDEO_SIZE: (u32, u32) = (560, 315);

const VIDEO_ID_LEN: usize = 11;

const VIDEO_URL_MARKERS: [&str; 4] =
    ["youtube.com/watch?v=", "youtu.be/", "youtube.com/embed/", "youtube-nocookie.com/embed/"];

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Reads an id at the start of `rest`. A twelfth id character means the
/// token is something longer and not a video id.
fn take_id(rest: &str) -> Option<String> {
    let id: String = rest.chars().take(VIDEO_ID_LEN).collect();
    if id.chars().count() != VIDEO_ID_LEN || !id.chars().all(is_id_char) {
        return None;
    }
    match rest.chars().nth(VIDEO_ID_LEN) {
        Some(c) if is_id_char(c) => None,
        _ => Some(id),
    }
}

/// Video id from a YouTube URL or a bare id. Feeding the result back in
/// returns it unchanged.
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if input.chars().count() == VIDEO_ID_LEN && input.chars().all(is_id_char) {
        return Some(input.to_string());
    }
    for marker in VIDEO_URL_MARKERS {
        if let Some(at) = input.find(marker) {
            if let Some(id) = take_id(&input[at + marker.len()..]) {
                return Some(id);
            }
        }
    }
    if !input.contains("youtube.com/") {
        return None;
    }
    let (_, query) = input.split_once('?')?;
    let query = query.split('#').next().unwrap_or(query);
    query.split('&').find_map(|pair| pair.strip_prefix("v=")).and_then(take_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Upload(PendingUpload),
    Url(String),
}

impl ImageSource {
    /// A chosen file wins over a typed URL. A URL with a script scheme is
    /// treated as no source at all.
    pub fn choose(file: Option<PendingUpload>, url: &str) -> Result<Self, MediaError> {
        if let Some(file) = file {
            return Ok(ImageSource::Upload(file));
        }
        let url = url.trim();
        if url.is_empty() {
            return Err(MediaError::MissingSource);
        }
        safe_url(url).map(ImageSource::Url).ok_or(MediaError::MissingSource)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub source: ImageSource,
    pub alt: String,
    pub caption: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub align: MediaAlign,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRequest {
    pub video_id: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub align: MediaAlign,
    pub responsive: bool,
}

impl VideoRequest {
    pub fn from_url(url: &str, align: MediaAlign, responsive: bool) -> Result<Self, MediaError> {
        let video_id = extract_video_id(url).ok_or_else(|| MediaError::InvalidVideoUrl(url.trim().to_string()))?;
        Ok(Self { video_id, width: None, height: None, align, responsive })
    }

    pub fn with_size(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.width = width.filter(|w| *w > 0);
        self.height = height.filter(|h| *h > 0);
        self
    }

    pub fn layout(&self) -> MediaLayout {
        MediaLayout { align: self.align, width: self.width, height: self.height, responsive: self.responsive }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRequest {
    pub text: String,
    pub url: String,
    pub new_tab: bool,
}

impl LinkRequest {
    pub fn new(text: &str, url: &str, new_tab: bool) -> Result<Self, MediaError> {
        let text = text.trim();
        let url = url.trim();
        if text.is_empty() || url.is_empty() {
            return Err(MediaError::InvalidLinkFields);
        }
        let url = safe_url(url).ok_or(MediaError::InvalidLinkFields)?;
        Ok(Self { text: text.to_string(), url, new_tab })
    }
}

/// Validated dialog input, before any upload has happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRequest {
    Image(ImageRequest),
    Table(TableRequest),
    Video(VideoRequest),
    Link(LinkRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub src: String,
    pub alt: String,
    pub caption: Option<String>,
    pub layout: MediaLayout,
}

/// Everything needed to build or update the element; no I/O left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedMedia {
    Image(ResolvedImage),
    Table(TableRequest),
    Video(VideoRequest),
    Link(LinkRequest),
}

impl MediaRequest {
    pub fn kind(&self) -> MediaKind {
        match self {
            MediaRequest::Image(_) => MediaKind::Image,
            MediaRequest::Table(_) => MediaKind::Table,
            MediaRequest::Video(_) => MediaKind::Video,
            MediaRequest::Link(_) => MediaKind::Link,
        }
    }

    /// Uploads the image file if there is one. This is the only await on the
    /// insertion path.
    pub async fn resolve<U: Uploader>(self, uploader: &U) -> Result<ResolvedMedia, MediaError> {
        let image = match self {
            MediaRequest::Image(image) => image,
            MediaRequest::Table(table) => return Ok(ResolvedMedia::Table(table)),
            MediaRequest::Video(video) => return Ok(ResolvedMedia::Video(video)),
            MediaRequest::Link(link) => return Ok(ResolvedMedia::Link(link)),
        };
        let src = match image.source {
            ImageSource::Upload(file) => uploader.upload(file).await?,
            ImageSource::Url(url) => url,
        };
        Ok(ResolvedMedia::Image(ResolvedImage {
            src,
            alt: image.alt,
            caption: image.caption.filter(|c| !c.trim().is_empty()),
            layout: MediaLayout { align: image.align, width: image.width, height: image.height, responsive: false },
        }))
    }
}

impl ResolvedMedia {
    pub fn kind(&self) -> MediaKind {
        match self {
            ResolvedMedia::Image(_) => MediaKind::Image,
            ResolvedMedia::Table(_) => MediaKind::Table,
            ResolvedMedia::Video(_) => MediaKind::Video,
            ResolvedMedia::Link(_) => MediaKind::Link,
        }
    }

    fn into_block(self) -> Option<Block> {
        match self {
            ResolvedMedia::Image(image) => Some(Block::Image {
                id: Uuid::new_v4(),
                src: Arc::from(image.src),
                alt: Arc::from(image.alt),
                caption: image.caption.map(Arc::from),
                layout: image.layout,
                dirty: true,
            }),
            ResolvedMedia::Table(table) => Some(TableEditor::build(&table)),
            ResolvedMedia::Video(video) => Some(Block::Video {
                id: Uuid::new_v4(),
                video_id: Arc::from(video.video_id.as_str()),
                layout: video.layout(),
                dirty: true,
            }),
            ResolvedMedia::Link(_) => None,
        }
    }
}

/// Per-kind "insertion in progress" flags shared with every guard.
#[derive(Debug, Clone, Default)]
pub struct InFlight(Rc<RefCell<HashSet<MediaKind>>>);

impl InFlight {
    pub fn try_begin(&self, kind: MediaKind) -> Result<ProcessingGuard, MediaError> {
        if !self.0.borrow_mut().insert(kind) {
            return Err(MediaError::AlreadyProcessing(kind));
        }
        Ok(ProcessingGuard { flags: self.clone(), kind })
    }

    pub fn is_processing(&self, kind: MediaKind) -> bool {
        self.0.borrow().contains(&kind)
    }
}

/// Clears its kind's flag when dropped, whatever the outcome was.
#[derive(Debug)]
pub struct ProcessingGuard {
    flags: InFlight,
    kind: MediaKind,
}

impl ProcessingGuard {
    pub fn kind(&self) -> MediaKind {
        self.kind
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.flags.0.borrow_mut().remove(&self.kind);
    }
}

impl Editor {
    pub fn begin_insert(&self, kind: MediaKind) -> Result<ProcessingGuard, MediaError> {
        self.in_flight.try_begin(kind)
    }

    pub fn is_processing(&self, kind: MediaKind) -> bool {
        self.in_flight.is_processing(kind)
    }

    /// Edits `target` in place when it is a live element of the same kind,
    /// otherwise inserts at the saved cursor. Returns the element id.
    pub fn apply_media(&mut self, media: ResolvedMedia, target: Option<Uuid>) -> Option<Uuid> {
        let kind = media.kind();
        if let Some(id) = target {
            if kind != MediaKind::Link && self.doc.block(id).and_then(Block::media_kind) == Some(kind) {
                self.edit_in_place(id, media);
                self.tracker.clear();
                self.commit(SyncReason::Media);
                debug!(%kind, %id, "media updated in place");
                return Some(id);
            }
            if kind != MediaKind::Link {
                warn!(%kind, %id, "edited element is gone, inserting a new one");
            }
        }
        let id = match media {
            ResolvedMedia::Link(link) => {
                self.insert_link(link);
                None
            }
            other => {
                let block = other.into_block()?;
                self.place_fragment(Fragment::Block(block))
            }
        };
        self.commit(SyncReason::Media);
        debug!(%kind, ?id, "media inserted");
        id
    }

    fn edit_in_place(&mut self, id: Uuid, media: ResolvedMedia) {
        let Some(block) = self.doc.block_mut(id) else {
            return;
        };
        if let ResolvedMedia::Table(request) = &media {
            TableEditor::apply(block, request);
            return;
        }
        match (block, media) {
            (Block::Image { src, alt, caption, layout, dirty, .. }, ResolvedMedia::Image(image)) => {
                *src = Arc::from(image.src);
                *alt = Arc::from(image.alt);
                *caption = image.caption.map(Arc::from);
                *layout = image.layout;
                *dirty = true;
            }
            (Block::Video { video_id, layout, dirty, .. }, ResolvedMedia::Video(video)) => {
                *layout = video.layout();
                *video_id = Arc::from(video.video_id);
                *dirty = true;
            }
            _ => {}
        }
    }

    /// Wraps a selected range in place. A caret inside an existing link
    /// edits that link; otherwise the link text is inserted.
    fn insert_link(&mut self, link: LinkRequest) {
        let sel = self.insertion_point();
        if let Some(caret) = sel.filter(|s| s.is_collapsed()).map(|s| s.focus) {
            let edited = self
                .doc
                .container_mut(caret.node)
                .and_then(|content| retarget_link(content, caret.offset, &link.url, link.new_tab, &link.text));
            if let Some(end) = edited {
                self.selection = Some(Selection::collapsed(Position::new(caret.node, end)));
                return;
            }
        }
        if let Some(range) = sel.filter(|s| !s.is_collapsed()) {
            let (_, end) = range.ordered(&self.doc);
            let mut wrapped = false;
            for (id, from, to) in self.slices(range) {
                if let Some(content) = self.doc.container_mut(id) {
                    wrapped |= wrap_link(content, from, to, &link.url, link.new_tab);
                }
            }
            if wrapped {
                self.selection = Some(Selection::collapsed(end));
                return;
            }
        }
        let inline = Inline::Link {
            url: Arc::from(link.url.as_str()),
            new_tab: link.new_tab,
            text: vec![Inline::plain(&link.text)],
        };
        self.place_fragment_at(sel, Fragment::Inlines(vec![inline]));
    }

    /// Highlights one element; any other selected element, of any kind, is
    /// deselected.
    pub fn select_media(&mut self, id: Uuid) -> Option<MediaRef> {
        let kind = self.doc.block(id)?.media_kind()?;
        let media = MediaRef { kind, id };
        self.selected = Some(media);
        Some(media)
    }

    pub fn deselect_media(&mut self) -> Option<MediaRef> {
        self.selected.take()
    }

    pub fn selected_media(&self) -> Option<MediaRef> {
        self.selected.filter(|m| self.doc.block(m.id).and_then(Block::media_kind) == Some(m.kind))
    }

    /// Starts a drag on an image or video handle. `rendered` is the element's
    /// on-screen size.
    pub fn begin_resize(&mut self, id: Uuid, rendered: Size, surface_width: f64) -> bool {
        let Some(kind) = self.doc.block(id).and_then(Block::media_kind) else {
            return false;
        };
        if kind == MediaKind::Table {
            return false;
        }
        let target = MediaRef { kind, id };
        let Some(gesture) = ResizeGesture::new(target, rendered, surface_width) else {
            return false;
        };
        self.selected = Some(target);
        self.resize = Some(gesture);
        true
    }

    pub fn drag_resize(&mut self, dx: f64, dy: f64) -> Option<Size> {
        self.resize.as_mut().map(|gesture| gesture.drag(dx, dy))
    }

    /// Writes the dragged size into the element and records it.
    pub fn end_resize(&mut self) -> Option<(u32, u32)> {
        let gesture = self.resize.take()?;
        if gesture.current() == gesture.start() {
            return None;
        }
        let (width, height) = gesture.current().rounded();
        match self.doc.block_mut(gesture.target.id)? {
            Block::Image { layout, dirty, .. } | Block::Video { layout, dirty, .. } => {
                layout.width = Some(width);
                layout.height = Some(height);
                layout.responsive = false;
                *dirty = true;
            }
            _ => return None,
        }
        self.commit(SyncReason::Resize);
        debug!(width, height, "media resized");
        Some((width, height))
    }

    pub fn cancel_resize(&mut self) {
        self.resize = None;
    }

    pub fn is_resizing(&self) -> bool {
        self.resize.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_id_rejects_longer_tokens() {
        assert_eq!(take_id("dQw4w9WgXcQ&t=1").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(take_id("dQw4w9WgXcQx"), None);
        assert_eq!(take_id("short"), None);
    }

    #[test]
    fn guard_releases_on_drop() {
        let flags = InFlight::default();
        let guard = flags.try_begin(MediaKind::Image).unwrap();
        assert!(flags.is_processing(MediaKind::Image));
        assert_eq!(
            flags.try_begin(MediaKind::Image).unwrap_err(),
            MediaError::AlreadyProcessing(MediaKind::Image)
        );
        assert!(flags.try_begin(MediaKind::Video).is_ok());
        drop(guard);
        assert!(!flags.is_processing(MediaKind::Image));
        assert!(flags.try_begin(MediaKind::Image).is_ok());
    }

    #[test]
    fn script_urls_are_not_sources() {
        assert_eq!(ImageSource::choose(None, "  "), Err(MediaError::MissingSource));
        assert_eq!(ImageSource::choose(None, "javascript:alert(1)"), Err(MediaError::MissingSource));
        let file = PendingUpload::new("a.png", vec![1]);
        assert_eq!(
            ImageSource::choose(Some(file.clone()), "https://x/y.png"),
            Ok(ImageSource::Upload(file))
        );
    }
}
