use crate::fec::DecoderCache;

/// Which media slot an SSRC occupies on a user. A user holds at most one of
/// each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

/// A remote peer, identified by display name, with up to two bound SSRCs
/// and one FEC reassembly cache per media kind.
pub struct User {
    pub name: String,
    pub video_ssrc: Option<u32>,
    pub audio_ssrc: Option<u32>,
    pub video_cache: DecoderCache,
    pub audio_cache: DecoderCache,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            video_ssrc: None,
            audio_ssrc: None,
            video_cache: DecoderCache::new(),
            audio_cache: DecoderCache::new(),
        }
    }

    pub fn has_no_ssrcs(&self) -> bool {
        self.video_ssrc.is_none() && self.audio_ssrc.is_none()
    }

    pub fn cache_for(&self, kind: MediaKind) -> &DecoderCache {
        match kind {
            MediaKind::Video => &self.video_cache,
            MediaKind::Audio => &self.audio_cache,
        }
    }

    pub fn kind_of(&self, ssrc: u32) -> Option<MediaKind> {
        if self.video_ssrc == Some(ssrc) {
            Some(MediaKind::Video)
        } else if self.audio_ssrc == Some(ssrc) {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }

    /// Binds `ssrc` into the first free slot matching `kind`. Returns false
    /// if that slot is already taken by a different SSRC.
    pub(super) fn bind(&mut self, ssrc: u32, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Video => match self.video_ssrc {
                None => {
                    self.video_ssrc = Some(ssrc);
                    true
                }
                Some(existing) => existing == ssrc,
            },
            MediaKind::Audio => match self.audio_ssrc {
                None => {
                    self.audio_ssrc = Some(ssrc);
                    true
                }
                Some(existing) => existing == ssrc,
            },
        }
    }

    pub(super) fn clear(&mut self, ssrc: u32) {
        if self.video_ssrc == Some(ssrc) {
            self.video_ssrc = None;
        }
        if self.audio_ssrc == Some(ssrc) {
            self.audio_ssrc = None;
        }
    }
}
