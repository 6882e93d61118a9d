//! Live preview seam

/// How a device stream is presented on the preview surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewAttachment {
    /// Device label of the attached stream.
    pub label: String,
    pub muted: bool,
    pub plays_inline: bool,
}

impl PreviewAttachment {
    /// Preview attachments are always muted and inline-playing.
    pub fn for_device(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            muted: true,
            plays_inline: true,
        }
    }
}

/// Where the live camera stream is shown.
pub trait PreviewSurface: Send {
    fn attach(&mut self, attachment: PreviewAttachment);

    fn detach(&mut self);
}

/// Surface for headless use; nothing is shown.
#[derive(Debug, Default)]
pub struct NullPreview {
    attached: Option<PreviewAttachment>,
}

impl NullPreview {
    pub fn attached(&self) -> Option<&PreviewAttachment> {
        self.attached.as_ref()
    }
}

impl PreviewSurface for NullPreview {
    fn attach(&mut self, attachment: PreviewAttachment) {
        log::debug!("Preview attached to {}", attachment.label);
        self.attached = Some(attachment);
    }

    fn detach(&mut self) {
        self.attached = None;
    }
}
