use x11rb::protocol::xproto::{Atom, Timestamp, Window};

/// The two user-visible X11 selections pclipsync mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selection {
    Clipboard,
    Primary,
}

impl Selection {
    pub const ALL: [Selection; 2] = [Selection::Clipboard, Selection::Primary];

    pub fn name(self) -> &'static str {
        match self {
            Selection::Clipboard => "CLIPBOARD",
            Selection::Primary => "PRIMARY",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Selection::Clipboard => 0,
            Selection::Primary => 1,
        }
    }
}

/// A selection-related event observed on the X connection.
#[derive(Debug, Clone)]
pub enum SelectionEvent {
    /// Ownership of a mirrored selection moved to some client
    /// (possibly our own owner window).
    OwnerChanged {
        selection: Selection,
        owned_by_us: bool,
    },
    /// Another client asked us to convert a selection we own.
    ConversionRequested(ConversionRequest),
}

/// The fields of a `SelectionRequest` needed to produce a reply.
#[derive(Debug, Clone, Copy)]
pub struct ConversionRequest {
    pub requestor: Window,
    pub selection: Atom,
    pub target: Atom,
    pub property: Atom,
    pub time: Timestamp,
}
