use std::collections::VecDeque;
use std::io::ErrorKind;
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

use tracing::{debug, error};
use x11rb::connection::Connection;
use x11rb::errors::ReplyError;
use x11rb::protocol::xfixes::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{
    Atom, AtomEnum, ConnectionExt as _, CreateWindowAux, EventMask, GetPropertyType, PropMode,
    SelectionNotifyEvent, Window, WindowClass, SELECTION_NOTIFY_EVENT,
};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;
use x11rb::{CURRENT_TIME, NONE};

use crate::error::{Result, SelectionError};
use crate::event::{ConversionRequest, Selection, SelectionEvent};

/// Deadline for a selection owner to answer a conversion request.
///
/// An unresponsive owner must not stall the event loop longer than this.
pub const CONVERT_TIMEOUT: Duration = Duration::from_secs(2);

x11rb::atom_manager! {
    /// Atoms interned once at adapter startup.
    Atoms:
    AtomsCookie {
        CLIPBOARD,
        UTF8_STRING,
        TARGETS,
        INCR,
        PCLIPSYNC_SELECTION,
    }
}

/// Access to the X11 selections through one display connection and one
/// 1×1 unmapped owner window.
///
/// The adapter caches the payload it is currently serving, tracks which
/// selections the owner window holds, and defers unrelated events that
/// arrive during a conversion wait so the engine sees them later.
pub struct SelectionAdapter {
    conn: RustConnection,
    window: Window,
    atoms: Atoms,
    served: Vec<u8>,
    owned: [bool; 2],
    deferred: VecDeque<SelectionEvent>,
}

impl SelectionAdapter {
    /// Open the display named by `DISPLAY` and create the owner window.
    ///
    /// Fails fast with a clear message when the variable is unset or the
    /// connection cannot be established.
    pub fn open() -> Result<Self> {
        if std::env::var_os("DISPLAY").map_or(true, |v| v.is_empty()) {
            return Err(SelectionError::DisplayNotSet);
        }

        let (conn, screen_num) = RustConnection::connect(None)?;
        let atoms = Atoms::new(&conn)?.reply()?;
        let root = conn.setup().roots[screen_num].root;

        let window = conn.generate_id()?;
        conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            window,
            root,
            0,
            0,
            1,
            1,
            0,
            WindowClass::INPUT_OUTPUT,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new().event_mask(EventMask::PROPERTY_CHANGE),
        )?;
        conn.flush()?;
        debug!(window, "created selection owner window");

        Ok(Self {
            conn,
            window,
            atoms,
            served: Vec::new(),
            owned: [false; 2],
            deferred: VecDeque::new(),
        })
    }

    /// Register for XFixes ownership notifications on both selections.
    pub fn subscribe_all(&self) -> Result<()> {
        self.conn.xfixes_query_version(5, 0)?.reply()?;
        for selection in Selection::ALL {
            self.subscribe(selection)?;
        }
        self.conn.flush()?;
        Ok(())
    }

    /// Register for ownership notifications on one selection.
    pub fn subscribe(&self, selection: Selection) -> Result<()> {
        self.conn.xfixes_select_selection_input(
            self.window,
            self.atom_of(selection),
            xfixes::SelectionEventMask::SET_SELECTION_OWNER,
        )?;
        Ok(())
    }

    /// The display connection's file descriptor, for readiness polling.
    pub fn display_fd(&self) -> RawFd {
        self.conn.stream().as_raw_fd()
    }

    /// Whether our owner window currently holds `selection`.
    pub fn owns(&self, selection: Selection) -> bool {
        self.owned[selection.index()]
    }

    /// Read the text contents of `selection` from its current owner.
    ///
    /// When we own the selection ourselves the cached payload is returned
    /// without an X round-trip. Otherwise a `UTF8_STRING` conversion is
    /// requested into the transfer property on the owner window and the
    /// owner's `SelectionNotify` is awaited for up to [`CONVERT_TIMEOUT`].
    /// Timeouts, refusals, empty values, INCR offers, non-text replies and
    /// per-request X errors all yield `Ok(None)`.
    pub fn read_text(&mut self, selection: Selection) -> Result<Option<Vec<u8>>> {
        if self.owns(selection) {
            if self.served.is_empty() {
                return Ok(None);
            }
            return Ok(Some(self.served.clone()));
        }

        let selection_atom = self.atom_of(selection);
        self.conn
            .delete_property(self.window, self.atoms.PCLIPSYNC_SELECTION)?;
        self.conn.convert_selection(
            self.window,
            selection_atom,
            self.atoms.UTF8_STRING,
            self.atoms.PCLIPSYNC_SELECTION,
            CURRENT_TIME,
        )?;
        self.conn.flush()?;

        let Some(notify) = self.wait_for_notify(selection_atom)? else {
            debug!(
                selection = selection.name(),
                "selection conversion timed out"
            );
            return Ok(None);
        };
        if notify.property == NONE {
            debug!(selection = selection.name(), "owner refused conversion");
            return Ok(None);
        }

        let reply = match self
            .conn
            .get_property(
                true,
                self.window,
                self.atoms.PCLIPSYNC_SELECTION,
                GetPropertyType::ANY,
                0,
                u32::MAX,
            )?
            .reply()
        {
            Ok(reply) => reply,
            Err(ReplyError::ConnectionError(err)) => return Err(err.into()),
            Err(ReplyError::X11Error(err)) => {
                debug!(?err, "selection property read failed");
                return Ok(None);
            }
        };

        if reply.type_ == self.atoms.INCR {
            debug!(
                selection = selection.name(),
                "owner offered an INCR transfer, unsupported"
            );
            return Ok(None);
        }
        if reply.type_ != self.atoms.UTF8_STRING {
            debug!(
                selection = selection.name(),
                reply_type = reply.type_,
                "owner replied with a non-text target"
            );
            return Ok(None);
        }
        if reply.value.is_empty() {
            debug!(selection = selection.name(), "selection is empty");
            return Ok(None);
        }
        Ok(Some(reply.value))
    }

    /// Assert ownership of `selection` and cache `payload` as the content
    /// to serve. Returns `false` when ownership could not be acquired.
    pub fn set_text(&mut self, selection: Selection, payload: &[u8]) -> Result<bool> {
        self.served = payload.to_vec();

        let selection_atom = self.atom_of(selection);
        self.conn
            .set_selection_owner(self.window, selection_atom, CURRENT_TIME)?;
        self.conn.flush()?;

        let owner = match self.conn.get_selection_owner(selection_atom)?.reply() {
            Ok(reply) => reply.owner,
            Err(ReplyError::ConnectionError(err)) => return Err(err.into()),
            Err(ReplyError::X11Error(err)) => {
                error!(?err, "selection ownership query failed");
                return Ok(false);
            }
        };
        if owner != self.window {
            error!(
                selection = selection.name(),
                "failed to acquire selection ownership"
            );
            return Ok(false);
        }
        self.owned[selection.index()] = true;
        Ok(true)
    }

    /// Answer a conversion request against the cached payload.
    ///
    /// `TARGETS` lists what we serve, `UTF8_STRING` and `STRING` deliver the
    /// bytes, and anything else is refused with property `None`. Exactly one
    /// `SelectionNotify` is sent either way.
    pub fn answer(&mut self, request: &ConversionRequest) -> Result<()> {
        // Obsolete requestors leave property unset; ICCCM says reply into
        // the target atom instead.
        let property = if request.property == NONE {
            request.target
        } else {
            request.property
        };

        let string_atom = Atom::from(AtomEnum::STRING);
        let delivered = if request.target == self.atoms.TARGETS {
            let targets = [self.atoms.TARGETS, self.atoms.UTF8_STRING, string_atom];
            self.conn.change_property32(
                PropMode::REPLACE,
                request.requestor,
                property,
                AtomEnum::ATOM,
                &targets,
            )?;
            true
        } else if request.target == self.atoms.UTF8_STRING || request.target == string_atom {
            self.conn.change_property8(
                PropMode::REPLACE,
                request.requestor,
                property,
                request.target,
                &self.served,
            )?;
            true
        } else {
            debug!(
                requested = request.target,
                "refusing unsupported conversion target"
            );
            false
        };

        let notify = SelectionNotifyEvent {
            response_type: SELECTION_NOTIFY_EVENT,
            sequence: 0,
            time: request.time,
            requestor: request.requestor,
            selection: request.selection,
            target: request.target,
            property: if delivered { property } else { NONE },
        };
        self.conn
            .send_event(false, request.requestor, EventMask::NO_EVENT, notify)?;
        self.conn.flush()?;
        Ok(())
    }

    /// Return all selection events already queued on the connection,
    /// without blocking. Events deferred during conversion waits come
    /// first.
    pub fn drain_pending(&mut self) -> Result<Vec<SelectionEvent>> {
        let mut events: Vec<SelectionEvent> = self.deferred.drain(..).collect();
        while let Some(event) = self.conn.poll_for_event()? {
            if let Some(translated) = self.translate(event) {
                events.push(translated);
            }
        }
        Ok(events)
    }

    /// Await the `SelectionNotify` answering our conversion request,
    /// deferring unrelated selection events encountered along the way.
    fn wait_for_notify(&mut self, selection_atom: Atom) -> Result<Option<SelectionNotifyEvent>> {
        let deadline = Instant::now() + CONVERT_TIMEOUT;
        loop {
            while let Some(event) = self.conn.poll_for_event()? {
                match event {
                    Event::SelectionNotify(notify)
                        if notify.requestor == self.window
                            && notify.selection == selection_atom =>
                    {
                        return Ok(Some(notify));
                    }
                    other => self.defer(other),
                }
            }
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return Ok(None);
            };
            wait_fd_readable(self.display_fd(), remaining)?;
        }
    }

    fn defer(&mut self, event: Event) {
        if let Some(translated) = self.translate(event) {
            self.deferred.push_back(translated);
        }
    }

    fn translate(&mut self, event: Event) -> Option<SelectionEvent> {
        match event {
            Event::XfixesSelectionNotify(notify) => {
                let selection = self.selection_of(notify.selection)?;
                let owned_by_us = notify.owner == self.window;
                self.owned[selection.index()] = owned_by_us;
                Some(SelectionEvent::OwnerChanged {
                    selection,
                    owned_by_us,
                })
            }
            Event::SelectionRequest(request) => {
                Some(SelectionEvent::ConversionRequested(ConversionRequest {
                    requestor: request.requestor,
                    selection: request.selection,
                    target: request.target,
                    property: request.property,
                    time: request.time,
                }))
            }
            Event::Error(err) => {
                // A requestor that vanished mid-answer, typically.
                debug!(?err, "ignoring asynchronous X11 error");
                None
            }
            _ => None,
        }
    }

    fn atom_of(&self, selection: Selection) -> Atom {
        match selection {
            Selection::Clipboard => self.atoms.CLIPBOARD,
            Selection::Primary => Atom::from(AtomEnum::PRIMARY),
        }
    }

    fn selection_of(&self, atom: Atom) -> Option<Selection> {
        if atom == self.atoms.CLIPBOARD {
            Some(Selection::Clipboard)
        } else if atom == Atom::from(AtomEnum::PRIMARY) {
            Some(Selection::Primary)
        } else {
            None
        }
    }
}

/// Wait until `fd` is readable or `timeout` expires.
///
/// Returns `Ok(false)` on timeout or signal interruption.
fn wait_fd_readable(fd: RawFd, timeout: Duration) -> std::io::Result<bool> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;
    // SAFETY: `pollfd` is a valid, writable pollfd for the duration of the call.
    let rc = unsafe { libc::poll(&mut pollfd, 1, millis.max(1)) };
    if rc < 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() == ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    Ok(rc > 0)
}
