use std::io::Write;

use tracing::{debug, error, warn};

use pclipsync_frame::{FrameWriter, MAX_CONTENT_SIZE};
use pclipsync_x11::{
    ConversionRequest, Selection, SelectionAdapter, SelectionError, SelectionEvent,
};

use crate::error::Result;
use crate::guard::{fingerprint, EchoGuard};

/// What the engine should do after an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The peer announced a clean shutdown (empty frame).
    Goodbye,
}

/// The engine's view of the X selection adapter.
///
/// Exists so the synchronization paths can be exercised against an
/// in-memory double; the production impl is [`SelectionAdapter`].
pub trait Selections {
    fn read_text(&mut self, selection: Selection)
        -> std::result::Result<Option<Vec<u8>>, SelectionError>;
    fn set_text(
        &mut self,
        selection: Selection,
        payload: &[u8],
    ) -> std::result::Result<bool, SelectionError>;
    fn answer(&mut self, request: &ConversionRequest) -> std::result::Result<(), SelectionError>;
    fn drain_pending(&mut self) -> std::result::Result<Vec<SelectionEvent>, SelectionError>;
}

impl Selections for SelectionAdapter {
    fn read_text(
        &mut self,
        selection: Selection,
    ) -> std::result::Result<Option<Vec<u8>>, SelectionError> {
        SelectionAdapter::read_text(self, selection)
    }

    fn set_text(
        &mut self,
        selection: Selection,
        payload: &[u8],
    ) -> std::result::Result<bool, SelectionError> {
        SelectionAdapter::set_text(self, selection, payload)
    }

    fn answer(&mut self, request: &ConversionRequest) -> std::result::Result<(), SelectionError> {
        SelectionAdapter::answer(self, request)
    }

    fn drain_pending(&mut self) -> std::result::Result<Vec<SelectionEvent>, SelectionError> {
        SelectionAdapter::drain_pending(self)
    }
}

impl<S: Selections + ?Sized> Selections for &mut S {
    fn read_text(
        &mut self,
        selection: Selection,
    ) -> std::result::Result<Option<Vec<u8>>, SelectionError> {
        (**self).read_text(selection)
    }

    fn set_text(
        &mut self,
        selection: Selection,
        payload: &[u8],
    ) -> std::result::Result<bool, SelectionError> {
        (**self).set_text(selection, payload)
    }

    fn answer(&mut self, request: &ConversionRequest) -> std::result::Result<(), SelectionError> {
        (**self).answer(request)
    }

    fn drain_pending(&mut self) -> std::result::Result<Vec<SelectionEvent>, SelectionError> {
        (**self).drain_pending()
    }
}

/// Per-connection synchronization state: the selections port, the framed
/// peer writer and the echo-guard. Created fresh for every peer channel,
/// which also gives a reconnecting client its empty guard slots.
pub struct SyncEngine<S, W> {
    selections: S,
    writer: FrameWriter<W>,
    guard: EchoGuard,
}

impl<S: Selections, W: Write> SyncEngine<S, W> {
    pub fn new(selections: S, writer: FrameWriter<W>) -> Self {
        Self {
            selections,
            writer,
            guard: EchoGuard::new(),
        }
    }

    /// Dispatch every selection event currently pending, re-draining after
    /// each batch since handling one event can surface more.
    pub fn dispatch_x(&mut self) -> Result<()> {
        loop {
            let events = self.selections.drain_pending()?;
            if events.is_empty() {
                return Ok(());
            }
            for event in events {
                self.handle_event(event)?;
            }
        }
    }

    pub fn handle_event(&mut self, event: SelectionEvent) -> Result<()> {
        match event {
            SelectionEvent::OwnerChanged {
                selection,
                owned_by_us,
            } => self.handle_owner_changed(selection, owned_by_us),
            SelectionEvent::ConversionRequested(request) => {
                self.selections.answer(&request)?;
                Ok(())
            }
        }
    }

    /// Outbound path: a selection changed hands locally.
    fn handle_owner_changed(&mut self, selection: Selection, owned_by_us: bool) -> Result<()> {
        if owned_by_us {
            debug!(
                selection = selection.name(),
                "we own the selection, skipping read"
            );
            return Ok(());
        }

        let Some(payload) = self.selections.read_text(selection)? else {
            debug!(
                selection = selection.name(),
                "no text available, skipping"
            );
            return Ok(());
        };
        if payload.is_empty() {
            // An empty frame would read as a goodbye on the other side.
            debug!(selection = selection.name(), "empty selection, skipping");
            return Ok(());
        }
        if payload.len() > MAX_CONTENT_SIZE {
            warn!(
                bytes = payload.len(),
                "clipboard content exceeds 10 MiB limit, skipping"
            );
            return Ok(());
        }

        let fp = fingerprint(&payload);
        if !self.guard.should_send(&fp) {
            debug!(
                selection = selection.name(),
                "suppressing duplicate or echoed content"
            );
            return Ok(());
        }

        self.writer.send(&payload)?;
        self.guard.record_sent(fp);
        debug!(
            bytes = payload.len(),
            selection = selection.name(),
            "sent clipboard update to peer"
        );
        Ok(())
    }

    /// Inbound path: one successfully framed peer message.
    ///
    /// The fingerprint is recorded before any selection is touched so the
    /// ownership-change events our own `set_text` triggers are recognized
    /// as echoes.
    pub fn handle_incoming(&mut self, payload: &[u8]) -> Result<Flow> {
        if payload.is_empty() {
            debug!("peer sent goodbye");
            return Ok(Flow::Goodbye);
        }

        self.guard.record_received(fingerprint(payload));

        if !self.selections.set_text(Selection::Clipboard, payload)? {
            error!("failed to set CLIPBOARD selection");
        }
        if !self.selections.set_text(Selection::Primary, payload)? {
            error!("failed to set PRIMARY selection");
        }
        debug!(bytes = payload.len(), "applied clipboard update from peer");
        Ok(Flow::Continue)
    }

    /// Tell the peer we are going away. Best effort; the channel may
    /// already be gone.
    pub fn send_goodbye(&mut self) {
        if self.writer.send(&[]).is_err() {
            debug!("peer channel already closed, goodbye not delivered");
        }
    }

    pub fn guard(&self) -> &EchoGuard {
        &self.guard
    }

    pub fn writer(&self) -> &FrameWriter<W> {
        &self.writer
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::Cursor;

    use bytes::BytesMut;
    use pclipsync_frame::decode_frame;

    use super::*;

    #[derive(Default)]
    struct MockSelections {
        text: Option<Vec<u8>>,
        reads: usize,
        set_calls: Vec<(Selection, Vec<u8>)>,
        set_result: bool,
        answered: Vec<ConversionRequest>,
        batches: VecDeque<Vec<SelectionEvent>>,
    }

    impl MockSelections {
        fn with_text(text: &[u8]) -> Self {
            Self {
                text: Some(text.to_vec()),
                set_result: true,
                ..Self::default()
            }
        }
    }

    impl Selections for MockSelections {
        fn read_text(
            &mut self,
            _selection: Selection,
        ) -> std::result::Result<Option<Vec<u8>>, SelectionError> {
            self.reads += 1;
            Ok(self.text.clone())
        }

        fn set_text(
            &mut self,
            selection: Selection,
            payload: &[u8],
        ) -> std::result::Result<bool, SelectionError> {
            self.set_calls.push((selection, payload.to_vec()));
            Ok(self.set_result)
        }

        fn answer(
            &mut self,
            request: &ConversionRequest,
        ) -> std::result::Result<(), SelectionError> {
            self.answered.push(*request);
            Ok(())
        }

        fn drain_pending(
            &mut self,
        ) -> std::result::Result<Vec<SelectionEvent>, SelectionError> {
            Ok(self.batches.pop_front().unwrap_or_default())
        }
    }

    fn new_engine(mock: MockSelections) -> SyncEngine<MockSelections, Cursor<Vec<u8>>> {
        SyncEngine::new(mock, FrameWriter::new(Cursor::new(Vec::new())))
    }

    fn sent_frames<S: Selections>(engine: &SyncEngine<S, Cursor<Vec<u8>>>) -> Vec<Vec<u8>> {
        let mut buf = BytesMut::from(engine.writer().get_ref().get_ref().as_slice());
        let mut frames = Vec::new();
        while let Some(frame) = decode_frame(&mut buf).unwrap() {
            frames.push(frame.to_vec());
        }
        frames
    }

    fn owner_changed(selection: Selection) -> SelectionEvent {
        SelectionEvent::OwnerChanged {
            selection,
            owned_by_us: false,
        }
    }

    #[test]
    fn fresh_engine_has_empty_guard_slots() {
        let engine = new_engine(MockSelections::default());
        assert!(engine.guard().last_sent().is_none());
        assert!(engine.guard().last_received().is_none());
    }

    #[test]
    fn ownership_change_sends_fresh_content() {
        let mut engine = new_engine(MockSelections::with_text(b"fresh"));
        engine.handle_event(owner_changed(Selection::Clipboard)).unwrap();

        assert_eq!(sent_frames(&engine), vec![b"fresh".to_vec()]);
        assert_eq!(engine.guard().last_sent(), Some(fingerprint(b"fresh").as_str()));
    }

    #[test]
    fn received_content_does_not_echo_back() {
        // The peer sends "foo"; setting the selections fires a local
        // ownership-change whose read returns the same bytes. Nothing may
        // go back out.
        let mut engine = new_engine(MockSelections::with_text(b"foo"));
        assert_eq!(engine.handle_incoming(b"foo").unwrap(), Flow::Continue);
        engine.handle_event(owner_changed(Selection::Clipboard)).unwrap();

        assert!(sent_frames(&engine).is_empty());
    }

    #[test]
    fn double_selection_change_sends_once() {
        // CLIPBOARD and PRIMARY change to the same content in one burst;
        // only the first survives the guard.
        let mut engine = new_engine(MockSelections::with_text(b"bar"));
        engine.handle_event(owner_changed(Selection::Clipboard)).unwrap();
        engine.handle_event(owner_changed(Selection::Primary)).unwrap();

        assert_eq!(sent_frames(&engine), vec![b"bar".to_vec()]);
    }

    #[test]
    fn changed_content_sends_again() {
        let mut engine = new_engine(MockSelections::with_text(b"first"));
        engine.handle_event(owner_changed(Selection::Clipboard)).unwrap();
        engine.selections.text = Some(b"second".to_vec());
        engine.handle_event(owner_changed(Selection::Clipboard)).unwrap();

        assert_eq!(
            sent_frames(&engine),
            vec![b"first".to_vec(), b"second".to_vec()]
        );
    }

    #[test]
    fn non_text_selection_is_ignored() {
        let mut mock = MockSelections::default();
        mock.text = None;
        let mut engine = new_engine(mock);
        engine.handle_event(owner_changed(Selection::Clipboard)).unwrap();

        assert!(sent_frames(&engine).is_empty());
        assert!(engine.guard().last_sent().is_none());
    }

    #[test]
    fn empty_selection_is_never_sent() {
        let mut engine = new_engine(MockSelections::with_text(b""));
        engine.handle_event(owner_changed(Selection::Clipboard)).unwrap();

        assert!(sent_frames(&engine).is_empty());
        assert!(engine.guard().last_sent().is_none());
    }

    #[test]
    fn oversized_content_is_skipped() {
        let mut engine = new_engine(MockSelections::with_text(&vec![b'x'; MAX_CONTENT_SIZE + 1]));
        engine.handle_event(owner_changed(Selection::Clipboard)).unwrap();

        assert!(sent_frames(&engine).is_empty());
    }

    #[test]
    fn own_ownership_change_skips_the_read() {
        let mut engine = new_engine(MockSelections::with_text(b"ours"));
        engine
            .handle_event(SelectionEvent::OwnerChanged {
                selection: Selection::Clipboard,
                owned_by_us: true,
            })
            .unwrap();

        assert_eq!(engine.selections.reads, 0);
        assert!(sent_frames(&engine).is_empty());
    }

    #[test]
    fn incoming_sets_both_selections() {
        let mut engine = new_engine(MockSelections::with_text(b""));
        assert_eq!(engine.handle_incoming(b"payload").unwrap(), Flow::Continue);

        assert_eq!(
            engine.selections.set_calls,
            vec![
                (Selection::Clipboard, b"payload".to_vec()),
                (Selection::Primary, b"payload".to_vec()),
            ]
        );
    }

    #[test]
    fn incoming_records_fingerprint_even_when_set_fails() {
        let mut mock = MockSelections::with_text(b"");
        mock.set_result = false;
        let mut engine = new_engine(mock);

        assert_eq!(engine.handle_incoming(b"payload").unwrap(), Flow::Continue);
        assert_eq!(
            engine.guard().last_received(),
            Some(fingerprint(b"payload").as_str())
        );
    }

    #[test]
    fn empty_frame_is_goodbye() {
        let mut engine = new_engine(MockSelections::with_text(b""));
        assert_eq!(engine.handle_incoming(b"").unwrap(), Flow::Goodbye);
        assert!(engine.selections.set_calls.is_empty());
        assert!(engine.guard().last_received().is_none());
    }

    #[test]
    fn conversion_requests_are_answered() {
        let request = ConversionRequest {
            requestor: 42,
            selection: 1,
            target: 2,
            property: 3,
            time: 0,
        };
        let mut engine = new_engine(MockSelections::default());
        engine
            .handle_event(SelectionEvent::ConversionRequested(request))
            .unwrap();

        assert_eq!(engine.selections.answered.len(), 1);
        assert_eq!(engine.selections.answered[0].requestor, 42);
        assert!(sent_frames(&engine).is_empty());
    }

    #[test]
    fn dispatch_x_redrains_until_quiet() {
        let mut mock = MockSelections::with_text(b"one");
        mock.batches = VecDeque::from(vec![
            vec![owner_changed(Selection::Clipboard)],
            vec![owner_changed(Selection::Primary)],
        ]);
        let mut engine = new_engine(mock);
        engine.dispatch_x().unwrap();

        // Second batch carried the duplicate PRIMARY notification.
        assert_eq!(sent_frames(&engine), vec![b"one".to_vec()]);
    }

    #[test]
    fn send_goodbye_emits_empty_frame() {
        let mut engine = new_engine(MockSelections::default());
        engine.send_goodbye();
        assert_eq!(
            engine.writer().get_ref().get_ref().as_slice(),
            b"0:,"
        );
    }
}
