//! Sync session state machine.
//!
//! ```text
//! Disconnected -> Connecting -> AwaitingInitialState -> Live -> Reconnecting -> Connecting ...
//!                                                          \-> Closed (any state, on shutdown)
//! ```
//!
//! The session does no I/O. A driver calls the transition methods as channel
//! events happen and feeds every inbound frame to [`SyncSession::handle_frame`].
//! Messages are handled one at a time through `&mut self`, so the store is
//! never mutated by two handlers at once.
//!
//! Rules:
//! - No delta is applied before a snapshot seeded the current connection.
//!   Earlier deltas are dropped (`Dispatch::Deferred`).
//! - A single undecodable message is dropped; the session stays where it is.
//! - A bootstrap snapshot that arrives once the session is already `Live` is
//!   redundant and ignored.

use std::fmt;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::error::{Result, ViewerError};
use crate::framebuffer::{FramebufferStore, PaintReport, Rect};
use crate::protocol::envelope::{decode_envelope, decode_snapshot, Envelope, Snapshot};
use crate::sink::DisplaySink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    AwaitingInitialState,
    Live,
    Reconnecting,
    Closed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::AwaitingInitialState => "awaiting_initial_state",
            SessionState::Live => "live",
            SessionState::Reconnecting => "reconnecting",
            SessionState::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Snapshot replaced the framebuffer.
    Resynced { width: u32, height: u32 },
    /// Delta applied (possibly partially).
    Painted(PaintReport),
    /// Delta arrived before the first snapshot and was dropped.
    Deferred { records: usize },
    /// Message dropped on a decode or store error.
    Dropped(ViewerError),
    /// Informational message, logged only.
    Notice,
    /// Not relevant in the current state.
    Ignored,
    /// Server is closing the channel; the session is now `Reconnecting`.
    ChannelLost,
}

/// One viewer session: owns the store and the display sink.
pub struct SyncSession<S> {
    state: SessionState,
    store: FramebufferStore,
    sink: S,
}

impl<S: DisplaySink> SyncSession<S> {
    pub fn new(sink: S) -> Self {
        Self {
            state: SessionState::Disconnected,
            store: FramebufferStore::new(),
            sink,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn store(&self) -> &FramebufferStore {
        &self.store
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Let the sink write out anything it deferred.
    pub fn flush_sink(&mut self) {
        self.sink.flush();
    }

    /// `Disconnected | Reconnecting -> Connecting`.
    pub fn begin_connect(&mut self) -> Result<()> {
        match self.state {
            SessionState::Disconnected | SessionState::Reconnecting => {
                self.transition(SessionState::Connecting);
                Ok(())
            }
            other => Err(ViewerError::Internal(format!("cannot connect while {other}"))),
        }
    }

    /// `Connecting -> AwaitingInitialState`.
    pub fn channel_opened(&mut self) -> Result<()> {
        if self.state != SessionState::Connecting {
            return Err(ViewerError::Internal(format!(
                "channel opened while {}",
                self.state
            )));
        }
        self.transition(SessionState::AwaitingInitialState);
        Ok(())
    }

    /// Transport failed: release the framebuffer and wait for a reconnect.
    pub fn channel_failed(&mut self, err: &ViewerError) {
        match self.state {
            SessionState::Closed | SessionState::Reconnecting => {
                debug!(state = %self.state, error = %err, "channel failure ignored");
            }
            _ => {
                warn!(state = %self.state, error = %err, "channel failed");
                self.release();
                self.transition(SessionState::Reconnecting);
            }
        }
    }

    /// Explicit shutdown. Terminal.
    pub fn shutdown(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.release();
        self.transition(SessionState::Closed);
    }

    /// Decode and apply one channel message.
    pub fn handle_frame(&mut self, bytes: Bytes) -> Dispatch {
        if !self.accepts_messages() {
            debug!(state = %self.state, "frame outside of an open channel ignored");
            return Dispatch::Ignored;
        }
        match decode_envelope(bytes) {
            Ok(env) => self.dispatch(env),
            Err(e) => self.drop_message(e),
        }
    }

    /// Apply the result of the out-of-band full state fetch.
    pub fn handle_bootstrap(&mut self, bytes: Bytes) -> Dispatch {
        match self.state {
            SessionState::AwaitingInitialState => match decode_snapshot(bytes) {
                Ok(snap) => self.apply_snapshot(&snap),
                Err(e) => self.drop_message(e),
            },
            SessionState::Live => {
                debug!("redundant bootstrap snapshot ignored");
                Dispatch::Ignored
            }
            _ => Dispatch::Ignored,
        }
    }

    /// Drop a message the transport could not turn into an envelope.
    pub fn drop_message(&mut self, err: ViewerError) -> Dispatch {
        warn!(code = err.code().as_str(), error = %err, "message dropped");
        Dispatch::Dropped(err)
    }

    fn accepts_messages(&self) -> bool {
        matches!(
            self.state,
            SessionState::AwaitingInitialState | SessionState::Live
        )
    }

    fn dispatch(&mut self, env: Envelope) -> Dispatch {
        match env {
            Envelope::Snapshot(snap) => self.apply_snapshot(&snap),
            Envelope::Delta(delta) => {
                if self.state != SessionState::Live {
                    debug!(
                        client = %delta.client,
                        records = delta.painted.len(),
                        "delta before first snapshot dropped"
                    );
                    return Dispatch::Deferred {
                        records: delta.painted.len(),
                    };
                }
                let report = self.store.apply_paint_batch(&delta.painted);
                if report.dropped > 0 {
                    debug!(
                        client = %delta.client,
                        applied = report.applied,
                        dropped = report.dropped,
                        "out-of-range paint records skipped"
                    );
                }
                if let Some(damage) = report.damage {
                    self.present(Some(damage));
                }
                Dispatch::Painted(report)
            }
            Envelope::Lagged { lag } => {
                self.channel_failed(&ViewerError::Channel(format!(
                    "server dropped the channel after lagging {lag} messages"
                )));
                Dispatch::ChannelLost
            }
            Envelope::CurrentlyPainting { client } => {
                info!(%client, "currently painting");
                Dispatch::Notice
            }
            Envelope::Statistics(stats) => {
                for s in &stats {
                    debug!(
                        username = %s.username,
                        pixels_per_s = s.pixels_per_s,
                        avg_response_ms = s.average_response_time_ms,
                        "actor statistics"
                    );
                }
                Dispatch::Notice
            }
        }
    }

    fn apply_snapshot(&mut self, snap: &Snapshot) -> Dispatch {
        if let Err(e) = self.store.replace(snap) {
            warn!(code = e.code().as_str(), error = %e, "snapshot rejected, keeping previous frame");
            return Dispatch::Dropped(e);
        }
        if self.state == SessionState::AwaitingInitialState {
            self.transition(SessionState::Live);
        }
        self.present(None);
        Dispatch::Resynced {
            width: snap.width,
            height: snap.height,
        }
    }

    fn present(&mut self, damage: Option<Rect>) {
        let Some(view) = self.store.current_view() else {
            return;
        };
        match damage {
            Some(rect) => self
                .sink
                .present_region(view.width, view.height, view.pixels, rect),
            None => self.sink.present(view.width, view.height, view.pixels),
        }
    }

    fn release(&mut self) {
        self.store.reset();
        self.sink.reset();
    }

    fn transition(&mut self, next: SessionState) {
        info!(from = %self.state, to = %next, "session state");
        self.state = next;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::protocol::envelope::{encode_envelope, encode_snapshot, Delta};
    use crate::protocol::paint::{PaintBatch, PaintRecord};

    #[derive(Default)]
    struct Frames {
        presented: Vec<(u32, u32, Vec<u8>)>,
        damage: Vec<Rect>,
        resets: usize,
    }

    impl DisplaySink for Frames {
        fn present(&mut self, width: u32, height: u32, pixels: &[u8]) {
            self.presented.push((width, height, pixels.to_vec()));
        }

        fn present_region(&mut self, width: u32, height: u32, pixels: &[u8], damage: Rect) {
            self.damage.push(damage);
            self.present(width, height, pixels);
        }

        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    fn snapshot_frame(width: u32, height: u32, pixels: Vec<u8>) -> Bytes {
        Bytes::from(encode_envelope(&Envelope::Snapshot(Snapshot::new(
            width, height, pixels,
        ))))
    }

    fn delta_frame(records: &[PaintRecord]) -> Bytes {
        Bytes::from(encode_envelope(&Envelope::Delta(Delta {
            client: "tester".into(),
            painted: PaintBatch::from_records(records.iter().copied()),
        })))
    }

    fn awaiting() -> SyncSession<Frames> {
        let mut s = SyncSession::new(Frames::default());
        s.begin_connect().unwrap();
        s.channel_opened().unwrap();
        s
    }

    fn live() -> SyncSession<Frames> {
        let mut s = awaiting();
        s.handle_frame(snapshot_frame(2, 1, vec![255, 0, 0, 255, 0, 255, 0, 255]));
        assert_eq!(s.state(), SessionState::Live);
        s
    }

    #[test]
    fn first_snapshot_goes_live_and_presents() {
        let mut s = awaiting();
        let d = s.handle_frame(snapshot_frame(2, 1, vec![255, 0, 0, 0, 0, 255, 0, 0]));
        assert_eq!(d, Dispatch::Resynced { width: 2, height: 1 });
        assert_eq!(s.state(), SessionState::Live);
        assert_eq!(
            s.sink().presented,
            vec![(2, 1, vec![255, 0, 0, 255, 0, 255, 0, 255])]
        );
    }

    #[test]
    fn delta_before_snapshot_is_not_applied() {
        let mut s = awaiting();
        let d = s.handle_frame(delta_frame(&[PaintRecord::new(0, 0, [1, 2, 3, 4])]));
        assert_eq!(d, Dispatch::Deferred { records: 1 });
        assert!(!s.store().is_seeded());
        assert!(s.sink().presented.is_empty());
        assert_eq!(s.state(), SessionState::AwaitingInitialState);
    }

    #[test]
    fn live_delta_patches_and_presents() {
        let mut s = live();
        let d = s.handle_frame(delta_frame(&[PaintRecord::new(0, 0, [0, 0, 255, 0])]));
        let Dispatch::Painted(report) = d else {
            panic!("expected painted, got {d:?}");
        };
        assert_eq!(report.applied, 1);
        let last = s.sink().presented.last().unwrap();
        assert_eq!(last.2, vec![0, 0, 255, 255, 0, 255, 0, 255]);
    }

    #[test]
    fn delta_hands_its_damage_to_the_sink() {
        let mut s = live();
        s.handle_frame(delta_frame(&[
            PaintRecord::new(1, 0, [1, 1, 1, 1]),
            PaintRecord::new(9, 9, [1, 1, 1, 1]),
        ]));
        assert_eq!(
            s.sink().damage,
            vec![Rect {
                x: 1,
                y: 0,
                width: 1,
                height: 1
            }]
        );

        // snapshots present the whole frame
        s.handle_frame(snapshot_frame(1, 1, vec![0; 4]));
        assert_eq!(s.sink().damage.len(), 1);
    }

    #[test]
    fn live_resize_moves_bounds_to_new_geometry() {
        let mut s = live();
        let d = s.handle_frame(snapshot_frame(3, 2, vec![0; 3 * 2 * 4]));
        assert_eq!(d, Dispatch::Resynced { width: 3, height: 2 });
        assert_eq!(s.state(), SessionState::Live);

        let view = s.store().current_view().unwrap();
        assert_eq!((view.width, view.height), (3, 2));
        assert_eq!(view.pixels.len(), 3 * 2 * 4);

        let d = s.handle_frame(delta_frame(&[PaintRecord::new(2, 1, [4, 5, 6, 0])]));
        let Dispatch::Painted(report) = d else {
            panic!("expected painted, got {d:?}");
        };
        assert_eq!((report.applied, report.dropped), (1, 0));

        let d = s.handle_frame(delta_frame(&[PaintRecord::new(3, 0, [7, 7, 7, 0])]));
        let Dispatch::Painted(report) = d else {
            panic!("expected painted, got {d:?}");
        };
        assert_eq!((report.applied, report.dropped), (0, 1));

        let view = s.store().current_view().unwrap();
        assert_eq!(view.pixels.len(), 3 * 2 * 4);
        assert_eq!(view.pixel(2, 1), Some([4, 5, 6, 255]));
        assert_eq!(view.pixel(0, 0), Some([0, 0, 0, 255]));
        assert_eq!(s.sink().presented.last().unwrap().0, 3);
    }

    #[test]
    fn fully_dropped_delta_does_not_present() {
        let mut s = live();
        let before = s.sink().presented.len();
        let d = s.handle_frame(delta_frame(&[PaintRecord::new(5, 0, [1, 1, 1, 1])]));
        assert_eq!(
            d,
            Dispatch::Painted(PaintReport {
                applied: 0,
                dropped: 1,
                damage: None
            })
        );
        assert_eq!(s.sink().presented.len(), before);
    }

    #[test]
    fn malformed_message_keeps_session_live() {
        let mut s = live();
        let d = s.handle_frame(Bytes::from_static(&[0x78, 0x01]));
        let Dispatch::Dropped(err) = d else {
            panic!("expected dropped, got {d:?}");
        };
        assert_eq!(err.code().as_str(), "MALFORMED");
        assert_eq!(s.state(), SessionState::Live);

        s.handle_frame(delta_frame(&[PaintRecord::new(1, 0, [9, 9, 9, 9])]));
        assert_eq!(
            s.store().current_view().unwrap().pixels,
            &[255, 0, 0, 255, 9, 9, 9, 255]
        );
    }

    #[test]
    fn rejected_snapshot_keeps_previous_frame() {
        let mut s = live();
        let d = s.handle_frame(snapshot_frame(0, 1, Vec::new()));
        assert!(matches!(d, Dispatch::Dropped(ref e) if e.code().as_str() == "BAD_DIMENSIONS"));
        assert_eq!(s.store().current_view().unwrap().width, 2);
        assert_eq!(s.state(), SessionState::Live);
    }

    #[test]
    fn bootstrap_seeds_then_late_bootstrap_is_ignored() {
        let mut s = awaiting();
        let boot = Bytes::from(encode_snapshot(&Snapshot::new(1, 1, vec![1, 2, 3, 4])));
        assert_eq!(
            s.handle_bootstrap(boot.clone()),
            Dispatch::Resynced { width: 1, height: 1 }
        );
        assert_eq!(s.state(), SessionState::Live);

        s.handle_frame(delta_frame(&[PaintRecord::new(0, 0, [7, 7, 7, 7])]));
        assert_eq!(s.handle_bootstrap(boot), Dispatch::Ignored);
        assert_eq!(s.store().current_view().unwrap().pixels, &[7, 7, 7, 255]);
    }

    #[test]
    fn channel_snapshot_wins_race_against_bootstrap() {
        let mut s = awaiting();
        s.handle_frame(snapshot_frame(1, 1, vec![5, 5, 5, 5]));
        let boot = Bytes::from(encode_snapshot(&Snapshot::new(1, 1, vec![1, 1, 1, 1])));
        assert_eq!(s.handle_bootstrap(boot), Dispatch::Ignored);
        assert_eq!(s.store().current_view().unwrap().pixels, &[5, 5, 5, 255]);
    }

    #[test]
    fn lagged_envelope_releases_the_frame() {
        let mut s = live();
        let lag = Bytes::from(encode_envelope(&Envelope::Lagged { lag: 3 }));
        assert_eq!(s.handle_frame(lag), Dispatch::ChannelLost);
        assert_eq!(s.state(), SessionState::Reconnecting);
        assert!(!s.store().is_seeded());
        assert_eq!(s.sink().resets, 1);
    }

    #[test]
    fn reconnect_requires_a_fresh_snapshot() {
        let mut s = live();
        s.channel_failed(&ViewerError::Channel("reset by peer".into()));
        assert_eq!(s.state(), SessionState::Reconnecting);

        s.begin_connect().unwrap();
        s.channel_opened().unwrap();
        let d = s.handle_frame(delta_frame(&[PaintRecord::new(0, 0, [1, 1, 1, 1])]));
        assert_eq!(d, Dispatch::Deferred { records: 1 });
    }

    #[test]
    fn shutdown_is_terminal() {
        let mut s = live();
        s.shutdown();
        assert_eq!(s.state(), SessionState::Closed);
        assert!(!s.store().is_seeded());
        assert!(s.begin_connect().is_err());
        assert_eq!(
            s.handle_frame(snapshot_frame(1, 1, vec![0; 4])),
            Dispatch::Ignored
        );
        s.channel_failed(&ViewerError::Channel("late".into()));
        assert_eq!(s.state(), SessionState::Closed);
    }

    #[test]
    fn invalid_transitions_are_reported() {
        let mut s = SyncSession::new(Frames::default());
        assert_eq!(s.channel_opened().unwrap_err().code().as_str(), "INTERNAL");
        s.begin_connect().unwrap();
        assert!(s.begin_connect().is_err());
    }
}
