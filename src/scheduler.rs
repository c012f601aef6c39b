// src/scheduler.rs
use log::trace;

use crate::scope::{FrameStore, PaintSummary, ScrollRenderer, Surface2D};
use crate::session::{Connector, FollowerDisplaySink, Session, VariableControlSink};

/// What one tick did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub reconnected: bool,
    pub messages: usize,
    pub paint: PaintSummary,
}

/// Drives the viewer once per display tick: reconnect poll, inbound drain, paint.
/// Everything runs on the caller's thread, so messages and paint passes never interleave.
pub struct Scheduler<C: Connector, S: Surface2D> {
    session: Session<C>,
    store: FrameStore,
    renderer: ScrollRenderer,
    surface: S,
}

impl<C: Connector, S: Surface2D> Scheduler<C, S> {
    pub fn new(session: Session<C>, renderer: ScrollRenderer, surface: S) -> Self {
        Self {
            session,
            store: FrameStore::new(),
            renderer,
            surface,
        }
    }

    pub fn tick<D>(&mut self, display: &mut D) -> TickReport
    where
        D: VariableControlSink + FollowerDisplaySink,
    {
        let reconnected = self.session.needs_reconnect();
        if reconnected {
            self.session.connect();
        }
        let messages = self.session.pump(&mut self.store, display);
        let paint = self.renderer.paint(&mut self.store, &mut self.surface);
        let report = TickReport {
            reconnected,
            messages,
            paint,
        };
        trace!("tick: {report:?}");
        report
    }

    pub fn session(&self) -> &Session<C> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<C> {
        &mut self.session
    }

    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ActivityScale;
    use crate::scope::PixmapSurface;
    use crate::session::testing::{RecordingDisplay, ScriptedConnector};
    use crate::session::{ConnectionState, TransportEvent};

    fn scheduler(connector: &ScriptedConnector) -> Scheduler<ScriptedConnector, PixmapSurface> {
        Scheduler::new(
            Session::new(connector.clone(), "ws://localhost:8080/session"),
            ScrollRenderer::new(0.8, ActivityScale::Logarithmic),
            PixmapSurface::new(400, 100).unwrap(),
        )
    }

    #[test]
    fn initialize_then_frames_paint_on_the_same_tick() {
        let connector = ScriptedConnector::default();
        let mut scheduler = scheduler(&connector);
        let mut display = RecordingDisplay::default();
        connector.push(TransportEvent::Opened);
        connector.push_message(r#"{"Initialize":{"enabled":false,"variables":{"gain":2.5}}}"#);
        connector.push_message(
            r#"{"NewFrequenciesFrames":{"server_index":0,"frames":[
                [{"time":0.4,"values":[[1.0]]}],
                [{"time":0.4,"values":[[1.0]]}],
                [{"time":0.4,"values":[[1.0]]}],
                [{"time":0.4,"values":[[1.0]]}]]}}"#,
        );
        let report = scheduler.tick(&mut display);
        assert!(report.reconnected);
        assert_eq!(report.messages, 2);
        assert_eq!(report.paint.servers_painted, 1);
        assert!(report.paint.is_dirty());
        assert_eq!(scheduler.session().state(), ConnectionState::Open);
        assert_eq!(display.variables.get("gain"), Some(&2.5));
        // bottom half of channel 0 carries the newest cell at its right edge
        let pixel = scheduler.surface().pixel(99, 99).unwrap();
        assert_eq!(pixel[3], 255);
        assert_ne!(pixel[..3], [0, 0, 0]);
        let server = scheduler.store().server(0).unwrap();
        assert_eq!(server.latest_drawn_frame_time(), 0.4);
    }

    #[test]
    fn idle_tick_paints_nothing() {
        let connector = ScriptedConnector::default();
        let mut scheduler = scheduler(&connector);
        let mut display = RecordingDisplay::default();
        connector.push(TransportEvent::Opened);
        scheduler.tick(&mut display);
        let report = scheduler.tick(&mut display);
        assert!(!report.reconnected);
        assert_eq!(report.messages, 0);
        assert!(!report.paint.is_dirty());
    }

    #[test]
    fn closed_connection_is_reopened_on_the_next_tick() {
        let connector = ScriptedConnector::default();
        let mut scheduler = scheduler(&connector);
        let mut display = RecordingDisplay::default();
        connector.push(TransportEvent::Opened);
        scheduler.tick(&mut display);
        connector.push(TransportEvent::Closed(None));
        scheduler.tick(&mut display);
        assert_eq!(scheduler.session().state(), ConnectionState::Disconnected);
        let report = scheduler.tick(&mut display);
        assert!(report.reconnected);
        assert_eq!(scheduler.session().state(), ConnectionState::Connecting);
        let wire = connector.wire.borrow();
        assert_eq!(wire.connects, 2);
        assert_eq!(wire.closes, 1);
    }

    #[test]
    fn controls_reach_the_wire_through_the_session() {
        let connector = ScriptedConnector::default();
        let mut scheduler = scheduler(&connector);
        let mut display = RecordingDisplay::default();
        connector.push(TransportEvent::Opened);
        scheduler.tick(&mut display);
        assert!(scheduler.session_mut().set_variable("gain", 3.0));
        assert_eq!(
            connector.wire.borrow().sent,
            vec![r#"{"SetVariable":["gain",3.0]}"#.to_owned()]
        );
    }
}
