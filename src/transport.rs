// src/transport.rs
use log::{debug, trace};
use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::scope::ScopeError;
use crate::session::{Connector, Transport, TransportEvent};

// 读超时，决定 IO 线程多久检查一次待发送队列
const READ_TIMEOUT: Duration = Duration::from_millis(5);
const MAX_OUTBOUND_PER_TURN: usize = 10;

/// Opens one WebSocket per `connect`, each serviced by its own IO thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    type Transport = WsTransport;

    fn connect(&mut self, endpoint: &str) -> Result<WsTransport, ScopeError> {
        let (tx_event, rx_event) = channel();
        let (tx_out, rx_out) = channel();
        let endpoint = endpoint.to_owned();
        thread::Builder::new()
            .name("session-io".into())
            .spawn(move || run_connection(&endpoint, &tx_event, &rx_out))
            .map_err(|e| ScopeError::Transport(e.to_string()))?;
        Ok(WsTransport {
            outbound: Some(tx_out),
            events: rx_event,
            finished: false,
        })
    }
}

pub struct WsTransport {
    outbound: Option<Sender<String>>,
    events: Receiver<TransportEvent>,
    finished: bool,
}

impl Transport for WsTransport {
    fn send(&mut self, text: String) -> Result<(), ScopeError> {
        let outbound = self
            .outbound
            .as_ref()
            .ok_or_else(|| ScopeError::Transport("connection already closed".into()))?;
        outbound
            .send(text)
            .map_err(|_| ScopeError::Transport("connection thread has exited".into()))
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    let closed = matches!(event, TransportEvent::Closed(_));
                    events.push(event);
                    if closed {
                        self.finished = true;
                        break;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    // IO thread died without reporting
                    events.push(TransportEvent::Closed(Some(
                        "connection thread exited".into(),
                    )));
                    self.finished = true;
                    break;
                }
            }
        }
        events
    }

    /// Dropping the sender tells the IO thread to close the socket.
    fn close(&mut self) {
        self.outbound.take();
        self.finished = true;
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_connection(endpoint: &str, events: &Sender<TransportEvent>, outbound: &Receiver<String>) {
    let reason = match serve(endpoint, events, outbound) {
        Ok(()) => None,
        Err(e) => Some(e.to_string()),
    };
    debug!("connection to {endpoint} finished ({reason:?})");
    events.send(TransportEvent::Closed(reason)).ok();
}

fn serve(
    endpoint: &str,
    events: &Sender<TransportEvent>,
    outbound: &Receiver<String>,
) -> Result<(), ScopeError> {
    let (mut socket, _response) = tungstenite::connect(endpoint)?;
    if let MaybeTlsStream::Plain(stream) = socket.get_mut() {
        stream
            .set_read_timeout(Some(READ_TIMEOUT))
            .map_err(|e| ScopeError::Transport(e.to_string()))?;
    }
    if events.send(TransportEvent::Opened).is_err() {
        shutdown(&mut socket);
        return Ok(());
    }

    loop {
        // 1. 发送前端命令
        for _ in 0..MAX_OUTBOUND_PER_TURN {
            match outbound.try_recv() {
                Ok(text) => socket.send(Message::Text(text))?,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    shutdown(&mut socket);
                    return Ok(());
                }
            }
        }

        // 2. 读取服务端消息
        match socket.read() {
            Ok(Message::Text(text)) => {
                if events.send(TransportEvent::Message(text)).is_err() {
                    shutdown(&mut socket);
                    return Ok(());
                }
            }
            Ok(Message::Close(frame)) => {
                debug!("server closed the connection: {frame:?}");
                socket.flush().ok();
                return Ok(());
            }
            Ok(other) => trace!("ignoring non-text frame ({} bytes)", other.len()),
            Err(tungstenite::Error::Io(e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(tungstenite::Error::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
}

fn shutdown(socket: &mut WebSocket<MaybeTlsStream<TcpStream>>) {
    socket.close(None).ok();
    socket.flush().ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::Instant;

    fn wait_for<F>(transport: &mut WsTransport, mut done: F) -> Vec<TransportEvent>
    where
        F: FnMut(&[TransportEvent]) -> bool,
    {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = Vec::new();
        while Instant::now() < deadline {
            seen.extend(transport.poll_events());
            if done(&seen) {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        seen
    }

    #[test]
    fn exchanges_text_frames_with_a_server() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut ws = tungstenite::accept(stream).unwrap();
            ws.send(Message::Text(
                r#"{"UpdateFollower":{"name":"Local","latest_move_time":1.5}}"#.into(),
            ))
            .unwrap();
            let reply = ws.read().unwrap();
            ws.close(None).ok();
            while ws.read().is_ok() {}
            reply.into_text().unwrap()
        });

        let mut transport = WsConnector
            .connect(&format!("ws://127.0.0.1:{port}/session"))
            .unwrap();
        let seen = wait_for(&mut transport, |seen| seen.len() >= 2);
        assert_eq!(seen[0], TransportEvent::Opened);
        assert!(matches!(&seen[1], TransportEvent::Message(text) if text.contains("Local")));

        transport.send(r#"{"SetEnabled":true}"#.into()).unwrap();
        assert_eq!(server.join().unwrap(), r#"{"SetEnabled":true}"#);
        let seen = wait_for(&mut transport, |seen| {
            seen.iter().any(|e| matches!(e, TransportEvent::Closed(_)))
        });
        assert!(matches!(seen.last(), Some(TransportEvent::Closed(_))));
        assert!(transport.poll_events().is_empty());
    }

    #[test]
    fn unreachable_endpoint_reports_closed_with_reason() {
        // bind then drop to get a port nothing listens on
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let mut transport = WsConnector
            .connect(&format!("ws://127.0.0.1:{port}/session"))
            .unwrap();
        let seen = wait_for(&mut transport, |seen| !seen.is_empty());
        assert!(matches!(seen.as_slice(), [TransportEvent::Closed(Some(_))]));
    }

    #[test]
    fn closed_transport_refuses_to_send() {
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let mut transport = WsConnector
            .connect(&format!("ws://127.0.0.1:{port}/session"))
            .unwrap();
        transport.close();
        assert!(transport.send("{}".into()).is_err());
        assert!(transport.poll_events().is_empty());
    }
}
