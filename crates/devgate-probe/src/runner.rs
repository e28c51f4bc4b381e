use futures_util::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

use crate::events::{
    EventGate, GateState, ProbeEvent, ProbeHandler, ABNORMAL_CLOSURE, NO_STATUS_RECEIVED,
};

/// What happened during a probe run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub opened: bool,
    pub messages: usize,
    pub error: Option<String>,
    pub close_code: Option<u16>,
    pub close_reason: Option<String>,
}

struct ProbeSession<'a, H: ProbeHandler + ?Sized> {
    gate: EventGate,
    handler: &'a mut H,
    outcome: ProbeOutcome,
}

impl<'a, H: ProbeHandler + ?Sized> ProbeSession<'a, H> {
    fn new(handler: &'a mut H) -> Self {
        Self {
            gate: EventGate::new(),
            handler,
            outcome: ProbeOutcome::default(),
        }
    }

    fn emit(&mut self, event: ProbeEvent) {
        let snapshot = event.clone();
        if !self.gate.dispatch(&mut *self.handler, event) {
            debug!("Dropped {:?} in state {:?}", snapshot, self.gate.state());
            return;
        }
        match snapshot {
            ProbeEvent::Open => self.outcome.opened = true,
            ProbeEvent::Message(_) => self.outcome.messages += 1,
            ProbeEvent::Error(error) => self.outcome.error = Some(error),
            ProbeEvent::Close { code, reason } => {
                self.outcome.close_code = Some(code);
                self.outcome.close_reason = Some(reason);
            }
        }
    }

    fn fail(&mut self, error: String) {
        self.emit(ProbeEvent::Error(error));
        self.emit(ProbeEvent::Close {
            code: ABNORMAL_CLOSURE,
            reason: String::new(),
        });
    }

    fn finish(mut self) -> ProbeOutcome {
        if self.gate.state() != GateState::Closed {
            self.emit(ProbeEvent::Close {
                code: ABNORMAL_CLOSURE,
                reason: String::new(),
            });
        }
        self.outcome
    }
}

/// Open one connection and report its lifecycle to `handler`.
///
/// Runs until the server closes the connection or the transport fails.
/// Transport failures are reported through `on_error`/`on_close`, never
/// returned.
pub async fn run_probe<H>(url: &str, handler: &mut H) -> ProbeOutcome
where
    H: ProbeHandler + ?Sized,
{
    let mut session = ProbeSession::new(handler);
    debug!("Connecting to {}", url.split('?').next().unwrap_or(url));

    let mut stream = match connect_async(url).await {
        Ok((stream, response)) => {
            debug!("Handshake completed with status {}", response.status());
            stream
        }
        Err(e) => {
            session.fail(e.to_string());
            return session.finish();
        }
    };
    session.emit(ProbeEvent::Open);

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => session.emit(ProbeEvent::Message(text)),
            Ok(Message::Binary(data)) => session.emit(ProbeEvent::Message(
                String::from_utf8_lossy(&data).into_owned(),
            )),
            Ok(Message::Close(frame)) => {
                let (code, reason) = frame
                    .map(|f| (u16::from(f.code), f.reason.into_owned()))
                    .unwrap_or((NO_STATUS_RECEIVED, String::new()));
                session.emit(ProbeEvent::Close { code, reason });
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
            Err(e) => {
                session.fail(e.to_string());
                break;
            }
        }
    }

    let outcome = session.finish();
    info!(
        opened = outcome.opened,
        messages = outcome.messages,
        close_code = outcome.close_code.unwrap_or_default(),
        "Probe finished"
    );
    outcome
}
