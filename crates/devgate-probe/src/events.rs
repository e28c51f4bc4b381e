/// Close code reported when the connection ends without a close frame
pub const ABNORMAL_CLOSURE: u16 = 1006;
/// Close code reported for a close frame without a status
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// A connection lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeEvent {
    Open,
    Message(String),
    Error(String),
    Close { code: u16, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Connecting,
    Open,
    Closed,
}

/// Orders lifecycle events the way a browser WebSocket does.
///
/// `open` only while connecting, `message` only while open, `error` until
/// closed, `close` once. Everything after `close` is dropped.
#[derive(Debug)]
pub struct EventGate {
    state: GateState,
}

impl Default for EventGate {
    fn default() -> Self {
        Self::new()
    }
}

impl EventGate {
    pub fn new() -> Self {
        Self {
            state: GateState::Connecting,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Whether the event may be delivered; advances the state if so
    pub fn admit(&mut self, event: &ProbeEvent) -> bool {
        match (self.state, event) {
            (GateState::Connecting, ProbeEvent::Open) => {
                self.state = GateState::Open;
                true
            }
            (GateState::Open, ProbeEvent::Message(_)) => true,
            (GateState::Connecting | GateState::Open, ProbeEvent::Error(_)) => true,
            (GateState::Connecting | GateState::Open, ProbeEvent::Close { .. }) => {
                self.state = GateState::Closed;
                true
            }
            _ => false,
        }
    }

    /// Deliver the event to the handler if the gate admits it
    pub fn dispatch<H>(&mut self, handler: &mut H, event: ProbeEvent) -> bool
    where
        H: ProbeHandler + ?Sized,
    {
        if !self.admit(&event) {
            return false;
        }
        match event {
            ProbeEvent::Open => handler.on_open(),
            ProbeEvent::Message(payload) => handler.on_message(&payload),
            ProbeEvent::Error(error) => handler.on_error(&error),
            ProbeEvent::Close { code, reason } => handler.on_close(code, &reason),
        }
        true
    }
}

/// Receives the probe's lifecycle events
pub trait ProbeHandler: Send {
    fn on_open(&mut self);
    fn on_message(&mut self, payload: &str);
    fn on_error(&mut self, error: &str);
    fn on_close(&mut self, code: u16, reason: &str);
}

/// Prints one line per event to stdout
#[derive(Debug, Default)]
pub struct ConsoleHandler;

impl ProbeHandler for ConsoleHandler {
    fn on_open(&mut self) {
        println!("WebSocket connected successfully");
    }

    fn on_message(&mut self, payload: &str) {
        println!("Message received: {}", payload);
    }

    fn on_error(&mut self, error: &str) {
        println!("WebSocket error: {}", error);
    }

    fn on_close(&mut self, code: u16, reason: &str) {
        println!("WebSocket closed: {} {}", code, reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl ProbeHandler for Recorder {
        fn on_open(&mut self) {
            self.events.push("open".to_string());
        }
        fn on_message(&mut self, payload: &str) {
            self.events.push(format!("message:{}", payload));
        }
        fn on_error(&mut self, error: &str) {
            self.events.push(format!("error:{}", error));
        }
        fn on_close(&mut self, code: u16, reason: &str) {
            self.events.push(format!("close:{}:{}", code, reason));
        }
    }

    fn close(code: u16) -> ProbeEvent {
        ProbeEvent::Close {
            code,
            reason: String::new(),
        }
    }

    #[test]
    fn test_message_before_open_is_dropped() {
        let mut gate = EventGate::new();
        let mut recorder = Recorder::default();

        assert!(!gate.dispatch(&mut recorder, ProbeEvent::Message("early".into())));
        assert!(gate.dispatch(&mut recorder, ProbeEvent::Open));
        assert!(gate.dispatch(&mut recorder, ProbeEvent::Message("hello".into())));

        assert_eq!(recorder.events, vec!["open", "message:hello"]);
    }

    #[test]
    fn test_open_fires_once() {
        let mut gate = EventGate::new();
        let mut recorder = Recorder::default();

        gate.dispatch(&mut recorder, ProbeEvent::Open);
        gate.dispatch(&mut recorder, ProbeEvent::Open);

        assert_eq!(recorder.events, vec!["open"]);
        assert_eq!(gate.state(), GateState::Open);
    }

    #[test]
    fn test_nothing_after_close() {
        let mut gate = EventGate::new();
        let mut recorder = Recorder::default();

        gate.dispatch(&mut recorder, ProbeEvent::Open);
        gate.dispatch(
            &mut recorder,
            ProbeEvent::Close {
                code: 1000,
                reason: "bye".into(),
            },
        );
        gate.dispatch(&mut recorder, ProbeEvent::Message("late".into()));
        gate.dispatch(&mut recorder, ProbeEvent::Error("late".into()));
        gate.dispatch(&mut recorder, close(1006));
        gate.dispatch(&mut recorder, ProbeEvent::Open);

        assert_eq!(recorder.events, vec!["open", "close:1000:bye"]);
        assert_eq!(gate.state(), GateState::Closed);
    }

    #[test]
    fn test_failed_connect_reports_error_then_close() {
        let mut gate = EventGate::new();
        let mut recorder = Recorder::default();

        gate.dispatch(&mut recorder, ProbeEvent::Error("refused".into()));
        gate.dispatch(&mut recorder, close(ABNORMAL_CLOSURE));

        assert_eq!(recorder.events, vec!["error:refused", "close:1006:"]);
    }
}
