//! Test utilities for the balancing link

pub mod line_sim {
    //! Virtual-time simulation of the shared line for deterministic testing.
    //!
    //! Transmissions and glitches are scheduled as level transitions. Every
    //! yield of the simulated foreground advances virtual time to the next
    //! event and fires the matching [`LineDecoder`] handler. Events at the
    //! same instant are processed in this order: a pending low-level
    //! trigger, line transitions, the session timer, the idle window.

    use core::cell::RefCell;
    use heapless::Vec;

    use crate::config::ProtocolTiming;
    use crate::decoder::LineDecoder;
    use crate::hal::{Duration, ReceiverControl, Yield};
    use crate::types::{EdgeTrigger, LineLevel, SessionOutcome, Transmission};

    const MAX_TRANSITIONS: usize = 1024;

    #[derive(Copy, Clone, Debug)]
    struct Transition {
        at: u64,
        seq: u32,
        level: LineLevel,
    }

    struct SimState {
        now: u64,
        level: LineLevel,
        transitions: Vec<Transition, MAX_TRANSITIONS>,
        next_seq: u32,
        edge: Option<EdgeTrigger>,
        session_deadline: Option<u64>,
        idle_deadline: Option<u64>,
        idle_period: u64,
        edges_delivered: usize,
    }

    enum Event {
        Edge,
        SessionTimer,
        IdleWindow,
    }

    impl SimState {
        fn push(&mut self, at: u64, level: LineLevel) {
            let seq = self.next_seq;
            self.next_seq += 1;
            if self.transitions.push(Transition { at, seq, level }).is_err() {
                panic!("line simulator transition buffer full");
            }
            self.transitions.sort_unstable_by_key(|t| (t.at, t.seq));
        }

        fn idle(&self) -> bool {
            self.edge.is_none() && self.session_deadline.is_none() && self.idle_deadline.is_none()
        }

        /// Advance to the next event. Returns the handler to fire, if any.
        fn step(&mut self) -> Option<Event> {
            if self.idle() {
                return None;
            }
            if self.edge == Some(EdgeTrigger::LowLevel) && self.level == LineLevel::Low {
                return Some(Event::Edge);
            }

            let transition = self.transitions.first().map(|t| t.at);
            let candidates = [transition, self.session_deadline, self.idle_deadline];
            let next = candidates.iter().flatten().min().copied()?;

            if transition == Some(next) {
                let t = self.transitions.remove(0);
                self.now = t.at;
                let previous = self.level;
                self.level = t.level;
                let falling = previous == LineLevel::High && t.level == LineLevel::Low;
                if falling && self.edge == Some(EdgeTrigger::Falling) {
                    self.edges_delivered += 1;
                    return Some(Event::Edge);
                }
                // A low-level trigger is picked up on the next step
                return None;
            }

            self.now = next;
            if self.session_deadline == Some(next) {
                self.session_deadline = None;
                return Some(Event::SessionTimer);
            }
            self.idle_deadline = Some(next + self.idle_period);
            Some(Event::IdleWindow)
        }
    }

    /// Virtual shared line with receiver timers
    pub struct LineSimulator {
        state: RefCell<SimState>,
    }

    impl LineSimulator {
        pub fn new() -> Self {
            Self {
                state: RefCell::new(SimState {
                    now: 0,
                    level: LineLevel::High,
                    transitions: Vec::new(),
                    next_seq: 0,
                    edge: None,
                    session_deadline: None,
                    idle_deadline: None,
                    idle_period: 0,
                    edges_delivered: 0,
                }),
            }
        }

        /// Current virtual time since the simulation started
        pub fn now(&self) -> Duration {
            Duration::from_micros(self.state.borrow().now)
        }

        pub fn level(&self) -> LineLevel {
            self.state.borrow().level
        }

        /// Falling edges delivered to the decoder so far
        pub fn edges_delivered(&self) -> usize {
            self.state.borrow().edges_delivered
        }

        /// Schedule `transmission` to start `offset` from now.
        /// Returns the offset at which the line settles for good.
        pub fn schedule(&self, offset: Duration, transmission: &Transmission, timing: &ProtocolTiming) -> Duration {
            let mut state = self.state.borrow_mut();
            let start = state.now + offset.as_micros();
            let mut at = start;
            for segment in transmission.segments(timing) {
                state.push(at, segment.level);
                match segment.duration {
                    Some(duration) => at += duration.as_micros(),
                    None => break,
                }
            }
            Duration::from_micros(at - state.now)
        }

        /// Schedule a low pulse of `width` starting `offset` from now
        pub fn pulse_low(&self, offset: Duration, width: Duration) {
            let mut state = self.state.borrow_mut();
            let at = state.now + offset.as_micros();
            state.push(at, LineLevel::Low);
            state.push(at + width.as_micros(), LineLevel::High);
        }

        /// Receiver-side hardware bound to this line
        pub fn receiver(&self) -> SimReceiver<'_> {
            SimReceiver { sim: &self.state }
        }

        /// Yield hook that runs the simulation for `decoder`
        pub fn yielder<'a>(&'a self, decoder: &'a LineDecoder) -> SimYield<'a> {
            SimYield {
                sim: &self.state,
                decoder,
                yields: 0,
            }
        }

        /// Run one complete receive session against the scheduled line activity
        pub fn run_session(&self, decoder: &LineDecoder) -> SessionOutcome {
            decoder.listen(&mut self.receiver(), &mut self.yielder(decoder))
        }
    }

    impl Default for LineSimulator {
        fn default() -> Self {
            Self::new()
        }
    }

    /// [`ReceiverControl`] backed by the simulated line
    pub struct SimReceiver<'a> {
        sim: &'a RefCell<SimState>,
    }

    impl ReceiverControl for SimReceiver<'_> {
        fn line_level(&mut self) -> LineLevel {
            self.sim.borrow().level
        }

        fn arm_edge(&mut self, trigger: EdgeTrigger) {
            self.sim.borrow_mut().edge = Some(trigger);
        }

        fn disarm_edge(&mut self) {
            self.sim.borrow_mut().edge = None;
        }

        fn start_session_timer(&mut self, timeout: Duration) {
            let mut state = self.sim.borrow_mut();
            state.session_deadline = Some(state.now + timeout.as_micros());
        }

        fn stop_session_timer(&mut self) {
            self.sim.borrow_mut().session_deadline = None;
        }

        fn start_idle_window(&mut self, window: Duration) {
            let mut state = self.sim.borrow_mut();
            state.idle_period = window.as_micros().max(1);
            state.idle_deadline = Some(state.now + state.idle_period);
        }

        fn stop_idle_window(&mut self) {
            self.sim.borrow_mut().idle_deadline = None;
        }
    }

    /// [`Yield`] hook that fires the decoder's interrupt handlers
    pub struct SimYield<'a> {
        sim: &'a RefCell<SimState>,
        decoder: &'a LineDecoder,
        yields: usize,
    }

    impl SimYield<'_> {
        pub fn yields(&self) -> usize {
            self.yields
        }
    }

    impl Yield for SimYield<'_> {
        fn yield_now(&mut self) {
            self.yields += 1;
            // The borrow must end before a handler touches the receiver
            let event = self.sim.borrow_mut().step();
            let mut hw = SimReceiver { sim: self.sim };
            match event {
                Some(Event::Edge) => self.decoder.on_edge(&mut hw),
                Some(Event::SessionTimer) => self.decoder.on_session_timer(&mut hw),
                Some(Event::IdleWindow) => self.decoder.on_idle_window(&mut hw),
                None => {}
            }
        }
    }

}
