//! The materialized future of one exposed individual.
//!
//! At exposure time the whole transition chain is sampled eagerly with
//! competing exponentials, and contact events are laid out over the window
//! in which the individual can transmit. The schedule then only replays:
//! the engine pops events in time order and applies them to the population
//! store.

use crate::parameters::Parameters;
use crate::rng::SimRng;
use crate::stratum::Stratum;
use crate::variables::Variable;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Abstract disease state of a scheduled individual.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiseaseState {
    Exposed,
    Asymptomatic,
    Treatable,
    Infectious,
    Recovered,
    Deceased,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventType {
    EtoA,
    AtoT,
    AtoR,
    AtoD,
    TtoI,
    TtoR,
    TtoD,
    ItoR,
    ItoD,
    Contact,
}

impl EventType {
    /// The population-store move and resulting state for a transition
    /// event; `None` for contacts.
    pub fn transition(self) -> Option<(Variable, Variable, DiseaseState)> {
        match self {
            EventType::EtoA => Some((
                Variable::Exposed,
                Variable::Asymptomatic,
                DiseaseState::Asymptomatic,
            )),
            EventType::AtoT => Some((
                Variable::Asymptomatic,
                Variable::Treatable,
                DiseaseState::Treatable,
            )),
            EventType::AtoR => Some((
                Variable::Asymptomatic,
                Variable::Recovered,
                DiseaseState::Recovered,
            )),
            EventType::AtoD => Some((
                Variable::Asymptomatic,
                Variable::Deceased,
                DiseaseState::Deceased,
            )),
            EventType::TtoI => Some((
                Variable::Treatable,
                Variable::Infectious,
                DiseaseState::Infectious,
            )),
            EventType::TtoR => Some((
                Variable::Treatable,
                Variable::Recovered,
                DiseaseState::Recovered,
            )),
            EventType::TtoD => Some((
                Variable::Treatable,
                Variable::Deceased,
                DiseaseState::Deceased,
            )),
            EventType::ItoR => Some((
                Variable::Infectious,
                Variable::Recovered,
                DiseaseState::Recovered,
            )),
            EventType::ItoD => Some((
                Variable::Infectious,
                Variable::Deceased,
                DiseaseState::Deceased,
            )),
            EventType::Contact => None,
        }
    }
}

/// Target (age, risk) of a contact event. The target's vaccination status
/// is unknown at schedule time and resolved at dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContactTarget {
    pub age: usize,
    pub risk: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct Event {
    pub event_type: EventType,
    pub time: f64,
    /// Start of the waiting-time window this event was drawn from.
    pub contact_window_start: f64,
    pub from: Stratum,
    pub to: Option<ContactTarget>,
}

impl Event {
    fn transition_at(event_type: EventType, time: f64, from: Stratum) -> Event {
        Event {
            event_type,
            time,
            contact_window_start: time,
            from,
            to: None,
        }
    }

    pub fn contact(
        time: f64,
        contact_window_start: f64,
        from: Stratum,
        to: ContactTarget,
    ) -> Event {
        Event {
            event_type: EventType::Contact,
            time,
            contact_window_start,
            from,
            to: Some(to),
        }
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time
    }
}

impl Eq for Event {}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the BinaryHeap pops the earliest event first.
        self.time.partial_cmp(&other.time).unwrap().reverse()
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Draws one waiting time per candidate and keeps the winner. Non-positive
/// rates draw an infinite time and lose to any finite competitor.
fn competing(now: f64, candidates: &[(EventType, f64)], rng: &mut SimRng) -> (EventType, f64) {
    let mut winner = (candidates[0].0, f64::INFINITY);
    for (event_type, rate) in candidates {
        let time = now + rng.exponential(*rate);
        if time < winner.1 {
            winner = (*event_type, time);
        }
    }
    winner
}

/// One individual's pending future: current state, stratum, an event
/// min-heap, and the window during which contacts can be generated.
pub struct Schedule {
    state: DiseaseState,
    stratum: Stratum,
    events: BinaryHeap<Event>,
    canceled: bool,
    infected_t_min: f64,
    infected_t_max: f64,
}

impl Schedule {
    /// Samples the full transition chain for an individual exposed at
    /// `now`. From asymptomatic onward, progression, recovery and death
    /// compete at each stage; the first winner fixes the next stage.
    pub fn new(now: f64, stratum: Stratum, params: &Parameters, rng: &mut SimRng) -> Schedule {
        let mut events = BinaryHeap::new();

        let onset = now + rng.exponential(params.tau);
        events.push(Event::transition_at(EventType::EtoA, onset, stratum));

        let (winner, time) = competing(
            onset,
            &[
                (EventType::AtoT, params.kappa),
                (EventType::AtoR, params.gamma),
                (EventType::AtoD, params.nu),
            ],
            rng,
        );
        events.push(Event::transition_at(winner, time, stratum));
        let mut end = time;

        if winner == EventType::AtoT {
            let (winner, time) = competing(
                time,
                &[
                    (EventType::TtoI, params.chi),
                    (EventType::TtoR, params.gamma),
                    (EventType::TtoD, params.nu),
                ],
                rng,
            );
            events.push(Event::transition_at(winner, time, stratum));
            end = time;

            if winner == EventType::TtoI {
                let (winner, time) = competing(
                    time,
                    &[(EventType::ItoR, params.gamma), (EventType::ItoD, params.nu)],
                    rng,
                );
                events.push(Event::transition_at(winner, time, stratum));
                end = time;
            }
        }

        Schedule {
            state: DiseaseState::Exposed,
            stratum,
            events,
            canceled: false,
            infected_t_min: onset,
            infected_t_max: end,
        }
    }

    pub fn state(&self) -> DiseaseState {
        self.state
    }

    pub fn set_state(&mut self, state: DiseaseState) {
        self.state = state;
    }

    pub fn stratum(&self) -> Stratum {
        self.stratum
    }

    pub fn canceled(&self) -> bool {
        self.canceled
    }

    /// Cancels all remaining transitions and contacts. The schedule stays
    /// queued; the processor skips it on pop.
    pub fn cancel(&mut self) {
        self.canceled = true;
    }

    /// The (asymptomatic onset, removal) window during which this
    /// individual can generate contacts.
    pub fn infected_window(&self) -> (f64, f64) {
        (self.infected_t_min, self.infected_t_max)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn peek(&self) -> Option<&Event> {
        self.events.peek()
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop()
    }

    /// Time of the next pending event; the queue keys on this.
    pub fn next_event_time(&self) -> Option<f64> {
        self.events.peek().map(|event| event.time)
    }

    /// Rewrites the stratum of the individual and of every pending event.
    /// Event times are untouched, so the queue position stays valid.
    pub fn restratify(&mut self, stratum: Stratum) {
        self.stratum = stratum;
        let events = std::mem::take(&mut self.events);
        self.events = events
            .into_iter()
            .map(|event| Event {
                from: stratum,
                ..event
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::Parameters;

    fn params() -> Parameters {
        Parameters {
            tau: 0.5,
            kappa: 0.5,
            chi: 1.0,
            gamma: 0.25,
            nu: 0.01,
            ..Parameters::default()
        }
    }

    fn drain(schedule: &mut Schedule) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = schedule.pop() {
            events.push(event);
        }
        events
    }

    #[test]
    fn chain_is_time_ordered_and_single_path() {
        let params = params();
        let mut rng = SimRng::seed_from_u64(7);
        for _ in 0..200 {
            let mut schedule = Schedule::new(0.0, Stratum::new(1, 0, 0), &params, &mut rng);
            assert_eq!(schedule.state(), DiseaseState::Exposed);
            let (t_min, t_max) = schedule.infected_window();
            let events = drain(&mut schedule);

            assert!(events.windows(2).all(|w| w[0].time <= w[1].time));
            assert_eq!(events[0].event_type, EventType::EtoA);
            assert_eq!(events[0].time, t_min);
            assert_eq!(events.last().unwrap().time, t_max);

            // Exactly one pending transition from each reachable state.
            let mut state = DiseaseState::Exposed;
            for event in &events {
                let (_, _, next) = event.event_type.transition().unwrap();
                match (state, event.event_type) {
                    (DiseaseState::Exposed, EventType::EtoA)
                    | (DiseaseState::Asymptomatic, EventType::AtoT)
                    | (DiseaseState::Asymptomatic, EventType::AtoR)
                    | (DiseaseState::Asymptomatic, EventType::AtoD)
                    | (DiseaseState::Treatable, EventType::TtoI)
                    | (DiseaseState::Treatable, EventType::TtoR)
                    | (DiseaseState::Treatable, EventType::TtoD)
                    | (DiseaseState::Infectious, EventType::ItoR)
                    | (DiseaseState::Infectious, EventType::ItoD) => {}
                    other => panic!("illegal transition {other:?}"),
                }
                state = next;
            }
            assert!(matches!(
                state,
                DiseaseState::Recovered | DiseaseState::Deceased
            ));
        }
    }

    #[test]
    fn nonpositive_onset_rate_never_fires() {
        let params = Parameters {
            tau: 0.0,
            ..params()
        };
        let mut rng = SimRng::seed_from_u64(7);
        let schedule = Schedule::new(0.0, Stratum::new(0, 0, 0), &params, &mut rng);
        assert_eq!(schedule.next_event_time(), Some(f64::INFINITY));
    }

    #[test]
    fn cancel_is_a_flag() {
        let params = params();
        let mut rng = SimRng::seed_from_u64(7);
        let mut schedule = Schedule::new(0.0, Stratum::new(0, 0, 0), &params, &mut rng);
        assert!(!schedule.canceled());
        schedule.cancel();
        assert!(schedule.canceled());
        // Events are still there; the processor is responsible for skipping.
        assert!(!schedule.is_empty());
    }

    #[test]
    fn restratify_rewrites_pending_events_in_place() {
        let params = params();
        let mut rng = SimRng::seed_from_u64(11);
        let from = Stratum::new(2, 1, 0);
        let mut schedule = Schedule::new(0.0, from, &params, &mut rng);
        let (t_min, t_max) = schedule.infected_window();
        schedule.push(Event::contact(
            (t_min + t_max) / 2.0,
            t_min,
            from,
            ContactTarget { age: 0, risk: 0 },
        ));
        let next_before = schedule.next_event_time();

        let vaccinated = Stratum::new(2, 1, 1);
        schedule.restratify(vaccinated);

        assert_eq!(schedule.stratum(), vaccinated);
        assert_eq!(schedule.next_event_time(), next_before);
        for event in drain(&mut schedule) {
            assert_eq!(event.from, vaccinated);
        }
    }
}
