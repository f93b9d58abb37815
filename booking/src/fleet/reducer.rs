//! Fleet reducer.
//!
//! Commands commit one at a time, in arrival order. The command at the
//! head of the queue is decided against committed state and its events are
//! written to the journal. Only then are they applied and published, and
//! the next command waits until this one has been answered.
//!
//! ```text
//! Command ─► decide ─► append ─► Journaled ─► apply, publish ─► Completed ─► next
//!              │          └────► Failed (INTERNAL), state untouched ───────► next
//!              └─► Failed (refused) ───────────────────────────────────────► next
//! ```
//!
//! A failed write therefore discards the whole command, and notifications
//! leave in commit order.

use super::actions::{Command, FleetAction, Outcome};
use super::events::FleetEvent;
use super::state::FleetState;
use super::{Decision, Subject};
use crate::error::{BookingError, BookingResult};
use crate::hub::{Notification, NotificationHub, Topic};
use crate::types::Principal;
use crate::{booking, bus, ticket};
use busline_core::effect::Effect;
use busline_core::environment::Clock;
use busline_core::event::SerializedEvent;
use busline_core::event_store::EventStore;
use busline_core::reducer::Reducer;
use busline_core::stream::{StreamId, Version};
use busline_core::{SmallVec, smallvec};
use busline_runtime::Store;
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

type Effects = SmallVec<[Effect<FleetAction>; 4]>;

/// Dependencies of the fleet reducer.
#[derive(Clone)]
pub struct FleetEnvironment {
    /// Timestamps for every transition
    pub clock: Arc<dyn Clock>,
    /// Durable event journal
    pub journal: Arc<dyn EventStore>,
    /// Live observers
    pub hub: NotificationHub,
}

impl FleetEnvironment {
    /// Bundle the dependencies
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, journal: Arc<dyn EventStore>, hub: NotificationHub) -> Self {
        Self {
            clock,
            journal,
            hub,
        }
    }
}

/// The fleet's store.
pub type FleetStore = Store<FleetState, FleetAction, FleetEnvironment, FleetReducer>;

/// A command waiting for its turn.
#[derive(Clone, Debug)]
struct Queued {
    correlation_id: Uuid,
    principal: Principal,
    command: Command,
}

/// The command between its decision and its answer.
#[derive(Clone, Debug)]
struct InFlight {
    correlation_id: Uuid,
    name: &'static str,
    subject: Subject,
    /// Decided events, applied once journaled
    events: Vec<FleetEvent>,
    /// Journal slot the durable events follow
    after: Version,
    durable: u64,
}

/// Commit queue carried in [`FleetState`].
#[derive(Clone, Debug, Default)]
pub(super) struct Commits {
    in_flight: Option<InFlight>,
    waiting: VecDeque<Queued>,
}

impl Commits {
    fn is_in_flight(&self, correlation_id: Uuid) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|flight| flight.correlation_id == correlation_id)
    }
}

/// Reducer for every fleet command.
#[derive(Clone, Copy, Debug, Default)]
pub struct FleetReducer;

impl FleetReducer {
    fn decide(
        state: &FleetState,
        principal: &Principal,
        command: Command,
        now: DateTime<Utc>,
    ) -> BookingResult<Decision> {
        match command {
            Command::CreateBooking { bus_id } => booking::create(state, principal, bus_id, now),
            Command::AcceptBooking { booking_id } => {
                booking::accept(state, principal, booking_id, now)
            },
            Command::RejectBooking { booking_id, reason } => {
                booking::reject(state, principal, booking_id, reason, now)
            },
            Command::CancelBooking { booking_id, reason } => {
                booking::cancel(state, principal, booking_id, reason, now)
            },
            Command::ConfirmTicket {
                booking_id,
                boarding_point_id,
                seats,
            } => ticket::confirm(state, principal, booking_id, boarding_point_id, seats, now),
            Command::CancelTicket { ticket_id, reason } => {
                ticket::cancel(state, principal, ticket_id, reason, now)
            },
            Command::CompleteTicket { ticket_id } => {
                ticket::complete(state, principal, ticket_id, now)
            },
            Command::UpdateLocation { bus_id, lat, lng } => {
                bus::update_location(state, principal, bus_id, lat, lng, now)
            },
            Command::RegisterBus(new) => bus::register(state, principal, new),
            Command::AssignSupervisor { bus_id, supervisor } => {
                bus::assign_supervisor(state, principal, bus_id, supervisor)
            },
            Command::SetBusActive { bus_id, active } => {
                bus::set_active(state, principal, bus_id, active)
            },
            Command::AddBoardingPoint { bus_id, point } => {
                bus::add_boarding_point(state, principal, bus_id, point)
            },
        }
    }

    fn outcome(state: &FleetState, subject: Subject) -> BookingResult<Outcome> {
        Ok(match subject {
            Subject::Bus(id) => Outcome::Bus(state.bus(id)?.clone()),
            Subject::BoardingPoint(id) => Outcome::BoardingPoint(state.boarding_point(id)?.clone()),
            Subject::Booking(id) => Outcome::Booking(state.booking(id)?.clone()),
            Subject::Ticket(id) => Outcome::Ticket(state.ticket(id)?.clone()),
        })
    }

    /// Notifications for committed events, built from the state after them.
    fn notifications(state: &FleetState, events: &[FleetEvent]) -> Vec<(Topic, Notification)> {
        events
            .iter()
            .filter_map(|event| match event {
                FleetEvent::BookingAccepted { booking_id, .. } => {
                    let booking = state.booking(*booking_id).ok()?;
                    let bus = state.bus(booking.bus_id).ok()?;
                    Some((
                        Topic::User(booking.passenger),
                        Notification::booking_accepted(booking, bus),
                    ))
                },
                FleetEvent::BookingRejected { booking_id, .. } => {
                    let booking = state.booking(*booking_id).ok()?;
                    Some((
                        Topic::User(booking.passenger),
                        Notification::booking_rejected(booking),
                    ))
                },
                FleetEvent::TicketConfirmed { bus_id, ticket } => {
                    let booking = state.booking(ticket.booking_id).ok()?;
                    let bus = state.bus(*bus_id).ok()?;
                    let point = state.boarding_point(ticket.boarding_point_id).ok()?;
                    Some((
                        Topic::User(booking.passenger),
                        Notification::ticket_confirmed(ticket, bus, point),
                    ))
                },
                FleetEvent::LocationRecorded { bus_id, location } => Some((
                    Topic::Bus(*bus_id),
                    Notification::location_update(*bus_id, *location),
                )),
                _ => None,
            })
            .collect()
    }

    fn encode<'a>(
        events: impl Iterator<Item = &'a FleetEvent>,
        correlation_id: Uuid,
        principal: &Principal,
    ) -> BookingResult<Vec<SerializedEvent>> {
        let metadata = serde_json::json!({
            "correlation_id": correlation_id.to_string(),
            "user_id": principal.user_id.to_string(),
        });
        events
            .filter(|event| event.is_durable())
            .map(|event| SerializedEvent::from_event(event, Some(metadata.clone())))
            .collect::<Result<_, _>>()
            .map_err(|e| BookingError::Internal(e.to_string()))
    }

    fn reply(action: FleetAction) -> Effect<FleetAction> {
        Effect::future(async move { Some(action) })
    }

    fn refuse(correlation_id: Uuid, command: &'static str, error: BookingError) -> Effect<FleetAction> {
        counter!("fleet.commands.rejected", "kind" => error.kind()).increment(1);
        tracing::debug!(%correlation_id, command, kind = error.kind(), %error, "Command refused");
        Self::reply(FleetAction::Failed {
            correlation_id,
            error,
        })
    }

    /// Start waiting commands until one is in flight or none are left.
    fn advance(state: &mut FleetState, env: &FleetEnvironment) -> Effects {
        let mut effects = Effects::new();
        while state.commits.in_flight.is_none() {
            let Some(next) = state.commits.waiting.pop_front() else {
                break;
            };
            effects.push(Self::start(state, next, env));
        }

        #[allow(clippy::cast_precision_loss)]
        gauge!("fleet.commands.waiting").set(state.commits.waiting.len() as f64);
        effects
    }

    /// Decide a command and hand its durable events to the journal.
    fn start(state: &mut FleetState, queued: Queued, env: &FleetEnvironment) -> Effect<FleetAction> {
        let Queued {
            correlation_id,
            principal,
            command,
        } = queued;
        let name = command.name();

        let decision = match Self::decide(state, &principal, command, env.clock.now()) {
            Ok(decision) => decision,
            Err(error) => return Self::refuse(correlation_id, name, error),
        };
        let serialized = match Self::encode(decision.events.iter(), correlation_id, &principal) {
            Ok(serialized) => serialized,
            Err(error) => return Self::refuse(correlation_id, name, error),
        };

        let after = state.version;
        state.commits.in_flight = Some(InFlight {
            correlation_id,
            name,
            subject: decision.subject,
            events: decision.events,
            after,
            durable: serialized.len() as u64,
        });

        if serialized.is_empty() {
            return Self::commit(state, env);
        }

        let journal = Arc::clone(&env.journal);
        Effect::future(async move {
            match journal
                .append_events(StreamId::fleet(), after, serialized)
                .await
            {
                Ok(_) => Some(FleetAction::Journaled { correlation_id }),
                Err(error) => {
                    counter!("fleet.journal.failures").increment(1);
                    tracing::error!(%correlation_id, command = name, %error, "Journal write failed; command discarded");
                    Some(FleetAction::Failed {
                        correlation_id,
                        error: BookingError::Internal(error.to_string()),
                    })
                },
            }
        })
    }

    /// Apply the journaled command in flight and publish what it changed.
    fn commit(state: &mut FleetState, env: &FleetEnvironment) -> Effect<FleetAction> {
        let Some(flight) = state.commits.in_flight.as_mut() else {
            return Effect::None;
        };
        let events = std::mem::take(&mut flight.events);
        let (correlation_id, name, subject) = (flight.correlation_id, flight.name, flight.subject);
        let version = flight.after.advance(flight.durable);

        state.version = version;
        for event in &events {
            state.apply(event);
        }

        let outcome = match Self::outcome(state, subject) {
            Ok(outcome) => outcome,
            Err(error) => {
                return Self::reply(FleetAction::Failed {
                    correlation_id,
                    error,
                });
            },
        };
        let notifications = Self::notifications(state, &events);

        counter!("fleet.commands.committed", "command" => name).increment(1);
        tracing::debug!(
            %correlation_id,
            command = name,
            events = events.len(),
            %version,
            "Command committed"
        );

        let hub = env.hub.clone();
        Effect::future(async move {
            for (topic, notification) in notifications {
                hub.publish(topic, notification).await;
            }
            Some(FleetAction::Completed {
                correlation_id,
                outcome,
            })
        })
    }
}

impl Reducer for FleetReducer {
    type State = FleetState;
    type Action = FleetAction;
    type Environment = FleetEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            FleetAction::Command {
                correlation_id,
                principal,
                command,
            } => {
                state.commits.waiting.push_back(Queued {
                    correlation_id,
                    principal,
                    command,
                });
                Self::advance(state, env)
            },
            FleetAction::Journaled { correlation_id } => {
                if state.commits.is_in_flight(correlation_id) {
                    smallvec![Self::commit(state, env)]
                } else {
                    tracing::warn!(%correlation_id, "Journal confirmation for a command not in flight");
                    SmallVec::new()
                }
            },
            FleetAction::Completed { correlation_id, .. }
            | FleetAction::Failed { correlation_id, .. } => {
                // Refusals never went in flight; their replies are for the caller only.
                if state.commits.is_in_flight(correlation_id) {
                    state.commits.in_flight = None;
                    Self::advance(state, env)
                } else {
                    SmallVec::new()
                }
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::fixtures::Fleet;
    use crate::types::{BookingStatus, TicketStatus};
    use busline_testing::{InMemoryEventStore, ReducerTest, assertions, test_clock};

    fn env() -> FleetEnvironment {
        env_over(Arc::new(InMemoryEventStore::new()))
    }

    fn env_over(journal: Arc<InMemoryEventStore>) -> FleetEnvironment {
        FleetEnvironment::new(Arc::new(test_clock()), journal, NotificationHub::default())
    }

    fn command_with(correlation_id: Uuid, principal: Principal, command: Command) -> FleetAction {
        FleetAction::Command {
            correlation_id,
            principal,
            command,
        }
    }

    fn command(principal: Principal, command: Command) -> FleetAction {
        command_with(Uuid::new_v4(), principal, command)
    }

    /// Run an action and everything its effects feed back; returns the replies.
    async fn settle(state: &mut FleetState, action: FleetAction, env: &FleetEnvironment) -> Vec<FleetAction> {
        let mut queue = VecDeque::from([action]);
        let mut replies = Vec::new();
        while let Some(action) = queue.pop_front() {
            if action.reply_to().is_some() {
                replies.push(action.clone());
            }
            for effect in FleetReducer.reduce(state, action, env) {
                if let Effect::Future(future) = effect {
                    queue.extend(future.await);
                }
            }
        }
        replies
    }

    #[test]
    fn decided_command_waits_for_the_journal() {
        let mut fleet = Fleet::new();
        let booking_id = fleet.request_booking();
        let supervisor = fleet.supervisor;

        ReducerTest::new(FleetReducer)
            .with_env(env())
            .given_state(fleet.state)
            .when_action(command(supervisor, Command::AcceptBooking { booking_id }))
            .then_state(move |state| {
                assert_eq!(state.bookings[&booking_id].status, BookingStatus::Pending);
                assert_eq!(state.version.value(), 0);
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_future_effect(effects);
            })
            .run();
    }

    #[test]
    fn journaled_acceptance_leaves_seats_alone() {
        let mut fleet = Fleet::new();
        let booking_id = fleet.request_booking();
        let (supervisor, bus_id) = (fleet.supervisor, fleet.bus_id);
        let id = Uuid::new_v4();

        ReducerTest::new(FleetReducer)
            .with_env(env())
            .given_state(fleet.state)
            .given_actions([command_with(id, supervisor, Command::AcceptBooking { booking_id })])
            .when_action(FleetAction::Journaled { correlation_id: id })
            .then_state(move |state| {
                assert_eq!(state.bookings[&booking_id].status, BookingStatus::Accepted);
                assert!(state.bookings[&booking_id].accepted_time.is_some());
                assert_eq!(state.buses[&bus_id].available_seats, 40);
                assert_eq!(state.version.value(), 1);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn commands_queue_behind_the_one_in_flight() {
        let mut fleet = Fleet::new();
        let booking_id = fleet.request_booking();
        let (supervisor, passenger) = (fleet.supervisor, fleet.passenger);

        ReducerTest::new(FleetReducer)
            .with_env(env())
            .given_state(fleet.state)
            .given_actions([command(supervisor, Command::AcceptBooking { booking_id })])
            .when_action(command(
                passenger,
                Command::CancelBooking {
                    booking_id,
                    reason: None,
                },
            ))
            .then_state(move |state| {
                assert_eq!(state.bookings[&booking_id].status, BookingStatus::Pending);
                assert_eq!(state.commits.waiting.len(), 1);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn answer_starts_the_next_command() {
        let mut fleet = Fleet::new();
        let booking_id = fleet.request_booking();
        let (supervisor, passenger) = (fleet.supervisor, fleet.passenger);
        let outcome = Outcome::Booking(fleet.state.bookings[&booking_id].clone());
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());

        ReducerTest::new(FleetReducer)
            .with_env(env())
            .given_state(fleet.state)
            .given_actions([
                command_with(first, supervisor, Command::AcceptBooking { booking_id }),
                FleetAction::Journaled { correlation_id: first },
                command_with(
                    second,
                    passenger,
                    Command::CancelBooking {
                        booking_id,
                        reason: None,
                    },
                ),
            ])
            .when_action(FleetAction::Completed {
                correlation_id: first,
                outcome,
            })
            .then_state(move |state| {
                assert!(state.commits.is_in_flight(second));
                assert!(state.commits.waiting.is_empty());
                assert_eq!(state.bookings[&booking_id].status, BookingStatus::Accepted);
            })
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();
    }

    #[test]
    fn refused_command_changes_nothing() {
        let fleet = Fleet::new();
        let (passenger, bus_id) = (fleet.passenger, fleet.bus_id);
        let before = fleet.state.clone();

        ReducerTest::new(FleetReducer)
            .with_env(env())
            .given_state(fleet.state)
            .when_action(command(
                passenger,
                Command::UpdateLocation {
                    bus_id,
                    lat: 10.0,
                    lng: 10.0,
                },
            ))
            .then_state(move |state| {
                assert_eq!(state.version, before.version);
                assert!(state.buses[&bus_id].location.is_none());
                assert!(state.commits.in_flight.is_none());
            })
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();
    }

    #[test]
    fn each_journaled_event_claims_one_version() {
        let mut fleet = Fleet::new();
        let booking_id = fleet.accepted_booking();
        fleet.confirm_ticket(booking_id, 1);
        let passenger = fleet.passenger;
        let id = Uuid::new_v4();

        ReducerTest::new(FleetReducer)
            .with_env(env())
            .given_state(fleet.state)
            .given_actions([command_with(
                id,
                passenger,
                Command::CancelBooking {
                    booking_id,
                    reason: Some("Plans changed".into()),
                },
            )])
            .when_action(FleetAction::Journaled { correlation_id: id })
            .then_state(|state| assert_eq!(state.version.value(), 2))
            .run();
    }

    #[test]
    fn replies_for_no_command_produce_no_effects() {
        ReducerTest::new(FleetReducer)
            .with_env(env())
            .given_state(FleetState::new())
            .when_action(FleetAction::Failed {
                correlation_id: Uuid::new_v4(),
                error: BookingError::NoSeatsAvailable,
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[tokio::test]
    async fn committed_command_is_journaled_then_answered() {
        let mut fleet = Fleet::new();
        let booking_id = fleet.request_booking();
        let journal = Arc::new(InMemoryEventStore::new());
        let env = env_over(Arc::clone(&journal));
        let correlation_id = Uuid::new_v4();

        let replies = settle(
            &mut fleet.state,
            command_with(correlation_id, fleet.supervisor, Command::AcceptBooking { booking_id }),
            &env,
        )
        .await;

        assert!(matches!(
            replies.as_slice(),
            [FleetAction::Completed {
                outcome: Outcome::Booking(booking),
                ..
            }] if booking.status == BookingStatus::Accepted
        ));
        assert_eq!(replies[0].reply_to(), Some(correlation_id));
        assert_eq!(journal.event_types(&StreamId::fleet()), ["BookingAccepted.v1"]);
        assert!(fleet.state.commits.in_flight.is_none());
    }

    #[tokio::test]
    async fn failed_journal_write_discards_the_command() {
        let mut fleet = Fleet::new();
        let booking_id = fleet.accepted_booking();
        let (passenger, bus_id, point) = (fleet.passenger, fleet.bus_id, fleet.boarding_point_id);
        let journal = Arc::new(InMemoryEventStore::new());
        let env = env_over(Arc::clone(&journal));
        let confirm = Command::ConfirmTicket {
            booking_id,
            boarding_point_id: point,
            seats: 2,
        };

        journal.fail_next_appends(1);
        let replies = settle(&mut fleet.state, command(passenger, confirm.clone()), &env).await;

        assert!(matches!(
            replies.as_slice(),
            [FleetAction::Failed {
                error: BookingError::Internal(_),
                ..
            }]
        ));
        assert!(fleet.state.ticket_for_booking(booking_id).is_none());
        assert_eq!(fleet.state.buses[&bus_id].available_seats, 40);
        assert_eq!(fleet.state.version.value(), 0);
        assert!(fleet.state.commits.in_flight.is_none());

        let replies = settle(&mut fleet.state, command(passenger, confirm), &env).await;
        assert!(matches!(replies.as_slice(), [FleetAction::Completed { .. }]));
        let ticket = fleet.state.ticket_for_booking(booking_id).expect("ticket");
        assert_eq!(ticket.status, TicketStatus::Confirmed);
        assert_eq!(fleet.state.buses[&bus_id].available_seats, 38);
        assert_eq!(journal.len(&StreamId::fleet()), 1);
    }

    #[tokio::test]
    async fn position_samples_skip_the_journal() {
        let mut fleet = Fleet::new();
        let journal = Arc::new(InMemoryEventStore::new());
        let env = env_over(Arc::clone(&journal));
        let mut watcher = env.hub.subscribe(Topic::Bus(fleet.bus_id)).await.expect("room");

        let replies = settle(
            &mut fleet.state,
            command(
                fleet.supervisor,
                Command::UpdateLocation {
                    bus_id: fleet.bus_id,
                    lat: 23.75,
                    lng: 90.39,
                },
            ),
            &env,
        )
        .await;

        assert!(matches!(replies.as_slice(), [FleetAction::Completed { .. }]));
        assert_eq!(journal.len(&StreamId::fleet()), 0);
        assert_eq!(fleet.state.version.value(), 0);
        assert!(fleet.bus().location.is_some());
        assert_eq!(watcher.receiver.try_recv().map(|n| n.kind()), Ok("location_update"));
    }
}
