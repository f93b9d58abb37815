//! Shared harness: a fleet store over an in-memory journal, seeded through
//! the same commands the HTTP surface sends.

#![allow(dead_code, clippy::expect_used, clippy::panic, missing_docs)]

use busline_booking::bus::{NewBoardingPoint, NewBus};
use busline_booking::fleet::{Command, FleetAction, FleetEnvironment, FleetReducer, FleetState, FleetStore, Outcome};
use busline_booking::hub::{HubConfig, NotificationHub};
use busline_booking::types::{
    BoardingPointId, Booking, BookingId, Bus, BusId, BusType, Money, Principal, Role, Ticket, TicketId,
    UserId,
};
use busline_booking::BookingError;
use busline_testing::{InMemoryEventStore, test_clock};
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const FARE_CENTS: u64 = 85_000;

pub struct World {
    pub store: FleetStore,
    pub journal: Arc<InMemoryEventStore>,
    pub hub: NotificationHub,
    pub owner: Principal,
    pub supervisor: Principal,
    pub passenger: Principal,
    pub bus_id: BusId,
    pub boarding_point_id: BoardingPointId,
}

pub fn principal(role: Role) -> Principal {
    Principal::new(UserId::new(), role)
}

pub fn new_bus(number: &str, capacity: u32) -> NewBus {
    NewBus {
        bus_number: number.to_string(),
        route_from: "Dhaka".to_string(),
        route_to: "Chittagong".to_string(),
        departure_time: Utc
            .with_ymd_and_hms(2026, 11, 2, 7, 30, 0)
            .single()
            .expect("valid departure"),
        bus_type: BusType::Ac,
        fare: Money::from_cents(FARE_CENTS),
        seat_capacity: capacity,
    }
}

pub fn store_over(journal: Arc<InMemoryEventStore>, state: FleetState) -> (FleetStore, NotificationHub) {
    let hub = NotificationHub::new(HubConfig::default());
    let environment = FleetEnvironment::new(Arc::new(test_clock()), journal, hub.clone());
    (FleetStore::new(state, FleetReducer, environment), hub)
}

pub async fn send(store: &FleetStore, principal: Principal, command: Command) -> Result<Outcome, BookingError> {
    let correlation_id = Uuid::new_v4();
    store
        .send_and_wait_for(
            FleetAction::Command {
                correlation_id,
                principal,
                command,
            },
            |action| action.reply_to() == Some(correlation_id),
            Duration::from_secs(5),
        )
        .await
        .expect("store replies")
        .into_outcome()
}

impl World {
    /// One active bus with a supervisor and one boarding point.
    pub async fn new(capacity: u32) -> Self {
        let journal = Arc::new(InMemoryEventStore::new());
        let (store, hub) = store_over(Arc::clone(&journal), FleetState::new());
        let owner = principal(Role::Owner);
        let supervisor = principal(Role::Supervisor);
        let passenger = principal(Role::Passenger);

        let Outcome::Bus(bus) = send(&store, owner, Command::RegisterBus(new_bus("DHA-1042", capacity)))
            .await
            .expect("bus registered")
        else {
            panic!("expected a bus");
        };
        send(
            &store,
            owner,
            Command::AssignSupervisor {
                bus_id: bus.id,
                supervisor: Some(supervisor.user_id),
            },
        )
        .await
        .expect("supervisor assigned");
        let Outcome::BoardingPoint(point) = send(
            &store,
            owner,
            Command::AddBoardingPoint {
                bus_id: bus.id,
                point: NewBoardingPoint {
                    name: "Sayedabad".to_string(),
                    lat: 23.71,
                    lng: 90.43,
                    sequence_order: 1,
                },
            },
        )
        .await
        .expect("boarding point added") else {
            panic!("expected a boarding point");
        };

        Self {
            store,
            journal,
            hub,
            owner,
            supervisor,
            passenger,
            bus_id: bus.id,
            boarding_point_id: point.id,
        }
    }

    pub async fn send(&self, principal: Principal, command: Command) -> Result<Outcome, BookingError> {
        send(&self.store, principal, command).await
    }

    pub async fn bus(&self) -> Bus {
        let bus_id = self.bus_id;
        self.store
            .state(move |s| s.buses.get(&bus_id).cloned())
            .await
            .expect("bus exists")
    }

    pub async fn booking(&self, id: BookingId) -> Booking {
        self.store
            .state(move |s| s.bookings.get(&id).cloned())
            .await
            .expect("booking exists")
    }

    pub async fn ticket(&self, id: TicketId) -> Ticket {
        self.store
            .state(move |s| s.tickets.get(&id).cloned())
            .await
            .expect("ticket exists")
    }

    pub async fn request_as(&self, passenger: Principal) -> BookingId {
        match self
            .send(passenger, Command::CreateBooking { bus_id: self.bus_id })
            .await
            .expect("booking created")
        {
            Outcome::Booking(booking) => booking.id,
            other => panic!("expected a booking, got {other:?}"),
        }
    }

    pub async fn accept(&self, booking_id: BookingId) {
        self.send(self.supervisor, Command::AcceptBooking { booking_id })
            .await
            .expect("booking accepted");
    }

    /// A fresh passenger with an accepted booking.
    pub async fn accepted_passenger(&self) -> (Principal, BookingId) {
        let passenger = principal(Role::Passenger);
        let booking_id = self.request_as(passenger).await;
        self.accept(booking_id).await;
        (passenger, booking_id)
    }

    pub fn confirm(&self, booking_id: BookingId, seats: u32) -> Command {
        Command::ConfirmTicket {
            booking_id,
            boarding_point_id: self.boarding_point_id,
            seats,
        }
    }

    pub async fn confirm_as(&self, passenger: Principal, booking_id: BookingId, seats: u32) -> TicketId {
        match self
            .send(passenger, self.confirm(booking_id, seats))
            .await
            .expect("ticket confirmed")
        {
            Outcome::Ticket(ticket) => ticket.id,
            other => panic!("expected a ticket, got {other:?}"),
        }
    }
}
