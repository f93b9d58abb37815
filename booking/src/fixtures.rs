//! Builders shared by the unit tests.

#![allow(clippy::expect_used, clippy::panic)]

use crate::fleet::{Decision, FleetEvent, FleetState, Subject};
use crate::types::{
    BoardingPoint, BoardingPointId, Booking, BookingId, BookingStatus, Bus, BusId, BusType,
    Money, Principal, Role, Ticket, TicketId, TicketStatus, UserId,
};
use crate::error::BookingResult;
use busline_core::environment::Clock;
use busline_testing::test_clock;
use chrono::{DateTime, Duration, Utc};

pub fn principal(role: Role) -> Principal {
    Principal::new(UserId::new(), role)
}

pub fn passenger() -> Principal {
    principal(Role::Passenger)
}

pub fn supervisor() -> Principal {
    principal(Role::Supervisor)
}

pub fn owner() -> Principal {
    principal(Role::Owner)
}

/// Active 40-seat bus, Dhaka to Chittagong.
pub fn bus(owner: Principal, supervisor: Option<Principal>) -> Bus {
    Bus {
        id: BusId::new(),
        bus_number: "DHA-1042".to_string(),
        route_from: "Dhaka".to_string(),
        route_to: "Chittagong".to_string(),
        departure_time: test_clock().now() + Duration::hours(6),
        bus_type: BusType::Ac,
        fare: Money::from_cents(85_000),
        seat_capacity: 40,
        available_seats: 40,
        owner: owner.user_id,
        supervisor: supervisor.map(|s| s.user_id),
        location: None,
        active: true,
    }
}

/// Booking with the timestamp of its status filled in.
pub fn booking(passenger: &Principal, bus: &Bus, status: BookingStatus) -> Booking {
    let at = test_clock().now();
    Booking {
        id: BookingId::new(),
        passenger: passenger.user_id,
        bus_id: bus.id,
        status,
        request_time: at,
        accepted_time: (status == BookingStatus::Accepted).then_some(at),
        rejected_time: (status == BookingStatus::Rejected).then_some(at),
        cancelled_time: (status == BookingStatus::Cancelled).then_some(at),
        rejection_reason: None,
        cancellation_reason: None,
    }
}

pub fn ticket(booking: &Booking, bus: &Bus, seats: u32) -> Ticket {
    Ticket {
        id: TicketId::new(),
        booking_id: booking.id,
        boarding_point_id: BoardingPointId::new(),
        seats_booked: seats,
        fare_per_seat: bus.fare,
        total_fare: bus.fare.times(seats).expect("fare fits"),
        status: TicketStatus::Confirmed,
        created_at: test_clock().now(),
        completed_at: None,
        cancelled_at: None,
    }
}

pub fn boarding_point(bus: &Bus, name: &str, order: u32) -> BoardingPoint {
    BoardingPoint {
        id: BoardingPointId::new(),
        bus_id: bus.id,
        name: name.to_string(),
        lat: 23.81,
        lng: 90.41,
        sequence_order: order,
    }
}

/// A fleet with one supervised bus and one boarding point, plus shortcuts
/// for driving it through the transition functions.
pub struct Fleet {
    pub state: FleetState,
    pub owner: Principal,
    pub supervisor: Principal,
    pub passenger: Principal,
    pub bus_id: BusId,
    pub boarding_point_id: BoardingPointId,
}

impl Fleet {
    pub fn new() -> Self {
        let owner = owner();
        let supervisor = supervisor();
        let bus = bus(owner, Some(supervisor));
        let point = boarding_point(&bus, "Sayedabad", 1);
        let (bus_id, boarding_point_id) = (bus.id, point.id);

        let mut state = FleetState::new();
        state.apply(&FleetEvent::BusRegistered { bus });
        state.apply(&FleetEvent::BoardingPointAdded { point });

        Self {
            state,
            owner,
            supervisor,
            passenger: passenger(),
            bus_id,
            boarding_point_id,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        test_clock().now()
    }

    pub fn bus(&self) -> &Bus {
        self.state.bus(self.bus_id).expect("fixture bus")
    }

    pub fn update_bus(&mut self, change: impl FnOnce(&mut Bus)) {
        if let Some(bus) = self.state.buses.get_mut(&self.bus_id) {
            change(bus);
        }
    }

    /// Apply an allowed decision.
    pub fn commit(&mut self, decision: BookingResult<Decision>) -> Subject {
        let decision = decision.expect("transition allowed");
        for event in &decision.events {
            self.state.apply(event);
        }
        decision.subject
    }

    pub fn request_booking(&mut self) -> BookingId {
        let passenger = self.passenger;
        self.request_booking_as(&passenger)
    }

    pub fn request_booking_as(&mut self, passenger: &Principal) -> BookingId {
        let decision = crate::booking::create(&self.state, passenger, self.bus_id, self.now());
        match self.commit(decision) {
            Subject::Booking(id) => id,
            other => panic!("unexpected subject {other:?}"),
        }
    }

    pub fn accepted_booking(&mut self) -> BookingId {
        let booking_id = self.request_booking();
        let decision =
            crate::booking::accept(&self.state, &self.supervisor, booking_id, self.now());
        self.commit(decision);
        booking_id
    }

    pub fn confirm_ticket(&mut self, booking_id: BookingId, seats: u32) -> TicketId {
        let owner = self.state.booking(booking_id).expect("booking").passenger;
        let passenger = Principal::new(owner, Role::Passenger);
        let decision = crate::ticket::confirm(
            &self.state,
            &passenger,
            booking_id,
            self.boarding_point_id,
            seats,
            self.now(),
        );
        match self.commit(decision) {
            Subject::Ticket(id) => id,
            other => panic!("unexpected subject {other:?}"),
        }
    }
}
