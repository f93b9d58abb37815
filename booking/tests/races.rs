//! Concurrent commands against the same booking or the last seats.

#![allow(clippy::expect_used, clippy::panic, missing_docs)]

mod common;

use busline_booking::BookingError;
use busline_booking::fleet::Command;
use common::World;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_ticket_per_booking_under_concurrent_confirms() {
    let world = Arc::new(World::new(40).await);
    let (passenger, booking_id) = world.accepted_passenger().await;

    let attempts: Vec<_> = (0..2)
        .map(|_| {
            let world = Arc::clone(&world);
            tokio::spawn(async move { world.send(passenger, world.confirm(booking_id, 2)).await })
        })
        .collect();

    let mut successes = 0;
    let mut duplicates = 0;
    for attempt in attempts {
        match attempt.await.expect("task completes") {
            Ok(_) => successes += 1,
            Err(BookingError::DuplicateTicket) => duplicates += 1,
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }

    assert_eq!((successes, duplicates), (1, 1));
    assert_eq!(world.bus().await.available_seats, 38);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_seats_go_to_exactly_one_passenger() {
    let world = Arc::new(World::new(3).await);
    let (first, first_booking) = world.accepted_passenger().await;
    let (second, second_booking) = world.accepted_passenger().await;

    let attempts = [(first, first_booking), (second, second_booking)].map(|(passenger, booking_id)| {
        let world = Arc::clone(&world);
        tokio::spawn(async move { world.send(passenger, world.confirm(booking_id, 3)).await })
    });

    let mut outcomes = Vec::new();
    for attempt in attempts {
        outcomes.push(attempt.await.expect("task completes"));
    }

    let won = outcomes.iter().filter(|o| o.is_ok()).count();
    let short = outcomes
        .iter()
        .filter(|o| {
            matches!(
                o,
                Err(BookingError::InsufficientSeats {
                    requested: 3,
                    available: 0,
                })
            )
        })
        .count();
    assert_eq!((won, short), (1, 1));
    assert_eq!(world.bus().await.available_seats, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cancels_credit_once() {
    let world = Arc::new(World::new(10).await);
    let (passenger, booking_id) = world.accepted_passenger().await;
    let ticket_id = world.confirm_as(passenger, booking_id, 4).await;

    let attempts: Vec<_> = (0..4)
        .map(|_| {
            let world = Arc::clone(&world);
            tokio::spawn(async move {
                world
                    .send(
                        passenger,
                        Command::CancelTicket {
                            ticket_id,
                            reason: None,
                        },
                    )
                    .await
            })
        })
        .collect();

    let mut cancelled = 0;
    for attempt in attempts {
        if attempt.await.expect("task completes").is_ok() {
            cancelled += 1;
        }
    }

    assert_eq!(cancelled, 1);
    assert_eq!(world.bus().await.available_seats, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_passengers_never_overdraw_the_ledger() {
    let world = Arc::new(World::new(10).await);
    let mut passengers = Vec::new();
    for _ in 0..8 {
        passengers.push(world.accepted_passenger().await);
    }

    let attempts: Vec<_> = passengers
        .into_iter()
        .map(|(passenger, booking_id)| {
            let world = Arc::clone(&world);
            tokio::spawn(async move { world.send(passenger, world.confirm(booking_id, 3)).await })
        })
        .collect();

    let mut seats_sold = 0;
    for attempt in attempts {
        if attempt.await.expect("task completes").is_ok() {
            seats_sold += 3;
        }
    }

    // Three tickets of three fit in ten seats.
    assert_eq!(seats_sold, 9);
    assert_eq!(world.bus().await.available_seats, 1);
}
