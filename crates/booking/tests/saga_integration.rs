//! End-to-end saga scenarios over the in-memory stack: oversell prevention
//! under concurrency, hold TTL expiry after a crashed saga, and the
//! recovery worker finishing or giving up on stuck bookings.

use std::sync::Arc;
use std::time::Duration;

use booking::{
    BookingOrchestrator, BookingService, BookingStatus, BookingStore, CreateBooking,
    InMemoryBookingStore, InMemoryEventPublisher, LocalInventoryApi, LocalPaymentApi,
    RecoveryConfig, RecoveryWorker, RemoteError, RetryPolicy, SagaOutcome, SagaStep,
    ScriptedFaults, codes,
};
use chrono::{NaiveDate, Utc};
use common::{BookingId, Money, RoomId, UserId};
use idempotency::IdempotencyLayer;
use inventory::{
    HoldReaper, InMemoryInventoryStore, InMemoryLockProvider, InventoryConfig, InventoryService,
    ReserveRequest,
};
use payment::{InMemoryPaymentStore, PaymentService, SimulatedGateway};

struct Stack {
    service: BookingService,
    orchestrator: Arc<BookingOrchestrator>,
    bookings: Arc<InMemoryBookingStore>,
    inventory: Arc<InventoryService>,
    inventory_store: Arc<InMemoryInventoryStore>,
    payments: Arc<InMemoryPaymentStore>,
    publisher: Arc<InMemoryEventPublisher>,
    payment_faults: Arc<ScriptedFaults<LocalPaymentApi>>,
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn build_stack(gateway: SimulatedGateway, inventory_config: InventoryConfig) -> Stack {
    let inventory_store = Arc::new(InMemoryInventoryStore::new());
    let inventory = Arc::new(InventoryService::new(
        inventory_store.clone(),
        Arc::new(InMemoryLockProvider::new()),
        IdempotencyLayer::disabled("idempotency:reserve:"),
        inventory_config,
    ));

    let payments = Arc::new(InMemoryPaymentStore::new());
    let payment_service = Arc::new(PaymentService::new(
        payments.clone(),
        Arc::new(gateway),
        IdempotencyLayer::disabled("idempotency:payment:"),
    ));

    let bookings = Arc::new(InMemoryBookingStore::new());
    let publisher = Arc::new(InMemoryEventPublisher::new());
    let payment_faults = Arc::new(ScriptedFaults::new(LocalPaymentApi::new(payment_service)));

    let orchestrator = Arc::new(BookingOrchestrator::new(
        bookings.clone(),
        Arc::new(LocalInventoryApi::new(inventory.clone())),
        payment_faults.clone(),
        publisher.clone(),
        RetryPolicy::none(),
    ));
    let service = BookingService::new(bookings.clone(), orchestrator.clone());

    Stack {
        service,
        orchestrator,
        bookings,
        inventory,
        inventory_store,
        payments,
        publisher,
        payment_faults,
    }
}

async fn seed(stack: &Stack, room: i64, dates: &[&str], count: i32, price_major: i64) {
    for d in dates {
        stack
            .inventory
            .seed_availability(
                RoomId::new(room),
                date(d),
                count,
                Money::from_major(price_major),
            )
            .await
            .unwrap();
    }
}

async fn available(stack: &Stack, room: i64, d: &str) -> i32 {
    stack
        .inventory
        .availability(RoomId::new(room), date(d))
        .await
        .unwrap()
        .unwrap()
        .available_count
}

fn command(room: i64, check_in: &str, check_out: &str, quantity: i32) -> CreateBooking {
    CreateBooking {
        user_id: UserId::new(1),
        room_id: RoomId::new(room),
        check_in: date(check_in),
        check_out: date(check_out),
        quantity,
    }
}

#[tokio::test]
async fn happy_path_end_to_end() {
    let stack = build_stack(SimulatedGateway::always_approve(), InventoryConfig::default());
    seed(&stack, 101, &["2026-02-01", "2026-02-02"], 5, 100).await;

    let outcome = stack
        .service
        .create_booking(command(101, "2026-02-01", "2026-02-03", 2))
        .await
        .unwrap();

    let SagaOutcome::Confirmed(booking) = outcome else {
        panic!("expected Confirmed, got {outcome:?}");
    };
    assert_eq!(booking.total_price, Some(Money::from_major(400)));
    assert_eq!(available(&stack, 101, "2026-02-01").await, 3);
    assert_eq!(available(&stack, 101, "2026-02-02").await, 3);
    assert_eq!(stack.inventory_store.hold_count().await, 0);

    let events = stack.publisher.published().await;
    assert_eq!(events.len(), 1);
    assert!(!events[0].recovery_confirmed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookings_never_oversell() {
    // A generous lock wait keeps queued requests from timing out under the
    // deliberately extreme contention.
    let stack = Arc::new(build_stack(
        SimulatedGateway::always_approve(),
        InventoryConfig {
            lock_wait: Duration::from_secs(60),
            ..InventoryConfig::default()
        },
    ));
    seed(&stack, 101, &["2026-02-01"], 1, 100).await;

    let mut tasks = Vec::new();
    for _ in 0..100 {
        let stack = stack.clone();
        tasks.push(tokio::spawn(async move {
            stack
                .service
                .create_booking(command(101, "2026-02-01", "2026-02-02", 1))
                .await
                .unwrap()
        }));
    }

    let mut confirmed = 0;
    let mut refused = 0;
    for task in tasks {
        match task.await.unwrap() {
            SagaOutcome::Confirmed(_) => confirmed += 1,
            SagaOutcome::BusinessFailure { code, .. } => {
                assert_eq!(code, codes::INSUFFICIENT_AVAILABILITY);
                refused += 1;
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(confirmed, 1);
    assert_eq!(refused, 99);
    assert_eq!(available(&stack, 101, "2026-02-01").await, 0);
}

#[tokio::test]
async fn payment_decline_restores_stock() {
    let stack = build_stack(SimulatedGateway::always_decline(), InventoryConfig::default());
    seed(&stack, 101, &["2026-02-01", "2026-02-02"], 5, 100).await;

    let outcome = stack
        .service
        .create_booking(command(101, "2026-02-01", "2026-02-03", 2))
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        SagaOutcome::BusinessFailure { ref code, .. } if code == codes::PAYMENT_DECLINED
    ));
    assert_eq!(available(&stack, 101, "2026-02-01").await, 5);
    assert_eq!(available(&stack, 101, "2026-02-02").await, 5);
    assert_eq!(stack.inventory_store.hold_count().await, 0);
    assert_eq!(stack.publisher.count().await, 0);
}

#[tokio::test]
async fn recovery_worker_confirms_an_unclear_payment() {
    let stack = build_stack(SimulatedGateway::always_approve(), InventoryConfig::default());
    seed(&stack, 101, &["2026-02-01", "2026-02-02"], 5, 100).await;
    stack.payment_faults.push_fault(RemoteError::Timeout);

    let outcome = stack
        .service
        .create_booking(command(101, "2026-02-01", "2026-02-03", 2))
        .await
        .unwrap();
    let SagaOutcome::PendingUnclear(booking) = outcome else {
        panic!("expected PendingUnclear, got {outcome:?}");
    };
    assert_eq!(booking.saga_step, SagaStep::PaymentSent);

    let worker = RecoveryWorker::new(
        stack.bookings.clone(),
        stack.orchestrator.clone(),
        RecoveryConfig {
            stuck_after: Duration::ZERO,
            ..RecoveryConfig::default()
        },
    );
    tokio::time::sleep(Duration::from_millis(5)).await;
    let stats = worker.run_once().await.unwrap();
    assert_eq!(stats.examined, 1);
    assert_eq!(stats.gave_up, 0);

    let booking = stack.bookings.get(booking.id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);

    // Decremented exactly once despite the retry.
    assert_eq!(available(&stack, 101, "2026-02-01").await, 3);
    assert_eq!(stack.payments.payment_count().await, 1);

    let events = stack.publisher.published().await;
    assert_eq!(events.len(), 1);
    assert!(events[0].recovery_confirmed);
}

#[tokio::test]
async fn recovery_worker_ignores_fresh_bookings() {
    let stack = build_stack(SimulatedGateway::always_approve(), InventoryConfig::default());
    seed(&stack, 101, &["2026-02-01"], 5, 100).await;
    stack.payment_faults.push_fault(RemoteError::Timeout);

    stack
        .service
        .create_booking(command(101, "2026-02-01", "2026-02-02", 1))
        .await
        .unwrap();

    // Default stuck threshold is 10 minutes; a fresh booking is not touched.
    let worker = RecoveryWorker::new(
        stack.bookings.clone(),
        stack.orchestrator.clone(),
        RecoveryConfig::default(),
    );
    let stats = worker.run_once().await.unwrap();
    assert_eq!(stats.examined, 0);
}

#[tokio::test]
async fn give_up_past_threshold_keeps_the_room_at_payment_sent() {
    let stack = build_stack(SimulatedGateway::always_approve(), InventoryConfig::default());
    seed(&stack, 101, &["2026-02-01", "2026-02-02"], 5, 100).await;
    stack.payment_faults.push_fault(RemoteError::Timeout);

    let outcome = stack
        .service
        .create_booking(command(101, "2026-02-01", "2026-02-03", 2))
        .await
        .unwrap();
    let booking_id = outcome.booking().id;

    // Age the booking past the give-up threshold.
    stack
        .bookings
        .backdate(booking_id, Utc::now() - Duration::from_secs(25 * 60 * 60))
        .await;

    let worker = RecoveryWorker::new(
        stack.bookings.clone(),
        stack.orchestrator.clone(),
        RecoveryConfig::default(),
    );
    let stats = worker.run_once().await.unwrap();
    assert_eq!(stats.examined, 1);
    assert_eq!(stats.gave_up, 1);

    let booking = stack.bookings.get(booking_id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Failed);
    assert_eq!(booking.saga_step, SagaStep::Failed);

    // The room is not auto-credited: stock stays decremented and the holds
    // remain until their TTL.
    assert_eq!(available(&stack, 101, "2026-02-01").await, 3);
    assert_eq!(stack.inventory_store.hold_count().await, 2);
    assert_eq!(stack.publisher.count().await, 0);
}

#[tokio::test]
async fn give_up_past_threshold_releases_at_reserve_sent() {
    let stack = build_stack(SimulatedGateway::always_approve(), InventoryConfig::default());
    seed(&stack, 101, &["2026-02-01"], 5, 100).await;

    // A booking whose process died before the reserve landed: the row sits
    // at RESERVE_SENT and inventory never took anything.
    let booking = stack
        .bookings
        .create(booking::NewBooking {
            user_id: UserId::new(1),
            room_id: RoomId::new(101),
            check_in: date("2026-02-01"),
            check_out: date("2026-02-02"),
            quantity: 1,
        })
        .await
        .unwrap();
    let booking_id = booking.id;
    assert_eq!(booking.saga_step, SagaStep::ReserveSent);
    stack
        .bookings
        .backdate(booking_id, Utc::now() - Duration::from_secs(25 * 60 * 60))
        .await;

    let worker = RecoveryWorker::new(
        stack.bookings.clone(),
        stack.orchestrator.clone(),
        RecoveryConfig::default(),
    );
    worker.run_once().await.unwrap();

    let booking = stack.bookings.get(booking_id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Failed);
    assert_eq!(available(&stack, 101, "2026-02-01").await, 5);
}

#[tokio::test]
async fn crashed_saga_holds_lapse_via_the_reaper() {
    // Reserve with a booking key and never confirm, as if the orchestrator
    // died before charging. hold_ttl of zero expires the hold immediately.
    let stack = build_stack(
        SimulatedGateway::always_approve(),
        InventoryConfig {
            hold_ttl: Duration::ZERO,
            ..InventoryConfig::default()
        },
    );
    seed(&stack, 101, &["2026-02-01", "2026-02-02"], 5, 100).await;

    stack
        .inventory
        .reserve(ReserveRequest {
            room_id: RoomId::new(101),
            check_in: date("2026-02-01"),
            check_out: date("2026-02-03"),
            quantity: 2,
            idempotency_key: Some("booking-77".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(available(&stack, 101, "2026-02-01").await, 3);

    let reaper = HoldReaper::new(stack.inventory_store.clone(), Duration::from_secs(60));
    let released = reaper.run_once().await.unwrap();
    assert_eq!(released, 2);

    assert_eq!(available(&stack, 101, "2026-02-01").await, 5);
    assert_eq!(available(&stack, 101, "2026-02-02").await, 5);
    assert!(
        stack
            .inventory
            .holds_for_booking(BookingId::new(77))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn reserve_retried_with_same_key_takes_stock_once() {
    let stack = build_stack(SimulatedGateway::always_approve(), InventoryConfig::default());
    seed(&stack, 101, &["2026-02-01"], 5, 100).await;

    let request = ReserveRequest {
        room_id: RoomId::new(101),
        check_in: date("2026-02-01"),
        check_out: date("2026-02-02"),
        quantity: 2,
        idempotency_key: Some("booking-42".to_string()),
    };
    let first = stack.inventory.reserve(request.clone()).await.unwrap();
    let second = stack.inventory.reserve(request).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(available(&stack, 101, "2026-02-01").await, 3);
    assert_eq!(
        stack
            .inventory
            .holds_for_booking(BookingId::new(42))
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn stock_is_conserved_across_mixed_outcomes() {
    let stack = build_stack(SimulatedGateway::always_approve(), InventoryConfig::default());
    seed(&stack, 101, &["2026-02-01"], 10, 100).await;

    // One confirmed booking, one declined, one stuck at PAYMENT_SENT.
    stack
        .service
        .create_booking(command(101, "2026-02-01", "2026-02-02", 2))
        .await
        .unwrap();

    stack
        .payment_faults
        .push_fault(RemoteError::business(codes::PAYMENT_DECLINED, "declined"));
    stack
        .service
        .create_booking(command(101, "2026-02-01", "2026-02-02", 3))
        .await
        .unwrap();

    stack.payment_faults.push_fault(RemoteError::Timeout);
    stack
        .service
        .create_booking(command(101, "2026-02-01", "2026-02-02", 1))
        .await
        .unwrap();

    // Seeded 10 = available + held + confirmed: 10 = 7 + 1 + 2.
    let available_now = available(&stack, 101, "2026-02-01").await;
    let held: i32 = {
        let mut total = 0;
        for booking in stack.bookings.for_user(UserId::new(1)).await.unwrap() {
            for hold in stack
                .inventory
                .holds_for_booking(booking.id)
                .await
                .unwrap()
            {
                total += hold.quantity;
            }
        }
        total
    };
    let confirmed: i32 = stack
        .bookings
        .for_user(UserId::new(1))
        .await
        .unwrap()
        .iter()
        .filter(|b| b.status == BookingStatus::Confirmed)
        .map(|b| b.quantity)
        .sum();

    assert_eq!(available_now, 7);
    assert_eq!(held, 1);
    assert_eq!(confirmed, 2);
    assert_eq!(available_now + held + confirmed, 10);
}
