//! Worker logic against in-process shards
//!
//! Shards are plain `ShardStore`s behind a `ShardTransport` adapter, so the
//! dispatch, fail-fast and two-phase commit paths run without sockets.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use travel_common::{CustomerId, ItemKind, ShardKind, TxnId};
use travel_coordinator::{Executor, ShardSet, TransactionManager, TransactionStatus, TxnRequest};
use travel_protocol::{Reply, ShardCommand, ShardRequest, TransactionPhase, TxnResult};
use travel_shard::{Record, ReservableItem, ShardStore, TransactionParticipant};
use travel_shard_client::ShardTransport;

struct LocalShard {
    store: Arc<ShardStore>,
}

#[async_trait]
impl ShardTransport for LocalShard {
    fn kind(&self) -> ShardKind {
        self.store.kind()
    }

    async fn send(&self, tid: TxnId, command: &ShardCommand) -> Reply {
        self.store.handle(&ShardRequest::new(tid, command.clone()))
    }
}

/// Answers one phase with a canned reply, forwards everything else
struct PhaseFault {
    inner: LocalShard,
    phase: TransactionPhase,
    reply: Reply,
}

#[async_trait]
impl ShardTransport for PhaseFault {
    fn kind(&self) -> ShardKind {
        self.inner.kind()
    }

    async fn send(&self, tid: TxnId, command: &ShardCommand) -> Reply {
        match command {
            ShardCommand::Phase(phase) if *phase == self.phase => self.reply.clone(),
            _ => self.inner.send(tid, command).await,
        }
    }
}

/// Logs the wire form of every command before forwarding it
struct Recorder {
    inner: LocalShard,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ShardTransport for Recorder {
    fn kind(&self) -> ShardKind {
        self.inner.kind()
    }

    async fn send(&self, tid: TxnId, command: &ShardCommand) -> Reply {
        self.log.lock().push(command.to_string());
        self.inner.send(tid, command).await
    }
}

struct Harness {
    executor: Executor,
    stores: BTreeMap<ShardKind, Arc<ShardStore>>,
}

impl Harness {
    fn new() -> Self {
        Self::with_fault(None)
    }

    fn with_fault(fault: Option<(ShardKind, TransactionPhase, Reply)>) -> Self {
        Self::build(|local| -> Arc<dyn ShardTransport> {
            match &fault {
                Some((faulty, phase, reply)) if *faulty == local.kind() => Arc::new(PhaseFault {
                    inner: local,
                    phase: *phase,
                    reply: reply.clone(),
                }),
                _ => Arc::new(local),
            }
        })
    }

    /// Every command sent to `kind` is recorded in the returned log
    fn recording(kind: ShardKind) -> (Self, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let harness = Self::build(|local| -> Arc<dyn ShardTransport> {
            if local.kind() == kind {
                Arc::new(Recorder {
                    inner: local,
                    log: log.clone(),
                })
            } else {
                Arc::new(local)
            }
        });
        (harness, log)
    }

    fn build(wrap: impl Fn(LocalShard) -> Arc<dyn ShardTransport>) -> Self {
        let mut shards = ShardSet::new();
        let mut stores = BTreeMap::new();

        for kind in ShardKind::ALL {
            let store = Arc::new(ShardStore::new(kind));
            stores.insert(kind, store.clone());
            shards.insert(wrap(LocalShard { store }));
        }

        Self {
            executor: Executor::new(Arc::new(TransactionManager::new()), shards),
            stores,
        }
    }

    fn store(&self, kind: ShardKind) -> &ShardStore {
        &self.stores[&kind]
    }

    fn committed(&self, kind: ItemKind, id: &str) -> Option<ReservableItem> {
        self.store(kind.shard()).committed_item(kind, id)
    }

    fn committed_record(&self, key: &str) -> Option<Record> {
        self.store(ShardKind::Customer).committed_record(key)
    }

    fn manager(&self) -> &TransactionManager {
        self.executor.manager()
    }

    async fn run(&self, ops: &[&str]) -> TxnResult {
        let tid = self.manager().begin();
        let (reply, _results) = mpsc::unbounded_channel();
        let mut operations: Vec<String> = ops.iter().map(|op| op.to_string()).collect();
        operations.push("Commit".to_string());
        self.executor
            .run(&TxnRequest::commit(tid, operations, reply))
            .await
    }

    fn assert_quiescent(&self) {
        for (kind, store) in &self.stores {
            assert_eq!(store.live_transactions(), 0, "{kind} has live transactions");
        }
    }
}

// ============================================================================
// Forwarding and fail-fast
// ============================================================================

#[tokio::test]
async fn test_single_shard_operations_commit() {
    let h = Harness::new();

    let result = h.run(&["AddFlight,111,2,100", "QueryFlight,111"]).await;
    assert!(result.is_committed());
    assert_eq!(result.result_of("AddFlight"), Some("OK"));
    assert_eq!(result.result_of("QueryFlight"), Some("OK,2"));
    assert_eq!(result.result_of("Commit"), Some("OK"));
    assert_eq!(h.manager().status(result.tid), TransactionStatus::Committed);
    // Only the status outlives the decision
    assert!(h.manager().participants(result.tid).is_empty());

    let item = h.committed(ItemKind::Flight, "111").unwrap();
    assert_eq!((item.count, item.price), (2, 100));
    h.assert_quiescent();
}

#[tokio::test]
async fn test_first_failure_stops_the_batch() {
    let (h, car_log) = Harness::recording(ShardKind::Car);

    let result = h
        .run(&["AddFlight,1,5,10", "Frobnicate,1", "AddCars,YUL,1,1"])
        .await;

    assert!(!result.is_committed());
    assert_eq!(result.entries.len(), 2);
    assert_eq!(result.result_of("Frobnicate"), Some("FAIL,UNKNOWN_CMD"));
    assert_eq!(result.result_of("AddCars"), None);
    assert_eq!(h.manager().status(result.tid), TransactionStatus::Aborted);

    // Staged flight discarded, car shard never contacted
    assert!(h.committed(ItemKind::Flight, "1").is_none());
    assert!(car_log.lock().is_empty());
    h.assert_quiescent();
}

#[tokio::test]
async fn test_bad_arguments_fail() {
    let h = Harness::new();
    let result = h.run(&["AddFlight,1,many,10"]).await;
    assert_eq!(result.result_of("AddFlight"), Some("FAIL,BAD_ARGS"));
    assert!(!result.is_committed());
}

#[tokio::test]
async fn test_query_reserved_needs_a_full_key() {
    let h = Harness::new();
    h.run(&["AddFlight,9,1,10"]).await;

    let result = h.run(&["QueryReserved,flight-9"]).await;
    assert_eq!(result.result_of("QueryReserved"), Some("OK,0"));

    let result = h.run(&["QueryReserved,9"]).await;
    assert_eq!(result.result_of("QueryReserved"), Some("FAIL,NO_ROUTE"));
}

#[tokio::test]
async fn test_add_customer_returns_fresh_ids() {
    let h = Harness::new();
    let first = h.run(&["AddCustomer"]).await;
    let second = h.run(&["AddCustomer"]).await;

    assert!(first.is_committed() && second.is_committed());
    assert_ne!(first.result_of("AddCustomer"), second.result_of("AddCustomer"));
}

// ============================================================================
// Reservations
// ============================================================================

#[tokio::test]
async fn test_reserve_flight_updates_both_shards() {
    let (h, customer_log) = Harness::recording(ShardKind::Customer);
    h.run(&["AddFlight,111,2,100", "AddCustomerID,1"]).await;
    customer_log.lock().clear();

    let result = h.run(&["ReserveFlight,1,111"]).await;
    assert!(result.is_committed());
    assert_eq!(result.result_of("ReserveFlight"), Some("OK,FlightReserved"));
    assert_eq!(
        *customer_log.lock(),
        vec![
            "CustomerExists,1",
            "CustomerReserve,1,flight-111,1,100",
            "Prepare",
            "Commit"
        ]
    );

    let item = h.committed(ItemKind::Flight, "111").unwrap();
    assert_eq!((item.count, item.reserved), (1, 1));

    let bill = h.run(&["QueryCustomer,1"]).await;
    assert_eq!(
        bill.result_of("QueryCustomer"),
        Some("OK,Bill for customer 1: 1 flight-111 $100")
    );
}

#[tokio::test]
async fn test_reserve_checks_customer_then_item_then_inventory() {
    let h = Harness::new();
    h.run(&["AddCars,YUL,0,40", "AddCustomerID,3"]).await;

    let result = h.run(&["ReserveCar,99,YUL"]).await;
    assert_eq!(result.result_of("ReserveCar"), Some("FAIL,CustomerDoesNotExist"));

    let result = h.run(&["ReserveRoom,3,YUL"]).await;
    assert_eq!(result.result_of("ReserveRoom"), Some("FAIL,RoomNotFound"));

    let result = h.run(&["ReserveCar,3,YUL"]).await;
    assert_eq!(result.result_of("ReserveCar"), Some("FAIL,CarNotReserved"));
    assert!(!result.is_committed());

    let bill = h.run(&["QueryCustomer,3"]).await;
    assert_eq!(bill.result_of("QueryCustomer"), Some("OK,Bill for customer 3:"));
    h.assert_quiescent();
}

#[tokio::test]
async fn test_customer_update_failure_returns_the_unit() {
    let (h, flight_log) = Harness::recording(ShardKind::Flight);
    h.run(&["AddFlight,111,2,100", "AddCustomerID,1"]).await;

    // A reader elsewhere keeps the customer record from being upgraded
    let reader = TxnId::new(10_000);
    assert!(
        h.store(ShardKind::Customer)
            .customer_exists(reader, CustomerId::new(1))
            .unwrap()
    );
    flight_log.lock().clear();

    let result = h.run(&["ReserveFlight,1,111"]).await;
    assert_eq!(result.result_of("ReserveFlight"), Some("FAIL,CouldNotUpdateCustomer"));
    assert!(!result.is_committed());
    assert_eq!(h.manager().status(result.tid), TransactionStatus::Aborted);

    let sent = flight_log.lock().clone();
    let reserve = sent.iter().position(|c| c == "ReserveFlight,1,111").unwrap();
    assert_eq!(sent[reserve + 1], "rollbackReserve,1,flight-111,1");
    assert_eq!(sent.last().map(String::as_str), Some("Abort"));

    let item = h.committed(ItemKind::Flight, "111").unwrap();
    assert_eq!((item.count, item.reserved), (2, 0));

    h.store(ShardKind::Customer).abort(reader).unwrap();
    h.assert_quiescent();
}

#[tokio::test]
async fn test_lock_denial_during_checks_is_passed_through() {
    let h = Harness::new();
    h.run(&["AddRooms,YYZ,1,120", "AddCustomerID,2"]).await;

    let writer = TxnId::new(10_000);
    h.store(ShardKind::Room)
        .add_item(writer, ItemKind::Room, "YYZ", 1, 0)
        .unwrap();

    let result = h.run(&["ReserveRoom,2,YYZ"]).await;
    assert_eq!(result.result_of("ReserveRoom"), Some("FAIL,LOCK_DENIED"));

    let result = h.run(&["DeleteRooms,YYZ"]).await;
    assert_eq!(result.result_of("DeleteRooms"), Some("FAIL,LOCK_DENIED"));

    h.store(ShardKind::Room).abort(writer).unwrap();
    h.assert_quiescent();
}

#[tokio::test]
async fn test_bundle_is_all_or_nothing() {
    let h = Harness::new();
    h.run(&[
        "AddFlight,200,1,300",
        "AddCars,YYZ,0,50",
        "AddRooms,YYZ,1,120",
        "AddCustomerID,7",
    ])
    .await;

    let result = h.run(&["Bundle,7,200,YYZ,true,true"]).await;
    assert!(!result.is_committed());
    assert_eq!(
        result.result_of("Bundle"),
        Some("FAIL,BundleFailed -> ReserveCar,7,YYZ")
    );

    let flight = h.committed(ItemKind::Flight, "200").unwrap();
    assert_eq!((flight.count, flight.reserved), (1, 0));
    let room = h.committed(ItemKind::Room, "YYZ").unwrap();
    assert_eq!((room.count, room.reserved), (1, 0));

    let bill = h.run(&["QueryCustomer,7"]).await;
    assert_eq!(bill.result_of("QueryCustomer"), Some("OK,Bill for customer 7:"));
    h.assert_quiescent();
}

#[tokio::test]
async fn test_bundle_success() {
    let h = Harness::new();
    h.run(&[
        "AddFlight,1,3,100",
        "AddFlight,2,3,150",
        "AddRooms,LHR,2,90",
        "AddCustomerID,5",
    ])
    .await;

    let result = h.run(&["Bundle,5,1,2,LHR,false,true"]).await;
    assert!(result.is_committed());
    assert_eq!(result.result_of("Bundle"), Some("OK,BundleSuccess"));

    let result = h.run(&["getItem,customer-5"]).await;
    assert_eq!(
        result.result_of("getItem"),
        Some("OK,flight-1:1;flight-2:1;room-lhr:1")
    );
}

// ============================================================================
// Deletes
// ============================================================================

#[tokio::test]
async fn test_delete_item_preconditions() {
    let h = Harness::new();
    h.run(&["AddFlight,111,2,100", "AddFlight,112,2,100", "AddCustomerID,1"])
        .await;
    h.run(&["ReserveFlight,1,111"]).await;

    let result = h.run(&["DeleteFlight,111"]).await;
    assert_eq!(result.result_of("DeleteFlight"), Some("FAIL,FlightHasReservations"));
    assert!(h.committed(ItemKind::Flight, "111").is_some());

    let result = h.run(&["DeleteFlight,404"]).await;
    assert_eq!(result.result_of("DeleteFlight"), Some("FAIL,FlightNotFound"));

    let result = h.run(&["DeleteFlight,112"]).await;
    assert!(result.is_committed());
    assert!(h.committed(ItemKind::Flight, "112").is_none());
}

#[tokio::test]
async fn test_delete_customer_returns_reservations() {
    let h = Harness::new();
    h.run(&["AddFlight,10,2,100", "AddCars,SFO,2,30", "AddCustomerID,4"])
        .await;
    h.run(&["ReserveFlight,4,10", "ReserveFlight,4,10", "ReserveCar,4,SFO"])
        .await;

    let result = h.run(&["DeleteCustomer,4"]).await;
    assert!(result.is_committed());
    assert_eq!(result.result_of("DeleteCustomer"), Some("OK,CustomerDeleted"));

    let flight = h.committed(ItemKind::Flight, "10").unwrap();
    assert_eq!((flight.count, flight.reserved), (2, 0));
    let car = h.committed(ItemKind::Car, "SFO").unwrap();
    assert_eq!((car.count, car.reserved), (2, 0));
    assert!(h.committed_record("customer-4").is_none());

    let result = h.run(&["DeleteCustomer,4"]).await;
    assert_eq!(result.result_of("DeleteCustomer"), Some("FAIL,NoSuchCustomer"));
}

// ============================================================================
// Two-phase commit
// ============================================================================

#[tokio::test]
async fn test_prepare_rejection_aborts_everywhere() {
    let h = Harness::with_fault(Some((
        ShardKind::Customer,
        TransactionPhase::Prepare,
        Reply::fail("PREPARE_FAILED"),
    )));

    let result = h.run(&["AddFlight,300,10,80", "AddCustomerID,9"]).await;
    assert!(!result.is_committed());
    assert_eq!(h.manager().status(result.tid), TransactionStatus::Aborted);

    assert!(h.committed(ItemKind::Flight, "300").is_none());
    assert!(h.committed_record("customer-9").is_none());
    h.assert_quiescent();
}

#[tokio::test]
async fn test_commit_failure_after_prepare_is_presumed_committed() {
    let h = Harness::with_fault(Some((
        ShardKind::Customer,
        TransactionPhase::Commit,
        Reply::error("CONNECTION_CLOSED"),
    )));

    let result = h.run(&["AddFlight,300,10,80", "AddCustomerID,9"]).await;
    assert!(result.is_committed());
    assert_eq!(h.manager().status(result.tid), TransactionStatus::Committed);
    assert!(h.committed(ItemKind::Flight, "300").is_some());
}

#[tokio::test]
async fn test_explicit_abort_request() {
    let h = Harness::new();
    let tid = h.manager().begin();
    let (reply, _results) = mpsc::unbounded_channel();

    let result = h.executor.run(&TxnRequest::abort(tid, reply)).await;
    assert!(!result.is_committed());
    assert!(result.entries.is_empty());
    assert_eq!(h.manager().status(tid), TransactionStatus::Aborted);
}

#[tokio::test]
async fn test_lock_conflict_between_batches() {
    let h = Harness::new();
    h.run(&["AddCars,YUL,5,50"]).await;

    // Another transaction holds the car exclusively on the shard
    let holder = TxnId::new(10_000);
    h.store(ShardKind::Car)
        .add_item(holder, ItemKind::Car, "YUL", 1, 60)
        .unwrap();

    let result = h.run(&["AddCars,YUL,1,60"]).await;
    assert_eq!(result.result_of("AddCars"), Some("FAIL,LOCK_DENIED"));
    assert!(!result.is_committed());

    h.store(ShardKind::Car).abort(holder).unwrap();

    let result = h.run(&["QueryCars,YUL", "QueryCarsPrice,YUL"]).await;
    assert_eq!(result.result_of("QueryCars"), Some("OK,5"));
    assert_eq!(result.result_of("QueryCarsPrice"), Some("OK,50"));
}
