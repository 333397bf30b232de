//! End-to-end transactions through the client protocol
//!
//! Four shard servers and a coordinator run on loopback ports; a line client
//! drives them exactly as an interactive client would.

use futures_util::{SinkExt, StreamExt};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::codec::{Framed, LinesCodec};
use travel_common::{CustomerId, ItemKind, ShardKind, TxnId};
use travel_coordinator::{CoordinatorConfig, CoordinatorServer, ShardSet, TransactionManager};
use travel_protocol::{ClientLine, NO_ACTIVE_TRANSACTION, TXN_RESULT_END, TxnResult};
use travel_shard::{Record, ShardServer, ShardStore};

struct Cluster {
    addr: SocketAddr,
    stores: BTreeMap<ShardKind, Arc<ShardStore>>,
    manager: Arc<TransactionManager>,
    _shutdown: watch::Sender<bool>,
}

impl Cluster {
    async fn start() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut config = CoordinatorConfig {
            listen: "127.0.0.1:0".parse().unwrap(),
            workers: 2,
            ..CoordinatorConfig::default()
        };
        let mut stores = BTreeMap::new();

        for kind in ShardKind::ALL {
            let store = Arc::new(ShardStore::new(kind));
            let server = ShardServer::bind("127.0.0.1:0".parse().unwrap(), store.clone())
                .await
                .unwrap();
            config = config.with_endpoint(kind, server.local_addr().unwrap().to_string());
            tokio::spawn(server.run(shutdown_rx.clone()));
            stores.insert(kind, store);
        }

        let shards = ShardSet::connect(&config).unwrap();
        let coordinator = CoordinatorServer::bind(&config, shards).await.unwrap();
        let addr = coordinator.local_addr().unwrap();
        let manager = coordinator.manager();
        tokio::spawn(coordinator.run(shutdown_rx));

        Self {
            addr,
            stores,
            manager,
            _shutdown: shutdown_tx,
        }
    }

    fn store(&self, kind: ShardKind) -> &ShardStore {
        &self.stores[&kind]
    }

    async fn client(&self) -> Client {
        let stream = TcpStream::connect(self.addr).await.unwrap();
        Client {
            framed: Framed::new(stream, LinesCodec::new()),
        }
    }

    /// Run one batch to completion on a fresh connection
    async fn transact(&self, ops: &[&str]) -> TxnResult {
        let mut client = self.client().await;
        client.start().await;
        for op in ops {
            client.send(op).await;
        }
        client.commit().await
    }
}

struct Client {
    framed: Framed<TcpStream, LinesCodec>,
}

impl Client {
    async fn send(&mut self, line: &str) {
        self.framed.send(line.to_string()).await.unwrap();
    }

    async fn read_line(&mut self) -> String {
        self.framed.next().await.unwrap().unwrap()
    }

    async fn start(&mut self) -> TxnId {
        self.send("Start").await;
        let reply = self.read_line().await;
        ClientLine::parse_tid_line(&reply).unwrap()
    }

    async fn read_result(&mut self) -> TxnResult {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await;
            let done = line == TXN_RESULT_END;
            lines.push(line);
            if done {
                break;
            }
        }
        TxnResult::from_lines(&lines).unwrap()
    }

    async fn commit(&mut self) -> TxnResult {
        self.send("Commit").await;
        self.read_result().await
    }

    async fn abort(&mut self) -> TxnResult {
        self.send("Abort").await;
        self.read_result().await
    }
}

// ============================================================================
// Session protocol
// ============================================================================

#[tokio::test]
async fn test_operation_outside_transaction() {
    let cluster = Cluster::start().await;
    let mut client = cluster.client().await;

    client.send("QueryFlight,1").await;
    assert_eq!(client.read_line().await, NO_ACTIVE_TRANSACTION);
    client.send("Commit").await;
    assert_eq!(client.read_line().await, NO_ACTIVE_TRANSACTION);

    // Blank lines are ignored, the session still works
    client.send("").await;
    let tid = client.start().await;
    let result = client.commit().await;
    assert_eq!(result.tid, tid);
    assert!(result.is_committed());
}

#[tokio::test]
async fn test_tids_increase_across_clients() {
    let cluster = Cluster::start().await;
    let mut a = cluster.client().await;
    let mut b = cluster.client().await;

    let t1 = a.start().await;
    let t2 = b.start().await;
    assert!(t2 > t1);

    assert!(b.commit().await.is_committed());
    assert!(a.commit().await.is_committed());
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_basic_reserve() {
    let cluster = Cluster::start().await;

    assert!(cluster.transact(&["AddFlight,111,2,100"]).await.is_committed());
    assert!(cluster.transact(&["AddCustomerID,1"]).await.is_committed());

    let result = cluster.transact(&["ReserveFlight,1,111"]).await;
    assert!(result.is_committed());
    assert_eq!(result.result_of("ReserveFlight"), Some("OK,FlightReserved"));

    let result = cluster.transact(&["QueryFlight,111"]).await;
    assert_eq!(result.result_of("QueryFlight"), Some("OK,1"));

    let result = cluster.transact(&["QueryCustomer,1"]).await;
    let bill = result.result_of("QueryCustomer").unwrap();
    assert!(bill.contains("1 flight-111 $100"), "{bill}");
}

#[tokio::test]
async fn test_delete_blocked_by_reservation() {
    let cluster = Cluster::start().await;
    cluster
        .transact(&["AddFlight,111,2,100", "AddCustomerID,1"])
        .await;
    cluster.transact(&["ReserveFlight,1,111"]).await;

    let result = cluster.transact(&["DeleteFlight,111"]).await;
    assert!(!result.is_committed());
    assert_eq!(result.result_of("DeleteFlight"), Some("FAIL,FlightHasReservations"));

    let result = cluster.transact(&["QueryFlight,111"]).await;
    assert_eq!(result.result_of("QueryFlight"), Some("OK,1"));
}

#[tokio::test]
async fn test_lock_conflict_aborts_later_writer() {
    let cluster = Cluster::start().await;

    // T1 holds the car lock on the shard while still open
    let mut t1 = cluster.client().await;
    let tid1 = t1.start().await;
    cluster
        .store(ShardKind::Car)
        .add_item(tid1, ItemKind::Car, "YUL", 5, 50)
        .unwrap();

    let result = cluster.transact(&["AddCars,YUL,1,60"]).await;
    assert!(!result.is_committed());
    assert_eq!(result.result_of("AddCars"), Some("FAIL,LOCK_DENIED"));

    // Querying under T1 enlists the car shard, so T1's commit installs the add
    t1.send("QueryCars,YUL").await;
    let result = t1.commit().await;
    assert!(result.is_committed());

    let result = cluster.transact(&["QueryCars,YUL", "QueryCarsPrice,YUL"]).await;
    assert_eq!(result.result_of("QueryCars"), Some("OK,5"));
    assert_eq!(result.result_of("QueryCarsPrice"), Some("OK,50"));
}

#[tokio::test]
async fn test_bundle_all_or_nothing() {
    let cluster = Cluster::start().await;
    cluster
        .transact(&[
            "AddFlight,200,1,300",
            "AddCars,YYZ,0,50",
            "AddRooms,YYZ,1,120",
            "AddCustomerID,7",
        ])
        .await;

    let result = cluster.transact(&["Bundle,7,200,YYZ,true,true"]).await;
    assert!(!result.is_committed());

    let flight = cluster
        .store(ShardKind::Flight)
        .committed_item(ItemKind::Flight, "200")
        .unwrap();
    assert_eq!(flight.count, 1);
    let room = cluster
        .store(ShardKind::Room)
        .committed_item(ItemKind::Room, "YYZ")
        .unwrap();
    assert_eq!(room.count, 1);

    let result = cluster.transact(&["QueryCustomer,7"]).await;
    assert_eq!(result.result_of("QueryCustomer"), Some("OK,Bill for customer 7:"));
}

#[tokio::test]
async fn test_two_phase_commit_across_shards() {
    let cluster = Cluster::start().await;

    let result = cluster
        .transact(&["AddFlight,300,10,80", "AddCustomerID,9", "ReserveFlight,9,300"])
        .await;
    assert!(result.is_committed());
    assert_eq!(result.entries.len(), 4);
    assert!(result.entries.iter().all(|e| e.result.starts_with("OK")));
    assert_eq!(result.entries[3].command, "Commit");

    let flight = cluster
        .store(ShardKind::Flight)
        .committed_item(ItemKind::Flight, "300")
        .unwrap();
    assert_eq!((flight.count, flight.reserved), (9, 1));

    let record = cluster
        .store(ShardKind::Customer)
        .committed_record(&CustomerId::new(9).key())
        .and_then(Record::into_customer)
        .unwrap();
    assert_eq!(record.reservation_list(), "flight-300:1");
}

#[tokio::test]
async fn test_abort_discards_batch() {
    let cluster = Cluster::start().await;

    let mut client = cluster.client().await;
    let tid = client.start().await;
    client.send("AddFlight,400,3,40").await;
    let result = client.abort().await;

    assert_eq!(result.tid, tid);
    assert!(!result.is_committed());
    assert!(result.entries.is_empty());

    let result = cluster.transact(&["QueryFlight,400"]).await;
    assert_eq!(result.result_of("QueryFlight"), Some("OK,0"));
    assert_eq!(
        cluster.manager.status(tid),
        travel_coordinator::TransactionStatus::Aborted
    );
}

#[tokio::test]
async fn test_delete_customer_cascade_over_tcp() {
    let cluster = Cluster::start().await;
    cluster
        .transact(&["AddRooms,CDG,2,200", "AddCustomerID,12"])
        .await;
    cluster
        .transact(&["ReserveRoom,12,CDG", "ReserveRoom,12,CDG"])
        .await;

    let result = cluster.transact(&["DeleteCustomer,12"]).await;
    assert!(result.is_committed());

    let room = cluster
        .store(ShardKind::Room)
        .committed_item(ItemKind::Room, "CDG")
        .unwrap();
    assert_eq!((room.count, room.reserved), (2, 0));

    let result = cluster.transact(&["CustomerExists,12"]).await;
    assert_eq!(result.result_of("CustomerExists"), Some("OK,false"));
}
