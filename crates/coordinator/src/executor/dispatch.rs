use travel_common::TxnId;
use travel_protocol::{ClientLine, Operation, Reply};

use super::Executor;

/// Reason used when an operation names no shard that could serve it
pub const NO_ROUTE: &str = "NO_ROUTE";

impl Executor {
    /// Run one batched line, returning the echoed command name and its result
    pub(super) async fn execute_line(&self, tid: TxnId, line: &str) -> (String, Reply) {
        let command = command_token(line).to_string();

        if ClientLine::parse(line) == Some(ClientLine::Commit) {
            return (command, Reply::ok());
        }

        let reply = match Operation::parse(line) {
            Ok(op) => self.execute(tid, &op).await,
            Err(e) => Reply::fail(e.reason()),
        };
        (command, reply)
    }

    /// Route a parsed operation.
    ///
    /// Single-shard operations are forwarded unchanged. Reservations, bundles
    /// and deletes expand into a checked sequence across shards.
    pub(super) async fn execute(&self, tid: TxnId, op: &Operation) -> Reply {
        match op {
            Operation::DeleteItem { kind, id } => self.delete_item(tid, *kind, id).await,
            Operation::Reserve { kind, customer, id } => {
                self.reserve(tid, *kind, *customer, id).await
            }
            Operation::Bundle {
                customer,
                flights,
                location,
                car,
                room,
            } => {
                self.bundle(tid, *customer, flights, location, *car, *room)
                    .await
            }
            Operation::DeleteCustomer { customer } => self.delete_customer(tid, *customer).await,
            _ => match op.home_shard() {
                Some(kind) => self.send(tid, kind, op.clone()).await,
                None => Reply::fail(NO_ROUTE),
            },
        }
    }
}

fn command_token(line: &str) -> &str {
    line.split(',').next().unwrap_or_default().trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_token() {
        assert_eq!(command_token("AddFlight,1,2,3"), "AddFlight");
        assert_eq!(command_token("  QueryCustomer , 4"), "QueryCustomer");
        assert_eq!(command_token("Commit"), "Commit");
        assert_eq!(command_token(""), "");
    }
}
