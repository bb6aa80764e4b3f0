use std::sync::Arc;

use ledger_driver::blocking;
use ledger_driver::client::ClientConfig;
use ledger_driver::error::Error;
use ledger_driver::statement::Statement;

mod common;
use common::*;

#[ctor::ctor]
fn init() {
    let _ = tracing_subscriber::fmt().try_init();
}

#[test]
fn blocking_execute_round_trip() {
    let transport: Arc<dyn ledger_driver::transport::Transport> =
        EchoTransport::with_values(&["doc-1", "doc-2"]);
    let client =
        blocking::Client::new(Arc::clone(&transport), "test-ledger", ClientConfig::default())
            .unwrap();

    let texts = client
        .execute(|tx| {
            let result = tx.execute(Statement::new("SELECT v FROM t"))?;
            Ok(result
                .iter()
                .map(|d| d.as_text().unwrap().to_string())
                .collect::<Vec<_>>())
        })
        .unwrap();
    assert_eq!(texts, vec!["doc-1", "doc-2"]);

    // buffered results are re-enumerable
    let counted = client
        .execute(|tx| {
            let result = tx.execute(Statement::new("SELECT v FROM t"))?;
            let twice = result.iter().count() + result.iter().count();
            Ok(twice)
        })
        .unwrap();
    assert_eq!(counted, 4);

    client.close();
}

#[test]
fn blocking_list_table_names() {
    let transport = EchoTransport::with_values(&["table1", "table2"]);
    let client =
        blocking::Client::new(transport, "test-ledger", ClientConfig::default()).unwrap();

    let names = client.list_table_names().unwrap();
    assert_eq!(names, vec!["table1", "table2"]);
    client.close();
}

#[test]
fn blocking_abort_is_terminal() {
    let transport = EchoTransport::new();
    let client =
        blocking::Client::new(transport, "test-ledger", ClientConfig::default()).unwrap();

    let err = client
        .execute(|tx| {
            tx.execute(Statement::new("DELETE FROM t"))?;
            tx.abort()?;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, Error::Aborted));
    client.close();
}
