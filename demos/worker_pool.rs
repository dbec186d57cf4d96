//! # Example: Worker Pool
//!
//! Two units share a replicated `Customer` cache. A write in unit 1 reaches
//! unit 2 over the cluster bus; unit 1's events reach the supervisor over its
//! channel, and the supervisor stops everything at the end.
//!
//! ```text
//! cargo run --example worker_pool --features logging
//! RUST_LOG=workerlink=debug cargo run --example worker_pool --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use workerlink::{
    Broker, DataSource, Envelope, LogWriter, MemoryDataSource, Model, OperationFn, Pattern, Pool,
    PoolConfig, ServiceTable, SubscribeOptions, UnitContext, WorkerBuilder, WorkerConfig,
};

/// Builds one unit: a replicated datasource plus a `saveCustomer` operation.
fn customer_unit(ctx: &UnitContext) -> WorkerBuilder {
    let broker = Arc::new(Broker::new());
    let ds: Arc<dyn DataSource> = Arc::new(MemoryDataSource::replicated(
        "Customer",
        ctx.cluster.clone(),
        ctx.unit_id,
    ));

    let (save_ds, save_broker) = (ds.clone(), broker.clone());
    let save = OperationFn::arc("saveCustomer", move |data: Value| {
        let ds = save_ds.clone();
        let broker = save_broker.clone();
        async move {
            let id = data["id"].as_str().unwrap_or_default().to_string();
            let model = ds
                .save(&id, Model::new("Customer", id.clone(), data))
                .await
                .map_err(|e| e.to_string())?;
            broker.notify("customerSaved", json!({ "id": id })).await;
            Ok::<_, String>(model.data)
        }
    });

    let service = ServiceTable::builder()
        .operation(save)
        .build()
        .expect("static service table");

    WorkerBuilder::new(WorkerConfig::default())
        .with_broker(broker)
        .with_datasource(ds)
        .with_service(Arc::new(service))
        .with_subscriber(Pattern::Any, Arc::new(LogWriter::new()), SubscribeOptions::new())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("workerlink=info")),
        )
        .init();

    let pool = Pool::new(PoolConfig::default());
    let first = pool.spawn(customer_unit).await;
    let second = pool.spawn(customer_unit).await;
    pool.wait_ready().await?;

    let mut events = first.attach_channel().await?;

    first
        .invoke("saveCustomer", json!({ "id": "42", "name": "Ada" }))
        .await?;
    if let Some(Ok(frame)) = events.recv::<Envelope>().await {
        println!("[supervisor] event from unit {}: {} {}", first.unit(), frame.name, frame.data);
    }

    // Cluster replication is asynchronous; give it a moment.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let cached = second.invoke("showData", json!("Customer")).await?;
    println!("[supervisor] unit {} cache: {}", second.unit(), cached.unwrap_or(Value::Null));

    events.send(&Envelope::new("orderPlaced", json!({ "customer": "42" }))).await?;
    let history = first.invoke("showEvents", Value::Null).await?;
    println!("[supervisor] unit {} history: {}", first.unit(), history.unwrap_or(Value::Null));

    for (unit, res) in pool.shutdown_all().await {
        println!("[supervisor] unit {unit} exited: {res:?}");
    }
    Ok(())
}
