//! Self-contained example: a ledger entity whose commands are plain
//! behaviors, with events derived from what each behavior changed.
//!
//! Run with: `cargo run --example ledger`

use eventfold_entity::{
    Entity, EntityConfig, EntityDefinition, SNAPSHOT_EVENT, inspect, snapshot,
};
use serde::Deserialize;
use serde_json::json;

// ---------------------------------------------------------------------------
// Ledger definition
// ---------------------------------------------------------------------------

/// Typed view of the ledger's state.
#[derive(Debug, Default, Deserialize)]
struct Ledger {
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    balance: i64,
    #[serde(default)]
    entries: Vec<i64>,
}

#[derive(Debug, thiserror::Error)]
#[error("ledger is frozen")]
struct Frozen;

fn ledger() -> EntityDefinition {
    EntityDefinition::new("ledger")
        .command("open", |fields, args| {
            fields.set("owner", args.get::<String>(0)?)?;
            fields.set("balance", 0)?;
            fields.set("entries", Vec::<i64>::new())?;
            Ok(None)
        })
        .command("post", |fields, args| {
            if fields.get_as::<Option<bool>>("frozen")?.unwrap_or(false) {
                return Err(Frozen.into());
            }
            let amount: i64 = args.get(0)?;
            let mut entries: Vec<i64> = fields.get_as("entries")?;
            entries.push(amount);
            fields.set("balance", fields.get_as::<i64>("balance")? + amount)?;
            fields.set("entries", entries)?;
            Ok(None)
        })
        .command("freeze", |fields, _| {
            fields.set("frozen", true)?;
            Ok(None)
        })
        .command("balance", |fields, _| Ok(Some(fields.get("balance").clone())))
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = EntityConfig::default().with_mapping("post", "EntryPosted");
    let mut books = Entity::new(&ledger(), (), config.clone())?;

    books.on("EntryPosted", |event| {
        println!("  -> {} (v{})", event.name(), event.version());
    });
    books.on(SNAPSHOT_EVENT, |event| {
        println!("  -> snapshot at v{} ({} ops)", event.version(), event.changeset().len());
    });

    println!("--- commands ---");
    books.call("open", json!(["Ada"]))?;
    books.call("post", json!([120]))?;
    books.call("post", json!([-45]))?;
    books.call("freeze", ())?;

    match books.call("post", json!([10])) {
        Ok(_) => println!("unexpected: post accepted on a frozen ledger"),
        Err(e) => println!("rejected: {e}"),
    }

    println!("--- query ---");
    let balance = books.call("balance", ())?;
    println!("balance = {}", balance.unwrap_or_default());

    println!("--- history ---");
    for event in books.history() {
        let changes = serde_json::to_string(event.changeset())?;
        println!("v{} {} {}", event.version(), event.name(), changes);
    }

    println!("--- snapshot ---");
    let plain = snapshot(&books);
    println!("{}", serde_json::to_string_pretty(&plain)?);

    println!("--- replay ---");
    let exported = serde_json::to_value(books.history())?;
    let replica = Entity::from_records(&ledger(), &exported, config)?;
    let view: Ledger = replica.state_as()?;
    println!(
        "replica v{}: owner={:?} balance={} entries={:?}",
        replica.version(),
        view.owner,
        view.balance,
        view.entries
    );

    println!("--- inspect ---");
    println!("{}", serde_json::to_string_pretty(&inspect(&replica))?);

    Ok(())
}
