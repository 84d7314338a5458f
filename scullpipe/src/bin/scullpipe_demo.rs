//! scullpipe CLI Demo
//!
//! Lines typed on stdin are written to device 0. A blocking reader thread
//! prints what it reads in small chunks, and an async listener prints the
//! "data ready" events it gets, the way a SIGIO handler would. An empty line
//! ends the demo.
//!
//! Run with `RUST_LOG=debug` to see the device trace (sleeps, wakeups,
//! byte counts).

use std::io::{self, BufRead};

use scullpipe::{AccessMode, AsyncEvent, DeviceRegistry, OpenFlags, PipeError, PipeHandle};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let registry = DeviceRegistry::from_env()?;
    println!(
        "{} devices, {} byte buffers",
        registry.len(),
        registry.config().capacity
    );

    let reader = registry.open(0, AccessMode::ReadOnly, OpenFlags::BLOCKING)?;
    let listener = registry.open(0, AccessMode::ReadOnly, OpenFlags::NONBLOCKING)?;
    let writer = registry.open(0, AccessMode::WriteOnly, OpenFlags::BLOCKING)?;

    let stop_reader = reader.interrupter();
    let reader_task = tokio::task::spawn_blocking(move || read_all("r1", &reader));

    let mut events = listener
        .set_async(true)
        .ok_or("async registration failed")?;
    let listener_task = tokio::spawn(async move {
        while let Some(AsyncEvent::DataReady { minor, bytes }) = events.recv().await {
            println!("(async) scullpipe{minor}: {bytes} bytes ready");
        }
        println!("(async) listener done");
    });

    tokio::task::spawn_blocking(move || write_all(writer)).await?;

    stop_reader.raise();
    reader_task.await?;

    // Closing the listener deregisters it, which ends the event stream
    listener.close();
    listener_task.await?;

    println!("All tasks completed");
    Ok(())
}

fn write_all(writer: PipeHandle) {
    println!("Enter text (empty line to quit):");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    while let Some(Ok(line)) = lines.next() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }

        if let Err(e) = writer.write_all(trimmed.as_bytes()) {
            eprintln!("Write error: {e} (errno={})", e.errno());
            break;
        }
    }

    writer.close();
    println!("Writer closed");
}

fn read_all(name: &str, reader: &PipeHandle) {
    let mut buf = [0u8; 4];

    loop {
        match reader.read(&mut buf) {
            Ok(n) => {
                let data = String::from_utf8_lossy(&buf[..n]);
                println!("({name}): {data}");
            }
            Err(PipeError::Interrupted) => {
                println!("({name}) interrupted");
                break;
            }
            Err(e) => {
                eprintln!("({name}) Error: {e} (errno={})", e.errno());
                break;
            }
        }
    }
}
