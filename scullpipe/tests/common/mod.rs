#![allow(dead_code)]

use scullpipe::{DeviceRegistry, PipeConfig};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Two devices with `capacity`-byte buffers
pub fn registry(capacity: usize) -> DeviceRegistry {
    init_logging();
    DeviceRegistry::new(
        PipeConfig::default()
            .with_capacity(capacity)
            .with_device_count(2),
    )
    .unwrap()
}
