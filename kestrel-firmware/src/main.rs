//! Kestrel - Printer Configuration Firmware
//!
//! Main firmware binary for RP2040-based printer boards. Loads the printer
//! configuration from flash (or the copy embedded at build time), keeps it
//! published for every task, and serves reload and calibration save requests.

#![no_std]
#![no_main]

extern crate alloc;

use defmt::*;
use embassy_executor::Spawner;
use embedded_alloc::LlffHeap as Heap;
use portable_atomic::Ordering;
use {defmt_rtt as _, panic_probe as _};

use kestrel_core::PrinterConfig;
use kestrel_hal_rp2040::flash::Rp2040FlashStorage;

use crate::channels::{ARMED, CONFIG};
use crate::config::{boot_config, ConfigPersistence};

// Heap allocator for the document and parsed sections
#[global_allocator]
static HEAP: Heap = Heap::empty();

// Heap size: 96KB, room for two parsed documents during a reload
const HEAP_SIZE: usize = 96 * 1024;

/// Embedded default configuration (compiled into firmware)
/// Edit printer.cfg and rebuild to customize
pub const EMBEDDED_CONFIG: &str = include_str!("../printer.cfg");

mod channels;
mod config;
mod tasks;

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Kestrel firmware starting...");

    // Initialize heap allocator
    init_heap();

    // Initialize RP2040 peripherals
    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let storage = Rp2040FlashStorage::new(p.FLASH, p.DMA_CH0);
    let mut persistence = ConfigPersistence::new(storage);

    match boot_config(&mut persistence, EMBEDDED_CONFIG).await {
        Some(config) => {
            log_summary(&config);
            let generation = CONFIG.publish(config);
            ARMED.store(true, Ordering::Release);
            info!("Configuration {} active, outputs armed", generation);
        }
        None => warn!("No usable configuration, outputs stay disarmed until a valid reload"),
    }

    unwrap!(spawner.spawn(tasks::config_task(persistence)));

    info!("All tasks spawned, firmware running");

    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!(
            "Main loop heartbeat: generation {}, armed {}",
            CONFIG.generation(),
            ARMED.load(Ordering::Acquire)
        );
    }
}

fn log_summary(config: &PrinterConfig) {
    info!(
        "{} steppers, {} extruders, {} heaters, {} fans",
        config.steppers().len(),
        config.extruders().len(),
        config.heaters().len(),
        config.fans().len()
    );
    if let Some(probe) = config.probe() {
        info!("Probe z_offset {}", probe.z_offset);
    }
    if config.display().is_some() {
        debug!("Display configured");
    }
}

/// Initialize the heap allocator
fn init_heap() {
    use core::mem::MaybeUninit;
    static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
    #[allow(static_mut_refs)]
    unsafe {
        HEAP.init(HEAP_MEM.as_ptr() as usize, HEAP_SIZE)
    }
}
