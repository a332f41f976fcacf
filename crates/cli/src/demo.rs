use crate::{car::Car, observer::PrintObserver};
use anyhow::{Context, Result};
use tally::{Shared, lifecycle, try_make_shared};

/// Settings for a demo run
#[derive(Debug)]
pub struct DemoSettings {
    /// The value given to the demo's Car
    pub value: i32,
    /// The number of extra handles to clone before teardown
    pub copies: usize,
    /// Adopt a boxed Car through a raw pointer rather than using make_shared
    pub raw: bool,
    /// Don't print lifecycle events
    pub quiet: bool,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            value: 50,
            copies: 0,
            raw: false,
            quiet: false,
        }
    }
}

pub fn run(settings: &DemoSettings) -> Result<()> {
    let _guard = (!settings.quiet).then(|| lifecycle::set_observer(PrintObserver::default()));

    let ptr = if settings.raw {
        println!("=== adopt a raw pointer ===");
        let car = Box::new(Car::try_new(settings.value).context("Failed to make the car")?);
        // SAFETY: the pointer comes straight from the box and isn't adopted anywhere else
        unsafe { Shared::from_raw(Box::into_raw(car)) }
    } else {
        println!("=== make_shared ===");
        try_make_shared(|| Car::try_new(settings.value)).context("Failed to make the car")?
    };

    println!("ptr->value = {}", ptr.value);
    println!("(*ptr).value = {}", (*ptr).value);
    if let Some(car) = Shared::get(&ptr) {
        println!("ptr.get()->value = {}", car.value);
    }
    println!("use_count = {}", Shared::use_count(&ptr));
    println!("is unique = {}", Shared::is_unique(&ptr));
    println!("bool conversion = {}", Shared::is_some(&ptr));

    println!("=== empty handle ===");
    let empty = Shared::<Car>::empty();
    println!("use_count = {}", Shared::use_count(&empty));
    println!("bool conversion = {}", Shared::is_some(&empty));
    drop(empty);

    println!("=== clone {} copies ===", settings.copies);
    let copies = (0..settings.copies)
        .map(|_| ptr.clone())
        .collect::<Vec<_>>();
    println!("use_count = {}", Shared::use_count(&ptr));

    println!("=== teardown ===");
    for copy in copies {
        drop(copy);
        println!("use_count = {}", Shared::use_count(&ptr));
    }
    drop(ptr);

    Ok(())
}
